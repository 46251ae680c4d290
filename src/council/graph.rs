//! The turn loop.
//!
//! Each persona is a node; the speaking node names the next one through the
//! router, so the "edges" are decided at runtime. The loop below is the whole
//! graph: dispatch to the named node, record, follow its choice.

use std::time::Duration;

use rand::Rng;
use tracing::{debug, error, info};

use crate::backend::SharedGenerator;
use crate::error::{Error, Result};
use crate::persona::{PersonaName, SessionRoleSet};

use super::agent::{AgentNode, TurnResult};
use super::session::SessionHandle;

// ─────────────────────────────────────────────────────────────────
// Settings
// ─────────────────────────────────────────────────────────────────

/// Turn loop tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphSettings {
    /// Safety ceiling on persona turns; reaching it completes the session
    pub max_turns: u64,

    /// Persona messages handed to each turn besides the opening scene
    pub context_window: usize,

    /// Pause before each turn is drawn from this range
    pub min_turn_delay: Duration,
    pub max_turn_delay: Duration,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            max_turns: 1000,
            context_window: 12,
            min_turn_delay: Duration::from_secs(10),
            max_turn_delay: Duration::from_secs(20),
        }
    }
}

impl GraphSettings {
    /// No pause between turns.
    pub fn without_pacing(mut self) -> Self {
        self.min_turn_delay = Duration::ZERO;
        self.max_turn_delay = Duration::ZERO;
        self
    }

    /// Draw the pause before the next turn.
    pub fn pacing_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let min = self.min_turn_delay.as_millis() as u64;
        let max = self.max_turn_delay.as_millis() as u64;
        if max <= min {
            return Duration::from_millis(min);
        }
        Duration::from_millis(rng.gen_range(min..=max))
    }
}

// ─────────────────────────────────────────────────────────────────
// Graph
// ─────────────────────────────────────────────────────────────────

/// Where control goes after a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Persona(PersonaName),
    End,
}

/// Why the loop returned.
#[derive(Debug)]
pub enum GraphExit {
    /// Turn ceiling reached
    Completed,
    /// A turn failed
    Aborted(Error),
    /// The session was stopped
    Cancelled,
}

/// One node per persona plus the loop that drives them.
pub struct ConversationGraph {
    nodes: Vec<AgentNode>,
    start: PersonaName,
    generator: SharedGenerator,
    settings: GraphSettings,
}

impl ConversationGraph {
    /// Build the graph with a start node drawn uniformly from all personas.
    pub fn new<R: Rng + ?Sized>(
        roles: &SessionRoleSet,
        generator: SharedGenerator,
        settings: GraphSettings,
        rng: &mut R,
    ) -> Self {
        let nodes: Vec<AgentNode> = roles
            .roles()
            .iter()
            .map(|role| AgentNode::new(role.clone(), roles))
            .collect();
        let start = nodes[rng.gen_range(0..nodes.len())].name();

        Self {
            nodes,
            start,
            generator,
            settings,
        }
    }

    pub fn start(&self) -> PersonaName {
        self.start
    }

    pub fn settings(&self) -> &GraphSettings {
        &self.settings
    }

    fn node(&self, name: PersonaName) -> Result<&AgentNode> {
        self.nodes
            .iter()
            .find(|node| node.name() == name)
            .ok_or_else(|| Error::Internal(format!("no node for persona {}", name)))
    }

    /// Drive turns until the ceiling, a failure, or the session's stop.
    pub async fn run(&self, session: &SessionHandle) -> GraphExit {
        let cancel = session.cancellation().clone();
        let mut destination = Destination::Persona(self.start);
        let mut previous: Option<PersonaName> = None;
        let mut turns: u64 = 0;

        info!(session_id = %session.id(), start = %self.start, "Conversation started");

        loop {
            let planned = match destination {
                Destination::Persona(name) => name,
                Destination::End => {
                    info!(session_id = %session.id(), turns, "Turn ceiling reached");
                    return GraphExit::Completed;
                }
            };

            let delay = session.with_rng(|rng| self.settings.pacing_delay(rng));
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return GraphExit::Cancelled,
                _ = tokio::time::sleep(delay) => {}
            }

            let speaker = match session.confirm_speaker(planned, previous) {
                Ok(Some(speaker)) => speaker,
                Ok(None) => return GraphExit::Cancelled,
                Err(e) => return self.abort(session, e),
            };
            let node = match self.node(speaker) {
                Ok(node) => node,
                Err(e) => return self.abort(session, e),
            };

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return GraphExit::Cancelled,
                result = node.run_turn(self.generator.as_ref(), session, self.settings.context_window) => result,
            };

            match result {
                Ok(TurnResult::Spoke { next, .. }) => {
                    turns += 1;
                    debug!(session_id = %session.id(), turn = turns, speaker = %speaker, next = %next, "Turn complete");
                    previous = Some(speaker);
                    destination = if turns >= self.settings.max_turns {
                        Destination::End
                    } else {
                        Destination::Persona(next)
                    };
                }
                Ok(TurnResult::Silenced) => {
                    // confirm_speaker re-routes away from the eliminated persona
                    debug!(session_id = %session.id(), speaker = %speaker, "Speaker eliminated mid-turn");
                    destination = Destination::Persona(speaker);
                }
                Ok(TurnResult::Discarded) => return GraphExit::Cancelled,
                Err(e) => return self.abort(session, e),
            }
        }
    }

    fn abort(&self, session: &SessionHandle, error: Error) -> GraphExit {
        error!(session_id = %session.id(), error = %error, "Conversation aborted");
        GraphExit::Aborted(error)
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::backend::{MockBackend, MockConfig};
    use crate::council::clock::SystemClock;
    use crate::council::message::Message;
    use crate::council::observer::NoopObserver;
    use crate::council::router::TurnRouter;
    use crate::persona::RoleRegistry;

    fn live_session() -> SessionHandle {
        let roles = RoleRegistry::new().with_impostor(2).unwrap();
        let session = SessionHandle::new(roles, TurnRouter::new(Arc::new(SystemClock)), Arc::new(NoopObserver), Some(4));
        session.begin();
        session.record(Message::narrator("Ash falls on the citadel."));
        session
    }

    fn settings(max_turns: u64) -> GraphSettings {
        GraphSettings {
            max_turns,
            ..GraphSettings::default().without_pacing()
        }
    }

    #[test]
    fn test_pacing_delay_range() {
        let settings = GraphSettings::default();
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..100 {
            let delay = settings.pacing_delay(&mut rng);
            assert!(delay >= Duration::from_secs(10) && delay <= Duration::from_secs(20));
        }
        assert_eq!(settings.without_pacing().pacing_delay(&mut rng), Duration::ZERO);
    }

    #[test]
    fn test_start_node_is_uniform_over_personas() {
        let roles = RoleRegistry::new().with_impostor(0).unwrap();
        let generator: SharedGenerator = Arc::new(MockBackend::new());
        let mut rng = StdRng::seed_from_u64(99);

        let starts: HashSet<_> = (0..200)
            .map(|_| ConversationGraph::new(&roles, generator.clone(), GraphSettings::default(), &mut rng).start())
            .collect();
        assert_eq!(starts.len(), 10);
    }

    #[tokio::test]
    async fn test_ceiling_completes_without_self_address() {
        let session = live_session();
        let backend = Arc::new(MockBackend::fixed("Seal the gates."));
        let graph = session.with_rng(|rng| {
            ConversationGraph::new(session.roles(), backend.clone(), settings(25), rng)
        });

        assert!(matches!(graph.run(&session).await, GraphExit::Completed));
        assert_eq!(backend.call_count(), 25);

        let messages = session.messages();
        assert_eq!(messages.len(), 26);
        assert_eq!(messages[1].name.persona(), Some(graph.start()));
        for pair in messages[1..].windows(2) {
            assert_ne!(pair[0].name, pair[1].name);
        }
    }

    #[tokio::test]
    async fn test_generation_failure_aborts() {
        let session = live_session();
        let backend = Arc::new(MockBackend::with_config(MockConfig {
            fixed_response: Some("Burn the bridges.".to_string()),
            fail_after: Some(3),
            ..Default::default()
        }));
        let graph = session.with_rng(|rng| {
            ConversationGraph::new(session.roles(), backend.clone(), settings(100), rng)
        });

        match graph.run(&session).await {
            GraphExit::Aborted(Error::GenerationFailed { .. }) => {}
            other => panic!("expected abort, got {:?}", other),
        }
        assert_eq!(session.messages().len(), 4);
    }

    #[tokio::test]
    async fn test_stopped_session_exits_cancelled() {
        let session = live_session();
        session.stop();
        let graph = session.with_rng(|rng| {
            ConversationGraph::new(session.roles(), Arc::new(MockBackend::new()), settings(10), rng)
        });
        assert!(matches!(graph.run(&session).await, GraphExit::Cancelled));
    }
}
