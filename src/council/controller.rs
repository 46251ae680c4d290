//! Session lifecycle: narrate, converse, eliminate, stop.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{error, info};
use uuid::Uuid;

use crate::backend::{ChatMessage, SharedGenerator};
use crate::error::{Error, Result};
use crate::persona::{PersonaName, RoleRegistry};

use super::clock::{SharedClock, SystemClock};
use super::graph::{ConversationGraph, GraphExit, GraphSettings};
use super::message::{Message, Speaker, NARRATOR};
use super::observer::{NoopObserver, SessionObserver};
use super::router::TurnRouter;
use super::scheduler::{EliminationScheduler, SchedulerSettings};
use super::session::{SessionHandle, SessionOutcome, SessionStatus};

/// Instruction for the opening scene.
const NARRATIVE_PROMPT: &str = "You are a master storyteller. Set the stage for a high-stakes war council \
where ten uniquely skilled advisors gather in the royal war room. The kingdom faces imminent invasion and \
internal strife. Describe the tense atmosphere, the ancient maps and battle plans spread across the table, \
and the urgency in the room as the advisors debate their next move. Keep the narrative short (one paragraph, \
no more than 150 words), vivid and immersive, focusing on the grim reality of war and the weight of their \
decisions. Avoid using specific names or titles. At the end of the paragraph, have the first council member \
to speak propose a bold strategy, then ask the council directly something like: \
\"What decisive command shall we issue?\"";

/// Everything a session needs besides the backend.
#[derive(Debug, Clone, Default)]
pub struct ControllerSettings {
    pub graph: GraphSettings,
    pub scheduler: SchedulerSettings,
    /// Stop the session automatically after this long
    pub max_duration: Option<Duration>,
    /// Seed for impostor choice, start node, routing and eliminations
    pub seed: Option<u64>,
}

/// Runs at most one live session at a time.
pub struct SessionController {
    registry: RoleRegistry,
    generator: SharedGenerator,
    settings: ControllerSettings,
    clock: SharedClock,
    observer: Arc<dyn SessionObserver>,
    current: Mutex<Option<Arc<SessionHandle>>>,
    /// Held across the whole of `initialize_conversation`
    init_lock: tokio::sync::Mutex<()>,
}

impl SessionController {
    pub fn new(generator: SharedGenerator, settings: ControllerSettings) -> Self {
        Self {
            registry: RoleRegistry::new(),
            generator,
            settings,
            clock: Arc::new(SystemClock),
            observer: Arc::new(NoopObserver),
            current: Mutex::new(None),
            init_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Receive messages, eliminations and the final outcome.
    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Replace the clock used for recency weighting.
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn registry(&self) -> &RoleRegistry {
        &self.registry
    }

    // ── Control surface ──────────────────────────────────────────

    /// Start a new session, replacing any live one.
    ///
    /// The opening narrative is generated before this returns; if that
    /// fails no session is left running. With no index the impostor is
    /// drawn at random. Concurrent calls run one after the other.
    ///
    /// The new session becomes current before the narrative is requested,
    /// so a stop issued meanwhile tears it down; the handle is then
    /// returned already stopped and nothing is spawned for it.
    pub async fn initialize_conversation(&self, impostor_index: Option<usize>) -> Result<Arc<SessionHandle>> {
        let _init = self.init_lock.lock().await;

        let index = match impostor_index {
            Some(index) => index,
            None => self.draw_impostor_index(),
        };
        let roles = self.registry.with_impostor(index)?;

        self.stop_conversation();

        let session = Arc::new(SessionHandle::new(
            roles,
            TurnRouter::new(self.clock.clone()),
            self.observer.clone(),
            self.settings.seed,
        ));
        *self.current.lock() = Some(session.clone());
        info!(session_id = %session.id(), impostor_index = index, "Initializing session");

        let narrative = match self.generate_narrative().await {
            Ok(narrative) => narrative,
            Err(e) => {
                error!(session_id = %session.id(), error = %e, "Narrative generation failed");
                self.discard(&session);
                return Err(e);
            }
        };

        session.begin();
        if !session.record(Message::narrator(narrative)) {
            info!(session_id = %session.id(), "Session stopped during initialization");
            return Ok(session);
        }

        let graph = session.with_rng(|rng| {
            ConversationGraph::new(session.roles(), self.generator.clone(), self.settings.graph.clone(), rng)
        });
        tokio::spawn(drive(graph, session.clone()));

        Arc::new(EliminationScheduler::new(self.settings.scheduler.clone())).spawn(session.clone());

        if let Some(limit) = self.settings.max_duration {
            tokio::spawn(stop_after(session.clone(), limit));
        }

        Ok(session)
    }

    /// Stop the live session. Safe to call any number of times.
    pub fn stop_conversation(&self) {
        let current = self.current.lock().clone();
        if let Some(session) = current {
            session.stop();
        }
    }

    /// All buffered messages, in production order.
    pub fn get_messages(&self) -> Vec<Message> {
        self.session().map(|s| s.messages()).unwrap_or_default()
    }

    pub fn get_latest_message(&self) -> Option<Message> {
        self.session().and_then(|s| s.latest_message())
    }

    /// Buffered messages from one speaker (a persona name or "Narrator").
    pub fn get_messages_by_agent(&self, name: &str) -> Result<Vec<Message>> {
        let speaker = Speaker::try_from(name.to_string())?;
        Ok(self.session().map(|s| s.messages_by(speaker)).unwrap_or_default())
    }

    /// Wait for the current session to end.
    pub async fn wait(&self) -> Result<SessionOutcome> {
        let session = self.session().ok_or(Error::SessionNotActive)?;
        Ok(session.wait().await)
    }

    // ── Introspection ────────────────────────────────────────────

    /// The most recently started session, live or ended.
    pub fn session(&self) -> Option<Arc<SessionHandle>> {
        self.current.lock().clone()
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session().map(|s| s.id())
    }

    pub fn status(&self) -> Option<SessionStatus> {
        self.session().map(|s| s.status())
    }

    pub fn is_active(&self) -> bool {
        self.session().map(|s| s.is_active()).unwrap_or(false)
    }

    pub fn eliminated(&self) -> Vec<PersonaName> {
        self.session().map(|s| s.eliminated()).unwrap_or_default()
    }

    pub fn active_personas(&self) -> Vec<PersonaName> {
        self.session().map(|s| s.active_personas()).unwrap_or_default()
    }

    /// The impostor of the current session. Operator-only.
    pub fn impostor(&self) -> Option<PersonaName> {
        self.session().map(|s| s.impostor())
    }

    // ── Internals ────────────────────────────────────────────────

    /// Tear down a session that never started and forget it.
    fn discard(&self, session: &Arc<SessionHandle>) {
        session.stop();
        let mut current = self.current.lock();
        if current.as_ref().is_some_and(|c| Arc::ptr_eq(c, session)) {
            *current = None;
        }
    }

    fn draw_impostor_index(&self) -> usize {
        let count = self.registry.count();
        match self.settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed).gen_range(0..count),
            None => rand::thread_rng().gen_range(0..count),
        }
    }

    async fn generate_narrative(&self) -> Result<String> {
        let generation = self
            .generator
            .generate(&[ChatMessage::user(NARRATIVE_PROMPT)])
            .await
            .map_err(|e| match e {
                Error::GenerationFailed { message, .. } => Error::generation_failed(NARRATOR, message),
                other => Error::generation_failed(NARRATOR, other.to_string()),
            })?;

        let narrative = generation.content.trim();
        if narrative.is_empty() {
            return Err(Error::generation_failed(NARRATOR, "backend returned an empty narrative"));
        }
        Ok(narrative.to_string())
    }
}

async fn drive(graph: ConversationGraph, session: Arc<SessionHandle>) {
    match graph.run(&session).await {
        GraphExit::Completed => session.finish(SessionStatus::Completed, None),
        GraphExit::Aborted(e) => session.finish(SessionStatus::Aborted, Some(e.format_for_log())),
        GraphExit::Cancelled => {}
    }
}

async fn stop_after(session: Arc<SessionHandle>, limit: Duration) {
    tokio::select! {
        _ = session.cancellation().cancelled() => {}
        _ = tokio::time::sleep(limit) => {
            info!(session_id = %session.id(), limit = ?limit, "Session time limit reached");
            session.stop();
        }
    }
}
