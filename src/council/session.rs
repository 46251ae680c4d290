//! Live state of one council session.
//!
//! Eligibility, recency, the RNG and the message buffer sit behind a single
//! lock together with the active flag. Appends, eliminations and their
//! broadcasts all check the flag under that lock, so once [`SessionHandle::stop`]
//! returns nothing more is appended or broadcast.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::persona::{PersonaName, SessionRoleSet};

use super::eligibility::{EligibilityState, EliminationOutcome};
use super::message::{Message, Speaker};
use super::observer::SessionObserver;
use super::router::{RecencySelector, TurnRouter};

// ─────────────────────────────────────────────────────────────────
// Status & Outcome
// ─────────────────────────────────────────────────────────────────

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Created, narrative not yet recorded
    Idle,
    /// Turn loop running
    Running,
    /// Turn loop reached its ceiling
    Completed,
    /// Turn loop ended on an error
    Aborted,
    /// Stopped from outside
    Stopped,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Completed | SessionStatus::Aborted | SessionStatus::Stopped
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Running => "running",
            SessionStatus::Completed => "completed",
            SessionStatus::Aborted => "aborted",
            SessionStatus::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionOutcome {
    pub status: SessionStatus,
    /// Persona turns recorded
    pub turns: u64,
    pub error: Option<String>,
}

// ─────────────────────────────────────────────────────────────────
// Turn Context
// ─────────────────────────────────────────────────────────────────

/// Snapshot handed to a turn before the generation call.
#[derive(Debug, Clone)]
pub struct TurnContext {
    /// Opening scene, if recorded
    pub narrative: Option<Message>,
    /// Most recent persona messages, oldest first
    pub history: Vec<Message>,
    /// Personas still in play, in registry order
    pub eligible: Vec<PersonaName>,
}

/// What happened to a finished generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TurnCommit {
    /// Appended; the speaker addresses this persona next
    Recorded(PersonaName),
    /// The speaker was eliminated mid-generation
    Silenced,
    /// The session is no longer active
    Inactive,
}

// ─────────────────────────────────────────────────────────────────
// Session Handle
// ─────────────────────────────────────────────────────────────────

struct SessionState {
    status: SessionStatus,
    active: bool,
    torn_down: bool,
    eligibility: EligibilityState,
    recency: RecencySelector,
    rng: StdRng,
    messages: Vec<Message>,
    turns: u64,
    error: Option<String>,
}

impl SessionState {
    fn outcome(&self) -> SessionOutcome {
        SessionOutcome {
            status: self.status,
            turns: self.turns,
            error: self.error.clone(),
        }
    }
}

/// One session's composed state.
pub struct SessionHandle {
    id: Uuid,
    roles: SessionRoleSet,
    router: TurnRouter,
    observer: Arc<dyn SessionObserver>,
    cancel: CancellationToken,
    state: Mutex<SessionState>,
    outcome_tx: watch::Sender<Option<SessionOutcome>>,
}

impl SessionHandle {
    pub(crate) fn new(
        roles: SessionRoleSet,
        router: TurnRouter,
        observer: Arc<dyn SessionObserver>,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let (outcome_tx, _) = watch::channel(None);

        Self {
            id: Uuid::new_v4(),
            state: Mutex::new(SessionState {
                status: SessionStatus::Idle,
                active: false,
                torn_down: false,
                eligibility: EligibilityState::new(&roles),
                recency: RecencySelector::new(),
                rng,
                messages: Vec::new(),
                turns: 0,
                error: None,
            }),
            roles,
            router,
            observer,
            cancel: CancellationToken::new(),
            outcome_tx,
        }
    }

    // ── Introspection ────────────────────────────────────────────

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn roles(&self) -> &SessionRoleSet {
        &self.roles
    }

    pub fn impostor(&self) -> PersonaName {
        self.roles.impostor()
    }

    pub fn status(&self) -> SessionStatus {
        self.state.lock().status
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    pub fn turns(&self) -> u64 {
        self.state.lock().turns
    }

    pub fn active_personas(&self) -> Vec<PersonaName> {
        self.state.lock().eligibility.active().to_vec()
    }

    pub fn eliminated(&self) -> Vec<PersonaName> {
        self.state.lock().eligibility.eliminated().to_vec()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.state.lock().messages.clone()
    }

    pub fn latest_message(&self) -> Option<Message> {
        self.state.lock().messages.last().cloned()
    }

    pub fn messages_by(&self, speaker: Speaker) -> Vec<Message> {
        self.state
            .lock()
            .messages
            .iter()
            .filter(|m| m.name == speaker)
            .cloned()
            .collect()
    }

    /// The outcome, once the session has ended.
    pub fn outcome(&self) -> Option<SessionOutcome> {
        self.outcome_tx.borrow().clone()
    }

    /// Wait for the session to end.
    pub async fn wait(&self) -> SessionOutcome {
        let mut rx = self.outcome_tx.subscribe();
        loop {
            if let Some(outcome) = rx.borrow_and_update().clone() {
                return outcome;
            }
            if rx.changed().await.is_err() {
                return self.state.lock().outcome();
            }
        }
    }

    pub(crate) fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub(crate) fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        f(&mut self.state.lock().rng)
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Idle → Running.
    pub(crate) fn begin(&self) {
        let mut state = self.state.lock();
        if state.status == SessionStatus::Idle && !state.torn_down {
            state.status = SessionStatus::Running;
            state.active = true;
        }
    }

    /// Append and broadcast a message. Returns false if the session is no
    /// longer active and the message was dropped.
    pub(crate) fn record(&self, message: Message) -> bool {
        let mut state = self.state.lock();
        if !state.active {
            return false;
        }
        self.append_locked(&mut state, message);
        true
    }

    /// Snapshot what the next turn needs, or `None` once inactive.
    pub(crate) fn turn_context(&self, window: usize) -> Option<TurnContext> {
        let state = self.state.lock();
        if !state.active {
            return None;
        }

        let narrative = state.messages.first().filter(|m| m.is_narrator()).cloned();
        let persona_messages: Vec<&Message> =
            state.messages.iter().filter(|m| !m.is_narrator()).collect();
        let skip = persona_messages.len().saturating_sub(window);
        let history = persona_messages.into_iter().skip(skip).cloned().collect();

        Some(TurnContext {
            narrative,
            history,
            eligible: state.eligibility.active().to_vec(),
        })
    }

    /// Make sure `planned` may still speak; re-route away from it when it
    /// was eliminated after being chosen. `None` once inactive.
    pub(crate) fn confirm_speaker(
        &self,
        planned: PersonaName,
        previous: Option<PersonaName>,
    ) -> Result<Option<PersonaName>> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if !state.active {
            return Ok(None);
        }
        if state.eligibility.is_active(planned) {
            return Ok(Some(planned));
        }

        let exclude = previous.unwrap_or(planned);
        let next = self.router.select_next(
            state.eligibility.active(),
            exclude,
            &mut state.recency,
            &mut state.rng,
        )?;
        info!(session_id = %self.id, eliminated = %planned, next = %next, "Re-routed turn away from eliminated persona");
        Ok(Some(next))
    }

    /// Record a persona's reply and choose who it addresses.
    ///
    /// The reply is dropped when the session stopped while it was being
    /// generated, or when the speaker was eliminated in the meantime.
    pub(crate) fn commit_turn(&self, message: Message, speaker: PersonaName) -> Result<TurnCommit> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if !state.active {
            return Ok(TurnCommit::Inactive);
        }
        if !state.eligibility.is_active(speaker) {
            info!(session_id = %self.id, speaker = %speaker, "Dropped reply from eliminated persona");
            return Ok(TurnCommit::Silenced);
        }

        self.append_locked(state, message);
        state.turns += 1;

        let next = self.router.select_next(
            state.eligibility.active(),
            speaker,
            &mut state.recency,
            &mut state.rng,
        )?;
        Ok(TurnCommit::Recorded(next))
    }

    /// One elimination tick. `None` once inactive.
    pub(crate) fn eliminate_one(&self) -> Option<EliminationOutcome> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if !state.active {
            return None;
        }

        let outcome = state.eligibility.eliminate_random(&mut state.rng);
        if let EliminationOutcome::Eliminated(name) = outcome {
            info!(session_id = %self.id, eliminated = %name, remaining = state.eligibility.active().len(), "Persona eliminated");
            self.isolate("on_elimination", self.observer.on_elimination(name));
        }
        Some(outcome)
    }

    /// End the loop with `status` unless the session already ended.
    pub(crate) fn finish(&self, status: SessionStatus, error: Option<String>) {
        {
            let mut state = self.state.lock();
            if state.status.is_terminal() {
                return;
            }
            self.finish_locked(&mut state, status, error);
        }
        self.cancel.cancel();
    }

    /// Tear the session down. Idempotent; returns whether this call did
    /// anything.
    pub fn stop(&self) -> bool {
        {
            let mut state = self.state.lock();
            if state.torn_down {
                return false;
            }
            state.torn_down = true;
            state.messages.clear();
            state.eligibility.clear();
            if !state.status.is_terminal() {
                self.finish_locked(&mut state, SessionStatus::Stopped, None);
            }
            state.active = false;
        }
        self.cancel.cancel();
        info!(session_id = %self.id, "Session stopped");
        true
    }

    fn append_locked(&self, state: &mut SessionState, message: Message) {
        self.isolate("on_message", self.observer.on_message(&message));
        state.messages.push(message);
    }

    fn finish_locked(&self, state: &mut SessionState, status: SessionStatus, error: Option<String>) {
        state.status = status;
        state.active = false;
        state.error = error;

        let outcome = state.outcome();
        self.isolate("on_session_end", self.observer.on_session_end(&outcome));
        self.outcome_tx.send_replace(Some(outcome));
    }

    fn isolate(&self, hook: &str, result: Result<()>) {
        if let Err(e) = result {
            warn!(session_id = %self.id, hook, error = %e, "Session hook failed");
        }
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("status", &self.status())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::council::clock::SystemClock;
    use crate::council::observer::{ChannelObserver, NoopObserver, SessionEvent};
    use crate::persona::RoleRegistry;

    fn handle(observer: Arc<dyn SessionObserver>) -> SessionHandle {
        let roles = RoleRegistry::new().with_impostor(3).unwrap();
        SessionHandle::new(roles, TurnRouter::new(Arc::new(SystemClock)), observer, Some(9))
    }

    #[test]
    fn test_idle_session_drops_messages() {
        let session = handle(Arc::new(NoopObserver));
        assert!(!session.record(Message::narrator("too early")));
        session.begin();
        assert!(session.record(Message::narrator("now")));
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.status(), SessionStatus::Running);
    }

    #[test]
    fn test_turn_context_window() {
        let session = handle(Arc::new(NoopObserver));
        session.begin();
        session.record(Message::narrator("scene"));
        for i in 0..5 {
            let commit = session.commit_turn(Message::persona(PersonaName::Mage, format!("m{}", i)), PersonaName::Mage);
            assert!(matches!(commit, Ok(TurnCommit::Recorded(_))));
        }

        let ctx = session.turn_context(2).unwrap();
        assert_eq!(ctx.narrative.unwrap().content, "scene");
        let contents: Vec<_> = ctx.history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m3", "m4"]);
        assert_eq!(ctx.eligible.len(), 10);
        assert_eq!(session.turns(), 5);
    }

    #[test]
    fn test_commit_turn_routes_away_from_speaker() {
        let session = handle(Arc::new(NoopObserver));
        session.begin();
        match session.commit_turn(Message::persona(PersonaName::General, "Charge."), PersonaName::General) {
            Ok(TurnCommit::Recorded(next)) => assert_ne!(next, PersonaName::General),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_reply_from_persona_eliminated_mid_generation_is_dropped() {
        let (observer, mut rx) = ChannelObserver::new();
        let session = handle(Arc::new(observer));
        session.begin();
        session.record(Message::narrator("scene"));

        let victim = match session.eliminate_one() {
            Some(EliminationOutcome::Eliminated(name)) => name,
            other => panic!("unexpected {:?}", other),
        };
        let commit = session.commit_turn(Message::persona(victim, "Too late."), victim).unwrap();
        assert_eq!(commit, TurnCommit::Silenced);
        assert_eq!(session.turns(), 0);
        assert_eq!(session.messages().len(), 1);

        assert!(matches!(rx.try_recv().unwrap(), SessionEvent::Message(m) if m.is_narrator()));
        assert!(matches!(rx.try_recv().unwrap(), SessionEvent::Elimination { name } if name == victim));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_confirm_speaker_reroutes_eliminated() {
        let session = handle(Arc::new(NoopObserver));
        session.begin();
        let victim = match session.eliminate_one() {
            Some(EliminationOutcome::Eliminated(name)) => name,
            other => panic!("unexpected {:?}", other),
        };

        let speaker = session.confirm_speaker(victim, Some(PersonaName::Spymaster)).unwrap().unwrap();
        assert_ne!(speaker, victim);
        assert_ne!(speaker, PersonaName::Spymaster);

        let same = session.confirm_speaker(PersonaName::Spymaster, None).unwrap();
        assert_eq!(same, Some(PersonaName::Spymaster));
    }

    #[test]
    fn test_stop_is_idempotent_and_silences_hooks() {
        let (observer, mut rx) = ChannelObserver::new();
        let session = handle(Arc::new(observer));
        session.begin();
        session.record(Message::narrator("scene"));

        assert!(session.stop());
        let after_first = (session.status(), session.messages(), session.eliminated(), session.outcome());
        assert!(!session.stop());
        let after_second = (session.status(), session.messages(), session.eliminated(), session.outcome());
        assert_eq!(after_first, after_second);

        assert_eq!(session.status(), SessionStatus::Stopped);
        assert!(session.messages().is_empty());
        assert!(session.cancellation().is_cancelled());
        assert!(!session.record(Message::narrator("late")));
        assert!(session.eliminate_one().is_none());
        assert_eq!(
            session.commit_turn(Message::persona(PersonaName::Mage, "late"), PersonaName::Mage).unwrap(),
            TurnCommit::Inactive
        );

        assert!(matches!(rx.try_recv().unwrap(), SessionEvent::Message(_)));
        assert!(matches!(rx.try_recv().unwrap(), SessionEvent::Ended(o) if o.status == SessionStatus::Stopped));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_finish_keeps_buffer_and_first_status_wins() {
        let session = handle(Arc::new(NoopObserver));
        session.begin();
        session.record(Message::narrator("scene"));
        session.finish(SessionStatus::Aborted, Some("boom".to_string()));
        session.finish(SessionStatus::Completed, None);

        let outcome = session.outcome().unwrap();
        assert_eq!(outcome.status, SessionStatus::Aborted);
        assert_eq!(outcome.error.as_deref(), Some("boom"));
        assert_eq!(session.messages().len(), 1);

        session.stop();
        assert_eq!(session.status(), SessionStatus::Aborted);
        assert!(session.messages().is_empty());
    }

    #[tokio::test]
    async fn test_wait_returns_outcome() {
        let session = Arc::new(handle(Arc::new(NoopObserver)));
        session.begin();
        let waiter = {
            let session = session.clone();
            tokio::spawn(async move { session.wait().await })
        };
        tokio::task::yield_now().await;
        session.stop();
        let outcome = waiter.await.unwrap();
        assert_eq!(outcome.status, SessionStatus::Stopped);
    }
}
