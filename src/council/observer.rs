//! Broadcast hooks towards whatever transport sits in front of a session.
//!
//! Hooks run while the session lock is held so that nothing is broadcast
//! after a stop. Implementations must return quickly and must not call back
//! into the session.

use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::persona::PersonaName;

use super::message::Message;
use super::session::SessionOutcome;

/// Receives session events. Delivery is at-most-once; a failing hook is
/// logged and otherwise ignored.
pub trait SessionObserver: Send + Sync {
    fn on_message(&self, message: &Message) -> Result<()>;

    fn on_elimination(&self, name: PersonaName) -> Result<()>;

    fn on_session_end(&self, _outcome: &SessionOutcome) -> Result<()> {
        Ok(())
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {
    fn on_message(&self, _message: &Message) -> Result<()> {
        Ok(())
    }

    fn on_elimination(&self, _name: PersonaName) -> Result<()> {
        Ok(())
    }
}

/// Event forwarded by [`ChannelObserver`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    Message(Message),
    Elimination { name: PersonaName },
    Ended(SessionOutcome),
}

/// Forwards events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, hook: &str, event: SessionEvent) -> Result<()> {
        self.tx
            .send(event)
            .map_err(|_| Error::hook_failed(hook, "event receiver dropped"))
    }
}

impl SessionObserver for ChannelObserver {
    fn on_message(&self, message: &Message) -> Result<()> {
        self.send("on_message", SessionEvent::Message(message.clone()))
    }

    fn on_elimination(&self, name: PersonaName) -> Result<()> {
        self.send("on_elimination", SessionEvent::Elimination { name })
    }

    fn on_session_end(&self, outcome: &SessionOutcome) -> Result<()> {
        self.send("on_session_end", SessionEvent::Ended(outcome.clone()))
    }
}
