//! The turn-orchestration engine.
//!
//! A [`SessionController`] owns one live [`SessionHandle`] at a time. The
//! [`ConversationGraph`] drives turns through [`AgentNode`]s, each of which
//! asks the [`TurnRouter`] who speaks next, while the
//! [`EliminationScheduler`] removes personas on a timer.

mod agent;
mod clock;
mod controller;
mod eligibility;
mod graph;
mod message;
mod observer;
mod router;
mod scheduler;
mod session;

pub use agent::{AgentNode, TurnResult, MAX_REPLY_WORDS};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use controller::{ControllerSettings, SessionController};
pub use eligibility::{EligibilityState, EliminationOutcome};
pub use graph::{ConversationGraph, Destination, GraphExit, GraphSettings};
pub use message::{Message, MessageRole, Speaker, NARRATOR};
pub use observer::{ChannelObserver, NoopObserver, SessionEvent, SessionObserver};
pub use router::{RecencySelector, TurnRouter};
pub use scheduler::{EliminationScheduler, SchedulerPhase, SchedulerReport, SchedulerSettings};
pub use session::{SessionHandle, SessionOutcome, SessionStatus, TurnContext};
