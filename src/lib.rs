//! War Council - turn orchestration for a timed multi-persona debate
//!
//! Ten personas argue over an opening scene written by a narrator. One of
//! them is secretly an impostor. A router picks each next speaker with a
//! bias towards whoever has been quiet the longest, and a timer removes
//! one non-impostor advisor per interval until the session stops.

pub mod backend;
pub mod config;
pub mod council;
pub mod error;
pub mod logging;
pub mod persona;
pub mod version;

pub use config::CouncilConfig;
pub use council::{SessionController, SessionHandle, SessionOutcome, SessionStatus};
pub use error::{Error, ErrorCode, Result};
pub use persona::{PersonaName, RoleRegistry};
