//! Backend module for text generation
//!
//! This module provides the abstraction the turn engine talks to and the
//! implementations behind it.

mod traits;
mod registry;
mod mock;
mod openai;

pub use traits::*;
pub use registry::{create_backend, BackendKind};
pub use mock::{MockBackend, MockConfig};
pub use openai::{OpenAiBackend, OpenAiConfig};
