//! Persona catalog: the council members and their per-session roles.

mod registry;
mod types;

pub use registry::RoleRegistry;
pub use types::{PersonaDefinition, PersonaName, SessionRole, SessionRoleSet};
