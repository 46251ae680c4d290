//! Core types for the persona system.
//!
//! A session always seats the same ten council members. Exactly one of them is
//! secretly the impostor for the lifetime of a session.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

// ─────────────────────────────────────────────────────────────────
// Persona Name
// ─────────────────────────────────────────────────────────────────

/// The closed set of council members, in canonical registry order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PersonaName {
    General,
    Diplomat,
    Treasurer,
    Spymaster,
    Blacksmith,
    Mage,
    Healer,
    Strategist,
    Tactician,
    Architect,
}

impl PersonaName {
    /// All personas in registry order. The position in this slice is the
    /// persona's index everywhere else in the engine.
    pub fn all() -> &'static [PersonaName] {
        &[
            PersonaName::General,
            PersonaName::Diplomat,
            PersonaName::Treasurer,
            PersonaName::Spymaster,
            PersonaName::Blacksmith,
            PersonaName::Mage,
            PersonaName::Healer,
            PersonaName::Strategist,
            PersonaName::Tactician,
            PersonaName::Architect,
        ]
    }

    /// Display name, also used as the `name` tag on messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            PersonaName::General => "General",
            PersonaName::Diplomat => "Diplomat",
            PersonaName::Treasurer => "Treasurer",
            PersonaName::Spymaster => "Spymaster",
            PersonaName::Blacksmith => "Blacksmith",
            PersonaName::Mage => "Mage",
            PersonaName::Healer => "Healer",
            PersonaName::Strategist => "Strategist",
            PersonaName::Tactician => "Tactician",
            PersonaName::Architect => "Architect",
        }
    }

    /// Position in the registry order.
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for PersonaName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PersonaName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PersonaName::all()
            .iter()
            .copied()
            .find(|name| name.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::UnknownPersona(s.to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────
// Persona Definition
// ─────────────────────────────────────────────────────────────────

/// Immutable description of one council member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersonaDefinition {
    pub name: PersonaName,

    /// Character text used verbatim in the persona's own prompt.
    pub personality: &'static str,

    /// Extra directive folded into the prompt only when this persona is the
    /// session's impostor.
    pub impostor_prompt: &'static str,

    /// Short line other personas see, telling them when to address this one.
    pub help_text: &'static str,
}

// ─────────────────────────────────────────────────────────────────
// Session Role Set
// ─────────────────────────────────────────────────────────────────

/// A persona as seated in one particular session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRole {
    pub definition: PersonaDefinition,
    pub is_impostor: bool,
}

impl SessionRole {
    pub fn name(&self) -> PersonaName {
        self.definition.name
    }
}

/// Per-session view of the registry with exactly one impostor marked.
#[derive(Debug, Clone)]
pub struct SessionRoleSet {
    roles: Vec<SessionRole>,
    impostor: PersonaName,
}

impl SessionRoleSet {
    pub(crate) fn new(definitions: &[PersonaDefinition], impostor_index: usize) -> Self {
        let roles: Vec<SessionRole> = definitions
            .iter()
            .enumerate()
            .map(|(index, definition)| SessionRole {
                definition: definition.clone(),
                is_impostor: index == impostor_index,
            })
            .collect();
        let impostor = roles[impostor_index].name();

        Self { roles, impostor }
    }

    /// All seated roles in registry order.
    pub fn roles(&self) -> &[SessionRole] {
        &self.roles
    }

    /// Look up a seated role by name.
    pub fn get(&self, name: PersonaName) -> Option<&SessionRole> {
        self.roles.iter().find(|role| role.name() == name)
    }

    /// The persona carrying the impostor flag.
    pub fn impostor(&self) -> PersonaName {
        self.impostor
    }

    /// Persona names in registry order.
    pub fn names(&self) -> Vec<PersonaName> {
        self.roles.iter().map(SessionRole::name).collect()
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
