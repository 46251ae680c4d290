//! Conversation log entries.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::persona::PersonaName;

/// Name under which the opening narrative is recorded.
pub const NARRATOR: &str = "Narrator";

/// Role tag carried by every logged message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    Assistant,
    Human,
}

/// Who produced a message.
///
/// The narrator is not a persona: it cannot be routed to and has no
/// definition in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Speaker {
    Narrator,
    Persona(PersonaName),
}

impl Speaker {
    pub fn as_str(&self) -> &'static str {
        match self {
            Speaker::Narrator => NARRATOR,
            Speaker::Persona(name) => name.as_str(),
        }
    }

    pub fn persona(&self) -> Option<PersonaName> {
        match self {
            Speaker::Narrator => None,
            Speaker::Persona(name) => Some(*name),
        }
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<PersonaName> for Speaker {
    fn from(name: PersonaName) -> Self {
        Speaker::Persona(name)
    }
}

impl From<Speaker> for String {
    fn from(speaker: Speaker) -> Self {
        speaker.as_str().to_string()
    }
}

impl TryFrom<String> for Speaker {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.eq_ignore_ascii_case(NARRATOR) {
            Ok(Speaker::Narrator)
        } else {
            value.parse::<PersonaName>().map(Speaker::Persona)
        }
    }
}

/// One entry of the session's conversation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    pub name: Speaker,
}

impl Message {
    /// The opening scene, attributed to the narrator.
    pub fn narrator(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
            name: Speaker::Narrator,
        }
    }

    /// A persona's reply for one turn.
    pub fn persona(name: PersonaName, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Human,
            content: content.into(),
            name: Speaker::Persona(name),
        }
    }

    pub fn speaker(&self) -> Speaker {
        self.name
    }

    pub fn is_narrator(&self) -> bool {
        self.name == Speaker::Narrator
    }
}
