//! Backend trait definitions
//!
//! Defines the `TextGenerator` capability consumed by the turn engine: given
//! role-tagged messages, return a text reply.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

// ─────────────────────────────────────────────────────────────────
// Request / Response Types
// ─────────────────────────────────────────────────────────────────

/// Role of a message sent to the generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatRole::System => write!(f, "system"),
            ChatRole::User => write!(f, "user"),
            ChatRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// One entry of the prompt handed to the generator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: ChatRole::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into() }
    }
}

/// Token accounting reported by a backend, when available
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// A generated reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    /// Raw reply text, untrimmed
    pub content: String,

    /// Token usage, if the backend reports it
    pub usage: Option<TokenUsage>,
}

impl Generation {
    pub fn text(content: impl Into<String>) -> Self {
        Self { content: content.into(), usage: None }
    }
}

// ─────────────────────────────────────────────────────────────────
// TextGenerator Trait
// ─────────────────────────────────────────────────────────────────

/// Text-generation capability
///
/// Implementations may retry internally; whatever they finally return is
/// treated by the turn engine as the single answer for that turn.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Backend name (e.g. "openai", "mock")
    fn name(&self) -> &'static str;

    /// Produce a reply for the given conversation
    async fn generate(&self, messages: &[ChatMessage]) -> Result<Generation>;
}

/// Type alias for a shared generator reference
pub type SharedGenerator = Arc<dyn TextGenerator>;
