//! Mock backend for testing
//!
//! Provides a scripted implementation of `TextGenerator` so sessions can run
//! without a model server.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{Error, Result};

use super::{ChatMessage, ChatRole, Generation, TextGenerator};

// ─────────────────────────────────────────────────────────────────
// Mock Backend Configuration
// ─────────────────────────────────────────────────────────────────

/// Configuration for mock backend behavior
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Simulated latency per call (ms)
    pub latency_ms: u64,

    /// Fixed response text (for deterministic testing)
    pub fixed_response: Option<String>,

    /// Responses handed out in order, cycling when exhausted
    pub script: Vec<String>,

    /// Fail every call after this many successful ones
    pub fail_after: Option<u32>,
}

// ─────────────────────────────────────────────────────────────────
// Mock Backend
// ─────────────────────────────────────────────────────────────────

/// Mock implementation of `TextGenerator` for testing
///
/// Without a fixed response or script it replies with a short line that
/// addresses the persona named in the last user turn, which is enough to
/// drive a council session end to end.
pub struct MockBackend {
    config: MockConfig,
    calls: RwLock<u32>,
    last_prompt: RwLock<Vec<ChatMessage>>,
}

impl MockBackend {
    /// Create a new mock backend with default configuration
    pub fn new() -> Self {
        Self::with_config(MockConfig::default())
    }

    /// Create a new mock backend with custom configuration
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            config,
            calls: RwLock::new(0),
            last_prompt: RwLock::new(Vec::new()),
        }
    }

    /// Always answer with `text`
    pub fn fixed(text: impl Into<String>) -> Self {
        Self::with_config(MockConfig {
            fixed_response: Some(text.into()),
            ..Default::default()
        })
    }

    /// Answer with each entry of `script` in turn
    pub fn scripted<I, S>(script: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_config(MockConfig {
            script: script.into_iter().map(Into::into).collect(),
            ..Default::default()
        })
    }

    /// Number of times `generate` was called
    pub fn call_count(&self) -> u32 {
        *self.calls.read()
    }

    /// The prompt passed to the most recent call
    pub fn last_prompt(&self) -> Vec<ChatMessage> {
        self.last_prompt.read().clone()
    }

    /// Reset the call counter
    pub fn reset_counts(&self) {
        *self.calls.write() = 0;
    }

    fn generate_response(&self, call_index: u32, messages: &[ChatMessage]) -> String {
        if let Some(ref fixed) = self.config.fixed_response {
            return fixed.clone();
        }

        if !self.config.script.is_empty() {
            let slot = call_index as usize % self.config.script.len();
            return self.config.script[slot].clone();
        }

        let addressee = messages
            .iter()
            .rev()
            .find(|m| m.role == ChatRole::User)
            .and_then(|m| m.content.split_once(':'))
            .map(|(name, _)| name.trim().to_string())
            .filter(|name| !name.is_empty() && name != "Narrator")
            .unwrap_or_else(|| "council".to_string());

        format!("{}, the walls need more men before nightfall.", addressee)
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextGenerator for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn generate(&self, messages: &[ChatMessage]) -> Result<Generation> {
        let call_index = {
            let mut calls = self.calls.write();
            let index = *calls;
            *calls += 1;
            index
        };
        *self.last_prompt.write() = messages.to_vec();

        if self.config.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;
        }

        if let Some(limit) = self.config.fail_after {
            if call_index >= limit {
                return Err(Error::generation_failed("mock", "simulated backend failure"));
            }
        }

        Ok(Generation::text(self.generate_response(call_index, messages)))
    }
}
