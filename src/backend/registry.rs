//! Backend selection
//!
//! Maps the configured backend kind onto a concrete `TextGenerator`.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::BackendSettings;
use crate::error::{Error, Result};

use super::{MockBackend, OpenAiBackend, OpenAiConfig, SharedGenerator};

// ─────────────────────────────────────────────────────────────────
// Backend Kind
// ─────────────────────────────────────────────────────────────────

/// Supported backend types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// OpenAI-compatible API backend
    #[default]
    OpenAi,
    /// Scripted backend (tests, offline runs)
    Mock,
}

impl BackendKind {
    /// Get all backend kinds
    pub fn all() -> &'static [BackendKind] {
        &[BackendKind::OpenAi, BackendKind::Mock]
    }

    /// Get the backend name
    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::OpenAi => "openai",
            BackendKind::Mock => "mock",
        }
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(BackendKind::OpenAi),
            "mock" => Ok(BackendKind::Mock),
            other => Err(Error::config_field_invalid(
                "backend.kind",
                format!("unknown backend '{}', expected one of: openai, mock", other),
            )),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ─────────────────────────────────────────────────────────────────
// Backend Factory
// ─────────────────────────────────────────────────────────────────

/// Create the text generator described by `settings`
pub fn create_backend(settings: &BackendSettings) -> Result<SharedGenerator> {
    let backend: SharedGenerator = match settings.kind {
        BackendKind::OpenAi => Arc::new(OpenAiBackend::new(OpenAiConfig::from(settings))?),
        BackendKind::Mock => Arc::new(MockBackend::new()),
    };

    tracing::info!(backend = backend.name(), "Text generation backend ready");
    Ok(backend)
}

impl From<&BackendSettings> for OpenAiConfig {
    fn from(settings: &BackendSettings) -> Self {
        Self {
            base_url: settings.base_url.clone(),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            timeout_secs: settings.timeout_secs,
            max_retries: settings.max_retries,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_names() {
        assert_eq!(BackendKind::OpenAi.name(), "openai");
        assert_eq!(BackendKind::Mock.name(), "mock");
        assert_eq!(BackendKind::all().len(), 2);
    }

    #[test]
    fn test_backend_kind_from_str() {
        assert_eq!("OpenAI".parse::<BackendKind>().unwrap(), BackendKind::OpenAi);
        assert_eq!("mock".parse::<BackendKind>().unwrap(), BackendKind::Mock);
        assert!("vulkan".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_create_mock_backend() {
        let settings = BackendSettings {
            kind: BackendKind::Mock,
            ..Default::default()
        };
        let backend = create_backend(&settings).unwrap();
        assert_eq!(backend.name(), "mock");
    }

    #[test]
    fn test_openai_config_from_settings() {
        let settings = BackendSettings {
            model: "mistral".to_string(),
            max_retries: 1,
            ..Default::default()
        };
        let config = OpenAiConfig::from(&settings);
        assert_eq!(config.model, "mistral");
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.base_url, settings.base_url);
    }
}
