//! Error types for War Council
//!
//! Provides structured error handling with:
//! - Numeric error codes for machine parsing
//! - User-friendly messages with suggestions
//! - Exit codes for CLI

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for council operations
pub type Result<T> = std::result::Result<T, Error>;

/// Numeric error codes for machine parsing and documentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    // Configuration errors (1xx)
    ConfigNotFound = 100,
    ConfigParseError = 101,
    ConfigValidation = 102,

    // IO errors (2xx)
    IoRead = 200,
    IoWrite = 201,
    IoPermission = 202,
    IoNotFound = 203,

    // Session errors (3xx)
    IndexOutOfRange = 300,
    NoEligibleCandidates = 301,
    UnknownPersona = 302,
    SessionNotActive = 303,
    HookFailed = 304,

    // Generation errors (4xx)
    GenerationFailed = 400,
    BackendUnavailable = 401,

    // Internal errors (9xx)
    InternalError = 900,
}

impl ErrorCode {
    /// Get the string code (e.g., "E300")
    pub fn as_str(&self) -> String {
        format!("E{}", *self as u16)
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        match *self as u16 {
            100..=199 => 10,
            200..=299 => 20,
            300..=399 => 30,
            400..=499 => 40,
            900..=999 => 90,
            _ => 1,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for the council engine
#[derive(Error, Debug)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Configuration parse error
    #[error("Failed to parse configuration: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<toml::de::Error>,
    },

    /// Configuration validation error
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String, field: Option<String> },

    /// Generic configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    // ─────────────────────────────────────────────────────────────
    // IO Errors
    // ─────────────────────────────────────────────────────────────

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),

    // ─────────────────────────────────────────────────────────────
    // Session Errors
    // ─────────────────────────────────────────────────────────────

    /// Impostor index outside the persona catalog
    #[error("Impostor index {index} is out of range (expected 0..{count})")]
    IndexOutOfRange { index: usize, count: usize },

    /// Router was asked to pick a speaker with nobody left to address
    #[error("No eligible persona left to address besides {exclude}")]
    NoEligibleCandidates { exclude: String },

    /// Name does not match any persona in the catalog
    #[error("Unknown persona: {0}")]
    UnknownPersona(String),

    /// Operation requires a live session
    #[error("No conversation session is active")]
    SessionNotActive,

    /// A broadcast hook reported a failure
    #[error("Hook '{hook}' failed: {message}")]
    HookFailed { hook: String, message: String },

    // ─────────────────────────────────────────────────────────────
    // Generation Errors
    // ─────────────────────────────────────────────────────────────

    /// The text-generation capability failed to produce a reply
    #[error("Text generation failed for {speaker}: {message}")]
    GenerationFailed { speaker: String, message: String },

    /// The text-generation backend could not be constructed
    #[error("Backend '{backend}' unavailable: {message}")]
    BackendUnavailable { backend: String, message: String },

    // ─────────────────────────────────────────────────────────────
    // Internal Errors
    // ─────────────────────────────────────────────────────────────

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Get the numeric error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::ConfigNotFound { .. } => ErrorCode::ConfigNotFound,
            Error::ConfigParse { .. } => ErrorCode::ConfigParseError,
            Error::ConfigValidation { .. } => ErrorCode::ConfigValidation,
            Error::Config(_) => ErrorCode::ConfigValidation,

            Error::Io(e) => match e.kind() {
                std::io::ErrorKind::NotFound => ErrorCode::IoNotFound,
                std::io::ErrorKind::PermissionDenied => ErrorCode::IoPermission,
                _ => ErrorCode::IoRead,
            },
            Error::Toml(_) => ErrorCode::IoWrite,

            Error::IndexOutOfRange { .. } => ErrorCode::IndexOutOfRange,
            Error::NoEligibleCandidates { .. } => ErrorCode::NoEligibleCandidates,
            Error::UnknownPersona(_) => ErrorCode::UnknownPersona,
            Error::SessionNotActive => ErrorCode::SessionNotActive,
            Error::HookFailed { .. } => ErrorCode::HookFailed,

            Error::GenerationFailed { .. } => ErrorCode::GenerationFailed,
            Error::BackendUnavailable { .. } => ErrorCode::BackendUnavailable,

            Error::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Whether retrying the whole session could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::GenerationFailed { .. } | Error::Io(_))
    }

    /// Whether the error means the process cannot continue
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::ConfigNotFound { .. }
                | Error::ConfigParse { .. }
                | Error::ConfigValidation { .. }
                | Error::Config(_)
                | Error::BackendUnavailable { .. }
                | Error::Internal(_)
        )
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        self.code().exit_code()
    }

    /// Get a user-friendly suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::ConfigNotFound { .. } => Some(
                "Run 'war-council config init' to create a default configuration file.",
            ),
            Error::ConfigParse { .. } => Some(
                "Check your configuration file syntax. Run 'war-council config validate' to see details.",
            ),
            Error::ConfigValidation { .. } | Error::Config(_) => Some(
                "Review the configuration file and fix the invalid values.",
            ),
            Error::IndexOutOfRange { .. } => Some(
                "Run 'war-council personas' to see the valid impostor indexes.",
            ),
            Error::UnknownPersona(_) => Some(
                "Persona names are case-insensitive; run 'war-council personas' for the full list.",
            ),
            Error::GenerationFailed { .. } => Some(
                "Check that the text generation server is reachable and the model name is correct.",
            ),
            Error::BackendUnavailable { .. } => Some(
                "Check the [backend] section of your configuration, or pass --mock to run offline.",
            ),
            _ => None,
        }
    }

    /// Format the error for terminal display with colors
    pub fn format_for_terminal(&self) -> String {
        let mut output = format!("\x1b[31mError [{}]\x1b[0m: {}\n", self.code().as_str(), self);

        if let Some(hint) = self.suggestion() {
            output.push_str(&format!("\n\x1b[33mHint\x1b[0m: {}\n", hint));
        }

        output
    }

    /// Format the error for logging (no colors)
    pub fn format_for_log(&self) -> String {
        format!("[{}] {}", self.code().as_str(), self)
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    /// Create a config validation error with field name
    pub fn config_field_invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a generation failure attributed to a speaker
    pub fn generation_failed(speaker: impl fmt::Display, message: impl Into<String>) -> Self {
        Error::GenerationFailed {
            speaker: speaker.to_string(),
            message: message.into(),
        }
    }

    /// Create a hook failure
    pub fn hook_failed(hook: impl Into<String>, message: impl Into<String>) -> Self {
        Error::HookFailed {
            hook: hook.into(),
            message: message.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
