//! Configuration system for War Council
//!
//! Supports multiple configuration sources with the following precedence (highest to lowest):
//! 1. CLI arguments
//! 2. Environment variables (COUNCIL_* prefix)
//! 3. Configuration file (TOML)
//! 4. Default values

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::backend::BackendKind;
use crate::council::{ControllerSettings, GraphSettings, SchedulerSettings};
use crate::error::{Error, Result};
use crate::persona::PersonaName;

/// Upper bound on backend retries; backoff doubles per attempt
const MAX_RETRIES: u32 = 10;

/// Main council configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CouncilConfig {
    /// Session limits and reproducibility
    pub session: SessionSettings,

    /// Artificial delay between turns
    pub pacing: PacingSettings,

    /// Elimination timer
    pub elimination: EliminationSettings,

    /// Text generation backend
    pub backend: BackendSettings,

    /// Logging configuration
    pub logging: LoggingSettings,
}

/// Session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Safety ceiling on persona turns
    pub max_turns: u64,

    /// Recent persona messages included in each prompt
    pub context_window: usize,

    /// Stop the session after this many seconds (0 = never)
    pub max_duration_secs: u64,

    /// Fixed impostor (0-9); drawn at random when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impostor_index: Option<usize>,

    /// RNG seed for reproducible sessions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

/// Turn pacing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingSettings {
    /// Shortest pause before a turn in milliseconds
    pub min_turn_delay_ms: u64,

    /// Longest pause before a turn in milliseconds
    pub max_turn_delay_ms: u64,
}

/// Elimination timer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EliminationSettings {
    /// Enable eliminations
    pub enabled: bool,

    /// Seconds before the first interval starts
    pub warmup_secs: u64,

    /// Seconds between eliminations
    pub interval_secs: u64,

    /// Number of elimination ticks
    pub max_eliminations: u32,
}

/// Text generation backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    /// Backend kind: openai or mock
    pub kind: BackendKind,

    /// API base URL (e.g., "https://api.together.xyz/v1", "http://localhost:11434/v1")
    pub base_url: String,

    /// API key (empty string for local servers like Ollama)
    pub api_key: String,

    /// Model identifier
    pub model: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Cap on reply tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum retries on transient failures
    pub max_retries: u32,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Log file path (empty = no file logging)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Maximum log file size in MB before rotation
    pub max_file_size_mb: u64,

    /// Number of rotated log files to keep
    pub max_files: u32,

    /// Enable JSON formatted logging
    pub json_format: bool,
}

// Default implementations

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_turns: 1000,
            context_window: 12,
            max_duration_secs: 600,
            impostor_index: None,
            seed: None,
        }
    }
}

impl Default for PacingSettings {
    fn default() -> Self {
        Self {
            min_turn_delay_ms: 10_000,
            max_turn_delay_ms: 20_000,
        }
    }
}

impl Default for EliminationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            warmup_secs: 240,
            interval_secs: 60,
            max_eliminations: 5,
        }
    }
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            kind: BackendKind::OpenAi,
            base_url: "http://localhost:11434/v1".to_string(),
            api_key: String::new(),
            model: "llama3.1".to_string(),
            temperature: 0.3,
            max_tokens: Some(256),
            timeout_secs: 120,
            max_retries: 3,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            max_file_size_mb: 100,
            max_files: 5,
            json_format: false,
        }
    }
}

impl CouncilConfig {
    /// Load configuration from file with environment variable overrides
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = Self::default();

        // 1. Load from config file if it exists
        if let Some(path) = Self::find_config_file(config_path)? {
            debug!(path = %path.display(), "Loading configuration file");
            config = Self::from_file(&path)?;
            info!(path = %path.display(), "Configuration loaded from file");
        }

        // 2. Apply environment variable overrides
        config.apply_env_overrides();

        // 3. Expand paths
        config.expand_paths();

        // 4. Validate
        config.validate()?;

        Ok(config)
    }

    /// Parse a configuration file without overrides or validation
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| Error::ConfigParse {
            message: format!("{}: {}", path.display(), e.message()),
            source: Some(e),
        })
    }

    /// Find the configuration file to use
    fn find_config_file(explicit_path: Option<&str>) -> Result<Option<PathBuf>> {
        // If explicit path provided, use it (error if not found)
        if let Some(path) = explicit_path {
            let path = PathBuf::from(expand_path(path));
            if path.exists() {
                return Ok(Some(path));
            }
            return Err(Error::ConfigNotFound { path });
        }

        // Search in standard locations
        let search_paths = [
            // Current directory
            Some(PathBuf::from("war-council.toml")),
            Some(PathBuf::from("config.toml")),
            // User config directory
            dirs::config_dir().map(|p| p.join("war-council").join("council.toml")),
            // Home directory
            dirs::home_dir().map(|p| p.join(".war-council").join("council.toml")),
        ];

        for path in search_paths.iter().flatten() {
            if path.exists() {
                debug!(path = %path.display(), "Found configuration file");
                return Ok(Some(path.clone()));
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(None)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // Session settings
        if let Some(n) = env_parse("COUNCIL_MAX_TURNS") {
            self.session.max_turns = n;
        }
        if let Some(n) = env_parse("COUNCIL_CONTEXT_WINDOW") {
            self.session.context_window = n;
        }
        if let Some(n) = env_parse("COUNCIL_MAX_DURATION_SECS") {
            self.session.max_duration_secs = n;
        }
        if let Some(n) = env_parse("COUNCIL_IMPOSTOR_INDEX") {
            self.session.impostor_index = Some(n);
        }
        if let Some(n) = env_parse("COUNCIL_SEED") {
            self.session.seed = Some(n);
        }

        // Pacing settings
        if let Some(n) = env_parse("COUNCIL_MIN_TURN_DELAY_MS") {
            self.pacing.min_turn_delay_ms = n;
        }
        if let Some(n) = env_parse("COUNCIL_MAX_TURN_DELAY_MS") {
            self.pacing.max_turn_delay_ms = n;
        }

        // Elimination settings
        if let Some(b) = env_bool("COUNCIL_ELIMINATION_ENABLED") {
            self.elimination.enabled = b;
        }
        if let Some(n) = env_parse("COUNCIL_WARMUP_SECS") {
            self.elimination.warmup_secs = n;
        }
        if let Some(n) = env_parse("COUNCIL_ELIMINATION_INTERVAL_SECS") {
            self.elimination.interval_secs = n;
        }
        if let Some(n) = env_parse("COUNCIL_MAX_ELIMINATIONS") {
            self.elimination.max_eliminations = n;
        }

        // Backend settings
        if let Some(kind) = env_parse("COUNCIL_BACKEND") {
            self.backend.kind = kind;
        }
        if let Ok(val) = std::env::var("COUNCIL_BASE_URL") {
            self.backend.base_url = val;
        }
        if let Ok(val) = std::env::var("COUNCIL_API_KEY") {
            self.backend.api_key = val;
        }
        if let Ok(val) = std::env::var("COUNCIL_MODEL") {
            self.backend.model = val;
        }
        if let Some(t) = env_parse("COUNCIL_TEMPERATURE") {
            self.backend.temperature = t;
        }
        if let Some(n) = env_parse("COUNCIL_TIMEOUT_SECS") {
            self.backend.timeout_secs = n;
        }
        if let Some(n) = env_parse("COUNCIL_MAX_RETRIES") {
            self.backend.max_retries = n;
        }

        // Logging settings
        if let Ok(val) = std::env::var("COUNCIL_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("COUNCIL_LOG_FILE") {
            self.logging.file = Some(val);
        }
        if let Some(b) = env_bool("COUNCIL_LOG_JSON") {
            self.logging.json_format = b;
        }
    }

    /// Expand ~ and other path variables
    fn expand_paths(&mut self) {
        if let Some(ref file) = self.logging.file {
            self.logging.file = Some(expand_path(file));
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        // Validate log level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::config_field_invalid(
                "logging.level",
                format!(
                    "Invalid log level '{}'. Must be one of: {}",
                    self.logging.level,
                    valid_levels.join(", ")
                ),
            ));
        }

        if self.session.max_turns == 0 {
            return Err(Error::config_field_invalid(
                "session.max_turns",
                "max_turns must be at least 1",
            ));
        }

        if let Some(index) = self.session.impostor_index {
            let count = PersonaName::all().len();
            if index >= count {
                return Err(Error::config_field_invalid(
                    "session.impostor_index",
                    format!("impostor_index must be between 0 and {}", count - 1),
                ));
            }
        }

        if self.pacing.min_turn_delay_ms > self.pacing.max_turn_delay_ms {
            return Err(Error::config_field_invalid(
                "pacing.min_turn_delay_ms",
                "min_turn_delay_ms must not exceed max_turn_delay_ms",
            ));
        }

        if self.elimination.enabled && self.elimination.interval_secs == 0 {
            return Err(Error::config_field_invalid(
                "elimination.interval_secs",
                "interval_secs must be greater than 0",
            ));
        }

        if self.backend.kind == BackendKind::OpenAi {
            let url = &self.backend.base_url;
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(Error::config_field_invalid(
                    "backend.base_url",
                    "base_url must start with http:// or https://",
                ));
            }
            if self.backend.model.trim().is_empty() {
                return Err(Error::config_field_invalid("backend.model", "model cannot be empty"));
            }
        }

        if self.backend.max_retries > MAX_RETRIES {
            return Err(Error::config_field_invalid(
                "backend.max_retries",
                format!("max_retries must not exceed {}", MAX_RETRIES),
            ));
        }

        if !(0.0..=2.0).contains(&self.backend.temperature) {
            return Err(Error::config_field_invalid(
                "backend.temperature",
                "temperature must be between 0.0 and 2.0",
            ));
        }

        Ok(())
    }

    /// Turn loop settings
    pub fn graph_settings(&self) -> GraphSettings {
        GraphSettings {
            max_turns: self.session.max_turns,
            context_window: self.session.context_window,
            min_turn_delay: Duration::from_millis(self.pacing.min_turn_delay_ms),
            max_turn_delay: Duration::from_millis(self.pacing.max_turn_delay_ms),
        }
    }

    /// Everything the session controller needs
    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            graph: self.graph_settings(),
            scheduler: SchedulerSettings::from(&self.elimination),
            max_duration: match self.session.max_duration_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            seed: self.session.seed,
        }
    }
}

impl From<&EliminationSettings> for SchedulerSettings {
    fn from(settings: &EliminationSettings) -> Self {
        Self {
            enabled: settings.enabled,
            warmup: Duration::from_secs(settings.warmup_secs),
            interval: Duration::from_secs(settings.interval_secs),
            max_eliminations: settings.max_eliminations,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|val| val.parse().ok())
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|val| val.to_lowercase() == "true" || val == "1")
}

/// Expand ~ and environment variables in paths
fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .unwrap_or_else(|_| std::borrow::Cow::Borrowed(path))
        .into_owned()
}

/// Default location for `config init`
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".war-council")
        .join("council.toml")
}

/// Initialize a new configuration file, returning where it was written
pub fn init_config(path: Option<&str>, force: bool) -> Result<PathBuf> {
    let config_path = path
        .map(|p| PathBuf::from(expand_path(p)))
        .unwrap_or_else(default_config_path);

    // Check if file exists
    if config_path.exists() && !force {
        return Err(Error::Config(format!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    // Create parent directories
    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(&config_path, generate_default_config())?;

    info!(path = %config_path.display(), "Configuration file created");
    Ok(config_path)
}

/// Generate default configuration content with comments
pub fn generate_default_config() -> String {
    r#"# War Council Configuration

[session]
# Safety ceiling on persona turns
max_turns = 1000

# Recent persona messages included in each prompt
context_window = 12

# Stop the session after this many seconds (0 = never)
max_duration_secs = 600

# Fixed impostor, 0-9 in persona order (random when unset)
# impostor_index = 3

# RNG seed for reproducible sessions
# seed = 42

[pacing]
# Random pause before each turn, in milliseconds (both 0 = no pause)
min_turn_delay_ms = 10000
max_turn_delay_ms = 20000

[elimination]
# Remove personas from the debate on a timer
enabled = true

# Seconds before the elimination interval starts
warmup_secs = 240

# Seconds between eliminations
interval_secs = 60

# Number of elimination ticks
max_eliminations = 5

[backend]
# Backend kind: openai (any OpenAI-compatible server) or mock
kind = "openai"

# API base URL (OpenAI, TogetherAI, Ollama, vLLM, LM Studio, etc.)
base_url = "http://localhost:11434/v1"

# API key (leave empty for local servers like Ollama)
api_key = ""

# Model identifier
model = "llama3.1"

# Sampling temperature
temperature = 0.3

# Cap on reply tokens
max_tokens = 256

# Request timeout in seconds
timeout_secs = 120

# Maximum retries on transient failures
max_retries = 3

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log file path (comment out to disable file logging)
# file = "~/.war-council/logs/council.log"

# Maximum log file size in MB before rotation
max_file_size_mb = 100

# Number of rotated log files to keep
max_files = 5

# Enable JSON formatted logging
json_format = false
"#
    .to_string()
}
