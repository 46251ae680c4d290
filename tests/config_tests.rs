//! Configuration system tests
//!
//! Tests configuration loading, validation, and environment overrides

mod common;

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use war_council::backend::BackendKind;
use war_council::config::{generate_default_config, CouncilConfig};
use war_council::error::{Error, ErrorCode};

/// Test fixture for configuration testing
struct ConfigFixture {
    _temp_dir: TempDir,
    config_path: PathBuf,
}

impl ConfigFixture {
    fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("council.toml");
        Self {
            _temp_dir: temp_dir,
            config_path,
        }
    }

    fn write_config(&self, content: &str) {
        fs::write(&self.config_path, content).unwrap();
    }

    fn path(&self) -> &str {
        self.config_path.to_str().unwrap()
    }
}

fn council_cmd() -> Command {
    Command::cargo_bin("war-council").unwrap()
}

// ─────────────────────────────────────────────────────────────────
// Library Loading Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_fixture_config_loads() {
    let config = CouncilConfig::from_file(&common::valid_config_fixture()).unwrap();
    assert_eq!(config.session.max_turns, 8);
    assert_eq!(config.session.impostor_index, Some(3));
    assert_eq!(config.backend.kind, BackendKind::Mock);
    assert!(!config.elimination.enabled);
    assert!(config.validate().is_ok());

    let settings = config.controller_settings();
    assert_eq!(settings.graph.max_turns, 8);
    assert_eq!(settings.graph.min_turn_delay, Duration::ZERO);
    assert_eq!(settings.max_duration, None);
    assert_eq!(settings.seed, Some(42));
}

#[test]
fn test_invalid_fixture_fails_validation() {
    let config = CouncilConfig::from_file(&common::invalid_config_fixture()).unwrap();
    let err = config.validate().unwrap_err();
    assert_eq!(err.code(), ErrorCode::ConfigValidation);
}

#[test]
fn test_generated_default_config_parses() {
    let fixture = ConfigFixture::new();
    fixture.write_config(&generate_default_config());

    let config = CouncilConfig::from_file(&fixture.config_path).unwrap();
    assert!(config.validate().is_ok());
    assert_eq!(config.elimination.warmup_secs, 240);
    assert_eq!(config.elimination.interval_secs, 60);
    assert_eq!(config.elimination.max_eliminations, 5);
}

#[test]
fn test_missing_explicit_path_is_not_found() {
    let err = CouncilConfig::load(Some("/nonexistent/council.toml")).unwrap_err();
    assert!(matches!(err, Error::ConfigNotFound { .. }));
    assert_eq!(err.exit_code(), 10);
}

#[test]
fn test_malformed_toml_is_parse_error() {
    let fixture = ConfigFixture::new();
    fixture.write_config("[session\nmax_turns = 3\n");

    let err = CouncilConfig::from_file(&fixture.config_path).unwrap_err();
    assert_eq!(err.code(), ErrorCode::ConfigParseError);
}

// ─────────────────────────────────────────────────────────────────
// Valid Configuration Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_minimal_config() {
    let fixture = ConfigFixture::new();
    fixture.write_config(
        r#"
[session]

[backend]
"#,
    );

    council_cmd()
        .arg("config")
        .arg("validate")
        .arg("--config")
        .arg(fixture.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"));
}

#[test]
fn test_full_config() {
    let fixture = ConfigFixture::new();
    fixture.write_config(
        r#"
[session]
max_turns = 200
context_window = 8
max_duration_secs = 900
impostor_index = 9
seed = 1234

[pacing]
min_turn_delay_ms = 2000
max_turn_delay_ms = 4000

[elimination]
enabled = true
warmup_secs = 120
interval_secs = 30
max_eliminations = 4

[backend]
kind = "openai"
base_url = "https://api.together.xyz/v1"
api_key = "test-key"
model = "meta-llama/Meta-Llama-3.1-70B-Instruct-Turbo"
temperature = 0.7
max_tokens = 200
timeout_secs = 60
max_retries = 2

[logging]
level = "debug"
file = "/tmp/council.log"
max_file_size_mb = 50
max_files = 3
json_format = false
"#,
    );

    council_cmd()
        .arg("config")
        .arg("validate")
        .arg("--config")
        .arg(fixture.path())
        .assert()
        .success();
}

// ─────────────────────────────────────────────────────────────────
// Invalid Configuration Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_invalid_impostor_index() {
    let fixture = ConfigFixture::new();
    fixture.write_config("[session]\nimpostor_index = 10\n");

    council_cmd()
        .arg("config")
        .arg("validate")
        .arg("--config")
        .arg(fixture.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("impostor_index"));
}

#[test]
fn test_inverted_pacing_range() {
    let fixture = ConfigFixture::new();
    fixture.write_config("[pacing]\nmin_turn_delay_ms = 5000\nmax_turn_delay_ms = 1000\n");

    council_cmd()
        .arg("config")
        .arg("validate")
        .arg("--config")
        .arg(fixture.path())
        .assert()
        .failure();
}

#[test]
fn test_invalid_base_url() {
    let fixture = ConfigFixture::new();
    fixture.write_config("[backend]\nkind = \"openai\"\nbase_url = \"ftp://models.example.com\"\n");

    council_cmd()
        .arg("config")
        .arg("validate")
        .arg("--config")
        .arg(fixture.path())
        .assert()
        .failure();
}

#[test]
fn test_unknown_backend_kind() {
    let fixture = ConfigFixture::new();
    fixture.write_config("[backend]\nkind = \"carrier-pigeon\"\n");

    council_cmd()
        .arg("config")
        .arg("validate")
        .arg("--config")
        .arg(fixture.path())
        .assert()
        .failure();
}

#[test]
fn test_invalid_log_level() {
    let fixture = ConfigFixture::new();
    fixture.write_config("[logging]\nlevel = \"invalid_level\"\n");

    council_cmd()
        .arg("config")
        .arg("validate")
        .arg("--config")
        .arg(fixture.path())
        .assert()
        .failure();
}

#[test]
fn test_malformed_toml() {
    let fixture = ConfigFixture::new();
    fixture.write_config("[session\nmax_turns = 3\n");

    council_cmd()
        .arg("config")
        .arg("validate")
        .arg("--config")
        .arg(fixture.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("E101"));
}

// ─────────────────────────────────────────────────────────────────
// Config Show Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_config_show_custom() {
    let fixture = ConfigFixture::new();
    fixture.write_config(
        r#"
[session]
max_turns = 77

[backend]
model = "mistral-nemo"
"#,
    );

    council_cmd()
        .arg("config")
        .arg("show")
        .arg("--config")
        .arg(fixture.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("max_turns = 77"))
        .stdout(predicate::str::contains("mistral-nemo"));
}

// ─────────────────────────────────────────────────────────────────
// Config Init Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_config_init_creates_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("nested").join("council.toml");

    council_cmd()
        .arg("config")
        .arg("init")
        .arg("--path")
        .arg(config_path.to_str().unwrap())
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration written to"));

    assert!(config_path.exists());

    council_cmd()
        .arg("config")
        .arg("validate")
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .assert()
        .success();
}

#[test]
fn test_config_init_refuses_overwrite() {
    let fixture = ConfigFixture::new();
    fixture.write_config("[session]\n");

    council_cmd()
        .arg("config")
        .arg("init")
        .arg("--path")
        .arg(fixture.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_config_init_force_overwrite() {
    let fixture = ConfigFixture::new();
    fixture.write_config("[backend]\nmodel = \"old-model\"\n");

    council_cmd()
        .arg("config")
        .arg("init")
        .arg("--path")
        .arg(fixture.path())
        .arg("--force")
        .assert()
        .success();

    let content = fs::read_to_string(fixture.path()).unwrap();
    assert!(!content.contains("old-model"));
}

// ─────────────────────────────────────────────────────────────────
// Environment Variable Override Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_env_override_model() {
    let fixture = ConfigFixture::new();
    fixture.write_config("[backend]\nmodel = \"file-model\"\n");

    council_cmd()
        .arg("config")
        .arg("show")
        .arg("--config")
        .arg(fixture.path())
        .env("COUNCIL_MODEL", "env-model")
        .assert()
        .success()
        .stdout(predicate::str::contains("env-model"))
        .stdout(predicate::str::contains("file-model").not());
}

#[test]
fn test_env_override_session_limits() {
    council_cmd()
        .arg("config")
        .arg("show")
        .env("COUNCIL_MAX_TURNS", "321")
        .env("COUNCIL_ELIMINATION_INTERVAL_SECS", "45")
        .assert()
        .success()
        .stdout(predicate::str::contains("max_turns = 321"))
        .stdout(predicate::str::contains("interval_secs = 45"));
}

#[test]
fn test_env_override_is_validated() {
    council_cmd()
        .arg("config")
        .arg("validate")
        .env("COUNCIL_IMPOSTOR_INDEX", "11")
        .assert()
        .failure();
}

// ─────────────────────────────────────────────────────────────────
// Path Expansion Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_tilde_expansion() {
    let fixture = ConfigFixture::new();
    fixture.write_config("[logging]\nfile = \"~/war-council/council.log\"\n");

    let output = council_cmd()
        .arg("config")
        .arg("show")
        .arg("--config")
        .arg(fixture.path())
        .assert()
        .success();

    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    assert!(stdout.contains("council.log"));
    assert!(!stdout.contains("file = \"~"));
}
