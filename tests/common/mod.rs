//! Common test utilities and fixtures
//!
//! Shared fixture paths and a ready-to-run offline controller.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use war_council::backend::MockBackend;
use war_council::council::{
    ChannelObserver, ControllerSettings, GraphSettings, SchedulerSettings, SessionController, SessionEvent,
};

/// Get the path to the test fixtures directory
pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

/// Get a path to a specific fixture file
pub fn fixture_path(name: &str) -> PathBuf {
    fixtures_dir().join(name)
}

/// Get the valid config fixture path
pub fn valid_config_fixture() -> PathBuf {
    fixture_path("valid_config.toml")
}

/// Get the invalid config fixture path
pub fn invalid_config_fixture() -> PathBuf {
    fixture_path("invalid_config.toml")
}

/// Unpaced settings with a turn ceiling and no eliminations
pub fn fast_settings(max_turns: u64) -> ControllerSettings {
    ControllerSettings {
        graph: GraphSettings {
            max_turns,
            ..GraphSettings::default().without_pacing()
        },
        scheduler: SchedulerSettings {
            enabled: false,
            ..SchedulerSettings::default()
        },
        max_duration: None,
        seed: Some(7),
    }
}

/// Controller over the mock backend that forwards every event to a channel
pub fn observed_controller(
    backend: MockBackend,
    settings: ControllerSettings,
) -> (SessionController, UnboundedReceiver<SessionEvent>) {
    let (observer, rx) = ChannelObserver::new();
    let controller = SessionController::new(Arc::new(backend), settings).with_observer(Arc::new(observer));
    (controller, rx)
}

/// Drain everything currently queued on an event channel
pub fn drain(rx: &mut UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Per-turn latency for mocks that must still be mid-session when a test acts
pub const SLOW_TURN: Duration = Duration::from_millis(20);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixtures_dir_exists() {
        assert!(fixtures_dir().exists(), "Fixtures directory should exist");
    }

    #[test]
    fn test_valid_config_exists() {
        assert!(valid_config_fixture().exists(), "Valid config fixture should exist");
    }

    #[test]
    fn test_invalid_config_exists() {
        assert!(invalid_config_fixture().exists(), "Invalid config fixture should exist");
    }
}
