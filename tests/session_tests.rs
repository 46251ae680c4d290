//! End-to-end session tests
//!
//! Drive whole council sessions through the controller against the mock
//! backend and check what an observer would have seen.

mod common;

use std::collections::HashSet;
use std::time::Duration;

use war_council::backend::{MockBackend, MockConfig};
use war_council::council::{ControllerSettings, SessionEvent, SessionStatus, Speaker};
use war_council::error::Error;
use war_council::persona::PersonaName;

use common::{drain, fast_settings, observed_controller, SLOW_TURN};

fn slow_backend() -> MockBackend {
    MockBackend::with_config(MockConfig {
        latency_ms: SLOW_TURN.as_millis() as u64,
        ..Default::default()
    })
}

// ─────────────────────────────────────────────────────────────────
// Conversation Flow
// ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_narrator_opens_and_nobody_speaks_twice_in_a_row() {
    let (controller, mut rx) = observed_controller(MockBackend::new(), fast_settings(30));
    let session = controller.initialize_conversation(Some(3)).await.unwrap();
    assert_eq!(session.impostor(), PersonaName::Spymaster);

    let outcome = controller.wait().await.unwrap();
    assert_eq!(outcome.status, SessionStatus::Completed);
    assert_eq!(outcome.turns, 30);

    let messages = controller.get_messages();
    assert_eq!(messages.len(), 31);
    assert_eq!(messages[0].name, Speaker::Narrator);
    assert!(messages[1..].iter().all(|m| !m.is_narrator()));
    for pair in messages[1..].windows(2) {
        assert_ne!(pair[0].name, pair[1].name, "a persona addressed itself");
    }

    let events = drain(&mut rx);
    assert!(matches!(events.first(), Some(SessionEvent::Message(m)) if m.is_narrator()));
    assert!(matches!(events.last(), Some(SessionEvent::Ended(o)) if o.status == SessionStatus::Completed));
    let broadcast = events
        .iter()
        .filter(|e| matches!(e, SessionEvent::Message(_)))
        .count();
    assert_eq!(broadcast, messages.len());
}

#[tokio::test]
async fn test_messages_by_agent_filters_buffer() {
    let (controller, _rx) = observed_controller(MockBackend::new(), fast_settings(20));
    controller.initialize_conversation(Some(0)).await.unwrap();
    controller.wait().await.unwrap();

    let total: usize = PersonaName::all()
        .iter()
        .map(|name| controller.get_messages_by_agent(name.as_str()).unwrap().len())
        .sum();
    assert_eq!(total, 20);
    assert_eq!(controller.get_messages_by_agent("narrator").unwrap().len(), 1);
    assert!(matches!(
        controller.get_messages_by_agent("Court Jester"),
        Err(Error::UnknownPersona(_))
    ));
}

#[tokio::test]
async fn test_generation_failure_aborts_session() {
    let backend = MockBackend::with_config(MockConfig {
        fail_after: Some(4),
        ..Default::default()
    });
    let (controller, mut rx) = observed_controller(backend, fast_settings(50));
    controller.initialize_conversation(Some(5)).await.unwrap();

    let outcome = controller.wait().await.unwrap();
    assert_eq!(outcome.status, SessionStatus::Aborted);
    assert_eq!(outcome.turns, 3);
    assert!(outcome.error.is_some());
    assert!(!controller.is_active());

    let events = drain(&mut rx);
    assert!(matches!(events.last(), Some(SessionEvent::Ended(o)) if o.status == SessionStatus::Aborted));
}

// ─────────────────────────────────────────────────────────────────
// Stop Semantics
// ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_stop_twice_is_idempotent() {
    let (controller, mut rx) = observed_controller(slow_backend(), fast_settings(1000));
    controller.initialize_conversation(Some(1)).await.unwrap();
    tokio::time::sleep(SLOW_TURN * 5).await;

    controller.stop_conversation();
    controller.stop_conversation();

    let outcome = controller.wait().await.unwrap();
    assert_eq!(outcome.status, SessionStatus::Stopped);
    assert_eq!(controller.status(), Some(SessionStatus::Stopped));
    assert!(controller.get_messages().is_empty());
    assert!(controller.get_latest_message().is_none());
    assert!(controller.eliminated().is_empty());

    let ended = drain(&mut rx)
        .into_iter()
        .filter(|e| matches!(e, SessionEvent::Ended(_)))
        .count();
    assert_eq!(ended, 1);
}

#[tokio::test]
async fn test_nothing_is_broadcast_after_stop() {
    let (controller, mut rx) = observed_controller(slow_backend(), fast_settings(1000));
    controller.initialize_conversation(Some(6)).await.unwrap();
    tokio::time::sleep(SLOW_TURN * 4).await;

    controller.stop_conversation();
    let before = drain(&mut rx);
    assert!(matches!(before.last(), Some(SessionEvent::Ended(_))));

    tokio::time::sleep(SLOW_TURN * 10).await;
    assert!(drain(&mut rx).is_empty());
    assert!(controller.get_messages().is_empty());
}

#[tokio::test]
async fn test_stop_without_session_is_harmless() {
    let (controller, _rx) = observed_controller(MockBackend::new(), fast_settings(5));
    controller.stop_conversation();
    assert!(controller.session().is_none());
    assert!(controller.get_messages().is_empty());
    assert!(!controller.is_active());
}

// ─────────────────────────────────────────────────────────────────
// Initialization
// ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_invalid_impostor_index_is_rejected() {
    let (controller, mut rx) = observed_controller(MockBackend::new(), fast_settings(5));
    let err = controller.initialize_conversation(Some(10)).await.unwrap_err();
    assert!(matches!(err, Error::IndexOutOfRange { index: 10, count: 10 }));
    assert!(controller.session().is_none());
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_invalid_index_leaves_running_session_alone() {
    let (controller, _rx) = observed_controller(slow_backend(), fast_settings(1000));
    let live = controller.initialize_conversation(Some(2)).await.unwrap();

    assert!(controller.initialize_conversation(Some(42)).await.is_err());
    assert_eq!(controller.session_id(), Some(live.id()));
    assert!(live.is_active());
    controller.stop_conversation();
}

// ─────────────────────────────────────────────────────────────────
// Eliminations
// ─────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_eliminated_personas_never_speak_again() {
    let settings = ControllerSettings {
        scheduler: Default::default(),
        graph: Default::default(),
        ..fast_settings(1000)
    };
    // Generation as slow as the pacing, so ticks land mid-turn
    let backend = MockBackend::with_config(MockConfig {
        latency_ms: 15_000,
        ..Default::default()
    });
    let (controller, mut rx) = observed_controller(backend, settings);
    controller.initialize_conversation(Some(8)).await.unwrap();

    tokio::time::sleep(Duration::from_secs(700)).await;
    let eliminated = controller.eliminated();
    assert_eq!(eliminated.len(), 5);
    assert!(!eliminated.contains(&PersonaName::Tactician));
    assert_eq!(controller.active_personas().len(), 5);
    controller.stop_conversation();

    let mut removed = HashSet::new();
    for event in drain(&mut rx) {
        match event {
            SessionEvent::Elimination { name } => {
                removed.insert(name);
            }
            SessionEvent::Message(message) => {
                if let Some(name) = message.name.persona() {
                    assert!(!removed.contains(&name), "{} spoke after elimination", name);
                }
            }
            SessionEvent::Ended(_) => {}
        }
    }
    assert_eq!(removed.len(), 5);
}
