//! Foundation crate tests
//!
//! Tests cover:
//! - Error types (AppError, AudioError, PipeError)
//! - Application state machine transitions
//! - Shutdown guard flag and notify behavior

use micpipe_foundation::error::{AppError, AudioError, PipeError};
use micpipe_foundation::shutdown::ShutdownHandler;
use micpipe_foundation::state::{AppState, StateManager};
use std::sync::atomic::Ordering;
use std::time::Duration;

// ─── Error Type Tests ───────────────────────────────────────────────

#[test]
fn audio_error_device_not_found() {
    let err = AudioError::DeviceNotFound {
        name: Some("test_mic".to_string()),
    };
    let msg = format!("{}", err);
    assert!(msg.contains("test_mic"));
}

#[test]
fn audio_error_format_not_supported() {
    let err = AudioError::FormatNotSupported {
        format: "i16 44100 Hz 1 ch".to_string(),
    };
    let msg = format!("{}", err);
    assert!(msg.contains("44100"));
}

#[test]
fn pipe_error_open_names_path() {
    let err = PipeError::Open {
        path: "/tmp/audio_fifo".into(),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "No such file or directory"),
    };
    let msg = format!("{}", err);
    assert!(msg.contains("audio_fifo"));
}

#[test]
fn pipe_error_short_write() {
    let err = PipeError::ShortWrite {
        written: 4000,
        requested: 8192,
    };
    let msg = format!("{}", err);
    assert!(msg.contains("4000"));
    assert!(msg.contains("8192"));
}

#[test]
fn app_error_from_audio_error() {
    let audio_err = AudioError::DeviceNotFound { name: None };
    let err: AppError = audio_err.into();
    assert!(matches!(err, AppError::Audio(_)));
}

#[test]
fn app_error_from_pipe_error() {
    let pipe_err = PipeError::ReaderGone;
    let err: AppError = pipe_err.into();
    assert!(matches!(err, AppError::Pipe(_)));
}

// ─── State Machine Tests ────────────────────────────────────────────

#[test]
fn state_manager_starts_initializing() {
    let mgr = StateManager::new();
    assert_eq!(mgr.current(), AppState::Initializing);
}

#[test]
fn state_manager_normal_lifecycle() {
    let mgr = StateManager::new();
    mgr.transition(AppState::Running).unwrap();
    mgr.transition(AppState::Stopping).unwrap();
    mgr.transition(AppState::Stopped).unwrap();
    assert_eq!(mgr.current(), AppState::Stopped);
}

#[test]
fn state_manager_faulted_lifecycle() {
    let mgr = StateManager::new();
    mgr.transition(AppState::Running).unwrap();
    mgr.transition(AppState::Faulted {
        reason: "pipe reader gone".into(),
    })
    .unwrap();
    mgr.transition(AppState::Stopping).unwrap();
    mgr.transition(AppState::Stopped).unwrap();
}

#[test]
fn state_manager_rejects_invalid_transition() {
    let mgr = StateManager::new();
    // Cannot stop before running
    assert!(mgr.transition(AppState::Stopped).is_err());

    mgr.transition(AppState::Running).unwrap();
    mgr.transition(AppState::Stopping).unwrap();
    mgr.transition(AppState::Stopped).unwrap();
    // Cannot restart once stopped
    assert!(mgr.transition(AppState::Running).is_err());
}

#[test]
fn state_manager_subscribers_see_transitions() {
    let mgr = StateManager::new();
    let rx = mgr.subscribe();
    mgr.transition(AppState::Running).unwrap();
    mgr.transition(AppState::Stopping).unwrap();
    assert_eq!(rx.recv().unwrap(), AppState::Running);
    assert_eq!(rx.recv().unwrap(), AppState::Stopping);
}

// ─── Shutdown Tests ─────────────────────────────────────────────────

#[tokio::test]
async fn shutdown_guard_flag_follows_request() {
    let guard = ShutdownHandler::new().install().await;
    let flag = guard.flag();
    assert!(!guard.is_shutdown_requested());
    assert!(!flag.load(Ordering::SeqCst));

    guard.request_shutdown();
    assert!(guard.is_shutdown_requested());
    assert!(flag.load(Ordering::SeqCst));
}

#[tokio::test]
async fn shutdown_guard_wait_wakes_waiters() {
    let guard = ShutdownHandler::new().install().await;
    // notify_waiters() wakes only tasks already waiting, so the waiter must
    // be registered before the request fires.
    tokio::join!(
        async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            guard.request_shutdown();
        },
        async {
            tokio::time::timeout(Duration::from_secs(1), guard.wait())
                .await
                .expect("wait() should resolve once shutdown is requested");
        },
    );
}
