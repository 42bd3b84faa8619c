//! Integration tests for daemon-CLI IPC communication.
//!
//! A real `IpcServer` and `RequestHandler` serve a core wired to mocks;
//! requests go through the same `IpcClient` the CLI uses.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use wakeup::cli::client::IpcClient;
use wakeup::cli::commands::{RingArgs, ScheduleArgs};
use wakeup::daemon::ipc::{IpcServer, RequestHandler};
use wakeup::daemon::{AlarmCore, CoreOptions};
use wakeup::notification::MockNotifier;
use wakeup::platform::{MockSettingsOpener, SettingsSurface};
use wakeup::scheduler::{MockTimerService, SchedulingGateway};
use wakeup::screen::{MockScreen, RingingScreenControls, ScreenRequest};
use wakeup::session::{MockVibrator, MockWakeLock, RingingSessionManager};
use wakeup::snooze::SnoozePolicy;
use wakeup::sound::{AudioResolver, MockAudioBackend};
use wakeup::store::MemoryStore;
use wakeup::types::{AlarmEvent, AlarmId};

// ============================================================================
// Test Helpers
// ============================================================================

struct TestDaemon {
    client: IpcClient,
    timers: Arc<MockTimerService>,
    settings: Arc<MockSettingsOpener>,
    _server: JoinHandle<()>,
    _dir: tempfile::TempDir,
}

/// Starts a server on a temporary socket that serves connections until the
/// test ends.
fn start_daemon() -> TestDaemon {
    let dir = tempfile::tempdir().unwrap();
    let socket_path: PathBuf = dir.path().join("integration_test.sock");

    let timers = Arc::new(MockTimerService::new());
    let store = Arc::new(MemoryStore::new());
    let settings = Arc::new(MockSettingsOpener::new());
    let session = RingingSessionManager::new(
        Arc::new(MockNotifier::new()),
        Arc::new(MockAudioBackend::new()),
        Arc::new(MockVibrator::new()),
        Arc::new(MockWakeLock::new()),
        AudioResolver::default(),
    );
    let core = AlarmCore::new(
        session,
        SchedulingGateway::new(timers.clone(), store.clone()),
        SnoozePolicy::new(store),
        Arc::new(MockScreen::new()),
        settings.clone(),
        CoreOptions {
            launch_full_screen: true,
            wake_lock_command: vec![],
            manufacturer: "samsung".to_string(),
        },
    );

    let server = IpcServer::new(&socket_path).unwrap();
    let handler = RequestHandler::new(Arc::new(Mutex::new(core)));
    let task = tokio::spawn(async move {
        while let Ok(mut stream) = server.accept().await {
            if let Ok(request) = IpcServer::receive_request(&mut stream).await {
                let response = handler.handle(request).await;
                let _ = IpcServer::send_response(&mut stream, &response).await;
            }
        }
    });

    TestDaemon {
        client: IpcClient::with_socket_path(socket_path),
        timers,
        settings,
        _server: task,
        _dir: dir,
    }
}

fn schedule_args(id: &str, at: i64) -> ScheduleArgs {
    ScheduleArgs {
        id: id.to_string(),
        at: Some(at),
        after: None,
        sound: String::new(),
        label: "Wake".to_string(),
    }
}

fn ring_args(id: &str) -> RingArgs {
    RingArgs {
        id: id.to_string(),
        sound: "song.mp3".to_string(),
        label: "起床".to_string(),
    }
}

// ============================================================================
// Scheduling via IPC
// ============================================================================

#[tokio::test]
async fn test_schedule_then_status_lists_pending() {
    let daemon = start_daemon();

    let response = daemon
        .client
        .schedule(&schedule_args("a1", 4_000_000_000_000))
        .await
        .unwrap();
    assert!(response.is_success());
    assert_eq!(
        response.data.as_ref().and_then(|d| d.schedule.as_deref()),
        Some("exact")
    );
    assert_eq!(daemon.timers.pending_count(), 1);

    let status = daemon.client.status().await.unwrap();
    let pending = status.data.unwrap().pending.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].payload.alarm_id, AlarmId::new("a1"));
}

#[tokio::test]
async fn test_schedule_without_exact_permission_is_reported() {
    let daemon = start_daemon();
    daemon.timers.set_exact_allowed(false);

    let response = daemon
        .client
        .schedule(&schedule_args("a1", 4_000_000_000_000))
        .await
        .unwrap();
    assert!(response.is_permission_denied());
    assert_eq!(
        response.data.and_then(|d| d.schedule),
        Some("inexact".to_string())
    );
}

#[tokio::test]
async fn test_cancel_and_cancel_all() {
    let daemon = start_daemon();
    for id in ["a1", "b2", "c3"] {
        daemon
            .client
            .schedule(&schedule_args(id, 4_000_000_000_000))
            .await
            .unwrap();
    }

    let response = daemon.client.cancel("a1").await.unwrap();
    assert_eq!(response.data.and_then(|d| d.cancelled), Some(1));

    let response = daemon.client.cancel_all().await.unwrap();
    assert_eq!(response.data.and_then(|d| d.cancelled), Some(2));
    assert_eq!(daemon.timers.pending_count(), 0);
}

// ============================================================================
// Ringing via IPC
// ============================================================================

#[tokio::test]
async fn test_ring_then_stop() {
    let daemon = start_daemon();

    let response = daemon.client.ring(&ring_args("a1")).await.unwrap();
    let session = response.data.unwrap().session.unwrap();
    assert_eq!(session.alarm_id, AlarmId::new("a1"));

    let response = daemon.client.stop().await.unwrap();
    assert_eq!(response.data.and_then(|d| d.was_ringing), Some(true));

    let status = daemon.client.status().await.unwrap();
    assert!(status.data.unwrap().session.is_none());
}

#[tokio::test]
async fn test_stop_when_idle_is_success() {
    let daemon = start_daemon();
    let response = daemon.client.stop().await.unwrap();
    assert!(response.is_success());
    assert_eq!(response.data.and_then(|d| d.was_ringing), Some(false));
}

#[tokio::test]
async fn test_snooze_when_idle_is_error() {
    let daemon = start_daemon();
    assert!(daemon.client.snooze().await.is_err());
}

#[tokio::test]
async fn test_screen_controls_snooze_through_action() {
    let daemon = start_daemon();
    daemon.client.ring(&ring_args("a1")).await.unwrap();

    let events = daemon.client.events(0).await.unwrap();
    let records = events.data.unwrap().events.unwrap();
    let request = records
        .iter()
        .find_map(|record| match &record.event {
            AlarmEvent::OpenAlarmScreen {
                alarm_id,
                label,
                audio_ref,
            } => Some(ScreenRequest {
                alarm_id: alarm_id.clone(),
                label: label.clone(),
                audio_ref: audio_ref.clone(),
            }),
            _ => None,
        })
        .expect("openAlarmScreen should be emitted");
    let controls = RingingScreenControls::new(request);
    assert_eq!(controls.title(), "起床");

    let response = daemon.client.action(&controls.snooze()).await.unwrap();
    let data = response.data.unwrap();
    assert_eq!(data.delay_minutes, Some(5));
    assert_eq!(data.snooze_id.unwrap().base(), AlarmId::new("a1"));

    let after = daemon.client.events(records.last().unwrap().seq).await.unwrap();
    let new_events = after.data.unwrap().events.unwrap();
    assert!(matches!(
        new_events.last().map(|r| &r.event),
        Some(AlarmEvent::Snoozed { .. })
    ));
}

// ============================================================================
// Platform via IPC
// ============================================================================

#[tokio::test]
async fn test_permissions_include_oem_instructions() {
    let daemon = start_daemon();
    let response = daemon.client.permissions().await.unwrap();
    let permissions = response.data.unwrap().permissions.unwrap();

    assert!(permissions.can_schedule_exact_timers);
    assert!(!permissions.all_granted);
    assert!(permissions.oem_instructions.starts_with("Samsung"));
}

#[tokio::test]
async fn test_open_settings() {
    let daemon = start_daemon();
    daemon
        .client
        .open_settings(SettingsSurface::Battery)
        .await
        .unwrap();
    assert_eq!(daemon.settings.opened(), vec![SettingsSurface::Battery]);
}

// ============================================================================
// Connection Errors
// ============================================================================

#[tokio::test]
async fn test_client_without_daemon_fails() {
    let dir = tempfile::tempdir().unwrap();
    let client = IpcClient::with_socket_path(dir.path().join("missing.sock"));
    let err = client.status().await.unwrap_err();
    assert!(format!("{:#}", err).contains("wakeup daemon"));
}
