//! Daemon module for the alarm service.
//!
//! This module contains the core daemon functionality:
//! - `core`: all alarm components wired together, plus the boundary operations
//! - `ipc`: Unix socket server and request dispatch
//!
//! [`run_daemon`] is the event loop: IPC connections, timer deliveries,
//! audio readiness and notification responses are all funnelled into the
//! shared [`AlarmCore`].

pub mod core;
pub mod ipc;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::UnixStream;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::{mpsc, Mutex};

pub use self::core::{AlarmCore, CoreError, CoreOptions};
pub use ipc::{IpcError, IpcServer, RequestHandler};

use crate::config::{default_config_path, AlarmConfig};
use crate::dispatch::ActionExtras;
use crate::notification::AlarmNotifier;
use crate::platform::SystemSettingsOpener;
use crate::scheduler::{SchedulingGateway, TokioTimerService};
use crate::screen::EventScreen;
use crate::session::{InhibitorWakeLock, LogVibrator, RingingSessionManager};
use crate::snooze::SnoozePolicy;
use crate::sound::{AudioResolver, RodioAlarmPlayer};
use crate::store::{FileStore, KeyValueStore};
use crate::types::{now_millis, IpcResponse};

/// Runs the daemon until it receives SIGINT or SIGTERM.
///
/// Either signal stops the ringing session before returning, which releases
/// the wake lock and removes the notification.
///
/// # Errors
///
/// Returns an error if the state file, the audio thread, the signal handler
/// or the IPC socket cannot be set up.
pub async fn run_daemon(config: AlarmConfig) -> Result<()> {
    let (fired_tx, mut fired_rx) = mpsc::unbounded_channel();
    let (audio_tx, mut audio_rx) = mpsc::unbounded_channel();
    let (action_tx, mut action_rx) = mpsc::unbounded_channel::<String>();

    let store: Arc<dyn KeyValueStore> = Arc::new(
        FileStore::open(&config.state_path)
            .with_context(|| format!("状態ファイルを開けません: {}", config.state_path.display()))?,
    );
    let timers = Arc::new(TokioTimerService::new(fired_tx, config.exact_timers));
    let audio = Arc::new(RodioAlarmPlayer::spawn(audio_tx).context("オーディオスレッドを起動できません")?);
    let (notifier, _delegate) = create_notifier(action_tx).await;

    let session = RingingSessionManager::new(
        notifier,
        audio,
        Arc::new(LogVibrator::new()),
        Arc::new(InhibitorWakeLock::new(config.wake_lock_command.clone())),
        AudioResolver::new(config.content_root.clone(), config.sound_search_dirs.clone()),
    );
    let core = AlarmCore::new(
        session,
        SchedulingGateway::new(timers, store.clone()),
        SnoozePolicy::with_sequence(store, config.snooze_sequence.clone()),
        Arc::new(EventScreen::new()),
        Arc::new(SystemSettingsOpener::new(default_config_path())),
        CoreOptions::from(&config),
    );

    let report = core.restore(now_millis(), config.restore_grace_ms());
    tracing::info!(
        rearmed = report.rearmed.len(),
        overdue = report.overdue.len(),
        dropped = report.dropped.len(),
        "pending alarms restored"
    );

    let mut terminate =
        signal(SignalKind::terminate()).context("SIGTERMハンドラを登録できません")?;
    let core = Arc::new(Mutex::new(core));
    let server = IpcServer::new(&config.socket_path)?;
    let handler = RequestHandler::new(core.clone());
    tracing::info!(socket = %server.socket_path().display(), "daemon started");

    loop {
        tokio::select! {
            accepted = server.accept() => match accepted {
                Ok(stream) => {
                    tokio::spawn(serve_connection(stream, handler.clone()));
                }
                Err(e) => tracing::warn!("{:#}", e),
            },
            Some(alarm) = fired_rx.recv() => {
                let state = core.lock().await.on_fired(alarm);
                tracing::debug!(state = state.as_str(), "fired alarm handled");
            }
            Some(event) = audio_rx.recv() => {
                core.lock().await.on_audio_event(event);
            }
            Some(action) = action_rx.recv() => {
                if let Err(e) = core.lock().await.handle_action(&action, ActionExtras::default()) {
                    tracing::warn!(action = %action, "{}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted, shutting down");
                break;
            }
            _ = terminate.recv() => {
                tracing::info!("terminated, shutting down");
                break;
            }
        }
    }

    core.lock().await.shutdown();
    Ok(())
}

/// Reads one request, handles it and writes the response.
async fn serve_connection(mut stream: UnixStream, handler: RequestHandler) {
    let response = match IpcServer::receive_request(&mut stream).await {
        Ok(request) => handler.handle(request).await,
        Err(e) => {
            tracing::debug!("invalid request: {:#}", e);
            IpcResponse::error(format!("不正なリクエストです: {}", e))
        }
    };

    if let Err(e) = IpcServer::send_response(&mut stream, &response).await {
        tracing::debug!("{:#}", e);
    }
}

#[cfg(target_os = "macos")]
async fn create_notifier(
    action_tx: mpsc::UnboundedSender<String>,
) -> (
    Arc<dyn AlarmNotifier>,
    Option<objc2::rc::Retained<crate::notification::NotificationDelegate>>,
) {
    use crate::notification::{CommandNotifier, MacNotifier};

    match MacNotifier::initialize(action_tx).await {
        Ok((notifier, delegate)) => (Arc::new(notifier), Some(delegate)),
        Err(e) => {
            tracing::warn!("通知システムを初期化できません: {}", e);
            tracing::info!("{}", e.suggestion());
            (Arc::new(CommandNotifier::new()), None)
        }
    }
}

#[cfg(not(target_os = "macos"))]
async fn create_notifier(
    _action_tx: mpsc::UnboundedSender<String>,
) -> (Arc<dyn AlarmNotifier>, Option<()>) {
    (Arc::new(crate::notification::CommandNotifier::new()), None)
}
