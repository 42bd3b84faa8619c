//! IPC server for the alarm daemon.
//!
//! This module provides Unix Domain Socket IPC functionality:
//! - Server that listens on a Unix socket
//! - Request/response handling for alarm commands
//! - Dispatch of each request to the shared [`AlarmCore`]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Mutex;
use tokio::time::{timeout, Duration};

use crate::dispatch::{ActionExtras, ActionOutcome};
use crate::platform::SettingsSurface;
use crate::types::{AlarmId, IpcRequest, IpcResponse, ResponseData, ScheduleParams};

use super::core::{AlarmCore, CoreError};

// ============================================================================
// Constants
// ============================================================================

/// Maximum request size in bytes (4KB)
const MAX_REQUEST_SIZE: usize = 4096;

/// Read timeout in seconds
const READ_TIMEOUT_SECS: u64 = 5;

// ============================================================================
// IpcError
// ============================================================================

/// IPC-specific error types.
#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    /// Read error
    #[error("Failed to read request: {0}")]
    ReadError(String),

    /// Timeout error
    #[error("Operation timed out")]
    Timeout,

    /// Request too large
    #[error("Request too large (max {MAX_REQUEST_SIZE} bytes)")]
    RequestTooLarge,

    /// The client closed the connection before sending a request
    #[error("Connection closed by client")]
    ConnectionClosed,
}

// ============================================================================
// IpcServer
// ============================================================================

/// Unix Domain Socket IPC server.
pub struct IpcServer {
    /// Unix socket listener
    listener: UnixListener,
    /// Socket path (for cleanup)
    socket_path: PathBuf,
}

impl IpcServer {
    /// Creates a new IPC server bound to the specified socket path.
    ///
    /// If the socket file already exists, it will be removed before binding.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound.
    pub fn new(socket_path: &Path) -> Result<Self> {
        if socket_path.exists() {
            std::fs::remove_file(socket_path)
                .with_context(|| format!("Failed to remove existing socket: {:?}", socket_path))?;
        }

        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create socket directory: {:?}", parent))?;
        }

        let listener = UnixListener::bind(socket_path)
            .with_context(|| format!("Failed to bind Unix socket: {:?}", socket_path))?;

        Ok(Self {
            listener,
            socket_path: socket_path.to_path_buf(),
        })
    }

    /// Accepts an incoming client connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be accepted.
    pub async fn accept(&self) -> Result<UnixStream> {
        let (stream, _addr) = self
            .listener
            .accept()
            .await
            .context("Failed to accept connection")?;
        Ok(stream)
    }

    /// Receives and deserializes an IPC request from the stream.
    ///
    /// Applies a read timeout to prevent blocking indefinitely.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or deserialization fails.
    pub async fn receive_request(stream: &mut UnixStream) -> Result<IpcRequest> {
        let mut buffer = vec![0u8; MAX_REQUEST_SIZE + 1];

        let n = match timeout(
            Duration::from_secs(READ_TIMEOUT_SECS),
            stream.read(&mut buffer),
        )
        .await
        {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => return Err(IpcError::ReadError(e.to_string()).into()),
            Err(_) => return Err(IpcError::Timeout.into()),
        };

        if n == 0 {
            return Err(IpcError::ConnectionClosed.into());
        }
        if n > MAX_REQUEST_SIZE {
            return Err(IpcError::RequestTooLarge.into());
        }

        let request: IpcRequest = serde_json::from_slice(&buffer[..n])
            .with_context(|| "Failed to deserialize IPC request")?;

        Ok(request)
    }

    /// Serializes and sends an IPC response to the stream.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub async fn send_response(stream: &mut UnixStream, response: &IpcResponse) -> Result<()> {
        let json = serde_json::to_vec(response).context("Failed to serialize IPC response")?;

        stream
            .write_all(&json)
            .await
            .context("Failed to write response")?;
        stream.flush().await.context("Failed to flush response")?;

        Ok(())
    }

    /// Returns the socket path.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

// ============================================================================
// RequestHandler
// ============================================================================

/// Handles IPC requests by dispatching to the alarm core.
#[derive(Clone)]
pub struct RequestHandler {
    core: Arc<Mutex<AlarmCore>>,
}

impl RequestHandler {
    /// Creates a new request handler for the given core.
    pub fn new(core: Arc<Mutex<AlarmCore>>) -> Self {
        Self { core }
    }

    /// Handles an IPC request and returns the appropriate response.
    pub async fn handle(&self, request: IpcRequest) -> IpcResponse {
        tracing::debug!(command = request.command(), "handling request");

        match request {
            IpcRequest::Schedule { params } => self.handle_schedule(params).await,
            IpcRequest::Cancel { alarm_id } => self.handle_cancel(&alarm_id).await,
            IpcRequest::CancelAll => self.handle_cancel_all().await,
            IpcRequest::Ring {
                alarm_id,
                audio_ref,
                label,
            } => self.handle_ring(&alarm_id, &audio_ref, &label).await,
            IpcRequest::Stop => {
                let result = self.core.lock().await.stop_current_alarm();
                Self::outcome_response(result)
            }
            IpcRequest::Snooze => {
                let result = self.core.lock().await.snooze_current_alarm();
                Self::outcome_response(result)
            }
            IpcRequest::Status => self.handle_status().await,
            IpcRequest::Permissions => self.handle_permissions().await,
            IpcRequest::OpenSettings { surface } => self.handle_open_settings(surface).await,
            IpcRequest::Events { since } => self.handle_events(since).await,
            IpcRequest::Action {
                action,
                alarm_id,
                audio_ref,
            } => {
                let extras = ActionExtras {
                    alarm_id,
                    audio_ref,
                };
                let result = self.core.lock().await.handle_action(&action, extras);
                Self::outcome_response(result)
            }
        }
    }

    /// Handles the schedule command.
    async fn handle_schedule(&self, params: ScheduleParams) -> IpcResponse {
        let core = self.core.lock().await;
        let alarm_id = AlarmId::new(params.alarm_id.as_str());

        match core.schedule_alarm(
            alarm_id.as_str(),
            params.fire_at_ms,
            &params.audio_ref,
            &params.label,
        ) {
            Ok(outcome) => {
                let data = ResponseData {
                    alarm_id: Some(alarm_id),
                    schedule: Some(outcome.as_str().to_string()),
                    fire_at_ms: Some(params.fire_at_ms),
                    ..Default::default()
                };
                if outcome.permission_denied() {
                    IpcResponse::permission_denied(
                        "正確なアラームの権限がないため、通常のアラームとして登録しました",
                        Some(data),
                    )
                } else {
                    IpcResponse::success("アラームを登録しました", Some(data))
                }
            }
            Err(e) if e.is_permission_error() => IpcResponse::permission_denied(e.to_string(), None),
            Err(e) => IpcResponse::error(e.to_string()),
        }
    }

    /// Handles the cancel command.
    async fn handle_cancel(&self, alarm_id: &str) -> IpcResponse {
        let core = self.core.lock().await;
        let found = core.cancel_alarm(alarm_id);
        let message = if found {
            "アラームを取り消しました"
        } else {
            "登録されていないアラームです"
        };
        IpcResponse::success(
            message,
            Some(ResponseData {
                alarm_id: Some(AlarmId::new(alarm_id)),
                cancelled: Some(usize::from(found)),
                ..Default::default()
            }),
        )
    }

    /// Handles the cancel-all command.
    async fn handle_cancel_all(&self) -> IpcResponse {
        let cancelled = self.core.lock().await.cancel_all_alarms();
        IpcResponse::success(
            format!("{}件のアラームを取り消しました", cancelled),
            Some(ResponseData {
                cancelled: Some(cancelled),
                ..Default::default()
            }),
        )
    }

    /// Handles the ring command.
    async fn handle_ring(&self, alarm_id: &str, audio_ref: &str, label: &str) -> IpcResponse {
        let mut core = self.core.lock().await;
        match core.start_immediate_alarm(alarm_id, audio_ref, label) {
            Ok(alarm_id) => IpcResponse::success(
                "アラームを鳴らしています",
                Some(ResponseData {
                    alarm_id: Some(alarm_id),
                    session: core.session().status(),
                    ..Default::default()
                }),
            ),
            Err(e) => IpcResponse::error(e.to_string()),
        }
    }

    /// Handles the status command.
    async fn handle_status(&self) -> IpcResponse {
        let data = self.core.lock().await.status();
        IpcResponse::success("", Some(data))
    }

    /// Handles the permissions command.
    async fn handle_permissions(&self) -> IpcResponse {
        let permissions = self.core.lock().await.check_permissions();
        IpcResponse::success(
            "",
            Some(ResponseData {
                permissions: Some(permissions),
                ..Default::default()
            }),
        )
    }

    /// Handles the open-settings command.
    async fn handle_open_settings(&self, surface: SettingsSurface) -> IpcResponse {
        match self.core.lock().await.open_settings(surface) {
            Ok(()) => IpcResponse::success(
                format!("{} の設定画面を開きました", surface.as_str()),
                None,
            ),
            Err(e) => IpcResponse::error(e.to_string()),
        }
    }

    /// Handles the events command.
    async fn handle_events(&self, since: u64) -> IpcResponse {
        let core = self.core.lock().await;
        IpcResponse::success(
            "",
            Some(ResponseData {
                events: Some(core.events_since(since)),
                last_seq: Some(core.last_event_seq()),
                ..Default::default()
            }),
        )
    }

    fn outcome_response(result: Result<ActionOutcome, CoreError>) -> IpcResponse {
        match result {
            Ok(ActionOutcome::Stopped {
                alarm_id,
                was_ringing,
            }) => {
                let message = if was_ringing {
                    "アラームを停止しました"
                } else {
                    "鳴っているアラームはありません"
                };
                IpcResponse::success(
                    message,
                    Some(ResponseData {
                        alarm_id: Some(alarm_id),
                        was_ringing: Some(was_ringing),
                        ..Default::default()
                    }),
                )
            }
            Ok(ActionOutcome::Snoozed {
                alarm_id,
                snooze_id,
                next_fire_time,
                delay_minutes,
                schedule,
            }) => IpcResponse::success(
                format!("{}分後に再度鳴らします", delay_minutes),
                Some(ResponseData {
                    alarm_id: Some(alarm_id),
                    snooze_id: Some(snooze_id),
                    next_fire_time: Some(next_fire_time),
                    delay_minutes: Some(delay_minutes),
                    schedule: Some(schedule.as_str().to_string()),
                    ..Default::default()
                }),
            ),
            Ok(ActionOutcome::Reasserted { alarm_id } | ActionOutcome::ScreenOpened { alarm_id }) => {
                IpcResponse::success(
                    "アラーム画面を表示しました",
                    Some(ResponseData {
                        alarm_id: Some(alarm_id),
                        ..Default::default()
                    }),
                )
            }
            Ok(ActionOutcome::Renotified { posted }) => {
                if posted {
                    IpcResponse::success("通知を再表示しました", None)
                } else {
                    IpcResponse::success("鳴っているアラームはありません", None)
                }
            }
            Err(e) if e.is_permission_error() => IpcResponse::permission_denied(e.to_string(), None),
            Err(e) => IpcResponse::error(e.to_string()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
