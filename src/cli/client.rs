//! IPC client for communicating with the wakeup daemon.
//!
//! This module provides:
//! - Unix Domain Socket client
//! - Request/response handling
//! - Connection retry logic
//! - Timeout handling

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::time::timeout;

use crate::cli::commands::{RingArgs, ScheduleArgs};
use crate::config::AlarmConfig;
use crate::dispatch::AlarmAction;
use crate::platform::SettingsSurface;
use crate::types::{now_millis, IpcRequest, IpcResponse, ScheduleParams, STATUS_ERROR};

// ============================================================================
// Constants
// ============================================================================

/// Connection timeout in seconds
const CONNECTION_TIMEOUT_SECS: u64 = 5;

/// Read/write timeout in seconds
const IO_TIMEOUT_SECS: u64 = 5;

/// Maximum response size in bytes (256KB, event polls can be large)
const MAX_RESPONSE_SIZE: usize = 262_144;

/// Maximum retry attempts
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds (base delay, multiplied by attempt number)
const RETRY_DELAY_MS: u64 = 500;

// ============================================================================
// IpcClient
// ============================================================================

/// IPC client for daemon communication.
pub struct IpcClient {
    /// Socket path
    socket_path: PathBuf,
    /// Connection timeout
    timeout: Duration,
}

impl IpcClient {
    /// Creates a new IPC client for the configured socket path.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is invalid.
    pub fn new() -> Result<Self> {
        let config = AlarmConfig::load()?;
        Ok(Self::with_socket_path(config.socket_path))
    }

    /// Creates a new IPC client with a custom socket path.
    pub fn with_socket_path(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            timeout: Duration::from_secs(CONNECTION_TIMEOUT_SECS),
        }
    }

    /// Returns the socket path.
    pub fn socket_path(&self) -> &PathBuf {
        &self.socket_path
    }

    /// Sends a schedule command to the daemon.
    pub async fn schedule(&self, args: &ScheduleArgs) -> Result<IpcResponse> {
        let fire_at_ms = match (args.at, args.after) {
            (Some(at), _) => at,
            (None, Some(after_ms)) => {
                now_millis() + i64::try_from(after_ms).context("時間が大きすぎます")?
            }
            (None, None) => anyhow::bail!("--at または --in を指定してください"),
        };

        let request = IpcRequest::Schedule {
            params: ScheduleParams {
                alarm_id: args.id.clone(),
                fire_at_ms,
                audio_ref: args.sound.clone(),
                label: args.label.clone(),
            },
        };
        self.send_request_with_retry(&request).await
    }

    /// Sends a cancel command to the daemon.
    pub async fn cancel(&self, alarm_id: &str) -> Result<IpcResponse> {
        let request = IpcRequest::Cancel {
            alarm_id: alarm_id.to_string(),
        };
        self.send_request_with_retry(&request).await
    }

    /// Sends a cancel-all command to the daemon.
    pub async fn cancel_all(&self) -> Result<IpcResponse> {
        self.send_request_with_retry(&IpcRequest::CancelAll).await
    }

    /// Sends a ring command to the daemon.
    pub async fn ring(&self, args: &RingArgs) -> Result<IpcResponse> {
        let request = IpcRequest::Ring {
            alarm_id: args.id.clone(),
            audio_ref: args.sound.clone(),
            label: args.label.clone(),
        };
        self.send_request_with_retry(&request).await
    }

    /// Sends a stop command to the daemon.
    pub async fn stop(&self) -> Result<IpcResponse> {
        self.send_request_with_retry(&IpcRequest::Stop).await
    }

    /// Sends a snooze command to the daemon.
    pub async fn snooze(&self) -> Result<IpcResponse> {
        self.send_request_with_retry(&IpcRequest::Snooze).await
    }

    /// Sends a status query to the daemon.
    pub async fn status(&self) -> Result<IpcResponse> {
        self.send_request_with_retry(&IpcRequest::Status).await
    }

    /// Sends a permissions query to the daemon.
    pub async fn permissions(&self) -> Result<IpcResponse> {
        self.send_request_with_retry(&IpcRequest::Permissions).await
    }

    /// Asks the daemon to open a settings surface.
    pub async fn open_settings(&self, surface: SettingsSurface) -> Result<IpcResponse> {
        self.send_request_with_retry(&IpcRequest::OpenSettings { surface })
            .await
    }

    /// Polls events newer than `since`.
    pub async fn events(&self, since: u64) -> Result<IpcResponse> {
        self.send_request_with_retry(&IpcRequest::Events { since })
            .await
    }

    /// Delivers an alarm action (screen control) to the daemon.
    pub async fn action(&self, action: &AlarmAction) -> Result<IpcResponse> {
        let (name, extras) = action.encode();
        let request = IpcRequest::Action {
            action: name.to_string(),
            alarm_id: extras.alarm_id,
            audio_ref: extras.audio_ref,
        };
        self.send_request_with_retry(&request).await
    }

    /// Sends a request to the daemon with retry logic.
    ///
    /// Only transport failures are retried; an error response from the
    /// daemon is returned as an error right away.
    async fn send_request_with_retry(&self, request: &IpcRequest) -> Result<IpcResponse> {
        let mut attempt = 1;
        let response = loop {
            match self.send_request(request).await {
                Ok(response) => break response,
                Err(e) if attempt < MAX_RETRIES => {
                    tracing::warn!("リクエスト失敗 (試行 {}/{}): {:#}", attempt, MAX_RETRIES, e);
                    let delay = Duration::from_millis(RETRY_DELAY_MS * u64::from(attempt));
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        };

        if response.status == STATUS_ERROR {
            anyhow::bail!("{}", response.message);
        }
        Ok(response)
    }

    /// Sends a single request to the daemon.
    async fn send_request(&self, request: &IpcRequest) -> Result<IpcResponse> {
        let mut stream = timeout(self.timeout, UnixStream::connect(&self.socket_path))
            .await
            .context("接続がタイムアウトしました")?
            .context("Daemonに接続できません。'wakeup daemon' を起動してください")?;

        let request_json =
            serde_json::to_string(request).context("リクエストのシリアライズに失敗しました")?;

        timeout(
            Duration::from_secs(IO_TIMEOUT_SECS),
            stream.write_all(request_json.as_bytes()),
        )
        .await
        .context("書き込みがタイムアウトしました")?
        .context("リクエストの送信に失敗しました")?;

        timeout(Duration::from_secs(IO_TIMEOUT_SECS), stream.flush())
            .await
            .context("フラッシュがタイムアウトしました")?
            .context("フラッシュに失敗しました")?;

        // Signal end of request
        stream
            .shutdown()
            .await
            .context("シャットダウンに失敗しました")?;

        let mut buffer = Vec::with_capacity(4096);
        let n = timeout(
            Duration::from_secs(IO_TIMEOUT_SECS),
            (&mut stream)
                .take(MAX_RESPONSE_SIZE as u64)
                .read_to_end(&mut buffer),
        )
        .await
        .context("読み込みがタイムアウトしました")?
        .context("レスポンスの受信に失敗しました")?;

        if n == 0 {
            anyhow::bail!("Daemonからの応答がありませんでした");
        }

        serde_json::from_slice(&buffer).context("レスポンスのパースに失敗しました")
    }
}

// ============================================================================
// Tests
// ============================================================================
