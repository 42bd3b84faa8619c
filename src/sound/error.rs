//! Sound system error types.
//!
//! Every variant is recoverable from the session's point of view: a missing
//! or undecodable file falls back to the bundled tone, and an unusable
//! device leaves the alarm ringing through vibration and the notification.

use thiserror::Error;

/// Errors that can occur while resolving or playing alarm audio.
#[derive(Debug, Error)]
pub enum SoundError {
    /// Audio device is not available (e.g., no speakers connected).
    #[error("オーディオデバイスが利用できません: {0}")]
    DeviceNotAvailable(String),

    /// Sound file was not found at the specified path.
    #[error("サウンドファイルが見つかりません: {0}")]
    FileNotFound(String),

    /// The audio reference is malformed or uses an unsupported scheme.
    #[error("無効なオーディオ参照です: {0}")]
    InvalidReference(String),

    /// Failed to decode the audio file.
    #[error("サウンドファイルのデコードに失敗しました: {0}")]
    DecodeError(String),

    /// Failed to create the audio output stream.
    #[error("オーディオストリームの作成に失敗しました: {0}")]
    StreamError(String),

    /// Generic sound playback error.
    #[error("サウンド再生エラー: {0}")]
    PlaybackError(String),
}

impl SoundError {
    /// Returns true if this error is related to device availability.
    #[must_use]
    pub fn is_device_error(&self) -> bool {
        matches!(self, Self::DeviceNotAvailable(_) | Self::StreamError(_))
    }

    /// Returns true if this error is related to the audio reference or file.
    #[must_use]
    pub fn is_source_error(&self) -> bool {
        matches!(
            self,
            Self::FileNotFound(_) | Self::InvalidReference(_) | Self::DecodeError(_)
        )
    }

    /// Returns a user-friendly suggestion for resolving this error.
    #[must_use]
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::DeviceNotAvailable(_) => "オーディオデバイスを接続してください",
            Self::FileNotFound(_) => "内蔵のアラーム音で再生します",
            Self::InvalidReference(_) => "content://、file:// またはファイルパスを指定してください",
            Self::DecodeError(_) => "サウンドファイルが破損している可能性があります",
            Self::StreamError(_) => "オーディオ設定を確認してください",
            Self::PlaybackError(_) => "デーモンを再起動してください",
        }
    }
}
