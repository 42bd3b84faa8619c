//! Notification error types.

use thiserror::Error;

/// Errors that can occur in the notification system.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// Failed to request notification authorization from the system.
    #[error("通知許可の取得に失敗しました: {0}")]
    AuthorizationFailed(String),

    /// Failed to send a notification.
    #[error("通知の送信に失敗しました: {0}")]
    SendFailed(String),

    /// Notification permission was denied by the user.
    #[error("通知許可が拒否されています")]
    PermissionDenied,

    /// The system refused to let the alarm run in the foreground.
    #[error("フォアグラウンドでの実行が拒否されました: {0}")]
    ForegroundRejected(String),

    /// The binary is not code-signed (required for notifications on macOS).
    #[error("バイナリが署名されていません。codesignで署名してください")]
    UnsignedBinary,

    /// Failed to initialize the notification system.
    #[error("通知システムの初期化に失敗しました: {0}")]
    InitializationFailed(String),
}

impl NotificationError {
    /// Returns true if this error is related to permissions.
    #[must_use]
    pub fn is_permission_error(&self) -> bool {
        matches!(self, Self::PermissionDenied | Self::AuthorizationFailed(_))
    }

    /// Returns true if the system refused the foreground grant.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::ForegroundRejected(_))
    }

    /// Returns a user-friendly suggestion for resolving this error.
    #[must_use]
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::AuthorizationFailed(_) | Self::PermissionDenied => {
                "システム設定 > 通知 で wakeup の通知を許可してください"
            }
            Self::SendFailed(_) => "通知センターを確認してください",
            Self::ForegroundRejected(_) => {
                "バッテリー最適化の対象から除外してください (wakeup settings battery)"
            }
            Self::UnsignedBinary => "codesign --force --deep --sign - target/release/wakeup",
            Self::InitializationFailed(_) => "デーモンを再起動してください",
        }
    }
}
