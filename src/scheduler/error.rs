//! Scheduling error types.

use thiserror::Error;

/// Errors reported by the timer service and the scheduling gateway.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The platform refused an exact, idle-tolerant timer.
    #[error("正確なアラームの権限がありません")]
    ExactPermissionDenied,

    /// The timer service is not available (no runtime, shut down, ...).
    #[error("タイマーサービスが利用できません: {0}")]
    ServiceUnavailable(String),

    /// The timer service rejected the registration.
    #[error("タイマーの登録に失敗しました: {0}")]
    RegistrationFailed(String),
}

impl SchedulerError {
    /// Returns true if this error is related to permissions.
    #[must_use]
    pub fn is_permission_error(&self) -> bool {
        matches!(self, Self::ExactPermissionDenied)
    }

    /// Returns a user-friendly suggestion for resolving this error.
    #[must_use]
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::ExactPermissionDenied => {
                "'wakeup settings exact-timer' で正確なアラームを許可してください"
            }
            Self::ServiceUnavailable(_) => "デーモンを再起動してください",
            Self::RegistrationFailed(_) => "時刻を確認して再度スケジュールしてください",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_permission_error() {
        assert!(SchedulerError::ExactPermissionDenied.is_permission_error());
        assert!(!SchedulerError::ServiceUnavailable("x".into()).is_permission_error());
        assert!(!SchedulerError::RegistrationFailed("x".into()).is_permission_error());
    }

    #[test]
    fn test_suggestion() {
        assert!(SchedulerError::ExactPermissionDenied
            .suggestion()
            .contains("exact-timer"));
        assert!(SchedulerError::ServiceUnavailable("x".into())
            .suggestion()
            .contains("再起動"));
    }

    #[test]
    fn test_error_display() {
        let err = SchedulerError::RegistrationFailed("boom".to_string());
        assert!(err.to_string().contains("boom"));
    }
}
