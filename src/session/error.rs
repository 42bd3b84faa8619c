//! Ringing session error types.

use thiserror::Error;

/// Errors that can occur while starting a ringing session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The system refused to let the session run (foreground grant denied).
    #[error("アラームの開始がシステムに拒否されました: {0}")]
    StartRejected(String),

    /// The wake lock could not be acquired.
    #[error("スリープを抑止できません: {0}")]
    WakeLockUnavailable(String),
}

impl SessionError {
    /// Returns true if the system rejected the session start.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::StartRejected(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SessionError::StartRejected("power policy".to_string());
        assert!(err.to_string().contains("power policy"));
        assert!(err.is_rejection());

        let err = SessionError::WakeLockUnavailable("caffeinate".to_string());
        assert!(err.to_string().contains("caffeinate"));
        assert!(!err.is_rejection());
    }
}
