//! Durable store error types.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading or writing persisted alarm state.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The state directory could not be created.
    #[error("状態ディレクトリを作成できません: {path}")]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The state file could not be read.
    #[error("状態ファイルを読み込めません: {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The state file could not be written durably.
    #[error("状態ファイルを書き込めません: {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A value could not be (de)serialized.
    #[error("状態のシリアライズに失敗しました: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The in-memory cache lock was poisoned by a panicking writer.
    #[error("状態ストアのロックが破損しています")]
    Poisoned,
}

impl StoreError {
    /// Returns true if the error came from the filesystem.
    #[must_use]
    pub fn is_io_error(&self) -> bool {
        matches!(
            self,
            Self::DirectoryCreation { .. } | Self::Read { .. } | Self::Write { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_includes_path() {
        let err = StoreError::Write {
            path: PathBuf::from("/tmp/state.json"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("/tmp/state.json"));
        assert!(err.is_io_error());
    }

    #[test]
    fn test_serialization_is_not_io() {
        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        let err = StoreError::from(json_err);
        assert!(!err.is_io_error());
    }
}
