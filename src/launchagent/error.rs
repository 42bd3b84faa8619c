//! Error types for LaunchAgent management.

use std::io;
use thiserror::Error;

/// LaunchAgent management error type.
#[derive(Debug, Error)]
pub enum LaunchAgentError {
    /// The running executable could not be located.
    #[error("実行ファイルのパスを取得できません: {0}")]
    BinaryPath(#[source] io::Error),

    #[error("ホームディレクトリが見つかりません")]
    HomeDirectoryNotFound,

    /// A file system step failed.
    #[error("{action}に失敗しました: {path}")]
    Io {
        action: &'static str,
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("plistの生成に失敗しました: {0}")]
    PlistSerialize(#[from] plist::Error),

    /// `launchctl` could not be run or reported a failure.
    #[error("launchctl {command} に失敗しました: {detail}")]
    Launchctl {
        command: &'static str,
        detail: String,
    },
}

impl LaunchAgentError {
    pub(crate) fn io(action: &'static str, path: &std::path::Path, source: io::Error) -> Self {
        Self::Io {
            action,
            path: path.display().to_string(),
            source,
        }
    }
}

/// Result type for LaunchAgent operations.
pub type Result<T> = std::result::Result<T, LaunchAgentError>;
