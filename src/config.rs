//! Daemon configuration.
//!
//! Loaded from `~/.wakeup/config.json` when the file exists; every field is
//! optional and falls back to its default.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::session::default_inhibitor_command;
use crate::snooze::DEFAULT_SNOOZE_SEQUENCE;

/// Directory name under the home directory.
const WAKEUP_DIR: &str = ".wakeup";

/// Longest accepted snooze delay in minutes.
const MAX_SNOOZE_MINUTES: u32 = 60;

/// Longest accepted restore grace window in minutes.
const MAX_RESTORE_GRACE_MINUTES: u64 = 24 * 60;

/// Returns `~/.wakeup`.
#[must_use]
pub fn wakeup_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(WAKEUP_DIR))
        .unwrap_or_else(|| PathBuf::from(WAKEUP_DIR))
}

/// Returns the default configuration file path.
#[must_use]
pub fn default_config_path() -> PathBuf {
    wakeup_dir().join("config.json")
}

fn default_snooze_sequence() -> Vec<u32> {
    DEFAULT_SNOOZE_SEQUENCE.to_vec()
}

fn default_socket_path() -> PathBuf {
    wakeup_dir().join("wakeup.sock")
}

fn default_state_path() -> PathBuf {
    wakeup_dir().join("state.json")
}

fn default_sound_search_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![wakeup_dir().join("sounds")];
    if let Some(audio) = dirs::audio_dir() {
        dirs.push(audio);
    }
    dirs
}

fn default_true() -> bool {
    true
}

fn default_restore_grace_minutes() -> u64 {
    10
}

/// Alarm daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlarmConfig {
    /// Snooze delays in minutes; the last entry repeats.
    #[serde(default = "default_snooze_sequence")]
    pub snooze_sequence: Vec<u32>,

    /// IPC socket path.
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// Durable key-value state (snooze counters, pending alarms).
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,

    /// Root that `content://` audio references resolve against.
    #[serde(default)]
    pub content_root: Option<PathBuf>,

    /// Directories searched for bare recording names.
    #[serde(default = "default_sound_search_dirs")]
    pub sound_search_dirs: Vec<PathBuf>,

    /// Whether exact timers may be registered.
    #[serde(default = "default_true")]
    pub exact_timers: bool,

    /// Whether the alarm screen opens directly when an alarm fires.
    #[serde(default = "default_true")]
    pub launch_full_screen: bool,

    /// Alarms missed by less than this many minutes ring at startup.
    #[serde(default = "default_restore_grace_minutes")]
    pub restore_grace_minutes: u64,

    /// Command that keeps the machine awake while ringing.
    #[serde(default = "default_inhibitor_command")]
    pub wake_lock_command: Vec<String>,

    /// Device manufacturer, used to pick power-management instructions.
    #[serde(default)]
    pub manufacturer: String,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            snooze_sequence: default_snooze_sequence(),
            socket_path: default_socket_path(),
            state_path: default_state_path(),
            content_root: None,
            sound_search_dirs: default_sound_search_dirs(),
            exact_timers: true,
            launch_full_screen: true,
            restore_grace_minutes: default_restore_grace_minutes(),
            wake_lock_command: default_inhibitor_command(),
            manufacturer: String::new(),
        }
    }
}

impl AlarmConfig {
    /// Loads the configuration from the default path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&default_config_path())
    }

    /// Loads the configuration from `path`, or the defaults if it is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed,
    /// or if the values are out of range.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("設定ファイルを読み込めません: {}", path.display()))?;
        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("設定ファイルの形式が不正です: {}", path.display()))?;
        config.validate().map_err(anyhow::Error::msg)?;
        Ok(config)
    }

    /// Returns the restore grace window in milliseconds.
    #[must_use]
    pub fn restore_grace_ms(&self) -> i64 {
        i64::try_from(self.restore_grace_minutes * 60_000).unwrap_or(i64::MAX)
    }

    /// Validates the configuration.
    ///
    /// Returns an error message if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        if self.snooze_sequence.is_empty() {
            return Err("スヌーズ間隔を1つ以上指定してください".to_string());
        }
        if self
            .snooze_sequence
            .iter()
            .any(|&minutes| minutes < 1 || minutes > MAX_SNOOZE_MINUTES)
        {
            return Err(format!(
                "スヌーズ間隔は1-{}分の範囲で指定してください",
                MAX_SNOOZE_MINUTES
            ));
        }
        if self.restore_grace_minutes > MAX_RESTORE_GRACE_MINUTES {
            return Err(format!(
                "復元猶予は0-{}分の範囲で指定してください",
                MAX_RESTORE_GRACE_MINUTES
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AlarmConfig::default();

        assert_eq!(config.snooze_sequence[..4], [5, 5, 5, 10]);
        assert!(config.exact_timers);
        assert!(config.launch_full_screen);
        assert_eq!(config.restore_grace_minutes, 10);
        assert_eq!(config.restore_grace_ms(), 600_000);
        assert!(config.socket_path.ends_with(".wakeup/wakeup.sock"));
        assert!(config.state_path.ends_with(".wakeup/state.json"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_json_with_defaults() {
        let json = r#"{"exact_timers": false, "manufacturer": "xiaomi"}"#;
        let config: AlarmConfig = serde_json::from_str(json).unwrap();

        assert!(!config.exact_timers);
        assert_eq!(config.manufacturer, "xiaomi");
        assert_eq!(config.snooze_sequence, default_snooze_sequence());
        assert!(config.launch_full_screen);
    }

    #[test]
    fn test_validate_empty_sequence() {
        let config = AlarmConfig {
            snooze_sequence: vec![],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_sequence_bounds() {
        let config = AlarmConfig {
            snooze_sequence: vec![1, 60],
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        let config = AlarmConfig {
            snooze_sequence: vec![5, 0],
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = AlarmConfig {
            snooze_sequence: vec![61],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_grace_window() {
        let config = AlarmConfig {
            restore_grace_minutes: 24 * 60 + 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = AlarmConfig::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, AlarmConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"snooze_sequence": [1, 2], "launch_full_screen": false}"#)
            .unwrap();

        let config = AlarmConfig::load_from(&path).unwrap();
        assert_eq!(config.snooze_sequence, vec![1, 2]);
        assert!(!config.launch_full_screen);
    }

    #[test]
    fn test_load_rejects_invalid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        std::fs::write(&path, "not json").unwrap();
        assert!(AlarmConfig::load_from(&path).is_err());

        std::fs::write(&path, r#"{"snooze_sequence": []}"#).unwrap();
        assert!(AlarmConfig::load_from(&path).is_err());
    }
}
