//! System settings surfaces.
//!
//! Each surface is opened by handing a URL or settings panel to the desktop
//! opener. Nothing waits for the user: the call returns once the opener has
//! been launched.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::PlatformError;

/// A settings surface the user can be sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SettingsSurface {
    /// Power management / battery optimization
    Battery,
    /// Exact timer capability
    ExactTimer,
    /// Notification settings of the app
    App,
}

impl SettingsSurface {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Battery => "battery",
            Self::ExactTimer => "exact-timer",
            Self::App => "app",
        }
    }
}

/// Trait for opening settings surfaces.
pub trait SettingsOpener: Send + Sync {
    /// Opens `surface`.
    ///
    /// # Errors
    ///
    /// Returns an error if the opener could not be launched.
    fn open(&self, surface: SettingsSurface) -> Result<(), PlatformError>;
}

impl<T: SettingsOpener + ?Sized> SettingsOpener for std::sync::Arc<T> {
    fn open(&self, surface: SettingsSurface) -> Result<(), PlatformError> {
        (**self).open(surface)
    }
}

/// Opens settings through the desktop's own opener.
///
/// Exact timers are a configuration switch of the daemon rather than a
/// system permission, so that surface opens the configuration file.
#[derive(Debug, Clone)]
pub struct SystemSettingsOpener {
    config_path: PathBuf,
}

impl SystemSettingsOpener {
    #[must_use]
    pub fn new(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// Returns the command line that opens `surface`.
    #[must_use]
    pub fn command_for(&self, surface: SettingsSurface) -> Vec<String> {
        let config = self.config_path.display().to_string();
        if cfg!(target_os = "macos") {
            let target = match surface {
                SettingsSurface::Battery => {
                    "x-apple.systempreferences:com.apple.preference.battery".to_string()
                }
                SettingsSurface::ExactTimer => config,
                SettingsSurface::App => {
                    "x-apple.systempreferences:com.apple.preference.notifications".to_string()
                }
            };
            vec!["open".to_string(), target]
        } else {
            match surface {
                SettingsSurface::Battery => {
                    vec!["gnome-control-center".to_string(), "power".to_string()]
                }
                SettingsSurface::ExactTimer => vec!["xdg-open".to_string(), config],
                SettingsSurface::App => vec![
                    "gnome-control-center".to_string(),
                    "notifications".to_string(),
                ],
            }
        }
    }
}

impl SettingsOpener for SystemSettingsOpener {
    fn open(&self, surface: SettingsSurface) -> Result<(), PlatformError> {
        let command = self.command_for(surface);
        let Some((program, args)) = command.split_first() else {
            return Err(PlatformError::Unsupported(surface.as_str().to_string()));
        };

        Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| PlatformError::LaunchFailed {
                program: program.clone(),
                source,
            })?;

        tracing::info!(surface = surface.as_str(), program, "settings surface opened");
        Ok(())
    }
}

/// Mock opener for testing.
#[derive(Debug, Default)]
pub struct MockSettingsOpener {
    opened: Mutex<Vec<SettingsSurface>>,
}

impl MockSettingsOpener {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn opened(&self) -> Vec<SettingsSurface> {
        self.opened.lock().unwrap().clone()
    }
}

impl SettingsOpener for MockSettingsOpener {
    fn open(&self, surface: SettingsSurface) -> Result<(), PlatformError> {
        self.opened.lock().unwrap().push(surface);
        Ok(())
    }
}
