//! LaunchAgent management for macOS.
//!
//! `wakeup install` registers `wakeup daemon` with launchd so the daemon
//! starts at login and is restarted if it dies. Restarting matters for an
//! alarm clock: the daemon re-arms pending alarms from its state file on
//! startup.

pub mod error;
pub mod plist;

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;

pub use error::{LaunchAgentError, Result};
pub use plist::WakeupLaunchAgent;

use crate::config::wakeup_dir;

/// Returns the plist path inside `~/Library/LaunchAgents`.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn plist_path() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or(LaunchAgentError::HomeDirectoryNotFound)?;
    Ok(home
        .join("Library/LaunchAgents")
        .join(format!("{}.plist", WakeupLaunchAgent::LABEL)))
}

/// Returns whether the plist is installed.
pub fn is_installed() -> bool {
    plist_path().map(|path| path.exists()).unwrap_or(false)
}

/// Installs and loads the LaunchAgent.
///
/// Reinstalling replaces the existing definition.
///
/// # Errors
///
/// Returns an error if the plist cannot be written or `launchctl load`
/// fails.
pub fn install() -> Result<()> {
    let binary = std::env::current_exe().map_err(LaunchAgentError::BinaryPath)?;
    let log_dir = wakeup_dir().join("logs");
    fs::create_dir_all(&log_dir)
        .map_err(|e| LaunchAgentError::io("ログディレクトリの作成", &log_dir, e))?;

    let agent = WakeupLaunchAgent::new(
        binary.to_string_lossy().to_string(),
        &log_dir.to_string_lossy(),
    )
    .with_log_filter("info");

    let path = plist_path()?;
    write_plist(&path, &agent)?;

    // Reload so a changed definition takes effect
    if let Err(e) = launchctl("unload", &path) {
        tracing::debug!("{}", e);
    }
    launchctl("load", &path)?;

    tracing::info!(path = %path.display(), "LaunchAgent installed");
    Ok(())
}

/// Unloads and removes the LaunchAgent. Does nothing if not installed.
///
/// # Errors
///
/// Returns an error if the plist cannot be removed.
pub fn uninstall() -> Result<()> {
    let path = plist_path()?;
    if !path.exists() {
        tracing::info!("LaunchAgent is not installed");
        return Ok(());
    }

    if let Err(e) = launchctl("unload", &path) {
        tracing::warn!("{}", e);
    }
    fs::remove_file(&path).map_err(|e| LaunchAgentError::io("plistの削除", &path, e))?;

    tracing::info!("LaunchAgent uninstalled");
    Ok(())
}

/// Writes the plist with mode 0644, creating the parent directory.
fn write_plist(path: &Path, agent: &WakeupLaunchAgent) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| LaunchAgentError::io("ディレクトリの作成", parent, e))?;
    }
    fs::write(path, agent.to_xml()?)
        .map_err(|e| LaunchAgentError::io("plistの書き込み", path, e))?;
    fs::set_permissions(path, fs::Permissions::from_mode(0o644))
        .map_err(|e| LaunchAgentError::io("権限の設定", path, e))
}

fn launchctl(command: &'static str, plist: &Path) -> Result<()> {
    let output = Command::new("launchctl")
        .arg(command)
        .arg(plist)
        .output()
        .map_err(|e| LaunchAgentError::Launchctl {
            command,
            detail: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(LaunchAgentError::Launchctl {
            command,
            detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}
