//! Platform capability checks and settings surfaces.
//!
//! Nothing here is required for an alarm to ring; these are the hooks the
//! user needs to make alarms reliable on their machine.

pub mod oem;
mod settings;

use thiserror::Error;

pub use oem::oem_instructions;
pub use settings::{MockSettingsOpener, SettingsOpener, SettingsSurface, SystemSettingsOpener};

use crate::notification::which;
use crate::types::PermissionStatus;

/// Errors from platform operations.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("{program} を起動できませんでした: {source}")]
    LaunchFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("この環境では {0} の設定画面を開けません")]
    Unsupported(String),
}

/// Returns true if the sleep inhibitor in `wake_lock_command` is installed.
///
/// Without it the machine may suspend through a scheduled alarm.
#[must_use]
pub fn battery_unrestricted(wake_lock_command: &[String]) -> bool {
    wake_lock_command
        .first()
        .is_some_and(|program| which(program))
}

/// Builds the permission report.
#[must_use]
pub fn permission_status(
    can_schedule_exact_timers: bool,
    battery_unrestricted: bool,
    notifications_enabled: bool,
    manufacturer: &str,
) -> PermissionStatus {
    PermissionStatus {
        can_schedule_exact_timers,
        battery_unrestricted,
        notifications_enabled,
        all_granted: can_schedule_exact_timers && battery_unrestricted && notifications_enabled,
        oem_instructions: oem_instructions(manufacturer).to_string(),
    }
}
