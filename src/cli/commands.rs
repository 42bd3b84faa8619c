//! Command definitions for the wakeup CLI.
//!
//! Uses clap derive macro for argument parsing.

use clap::{ArgGroup, Args, Parser, Subcommand};

use crate::platform::SettingsSurface;

// ============================================================================
// CLI Structure
// ============================================================================

/// wakeup - alarm daemon and CLI
#[derive(Parser, Debug)]
#[command(
    name = "wakeup",
    version,
    about = "バックグラウンドで動作するアラームデーモンとCLI",
    long_about = "正確なタイマーでアラームを鳴らし、停止・スヌーズを受け付けます。\n\
                  スヌーズ間隔は 5, 5, 5, 10 分...と段階的に変化します。",
    propagate_version = true
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

// ============================================================================
// Subcommands
// ============================================================================

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Schedule an alarm
    Schedule(ScheduleArgs),

    /// Cancel a scheduled alarm
    Cancel {
        /// Alarm identity
        id: String,
    },

    /// Cancel every scheduled alarm
    CancelAll,

    /// Ring an alarm immediately
    Ring(RingArgs),

    /// Stop the ringing alarm
    Stop,

    /// Snooze the ringing alarm
    Snooze,

    /// Show ringing session and pending alarms
    Status,

    /// Check permissions that affect alarm reliability
    Permissions,

    /// Open a system settings surface
    Settings {
        #[arg(value_enum)]
        surface: SettingsSurface,
    },

    /// Follow alarm events and show the alarm screen
    Watch {
        /// Only show events after this sequence number
        #[arg(long, default_value = "0")]
        since: u64,
    },

    /// Run as daemon (background service)
    #[command(hide = true)]
    Daemon,

    /// Install LaunchAgent for auto-start on login
    Install,

    /// Uninstall LaunchAgent
    Uninstall,

    /// Generate shell completion scripts
    Completions {
        /// Shell type for completion script
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

// ============================================================================
// Command Arguments
// ============================================================================

/// Arguments for the schedule command
#[derive(Args, Debug, Clone)]
#[command(group(ArgGroup::new("when").required(true).args(["at", "after"])))]
pub struct ScheduleArgs {
    /// Alarm identity
    pub id: String,

    /// Fire time in epoch milliseconds
    #[arg(long)]
    pub at: Option<i64>,

    /// Fire after a delay (e.g. 90s, 5m, 1h)
    #[arg(long = "in", value_name = "DELAY", value_parser = parse_delay)]
    pub after: Option<u64>,

    /// Sound: file path, file:// or content:// URI, or a recording name
    #[arg(short, long, default_value = "")]
    pub sound: String,

    /// Label shown while ringing
    #[arg(short, long, default_value = "", value_parser = validate_label)]
    pub label: String,
}

/// Arguments for the ring command
#[derive(Args, Debug, Clone, Default)]
pub struct RingArgs {
    /// Alarm identity
    #[arg(default_value = "")]
    pub id: String,

    /// Sound: file path, file:// or content:// URI, or a recording name
    #[arg(short, long, default_value = "")]
    pub sound: String,

    /// Label shown while ringing
    #[arg(short, long, default_value = "", value_parser = validate_label)]
    pub label: String,
}

// ============================================================================
// Validation Functions
// ============================================================================

/// Parses a delay such as `90s`, `5m` or `1h` into milliseconds.
///
/// A bare number is taken as minutes.
fn parse_delay(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let (digits, unit_ms) = match s.char_indices().last() {
        Some((i, 's')) => (&s[..i], 1_000),
        Some((i, 'm')) => (&s[..i], 60_000),
        Some((i, 'h')) => (&s[..i], 3_600_000),
        _ => (s, 60_000),
    };
    let value: u64 = digits
        .parse()
        .map_err(|_| format!("時間の形式が不正です: {} (例: 90s, 5m, 1h)", s))?;
    if value == 0 {
        return Err("時間は1以上で指定してください".to_string());
    }
    Ok(value * unit_ms)
}

/// Validates the label.
///
/// - Must not exceed 100 characters
fn validate_label(s: &str) -> Result<String, String> {
    if s.chars().count() > 100 {
        return Err("ラベルは100文字以内にしてください".to_string());
    }
    Ok(s.to_string())
}

// ============================================================================
// Tests
// ============================================================================
