//! Ringing notification.
//!
//! Every ringing session shows exactly one notification, always posted under
//! [`NOTIFICATION_ID`], so re-firing or re-notifying replaces the visible
//! notification instead of stacking a second one. The notification carries
//! the Stop and Snooze actions plus a tap target that opens the alarm screen.
//!
//! Backends:
//!
//! - `MacNotifier` (macOS): native notification via `objc2-user-notifications`
//! - [`CommandNotifier`] (other platforms): `notify-send`, closed via `gdbus`
//! - [`MockNotifier`]: records calls for tests
//!
//! # Requirements (macOS)
//!
//! The binary must be code-signed for notifications to be delivered:
//! ```bash
//! codesign --force --deep --sign - target/release/wakeup
//! ```

pub mod actions;
mod error;

#[cfg(target_os = "macos")]
mod center;
#[cfg(target_os = "macos")]
mod content;
#[cfg(target_os = "macos")]
mod delegate;
#[cfg(target_os = "macos")]
mod native;
#[cfg(target_os = "macos")]
mod request;

use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

pub use self::actions::{action_ids, category_ids};
pub use self::error::NotificationError;

#[cfg(target_os = "macos")]
pub use self::delegate::NotificationDelegate;
#[cfg(target_os = "macos")]
pub use self::native::MacNotifier;

use crate::types::AlarmId;

/// Numeric identity shared by every ringing notification.
pub const NOTIFICATION_ID: i32 = 12345;

/// Channel the ringing notification is posted on.
pub const CHANNEL_ID: &str = "alarm_audio_service_v4";

const TITLE: &str = "⏰ アラーム";
const DEFAULT_BODY: &str = "時間です。停止またはスヌーズを選んでください。";

// ============================================================================
// Notification model
// ============================================================================

/// Display priority of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationPriority {
    Default,
    Max,
}

/// Lock-screen visibility of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationVisibility {
    Private,
    Public,
}

/// A button shown on the notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationButton {
    /// Action identifier delivered back when pressed
    pub action: &'static str,
    /// Button title
    pub title: &'static str,
}

/// The ringing notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmNotification {
    pub id: i32,
    pub channel_id: &'static str,
    pub title: String,
    pub body: String,
    pub alarm_id: AlarmId,
    pub audio_ref: String,
    /// Cannot be swiped away
    pub ongoing: bool,
    pub priority: NotificationPriority,
    pub visibility: NotificationVisibility,
    pub bypass_dnd: bool,
    /// Opens the alarm screen when the notification is tapped
    pub full_screen_intent: bool,
    pub buttons: Vec<NotificationButton>,
}

impl AlarmNotification {
    /// Builds the ringing notification for an alarm.
    #[must_use]
    pub fn ringing(alarm_id: &AlarmId, label: &str, audio_ref: &str) -> Self {
        let label = sanitize_label(label);
        Self {
            id: NOTIFICATION_ID,
            channel_id: CHANNEL_ID,
            title: TITLE.to_string(),
            body: label.unwrap_or_else(|| DEFAULT_BODY.to_string()),
            alarm_id: alarm_id.clone(),
            audio_ref: audio_ref.to_string(),
            ongoing: true,
            priority: NotificationPriority::Max,
            visibility: NotificationVisibility::Public,
            bypass_dnd: true,
            full_screen_intent: true,
            buttons: vec![
                NotificationButton {
                    action: action_ids::STOP,
                    title: "停止",
                },
                NotificationButton {
                    action: action_ids::SNOOZE,
                    title: "スヌーズ",
                },
            ],
        }
    }
}

/// Maximum length of the label shown in the notification body.
const MAX_LABEL_LENGTH: usize = 100;

/// Truncates a label and strips control characters.
///
/// Returns `None` when nothing displayable remains.
pub fn sanitize_label(label: &str) -> Option<String> {
    let sanitized: String = label
        .chars()
        .take(MAX_LABEL_LENGTH)
        .filter(|c| !c.is_control())
        .collect();
    let trimmed = sanitized.trim();

    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// ============================================================================
// AlarmNotifier
// ============================================================================

/// Trait for notification backends.
pub trait AlarmNotifier: Send + Sync {
    /// Posts the ongoing notification and enters the foreground grant.
    ///
    /// # Errors
    ///
    /// Returns [`NotificationError::ForegroundRejected`] if the system
    /// refuses the grant.
    fn start_foreground(&self, notification: &AlarmNotification) -> Result<(), NotificationError>;

    /// Posts (or replaces) the notification without touching the grant.
    fn post(&self, notification: &AlarmNotification) -> Result<(), NotificationError>;

    /// Removes the notification with the given identity.
    fn cancel(&self, id: i32);

    /// Ends the foreground grant.
    fn stop_foreground(&self);

    /// Returns true if notifications can currently be shown.
    fn is_enabled(&self) -> bool;
}

impl<T: AlarmNotifier + ?Sized> AlarmNotifier for std::sync::Arc<T> {
    fn start_foreground(&self, notification: &AlarmNotification) -> Result<(), NotificationError> {
        (**self).start_foreground(notification)
    }

    fn post(&self, notification: &AlarmNotification) -> Result<(), NotificationError> {
        (**self).post(notification)
    }

    fn cancel(&self, id: i32) {
        (**self).cancel(id)
    }

    fn stop_foreground(&self) {
        (**self).stop_foreground()
    }

    fn is_enabled(&self) -> bool {
        (**self).is_enabled()
    }
}

// ============================================================================
// CommandNotifier
// ============================================================================

/// Notifier that shells out to `notify-send`.
///
/// The id assigned by the notification server is captured with
/// `--print-id`; later posts pass it back as `--replace-id` so the visible
/// notification is replaced in place, and `cancel` closes it over D-Bus.
#[derive(Debug)]
pub struct CommandNotifier {
    program: String,
    closer: String,
    foreground: AtomicBool,
    /// Server-side id of the visible ringing notification.
    server_id: Mutex<Option<u32>>,
}

impl CommandNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::with_programs("notify-send", "gdbus")
    }

    #[must_use]
    pub fn with_program(program: impl Into<String>) -> Self {
        Self::with_programs(program, "gdbus")
    }

    /// Uses `program` to post and `closer` (a `gdbus` compatible tool) to
    /// close notifications.
    #[must_use]
    pub fn with_programs(program: impl Into<String>, closer: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            closer: closer.into(),
            foreground: AtomicBool::new(false),
            server_id: Mutex::new(None),
        }
    }

    fn show(&self, notification: &AlarmNotification) -> Result<(), NotificationError> {
        let mut server_id = self
            .server_id
            .lock()
            .map_err(|_| NotificationError::SendFailed("notifier state poisoned".to_string()))?;

        let mut command = Command::new(&self.program);
        command
            .arg("--app-name=wakeup")
            .arg("--urgency=critical")
            .arg("--expire-time=0")
            .arg(format!("--category={}", category_ids::ALARM))
            .arg("--print-id");
        if let Some(id) = *server_id {
            command.arg(format!("--replace-id={}", id));
        }

        let output = command
            .arg(&notification.title)
            .arg(&notification.body)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .map_err(|e| NotificationError::SendFailed(format!("{}: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(NotificationError::SendFailed(format!(
                "{}: {}",
                self.program, output.status
            )));
        }

        match String::from_utf8_lossy(&output.stdout).trim().parse::<u32>() {
            Ok(id) => *server_id = Some(id),
            Err(_) => tracing::debug!(program = %self.program, "notification id not reported"),
        }
        Ok(())
    }

    fn close(&self, id: u32) {
        let result = Command::new(&self.closer)
            .args([
                "call",
                "--session",
                "--dest",
                "org.freedesktop.Notifications",
                "--object-path",
                "/org/freedesktop/Notifications",
                "--method",
                "org.freedesktop.Notifications.CloseNotification",
            ])
            .arg(id.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match result {
            Ok(status) if status.success() => tracing::debug!(id, "notification closed"),
            Ok(status) => tracing::warn!(id, %status, "通知を閉じられません"),
            Err(e) => tracing::warn!(id, "通知を閉じられません: {}: {}", self.closer, e),
        }
    }
}

impl Default for CommandNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl AlarmNotifier for CommandNotifier {
    fn start_foreground(&self, notification: &AlarmNotification) -> Result<(), NotificationError> {
        self.foreground.store(true, Ordering::SeqCst);
        if let Err(e) = self.show(notification) {
            // The daemon keeps running in the background either way.
            tracing::warn!("{}", e);
        }
        Ok(())
    }

    fn post(&self, notification: &AlarmNotification) -> Result<(), NotificationError> {
        self.show(notification)
    }

    fn cancel(&self, id: i32) {
        if id != NOTIFICATION_ID {
            return;
        }
        let taken = self
            .server_id
            .lock()
            .ok()
            .and_then(|mut server_id| server_id.take());
        if let Some(server_id) = taken {
            self.close(server_id);
        }
    }

    fn stop_foreground(&self) {
        self.foreground.store(false, Ordering::SeqCst);
    }

    fn is_enabled(&self) -> bool {
        which(&self.program)
    }
}

/// Returns true if `program` is an executable found on `PATH`.
pub(crate) fn which(program: &str) -> bool {
    let Some(paths) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&paths).any(|dir| dir.join(program).is_file())
}

// ============================================================================
// MockNotifier
// ============================================================================

/// A call recorded by [`MockNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifierCall {
    StartForeground(AlarmNotification),
    Post(AlarmNotification),
    Cancel(i32),
    StopForeground,
}

/// Mock notifier for testing.
#[derive(Debug)]
pub struct MockNotifier {
    calls: Mutex<Vec<NotifierCall>>,
    visible: Mutex<Option<AlarmNotification>>,
    foreground: AtomicBool,
    reject_foreground: AtomicBool,
    enabled: AtomicBool,
}

impl MockNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            visible: Mutex::new(None),
            foreground: AtomicBool::new(false),
            reject_foreground: AtomicBool::new(false),
            enabled: AtomicBool::new(true),
        }
    }

    /// Makes `start_foreground` fail as if the system refused the grant.
    pub fn set_reject_foreground(&self, reject: bool) {
        self.reject_foreground.store(reject, Ordering::SeqCst);
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    #[must_use]
    pub fn calls(&self) -> Vec<NotifierCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Returns the currently visible notification, if any.
    #[must_use]
    pub fn visible(&self) -> Option<AlarmNotification> {
        self.visible.lock().unwrap().clone()
    }

    #[must_use]
    pub fn in_foreground(&self) -> bool {
        self.foreground.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn post_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| {
                matches!(
                    call,
                    NotifierCall::Post(_) | NotifierCall::StartForeground(_)
                )
            })
            .count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

impl Default for MockNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl AlarmNotifier for MockNotifier {
    fn start_foreground(&self, notification: &AlarmNotification) -> Result<(), NotificationError> {
        self.calls
            .lock()
            .unwrap()
            .push(NotifierCall::StartForeground(notification.clone()));
        if self.reject_foreground.load(Ordering::SeqCst) {
            return Err(NotificationError::ForegroundRejected(
                "Mock rejection".to_string(),
            ));
        }
        self.foreground.store(true, Ordering::SeqCst);
        *self.visible.lock().unwrap() = Some(notification.clone());
        Ok(())
    }

    fn post(&self, notification: &AlarmNotification) -> Result<(), NotificationError> {
        self.calls
            .lock()
            .unwrap()
            .push(NotifierCall::Post(notification.clone()));
        *self.visible.lock().unwrap() = Some(notification.clone());
        Ok(())
    }

    fn cancel(&self, id: i32) {
        self.calls.lock().unwrap().push(NotifierCall::Cancel(id));
        let mut visible = self.visible.lock().unwrap();
        if visible.as_ref().is_some_and(|n| n.id == id) {
            *visible = None;
        }
    }

    fn stop_foreground(&self) {
        self.calls.lock().unwrap().push(NotifierCall::StopForeground);
        self.foreground.store(false, Ordering::SeqCst);
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ------------------------------------------------------------------------
    // AlarmNotification Tests
    // ------------------------------------------------------------------------

    mod alarm_notification_tests {
        use super::*;

        #[test]
        fn test_ringing_uses_fixed_identity() {
            let a = AlarmNotification::ringing(&AlarmId::new("a1"), "", "");
            let b = AlarmNotification::ringing(&AlarmId::new("b2"), "", "");
            assert_eq!(a.id, NOTIFICATION_ID);
            assert_eq!(a.id, b.id);
            assert_eq!(a.channel_id, CHANNEL_ID);
        }

        #[test]
        fn test_ringing_flags() {
            let n = AlarmNotification::ringing(&AlarmId::new("a1"), "Wake", "song.mp3");
            assert!(n.ongoing);
            assert!(n.bypass_dnd);
            assert!(n.full_screen_intent);
            assert_eq!(n.priority, NotificationPriority::Max);
            assert_eq!(n.visibility, NotificationVisibility::Public);
            assert_eq!(n.audio_ref, "song.mp3");
        }

        #[test]
        fn test_ringing_has_stop_and_snooze() {
            let n = AlarmNotification::ringing(&AlarmId::new("a1"), "", "");
            let actions: Vec<&str> = n.buttons.iter().map(|b| b.action).collect();
            assert_eq!(actions, vec![action_ids::STOP, action_ids::SNOOZE]);
        }

        #[test]
        fn test_label_becomes_body() {
            let n = AlarmNotification::ringing(&AlarmId::new("a1"), "朝会", "");
            assert_eq!(n.body, "朝会");

            let n = AlarmNotification::ringing(&AlarmId::new("a1"), "", "");
            assert_eq!(n.body, DEFAULT_BODY);
        }
    }

    // ------------------------------------------------------------------------
    // sanitize_label Tests
    // ------------------------------------------------------------------------

    mod sanitize_label_tests {
        use super::*;

        #[test]
        fn test_valid() {
            assert_eq!(sanitize_label("起床"), Some("起床".to_string()));
        }

        #[test]
        fn test_truncates_long() {
            let long = "a".repeat(150);
            assert_eq!(sanitize_label(&long).unwrap().len(), MAX_LABEL_LENGTH);
        }

        #[test]
        fn test_removes_control_chars() {
            assert_eq!(
                sanitize_label("wake\n\r\tup"),
                Some("wakeup".to_string())
            );
        }

        #[test]
        fn test_empty() {
            assert!(sanitize_label("").is_none());
            assert!(sanitize_label("\n\t ").is_none());
        }
    }

    // ------------------------------------------------------------------------
    // MockNotifier Tests
    // ------------------------------------------------------------------------

    mod mock_notifier_tests {
        use super::*;

        #[test]
        fn test_foreground_lifecycle() {
            let mock = MockNotifier::new();
            let n = AlarmNotification::ringing(&AlarmId::new("a1"), "", "");

            mock.start_foreground(&n).unwrap();
            assert!(mock.in_foreground());
            assert_eq!(mock.visible(), Some(n.clone()));

            mock.cancel(NOTIFICATION_ID);
            mock.stop_foreground();
            assert!(!mock.in_foreground());
            assert!(mock.visible().is_none());
        }

        #[test]
        fn test_reject_foreground() {
            let mock = MockNotifier::new();
            mock.set_reject_foreground(true);
            let n = AlarmNotification::ringing(&AlarmId::new("a1"), "", "");

            let err = mock.start_foreground(&n).unwrap_err();
            assert!(matches!(err, NotificationError::ForegroundRejected(_)));
            assert!(!mock.in_foreground());
        }

        #[test]
        fn test_post_replaces_visible() {
            let mock = MockNotifier::new();
            mock.post(&AlarmNotification::ringing(&AlarmId::new("a1"), "", ""))
                .unwrap();
            mock.post(&AlarmNotification::ringing(&AlarmId::new("b2"), "", ""))
                .unwrap();

            assert_eq!(mock.post_count(), 2);
            assert_eq!(mock.visible().unwrap().alarm_id, AlarmId::new("b2"));
        }

        #[test]
        fn test_enabled_flag() {
            let mock = MockNotifier::new();
            assert!(mock.is_enabled());
            mock.set_enabled(false);
            assert!(!mock.is_enabled());
        }
    }

    // ------------------------------------------------------------------------
    // CommandNotifier Tests
    // ------------------------------------------------------------------------

    mod command_notifier_tests {
        use super::*;

        #[test]
        fn test_missing_program_is_disabled() {
            let notifier = CommandNotifier::with_program("wakeup-no-such-notifier");
            assert!(!notifier.is_enabled());
        }

        #[test]
        fn test_missing_program_post_fails() {
            let notifier = CommandNotifier::with_program("wakeup-no-such-notifier");
            let n = AlarmNotification::ringing(&AlarmId::new("a1"), "", "");
            assert!(notifier.post(&n).is_err());
        }

        #[test]
        fn test_start_foreground_tolerates_missing_program() {
            let notifier = CommandNotifier::with_program("wakeup-no-such-notifier");
            let n = AlarmNotification::ringing(&AlarmId::new("a1"), "", "");
            assert!(notifier.start_foreground(&n).is_ok());
        }

        /// Writes a shell script that appends its arguments to `log` and
        /// prints `stdout`.
        #[cfg(unix)]
        fn fake_program(
            dir: &std::path::Path,
            name: &str,
            log: &std::path::Path,
            stdout: &str,
        ) -> String {
            use std::os::unix::fs::PermissionsExt;

            let path = dir.join(name);
            std::fs::write(
                &path,
                format!(
                    "#!/bin/sh\necho \"$@\" >> '{}'\necho '{}'\n",
                    log.display(),
                    stdout
                ),
            )
            .unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path.display().to_string()
        }

        #[cfg(unix)]
        #[test]
        fn test_renotify_replaces_and_cancel_closes() {
            let dir = tempfile::tempdir().unwrap();
            let posts = dir.path().join("posts.log");
            let closes = dir.path().join("closes.log");
            let notifier = CommandNotifier::with_programs(
                fake_program(dir.path(), "notify", &posts, "42"),
                fake_program(dir.path(), "closer", &closes, ""),
            );
            let n = AlarmNotification::ringing(&AlarmId::new("a1"), "", "");

            notifier.start_foreground(&n).unwrap();
            notifier.post(&n).unwrap();
            notifier.cancel(NOTIFICATION_ID);
            notifier.post(&n).unwrap();

            let posts = std::fs::read_to_string(&posts).unwrap();
            let lines: Vec<&str> = posts.lines().collect();
            assert_eq!(lines.len(), 3);
            assert!(lines.iter().all(|line| line.contains("--print-id")));
            assert!(!lines[0].contains("--replace-id"));
            assert!(lines[1].contains("--replace-id=42"));
            assert!(!lines[2].contains("--replace-id"));

            let closes = std::fs::read_to_string(&closes).unwrap();
            assert_eq!(closes.lines().count(), 1);
            assert!(closes.contains("org.freedesktop.Notifications.CloseNotification 42"));
        }

        #[cfg(unix)]
        #[test]
        fn test_cancel_without_visible_notification_is_noop() {
            let dir = tempfile::tempdir().unwrap();
            let closes = dir.path().join("closes.log");
            let notifier = CommandNotifier::with_programs(
                "wakeup-no-such-notifier",
                fake_program(dir.path(), "closer", &closes, ""),
            );

            notifier.cancel(NOTIFICATION_ID);
            assert!(!closes.exists());
        }
    }
}
