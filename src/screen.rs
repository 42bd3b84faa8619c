//! Full-screen ringing UI.
//!
//! The daemon has no window of its own. [`EventScreen`] tracks which alarm
//! the screen is showing; clients render it when they observe the
//! `openAlarmScreen` event (`wakeup watch` does). The screen's Stop and
//! Snooze controls produce the same [`AlarmAction`]s as the notification
//! buttons, see [`RingingScreenControls`].

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::dispatch::AlarmAction;
use crate::types::AlarmId;

/// What the ringing screen shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenRequest {
    pub alarm_id: AlarmId,
    pub label: String,
    pub audio_ref: String,
}

/// Trait for full-screen UI surfaces.
pub trait AlarmScreen: Send + Sync {
    /// Shows (or re-shows) the ringing screen.
    fn show(&self, request: &ScreenRequest);

    fn close(&self);

    fn is_visible(&self) -> bool;
}

/// Screen surfaced through the event log.
#[derive(Debug, Default)]
pub struct EventScreen {
    showing: Mutex<Option<ScreenRequest>>,
}

impl EventScreen {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the request currently on screen.
    #[must_use]
    pub fn showing(&self) -> Option<ScreenRequest> {
        self.showing.lock().ok().and_then(|showing| showing.clone())
    }
}

impl AlarmScreen for EventScreen {
    fn show(&self, request: &ScreenRequest) {
        tracing::debug!(alarm_id = %request.alarm_id, "alarm screen shown");
        if let Ok(mut showing) = self.showing.lock() {
            *showing = Some(request.clone());
        }
    }

    fn close(&self) {
        if let Ok(mut showing) = self.showing.lock() {
            if showing.take().is_some() {
                tracing::debug!("alarm screen closed");
            }
        }
    }

    fn is_visible(&self) -> bool {
        self.showing
            .lock()
            .map(|showing| showing.is_some())
            .unwrap_or(false)
    }
}

/// Mock screen for testing.
#[derive(Debug, Default)]
pub struct MockScreen {
    shown: Mutex<Vec<ScreenRequest>>,
    visible: std::sync::atomic::AtomicBool,
}

impl MockScreen {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every request the screen was shown with.
    #[must_use]
    pub fn shown(&self) -> Vec<ScreenRequest> {
        self.shown.lock().unwrap().clone()
    }
}

impl AlarmScreen for MockScreen {
    fn show(&self, request: &ScreenRequest) {
        self.shown.lock().unwrap().push(request.clone());
        self.visible
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }

    fn close(&self) {
        self.visible
            .store(false, std::sync::atomic::Ordering::SeqCst);
    }

    fn is_visible(&self) -> bool {
        self.visible.load(std::sync::atomic::Ordering::SeqCst)
    }
}

/// Controls of the ringing screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingingScreenControls {
    request: ScreenRequest,
}

impl RingingScreenControls {
    #[must_use]
    pub fn new(request: ScreenRequest) -> Self {
        Self { request }
    }

    #[must_use]
    pub fn request(&self) -> &ScreenRequest {
        &self.request
    }

    /// Title shown at the top of the screen.
    #[must_use]
    pub fn title(&self) -> &str {
        if self.request.label.trim().is_empty() {
            "アラーム"
        } else {
            &self.request.label
        }
    }

    /// Action of the Stop control.
    #[must_use]
    pub fn stop(&self) -> AlarmAction {
        AlarmAction::Stop {
            alarm_id: self.request.alarm_id.clone(),
        }
    }

    /// Action of the Snooze control.
    #[must_use]
    pub fn snooze(&self) -> AlarmAction {
        AlarmAction::Snooze {
            alarm_id: self.request.alarm_id.clone(),
            audio_ref: self.request.audio_ref.clone(),
        }
    }
}
