//! Notification content construction.

use objc2::rc::Retained;
use objc2_foundation::NSString;
use objc2_user_notifications::{UNMutableNotificationContent, UNNotificationInterruptionLevel};

use super::actions::category_ids;
use super::AlarmNotification;

/// Builder for constructing notification content.
pub struct NotificationContentBuilder {
    content: Retained<UNMutableNotificationContent>,
}

impl NotificationContentBuilder {
    #[must_use]
    pub fn new() -> Self {
        let content = unsafe { UNMutableNotificationContent::new() };
        Self { content }
    }

    #[must_use]
    pub fn title(self, title: &str) -> Self {
        let title = NSString::from_str(title);
        unsafe {
            self.content.setTitle(&title);
        }
        self
    }

    #[must_use]
    pub fn body(self, body: &str) -> Self {
        let body = NSString::from_str(body);
        unsafe {
            self.content.setBody(&body);
        }
        self
    }

    /// Sets the category identifier for action buttons.
    #[must_use]
    pub fn category_identifier(self, category_id: &str) -> Self {
        let category_id = NSString::from_str(category_id);
        unsafe {
            self.content.setCategoryIdentifier(&category_id);
        }
        self
    }

    /// Lets the notification break through Focus modes.
    #[must_use]
    pub fn time_sensitive(self) -> Self {
        unsafe {
            self.content
                .setInterruptionLevel(UNNotificationInterruptionLevel::TimeSensitive);
        }
        self
    }

    #[must_use]
    pub fn build(self) -> Retained<UNMutableNotificationContent> {
        self.content
    }
}

impl Default for NotificationContentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Creates native content for the ringing notification.
///
/// No notification sound is attached: the alarm audio comes from the
/// session's own player.
#[must_use]
pub fn create_alarm_content(notification: &AlarmNotification) -> Retained<UNMutableNotificationContent> {
    let builder = NotificationContentBuilder::new()
        .title(&notification.title)
        .body(&notification.body)
        .category_identifier(category_ids::ALARM);

    if notification.bypass_dnd {
        builder.time_sensitive().build()
    } else {
        builder.build()
    }
}
