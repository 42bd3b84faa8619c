//! Notification request creation.

use objc2::rc::Retained;
use objc2_foundation::NSString;
use objc2_user_notifications::{UNMutableNotificationContent, UNNotificationRequest};

/// Request identifier derived from a numeric notification identity.
///
/// Posting a request with an identifier already on screen replaces it.
#[must_use]
pub fn request_identifier(id: i32) -> String {
    format!("wakeup-alarm-{id}")
}

#[must_use]
pub fn create_notification_request(
    id: i32,
    content: &UNMutableNotificationContent,
) -> Retained<UNNotificationRequest> {
    let identifier = NSString::from_str(&request_identifier(id));

    UNNotificationRequest::requestWithIdentifier_content_trigger(&identifier, content, None)
}
