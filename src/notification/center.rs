//! UNUserNotificationCenter wrapper.

use std::cell::RefCell;
use std::ptr::NonNull;

use block2::RcBlock;
use objc2::rc::Retained;
use objc2::runtime::{Bool, ProtocolObject};
use objc2_foundation::{NSArray, NSError, NSSet, NSString};
use objc2_user_notifications::{
    UNAuthorizationOptions, UNAuthorizationStatus, UNNotificationCategory, UNNotificationRequest,
    UNNotificationSettings, UNUserNotificationCenter, UNUserNotificationCenterDelegate,
};
use tokio::sync::oneshot;

use super::error::NotificationError;

pub struct NotificationCenter;

impl NotificationCenter {
    #[must_use]
    pub fn current() -> Retained<UNUserNotificationCenter> {
        UNUserNotificationCenter::currentNotificationCenter()
    }

    pub async fn request_authorization() -> Result<bool, NotificationError> {
        let (tx, rx) = oneshot::channel::<Result<bool, NotificationError>>();

        let options = UNAuthorizationOptions::Alert
            | UNAuthorizationOptions::Sound
            | UNAuthorizationOptions::TimeSensitive;

        let cb = RefCell::new(Some(tx));
        let block = RcBlock::new(move |granted: Bool, error: *mut NSError| {
            if let Some(sender) = cb.borrow_mut().take() {
                let result = match unsafe { error.as_ref() } {
                    Some(err) => Err(NotificationError::AuthorizationFailed(
                        err.localizedDescription().to_string(),
                    )),
                    None => Ok(granted.as_bool()),
                };
                let _ = sender.send(result);
            }
        });

        Self::current().requestAuthorizationWithOptions_completionHandler(options, &block);

        rx.await
            .map_err(|_| NotificationError::InitializationFailed("Channel closed".to_string()))?
    }

    pub async fn get_authorization_status() -> Result<UNAuthorizationStatus, NotificationError> {
        let (tx, rx) = oneshot::channel::<UNAuthorizationStatus>();

        let cb = RefCell::new(Some(tx));
        let block = RcBlock::new(move |settings: NonNull<UNNotificationSettings>| {
            if let Some(sender) = cb.borrow_mut().take() {
                let status = unsafe { settings.as_ref().authorizationStatus() };
                let _ = sender.send(status);
            }
        });

        Self::current().getNotificationSettingsWithCompletionHandler(&block);

        rx.await
            .map_err(|_| NotificationError::InitializationFailed("Channel closed".to_string()))
    }

    pub async fn is_authorized() -> Result<bool, NotificationError> {
        let status = Self::get_authorization_status().await?;
        Ok(matches!(
            status,
            UNAuthorizationStatus::Authorized
                | UNAuthorizationStatus::Provisional
                | UNAuthorizationStatus::Ephemeral
        ))
    }

    pub fn set_notification_categories(categories: &[Retained<UNNotificationCategory>]) {
        let refs: Vec<&UNNotificationCategory> = categories.iter().map(|c| c.as_ref()).collect();
        let categories_set: Retained<NSSet<UNNotificationCategory>> = NSSet::from_slice(&refs);

        Self::current().setNotificationCategories(&categories_set);
    }

    pub fn set_delegate(delegate: &ProtocolObject<dyn UNUserNotificationCenterDelegate>) {
        Self::current().setDelegate(Some(delegate));
    }

    /// Submits a request without waiting for the result.
    ///
    /// Delivery failures are reported asynchronously and only logged.
    pub fn submit_request(request: &UNNotificationRequest) {
        let block = RcBlock::new(move |error: *mut NSError| {
            if let Some(err) = unsafe { error.as_ref() } {
                tracing::warn!(
                    "{}",
                    NotificationError::SendFailed(err.localizedDescription().to_string())
                );
            }
        });

        Self::current().addNotificationRequest_withCompletionHandler(request, Some(&block));
    }

    /// Removes delivered and pending notifications with the given identifier.
    pub fn remove_notification(identifier: &str) {
        let identifier = NSString::from_str(identifier);
        let identifiers: Retained<NSArray<NSString>> = NSArray::from_slice(&[&*identifier]);

        let center = Self::current();
        center.removeDeliveredNotificationsWithIdentifiers(&identifiers);
        center.removePendingNotificationRequestsWithIdentifiers(&identifiers);
    }
}
