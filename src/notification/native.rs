//! Native macOS notifier.

use std::sync::atomic::{AtomicBool, Ordering};

use objc2::rc::Retained;
use objc2::MainThreadMarker;
use tokio::sync::mpsc::UnboundedSender;

use super::actions::create_categories;
use super::center::NotificationCenter;
use super::content::create_alarm_content;
use super::delegate::NotificationDelegate;
use super::error::NotificationError;
use super::request::{create_notification_request, request_identifier};
use super::{AlarmNotification, AlarmNotifier};

/// Notifier backed by `UNUserNotificationCenter`.
///
/// The delegate returned by [`MacNotifier::initialize`] must be kept alive
/// for as long as notification responses should be delivered.
#[derive(Debug)]
pub struct MacNotifier {
    authorized: AtomicBool,
    foreground: AtomicBool,
}

impl MacNotifier {
    /// Requests authorization, installs the delegate and registers the
    /// ringing category.
    ///
    /// # Errors
    ///
    /// Returns an error if not called on the main thread or if the
    /// authorization request itself fails. A denied authorization is not an
    /// error: the notifier is returned disabled.
    pub async fn initialize(
        action_sender: UnboundedSender<String>,
    ) -> Result<(Self, Retained<NotificationDelegate>), NotificationError> {
        let mtm = MainThreadMarker::new().ok_or_else(|| {
            NotificationError::InitializationFailed(
                "通知システムはメインスレッドで初期化する必要があります".to_string(),
            )
        })?;

        let granted = NotificationCenter::request_authorization().await?;
        if !granted {
            tracing::warn!("{}", NotificationError::PermissionDenied);
            tracing::info!("{}", NotificationError::PermissionDenied.suggestion());
        }

        let delegate = NotificationDelegate::new(mtm, action_sender);
        NotificationCenter::set_delegate(&NotificationDelegate::as_protocol(&delegate));
        NotificationCenter::set_notification_categories(&create_categories());

        Ok((
            Self {
                authorized: AtomicBool::new(granted),
                foreground: AtomicBool::new(false),
            },
            delegate,
        ))
    }

    /// Re-reads the authorization status from the system.
    pub async fn refresh_authorization(&self) {
        match NotificationCenter::is_authorized().await {
            Ok(authorized) => self.authorized.store(authorized, Ordering::SeqCst),
            Err(e) => tracing::warn!("通知許可の状態を取得できません: {}", e),
        }
    }

    fn submit(&self, notification: &AlarmNotification) -> Result<(), NotificationError> {
        if !self.authorized.load(Ordering::SeqCst) {
            return Err(NotificationError::PermissionDenied);
        }
        let content = create_alarm_content(notification);
        let request = create_notification_request(notification.id, &content);
        NotificationCenter::submit_request(&request);
        Ok(())
    }
}

impl AlarmNotifier for MacNotifier {
    fn start_foreground(&self, notification: &AlarmNotification) -> Result<(), NotificationError> {
        // macOS has no foreground grant; the daemon already runs unrestricted.
        self.foreground.store(true, Ordering::SeqCst);
        if let Err(e) = self.submit(notification) {
            tracing::warn!("{}", e);
        }
        Ok(())
    }

    fn post(&self, notification: &AlarmNotification) -> Result<(), NotificationError> {
        self.submit(notification)
    }

    fn cancel(&self, id: i32) {
        NotificationCenter::remove_notification(&request_identifier(id));
    }

    fn stop_foreground(&self) {
        self.foreground.store(false, Ordering::SeqCst);
    }

    fn is_enabled(&self) -> bool {
        self.authorized.load(Ordering::SeqCst)
    }
}
