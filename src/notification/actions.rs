//! Notification action and category definitions.

/// Notification action identifiers.
pub mod action_ids {
    /// Stop button.
    pub const STOP: &str = "STOP_ACTION";
    /// Snooze button.
    pub const SNOOZE: &str = "SNOOZE_ACTION";
    /// The notification body was tapped.
    pub const DEFAULT: &str = "com.apple.UNNotificationDefaultActionIdentifier";
    /// The notification was dismissed.
    pub const DISMISS: &str = "com.apple.UNNotificationDismissActionIdentifier";
}

/// Notification category identifiers.
pub mod category_ids {
    /// Category of the ringing notification.
    pub const ALARM: &str = "ALARM_RINGING";
}

#[cfg(target_os = "macos")]
pub use self::native::create_categories;

#[cfg(target_os = "macos")]
mod native {
    use objc2::rc::Retained;
    use objc2_foundation::{NSArray, NSString};
    use objc2_user_notifications::{
        UNNotificationAction, UNNotificationActionOptions, UNNotificationCategory,
        UNNotificationCategoryOptions,
    };

    use super::{action_ids, category_ids};

    fn create_action(
        identifier: &str,
        title: &str,
        options: UNNotificationActionOptions,
    ) -> Retained<UNNotificationAction> {
        let identifier = NSString::from_str(identifier);
        let title = NSString::from_str(title);

        unsafe { UNNotificationAction::actionWithIdentifier_title_options(&identifier, &title, options) }
    }

    /// Creates the ringing category with Stop and Snooze buttons.
    ///
    /// The category asks for dismiss callbacks so a forced removal can be
    /// answered by re-posting the notification.
    #[must_use]
    pub fn create_categories() -> Vec<Retained<UNNotificationCategory>> {
        let actions = [
            create_action(
                action_ids::STOP,
                "停止",
                UNNotificationActionOptions::Destructive,
            ),
            create_action(
                action_ids::SNOOZE,
                "スヌーズ",
                UNNotificationActionOptions::empty(),
            ),
        ];

        let identifier = NSString::from_str(category_ids::ALARM);
        let actions_array: Retained<NSArray<UNNotificationAction>> = unsafe {
            let refs: Vec<&UNNotificationAction> = actions.iter().map(|a| a.as_ref()).collect();
            NSArray::from_slice(&refs)
        };
        let intent_identifiers: Retained<NSArray<NSString>> =
            unsafe { NSArray::from_slice(&[] as &[&NSString]) };

        let category = unsafe {
            UNNotificationCategory::categoryWithIdentifier_actions_intentIdentifiers_options(
                &identifier,
                &actions_array,
                &intent_identifiers,
                UNNotificationCategoryOptions::CustomDismissAction,
            )
        };

        vec![category]
    }
}
