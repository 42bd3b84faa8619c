//! Alarm identity and payload types.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

// ============================================================================
// Constants
// ============================================================================

/// Delimiter that separates a base identity from its snooze marker.
pub const SNOOZE_DELIMITER: &str = "_snooze";

/// Label given to alarms re-armed by a snooze.
pub const SNOOZED_ALARM_LABEL: &str = "Snoozed Alarm";

/// Audio reference that always selects the bundled tone.
pub const DEFAULT_AUDIO_REF: &str = "default_alarm_sound";

/// Returns the current wall-clock time in epoch milliseconds.
#[must_use]
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

// ============================================================================
// AlarmId
// ============================================================================

/// Opaque alarm identity.
///
/// An identity is either a *base* identity chosen by the application
/// (`"a1"`) or a *snooze instance* minted when an alarm is snoozed
/// (`"a1_snooze_1718000000000"`). Every instance maps back to exactly one
/// base identity by truncating at the first [`SNOOZE_DELIMITER`].
///
/// A missing or empty identity is replaced with [`AlarmId::DEFAULT`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct AlarmId(String);

impl AlarmId {
    /// Fallback identity used when the caller supplied none.
    pub const DEFAULT: &'static str = "default";

    /// Creates an identity, substituting [`AlarmId::DEFAULT`] for empty input.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        if raw.is_empty() {
            Self(Self::DEFAULT.to_string())
        } else {
            Self(raw)
        }
    }

    /// Creates an identity from an optional value.
    #[must_use]
    pub fn from_optional(raw: Option<&str>) -> Self {
        Self::new(raw.unwrap_or_default())
    }

    /// Returns the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the base identity (prefix before the first `"_snooze"`).
    #[must_use]
    pub fn base(&self) -> AlarmId {
        match self.0.find(SNOOZE_DELIMITER) {
            Some(index) => AlarmId::new(&self.0[..index]),
            None => self.clone(),
        }
    }

    /// Returns true if this identity was minted by a snooze.
    #[must_use]
    pub fn is_snooze_instance(&self) -> bool {
        self.0.contains(SNOOZE_DELIMITER)
    }

    /// Mints a snooze-instance identity for this alarm's base.
    ///
    /// `marker` is normally the current time in epoch milliseconds.
    #[must_use]
    pub fn snooze_instance(&self, marker: i64) -> AlarmId {
        AlarmId(format!("{}{}_{}", self.base().0, SNOOZE_DELIMITER, marker))
    }
}

impl Default for AlarmId {
    fn default() -> Self {
        Self(Self::DEFAULT.to_string())
    }
}

impl From<String> for AlarmId {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<&str> for AlarmId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<AlarmId> for String {
    fn from(id: AlarmId) -> Self {
        id.0
    }
}

impl fmt::Display for AlarmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// AlarmPayload
// ============================================================================

/// Data carried by a registered timer and handed back when it fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmPayload {
    /// Identity of the alarm
    pub alarm_id: AlarmId,
    /// Audio reference (URI, path, or empty for the bundled tone)
    #[serde(default)]
    pub audio_ref: String,
    /// Human-readable label shown on the ringing UI
    #[serde(default)]
    pub label: String,
}

impl AlarmPayload {
    /// Creates a new payload.
    pub fn new(alarm_id: AlarmId, audio_ref: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            alarm_id,
            audio_ref: audio_ref.into(),
            label: label.into(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // ------------------------------------------------------------------------
    // AlarmId Tests
    // ------------------------------------------------------------------------

    mod alarm_id_tests {
        use super::*;

        #[test]
        fn test_empty_becomes_default() {
            assert_eq!(AlarmId::new("").as_str(), "default");
            assert_eq!(AlarmId::from_optional(None).as_str(), "default");
            assert_eq!(AlarmId::default().as_str(), "default");
        }

        #[test]
        fn test_base_of_base_is_identity() {
            let id = AlarmId::new("a1");
            assert_eq!(id.base(), id);
            assert!(!id.is_snooze_instance());
        }

        #[test]
        fn test_base_truncates_at_first_delimiter() {
            let id = AlarmId::new("a1_snooze_1718000000000");
            assert_eq!(id.base().as_str(), "a1");
            assert!(id.is_snooze_instance());

            let nested = AlarmId::new("a1_snooze_1_snooze_2");
            assert_eq!(nested.base().as_str(), "a1");
        }

        #[test]
        fn test_delimiter_at_start_falls_back_to_default() {
            let id = AlarmId::new("_snooze_42");
            assert_eq!(id.base().as_str(), "default");
        }

        #[test]
        fn test_snooze_instance_format() {
            let id = AlarmId::new("a1");
            let instance = id.snooze_instance(1_718_000_000_000);
            assert_eq!(instance.as_str(), "a1_snooze_1718000000000");
        }

        #[test]
        fn test_snooze_instance_round_trips_to_base() {
            for raw in ["a1", "morning-alarm", "x", "alarm-7"] {
                let base = AlarmId::new(raw);
                assert_eq!(base.snooze_instance(now_millis()).base(), base);
            }
        }

        #[test]
        fn test_snooze_of_instance_keeps_original_base() {
            let first = AlarmId::new("a1").snooze_instance(100);
            let second = first.snooze_instance(200);
            assert_eq!(second.as_str(), "a1_snooze_200");
        }

        #[test]
        fn test_serde_is_plain_string() {
            let id = AlarmId::new("a1");
            assert_eq!(serde_json::to_string(&id).unwrap(), "\"a1\"");

            let parsed: AlarmId = serde_json::from_str("\"\"").unwrap();
            assert_eq!(parsed.as_str(), "default");
        }
    }

    // ------------------------------------------------------------------------
    // AlarmPayload Tests
    // ------------------------------------------------------------------------

    mod alarm_payload_tests {
        use super::*;

        #[test]
        fn test_camel_case_fields() {
            let payload = AlarmPayload::new(AlarmId::new("a1"), "file:///tmp/a.mp3", "Wake");
            let json = serde_json::to_value(&payload).unwrap();
            assert_eq!(json["alarmId"], "a1");
            assert_eq!(json["audioRef"], "file:///tmp/a.mp3");
            assert_eq!(json["label"], "Wake");
        }

        #[test]
        fn test_missing_optional_fields_default() {
            let payload: AlarmPayload = serde_json::from_str(r#"{"alarmId":"a1"}"#).unwrap();
            assert!(payload.audio_ref.is_empty());
            assert!(payload.label.is_empty());
        }
    }
}
