//! Notification delivery bookkeeping models (spec §3): DelayedNotification,
//! NotificationHistory, and the NotificationInfo target type used by rule
//! and on-call target resolution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A pending dispatch with a due timestamp, keyed uniquely by
/// `(alert_id, rule_id)` (spec §3, Glossary "Delayed notification").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelayedNotification {
    pub id: String,
    pub alert_id: String,
    pub rule_id: String,
    pub fire_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationHistory {
    pub id: String,
    pub sent: bool,
    pub message: String,
    pub channel: String,
    pub rule: String,
    pub alert: String,
    pub sender: Option<String>,
    pub receiver: String,
    pub sent_time: DateTime<Utc>,
    pub error: Option<String>,
    pub confirmed: bool,
    pub confirmed_time: Option<DateTime<Utc>>,
}

/// A resolved notification target: a phone number, an email address, or
/// both (spec §4.4, `selectNotificationTargets`). Hashable so callers can
/// de-duplicate targets into a true set (spec S8).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationInfo {
    pub phone_number: Option<String>,
    pub email: Option<String>,
}

impl NotificationInfo {
    pub fn phone(number: impl Into<String>) -> Self {
        Self {
            phone_number: Some(number.into()),
            email: None,
        }
    }

    pub fn email(address: impl Into<String>) -> Self {
        Self {
            phone_number: None,
            email: Some(address.into()),
        }
    }
}
