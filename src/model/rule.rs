//! Notification and escalation rule models (spec §3, §4.3, §4.4, §4.5).

use crate::model::alert::Severity;
use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// `{all, any}` inclusion/exclusion predicate over an alert's tag set
/// (spec §4.3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdvancedTag {
    pub all: HashSet<String>,
    pub any: HashSet<String>,
}

impl AdvancedTag {
    pub fn new(all: impl IntoIterator<Item = String>, any: impl IntoIterator<Item = String>) -> Self {
        Self {
            all: all.into_iter().collect(),
            any: any.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty() && self.any.is_empty()
    }
}

/// The conjunction of optional severity-transition and status predicates
/// attached to a notification or escalation rule (spec §3, Glossary
/// "Trigger").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationTrigger {
    pub from_severity: HashSet<Severity>,
    pub to_severity: HashSet<Severity>,
    pub status: HashSet<crate::model::alert::Status>,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl Weekday {
    pub fn from_chrono(d: chrono::Weekday) -> Self {
        match d {
            chrono::Weekday::Mon => Weekday::Mon,
            chrono::Weekday::Tue => Weekday::Tue,
            chrono::Weekday::Wed => Weekday::Wed,
            chrono::Weekday::Thu => Weekday::Thu,
            chrono::Weekday::Fri => Weekday::Fri,
            chrono::Weekday::Sat => Weekday::Sat,
            chrono::Weekday::Sun => Weekday::Sun,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRule {
    pub id: String,
    pub name: Option<String>,
    pub active: bool,
    pub environment: String,
    pub channel_id: String,
    pub receivers: Vec<String>,
    pub user_ids: Vec<String>,
    pub group_ids: Vec<String>,
    pub use_oncall: bool,
    pub resource: Option<String>,
    pub event: Option<String>,
    pub group: Option<String>,
    pub service: Vec<String>,
    pub tags: Vec<AdvancedTag>,
    pub excluded_tags: Vec<AdvancedTag>,
    pub triggers: Vec<NotificationTrigger>,
    pub days: HashSet<Weekday>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub delay_time: Option<chrono::Duration>,
    pub reactivate: Option<DateTime<Utc>>,
    pub customer: Option<String>,
    pub user: Option<String>,
    pub text: Option<String>,
    pub create_time: DateTime<Utc>,
}

impl NotificationRule {
    /// Derived, presentation-only priority (SPEC_FULL §4.4 SUPPLEMENT).
    /// Mirrors the original's field-by-field override chain verbatim,
    /// including its fall-through quirk where a later `elif` can only win
    /// if an earlier condition didn't already match.
    pub fn priority(&self) -> u8 {
        let mut p = 1u8;
        if self.resource.is_some() && self.event.is_none() {
            p = 2;
        } else if !self.service.is_empty() {
            p = 3;
        } else if self.event.is_some() && self.resource.is_none() {
            p = 4;
        } else if self.group.is_some() {
            p = 5;
        } else if self.resource.is_some() && self.event.is_some() {
            p = 6;
        } else if !self.tags.is_empty() {
            p = 7;
        }
        p
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationRule {
    pub id: String,
    pub active: bool,
    pub environment: String,
    /// Minimum age before fire.
    pub time: chrono::Duration,
    pub resource: Option<String>,
    pub event: Option<String>,
    pub group: Option<String>,
    pub service: Vec<String>,
    pub tags: Vec<AdvancedTag>,
    pub excluded_tags: Vec<AdvancedTag>,
    /// Reuses `NotificationTrigger`'s from/to severity; `status` is unused
    /// for escalation (spec §3).
    pub triggers: Vec<NotificationTrigger>,
    pub days: HashSet<Weekday>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub customer: Option<String>,
    pub user: Option<String>,
    pub create_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationGroup {
    pub id: String,
    pub name: String,
    pub user_ids: Vec<String>,
    pub phone_numbers: Vec<String>,
    pub mails: Vec<String>,
}
