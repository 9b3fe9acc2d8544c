//! Core alert data model (spec §3, Alert / HistoryRecord).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Closed severity vocabulary, ranked by `severity_rank` for trend
/// comparisons. Mirrors the original `alerta.models.enums.Severity` set
/// (spec §3 SUPPLEMENT) rather than spec.md's loose "enumerated".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Security,
    Critical,
    Major,
    Minor,
    Warning,
    Indeterminate,
    Informational,
    Normal,
    Ok,
    Cleared,
    Debug,
    Trace,
    Unknown,
}

impl Severity {
    /// SEVERITY_MAP rank, highest is most severe. `Normal`/`Ok`/`Cleared`
    /// are tied, matching the original map.
    pub fn rank(self) -> u8 {
        match self {
            Severity::Security => 10,
            Severity::Critical => 9,
            Severity::Major => 8,
            Severity::Minor => 7,
            Severity::Warning => 6,
            Severity::Indeterminate => 5,
            Severity::Informational => 4,
            Severity::Normal | Severity::Ok | Severity::Cleared => 3,
            Severity::Debug => 2,
            Severity::Trace => 1,
            Severity::Unknown => 0,
        }
    }

    /// The next strictly-more-severe rank, or `None` at the top of the
    /// order. Used by the escalation rule engine's severity bump
    /// (SPEC_FULL §4.5 Open Question resolution).
    pub fn next_more_severe(self) -> Option<Severity> {
        const ORDER: [Severity; 11] = [
            Severity::Trace,
            Severity::Debug,
            Severity::Normal,
            Severity::Informational,
            Severity::Indeterminate,
            Severity::Warning,
            Severity::Minor,
            Severity::Major,
            Severity::Critical,
            Severity::Security,
            Severity::Security,
        ];
        let rank = self.rank();
        ORDER.iter().copied().find(|s| s.rank() > rank)
    }

    /// The full SEVERITY_MAP as a lookup table (spec §5 SUPPLEMENT), for
    /// configuration surfaces that want to expose or override it.
    pub fn default_rank_map() -> HashMap<Severity, u8> {
        [
            Severity::Security,
            Severity::Critical,
            Severity::Major,
            Severity::Minor,
            Severity::Warning,
            Severity::Indeterminate,
            Severity::Informational,
            Severity::Normal,
            Severity::Ok,
            Severity::Cleared,
            Severity::Debug,
            Severity::Trace,
            Severity::Unknown,
        ]
        .into_iter()
        .map(|s| (s, s.rank()))
        .collect()
    }

    pub fn capitalized(self) -> String {
        let s = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_default();
        let mut chars = s.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            None => s,
        }
    }
}

/// Trend of a severity change, per the SEVERITY_MAP total order (spec §3/§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrendIndication {
    MoreSevere,
    NoChange,
    LessSevere,
}

pub fn trend(previous: Severity, current: Severity) -> TrendIndication {
    match previous.rank().cmp(&current.rank()) {
        std::cmp::Ordering::Less => TrendIndication::MoreSevere,
        std::cmp::Ordering::Greater => TrendIndication::LessSevere,
        std::cmp::Ordering::Equal => TrendIndication::NoChange,
    }
}

/// Closed status vocabulary (spec §3 SUPPLEMENT). The ISA-18.2 A..G states
/// from spec §4.1 map onto this set; `Dsupr`/`Oosrv` are reachable only by
/// direct assignment, never by an operator action verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Status {
    Open,
    Assign,
    Ack,
    Unack,
    Shelved,
    Blackout,
    Closed,
    Expired,
    Unknown,
    Dsupr,
    Oosrv,
}

/// Operator/scheduler action verbs that drive `transition()` (spec §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Open,
    Assign,
    Ack,
    Unack,
    Shelve,
    Unshelve,
    Close,
    Expired,
    Timeout,
}

/// History-entry discriminant (spec §3 HistoryRecord.change_type). Keeps
/// the full original vocabulary since history entries round-trip
/// original-shaped data (SPEC_FULL §3 SUPPLEMENT), a superset of spec.md's
/// abridged list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    New,
    Action,
    Status,
    Value,
    Severity,
    Note,
    Dismiss,
    Timeout,
    Expired,
    Open,
    Assign,
    Ack,
    Unack,
    Shelve,
    Unshelve,
    Close,
}

/// One entry in an alert's reverse-chronological history ring (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: String,
    pub event: String,
    pub severity: Severity,
    pub status: Status,
    pub value: String,
    pub text: String,
    pub change_type: ChangeType,
    pub update_time: DateTime<Utc>,
    pub user: Option<String>,
    pub timeout: Option<u32>,
}

/// Canonical alert resource (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub environment: String,
    pub resource: String,
    pub event: String,
    pub severity: Severity,
    pub previous_severity: Option<Severity>,
    pub status: Status,
    /// Set of event names this alert supersedes/is superseded by (spec §3).
    pub correlate: HashSet<String>,
    pub service: Vec<String>,
    pub group: Option<String>,
    pub value: String,
    pub text: String,
    pub tags: HashSet<String>,
    pub attributes: HashMap<String, serde_json::Value>,
    pub origin: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub create_time: DateTime<Utc>,
    pub receive_time: DateTime<Utc>,
    pub last_receive_time: DateTime<Utc>,
    pub last_receive_id: String,
    pub update_time: DateTime<Utc>,
    /// Seconds; 0 means never.
    pub timeout: u32,
    pub duplicate_count: u32,
    pub repeat: bool,
    pub trend_indication: TrendIndication,
    pub raw_data: Option<String>,
    pub customer: Option<String>,
    /// Newest-first, bounded to `HISTORY_LIMIT` (spec invariant).
    pub history: Vec<HistoryRecord>,
}

impl Alert {
    /// The triple identity-of-incident used for dedup/correlate lookups
    /// (spec §3, Glossary "Alert identity"). The event/correlate-match
    /// component is handled by the store's dedup/correlate queries rather
    /// than folded into this tuple, since "event-or-correlate" isn't a
    /// single scalar.
    pub fn identity_key(&self) -> (String, String, Option<String>) {
        (
            self.environment.clone(),
            self.resource.clone(),
            self.customer.clone(),
        )
    }

    pub fn is_suppressed(&self) -> bool {
        matches!(self.status, Status::Dsupr | Status::Oosrv)
    }

    /// Trim history to `limit` entries, newest kept (spec invariant, P4).
    pub fn trim_history(&mut self, limit: usize) {
        if self.history.len() > limit {
            self.history.truncate(limit);
        }
    }

    pub fn prepend_history(&mut self, record: HistoryRecord, limit: usize) {
        self.history.insert(0, record);
        self.trim_history(limit);
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    fn severity_rank_order() {
        assert!(Severity::Critical.rank() > Severity::Minor.rank());
        assert_eq!(Severity::Normal.rank(), Severity::Ok.rank());
    }

    #[test]
    fn trend_detects_direction() {
        assert_eq!(trend(Severity::Minor, Severity::Major), TrendIndication::MoreSevere);
        assert_eq!(trend(Severity::Major, Severity::Minor), TrendIndication::LessSevere);
        assert_eq!(trend(Severity::Minor, Severity::Minor), TrendIndication::NoChange);
    }

    #[test]
    fn next_more_severe_steps_up_one_rank() {
        assert_eq!(Severity::Minor.next_more_severe(), Some(Severity::Major));
        assert_eq!(Severity::Security.next_more_severe(), None);
    }

    #[test]
    fn history_ring_truncates_newest_first() {
        let mut alert = sample_alert();
        for i in 0..5 {
            alert.prepend_history(sample_history(i), 3);
        }
        assert_eq!(alert.history.len(), 3);
        assert_eq!(alert.history[0].id, "4");
    }

    fn sample_history(i: u32) -> HistoryRecord {
        HistoryRecord {
            id: i.to_string(),
            event: "down".into(),
            severity: Severity::Minor,
            status: Status::Open,
            value: String::new(),
            text: String::new(),
            change_type: ChangeType::New,
            update_time: Utc::now(),
            user: None,
            timeout: None,
        }
    }

    pub fn sample_alert() -> Alert {
        let now = Utc::now();
        Alert {
            id: "test-id".into(),
            environment: "Prod".into(),
            resource: "n1".into(),
            event: "down".into(),
            severity: Severity::Minor,
            previous_severity: None,
            status: Status::Open,
            correlate: HashSet::new(),
            service: vec![],
            group: None,
            value: String::new(),
            text: String::new(),
            tags: HashSet::new(),
            attributes: HashMap::new(),
            origin: "test".into(),
            event_type: "alert".into(),
            create_time: now,
            receive_time: now,
            last_receive_time: now,
            last_receive_id: "test-id".into(),
            update_time: now,
            timeout: 0,
            duplicate_count: 0,
            repeat: false,
            trend_indication: TrendIndication::NoChange,
            raw_data: None,
            customer: None,
            history: vec![],
        }
    }
}
