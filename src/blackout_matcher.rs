//! Blackout window matching (spec §4.2).
//!
//! Grounded on `is_blackout_period` in
//! `alerta/database/backends/postgres/base.py`: the row's optional
//! attributes (resource, service, event, group, tags, origin) are each
//! either "wild" -- null for scalars, empty for the set/list columns -- or
//! must match the candidate alert. The reference semantics enumerate all 64
//! combinations of which of the six attributes are wild; this
//! implementation short-circuits the same truth table without the
//! enumeration.

use crate::model::alert::Alert;
use crate::model::blackout::Blackout;
use chrono::{DateTime, Utc};

pub struct BlackoutMatcher;

impl BlackoutMatcher {
    pub fn new() -> Self {
        Self
    }

    /// True iff any blackout row covers `alert` at `now`.
    pub fn matches(&self, alert: &Alert, blackouts: &[Blackout], now: DateTime<Utc>) -> bool {
        blackouts.iter().any(|b| Self::row_matches(b, alert, now))
    }

    fn row_matches(row: &Blackout, alert: &Alert, now: DateTime<Utc>) -> bool {
        if !(row.start_time <= now && now < row.end_time) {
            return false;
        }
        if row.environment != alert.environment {
            return false;
        }
        if let Some(customer) = &row.customer {
            if Some(customer) != alert.customer.as_ref() {
                return false;
            }
        }
        if let Some(resource) = &row.resource {
            if resource != &alert.resource {
                return false;
            }
        }
        if let Some(event) = &row.event {
            if event != &alert.event {
                return false;
            }
        }
        if let Some(group) = &row.group {
            if Some(group) != alert.group.as_ref() {
                return false;
            }
        }
        if let Some(origin) = &row.origin {
            if origin != &alert.origin {
                return false;
            }
        }
        if !row.service.is_empty() {
            let alert_service: std::collections::HashSet<&str> =
                alert.service.iter().map(String::as_str).collect();
            if !row.service.iter().all(|s| alert_service.contains(s.as_str())) {
                return false;
            }
        }
        if !row.tags.is_empty() && !row.tags.is_subset(&alert.tags) {
            return false;
        }
        true
    }
}

impl Default for BlackoutMatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::alert::tests::sample_alert;
    use chrono::Duration;

    fn base_row(now: DateTime<Utc>) -> Blackout {
        Blackout {
            id: "b1".into(),
            environment: "Prod".into(),
            resource: None,
            event: None,
            group: None,
            service: vec![],
            tags: Default::default(),
            origin: None,
            customer: None,
            start_time: now - Duration::minutes(5),
            end_time: now + Duration::minutes(5),
            user: None,
            text: None,
        }
    }

    #[test]
    fn full_wildcard_row_silences_whole_environment() {
        let now = Utc::now();
        let alert = sample_alert();
        let row = base_row(now);
        assert!(BlackoutMatcher::new().matches(&alert, &[row], now));
    }

    #[test]
    fn service_subset_row_only_silences_matching_service() {
        let now = Utc::now();
        let mut alert = sample_alert();
        alert.service = vec!["Core".into(), "Edge".into()];
        let mut row = base_row(now);
        row.service = vec!["Core".into()];
        assert!(BlackoutMatcher::new().matches(&alert, &[row.clone()], now));

        let mut other = sample_alert();
        other.service = vec!["Edge".into()];
        assert!(!BlackoutMatcher::new().matches(&other, &[row], now));
    }

    #[test]
    fn outside_window_does_not_match() {
        let now = Utc::now();
        let row = base_row(now - Duration::hours(1));
        let alert = sample_alert();
        assert!(!BlackoutMatcher::new().matches(&alert, &[row], now));
    }

    /// P5: adding a row can only make more alerts blacked out, never fewer.
    #[test]
    fn adding_a_row_is_monotone() {
        let now = Utc::now();
        let alert = sample_alert();
        let unrelated = {
            let mut r = base_row(now);
            r.environment = "Staging".into();
            r
        };
        let matching = base_row(now);
        let before = BlackoutMatcher::new().matches(&alert, &[unrelated.clone()], now);
        let after = BlackoutMatcher::new().matches(&alert, &[unrelated, matching], now);
        assert!(!before);
        assert!(after);
    }
}
