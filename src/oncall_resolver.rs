//! OnCallResolver (spec §4.6): resolves contactable parties for an alert
//! from the on-call schedule, either an explicit date range or a
//! list-based weekday/ISO-week/month recurrence.

use crate::config::Config;
use crate::error::AlertCoreResult;
use crate::model::alert::Alert;
use crate::model::notification::NotificationInfo;
use crate::model::oncall::{OnCall, RepeatType};
use crate::model::rule::Weekday;
use crate::store::Store;
use chrono::{DateTime, Datelike, Utc};
use std::collections::HashSet;
use std::sync::Arc;

pub struct OnCallResolver {
    store: Arc<dyn Store>,
    config: Config,
}

impl OnCallResolver {
    pub fn new(store: Arc<dyn Store>, config: Config) -> Self {
        Self { store, config }
    }

    /// Targets on-call for `alert`, evaluated at `now` (the alert's
    /// create_time in the caller's usual invocation).
    pub async fn resolve(&self, alert: &Alert, now: DateTime<Utc>) -> AlertCoreResult<HashSet<NotificationInfo>> {
        let rows = self.store.list_oncalls().await.map_err(|e| crate::error::AlertCoreError::Store(e.to_string()))?;
        let mut targets = HashSet::new();

        for row in rows {
            if !customer_scoped(row.customer.as_deref(), alert.customer.as_deref(), self.config.customer_views) {
                continue;
            }
            if !row_covers(&row, now) {
                continue;
            }
            for user_id in &row.user_ids {
                if let Ok(user) = self.store.get_user(user_id).await {
                    if let Some(info) = user.notification_info() {
                        targets.insert(info);
                    }
                }
            }
            for group_id in &row.group_ids {
                if let Ok(group) = self.store.get_group(group_id).await {
                    for user_id in &group.user_ids {
                        if let Ok(user) = self.store.get_user(user_id).await {
                            if let Some(info) = user.notification_info() {
                                targets.insert(info);
                            }
                        }
                    }
                }
            }
        }

        Ok(targets)
    }
}

fn row_covers(row: &OnCall, now: DateTime<Utc>) -> bool {
    time_window_covers(row, now) && (date_range_covers(row, now) || list_recurrence_covers(row, now))
}

fn time_window_covers(row: &OnCall, now: DateTime<Utc>) -> bool {
    match (row.start_time, row.end_time) {
        (Some(start), Some(end)) => {
            let t = now.time();
            if start <= end {
                t >= start && t < end
            } else {
                t >= start || t < end
            }
        }
        _ => true,
    }
}

fn date_range_covers(row: &OnCall, now: DateTime<Utc>) -> bool {
    let date = now.date_naive();
    match (row.start_date, row.end_date) {
        (Some(start), Some(end)) => date >= start && date <= end,
        (Some(start), None) => date >= start,
        (None, Some(end)) => date <= end,
        (None, None) => false,
    }
}

fn list_recurrence_covers(row: &OnCall, now: DateTime<Utc>) -> bool {
    if row.repeat_type != Some(RepeatType::List) {
        return false;
    }
    let weekday_ok = row.repeat_days.is_empty() || row.repeat_days.contains(&Weekday::from_chrono(now.weekday()));
    let week_ok = row.repeat_weeks.is_empty() || row.repeat_weeks.contains(&(now.iso_week().week() as u8));
    let month_ok = row.repeat_months.is_empty()
        || row.repeat_months.iter().any(|m| m.eq_ignore_ascii_case(month_name(now.month())));
    weekday_ok && week_ok && month_ok
}

fn month_name(month: u32) -> &'static str {
    const NAMES: [&str; 12] = [
        "january", "february", "march", "april", "may", "june", "july", "august", "september", "october", "november", "december",
    ];
    NAMES[(month as usize - 1).min(11)]
}

fn customer_scoped(row_customer: Option<&str>, alert_customer: Option<&str>, customer_views: bool) -> bool {
    if !customer_views {
        return true;
    }
    match row_customer {
        None => true,
        Some(c) => Some(c) == alert_customer,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::model::alert::tests::sample_alert;
    use crate::model::user::User;
    use crate::store::memory::MemoryStore;
    use chrono::TimeZone;

    fn setup() -> (OnCallResolver, Arc<MemoryStore>) {
        let clock = FixedClock::new(Utc::now());
        let store = Arc::new(MemoryStore::new(clock));
        (OnCallResolver::new(store.clone(), Config::default()), store)
    }

    fn base_oncall() -> OnCall {
        OnCall {
            id: "oc1".into(),
            user_ids: vec!["u1".into()],
            group_ids: vec![],
            start_date: None,
            end_date: None,
            start_time: None,
            end_time: None,
            repeat_type: None,
            repeat_days: vec![],
            repeat_weeks: vec![],
            repeat_months: vec![],
            customer: None,
            user: None,
        }
    }

    #[tokio::test]
    async fn s8_date_range_row_resolves_user_contact() {
        let (resolver, store) = setup();
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        let mut row = base_oncall();
        row.start_date = Some(now.date_naive() - chrono::Duration::days(1));
        row.end_date = Some(now.date_naive() + chrono::Duration::days(1));
        store.upsert_oncall(row).await.unwrap();
        store
            .upsert_user(User {
                id: "u1".into(),
                name: "On Call".into(),
                login: "oncall".into(),
                email: Some("oncall@example.com".into()),
                phone_number: None,
                status: "active".into(),
                roles: vec![],
                customers: vec![],
            })
            .await
            .unwrap();

        let alert = sample_alert();
        let targets = resolver.resolve(&alert, now).await.unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets.iter().next().unwrap().email.as_deref(), Some("oncall@example.com"));
    }

    #[tokio::test]
    async fn list_recurrence_rejects_wrong_weekday() {
        let (resolver, store) = setup();
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        let mut row = base_oncall();
        row.repeat_type = Some(RepeatType::List);
        row.repeat_days = vec![Weekday::from_chrono(now.weekday().succ())];
        store.upsert_oncall(row).await.unwrap();

        let alert = sample_alert();
        let targets = resolver.resolve(&alert, now).await.unwrap();
        assert!(targets.is_empty());
    }

    #[tokio::test]
    async fn outside_time_window_never_matches_either_branch() {
        let (resolver, store) = setup();
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 3, 0, 0).unwrap();
        let mut row = base_oncall();
        row.start_time = Some(chrono::NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        row.end_time = Some(chrono::NaiveTime::from_hms_opt(17, 0, 0).unwrap());
        row.start_date = Some(now.date_naive());
        row.end_date = Some(now.date_naive());
        store.upsert_oncall(row).await.unwrap();

        let alert = sample_alert();
        let targets = resolver.resolve(&alert, now).await.unwrap();
        assert!(targets.is_empty());
    }
}
