//! RuleEngine (spec §4.4, §4.5): notification rule selection, target
//! resolution, escalation selection, and rule reactivation.

use crate::config::Config;
use crate::error::{AlertCoreError, AlertCoreResult};
use crate::model::alert::{Alert, Status};
use crate::model::notification::NotificationInfo;
use crate::model::rule::{EscalationRule, NotificationGroup, NotificationRule, NotificationTrigger, Weekday};
use crate::oncall_resolver::OnCallResolver;
use crate::store::Store;
use crate::tag_algebra::{matches_any, matches_excluded};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;

pub struct RuleEngine {
    store: Arc<dyn Store>,
    config: Config,
    oncall_resolver: OnCallResolver,
}

impl RuleEngine {
    pub fn new(store: Arc<dyn Store>, config: Config) -> Self {
        let oncall_resolver = OnCallResolver::new(store.clone(), config.clone());
        Self { store, config, oncall_resolver }
    }

    /// `selectNotificationRules` general entry point: a trigger's empty
    /// `status` matches any alert status (spec §4.4; SPEC_FULL §4.4
    /// Open Question resolution).
    pub async fn select_notification_rules(&self, alert: &Alert, now: DateTime<Utc>) -> AlertCoreResult<Vec<NotificationRule>> {
        self.select_rules_inner(alert, now, None).await
    }

    /// The status-scan entry point: requires a non-empty, matching
    /// `trigger.status` (SPEC_FULL §4.4 SUPPLEMENT, the original's second
    /// code path).
    pub async fn select_notification_rules_for_status(&self, alert: &Alert, status: Status, now: DateTime<Utc>) -> AlertCoreResult<Vec<NotificationRule>> {
        self.select_rules_inner(alert, now, Some(status)).await
    }

    async fn select_rules_inner(&self, alert: &Alert, now: DateTime<Utc>, status: Option<Status>) -> AlertCoreResult<Vec<NotificationRule>> {
        let rules = self.store.list_notification_rules().await.map_err(|e| AlertCoreError::Store(e.to_string()))?;
        Ok(rules
            .into_iter()
            .filter(|rule| rule.active)
            .filter(|rule| rule_in_time_window(rule.start_time, rule.end_time, &rule.days, now))
            .filter(|rule| rule.environment == alert.environment)
            .filter(|rule| optional_eq(&rule.resource, &alert.resource))
            .filter(|rule| optional_eq(&rule.event, &alert.event))
            .filter(|rule| optional_eq(&rule.group, alert.group.as_deref().unwrap_or_default()))
            .filter(|rule| service_subset(&rule.service, &alert.service))
            .filter(|rule| rule.triggers.iter().any(|t| trigger_matches(t, alert, status)))
            .filter(|rule| matches_any(&rule.tags, &alert.tags))
            .filter(|rule| !matches_excluded(&rule.excluded_tags, &alert.tags))
            .filter(|rule| customer_scoped(rule.customer.as_deref(), alert.customer.as_deref(), self.config.customer_views))
            .collect())
    }

    /// Composes the target set for `rule` against `alert` (spec §4.4):
    /// raw receivers ∪ expand(user_ids) ∪ expand(group_ids).users ∪
    /// on-call targets when `use_oncall`. Returned as a true set (P8/S8).
    pub async fn select_notification_targets(&self, rule: &NotificationRule, alert: &Alert, now: DateTime<Utc>) -> AlertCoreResult<HashSet<NotificationInfo>> {
        let mut targets = HashSet::new();

        for receiver in &rule.receivers {
            targets.insert(receiver_to_target(receiver));
        }

        for user_id in &rule.user_ids {
            if let Ok(user) = self.store.get_user(user_id).await {
                if let Some(info) = user.notification_info() {
                    targets.insert(info);
                }
            }
        }

        for group_id in &rule.group_ids {
            if let Ok(group) = self.store.get_group(group_id).await {
                targets.extend(expand_group(&group));
                for user_id in &group.user_ids {
                    if let Ok(user) = self.store.get_user(user_id).await {
                        if let Some(info) = user.notification_info() {
                            targets.insert(info);
                        }
                    }
                }
            }
        }

        if rule.use_oncall {
            targets.extend(self.oncall_resolver.resolve(alert, now).await?);
        }

        Ok(targets)
    }

    /// Flips rules with `active=false` whose `reactivate` timestamp has
    /// passed back to `active=true` (spec §4.4).
    pub async fn reactivation_sweep(&self, now: DateTime<Utc>) -> AlertCoreResult<usize> {
        let rules = self.store.list_notification_rules().await.map_err(|e| AlertCoreError::Store(e.to_string()))?;
        let mut flipped = 0;
        for mut rule in rules {
            if !rule.active {
                if let Some(reactivate) = rule.reactivate {
                    if reactivate < now {
                        rule.active = true;
                        rule.reactivate = None;
                        self.store.upsert_notification_rule(rule).await.map_err(|e| AlertCoreError::Store(e.to_string()))?;
                        flipped += 1;
                    }
                }
            }
        }
        Ok(flipped)
    }

    /// `selectEscalationTargets` (spec §4.5): currently-open alerts whose
    /// age exceeds a matching escalation rule's `time`. Status is ignored
    /// for trigger matching, only from/to severity.
    pub async fn select_escalation_targets(&self, now: DateTime<Utc>) -> AlertCoreResult<Vec<Alert>> {
        let rules = self.store.list_escalation_rules().await.map_err(|e| AlertCoreError::Store(e.to_string()))?;
        let open_alerts = self.store.list_open_alerts().await.map_err(|e| AlertCoreError::Store(e.to_string()))?;

        let mut targets = Vec::new();
        for alert in open_alerts {
            let age = now - alert.last_receive_time;
            let matches_a_rule = rules
                .iter()
                .filter(|rule| rule.active)
                .filter(|rule| age > rule.time)
                .filter(|rule| rule_in_time_window(rule.start_time, rule.end_time, &rule.days, now))
                .filter(|rule| rule.environment == alert.environment)
                .filter(|rule| optional_eq(&rule.resource, &alert.resource))
                .filter(|rule| optional_eq(&rule.event, &alert.event))
                .filter(|rule| optional_eq(&rule.group, alert.group.as_deref().unwrap_or_default()))
                .filter(|rule| service_subset(&rule.service, &alert.service))
                .filter(|rule| rule.triggers.iter().any(|t| severity_trigger_matches(t, &alert)))
                .filter(|rule| matches_any(&rule.tags, &alert.tags))
                .filter(|rule| !matches_excluded(&rule.excluded_tags, &alert.tags))
                .filter(|rule| customer_scoped(rule.customer.as_deref(), alert.customer.as_deref(), self.config.customer_views))
                .any(|_| true);
            if matches_a_rule {
                targets.push(alert);
            }
        }
        Ok(targets)
    }
}

fn receiver_to_target(receiver: &str) -> NotificationInfo {
    if receiver.contains('@') {
        NotificationInfo::email(receiver)
    } else {
        NotificationInfo::phone(receiver)
    }
}

/// Group expansion: one target per indexed pair of
/// (phone_numbers[i], mails[i]) (spec §4.4).
fn expand_group(group: &NotificationGroup) -> Vec<NotificationInfo> {
    let len = group.phone_numbers.len().max(group.mails.len());
    (0..len)
        .map(|i| NotificationInfo {
            phone_number: group.phone_numbers.get(i).cloned(),
            email: group.mails.get(i).cloned(),
        })
        .collect()
}

fn optional_eq(rule_value: &Option<String>, alert_value: &str) -> bool {
    match rule_value {
        None => true,
        Some(v) => v == alert_value,
    }
}

fn service_subset(rule_service: &[String], alert_service: &[String]) -> bool {
    if rule_service.is_empty() {
        return true;
    }
    let alert_set: HashSet<&str> = alert_service.iter().map(String::as_str).collect();
    rule_service.iter().all(|s| alert_set.contains(s.as_str()))
}

fn trigger_matches(trigger: &NotificationTrigger, alert: &Alert, status: Option<Status>) -> bool {
    if !severity_trigger_matches(trigger, alert) {
        return false;
    }
    match status {
        Some(s) => !trigger.status.is_empty() && trigger.status.contains(&s),
        None => trigger.status.is_empty() || trigger.status.contains(&alert.status),
    }
}

fn severity_trigger_matches(trigger: &NotificationTrigger, alert: &Alert) -> bool {
    let from_ok = trigger.from_severity.is_empty()
        || alert.previous_severity.map(|s| trigger.from_severity.contains(&s)).unwrap_or(false);
    let to_ok = trigger.to_severity.is_empty() || trigger.to_severity.contains(&alert.severity);
    from_ok && to_ok
}

fn rule_in_time_window(start_time: Option<chrono::NaiveTime>, end_time: Option<chrono::NaiveTime>, days: &HashSet<Weekday>, now: DateTime<Utc>) -> bool {
    if !days.is_empty() && !days.contains(&Weekday::from_chrono(now.weekday())) {
        return false;
    }
    match (start_time, end_time) {
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

fn customer_scoped(rule_customer: Option<&str>, alert_customer: Option<&str>, customer_views: bool) -> bool {
    if !customer_views {
        return true;
    }
    match rule_customer {
        None => true,
        Some(c) => Some(c) == alert_customer,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::model::alert::tests::sample_alert;
    use crate::model::alert::Severity;
    use crate::store::memory::MemoryStore;

    fn setup() -> (RuleEngine, Arc<MemoryStore>) {
        let clock = FixedClock::new(Utc::now());
        let store = Arc::new(MemoryStore::new(clock));
        (RuleEngine::new(store.clone(), Config::default()), store)
    }

    fn base_rule() -> NotificationRule {
        NotificationRule {
            id: "r1".into(),
            name: None,
            active: true,
            environment: "Prod".into(),
            channel_id: "c1".into(),
            receivers: vec![],
            user_ids: vec![],
            group_ids: vec![],
            use_oncall: false,
            resource: None,
            event: None,
            group: None,
            service: vec![],
            tags: vec![],
            excluded_tags: vec![],
            triggers: vec![NotificationTrigger::default()],
            days: HashSet::new(),
            start_time: None,
            end_time: None,
            delay_time: None,
            reactivate: None,
            customer: None,
            user: None,
            text: None,
            create_time: Utc::now(),
        }
    }

    #[tokio::test]
    async fn p7_duplicate_like_alert_with_no_previous_and_same_severity_still_requires_matching_trigger() {
        let (engine, store) = setup();
        let mut rule = base_rule();
        rule.triggers = vec![NotificationTrigger {
            from_severity: [Severity::Critical].into_iter().collect(),
            ..Default::default()
        }];
        store.upsert_notification_rule(rule).await.unwrap();

        let alert = sample_alert();
        let matched = engine.select_notification_rules(&alert, Utc::now()).await.unwrap();
        assert!(matched.is_empty());
    }

    #[tokio::test]
    async fn selects_active_rule_matching_environment_and_empty_trigger() {
        let (engine, store) = setup();
        store.upsert_notification_rule(base_rule()).await.unwrap();
        let alert = sample_alert();
        let matched = engine.select_notification_rules(&alert, Utc::now()).await.unwrap();
        assert_eq!(matched.len(), 1);
    }

    #[tokio::test]
    async fn s5_tag_exclusion_rejects_matching_rule() {
        let (engine, store) = setup();
        let mut rule = base_rule();
        rule.excluded_tags = vec![crate::model::rule::AdvancedTag::new(vec!["test".into(), "dev".into()], vec![])];
        store.upsert_notification_rule(rule).await.unwrap();

        let mut alert = sample_alert();
        alert.tags = ["test".into(), "dev".into(), "any".into(), "all".into()].into_iter().collect();
        let matched = engine.select_notification_rules(&alert, Utc::now()).await.unwrap();
        assert!(matched.is_empty());

        let mut alert2 = sample_alert();
        alert2.tags = ["test".into(), "dev".into()].into_iter().collect();
        let matched2 = engine.select_notification_rules(&alert2, Utc::now()).await.unwrap();
        assert_eq!(matched2.len(), 1);
    }

    #[tokio::test]
    async fn s8_targets_are_deduplicated_as_a_set() {
        let (engine, store) = setup();
        let mut rule = base_rule();
        rule.receivers = vec!["+15551234567".into(), "+15551234567".into()];
        store.upsert_notification_rule(rule.clone()).await.unwrap();
        let alert = sample_alert();
        let targets = engine.select_notification_targets(&rule, &alert, Utc::now()).await.unwrap();
        assert_eq!(targets.len(), 1);
    }

    #[tokio::test]
    async fn reactivation_sweep_flips_expired_rules() {
        let (engine, store) = setup();
        let mut rule = base_rule();
        rule.active = false;
        rule.reactivate = Some(Utc::now() - chrono::Duration::seconds(1));
        store.upsert_notification_rule(rule).await.unwrap();
        let flipped = engine.reactivation_sweep(Utc::now()).await.unwrap();
        assert_eq!(flipped, 1);
        let rules = store.list_notification_rules().await.unwrap();
        assert!(rules[0].active);
    }

    #[tokio::test]
    async fn s6_escalation_selects_alert_past_minimum_age() {
        let (engine, store) = setup();
        let rule = EscalationRule {
            id: "e1".into(),
            active: true,
            environment: "Prod".into(),
            time: chrono::Duration::seconds(1),
            resource: None,
            event: None,
            group: None,
            service: vec![],
            tags: vec![],
            excluded_tags: vec![],
            triggers: vec![NotificationTrigger::default()],
            days: HashSet::new(),
            start_time: None,
            end_time: None,
            customer: None,
            user: None,
            create_time: Utc::now(),
        };
        store.upsert_escalation_rule(rule).await.unwrap();

        let mut alert = sample_alert();
        alert.last_receive_time = Utc::now() - chrono::Duration::seconds(5);
        store.insert_alert(alert).await.unwrap();

        let targets = engine.select_escalation_targets(Utc::now()).await.unwrap();
        assert_eq!(targets.len(), 1);
    }
}
