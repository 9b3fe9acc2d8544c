//! In-memory reference [`Store`] implementation, backing every unit and
//! integration test in this crate (spec §9: "the fully-featured reference
//! backend used by tests and by default").
//!
//! Grounded on the teacher's `Arc<RwLock<HashMap<...>>>` state pattern
//! (`core.rs`'s `IncidentResponseCore.active_incidents`).

use super::{AlertIdentity, IdentityMatch, Store, StoreError, StoreResult, TagUpdate};
use crate::clock::Clock;
use crate::model::alert::Alert;
use crate::model::blackout::Blackout;
use crate::model::channel::NotificationChannel;
use crate::model::heartbeat::Heartbeat;
use crate::model::notification::{DelayedNotification, NotificationHistory};
use crate::model::oncall::OnCall;
use crate::model::rule::{EscalationRule, NotificationGroup, NotificationRule};
use crate::model::user::User;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    alerts: HashMap<String, Alert>,
    blackouts: HashMap<String, Blackout>,
    channels: HashMap<String, NotificationChannel>,
    notification_rules: HashMap<String, NotificationRule>,
    escalation_rules: HashMap<String, EscalationRule>,
    groups: HashMap<String, NotificationGroup>,
    oncalls: HashMap<String, OnCall>,
    delayed: HashMap<String, DelayedNotification>,
    history: Vec<NotificationHistory>,
    heartbeats: HashMap<(String, String), Heartbeat>,
    users: HashMap<String, User>,
}

pub struct MemoryStore {
    tables: RwLock<Tables>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            clock,
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_identity(
        &self,
        identity: AlertIdentity<'_>,
        severity: crate::model::alert::Severity,
    ) -> StoreResult<IdentityMatch> {
        let tables = self.tables.read().await;
        for alert in tables.alerts.values() {
            if alert.environment != identity.environment || alert.resource != identity.resource {
                continue;
            }
            if alert.customer.as_deref() != identity.customer {
                continue;
            }
            if alert.event == identity.event && alert.severity == severity {
                return Ok(IdentityMatch::Duplicate(alert.clone()));
            }
            let correlated = (alert.event == identity.event && alert.severity != severity)
                || alert.correlate.contains(identity.event);
            if correlated {
                return Ok(IdentityMatch::Correlated(alert.clone()));
            }
        }
        Ok(IdentityMatch::New)
    }

    async fn insert_alert(&self, alert: Alert) -> StoreResult<Alert> {
        let mut tables = self.tables.write().await;
        if tables.alerts.contains_key(&alert.id) {
            return Err(StoreError::Conflict(alert.id));
        }
        tables.alerts.insert(alert.id.clone(), alert.clone());
        Ok(alert)
    }

    async fn update_alert(&self, alert: Alert) -> StoreResult<Alert> {
        let mut tables = self.tables.write().await;
        if !tables.alerts.contains_key(&alert.id) {
            return Err(StoreError::NotFound(alert.id));
        }
        tables.alerts.insert(alert.id.clone(), alert.clone());
        Ok(alert)
    }

    async fn get_alert(&self, id: &str) -> StoreResult<Alert> {
        self.tables
            .read()
            .await
            .alerts
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn delete_alert(&self, id: &str) -> StoreResult<()> {
        self.tables.write().await.alerts.remove(id);
        Ok(())
    }

    async fn list_alerts(&self, query: &crate::query_filter::QueryFilter) -> StoreResult<Vec<Alert>> {
        Ok(self
            .tables
            .read()
            .await
            .alerts
            .values()
            .filter(|a| query.matches(a))
            .cloned()
            .collect())
    }

    async fn list_open_alerts(&self) -> StoreResult<Vec<Alert>> {
        use crate::model::alert::Status;
        Ok(self
            .tables
            .read()
            .await
            .alerts
            .values()
            .filter(|a| !matches!(a.status, Status::Closed | Status::Expired))
            .cloned()
            .collect())
    }

    async fn update_tags(&self, id: &str, update: TagUpdate) -> StoreResult<Alert> {
        let mut tables = self.tables.write().await;
        let alert = tables.alerts.get_mut(id).ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        match update {
            TagUpdate::Add(tags) => alert.tags.extend(tags),
            TagUpdate::Remove(tags) => {
                for tag in tags {
                    alert.tags.remove(&tag);
                }
            }
            TagUpdate::Replace(tags) => alert.tags = tags.into_iter().collect(),
        }
        Ok(alert.clone())
    }

    async fn merge_attributes(&self, id: &str, attrs: HashMap<String, serde_json::Value>) -> StoreResult<Alert> {
        let mut tables = self.tables.write().await;
        let alert = tables.alerts.get_mut(id).ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        alert.attributes.extend(attrs);
        Ok(alert.clone())
    }

    async fn list_blackouts(&self) -> StoreResult<Vec<Blackout>> {
        Ok(self.tables.read().await.blackouts.values().cloned().collect())
    }

    async fn upsert_blackout(&self, blackout: Blackout) -> StoreResult<Blackout> {
        self.tables.write().await.blackouts.insert(blackout.id.clone(), blackout.clone());
        Ok(blackout)
    }

    async fn delete_blackout(&self, id: &str) -> StoreResult<()> {
        self.tables.write().await.blackouts.remove(id);
        Ok(())
    }

    async fn get_channel(&self, id: &str) -> StoreResult<NotificationChannel> {
        self.tables
            .read()
            .await
            .channels
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn list_channels(&self) -> StoreResult<Vec<NotificationChannel>> {
        Ok(self.tables.read().await.channels.values().cloned().collect())
    }

    async fn upsert_channel(&self, channel: NotificationChannel) -> StoreResult<NotificationChannel> {
        self.tables.write().await.channels.insert(channel.id.clone(), channel.clone());
        Ok(channel)
    }

    async fn delete_channel(&self, id: &str) -> StoreResult<()> {
        self.tables.write().await.channels.remove(id);
        Ok(())
    }

    async fn list_notification_rules(&self) -> StoreResult<Vec<NotificationRule>> {
        Ok(self.tables.read().await.notification_rules.values().cloned().collect())
    }

    async fn upsert_notification_rule(&self, rule: NotificationRule) -> StoreResult<NotificationRule> {
        self.tables.write().await.notification_rules.insert(rule.id.clone(), rule.clone());
        Ok(rule)
    }

    async fn delete_notification_rule(&self, id: &str) -> StoreResult<()> {
        self.tables.write().await.notification_rules.remove(id);
        Ok(())
    }

    async fn list_escalation_rules(&self) -> StoreResult<Vec<EscalationRule>> {
        Ok(self.tables.read().await.escalation_rules.values().cloned().collect())
    }

    async fn upsert_escalation_rule(&self, rule: EscalationRule) -> StoreResult<EscalationRule> {
        self.tables.write().await.escalation_rules.insert(rule.id.clone(), rule.clone());
        Ok(rule)
    }

    async fn delete_escalation_rule(&self, id: &str) -> StoreResult<()> {
        self.tables.write().await.escalation_rules.remove(id);
        Ok(())
    }

    async fn get_group(&self, id: &str) -> StoreResult<NotificationGroup> {
        self.tables
            .read()
            .await
            .groups
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn list_groups(&self) -> StoreResult<Vec<NotificationGroup>> {
        Ok(self.tables.read().await.groups.values().cloned().collect())
    }

    async fn upsert_group(&self, group: NotificationGroup) -> StoreResult<NotificationGroup> {
        self.tables.write().await.groups.insert(group.id.clone(), group.clone());
        Ok(group)
    }

    async fn delete_group(&self, id: &str) -> StoreResult<()> {
        self.tables.write().await.groups.remove(id);
        Ok(())
    }

    async fn list_oncalls(&self) -> StoreResult<Vec<OnCall>> {
        Ok(self.tables.read().await.oncalls.values().cloned().collect())
    }

    async fn upsert_oncall(&self, oncall: OnCall) -> StoreResult<OnCall> {
        self.tables.write().await.oncalls.insert(oncall.id.clone(), oncall.clone());
        Ok(oncall)
    }

    async fn delete_oncall(&self, id: &str) -> StoreResult<()> {
        self.tables.write().await.oncalls.remove(id);
        Ok(())
    }

    async fn list_delayed(&self) -> StoreResult<Vec<DelayedNotification>> {
        Ok(self.tables.read().await.delayed.values().cloned().collect())
    }

    async fn insert_delayed(&self, entry: DelayedNotification) -> StoreResult<()> {
        self.tables.write().await.delayed.insert(entry.id.clone(), entry);
        Ok(())
    }

    async fn delete_delayed(&self, id: &str) -> StoreResult<()> {
        self.tables.write().await.delayed.remove(id);
        Ok(())
    }

    async fn delete_delayed_for_alert(&self, alert_id: &str) -> StoreResult<()> {
        self.tables.write().await.delayed.retain(|_, d| d.alert_id != alert_id);
        Ok(())
    }

    async fn insert_history(&self, entry: NotificationHistory) -> StoreResult<()> {
        self.tables.write().await.history.push(entry);
        Ok(())
    }

    async fn list_history(&self) -> StoreResult<Vec<NotificationHistory>> {
        Ok(self.tables.read().await.history.clone())
    }

    async fn upsert_heartbeat(&self, heartbeat: Heartbeat) -> StoreResult<Heartbeat> {
        let mut tables = self.tables.write().await;
        tables.heartbeats.insert(heartbeat.identity_key(), heartbeat.clone());
        Ok(heartbeat)
    }

    async fn list_heartbeats(&self) -> StoreResult<Vec<Heartbeat>> {
        Ok(self.tables.read().await.heartbeats.values().cloned().collect())
    }

    async fn get_user(&self, id: &str) -> StoreResult<User> {
        self.tables
            .read()
            .await
            .users
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        Ok(self.tables.read().await.users.values().cloned().collect())
    }

    async fn upsert_user(&self, user: User) -> StoreResult<User> {
        self.tables.write().await.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::model::alert::tests::sample_alert;

    fn store() -> MemoryStore {
        MemoryStore::new(FixedClock::new(Utc::now()))
    }

    #[tokio::test]
    async fn insert_then_get_round_trips() {
        let store = store();
        let alert = sample_alert();
        store.insert_alert(alert.clone()).await.unwrap();
        let fetched = store.get_alert(&alert.id).await.unwrap();
        assert_eq!(fetched.id, alert.id);
    }

    #[tokio::test]
    async fn find_identity_detects_duplicate_then_new() {
        let store = store();
        let alert = sample_alert();
        store.insert_alert(alert.clone()).await.unwrap();

        let identity = AlertIdentity {
            environment: &alert.environment,
            resource: &alert.resource,
            event: &alert.event,
            customer: alert.customer.as_deref(),
        };
        let found = store.find_identity(identity, alert.severity).await.unwrap();
        assert!(matches!(found, IdentityMatch::Duplicate(_)));

        let identity_new = AlertIdentity {
            environment: &alert.environment,
            resource: "other-resource",
            event: &alert.event,
            customer: alert.customer.as_deref(),
        };
        let found_new = store.find_identity(identity_new, alert.severity).await.unwrap();
        assert!(matches!(found_new, IdentityMatch::New));
    }

    #[tokio::test]
    async fn delayed_for_alert_is_purged_on_status_change() {
        let store = store();
        let now = store.now().await;
        store
            .insert_delayed(DelayedNotification {
                id: "d1".into(),
                alert_id: "a1".into(),
                rule_id: "r1".into(),
                fire_at: now,
                created_at: now,
            })
            .await
            .unwrap();
        store.delete_delayed_for_alert("a1").await.unwrap();
        assert!(store.list_delayed().await.unwrap().is_empty());
    }
}
