//! AlertEngine (spec §4.1): dedup/correlate/create, ISA-18.2 state
//! transitions, flap detection, and the timeout-driven sweeps.

use crate::blackout_matcher::BlackoutMatcher;
use crate::clock::Clock;
use crate::config::Config;
use crate::error::{AlertCoreError, AlertCoreResult};
use crate::model::alert::{trend, Action, Alert, ChangeType, HistoryRecord, Severity, Status};
use crate::store::{AlertIdentity, IdentityMatch, Store, TagUpdate};
use std::sync::Arc;
use uuid::Uuid;

pub struct AlertEngine {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    config: Config,
    blackout_matcher: BlackoutMatcher,
}

/// Outcome of [`AlertEngine::process`], distinguishing the three disjoint
/// identity-lookup results (spec §4.1 step 3 / P1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Duplicate,
    Correlated,
    Created,
}

impl AlertEngine {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, config: Config) -> Self {
        Self {
            store,
            clock,
            config,
            blackout_matcher: BlackoutMatcher::new(),
        }
    }

    /// Ingests `incoming` per spec §4.1's pipeline. Pre-process plugin
    /// rejection/rate-limiting/heartbeat-masquerade are out of scope for
    /// this core (spec §1: "alert authorship... out of scope") -- callers
    /// that run such plugins raise `Rejected`/`RateLimit`/`HeartbeatReceived`
    /// before calling `process`.
    pub async fn process(&self, mut incoming: Alert) -> AlertCoreResult<(Alert, ProcessOutcome)> {
        let now = self.clock.now();

        let blackouts = self.store.list_blackouts().await.map_err(|e| AlertCoreError::Store(e.to_string()))?;
        if self.blackout_matcher.matches(&incoming, &blackouts, incoming.create_time) {
            incoming.status = Status::Blackout;
            return Err(AlertCoreError::BlackoutPeriod(incoming.id));
        }

        let identity = AlertIdentity {
            environment: &incoming.environment,
            resource: &incoming.resource,
            event: &incoming.event,
            customer: incoming.customer.as_deref(),
        };
        let found = self
            .store
            .find_identity(identity, incoming.severity)
            .await
            .map_err(|e| AlertCoreError::Store(e.to_string()))?;

        let (alert, outcome) = match found {
            IdentityMatch::Duplicate(mut existing) => {
                let status_changes = false; // dedup never mutates status by itself
                existing.duplicate_count += 1;
                existing.repeat = true;
                existing.value = incoming.value;
                existing.text = incoming.text;
                existing.timeout = incoming.timeout;
                existing.raw_data = incoming.raw_data;
                existing.tags.extend(incoming.tags);
                existing.attributes.extend(incoming.attributes);
                existing.last_receive_id = incoming.last_receive_id.clone();
                existing.last_receive_time = incoming.receive_time;
                existing.update_time = now;
                if status_changes {
                    existing.prepend_history(
                        history_record(ChangeType::Status, &existing, now, None),
                        self.config.history_limit,
                    );
                }
                (existing, ProcessOutcome::Duplicate)
            }
            IdentityMatch::Correlated(mut existing) => {
                let previous_severity = existing.severity;
                existing.event = incoming.event;
                existing.previous_severity = Some(previous_severity);
                existing.severity = incoming.severity;
                existing.trend_indication = trend(previous_severity, existing.severity);
                existing.value = incoming.value;
                existing.text = incoming.text;
                existing.timeout = incoming.timeout;
                existing.raw_data = incoming.raw_data;
                existing.tags.extend(incoming.tags);
                existing.attributes.extend(incoming.attributes);
                existing.last_receive_id = incoming.last_receive_id.clone();
                existing.last_receive_time = incoming.receive_time;
                existing.update_time = now;
                let (severity, status) = self.transition(existing.severity, existing.status, existing.previous_severity, existing.trend_indication, None)?;
                existing.severity = severity;
                existing.status = status;
                existing.prepend_history(
                    history_record(ChangeType::Severity, &existing, now, None),
                    self.config.history_limit,
                );
                self.store.delete_delayed_for_alert(&existing.id).await.map_err(|e| AlertCoreError::Store(e.to_string()))?;
                (existing, ProcessOutcome::Correlated)
            }
            IdentityMatch::New => {
                incoming.id = if incoming.id.is_empty() { Uuid::new_v4().to_string() } else { incoming.id };
                incoming.duplicate_count = 0;
                incoming.repeat = false;
                incoming.previous_severity = None;
                incoming.trend_indication = crate::model::alert::TrendIndication::NoChange;
                incoming.update_time = now;
                let (severity, status) = self.transition(incoming.severity, Status::Closed, None, incoming.trend_indication, None)?;
                incoming.severity = severity;
                incoming.status = status;
                incoming.history = vec![history_record(ChangeType::New, &incoming, now, None)];
                incoming.trim_history(self.config.history_limit);
                (incoming, ProcessOutcome::Created)
            }
        };

        let mut alert = alert;
        alert.trim_history(self.config.history_limit);
        let persisted = match outcome {
            ProcessOutcome::Created => self.store.insert_alert(alert).await,
            _ => self.store.update_alert(alert).await,
        }
        .map_err(|e| AlertCoreError::Store(e.to_string()))?;

        tracing::info!(alert_id = %persisted.id, ?outcome, "alert processed");
        Ok((persisted, outcome))
    }

    /// ISA-18.2 state machine (spec §4.1). `action` is `None` for an
    /// unprompted severity-driven transition, `Some` for an operator or
    /// scheduler action verb.
    pub fn transition(
        &self,
        severity: Severity,
        status: Status,
        previous_severity: Option<Severity>,
        trend_indication: crate::model::alert::TrendIndication,
        action: Option<Action>,
    ) -> AlertCoreResult<(Severity, Status)> {
        use crate::model::alert::TrendIndication::MoreSevere;
        use Status::*;

        if let Some(action) = action {
            let next_status = match (action, status) {
                (Action::Shelve, _) => Shelved,
                (Action::Unshelve, _) => {
                    if severity == self.config.default_normal_severity {
                        Closed
                    } else {
                        Open
                    }
                }
                (Action::Open, Closed) => Unack,
                (Action::Open, Open) => {
                    return Err(AlertCoreError::InvalidAction("alert is already open".into()));
                }
                (Action::Open, _) => Open,
                (Action::Ack, Open) => Ack,
                (Action::Ack, Unack) => Closed,
                (Action::Ack, other) => other,
                (Action::Unack, Ack) => Open,
                (Action::Unack, other) => other,
                (Action::Close, _) => Closed,
                (Action::Expired, _) => Expired,
                (Action::Timeout, other) => other,
                (Action::Assign, other) => other,
            };
            tracing::info!(?action, from = ?status, to = ?next_status, "state transition");
            return Ok((severity, next_status));
        }

        let is_normal = severity == self.config.default_normal_severity;
        let next_status = if !is_normal {
            match status {
                Closed => Open,
                Unack => Open,
                Ack if trend_indication == MoreSevere && previous_severity.is_some() => Open,
                Dsupr | Oosrv if previous_severity.is_some() => Open,
                other => other,
            }
        } else {
            match status {
                Open => Unack,
                Ack => Closed,
                Dsupr | Oosrv => Closed,
                other => other,
            }
        };
        tracing::info!(from = ?status, to = ?next_status, severity = ?severity, "unprompted transition");
        Ok((severity, next_status))
    }

    /// Applies an operator/scheduler action to a stored alert (spec §4.1
    /// public `transition` entry point, the mutating variant used by the
    /// action-verb HTTP endpoints).
    pub async fn apply_action(&self, alert_id: &str, action: Action, text: Option<String>) -> AlertCoreResult<Alert> {
        let mut alert = self.store.get_alert(alert_id).await.map_err(|e| AlertCoreError::Store(e.to_string()))?;
        let (severity, status) = self.transition(alert.severity, alert.status, alert.previous_severity, alert.trend_indication, Some(action))?;
        alert.severity = severity;
        alert.status = status;
        alert.update_time = self.clock.now();
        alert.prepend_history(
            history_record(ChangeType::Action, &alert, alert.update_time, text),
            self.config.history_limit,
        );
        if matches!(action, Action::Close | Action::Expired) {
            self.store.delete_delayed_for_alert(&alert.id).await.map_err(|e| AlertCoreError::Store(e.to_string()))?;
        }
        self.store.update_alert(alert).await.map_err(|e| AlertCoreError::Store(e.to_string()))
    }

    /// Applies the escalation rule engine's severity-bump side effect
    /// (spec §4.5: "each returned alert receives a severity-bump operator
    /// action"). Runs the bump through the same unprompted-transition path
    /// as a correlated re-ingest so history and status stay consistent.
    pub async fn escalate(&self, alert_id: &str, new_severity: Severity) -> AlertCoreResult<Alert> {
        let mut alert = self.store.get_alert(alert_id).await.map_err(|e| AlertCoreError::Store(e.to_string()))?;
        let previous_severity = alert.severity;
        alert.previous_severity = Some(previous_severity);
        alert.severity = new_severity;
        alert.trend_indication = trend(previous_severity, new_severity);
        let now = self.clock.now();
        let (severity, status) = self.transition(alert.severity, alert.status, alert.previous_severity, alert.trend_indication, None)?;
        alert.severity = severity;
        alert.status = status;
        alert.update_time = now;
        alert.prepend_history(history_record(ChangeType::Severity, &alert, now, None), self.config.history_limit);
        self.store.update_alert(alert).await.map_err(|e| AlertCoreError::Store(e.to_string()))
    }

    pub async fn tag(&self, alert_id: &str, tags: Vec<String>) -> AlertCoreResult<Alert> {
        self.store
            .update_tags(alert_id, TagUpdate::Add(tags))
            .await
            .map_err(|e| AlertCoreError::Store(e.to_string()))
    }

    pub async fn untag(&self, alert_id: &str, tags: Vec<String>) -> AlertCoreResult<Alert> {
        self.store
            .update_tags(alert_id, TagUpdate::Remove(tags))
            .await
            .map_err(|e| AlertCoreError::Store(e.to_string()))
    }

    /// True iff more than `count` severity-change history entries exist
    /// for the same identity within `window` (spec §4.1, default
    /// window=1800s, count=2).
    pub fn flap_detect(&self, alert: &Alert, now: chrono::DateTime<chrono::Utc>, window: chrono::Duration, count: usize) -> bool {
        let since = now - window;
        let changes = alert
            .history
            .iter()
            .filter(|h| h.change_type == ChangeType::Severity && h.update_time >= since)
            .count();
        changes > count
    }

    /// Alerts past their effective timeout (spec §4.1 sweep_expired).
    pub async fn sweep_expired(&self) -> AlertCoreResult<Vec<Alert>> {
        let now = self.clock.now();
        let open = self.store.list_open_alerts().await.map_err(|e| AlertCoreError::Store(e.to_string()))?;
        let mut expired = Vec::new();
        for mut alert in open {
            if alert.status == Status::Expired || alert.timeout == 0 {
                continue;
            }
            let deadline = alert.last_receive_time + chrono::Duration::seconds(alert.timeout as i64);
            if deadline < now {
                alert.status = Status::Expired;
                alert.update_time = now;
                alert.prepend_history(
                    history_record(ChangeType::Expired, &alert, now, None),
                    self.config.history_limit,
                );
                let saved = self.store.update_alert(alert).await.map_err(|e| AlertCoreError::Store(e.to_string()))?;
                expired.push(saved);
            }
        }
        Ok(expired)
    }

    /// Promotes shelved alerts whose most recent `shelve` history entry's
    /// timeout has elapsed back to the severity-implied status.
    pub async fn sweep_unshelve(&self) -> AlertCoreResult<Vec<Alert>> {
        self.sweep_timed_transition(Status::Shelved, ChangeType::Shelve, Action::Unshelve).await
    }

    /// Promotes acked alerts whose most recent `ack` history entry's
    /// timeout has elapsed back to Open.
    pub async fn sweep_unack(&self) -> AlertCoreResult<Vec<Alert>> {
        self.sweep_timed_transition(Status::Ack, ChangeType::Ack, Action::Unack).await
    }

    async fn sweep_timed_transition(&self, from_status: Status, change_type: ChangeType, action: Action) -> AlertCoreResult<Vec<Alert>> {
        let now = self.clock.now();
        let open = self.store.list_open_alerts().await.map_err(|e| AlertCoreError::Store(e.to_string()))?;
        let mut promoted = Vec::new();
        for alert in open {
            if alert.status != from_status {
                continue;
            }
            let Some(record) = alert.history.iter().find(|h| h.change_type == change_type) else {
                continue;
            };
            let Some(timeout) = record.timeout else { continue };
            if timeout == 0 {
                continue;
            }
            if record.update_time + chrono::Duration::seconds(timeout as i64) < now {
                let saved = self.apply_action(&alert.id, action, None).await?;
                promoted.push(saved);
            }
        }
        Ok(promoted)
    }
}

fn history_record(change_type: ChangeType, alert: &Alert, now: chrono::DateTime<chrono::Utc>, text: Option<String>) -> HistoryRecord {
    HistoryRecord {
        id: Uuid::new_v4().to_string(),
        event: alert.event.clone(),
        severity: alert.severity,
        status: alert.status,
        value: alert.value.clone(),
        text: text.unwrap_or_default(),
        change_type,
        update_time: now,
        user: None,
        timeout: Some(alert.timeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::model::alert::tests::sample_alert;
    use crate::store::memory::MemoryStore;

    fn engine() -> (AlertEngine, Arc<FixedClock>) {
        let clock = FixedClock::new(chrono::Utc::now());
        let store = Arc::new(MemoryStore::new(clock.clone()));
        (AlertEngine::new(store, clock.clone(), Config::default()), clock)
    }

    #[tokio::test]
    async fn s1_dedup_increments_counter_and_keeps_one_history_entry() {
        let (engine, _clock) = engine();
        let mut a = sample_alert();
        a.severity = Severity::Minor;
        let (first, outcome1) = engine.process(a.clone()).await.unwrap();
        assert_eq!(outcome1, ProcessOutcome::Created);
        assert_eq!(first.history.len(), 1);

        let mut again = sample_alert();
        again.severity = Severity::Minor;
        again.last_receive_id = "second".into();
        let (second, outcome2) = engine.process(again).await.unwrap();
        assert_eq!(outcome2, ProcessOutcome::Duplicate);
        assert_eq!(second.duplicate_count, 1);
        assert!(second.repeat);
        assert_eq!(second.history.len(), 1);
    }

    #[tokio::test]
    async fn s2_correlate_replaces_event_and_computes_trend() {
        let (engine, _clock) = engine();
        let mut x = sample_alert();
        x.event = "down".into();
        x.severity = Severity::Minor;
        x.correlate = ["down".into(), "up".into()].into_iter().collect();
        engine.process(x.clone()).await.unwrap();

        let mut y = sample_alert();
        y.event = "up".into();
        y.severity = Severity::Normal;
        let (correlated, outcome) = engine.process(y).await.unwrap();
        assert_eq!(outcome, ProcessOutcome::Correlated);
        assert_eq!(correlated.event, "up");
        assert_eq!(correlated.severity, Severity::Normal);
        assert_eq!(correlated.previous_severity, Some(Severity::Minor));
        assert_eq!(correlated.trend_indication, crate::model::alert::TrendIndication::LessSevere);
    }

    #[tokio::test]
    async fn s3_state_machine_walks_closed_open_ack_closed() {
        let (engine, _clock) = engine();
        let (sev, status) = engine.transition(Severity::Minor, Status::Closed, None, crate::model::alert::TrendIndication::NoChange, None).unwrap();
        assert_eq!((sev, status), (Severity::Minor, Status::Open));

        let (sev2, status2) = engine.transition(sev, status, None, crate::model::alert::TrendIndication::NoChange, Some(Action::Ack)).unwrap();
        assert_eq!((sev2, status2), (Severity::Minor, Status::Ack));

        let (sev3, status3) = engine.transition(Severity::Normal, status2, None, crate::model::alert::TrendIndication::LessSevere, None).unwrap();
        assert_eq!((sev3, status3), (Severity::Normal, Status::Closed));
    }

    #[tokio::test]
    async fn p7_duplicate_never_appends_history_without_status_change() {
        let (engine, _clock) = engine();
        let alert = sample_alert();
        engine.process(alert.clone()).await.unwrap();
        let (dup, _) = engine.process(alert).await.unwrap();
        assert_eq!(dup.history.len(), 1);
    }

    #[tokio::test]
    async fn s6_escalate_bumps_severity_and_records_history() {
        let (engine, _clock) = engine();
        let mut alert = sample_alert();
        alert.severity = Severity::Minor;
        let (created, _) = engine.process(alert).await.unwrap();

        let escalated = engine.escalate(&created.id, Severity::Major).await.unwrap();
        assert_eq!(escalated.severity, Severity::Major);
        assert_eq!(escalated.previous_severity, Some(Severity::Minor));
        assert_eq!(escalated.history[0].change_type, ChangeType::Severity);
    }

    #[test]
    fn flap_detect_counts_recent_severity_changes() {
        let (engine, _clock) = engine();
        let mut alert = sample_alert();
        let now = chrono::Utc::now();
        alert.history = (0..3)
            .map(|i| HistoryRecord {
                id: i.to_string(),
                event: "down".into(),
                severity: Severity::Minor,
                status: Status::Open,
                value: String::new(),
                text: String::new(),
                change_type: ChangeType::Severity,
                update_time: now - chrono::Duration::seconds(i),
                user: None,
                timeout: None,
            })
            .collect();
        assert!(engine.flap_detect(&alert, now, chrono::Duration::seconds(1800), 2));
        assert!(!engine.flap_detect(&alert, now, chrono::Duration::seconds(1800), 5));
    }
}
