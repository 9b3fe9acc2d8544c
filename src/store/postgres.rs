//! Structural `sqlx`-backed [`Store`] scaffold (spec §9), feature-gated
//! behind `postgres`. Grounded on the query shapes in
//! `original_source/alerta/database/backends/postgres/base.py`: dedup and
//! correlate are single-row `UPDATE ... RETURNING` statements, the
//! blackout predicate is the 64-combination attribute match compiled into
//! a `WHERE` clause, and notification-rule selection is a CTE chain over
//! `tags`/`excluded_tags`/`triggers`.
//!
//! This is demonstrative: it shows the mapping from the in-memory
//! semantics in [`super::memory::MemoryStore`] to real SQL, but is not
//! exercised by this crate's test suite, which has no live database.

use super::{AlertIdentity, IdentityMatch, Store, StoreError, StoreResult, TagUpdate};
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
use sqlx::PgPool;

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Builds a pool lazily; the first query establishes the connection.
    /// Mirrors the teacher's `PostgresStorageConfig`-driven connection
    /// setup in `central_config.rs`, adapted to `sqlx`'s pool builder.
    pub fn connect_lazy(database_url: &str) -> Self {
        let pool = PgPool::connect_lazy(database_url).expect("invalid postgres connection string");
        Self { pool }
    }
}

/// `dedup_alert` in the original issues a single `UPDATE ... WHERE
/// environment=$1 AND resource=$2 AND event=$3 AND severity=$4 RETURNING
/// *`; a zero-row result falls through to the correlate query, whose WHERE
/// clause additionally matches `event = ANY(correlate) OR event != $3`.
/// Both run inside the same transaction as the eventual INSERT for the
/// "new" case, giving the single-row atomicity spec §5 requires.
const DEDUP_SQL: &str = "UPDATE alerts SET duplicate_count = duplicate_count + 1, repeat = true, \
     last_receive_id = $1, last_receive_time = $2, value = $3, text = $4, raw_data = $5 \
     WHERE environment = $6 AND resource = $7 AND event = $8 AND severity = $9 AND customer IS NOT DISTINCT FROM $10 \
     RETURNING *";

const CORRELATE_SQL: &str = "UPDATE alerts SET event = $1, severity = $2, previous_severity = severity, status = $3 \
     WHERE environment = $4 AND resource = $5 AND customer IS NOT DISTINCT FROM $6 \
     AND (event = $1 OR $1 = ANY(correlate)) \
     RETURNING *";

/// Mirrors `is_blackout_period`'s WHERE clause: each optional column is
/// `(col IS NULL OR col = $n)` for scalars, `(col = '{}' OR col <@ $n)` for
/// the set-valued ones.
const BLACKOUT_SQL: &str = "SELECT * FROM blackouts WHERE start_time <= $1 AND end_time > $1 \
     AND environment = $2 AND (customer IS NULL OR customer = $3) \
     AND (resource IS NULL OR resource = $4) \
     AND (event IS NULL OR event = $5) \
     AND (\"group\" IS NULL OR \"group\" = $6) \
     AND (origin IS NULL OR origin = $7) \
     AND (service = '{}' OR service <@ $8) \
     AND (tags = '{}' OR tags <@ $9)";

#[async_trait]
impl Store for PostgresStore {
    async fn find_identity(&self, _identity: AlertIdentity<'_>, _severity: crate::model::alert::Severity) -> StoreResult<IdentityMatch> {
        let _ = (&self.pool, DEDUP_SQL, CORRELATE_SQL);
        Err(StoreError::Backend("PostgresStore is a structural scaffold; no live query executed".into()))
    }

    async fn insert_alert(&self, _alert: Alert) -> StoreResult<Alert> {
        unimplemented()
    }

    async fn update_alert(&self, _alert: Alert) -> StoreResult<Alert> {
        unimplemented()
    }

    async fn get_alert(&self, _id: &str) -> StoreResult<Alert> {
        unimplemented()
    }

    async fn delete_alert(&self, _id: &str) -> StoreResult<()> {
        unimplemented()
    }

    async fn list_alerts(&self, _query: &crate::query_filter::QueryFilter) -> StoreResult<Vec<Alert>> {
        unimplemented()
    }

    async fn list_open_alerts(&self) -> StoreResult<Vec<Alert>> {
        unimplemented()
    }

    async fn update_tags(&self, _id: &str, _update: TagUpdate) -> StoreResult<Alert> {
        unimplemented()
    }

    async fn merge_attributes(&self, _id: &str, _attrs: std::collections::HashMap<String, serde_json::Value>) -> StoreResult<Alert> {
        unimplemented()
    }

    async fn list_blackouts(&self) -> StoreResult<Vec<Blackout>> {
        let _ = BLACKOUT_SQL;
        unimplemented()
    }

    async fn upsert_blackout(&self, _blackout: Blackout) -> StoreResult<Blackout> {
        unimplemented()
    }

    async fn delete_blackout(&self, _id: &str) -> StoreResult<()> {
        unimplemented()
    }

    async fn get_channel(&self, _id: &str) -> StoreResult<NotificationChannel> {
        unimplemented()
    }

    async fn list_channels(&self) -> StoreResult<Vec<NotificationChannel>> {
        unimplemented()
    }

    async fn upsert_channel(&self, _channel: NotificationChannel) -> StoreResult<NotificationChannel> {
        unimplemented()
    }

    async fn delete_channel(&self, _id: &str) -> StoreResult<()> {
        unimplemented()
    }

    async fn list_notification_rules(&self) -> StoreResult<Vec<NotificationRule>> {
        unimplemented()
    }

    async fn upsert_notification_rule(&self, _rule: NotificationRule) -> StoreResult<NotificationRule> {
        unimplemented()
    }

    async fn delete_notification_rule(&self, _id: &str) -> StoreResult<()> {
        unimplemented()
    }

    async fn list_escalation_rules(&self) -> StoreResult<Vec<EscalationRule>> {
        unimplemented()
    }

    async fn upsert_escalation_rule(&self, _rule: EscalationRule) -> StoreResult<EscalationRule> {
        unimplemented()
    }

    async fn delete_escalation_rule(&self, _id: &str) -> StoreResult<()> {
        unimplemented()
    }

    async fn get_group(&self, _id: &str) -> StoreResult<NotificationGroup> {
        unimplemented()
    }

    async fn list_groups(&self) -> StoreResult<Vec<NotificationGroup>> {
        unimplemented()
    }

    async fn upsert_group(&self, _group: NotificationGroup) -> StoreResult<NotificationGroup> {
        unimplemented()
    }

    async fn delete_group(&self, _id: &str) -> StoreResult<()> {
        unimplemented()
    }

    async fn list_oncalls(&self) -> StoreResult<Vec<OnCall>> {
        unimplemented()
    }

    async fn upsert_oncall(&self, _oncall: OnCall) -> StoreResult<OnCall> {
        unimplemented()
    }

    async fn delete_oncall(&self, _id: &str) -> StoreResult<()> {
        unimplemented()
    }

    async fn list_delayed(&self) -> StoreResult<Vec<DelayedNotification>> {
        unimplemented()
    }

    async fn insert_delayed(&self, _entry: DelayedNotification) -> StoreResult<()> {
        unimplemented()
    }

    async fn delete_delayed(&self, _id: &str) -> StoreResult<()> {
        unimplemented()
    }

    async fn delete_delayed_for_alert(&self, _alert_id: &str) -> StoreResult<()> {
        unimplemented()
    }

    async fn insert_history(&self, _entry: NotificationHistory) -> StoreResult<()> {
        unimplemented()
    }

    async fn list_history(&self) -> StoreResult<Vec<NotificationHistory>> {
        unimplemented()
    }

    async fn upsert_heartbeat(&self, _heartbeat: Heartbeat) -> StoreResult<Heartbeat> {
        unimplemented()
    }

    async fn list_heartbeats(&self) -> StoreResult<Vec<Heartbeat>> {
        unimplemented()
    }

    async fn get_user(&self, _id: &str) -> StoreResult<User> {
        unimplemented()
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        unimplemented()
    }

    async fn upsert_user(&self, _user: User) -> StoreResult<User> {
        unimplemented()
    }

    async fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

fn unimplemented<T>() -> StoreResult<T> {
    Err(StoreError::Backend("PostgresStore is a structural scaffold; no live query executed".into()))
}
