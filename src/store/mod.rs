//! Durable state for alerts and everything that references one (spec §2,
//! §9 "Polymorphic Store backends"). One async trait object, two
//! implementations: [`memory::MemoryStore`] (the reference backend used by
//! tests) and [`postgres::PostgresStore`] (a feature-gated scaffold).

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

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
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// The identity triple used for dedup/correlate lookups (spec §3).
#[derive(Debug, Clone)]
pub struct AlertIdentity<'a> {
    pub environment: &'a str,
    pub resource: &'a str,
    pub event: &'a str,
    pub customer: Option<&'a str>,
}

/// Disjoint outcome of an identity lookup (spec §4.1 step 3).
pub enum IdentityMatch {
    Duplicate(Alert),
    Correlated(Alert),
    New,
}

/// Free-form, set-valued bulk tag update (spec §6: tag = union, untag =
/// difference, replace-tags = overwrite).
pub enum TagUpdate {
    Add(Vec<String>),
    Remove(Vec<String>),
    Replace(Vec<String>),
}

#[async_trait]
pub trait Store: Send + Sync {
    // --- Alerts -----------------------------------------------------
    async fn find_identity(&self, identity: AlertIdentity<'_>, severity: crate::model::alert::Severity) -> StoreResult<IdentityMatch>;
    async fn insert_alert(&self, alert: Alert) -> StoreResult<Alert>;
    async fn update_alert(&self, alert: Alert) -> StoreResult<Alert>;
    async fn get_alert(&self, id: &str) -> StoreResult<Alert>;
    async fn delete_alert(&self, id: &str) -> StoreResult<()>;
    async fn list_alerts(&self, query: &crate::query_filter::QueryFilter) -> StoreResult<Vec<Alert>>;
    async fn list_open_alerts(&self) -> StoreResult<Vec<Alert>>;
    async fn update_tags(&self, id: &str, update: TagUpdate) -> StoreResult<Alert>;
    async fn merge_attributes(&self, id: &str, attrs: std::collections::HashMap<String, serde_json::Value>) -> StoreResult<Alert>;

    // --- Blackouts ----------------------------------------------------
    async fn list_blackouts(&self) -> StoreResult<Vec<Blackout>>;
    async fn upsert_blackout(&self, blackout: Blackout) -> StoreResult<Blackout>;
    async fn delete_blackout(&self, id: &str) -> StoreResult<()>;

    // --- Channels -----------------------------------------------------
    async fn get_channel(&self, id: &str) -> StoreResult<NotificationChannel>;
    async fn list_channels(&self) -> StoreResult<Vec<NotificationChannel>>;
    async fn upsert_channel(&self, channel: NotificationChannel) -> StoreResult<NotificationChannel>;
    async fn delete_channel(&self, id: &str) -> StoreResult<()>;

    // --- Notification rules -------------------------------------------
    async fn list_notification_rules(&self) -> StoreResult<Vec<NotificationRule>>;
    async fn upsert_notification_rule(&self, rule: NotificationRule) -> StoreResult<NotificationRule>;
    async fn delete_notification_rule(&self, id: &str) -> StoreResult<()>;

    // --- Escalation rules ----------------------------------------------
    async fn list_escalation_rules(&self) -> StoreResult<Vec<EscalationRule>>;
    async fn upsert_escalation_rule(&self, rule: EscalationRule) -> StoreResult<EscalationRule>;
    async fn delete_escalation_rule(&self, id: &str) -> StoreResult<()>;

    // --- Groups ---------------------------------------------------------
    async fn get_group(&self, id: &str) -> StoreResult<NotificationGroup>;
    async fn list_groups(&self) -> StoreResult<Vec<NotificationGroup>>;
    async fn upsert_group(&self, group: NotificationGroup) -> StoreResult<NotificationGroup>;
    async fn delete_group(&self, id: &str) -> StoreResult<()>;

    // --- On-call ----------------------------------------------------------
    async fn list_oncalls(&self) -> StoreResult<Vec<OnCall>>;
    async fn upsert_oncall(&self, oncall: OnCall) -> StoreResult<OnCall>;
    async fn delete_oncall(&self, id: &str) -> StoreResult<()>;

    // --- Delayed notifications -------------------------------------------
    async fn list_delayed(&self) -> StoreResult<Vec<DelayedNotification>>;
    async fn insert_delayed(&self, entry: DelayedNotification) -> StoreResult<()>;
    async fn delete_delayed(&self, id: &str) -> StoreResult<()>;
    async fn delete_delayed_for_alert(&self, alert_id: &str) -> StoreResult<()>;

    // --- Notification history ---------------------------------------------
    async fn insert_history(&self, entry: NotificationHistory) -> StoreResult<()>;
    async fn list_history(&self) -> StoreResult<Vec<NotificationHistory>>;

    // --- Heartbeats ---------------------------------------------------------
    async fn upsert_heartbeat(&self, heartbeat: Heartbeat) -> StoreResult<Heartbeat>;
    async fn list_heartbeats(&self) -> StoreResult<Vec<Heartbeat>>;

    // --- Users ---------------------------------------------------------
    // Keys (API-key auth), standalone Customer rows, permissions, and
    // notes are part of spec §6's CRUD surface but not of this core: keys
    // and permissions are authentication/authorization concerns spec §1
    // names as external collaborators, "customer" is already carried as a
    // per-record field rather than a first-class entity (spec §1 Non-goals:
    // "multi-tenant isolation beyond the per-record customer field"), and
    // notes have no modelled attributes in spec §3. A caller that needs
    // those surfaces owns its own store for them.
    async fn get_user(&self, id: &str) -> StoreResult<User>;
    async fn list_users(&self) -> StoreResult<Vec<User>>;
    async fn upsert_user(&self, user: User) -> StoreResult<User>;

    async fn now(&self) -> DateTime<Utc>;
}

/// Builds a [`Store`] implementation from a database URL scheme (spec §9
/// "one constructor that selects the backend by URL scheme").
pub fn connect(database_url: Option<&str>, clock: std::sync::Arc<dyn crate::clock::Clock>) -> std::sync::Arc<dyn Store> {
    match database_url {
        #[cfg(feature = "postgres")]
        Some(url) if url.starts_with("postgres://") || url.starts_with("postgresql://") => {
            std::sync::Arc::new(postgres::PostgresStore::connect_lazy(url))
        }
        _ => std::sync::Arc::new(memory::MemoryStore::new(clock)),
    }
}
