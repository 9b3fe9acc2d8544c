//! Runtime configuration, loaded entirely from the environment (spec §5).
//!
//! Every field has a default matching the original system's built-in
//! defaults, so the service runs sensibly unconfigured and every value can
//! be overridden per deployment.

use crate::model::alert::Severity;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;

/// Process-wide configuration, read once at startup (spec §5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Maximum number of entries retained in an alert's history ring.
    pub history_limit: usize,
    /// Seconds of inactivity before an open alert is auto-expired.
    pub alert_timeout: i64,
    /// Seconds a shelved alert stays shelved before automatic unshelve.
    pub shelve_timeout: i64,
    /// Seconds an acked alert stays acked before automatic unack.
    pub ack_timeout: i64,
    /// Minimum age, in seconds, before an escalation rule is eligible to fire.
    pub escalate_time: i64,
    /// Heartbeat latency, in seconds, above which a heartbeat is `Slow`.
    pub heartbeat_max_latency: i64,
    /// Customer views enabled (multi-tenant attribute scoping).
    pub customer_views: bool,
    /// Severity rank table (lower is more severe), keyed by variant name.
    pub severity_map: HashMap<Severity, u8>,
    /// Default severity assigned when a create request omits one.
    pub default_normal_severity: Severity,
    pub default_inform_severity: Severity,
    pub default_previous_severity: Severity,
    /// Symmetric key (base64) used to encrypt channel secrets at rest.
    pub notification_key: Option<String>,
    pub database_url: Option<String>,
    pub database_name: String,
    pub database_schema: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            history_limit: env_parse("HISTORY_LIMIT", 100),
            alert_timeout: env_parse("ALERT_TIMEOUT", 86400),
            shelve_timeout: env_parse("SHELVE_TIMEOUT", 7200),
            ack_timeout: env_parse("ACK_TIMEOUT", 0),
            escalate_time: env_parse("ESCALATE_TIME", 900),
            heartbeat_max_latency: env_parse("HEARTBEAT_MAX_LATENCY", 1),
            customer_views: env_parse("CUSTOMER_VIEWS", false),
            severity_map: parse_severity_map(),
            default_normal_severity: Severity::Normal,
            default_inform_severity: Severity::Informational,
            default_previous_severity: Severity::Indeterminate,
            notification_key: env::var("NOTIFICATION_KEY").ok(),
            database_url: env::var("DATABASE_URL").ok(),
            database_name: env::var("DATABASE_NAME").unwrap_or_else(|_| "alerts".to_string()),
            database_schema: env::var("DATABASE_SCHEMA").unwrap_or_else(|_| "public".to_string()),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// `SEVERITY_MAP` overrides the default rank table (spec §6): a JSON
/// object of variant name to rank, e.g. `{"critical": 9, "major": 7}`.
/// Unspecified variants keep their built-in rank; a malformed value is
/// logged and ignored rather than failing startup.
fn parse_severity_map() -> HashMap<Severity, u8> {
    apply_severity_overrides(env::var("SEVERITY_MAP").ok().as_deref())
}

fn apply_severity_overrides(raw: Option<&str>) -> HashMap<Severity, u8> {
    let mut map = Severity::default_rank_map();
    if let Some(raw) = raw {
        match serde_json::from_str::<HashMap<Severity, u8>>(raw) {
            Ok(overrides) => map.extend(overrides),
            Err(e) => tracing::warn!(error = %e, "ignoring malformed SEVERITY_MAP"),
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.history_limit, 100);
        assert_eq!(config.alert_timeout, 86400);
        assert!(!config.customer_views);
    }

    #[test]
    fn severity_map_override_replaces_only_named_ranks() {
        let map = apply_severity_overrides(Some(r#"{"critical": 11, "major": 7}"#));
        assert_eq!(map[&Severity::Critical], 11);
        assert_eq!(map[&Severity::Major], 7);
        assert_eq!(map[&Severity::Minor], Severity::Minor.rank());
    }

    #[test]
    fn malformed_severity_map_falls_back_to_default() {
        let map = apply_severity_overrides(Some("not json"));
        assert_eq!(map, Severity::default_rank_map());
    }
}
