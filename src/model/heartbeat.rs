//! Heartbeat model (spec §3, Heartbeat).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum HeartbeatStatus {
    Ok,
    Slow,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Heartbeat {
    pub id: String,
    pub origin: String,
    pub customer: Option<String>,
    pub create_time: DateTime<Utc>,
    pub receive_time: DateTime<Utc>,
    /// Seconds; 0 means never expires.
    pub timeout: u32,
    pub tags: Vec<String>,
    pub attributes: std::collections::HashMap<String, serde_json::Value>,
}

impl Heartbeat {
    /// Identity key: `(origin, coalesce(customer, ""))` (spec §3).
    pub fn identity_key(&self) -> (String, String) {
        (self.origin.clone(), self.customer.clone().unwrap_or_default())
    }

    pub fn latency(&self) -> chrono::Duration {
        self.receive_time - self.create_time
    }

    pub fn status(&self, now: DateTime<Utc>, max_latency: chrono::Duration) -> HeartbeatStatus {
        if self.timeout != 0 {
            let age = now - self.receive_time;
            if age > chrono::Duration::seconds(self.timeout as i64) {
                return HeartbeatStatus::Expired;
            }
        }
        if self.latency() > max_latency {
            return HeartbeatStatus::Slow;
        }
        HeartbeatStatus::Ok
    }
}
