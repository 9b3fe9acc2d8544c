//! Maintenance-window model (spec §3, Blackout).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blackout {
    pub id: String,
    pub environment: String,
    pub resource: Option<String>,
    pub event: Option<String>,
    pub group: Option<String>,
    pub service: Vec<String>,
    pub tags: HashSet<String>,
    pub origin: Option<String>,
    pub customer: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub user: Option<String>,
    pub text: Option<String>,
}

impl Blackout {
    pub fn duration_seconds(&self) -> i64 {
        (self.end_time - self.start_time).num_seconds()
    }

    /// Priority is a function of which optional fields are narrowed, purely
    /// for operator display (spec §3/§4.2) -- it never affects matching.
    pub fn priority(&self) -> u8 {
        let mut p = 1u8;
        if self.resource.is_some() {
            p += 1;
        }
        if self.event.is_some() {
            p += 1;
        }
        if self.group.is_some() {
            p += 1;
        }
        if !self.service.is_empty() {
            p += 1;
        }
        if !self.tags.is_empty() {
            p += 1;
        }
        if self.origin.is_some() {
            p += 1;
        }
        p
    }
}
