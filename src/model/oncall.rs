//! On-call schedule model (spec §3, OnCall).

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatType {
    List,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnCall {
    pub id: String,
    pub user_ids: Vec<String>,
    pub group_ids: Vec<String>,
    /// Absolute date range variant.
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    /// List-based recurrence variant.
    pub repeat_type: Option<RepeatType>,
    pub repeat_days: Vec<crate::model::rule::Weekday>,
    /// ISO week numbers (1..=53).
    pub repeat_weeks: Vec<u8>,
    /// Month names, matched case-insensitively against the create time's
    /// month (spec §4.6).
    pub repeat_months: Vec<String>,
    pub customer: Option<String>,
    pub user: Option<String>,
}
