//! Domain model types (spec §3).

pub mod alert;
pub mod blackout;
pub mod channel;
pub mod heartbeat;
pub mod notification;
pub mod oncall;
pub mod rule;
pub mod user;

pub use alert::{Action, Alert, ChangeType, HistoryRecord, Severity, Status, TrendIndication};
pub use blackout::Blackout;
pub use channel::{ChannelType, NotificationChannel, NotificationChannelView, TlsVerify};
pub use heartbeat::{Heartbeat, HeartbeatStatus};
pub use notification::{DelayedNotification, NotificationHistory, NotificationInfo};
pub use oncall::{OnCall, RepeatType};
pub use rule::{AdvancedTag, EscalationRule, NotificationGroup, NotificationRule, NotificationTrigger, Weekday};
pub use user::User;
