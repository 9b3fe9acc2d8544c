//! User model (spec §4.4/§4.6 target expansion: `user_ids` resolve to a
//! user's contact `NotificationInfo`).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub login: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub status: String,
    pub roles: Vec<String>,
    pub customers: Vec<String>,
}

impl User {
    /// Resolves this user's contact points into targets, if any are set
    /// (spec §4.4 `selectNotificationTargets` / §4.6 on-call expansion).
    pub fn notification_info(&self) -> Option<crate::model::notification::NotificationInfo> {
        match (&self.phone_number, &self.email) {
            (None, None) => None,
            (phone, email) => Some(crate::model::notification::NotificationInfo {
                phone_number: phone.clone(),
                email: email.clone(),
            }),
        }
    }
}
