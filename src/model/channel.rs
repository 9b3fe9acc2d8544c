//! Notification channel model (spec §3, NotificationChannel).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    TwilioSms,
    TwilioCall,
    Sendgrid,
    Smtp,
    LinkMobilityXml,
    MyLink,
}

/// TLS verification policy for transports that make their own decision
/// about it (link_mobility_xml in the original sets `verify=False` only
/// when the column holds the literal string `"false"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TlsVerify {
    Verify,
    Insecure,
}

impl Default for TlsVerify {
    fn default() -> Self {
        TlsVerify::Verify
    }
}

/// A configured notification channel. `api_sid`/`api_token` are always
/// stored as the output of [`crate::crypto::encrypt`] -- never plaintext
/// -- and are never included in a serialisation surface aimed at an API
/// response (spec invariant); this struct intentionally has no `Serialize`
/// derive covering those two fields for public API use -- callers that
/// need a safe view should use [`NotificationChannel::redacted`].
#[derive(Debug, Clone)]
pub struct NotificationChannel {
    pub id: String,
    pub channel_type: ChannelType,
    pub sender: String,
    pub host: Option<String>,
    pub api_sid: String,
    pub api_token: String,
    pub platform_id: Option<String>,
    pub partner_id: Option<String>,
    pub verify: TlsVerify,
    pub customer: Option<String>,
    pub bearer: Option<String>,
    pub bearer_expiry: Option<DateTime<Utc>>,
}

/// Safe-to-serialise view of a channel with secrets stripped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationChannelView {
    pub id: String,
    pub channel_type: ChannelType,
    pub sender: String,
    pub host: Option<String>,
    pub platform_id: Option<String>,
    pub partner_id: Option<String>,
    pub customer: Option<String>,
}

impl NotificationChannel {
    pub fn redacted(&self) -> NotificationChannelView {
        NotificationChannelView {
            id: self.id.clone(),
            channel_type: self.channel_type,
            sender: self.sender.clone(),
            host: self.host.clone(),
            platform_id: self.platform_id.clone(),
            partner_id: self.partner_id.clone(),
            customer: self.customer.clone(),
        }
    }

    /// True if the OAuth bearer is missing or expires within the next 10
    /// minutes (spec §4.7, my_link refresh rule).
    pub fn bearer_needs_refresh(&self, now: DateTime<Utc>) -> bool {
        match (&self.bearer, self.bearer_expiry) {
            (None, _) => true,
            (Some(_), None) => true,
            (Some(_), Some(expiry)) => expiry <= now + chrono::Duration::minutes(10),
        }
    }
}
