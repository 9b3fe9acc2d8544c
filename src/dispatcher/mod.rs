//! Dispatcher (spec §4.7): renders, transports, and records notifications
//! without blocking the ingest path.

pub mod render;
#[cfg(feature = "transports")]
pub mod transports;

use crate::clock::Clock;
use crate::config::Config;
use crate::model::alert::Alert;
use crate::model::channel::{ChannelType, NotificationChannel};
use crate::model::notification::{DelayedNotification, NotificationHistory, NotificationInfo};
use crate::model::rule::NotificationRule;
use crate::rules_engine::RuleEngine;
use crate::store::Store;
use chrono::Utc;
use std::sync::Arc;

pub struct Dispatcher {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    rules: Arc<RuleEngine>,
    config: Config,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, rules: Arc<RuleEngine>, config: Config) -> Self {
        Self { store, clock, rules, config }
    }

    /// Invoked synchronously from the ingest path; returns as soon as the
    /// fan-out work is queued. Per-rule handling happens in a spawned task
    /// so network I/O never blocks the caller (spec §4.7 execution model).
    pub fn dispatch(&self, alert: Alert, rules: Vec<NotificationRule>) {
        let store = self.store.clone();
        let rule_engine = self.rules.clone();
        let config = self.config.clone();
        let now = self.clock.now();
        tokio::spawn(async move {
            for rule in rules {
                if let Some(delay) = rule.delay_time {
                    let entry = DelayedNotification {
                        id: uuid::Uuid::new_v4().to_string(),
                        alert_id: alert.id.clone(),
                        rule_id: rule.id.clone(),
                        fire_at: now + delay,
                        created_at: now,
                    };
                    if let Err(e) = store.insert_delayed(entry).await {
                        tracing::warn!(alert_id = %alert.id, rule_id = %rule.id, error = %e, "failed to enqueue delayed notification");
                    }
                    continue;
                }
                handle_channel(&store, &rule_engine, &config, &alert, &rule, now).await;
            }
        });
    }

    /// Drains due delayed notifications (spec §4.8 `delayed_fire`).
    pub async fn fire_due(&self) -> usize {
        let Ok(delayed) = self.store.list_delayed().await else {
            return 0;
        };
        let now = self.clock.now();
        let mut fired = 0;
        for entry in delayed {
            if entry.fire_at >= now {
                continue;
            }
            if self.store.delete_delayed(&entry.id).await.is_err() {
                continue;
            }
            let Ok(alert) = self.store.get_alert(&entry.alert_id).await else {
                continue;
            };
            let Ok(rules) = self.store.list_notification_rules().await else {
                continue;
            };
            if let Some(rule) = rules.into_iter().find(|r| r.id == entry.rule_id) {
                handle_channel(&self.store, &self.rules, &self.config, &alert, &rule, now).await;
                fired += 1;
            }
        }
        fired
    }
}

/// Resolves `rule`'s full target set (spec §4.4: receivers ∪ expand(user_ids)
/// ∪ expand(group_ids) ∪ on-call, deduplicated as a set) and fans out a
/// transport attempt to each one, recording one history row per target.
async fn handle_channel(store: &Arc<dyn Store>, rule_engine: &RuleEngine, config: &Config, alert: &Alert, rule: &NotificationRule, now: chrono::DateTime<Utc>) {
    let channel = match store.get_channel(&rule.channel_id).await {
        Ok(c) => c,
        Err(e) => {
            record_failure(store, rule, alert, "", e.to_string(), now).await;
            return;
        }
    };

    let targets = match rule_engine.select_notification_targets(rule, alert, now).await {
        Ok(t) => t,
        Err(e) => {
            record_failure(store, rule, alert, "", format!("failed to resolve notification targets: {e}"), now).await;
            return;
        }
    };

    let trigger = rule.triggers.first();
    let template = render::effective_template(rule, trigger);
    let message = render::render(&template, alert);

    let sid = decrypt_or_fail(store, rule, alert, &channel, "sid", &channel.api_sid, config, now).await;
    let token = decrypt_or_fail(store, rule, alert, &channel, "token", &channel.api_token, config, now).await;
    let (Some(sid), Some(token)) = (sid, token) else {
        return;
    };

    for target in &targets {
        let Some(receiver) = channel_receiver(channel.channel_type, target) else {
            continue;
        };
        let result = send_via(store, &channel, &sid, &token, &receiver, &message, now).await;
        record(store, rule, alert, &channel, &receiver, result, now).await;
    }
}

/// Picks the address a given channel type actually sends to out of a
/// resolved target (spec §4.7: SMS/voice/XML/OAuth-SMS channels dial a
/// phone number, sendgrid/smtp send to an email address).
fn channel_receiver(channel_type: ChannelType, target: &NotificationInfo) -> Option<String> {
    match channel_type {
        ChannelType::TwilioSms | ChannelType::TwilioCall | ChannelType::LinkMobilityXml | ChannelType::MyLink => target.phone_number.clone(),
        ChannelType::Sendgrid | ChannelType::Smtp => target.email.clone(),
    }
}

/// Decrypts a channel secret, recording a failed-attempt history row
/// (spec §4.7: "credential-decrypt failure is itself a logged attempt")
/// and returning `None` on failure so the caller can short-circuit.
async fn decrypt_or_fail(store: &Arc<dyn Store>, rule: &NotificationRule, alert: &Alert, channel: &NotificationChannel, what: &str, ciphertext: &str, config: &Config, now: chrono::DateTime<Utc>) -> Option<String> {
    match crate::crypto::decrypt(config.notification_key.as_deref(), ciphertext) {
        Ok(plaintext) => Some(plaintext),
        Err(e) => {
            record_failure(store, rule, alert, "", format!("failed to decrypt channel {what}: {e}"), now).await;
            None
        }
    }
}

#[cfg(feature = "transports")]
async fn send_via(store: &Arc<dyn Store>, channel: &NotificationChannel, sid: &str, token: &str, receiver: &str, message: &str, now: chrono::DateTime<Utc>) -> Result<String, String> {
    let client = transports::build_client(channel)?;
    match channel.channel_type {
        ChannelType::TwilioSms => transports::twilio_sms(&client, channel, sid, token, receiver, message).await,
        ChannelType::TwilioCall => transports::twilio_call(&client, channel, sid, token, receiver, message).await,
        ChannelType::Sendgrid => transports::sendgrid(&client, token, &channel.sender, receiver, "Alert notification", message).await,
        ChannelType::Smtp => transports::smtp(channel.host.as_deref().unwrap_or_default(), &channel.sender, sid, token, receiver, "Alert notification", message).await,
        ChannelType::LinkMobilityXml => transports::link_mobility_xml(&client, channel, sid, token, receiver, message).await,
        ChannelType::MyLink => send_my_link(&client, store, channel, sid, token, receiver, message, now).await,
    }
}

/// Refreshes and persists the bearer before send when it is missing or
/// close to expiry, atomically updating the channel row (spec §4.7
/// my_link: "atomically update bearer and bearer_expiry on the channel
/// row"). `now` comes from the dispatcher's injected clock (spec §2) so
/// the refresh threshold is deterministically testable.
#[cfg(feature = "transports")]
async fn send_my_link(client: &reqwest::Client, store: &Arc<dyn Store>, channel: &NotificationChannel, client_id: &str, client_secret: &str, receiver: &str, message: &str, now: chrono::DateTime<Utc>) -> Result<String, String> {
    let bearer = if channel.bearer_needs_refresh(now) {
        let endpoint = channel.host.as_deref().unwrap_or("https://api.mylink.example/oauth/token");
        let (token, ttl) = transports::my_link_token(client, endpoint, client_id, client_secret).await?;
        let mut refreshed = channel.clone();
        refreshed.bearer = Some(token.clone());
        refreshed.bearer_expiry = Some(now + ttl);
        if let Err(e) = store.upsert_channel(refreshed).await {
            tracing::warn!(channel_id = %channel.id, error = %e, "failed to persist refreshed my_link bearer");
        }
        token
    } else {
        channel.bearer.clone().unwrap_or_default()
    };
    transports::my_link_send(client, channel, &bearer, receiver, message).await
}

#[cfg(not(feature = "transports"))]
async fn send_via(_store: &Arc<dyn Store>, _channel: &NotificationChannel, _sid: &str, _token: &str, _receiver: &str, _message: &str, _now: chrono::DateTime<Utc>) -> Result<String, String> {
    Err("transports feature disabled".to_string())
}

async fn record(store: &Arc<dyn Store>, rule: &NotificationRule, alert: &Alert, channel: &NotificationChannel, receiver: &str, result: Result<String, String>, now: chrono::DateTime<Utc>) {
    let (sent, error) = match &result {
        Ok(_) => (true, None),
        Err(e) => (false, Some(e.clone())),
    };
    let entry = NotificationHistory {
        id: uuid::Uuid::new_v4().to_string(),
        sent,
        message: format!("dispatch via {:?}", channel.channel_type),
        channel: channel.id.clone(),
        rule: rule.id.clone(),
        alert: alert.id.clone(),
        sender: Some(channel.sender.clone()),
        receiver: receiver.to_string(),
        sent_time: now,
        error,
        confirmed: false,
        confirmed_time: None,
    };
    if let Err(e) = store.insert_history(entry).await {
        tracing::warn!(alert_id = %alert.id, error = %e, "failed to record notification history");
    }
}

async fn record_failure(store: &Arc<dyn Store>, rule: &NotificationRule, alert: &Alert, receiver: &str, error: String, now: chrono::DateTime<Utc>) {
    let entry = NotificationHistory {
        id: uuid::Uuid::new_v4().to_string(),
        sent: false,
        message: "dispatch attempt failed before transport".to_string(),
        channel: rule.channel_id.clone(),
        rule: rule.id.clone(),
        alert: alert.id.clone(),
        sender: None,
        receiver: receiver.to_string(),
        sent_time: now,
        error: Some(error),
        confirmed: false,
        confirmed_time: None,
    };
    let _ = store.insert_history(entry).await;
}
