//! Transport adapters (spec §4.7). Each adapter takes already-rendered
//! message text and decrypted channel credentials and returns either the
//! vendor-assigned id or an error string to record in
//! [`crate::model::notification::NotificationHistory`].
//!
//! Gated behind the `transports` feature, same as the teacher's HTTP
//! client integration in `http.rs`: this crate is usable without
//! `reqwest`/`lettre` for callers that only need the core engine.

#![cfg(feature = "transports")]

use crate::model::channel::{NotificationChannel, TlsVerify};
use reqwest::Client;

const TWILIO_SMS_MAX_LEN: usize = 1600;

pub fn build_client(channel: &NotificationChannel) -> Result<Client, String> {
    Client::builder()
        .danger_accept_invalid_certs(matches!(channel.verify, TlsVerify::Insecure))
        .build()
        .map_err(|e| e.to_string())
}

/// Truncates on whitespace to at most 1600 chars, appending " ..." when
/// truncated (spec §4.7 twilio_sms).
pub fn truncate_sms(message: &str) -> String {
    if message.len() <= TWILIO_SMS_MAX_LEN {
        return message.to_string();
    }
    let budget = TWILIO_SMS_MAX_LEN - 4;
    let cut = message[..budget.min(message.len())]
        .rfind(char::is_whitespace)
        .unwrap_or(budget.min(message.len()));
    format!("{} ...", &message[..cut])
}

/// Maps characters that read poorly as TwiML speech to friendlier
/// substitutes (spec §4.7 twilio_call).
pub fn sanitize_for_speech(message: &str) -> String {
    message
        .replace('&', " and ")
        .replace('<', " less than ")
        .replace('>', " greater than ")
        .replace('%', " percent ")
        .replace('_', " ")
        .replace('#', " number ")
}

pub async fn twilio_sms(client: &Client, channel: &NotificationChannel, sid: &str, token: &str, to: &str, message: &str) -> Result<String, String> {
    let url = format!("https://api.twilio.com/2010-04-01/Accounts/{sid}/Messages.json");
    let body = [("From", channel.sender.as_str()), ("To", to), ("Body", &truncate_sms(message))];
    let response = client
        .post(&url)
        .basic_auth(sid, Some(token))
        .form(&body)
        .send()
        .await
        .map_err(|e| e.to_string())?;

    if response.status().as_u16() == 201 {
        let payload: serde_json::Value = response.json().await.map_err(|e| e.to_string())?;
        Ok(payload.get("sid").and_then(|v| v.as_str()).unwrap_or_default().to_string())
    } else {
        Err(response.text().await.unwrap_or_default())
    }
}

pub async fn twilio_call(client: &Client, channel: &NotificationChannel, sid: &str, token: &str, to: &str, message: &str) -> Result<String, String> {
    twilio_sms(client, channel, sid, token, to, message).await?;

    let twiml = format!("<Response><Say>{}</Say></Response>", sanitize_for_speech(message));
    let url = format!("https://api.twilio.com/2010-04-01/Accounts/{sid}/Calls.json");
    let body = [("From", channel.sender.as_str()), ("To", to), ("Twiml", twiml.as_str())];
    let response = client
        .post(&url)
        .basic_auth(sid, Some(token))
        .form(&body)
        .send()
        .await
        .map_err(|e| e.to_string())?;

    if response.status().as_u16() == 201 {
        let payload: serde_json::Value = response.json().await.map_err(|e| e.to_string())?;
        Ok(payload.get("sid").and_then(|v| v.as_str()).unwrap_or_default().to_string())
    } else {
        Err(response.text().await.unwrap_or_default())
    }
}

pub async fn sendgrid(client: &Client, api_key: &str, from: &str, to: &str, subject: &str, message: &str) -> Result<String, String> {
    let body = serde_json::json!({
        "personalizations": [{"to": [{"email": to}], "subject": subject}],
        "from": {"email": from},
        "content": [{"type": "text/plain", "value": message}],
    });
    let response = client
        .post("https://api.sendgrid.com/v3/mail/send")
        .bearer_auth(api_key)
        .json(&body)
        .send()
        .await
        .map_err(|e| e.to_string())?;

    if response.status().as_u16() == 202 {
        Ok(response
            .headers()
            .get("X-Message-Id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string())
    } else {
        Err(response.text().await.unwrap_or_default())
    }
}

pub async fn smtp(host: &str, sender: &str, username: &str, password: &str, to: &str, subject: &str, message: &str) -> Result<String, String> {
    use lettre::transport::smtp::authentication::Credentials;
    use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

    let email = Message::builder()
        .from(sender.parse().map_err(|e: lettre::address::AddressError| e.to_string())?)
        .to(to.parse().map_err(|e: lettre::address::AddressError| e.to_string())?)
        .subject(subject)
        .body(message.to_string())
        .map_err(|e| e.to_string())?;

    let creds = Credentials::new(username.to_string(), password.to_string());
    let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
        .map_err(|e| e.to_string())?
        .credentials(creds)
        .build();

    mailer.send(email).await.map_err(|e| e.to_string())?;
    Ok(format!("smtp:{host}"))
}

/// Substitutes credentials into a canned XML envelope and classifies the
/// response by the presence of the literal token "FAIL" (spec §4.7).
pub async fn link_mobility_xml(client: &Client, channel: &NotificationChannel, username: &str, password: &str, to: &str, message: &str) -> Result<String, String> {
    let host = channel.host.as_deref().unwrap_or("https://api.linkmobility.com/xml");
    let envelope = format!(
        "<SMS><Authentication><Username>{username}</Username><Password>{password}</Password></Authentication>\
         <Receiver>{to}</Receiver><Sender>{sender}</Sender><Message>{message}</Message></SMS>",
        sender = channel.sender,
    );
    let response = client
        .post(host)
        .header("Content-Type", "application/xml")
        .body(envelope)
        .send()
        .await
        .map_err(|e| e.to_string())?;

    let body = response.text().await.map_err(|e| e.to_string())?;
    if body.contains("FAIL") {
        Err(body)
    } else {
        Ok(body)
    }
}

/// OAuth client-credentials token fetch (spec §4.7 my_link). Callers are
/// responsible for persisting the returned bearer/expiry onto the channel
/// row; this function is side-effect free.
pub async fn my_link_token(client: &Client, token_endpoint: &str, client_id: &str, client_secret: &str) -> Result<(String, chrono::Duration), String> {
    let body = serde_json::json!({
        "grant_type": "client_credentials",
        "client_id": client_id,
        "client_secret": client_secret,
    });
    let response = client.post(token_endpoint).json(&body).send().await.map_err(|e| e.to_string())?;
    let payload: serde_json::Value = response.json().await.map_err(|e| e.to_string())?;
    let token = payload
        .get("access_token")
        .and_then(|v| v.as_str())
        .ok_or_else(|| "my_link token response missing access_token".to_string())?
        .to_string();
    let expires_in = payload.get("expires_in").and_then(|v| v.as_i64()).unwrap_or(3600);
    Ok((token, chrono::Duration::seconds(expires_in)))
}

pub async fn my_link_send(client: &Client, channel: &NotificationChannel, bearer: &str, to: &str, message: &str) -> Result<String, String> {
    let host = channel.host.as_deref().unwrap_or("https://api.mylink.example/v1/messages");
    let body = serde_json::json!({"to": to, "from": channel.sender, "text": message});
    let response = client.post(host).bearer_auth(bearer).json(&body).send().await.map_err(|e| e.to_string())?;
    if response.status().is_success() {
        let payload: serde_json::Value = response.json().await.map_err(|e| e.to_string())?;
        Ok(payload.get("id").and_then(|v| v.as_str()).unwrap_or_default().to_string())
    } else {
        Err(response.text().await.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_sms_leaves_short_messages_untouched() {
        assert_eq!(truncate_sms("short message"), "short message");
    }

    #[test]
    fn truncate_sms_cuts_on_whitespace_with_trailing_marker() {
        let long = "word ".repeat(400);
        let truncated = truncate_sms(&long);
        assert!(truncated.len() <= TWILIO_SMS_MAX_LEN);
        assert!(truncated.ends_with(" ..."));
    }

    #[test]
    fn sanitize_for_speech_maps_special_characters() {
        let sanitized = sanitize_for_speech("CPU > 90% & disk_full");
        assert!(!sanitized.contains('>'));
        assert!(!sanitized.contains('%'));
        assert!(!sanitized.contains('_'));
    }
}
