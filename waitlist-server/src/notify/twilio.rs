//! Twilio SMS adapter

use super::sender::{NotificationSender, SendError};
use async_trait::async_trait;
use std::time::Duration;

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

/// Twilio account credentials
#[derive(Clone)]
pub struct TwilioCredentials {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
}

impl std::fmt::Debug for TwilioCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwilioCredentials")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"<redacted>")
            .field("from_number", &self.from_number)
            .finish()
    }
}

/// Sends SMS through the Twilio Messages API
#[derive(Debug, Clone)]
pub struct TwilioSender {
    client: reqwest::Client,
    credentials: TwilioCredentials,
    base_url: String,
}

impl TwilioSender {
    pub fn new(credentials: TwilioCredentials) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            client,
            credentials,
            base_url: TWILIO_API_BASE.to_string(),
        }
    }

    /// Point the adapter at another API host
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/Accounts/{}/Messages.json",
            self.base_url.trim_end_matches('/'),
            self.credentials.account_sid
        )
    }
}

#[async_trait]
impl NotificationSender for TwilioSender {
    async fn send(&self, phone: &str, message: &str) -> Result<(), SendError> {
        let resp = self
            .client
            .post(self.messages_url())
            .basic_auth(
                &self.credentials.account_sid,
                Some(&self.credentials.auth_token),
            )
            .form(&[
                ("To", phone),
                ("From", self.credentials.from_number.as_str()),
                ("Body", message),
            ])
            .send()
            .await
            .map_err(|e| SendError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::error!(to = %phone, status = %status, body = %body, "Twilio rejected SMS");
            return Err(SendError::Rejected(format!("HTTP {status}")));
        }

        let sid = resp
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|v| v.get("sid").and_then(|s| s.as_str()).map(str::to_string));
        tracing::info!(to = %phone, sid = ?sid, "SMS sent via Twilio");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "twilio"
    }
}
