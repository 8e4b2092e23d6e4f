//! Buttondown newsletter client: subscriber signup plus the breaking-alert
//! and weekly-digest sends.

use anyhow::{Context, Result, bail};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::BUTTONDOWN_API_BASE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    Subscribed,
    AlreadySubscribed,
}

#[derive(Debug, Clone)]
pub struct Newsletter {
    http: Client,
    api_key: String,
}

impl Newsletter {
    pub fn new(http: Client, api_key: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
        }
    }

    fn auth_header(&self) -> String {
        format!("Token {}", self.api_key)
    }

    /// Add a subscriber with the given tags. An existing subscriber is not
    /// an error; Buttondown answers 409 and we report it as such.
    pub async fn subscribe(&self, email: &str, tags: &[&str]) -> Result<SubscribeOutcome> {
        let url = format!("{BUTTONDOWN_API_BASE}/subscribers");
        let response = self
            .http
            .post(&url)
            .header("Authorization", self.auth_header())
            .json(&json!({"email_address": email, "tags": tags}))
            .send()
            .await
            .context("Buttondown subscribe request failed")?;

        let status = response.status();
        if status == StatusCode::CONFLICT {
            debug!("Subscriber already exists");
            return Ok(SubscribeOutcome::AlreadySubscribed);
        }
        if !status.is_success() {
            bail!("Buttondown subscribe error: {status}");
        }
        Ok(SubscribeOutcome::Subscribed)
    }

    /// Send a public email to subscribers carrying any of `tags`. Returns
    /// the Buttondown email id when the API reports one.
    pub async fn send_email(
        &self,
        subject: &str,
        body: &str,
        tags: &[&str],
    ) -> Result<Option<String>> {
        let url = format!("{BUTTONDOWN_API_BASE}/emails");
        let response = self
            .http
            .post(&url)
            .header("Authorization", self.auth_header())
            .json(&email_payload(subject, body, tags))
            .send()
            .await
            .context("Buttondown email request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("Buttondown email error: {status}");
        }
        let reply: Value = response
            .json()
            .await
            .context("invalid Buttondown email response")?;
        let id = reply
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string);
        info!("Sent newsletter email: {subject}");
        Ok(id)
    }
}

/// Buttondown email payload; tags are a top-level array.
fn email_payload(subject: &str, body: &str, tags: &[&str]) -> Value {
    json!({
        "subject": subject,
        "body": body,
        "email_type": "public",
        "tags": tags
    })
}
