//! Anthropic Messages API client used for notable-alert generation and
//! promise-velocity refinement.

use anyhow::{Context, Result, bail};
use reqwest::Client;
use serde_json::{Value, json};

use crate::ANTHROPIC_API_URL;

pub const MODEL: &str = "claude-sonnet-4-20250514";
const MAX_TOKENS: u32 = 1024;

/// Send one user prompt and return the text of the first content block.
pub async fn chat(client: &Client, api_key: &str, prompt: &str) -> Result<String> {
    let response = client
        .post(ANTHROPIC_API_URL)
        .header("x-api-key", api_key)
        .header("anthropic-version", "2023-06-01")
        .json(&json!({
            "model": MODEL,
            "max_tokens": MAX_TOKENS,
            "messages": [{"role": "user", "content": prompt}]
        }))
        .send()
        .await
        .context("Anthropic request failed")?;

    let status = response.status();
    if !status.is_success() {
        bail!("Anthropic API error: {status}");
    }
    let body: Value = response
        .json()
        .await
        .context("invalid Anthropic response")?;
    let text = body
        .pointer("/content/0/text")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if text.is_empty() {
        bail!("Anthropic response carried no text content");
    }
    Ok(text.to_string())
}

/// Pull a JSON object out of a model reply. Models asked for JSON-only
/// output still sometimes wrap it in prose or code fences, so after a whole
/// parse fails we try the span between the first `{` and the last `}`.
pub fn extract_json(text: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(text.trim()) {
        if value.is_object() || value.is_array() {
            return Some(value);
        }
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}
