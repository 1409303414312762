use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::config::{Secret, SlackConfig};
use crate::error::TrendError;
use crate::notify::Notifier;

/// Posts messages through the Slack Web API `chat.postMessage` method.
pub struct SlackNotifier {
  http: Client,
  api_base: String,
  bot_token: Secret,
}

/// Slack answers HTTP 200 even for rejected calls; `ok` carries the outcome.
#[derive(Debug, Deserialize)]
struct SlackResponse {
  ok: bool,
  #[serde(default)]
  error: Option<String>,
}

impl SlackNotifier {
  pub fn new(http: Client, config: &SlackConfig) -> Self {
    Self { http, api_base: config.api_base.clone(), bot_token: config.bot_token.clone() }
  }
}

#[async_trait]
impl Notifier for SlackNotifier {
  async fn deliver(&self, channel: &str, text: &str) -> Result<()> {
    let url = format!("{}/api/chat.postMessage", self.api_base);

    let response = self
      .http
      .post(&url)
      .bearer_auth(self.bot_token.expose())
      .json(&json!({ "channel": channel, "text": text }))
      .send()
      .await
      .map_err(|e| TrendError::notification(channel, format!("request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(TrendError::notification(channel, format!("HTTP {status}: {body}")).into());
    }

    let reply: SlackResponse = response
      .json()
      .await
      .map_err(|e| TrendError::notification(channel, format!("unreadable response: {e}")))?;

    if !reply.ok {
      let reason = reply.error.unwrap_or_else(|| "unknown_error".to_string());
      return Err(TrendError::notification(channel, reason).into());
    }

    Ok(())
  }
}
