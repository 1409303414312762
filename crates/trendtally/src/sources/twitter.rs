use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::config::{Secret, TwitterConfig};
use crate::error::TrendError;
use crate::sources::{Trend, TrendSource};

/// Regional trends from the v1.1 `trends/place` endpoint, using app-only bearer auth.
pub struct TwitterTrends {
  http: Client,
  api_base: String,
  bearer_token: Secret,
}

#[derive(Debug, Deserialize)]
struct PlaceTrends {
  #[serde(default)]
  trends: Vec<Trend>,
}

impl TwitterTrends {
  pub fn new(http: Client, config: &TwitterConfig) -> Self {
    Self { http, api_base: config.api_base.clone(), bearer_token: config.bearer_token.clone() }
  }
}

#[async_trait]
impl TrendSource for TwitterTrends {
  async fn trends(&self, region_id: u64) -> Result<Vec<Trend>> {
    let url = format!("{}/1.1/trends/place.json", self.api_base);

    let response = self
      .http
      .get(&url)
      .query(&[("id", region_id)])
      .bearer_auth(self.bearer_token.expose())
      .send()
      .await
      .map_err(|e| TrendError::source_unavailable(format!("request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(TrendError::source_unavailable(format!("HTTP {status}: {body}")).into());
    }

    let places: Vec<PlaceTrends> = response
      .json()
      .await
      .map_err(|e| TrendError::source_unavailable(format!("malformed trends response: {e}")))?;

    Ok(places.into_iter().next().map(|place| place.trends).unwrap_or_default())
  }
}
