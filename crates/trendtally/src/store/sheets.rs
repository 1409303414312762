use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::json;

use crate::config::{Secret, SheetsConfig};
use crate::error::TrendError;
use crate::record::{HashtagRecord, HistoryTable};
use crate::store::{auth, TabularStore};

/// History kept in a Google Sheets range via the Sheets v4 values API.
pub struct SheetsStore {
  http: Client,
  api_base: String,
  spreadsheet_id: String,
  range: String,
  probe_range: String,
  access_token: Secret,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
  #[serde(default)]
  values: Vec<Vec<serde_json::Value>>,
}

impl SheetsStore {
  /// Resolve credentials to an access token and build the store.
  pub async fn connect(http: Client, config: &SheetsConfig) -> Result<Self> {
    let token = auth::access_token(&http, &config.credentials).await?;
    Ok(Self::with_token(http, config, Secret::new(token)))
  }

  pub fn with_token(http: Client, config: &SheetsConfig, access_token: Secret) -> Self {
    Self {
      http,
      api_base: config.api_base.clone(),
      spreadsheet_id: config.spreadsheet_id.clone(),
      range: config.history_range(),
      probe_range: config.probe_range(),
      access_token,
    }
  }

  pub fn range(&self) -> &str {
    &self.range
  }

  /// `{base}/v4/spreadsheets/{id}/values/{last_segment}` with the range percent-encoded.
  fn values_url(&self, last_segment: &str) -> Result<Url> {
    let mut url = Url::parse(&self.api_base)
      .map_err(|e| TrendError::config(format!("invalid SHEETS_API_BASE '{}': {e}", self.api_base)))?;
    url
      .path_segments_mut()
      .map_err(|_| TrendError::config(format!("SHEETS_API_BASE '{}' cannot be a base", self.api_base)))?
      .pop_if_empty()
      .extend(["v4", "spreadsheets", self.spreadsheet_id.as_str(), "values", last_segment]);
    Ok(url)
  }

  async fn get_values(&self, range: &str) -> Result<Vec<Vec<String>>> {
    let url = self.values_url(range)?;
    let response = self
      .http
      .get(url)
      .bearer_auth(self.access_token.expose())
      .send()
      .await
      .map_err(|e| TrendError::store_read(range, e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(TrendError::store_read(range, format!("HTTP {status}: {body}")).into());
    }

    let value_range: ValueRange = response
      .json()
      .await
      .map_err(|e| TrendError::store_read(range, format!("unreadable response: {e}")))?;

    Ok(value_range.values.into_iter().map(|row| row.into_iter().map(cell_text).collect()).collect())
  }
}

fn cell_text(cell: serde_json::Value) -> String {
  match cell {
    serde_json::Value::String(text) => text,
    serde_json::Value::Null => String::new(),
    other => other.to_string(),
  }
}

#[async_trait]
impl TabularStore for SheetsStore {
  async fn append_rows(&self, rows: &[HashtagRecord]) -> Result<()> {
    if rows.is_empty() {
      bentley::debug("No rows to append; skipping Sheets append");
      return Ok(());
    }

    let url = self.values_url(&format!("{}:append", self.range))?;
    let values: Vec<Vec<String>> = rows.iter().map(HashtagRecord::to_row).collect();
    let body = json!({
      "range": self.range,
      "majorDimension": "ROWS",
      "values": values,
    });

    let response = self
      .http
      .post(url)
      .query(&[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")])
      .bearer_auth(self.access_token.expose())
      .json(&body)
      .send()
      .await
      .map_err(|e| TrendError::store_write(&self.range, e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(TrendError::store_write(&self.range, format!("HTTP {status}: {body}")).into());
    }

    bentley::debug(&format!("Appended {} rows to {}", rows.len(), self.range));
    Ok(())
  }

  async fn read_all_rows(&self) -> Result<HistoryTable> {
    let rows = self.get_values(&self.range).await?;
    bentley::debug(&format!("Read {} rows from {}", rows.len(), self.range));
    Ok(HistoryTable::new(rows))
  }

  async fn probe(&self) -> Result<()> {
    self.get_values(&self.probe_range).await.map(|_| ())
  }
}
