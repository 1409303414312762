//! Process-wide configuration.
//!
//! Values come from environment variables, optionally overridden by a flat JSON file whose keys
//! are the same variable names. The file is looked up at `$TRENDTALLY_CONFIG`, then
//! `./trendtally.json`, then `<config dir>/trendtally/config.json`.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::analysis::{AnalysisOptions, DEFAULT_RANKING_SIZE, DEFAULT_WINDOW_HOURS};
use crate::error::TrendError;
use crate::store::auth::{GoogleCredentials, ServiceAccountKey};

pub const CONFIG_PATH_VAR: &str = "TRENDTALLY_CONFIG";
pub const LOCAL_CONFIG_FILE: &str = "trendtally.json";

/// Japan, the region the digest was first built for.
pub const DEFAULT_WOEID: u64 = 23424856;
pub const DEFAULT_SHEET_NAME: &str = "out";
pub const DEFAULT_CATEGORY: &str = "Trending";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

pub const TWITTER_API_BASE: &str = "https://api.twitter.com";
pub const SHEETS_API_BASE: &str = "https://sheets.googleapis.com";
pub const SLACK_API_BASE: &str = "https://slack.com";

/// A credential whose value never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
  pub fn new(value: impl Into<String>) -> Self {
    Self(value.into())
  }

  pub fn expose(&self) -> &str {
    &self.0
  }
}

impl fmt::Debug for Secret {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("Secret(****)")
  }
}

#[derive(Debug, Clone)]
pub struct TwitterConfig {
  pub bearer_token: Secret,
  pub woeid: u64,
  pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct SheetsConfig {
  pub spreadsheet_id: String,
  pub sheet_name: String,
  pub api_base: String,
  pub credentials: GoogleCredentials,
}

impl SheetsConfig {
  /// The three-column region rows are appended to and read from.
  pub fn history_range(&self) -> String {
    format!("{}!A:C", self.sheet_name)
  }

  /// A single cell, used to check the sheet is reachable.
  pub fn probe_range(&self) -> String {
    format!("{}!A1:A1", self.sheet_name)
  }
}

#[derive(Debug, Clone)]
pub struct SlackConfig {
  pub bot_token: Secret,
  pub channel: String,
  pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct Config {
  pub twitter: TwitterConfig,
  pub sheets: SheetsConfig,
  pub slack: SlackConfig,
  /// Label written in the third column of every appended row.
  pub category: String,
  pub analysis: AnalysisOptions,
  /// Applied to every external request.
  pub http_timeout: Duration,
}

impl Config {
  /// Load from the environment and the optional override file.
  pub fn load() -> Result<Self> {
    let overrides = match override_file_path() {
      Some(path) => {
        bentley::debug(&format!("Loading configuration overrides from {}", path.display()));
        load_override_file(&path)?
      }
      None => HashMap::new(),
    };

    Self::from_lookup(|key| overrides.get(key).cloned().or_else(|| std::env::var(key).ok()))
  }

  /// Build from an arbitrary key lookup. Blank values count as unset.
  pub fn from_lookup<F>(lookup: F) -> Result<Self>
  where
    F: Fn(&str) -> Option<String>,
  {
    let get = |key: &str| lookup(key).map(|value| value.trim().to_string()).filter(|v| !v.is_empty());
    let require = |key: &str| {
      get(key).ok_or_else(|| TrendError::config(format!("{key} must be set")))
    };

    let twitter = TwitterConfig {
      bearer_token: Secret::new(require("TWITTER_BEARER_TOKEN")?),
      woeid: parse_positive(&get, "TREND_WOEID", DEFAULT_WOEID)?,
      api_base: base_url(get("TWITTER_API_BASE"), TWITTER_API_BASE),
    };

    let sheets = SheetsConfig {
      spreadsheet_id: require("SPREADSHEET_ID")?,
      sheet_name: get("SHEET_NAME").unwrap_or_else(|| DEFAULT_SHEET_NAME.to_string()),
      api_base: base_url(get("SHEETS_API_BASE"), SHEETS_API_BASE),
      credentials: google_credentials(&get)?,
    };

    let slack = SlackConfig {
      bot_token: Secret::new(require("SLACK_BOT_TOKEN")?),
      channel: require("SLACK_CHANNEL")?,
      api_base: base_url(get("SLACK_API_BASE"), SLACK_API_BASE),
    };

    let window_hours: u64 =
      parse_positive(&get, "ANALYSIS_WINDOW_HOURS", DEFAULT_WINDOW_HOURS as u64)?;
    let window_hours = i64::try_from(window_hours)
      .map_err(|_| TrendError::config("ANALYSIS_WINDOW_HOURS is out of range"))?;
    let analysis = AnalysisOptions {
      window: chrono::Duration::try_hours(window_hours)
        .ok_or_else(|| TrendError::config("ANALYSIS_WINDOW_HOURS is out of range"))?,
      top_n: parse_positive(&get, "RANKING_SIZE", DEFAULT_RANKING_SIZE as u64)? as usize,
    };

    Ok(Self {
      twitter,
      sheets,
      slack,
      category: get("TREND_CATEGORY").unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
      analysis,
      http_timeout: Duration::from_secs(parse_positive(
        &get,
        "HTTP_TIMEOUT_SECS",
        DEFAULT_HTTP_TIMEOUT_SECS,
      )?),
    })
  }
}

fn base_url(value: Option<String>, default: &str) -> String {
  value.unwrap_or_else(|| default.to_string()).trim_end_matches('/').to_string()
}

fn parse_positive<G>(get: &G, key: &str, default: u64) -> Result<u64>
where
  G: Fn(&str) -> Option<String>,
{
  let Some(raw) = get(key) else {
    return Ok(default);
  };

  match raw.parse::<u64>() {
    Ok(0) => Err(TrendError::config(format!("{key} must be greater than zero")).into()),
    Ok(value) => Ok(value),
    Err(_) => Err(TrendError::config(format!("{key} must be a positive integer, got '{raw}'")).into()),
  }
}

/// An explicit access token wins, then inline key JSON, then a key file path.
fn google_credentials<G>(get: &G) -> Result<GoogleCredentials>
where
  G: Fn(&str) -> Option<String>,
{
  if let Some(token) = get("GOOGLE_ACCESS_TOKEN") {
    return Ok(GoogleCredentials::AccessToken(Secret::new(token)));
  }

  if let Some(raw) = get("GOOGLE_CREDENTIALS") {
    return Ok(GoogleCredentials::ServiceAccount(ServiceAccountKey::from_json(&raw)?));
  }

  if let Some(path) = get("GOOGLE_APPLICATION_CREDENTIALS") {
    let raw = std::fs::read_to_string(&path).map_err(|e| {
      TrendError::config(format!("cannot read GOOGLE_APPLICATION_CREDENTIALS file {path}: {e}"))
    })?;
    return Ok(GoogleCredentials::ServiceAccount(ServiceAccountKey::from_json(&raw)?));
  }

  Err(
    TrendError::config(
      "one of GOOGLE_ACCESS_TOKEN, GOOGLE_CREDENTIALS or GOOGLE_APPLICATION_CREDENTIALS must be set",
    )
    .into(),
  )
}

/// The override file to use, if any. An explicitly named file is returned even if missing.
pub fn override_file_path() -> Option<PathBuf> {
  if let Some(explicit) = std::env::var_os(CONFIG_PATH_VAR).filter(|value| !value.is_empty()) {
    return Some(PathBuf::from(explicit));
  }

  let local = PathBuf::from(LOCAL_CONFIG_FILE);
  if local.exists() {
    return Some(local);
  }

  dirs::config_dir()
    .map(|dir| dir.join("trendtally").join("config.json"))
    .filter(|path| path.exists())
}

/// Read a flat JSON object of overrides.
///
/// Strings are taken as-is, numbers and booleans are stringified, nested objects (such as an
/// inline service-account key) are re-serialized as JSON, and nulls are dropped.
pub fn load_override_file(path: &Path) -> Result<HashMap<String, String>> {
  let content = std::fs::read_to_string(path)
    .with_context(|| format!("failed to read configuration file {}", path.display()))?;
  let object: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&content)
    .map_err(|e| TrendError::config(format!("{} is not a JSON object: {e}", path.display())))?;

  Ok(
    object
      .into_iter()
      .filter_map(|(key, value)| match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(text) => Some((key, text)),
        other => Some((key, other.to_string())),
      })
      .collect(),
  )
}
