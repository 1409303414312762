//! One run of the digest: fetch trends, record them, read the history back, analyze it and post
//! the summary. Stages run strictly in order and nothing is retried.

use std::fmt;

use anyhow::{Context, Result};
use chrono::{NaiveDateTime, Utc};

use crate::analysis::{analyze_with, Analysis, AnalysisOptions};
use crate::config::Config;
use crate::notify::{post_summary, Notifier};
use crate::record::HashtagRecord;
use crate::sources::{fetch_trending_tags, TrendSource};
use crate::store::TabularStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
  Fetch,
  Record,
  Readback,
  Analyze,
  Notify,
  Done,
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Stage::Fetch => "fetch",
      Stage::Record => "record",
      Stage::Readback => "readback",
      Stage::Analyze => "analyze",
      Stage::Notify => "notify",
      Stage::Done => "done",
    };
    f.write_str(name)
  }
}

/// Per-run settings taken from [`Config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
  pub region_id: u64,
  pub category: String,
  pub channel: String,
  pub analysis: AnalysisOptions,
}

impl RunSettings {
  pub fn from_config(config: &Config) -> Self {
    Self {
      region_id: config.twitter.woeid,
      category: config.category.clone(),
      channel: config.slack.channel.clone(),
      analysis: config.analysis.clone(),
    }
  }
}

/// What a completed run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
  pub recorded_at: NaiveDateTime,
  pub tags_fetched: usize,
  pub rows_appended: usize,
  pub history_rows: usize,
  pub analysis: Analysis,
  pub notified: bool,
}

pub struct Pipeline {
  source: Box<dyn TrendSource>,
  store: Box<dyn TabularStore>,
  notifier: Box<dyn Notifier>,
  settings: RunSettings,
}

impl Pipeline {
  pub fn new(
    source: Box<dyn TrendSource>,
    store: Box<dyn TabularStore>,
    notifier: Box<dyn Notifier>,
    settings: RunSettings,
  ) -> Self {
    Self { source, store, notifier, settings }
  }

  pub fn settings(&self) -> &RunSettings {
    &self.settings
  }

  /// Log whether the store answers. Never fails the run.
  pub async fn check_store(&self) -> bool {
    match self.store.probe().await {
      Ok(()) => {
        bentley::info("History store is reachable");
        true
      }
      Err(e) => {
        bentley::warn(&format!("History store probe failed: {e:#}"));
        false
      }
    }
  }

  /// Run once against the wall clock (UTC).
  pub async fn run(&self) -> Result<RunReport> {
    self.run_with_clock(|| Utc::now().naive_utc()).await
  }

  /// Run once, reading the time from `clock`.
  ///
  /// The clock is read twice: once when trends are fetched, to stamp every record of the run, and
  /// once after the history is read back, as the analysis time.
  pub async fn run_with_clock<C>(&self, clock: C) -> Result<RunReport>
  where
    C: Fn() -> NaiveDateTime,
  {
    let settings = &self.settings;

    log_stage(Stage::Fetch);
    let recorded_at = clock();
    let tags = fetch_trending_tags(self.source.as_ref(), settings.region_id).await;

    log_stage(Stage::Record);
    let records: Vec<HashtagRecord> =
      tags.iter().map(|tag| HashtagRecord::new(recorded_at, tag, &settings.category)).collect();
    self
      .store
      .append_rows(&records)
      .await
      .with_context(|| format!("{} stage failed", Stage::Record))?;
    bentley::info(&format!("Recorded {} hashtags", records.len()));

    log_stage(Stage::Readback);
    let history = self
      .store
      .read_all_rows()
      .await
      .with_context(|| format!("{} stage failed", Stage::Readback))?;
    bentley::info(&format!("Read back {} history rows", history.len()));

    log_stage(Stage::Analyze);
    let now = clock();
    let analysis = analyze_with(&history, now, &settings.analysis);
    bentley::debug(&format!(
      "{} recent, {} older, {} skipped records",
      analysis.recent_records, analysis.older_records, analysis.skipped_records
    ));

    log_stage(Stage::Notify);
    let notified =
      post_summary(self.notifier.as_ref(), &analysis.ranking, &analysis.novelty, &settings.channel)
        .await;

    log_stage(Stage::Done);
    Ok(RunReport {
      recorded_at,
      tags_fetched: tags.len(),
      rows_appended: records.len(),
      history_rows: history.len(),
      analysis,
      notified,
    })
  }
}

fn log_stage(stage: Stage) {
  bentley::debug(&format!("Stage: {stage}"));
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::TrendError;
  use crate::notify::MockNotifier;
  use crate::record::HistoryTable;
  use crate::sources::{MockTrendSource, Trend};
  use crate::store::MockTabularStore;

  fn at(raw: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S").unwrap()
  }

  fn settings() -> RunSettings {
    RunSettings {
      region_id: 23424856,
      category: "Trending".to_string(),
      channel: "#trends".to_string(),
      analysis: AnalysisOptions::default(),
    }
  }

  fn source_returning(names: &'static [&'static str]) -> MockTrendSource {
    let mut source = MockTrendSource::new();
    source
      .expect_trends()
      .returning(move |_| Ok(names.iter().map(|name| Trend::named(name)).collect()));
    source
  }

  fn pipeline(
    source: MockTrendSource,
    store: MockTabularStore,
    notifier: MockNotifier,
  ) -> Pipeline {
    Pipeline::new(Box::new(source), Box::new(store), Box::new(notifier), settings())
  }

  #[test]
  fn test_stage_names() {
    let names: Vec<String> = [
      Stage::Fetch,
      Stage::Record,
      Stage::Readback,
      Stage::Analyze,
      Stage::Notify,
      Stage::Done,
    ]
    .iter()
    .map(Stage::to_string)
    .collect();

    assert_eq!(names, ["fetch", "record", "readback", "analyze", "notify", "done"]);
  }

  #[tokio::test]
  async fn test_run_records_analyzes_and_notifies() {
    let source = source_returning(&["#a", "Tokyo", "#b"]);

    let mut store = MockTabularStore::new();
    store
      .expect_append_rows()
      .withf(|rows| {
        rows.len() == 2
          && rows[0].hashtag == "#a"
          && rows[1].hashtag == "#b"
          && rows.iter().all(|row| row.timestamp == "2024-01-02T00:00:00" && row.category == "Trending")
      })
      .times(1)
      .returning(|_| Ok(()));
    store.expect_read_all_rows().times(1).returning(|| {
      Ok(HistoryTable::new(vec![
        vec!["Timestamp".into(), "Hashtag".into(), "Category".into()],
        vec!["2023-12-31T00:00:00".into(), "#b".into(), "Trending".into()],
        vec!["2024-01-01T12:00:00".into(), "#a".into(), "Trending".into()],
        vec!["2024-01-02T00:00:00".into(), "#a".into(), "Trending".into()],
        vec!["2024-01-02T00:00:00".into(), "#b".into(), "Trending".into()],
      ]))
    });

    let mut notifier = MockNotifier::new();
    notifier
      .expect_deliver()
      .withf(|channel, text| {
        channel == "#trends"
          && text.contains("- #a: 2 times\n- #b: 1 time")
          && text.ends_with("Newly appeared hashtags:\n- #a")
      })
      .times(1)
      .returning(|_, _| Ok(()));

    let report = pipeline(source, store, notifier)
      .run_with_clock(|| at("2024-01-02T00:00:00"))
      .await
      .unwrap();

    assert_eq!(report.recorded_at, at("2024-01-02T00:00:00"));
    assert_eq!(report.tags_fetched, 2);
    assert_eq!(report.rows_appended, 2);
    assert_eq!(report.history_rows, 5);
    assert_eq!(report.analysis.ranking.pairs(), vec![("#a", 2), ("#b", 1)]);
    assert_eq!(report.analysis.novelty.tags(), ["#a"]);
    assert!(report.notified);
  }

  #[tokio::test]
  async fn test_record_failure_aborts_before_readback() {
    let source = source_returning(&["#a"]);

    let mut store = MockTabularStore::new();
    store
      .expect_append_rows()
      .returning(|_| Err(TrendError::store_write("out!A:C", "HTTP 403 Forbidden").into()));
    store.expect_read_all_rows().times(0);

    let mut notifier = MockNotifier::new();
    notifier.expect_deliver().times(0);

    let error = pipeline(source, store, notifier)
      .run_with_clock(|| at("2024-01-02T00:00:00"))
      .await
      .unwrap_err();

    assert!(error.to_string().contains("record stage failed"));
    assert!(matches!(error.downcast_ref::<TrendError>(), Some(TrendError::StoreWrite { .. })));
  }

  #[tokio::test]
  async fn test_readback_failure_aborts_before_notify() {
    let source = source_returning(&["#a"]);

    let mut store = MockTabularStore::new();
    store.expect_append_rows().times(1).returning(|_| Ok(()));
    store
      .expect_read_all_rows()
      .returning(|| Err(TrendError::store_read("out!A:C", "HTTP 500").into()));

    let mut notifier = MockNotifier::new();
    notifier.expect_deliver().times(0);

    let error = pipeline(source, store, notifier)
      .run_with_clock(|| at("2024-01-02T00:00:00"))
      .await
      .unwrap_err();

    assert!(error.to_string().contains("readback stage failed"));
    let trend_error = error.downcast_ref::<TrendError>().unwrap();
    assert!(matches!(trend_error, TrendError::StoreRead { .. }));
    assert!(trend_error.is_fatal());
  }

  #[tokio::test]
  async fn test_source_failure_still_analyzes_history() {
    let mut source = MockTrendSource::new();
    source
      .expect_trends()
      .returning(|_| Err(TrendError::source_unavailable("request timed out").into()));

    let mut store = MockTabularStore::new();
    store.expect_append_rows().withf(|rows| rows.is_empty()).times(1).returning(|_| Ok(()));
    store.expect_read_all_rows().times(1).returning(|| {
      Ok(HistoryTable::new(vec![
        vec!["Timestamp".into(), "Hashtag".into(), "Category".into()],
        vec!["2024-01-01T23:00:00".into(), "#bar".into(), "Trending".into()],
      ]))
    });

    let mut notifier = MockNotifier::new();
    notifier
      .expect_deliver()
      .withf(|_, text| text.contains("- #bar: 1 time"))
      .times(1)
      .returning(|_, _| Ok(()));

    let report = pipeline(source, store, notifier)
      .run_with_clock(|| at("2024-01-02T00:00:00"))
      .await
      .unwrap();

    assert_eq!(report.tags_fetched, 0);
    assert_eq!(report.rows_appended, 0);
    assert_eq!(report.analysis.novelty.tags(), ["#bar"]);
  }

  #[tokio::test]
  async fn test_notification_failure_still_succeeds() {
    let source = source_returning(&[]);

    let mut store = MockTabularStore::new();
    store.expect_append_rows().returning(|_| Ok(()));
    store.expect_read_all_rows().returning(|| Ok(HistoryTable::default()));

    let mut notifier = MockNotifier::new();
    notifier
      .expect_deliver()
      .times(1)
      .returning(|channel, _| Err(TrendError::notification(channel, "invalid_auth").into()));

    let report = pipeline(source, store, notifier)
      .run_with_clock(|| at("2024-01-02T00:00:00"))
      .await
      .unwrap();

    assert!(!report.notified);
    assert!(report.analysis.ranking.is_empty());
  }

  #[tokio::test]
  async fn test_check_store_never_fails() {
    let mut store = MockTabularStore::new();
    store
      .expect_probe()
      .times(1)
      .returning(|| Err(TrendError::store_read("out!A1:A1", "connection refused").into()));

    let p = pipeline(MockTrendSource::new(), store, MockNotifier::new());
    assert!(!p.check_store().await);
  }

  #[test]
  fn test_settings_from_config() {
    let values = [
      ("TWITTER_BEARER_TOKEN", "bearer"),
      ("SPREADSHEET_ID", "sheet-123"),
      ("GOOGLE_ACCESS_TOKEN", "ya29.test"),
      ("SLACK_BOT_TOKEN", "xoxb-test"),
      ("SLACK_CHANNEL", "#digest"),
      ("TREND_WOEID", "1118370"),
      ("TREND_CATEGORY", "Tokyo"),
    ];
    let config = Config::from_lookup(|key| {
      values.iter().find(|(k, _)| *k == key).map(|(_, v)| v.to_string())
    })
    .unwrap();

    let settings = RunSettings::from_config(&config);
    assert_eq!(settings.region_id, 1118370);
    assert_eq!(settings.category, "Tokyo");
    assert_eq!(settings.channel, "#digest");
    assert_eq!(settings.analysis, AnalysisOptions::default());
  }
}
