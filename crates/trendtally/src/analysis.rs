//! Popularity ranking and novelty detection over the hashtag history.
//!
//! The history is split at `now - window`: rows strictly after the cutoff are *recent*, rows at or
//! before it are *older*. The ranking counts recent occurrences; the novelty set is every recent
//! tag that never occurs in an older row. With no older rows at all, every recent tag is novel.

use std::collections::{HashMap, HashSet};

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;

use crate::error::TrendError;
use crate::record::{parse_timestamp, HistoryTable};

pub const DEFAULT_WINDOW_HOURS: i64 = 24;
pub const DEFAULT_RANKING_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisOptions {
  /// Length of the trailing window that counts as recent.
  pub window: Duration,
  /// Maximum number of ranking entries.
  pub top_n: usize,
}

impl Default for AnalysisOptions {
  fn default() -> Self {
    Self { window: Duration::hours(DEFAULT_WINDOW_HOURS), top_n: DEFAULT_RANKING_SIZE }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
  pub hashtag: String,
  pub count: usize,
}

/// Recent hashtags by occurrence count, highest first. Equal counts keep first-seen order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ranking {
  entries: Vec<TagCount>,
  limit: usize,
}

impl Default for Ranking {
  fn default() -> Self {
    Self { entries: Vec::new(), limit: DEFAULT_RANKING_SIZE }
  }
}

impl Ranking {
  pub fn entries(&self) -> &[TagCount] {
    &self.entries
  }

  /// The cap the ranking was computed with.
  pub fn limit(&self) -> usize {
    self.limit
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn count_of(&self, hashtag: &str) -> Option<usize> {
    self.entries.iter().find(|entry| entry.hashtag == hashtag).map(|entry| entry.count)
  }

  /// `(hashtag, count)` pairs in rank order.
  pub fn pairs(&self) -> Vec<(&str, usize)> {
    self.entries.iter().map(|entry| (entry.hashtag.as_str(), entry.count)).collect()
  }
}

/// Recent hashtags absent from every older row, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NoveltySet(Vec<String>);

impl NoveltySet {
  pub fn tags(&self) -> &[String] {
    &self.0
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn contains(&self, hashtag: &str) -> bool {
    self.0.iter().any(|tag| tag == hashtag)
  }
}

/// Full result of one analysis pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Analysis {
  pub ranking: Ranking,
  pub novelty: NoveltySet,
  pub recent_records: usize,
  pub older_records: usize,
  pub skipped_records: usize,
}

impl Analysis {
  fn empty(options: &AnalysisOptions) -> Self {
    Self {
      ranking: Ranking { entries: Vec::new(), limit: options.top_n },
      ..Self::default()
    }
  }
}

/// Analyze with the default 24 hour window and top 10 ranking.
pub fn analyze(table: &HistoryTable, now: NaiveDateTime) -> (Ranking, NoveltySet) {
  let analysis = analyze_with(table, now, &AnalysisOptions::default());
  (analysis.ranking, analysis.novelty)
}

pub fn analyze_with(
  table: &HistoryTable,
  now: NaiveDateTime,
  options: &AnalysisOptions,
) -> Analysis {
  let Some(header) = table.header() else {
    return Analysis::empty(options);
  };
  if table.len() < 2 {
    return Analysis::empty(options);
  }

  let columns = Columns::from_header(header);
  // A window reaching past the earliest representable time makes every row recent.
  let cutoff = now.checked_sub_signed(options.window).unwrap_or(NaiveDateTime::MIN);

  let mut recent: Vec<&str> = Vec::new();
  let mut older: HashSet<&str> = HashSet::new();
  let mut older_records = 0;
  let mut skipped_records = 0;

  for (row_number, row) in table.data_rows() {
    match columns.extract(row_number, row) {
      Ok((timestamp, hashtag)) if timestamp > cutoff => recent.push(hashtag),
      Ok((_, hashtag)) => {
        older_records += 1;
        older.insert(hashtag);
      }
      Err(e) => {
        skipped_records += 1;
        bentley::debug(&format!("Skipping {e}"));
      }
    }
  }

  if skipped_records > 0 {
    bentley::warn(&format!("Excluded {skipped_records} malformed history rows from analysis"));
  }

  let first_seen = count_in_first_seen_order(&recent);
  let novelty = first_seen
    .iter()
    .filter(|entry| !older.contains(entry.hashtag.as_str()))
    .map(|entry| entry.hashtag.clone())
    .collect();

  let mut ranked = first_seen;
  // Stable sort keeps first-seen order among equal counts.
  ranked.sort_by(|a, b| b.count.cmp(&a.count));
  ranked.truncate(options.top_n);

  Analysis {
    ranking: Ranking { entries: ranked, limit: options.top_n },
    novelty: NoveltySet(novelty),
    recent_records: recent.len(),
    older_records,
    skipped_records,
  }
}

fn count_in_first_seen_order(tags: &[&str]) -> Vec<TagCount> {
  let mut counts: Vec<TagCount> = Vec::new();
  let mut positions: HashMap<&str, usize> = HashMap::new();

  for &tag in tags {
    match positions.get(tag) {
      Some(&index) => counts[index].count += 1,
      None => {
        positions.insert(tag, counts.len());
        counts.push(TagCount { hashtag: tag.to_string(), count: 1 });
      }
    }
  }

  counts
}

/// Positions of the timestamp and hashtag cells within a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Columns {
  timestamp: usize,
  hashtag: usize,
}

impl Columns {
  fn from_header(header: &[String]) -> Self {
    let find = |name: &str| header.iter().position(|cell| cell.trim().eq_ignore_ascii_case(name));

    match (find("timestamp"), find("hashtag")) {
      (Some(timestamp), Some(hashtag)) => Self { timestamp, hashtag },
      _ => {
        bentley::warn(&format!(
          "History header {header:?} does not name Timestamp/Hashtag columns; using columns A and B"
        ));
        Self { timestamp: 0, hashtag: 1 }
      }
    }
  }

  fn extract<'a>(
    &self,
    row_number: usize,
    row: &'a [String],
  ) -> Result<(NaiveDateTime, &'a str), TrendError> {
    let raw_timestamp = row
      .get(self.timestamp)
      .ok_or_else(|| TrendError::malformed_record(row_number, "missing timestamp cell"))?;
    let hashtag = row
      .get(self.hashtag)
      .map(|cell| cell.trim())
      .filter(|cell| !cell.is_empty())
      .ok_or_else(|| TrendError::malformed_record(row_number, "missing hashtag cell"))?;
    let timestamp = parse_timestamp(raw_timestamp).ok_or_else(|| {
      TrendError::malformed_record(row_number, format!("unparsable timestamp '{raw_timestamp}'"))
    })?;

    Ok((timestamp, hashtag))
  }
}
