use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Format used for timestamps this tool writes.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Header row naming the three columns of the history sheet.
pub const HEADER: [&str; 3] = ["Timestamp", "Hashtag", "Category"];

// Naive forms accepted on read, tried in order. `%.f` also matches an absent fraction.
const NAIVE_FORMATS: &[&str] = &[
  "%Y-%m-%dT%H:%M:%S%.f",
  "%Y-%m-%d %H:%M:%S%.f",
  "%Y/%m/%d %H:%M:%S%.f",
  "%Y-%m-%dT%H:%M",
  "%Y-%m-%d %H:%M",
  "%Y/%m/%d %H:%M",
];

/// One appended row: when a tag was seen trending, the tag, and its category label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashtagRecord {
  pub timestamp: String,
  pub hashtag: String,
  pub category: String,
}

impl HashtagRecord {
  pub fn new(recorded_at: NaiveDateTime, hashtag: &str, category: &str) -> Self {
    Self {
      timestamp: format_timestamp(recorded_at),
      hashtag: hashtag.to_string(),
      category: category.to_string(),
    }
  }

  /// The record as an ordered `[timestamp, hashtag, category]` row.
  pub fn to_row(&self) -> Vec<String> {
    vec![self.timestamp.clone(), self.hashtag.clone(), self.category.clone()]
  }
}

pub fn format_timestamp(at: NaiveDateTime) -> String {
  at.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a stored timestamp into naive UTC.
///
/// Values carrying an offset are converted to UTC; naive values are taken as UTC already.
/// A bare date means midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
  let raw = raw.trim();
  if raw.is_empty() {
    return None;
  }

  if let Ok(with_offset) = DateTime::parse_from_rfc3339(raw) {
    return Some(with_offset.with_timezone(&Utc).naive_utc());
  }

  NAIVE_FORMATS
    .iter()
    .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
    .or_else(|| {
      NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok().and_then(|date| date.and_hms_opt(0, 0, 0))
    })
}

/// Every row of the history region, in store order. The first row is the header when present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryTable {
  rows: Vec<Vec<String>>,
}

impl HistoryTable {
  pub fn new(rows: Vec<Vec<String>>) -> Self {
    Self { rows }
  }

  /// A table holding the standard header followed by `records`.
  pub fn with_records(records: &[HashtagRecord]) -> Self {
    let mut rows = vec![HEADER.iter().map(|name| name.to_string()).collect::<Vec<_>>()];
    rows.extend(records.iter().map(HashtagRecord::to_row));
    Self { rows }
  }

  pub fn rows(&self) -> &[Vec<String>] {
    &self.rows
  }

  pub fn len(&self) -> usize {
    self.rows.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rows.is_empty()
  }

  pub fn header(&self) -> Option<&[String]> {
    self.rows.first().map(Vec::as_slice)
  }

  /// Rows after the header, paired with their 1-based sheet row number.
  pub fn data_rows(&self) -> impl Iterator<Item = (usize, &[String])> {
    self.rows.iter().enumerate().skip(1).map(|(index, row)| (index + 1, row.as_slice()))
  }
}

impl From<Vec<Vec<String>>> for HistoryTable {
  fn from(rows: Vec<Vec<String>>) -> Self {
    Self::new(rows)
  }
}
