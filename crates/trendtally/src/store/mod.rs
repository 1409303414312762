use anyhow::Result;
use async_trait::async_trait;

use crate::record::{HashtagRecord, HistoryTable};

pub mod auth;
pub mod sheets;

pub use sheets::SheetsStore;

/// Append-only tabular history. Row order is append order.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TabularStore: Send + Sync {
  /// Append `rows` after the last existing row. Errors are fatal to the run.
  async fn append_rows(&self, rows: &[HashtagRecord]) -> Result<()>;

  /// Every row of the history region, header included when present.
  async fn read_all_rows(&self) -> Result<HistoryTable>;

  /// Cheap reachability check.
  async fn probe(&self) -> Result<()>;
}
