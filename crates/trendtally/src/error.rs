use thiserror::Error;

/// Failure kinds surfaced by the adapters and the pipeline.
///
/// Whether a kind is fatal is decided by the caller: the trend source and the notifier
/// swallow their errors, the store and configuration errors end the run.
#[derive(Error, Debug)]
pub enum TrendError {
  #[error("trend source unavailable: {message}")]
  SourceUnavailable { message: String },

  #[error("failed to append rows to {range}: {message}")]
  StoreWrite { range: String, message: String },

  #[error("failed to read rows from {range}: {message}")]
  StoreRead { range: String, message: String },

  #[error("malformed record at row {row}: {reason}")]
  MalformedRecord { row: usize, reason: String },

  #[error("failed to deliver notification to {channel}: {message}")]
  Notification { channel: String, message: String },

  #[error("configuration error: {message}")]
  Config { message: String },

  #[error("authentication failed: {message}")]
  Auth { message: String },
}

impl TrendError {
  pub fn source_unavailable(message: impl Into<String>) -> Self {
    Self::SourceUnavailable { message: message.into() }
  }

  pub fn store_write(range: impl Into<String>, message: impl Into<String>) -> Self {
    Self::StoreWrite { range: range.into(), message: message.into() }
  }

  pub fn store_read(range: impl Into<String>, message: impl Into<String>) -> Self {
    Self::StoreRead { range: range.into(), message: message.into() }
  }

  pub fn malformed_record(row: usize, reason: impl Into<String>) -> Self {
    Self::MalformedRecord { row, reason: reason.into() }
  }

  pub fn notification(channel: impl Into<String>, message: impl Into<String>) -> Self {
    Self::Notification { channel: channel.into(), message: message.into() }
  }

  pub fn config(message: impl Into<String>) -> Self {
    Self::Config { message: message.into() }
  }

  pub fn auth(message: impl Into<String>) -> Self {
    Self::Auth { message: message.into() }
  }

  /// True for the kinds that must end the run.
  pub fn is_fatal(&self) -> bool {
    matches!(
      self,
      Self::StoreWrite { .. } | Self::StoreRead { .. } | Self::Config { .. } | Self::Auth { .. }
    )
  }
}
