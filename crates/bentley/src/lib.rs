//! ## Features
//!
//! - Standard logging levels (info, warn, error, debug, success) backed by `tracing`
//! - Multi-line message support, one event per line
//! - Banner displays for run summaries
//! - All output to stderr
//!
//! ## Usage
//!
//! Call [`init`] once at process start, then use `info()`, `warn()`, `error()`, `debug()`,
//! or `success()`. Events emitted before `init` are discarded.

use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

/// Filter used when `RUST_LOG` is unset. HTTP internals stay quiet unless verbose.
pub fn default_directives(verbose: bool) -> &'static str {
  if verbose {
    "debug,hyper=info,hyper_util=info,reqwest=info,rustls=info"
  } else {
    "info,hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn"
  }
}

/// Install the stderr subscriber. `RUST_LOG` takes precedence over `verbose`.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init(verbose: bool) -> bool {
  let filter = EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));

  tracing_subscriber::registry()
    .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
    .with(filter)
    .try_init()
    .is_ok()
}

/// Create a banner line of the specified length and character
pub fn banner_line(length: usize, char: char) -> String {
  char.to_string().repeat(length)
}

/// Display a message with a banner around it
pub fn as_banner<F>(log_fn: F, message: &str, width: Option<usize>, border_char: Option<char>)
where
  F: Fn(&str),
{
  let banner = banner_line(width.unwrap_or(50), border_char.unwrap_or('='));

  log_fn(&banner);
  log_fn(message);
  log_fn(&banner);
}

/// Info level logging - general information
pub fn info(message: &str) {
  for line in message.lines() {
    tracing::info!("{line}");
  }
}

/// Warning level logging - something needs attention
pub fn warn(message: &str) {
  for line in message.lines() {
    tracing::warn!("{line}");
  }
}

/// Error level logging - something went wrong
pub fn error(message: &str) {
  for line in message.lines() {
    tracing::error!("{line}");
  }
}

/// Debug level logging - detailed diagnostic information
pub fn debug(message: &str) {
  for line in message.lines() {
    tracing::debug!("{line}");
  }
}

/// Success level logging - a step completed
pub fn success(message: &str) {
  for line in message.lines() {
    tracing::info!(outcome = "success", "{line}");
  }
}

/// Frame a message in a banner at info level
pub fn announce(message: &str) {
  as_banner(info, message, Some(50), Some('-'));
}
