use anyhow::Result;
use async_trait::async_trait;

use crate::analysis::{NoveltySet, Ranking};

pub mod slack;

pub use slack::SlackNotifier;

pub const SUMMARY_TITLE: &str = "Latest hashtag analysis:";
const EMPTY_SECTION: &str = "- (none)";

/// A chat service that accepts plain-text messages for a named channel.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
  async fn deliver(&self, channel: &str, text: &str) -> Result<()>;
}

/// Render the ranking and novelty set as a single message.
///
/// ```text
/// Latest hashtag analysis:
///
/// Top 10 hashtags:
/// - #a: 3 times
///
/// Newly appeared hashtags:
/// - #a
/// ```
pub fn format_summary(ranking: &Ranking, novelty: &NoveltySet) -> String {
  let mut lines = vec![SUMMARY_TITLE.to_string(), String::new()];

  lines.push(format!("Top {} hashtags:", ranking.limit()));
  if ranking.is_empty() {
    lines.push(EMPTY_SECTION.to_string());
  }
  for entry in ranking.entries() {
    let unit = if entry.count == 1 { "time" } else { "times" };
    lines.push(format!("- {}: {} {unit}", entry.hashtag, entry.count));
  }

  lines.push(String::new());
  lines.push("Newly appeared hashtags:".to_string());
  if novelty.is_empty() {
    lines.push(EMPTY_SECTION.to_string());
  }
  for tag in novelty.tags() {
    lines.push(format!("- {tag}"));
  }

  lines.join("\n")
}

/// Post the summary to `channel`. Returns whether delivery succeeded; failures are only logged.
pub async fn post_summary(
  notifier: &dyn Notifier,
  ranking: &Ranking,
  novelty: &NoveltySet,
  channel: &str,
) -> bool {
  let text = format_summary(ranking, novelty);

  match notifier.deliver(channel, &text).await {
    Ok(()) => {
      bentley::success(&format!("Posted hashtag summary to {channel}"));
      true
    }
    Err(e) => {
      bentley::error(&format!("Error posting summary to {channel}: {e:#}"));
      false
    }
  }
}
