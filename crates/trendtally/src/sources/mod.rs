use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

pub mod twitter;

pub use twitter::TwitterTrends;

/// One entry of a regional trend list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Trend {
  pub name: String,
  #[serde(default)]
  pub tweet_volume: Option<u64>,
}

impl Trend {
  pub fn named(name: &str) -> Self {
    Self { name: name.to_string(), tweet_volume: None }
  }

  pub fn is_hashtag(&self) -> bool {
    self.name.starts_with('#')
  }
}

/// A service that lists what is trending in a region.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrendSource: Send + Sync {
  async fn trends(&self, region_id: u64) -> Result<Vec<Trend>>;
}

/// Combined tweet volume of the hashtag trends. Trends without a reported volume add nothing.
pub fn hashtag_volume(trends: &[Trend]) -> u64 {
  trends.iter().filter(|trend| trend.is_hashtag()).filter_map(|trend| trend.tweet_volume).sum()
}

/// Names of the hashtag trends, in source order.
pub fn hashtags_only(trends: Vec<Trend>) -> Vec<String> {
  trends.into_iter().filter(Trend::is_hashtag).map(|trend| trend.name).collect()
}

/// Trending hashtags for `region_id`, or nothing if the source fails.
///
/// Failures are logged and never returned: a run with no fresh trends still analyzes and reports
/// the existing history.
pub async fn fetch_trending_tags(source: &dyn TrendSource, region_id: u64) -> Vec<String> {
  match source.trends(region_id).await {
    Ok(trends) => {
      let total = trends.len();
      let volume = hashtag_volume(&trends);
      let tags = hashtags_only(trends);
      bentley::info(&format!(
        "Fetched {total} trends for region {region_id}, {} of them hashtags ({volume} tweets)",
        tags.len()
      ));
      tags
    }
    Err(e) => {
      bentley::warn(&format!("Error fetching trends for region {region_id}: {e:#}"));
      Vec::new()
    }
  }
}
