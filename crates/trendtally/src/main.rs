use anyhow::Result;
use clap::Parser;

use trendtally::{
  Config, Pipeline, RunReport, RunSettings, SheetsStore, SlackNotifier, TwitterTrends,
};

#[derive(Parser)]
#[command(name = "trendtally")]
#[command(about = "Record trending hashtags to a sheet and post a popularity digest to Slack")]
#[command(version)]
struct Cli {}

#[tokio::main(flavor = "current_thread")]
async fn main() {
  let _cli = Cli::parse();
  bentley::init(false);

  if let Err(e) = run().await {
    bentley::error(&format!("trendtally failed: {e:#}"));
    std::process::exit(1);
  }
}

async fn run() -> Result<()> {
  let config = Config::load()?;
  let http = reqwest::Client::builder().timeout(config.http_timeout).build()?;

  let store = SheetsStore::connect(http.clone(), &config.sheets).await?;
  let pipeline = Pipeline::new(
    Box::new(TwitterTrends::new(http.clone(), &config.twitter)),
    Box::new(store),
    Box::new(SlackNotifier::new(http, &config.slack)),
    RunSettings::from_config(&config),
  );

  pipeline.check_store().await;
  let report = pipeline.run().await?;
  announce_report(&report);
  Ok(())
}

fn announce_report(report: &RunReport) {
  let delivery = if report.notified { "posted" } else { "not delivered" };
  bentley::announce(&format!(
    "Run complete at {}\nFetched {} hashtags, appended {} rows, analyzed {} history rows\n{} ranked, {} new, summary {delivery}",
    report.recorded_at.format(trendtally::record::TIMESTAMP_FORMAT),
    report.tags_fetched,
    report.rows_appended,
    report.history_rows,
    report.analysis.ranking.len(),
    report.analysis.novelty.len(),
  ));
}
