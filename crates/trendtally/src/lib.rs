pub mod analysis;
pub mod config;
pub mod error;
pub mod notify;
pub mod pipeline;
pub mod record;
pub mod sources;
pub mod store;

pub use analysis::{analyze, analyze_with, Analysis, AnalysisOptions, NoveltySet, Ranking};
pub use config::Config;
pub use error::TrendError;
pub use notify::{Notifier, SlackNotifier};
pub use pipeline::{Pipeline, RunReport, RunSettings, Stage};
pub use record::{HashtagRecord, HistoryTable};
pub use sources::{Trend, TrendSource, TwitterTrends};
pub use store::{SheetsStore, TabularStore};
