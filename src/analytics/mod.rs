pub mod client;
pub mod ranker;

pub use client::{AnalyticsClient, AnalyticsSource, PageviewQuery};
pub use ranker::ArticleRanker;
