use crate::error::FetchError;
use crate::types::RawPageStat;
use chrono::{Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_DAYS: u32 = 5;
pub const MAX_DAYS: u32 = 30;

/// Parameters for one page-view breakdown request.
#[derive(Debug, Clone)]
pub struct PageviewQuery {
    pub endpoint: String,
    pub api_key: String,
    pub site_id: String,
    pub days: u32,
}

/// Source of page-view breakdowns. Implemented by [`AnalyticsClient`]; tests
/// substitute fakes.
#[async_trait::async_trait]
pub trait AnalyticsSource: Send + Sync {
    async fn fetch_pageviews(&self, query: &PageviewQuery) -> Result<Vec<RawPageStat>, FetchError>;
}

#[derive(Debug, Serialize)]
struct QueryBody<'a> {
    site_id: &'a str,
    metrics: [&'static str; 1],
    date_range: [String; 2],
    dimensions: [&'static str; 1],
    order_by: [[&'static str; 2]; 1],
    pagination: Pagination,
}

#[derive(Debug, Serialize)]
struct Pagination {
    limit: u32,
    offset: u32,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<QueryRow>,
}

#[derive(Debug, Deserialize)]
struct QueryRow {
    #[serde(default)]
    dimensions: Vec<serde_json::Value>,
    #[serde(default)]
    metrics: Vec<serde_json::Value>,
}

/// Client for the Plausible Stats API (v2 query endpoint).
///
/// Requests a single page of results; sites with more distinct pages than
/// `page_limit` in the window lose the tail before ranking.
pub struct AnalyticsClient {
    client: reqwest::Client,
    page_limit: u32,
}

impl AnalyticsClient {
    pub fn new(timeout_secs: u64, page_limit: u32) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { client, page_limit })
    }
}

#[async_trait::async_trait]
impl AnalyticsSource for AnalyticsClient {
    async fn fetch_pageviews(&self, query: &PageviewQuery) -> Result<Vec<RawPageStat>, FetchError> {
        let (start, end) = date_range(Utc::now().date_naive(), query.days);
        let body = QueryBody {
            site_id: &query.site_id,
            metrics: ["pageviews"],
            date_range: [
                start.format("%Y-%m-%d").to_string(),
                end.format("%Y-%m-%d").to_string(),
            ],
            dimensions: ["event:page"],
            order_by: [["pageviews", "desc"]],
            pagination: Pagination {
                limit: self.page_limit,
                offset: 0,
            },
        };

        let resp = self
            .client
            .post(&query.endpoint)
            .bearer_auth(&query.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: truncate(&body, 256),
            });
        }

        let bytes = resp.bytes().await?;
        let parsed: QueryResponse =
            serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode(e.to_string()))?;

        let stats = parse_rows(parsed.results);
        tracing::debug!(rows = stats.len(), site_id = %query.site_id, "fetched pageview breakdown");
        Ok(stats)
    }
}

/// Inclusive `[today - (days - 1), today]`, with `days` clamped to 1..=30.
pub fn date_range(today: NaiveDate, days: u32) -> (NaiveDate, NaiveDate) {
    let days = clamp_days(days);
    let start = today
        .checked_sub_days(Days::new(u64::from(days - 1)))
        .unwrap_or(today);
    (start, today)
}

pub fn clamp_days(days: u32) -> u32 {
    days.clamp(1, MAX_DAYS)
}

fn parse_rows(rows: Vec<QueryRow>) -> Vec<RawPageStat> {
    rows.into_iter()
        .filter_map(|row| {
            let path = row.dimensions.first().and_then(|v| v.as_str())?.to_string();
            let pageviews = row.metrics.first().and_then(metric_as_u64);
            match pageviews {
                Some(pageviews) => Some(RawPageStat { path, pageviews }),
                None => {
                    tracing::debug!(path = %path, "skipping row without pageviews metric");
                    None
                }
            }
        })
        .collect()
}

fn metric_as_u64(value: &serde_json::Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
