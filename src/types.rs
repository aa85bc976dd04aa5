use serde::{Deserialize, Serialize};

/// One row of the analytics page breakdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPageStat {
    pub path: String,
    pub pageviews: u64,
}

/// A ranked page, optionally resolved to a published article.
///
/// `content_id` is `None` when no published article matches the path's slug.
/// Such entries stay in the cached list and are skipped at render time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedArticle {
    pub path: String,
    pub pageviews: u64,
    pub content_id: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub permalink: Option<String>,
}

impl RankedArticle {
    pub fn unresolved(path: impl Into<String>, pageviews: u64) -> Self {
        Self {
            path: path.into(),
            pageviews,
            content_id: None,
            title: None,
            permalink: None,
        }
    }

    /// Resolved identity, treating the legacy `0` sentinel as absent.
    pub fn resolved_id(&self) -> Option<i64> {
        self.content_id.filter(|id| *id > 0)
    }
}

/// The cached top-N list. Replaced wholesale on every successful refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedList {
    pub articles: Vec<RankedArticle>,
    /// Unix millis of the refresh that produced this list.
    pub refreshed_at: i64,
}

/// A published article known to the content directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRef {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub permalink: String,
}

/// What the CMS tells us about the page it is rendering.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PageContext {
    pub post_id: i64,
    #[serde(default = "default_post_type")]
    pub post_type: String,
    #[serde(default = "default_true")]
    pub is_single: bool,
    #[serde(default)]
    pub is_api_request: bool,
    #[serde(default)]
    pub categories: Vec<String>,
}

fn default_post_type() -> String {
    "post".to_string()
}

fn default_true() -> bool {
    true
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub db_ok: bool,
    pub cached_articles: usize,
    pub refreshed_at: Option<i64>,
    pub refresh_scheduled: bool,
}
