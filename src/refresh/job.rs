use crate::analytics::{AnalyticsSource, ArticleRanker};
use crate::identity::IdentityResolver;
use crate::storage::{RankedListCache, Settings, SettingsStore};
use crate::types::RankedList;
use serde::Serialize;
use std::sync::Arc;

/// Result of one refresh run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RefreshOutcome {
    /// Analytics credentials are missing; nothing was fetched.
    NotConfigured,
    /// The analytics request failed; the cache was left as it was.
    FetchFailed,
    /// Upstream answered but nothing was eligible; the cache was left as it was.
    NoEligibleArticles,
    /// Resolution or storage failed after a successful fetch; nothing written.
    StoreFailed,
    Stored { articles: usize, resolved: usize },
}

/// Fetch → rank → resolve → store, as one unit.
pub struct RefreshJob {
    settings: Arc<dyn SettingsStore>,
    analytics: Arc<dyn AnalyticsSource>,
    ranker: ArticleRanker,
    resolver: IdentityResolver,
    cache: Arc<dyn RankedListCache>,
}

impl RefreshJob {
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        analytics: Arc<dyn AnalyticsSource>,
        ranker: ArticleRanker,
        resolver: IdentityResolver,
        cache: Arc<dyn RankedListCache>,
    ) -> Self {
        Self {
            settings,
            analytics,
            ranker,
            resolver,
            cache,
        }
    }

    pub async fn run_once(&self) -> RefreshOutcome {
        let settings = match Settings::load(self.settings.as_ref()).await {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "failed to load settings, skipping refresh");
                return RefreshOutcome::StoreFailed;
            }
        };

        let Some(query) = settings.plausible.query() else {
            tracing::warn!("analytics API key or site id not configured, skipping refresh");
            return RefreshOutcome::NotConfigured;
        };

        let stats = match self.analytics.fetch_pageviews(&query).await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::warn!(error = %e, site_id = %query.site_id, "error fetching top posts, keeping cached list");
                return RefreshOutcome::FetchFailed;
            }
        };
        let fetched = stats.len();

        let ranked = self.ranker.rank(stats);
        if ranked.is_empty() {
            tracing::info!(fetched, "no eligible articles in analytics response, keeping cached list");
            return RefreshOutcome::NoEligibleArticles;
        }

        let articles = match self.resolver.resolve(ranked).await {
            Ok(articles) => articles,
            Err(e) => {
                tracing::error!(error = %e, "identity resolution failed, keeping cached list");
                return RefreshOutcome::StoreFailed;
            }
        };
        let resolved = articles.iter().filter(|a| a.resolved_id().is_some()).count();

        let list = RankedList {
            articles,
            refreshed_at: chrono::Utc::now().timestamp_millis(),
        };
        let count = list.articles.len();

        if let Err(e) = self.cache.store(&list).await {
            tracing::error!(error = %e, "failed to store ranked list");
            return RefreshOutcome::StoreFailed;
        }

        tracing::info!(fetched, articles = count, resolved, "top posts refreshed");
        RefreshOutcome::Stored {
            articles: count,
            resolved,
        }
    }
}
