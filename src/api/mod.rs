//! HTTP surface: the CMS render hook, the browser script and its visit
//! beacon, health, and token-protected admin routes.

pub mod admin;
pub mod auth;
pub mod public;

use crate::analytics::{AnalyticsClient, ArticleRanker};
use crate::config::{AppConfig, CookieConfig};
use crate::error::FetchError;
use crate::identity::IdentityResolver;
use crate::refresh::{RefreshJob, Scheduler};
use crate::render::{EligibilityGate, PersonalizedSelector, Renderer};
use crate::storage::{
    RankedListCache, SettingsStore, SqliteContentDirectory, SqliteRankedListCache,
    SqliteSettingsStore,
};
use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::middleware;
use axum::routing::{get, post, put};
use axum::Router;
use deadpool_sqlite::Pool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

pub use auth::AdminToken;

/// Article bodies pass through the render hook, so allow generous payloads.
pub const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

const SETTINGS_CACHE_TTL_SECS: u64 = 60;

pub struct AppState {
    pub pool: Pool,
    pub renderer: Renderer,
    pub settings: Arc<dyn SettingsStore>,
    pub cache: Arc<dyn RankedListCache>,
    pub content: SqliteContentDirectory,
    pub refresh: Arc<RefreshJob>,
    pub scheduler: Arc<Scheduler>,
    pub refresh_period: Duration,
    pub cookie: CookieConfig,
    pub min_display: usize,
}

impl AppState {
    /// Wire every collaborator against one SQLite pool.
    pub fn from_config(config: &AppConfig, pool: Pool) -> Result<Self, FetchError> {
        let settings: Arc<dyn SettingsStore> =
            Arc::new(SqliteSettingsStore::new(pool.clone(), SETTINGS_CACHE_TTL_SECS));
        let cache: Arc<dyn RankedListCache> = Arc::new(SqliteRankedListCache::new(pool.clone()));
        let content = SqliteContentDirectory::new(pool.clone());

        let analytics = Arc::new(AnalyticsClient::new(
            config.refresh.request_timeout_secs,
            config.refresh.page_limit,
        )?);
        let ranker = ArticleRanker::new(
            config.top_posts.sections.clone(),
            config.top_posts.max_articles,
        );
        let resolver = IdentityResolver::new(Arc::new(content.clone()));
        let refresh = Arc::new(RefreshJob::new(
            settings.clone(),
            analytics,
            ranker,
            resolver,
            cache.clone(),
        ));

        let selector = PersonalizedSelector::new(
            EligibilityGate::new(config.top_posts.excluded_categories.clone()),
            config.top_posts.min_display,
        );
        let renderer = Renderer::new(
            selector,
            cache.clone(),
            settings.clone(),
            config.top_posts.utm_source.clone(),
            config.server.public_url.clone(),
        );

        Ok(Self {
            pool,
            renderer,
            settings,
            cache,
            content,
            refresh,
            scheduler: Arc::new(Scheduler::new()),
            refresh_period: Duration::from_secs(config.refresh.interval_secs),
            cookie: config.cookie.clone(),
            min_display: config.top_posts.min_display,
        })
    }
}

/// Build the full router. `site_origin` enables credentialed CORS for the
/// beacon when the news site lives on another origin.
pub fn router(state: Arc<AppState>, admin_token: AdminToken, site_origin: Option<HeaderValue>) -> Router {
    let public_routes = Router::new()
        .route("/health", get(public::health))
        .route("/assets/recirc.js", get(public::script))
        .route("/v1/render", post(public::render))
        .route("/v1/visits", post(public::record_visit))
        .with_state(state.clone());

    let admin_routes = Router::new()
        .route(
            "/v1/settings",
            get(admin::get_settings).put(admin::update_settings),
        )
        .route("/v1/top-posts", get(admin::top_posts))
        .route("/v1/refresh", post(admin::refresh_now))
        .route("/v1/content", put(admin::upsert_content))
        .route("/v1/scheduler/activate", post(admin::activate))
        .route("/v1/scheduler/deactivate", post(admin::deactivate))
        .layer(middleware::from_fn(auth::require_admin))
        .layer(axum::Extension(admin_token))
        .with_state(state);

    let mut app = Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES));

    if let Some(origin) = site_origin {
        let cors = CorsLayer::new()
            .allow_origin(AllowOrigin::exact(origin))
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE])
            .allow_credentials(true);
        app = app.layer(cors);
    }

    app.layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AdminConfig, DatabaseConfig, RefreshConfig, ServerConfig, TopPostsConfig};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    const TOKEN: &str = "router-test-token-0123456789abcdef0123";

    async fn test_router(dir: &tempfile::TempDir) -> Router {
        let config = AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                public_url: String::new(),
                site_origin: None,
            },
            database: DatabaseConfig {
                path: dir.path().join("recirc.db"),
                pool_size: 1,
            },
            refresh: RefreshConfig::default(),
            top_posts: TopPostsConfig::default(),
            cookie: CookieConfig::default(),
            admin: AdminConfig {
                token: TOKEN.to_string(),
            },
        };
        let pool = crate::storage::sqlite::create_pool(&config.database).unwrap();
        crate::storage::sqlite::init_pool(&pool).await.unwrap();
        let state = Arc::new(AppState::from_config(&config, pool).unwrap());
        router(
            state,
            AdminToken::new(TOKEN),
            Some(HeaderValue::from_static("https://news.example.org")),
        )
    }

    #[tokio::test]
    async fn test_admin_routes_need_bearer_token() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_router(&dir).await;

        let resp = app
            .clone()
            .oneshot(Request::post("/v1/refresh").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = app
            .oneshot(
                Request::get("/v1/settings")
                    .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_beacon_allows_site_origin_with_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_router(&dir).await;

        let resp = app
            .oneshot(
                Request::options("/v1/visits")
                    .header(header::ORIGIN, "https://news.example.org")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://news.example.org"
        );
        assert_eq!(
            resp.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS],
            "true"
        );
    }
}
