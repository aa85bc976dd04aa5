use super::AppState;
use crate::error::{AppError, AppResult, LoggedJson};
use crate::refresh::REFRESH_JOB;
use crate::storage::sqlite;
use crate::types::{HealthResponse, PageContext};
use crate::visitor::{decide, VisitReport, VisitorHistory, COOKIE_NAME};
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const SCRIPT: &str = include_str!("../recirc.js");

#[derive(Debug, Deserialize)]
pub struct RenderRequest {
    #[serde(default)]
    pub content: String,
    pub page: PageContext,
}

#[derive(Debug, Serialize)]
pub struct RenderResponse {
    pub content: String,
    pub selection: &'static str,
    pub podcast: bool,
}

/// POST /v1/render - Append the recirculation fragment to article content.
///
/// Always answers 200: an ineligible page or a cold cache returns the
/// content untouched.
pub async fn render(
    State(state): State<Arc<AppState>>,
    LoggedJson(req): LoggedJson<RenderRequest>,
) -> Json<RenderResponse> {
    let fragment = state.renderer.fragment(&req.page).await;
    let mut content = req.content;
    content.push_str(&fragment.html);

    Json(RenderResponse {
        content,
        selection: fragment.selection.as_str(),
        podcast: fragment.podcast,
    })
}

/// GET /assets/recirc.js
pub async fn script() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "application/javascript; charset=utf-8"),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        SCRIPT,
    )
}

/// POST /v1/visits - Per-visitor decisions for the page just loaded.
///
/// Decides against the history as it was before this visit, then records
/// the current article and rewrites the cookie.
pub async fn record_visit(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    LoggedJson(report): LoggedJson<VisitReport>,
) -> AppResult<impl IntoResponse> {
    if report.post_id <= 0 {
        return Err(AppError::Validation("post_id must be positive".to_string()));
    }

    let mut history = jar
        .get(COOKIE_NAME)
        .map(|c| VisitorHistory::parse(c.value()))
        .unwrap_or_default();

    let decision = decide(&mut rand::thread_rng(), &history, &report, state.min_display);

    history.record(report.post_id);
    let cookie = history.set_cookie_header(state.cookie.expiry_days, state.cookie.secure);

    tracing::debug!(
        post_id = report.post_id,
        history = history.ids().len(),
        show_top_posts = decision.show_top_posts,
        show_podcast = decision.show_podcast,
        "visit recorded"
    );

    Ok((
        [
            (header::SET_COOKIE, cookie),
            (header::CACHE_CONTROL, "no-store".to_string()),
        ],
        Json(decision),
    ))
}

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let db_ok = sqlite::ping(&state.pool).await;

    let cached = match state.cache.load().await {
        Ok(list) => list,
        Err(e) => {
            tracing::warn!(error = %e, "health check could not read ranked list");
            None
        }
    };

    Json(HealthResponse {
        status: if db_ok {
            "ok".into()
        } else {
            "degraded".into()
        },
        db_ok,
        cached_articles: cached.as_ref().map_or(0, |l| l.articles.len()),
        refreshed_at: cached.map(|l| l.refreshed_at),
        refresh_scheduled: state.scheduler.is_scheduled(REFRESH_JOB),
    })
}
