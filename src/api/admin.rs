use super::AppState;
use crate::analytics::client::MAX_DAYS;
use crate::error::{AppError, AppResult, LoggedJson};
use crate::refresh::{RefreshOutcome, REFRESH_JOB};
use crate::storage::settings::REDACTED;
use crate::storage::{ContentUpsert, Settings};
use crate::types::RankedList;
use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use std::sync::Arc;

/// GET /v1/settings - Current settings with the API key masked.
pub async fn get_settings(State(state): State<Arc<AppState>>) -> AppResult<Json<Settings>> {
    let settings = Settings::load(state.settings.as_ref()).await?;
    Ok(Json(settings.redacted()))
}

/// PUT /v1/settings - Replace all settings groups.
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    LoggedJson(mut incoming): LoggedJson<Settings>,
) -> AppResult<Json<Settings>> {
    validate_settings(&incoming)?;

    if incoming.plausible.api_key == REDACTED {
        let current = Settings::load(state.settings.as_ref()).await?;
        incoming.plausible.api_key = current.plausible.api_key;
    }

    incoming.save(state.settings.as_ref()).await?;
    tracing::info!(
        site_id = %incoming.plausible.site_id,
        days = incoming.plausible.days,
        podcast_enabled = incoming.podcast.enabled,
        "settings updated"
    );
    Ok(Json(incoming.redacted()))
}

fn validate_settings(settings: &Settings) -> AppResult<()> {
    let days = settings.plausible.days;
    if days == 0 || days > MAX_DAYS {
        return Err(AppError::Validation(format!(
            "plausible.days must be between 1 and {MAX_DAYS}"
        )));
    }
    require_http_url("plausible.endpoint", &settings.plausible.endpoint)?;
    if !settings.podcast.url.is_empty() {
        require_http_url("podcast.url", &settings.podcast.url)?;
    }
    if !settings.podcast.image_url.is_empty() {
        require_http_url("podcast.image_url", &settings.podcast.image_url)?;
    }
    Ok(())
}

fn require_http_url(field: &str, value: &str) -> AppResult<()> {
    match url::Url::parse(value) {
        Ok(u) if u.scheme() == "http" || u.scheme() == "https" => Ok(()),
        _ => Err(AppError::Validation(format!(
            "{field} must be an http(s) URL"
        ))),
    }
}

/// GET /v1/top-posts - The cached ranked list as last stored.
pub async fn top_posts(State(state): State<Arc<AppState>>) -> AppResult<Json<RankedList>> {
    let list = state
        .cache
        .load()
        .await?
        .ok_or_else(|| AppError::NotFound("no ranked list cached yet".to_string()))?;
    Ok(Json(list.as_ref().clone()))
}

/// POST /v1/refresh - Run the refresh job now and report what happened.
pub async fn refresh_now(State(state): State<Arc<AppState>>) -> Json<RefreshOutcome> {
    Json(state.refresh.run_once().await)
}

/// PUT /v1/content - Sync published articles from the CMS.
pub async fn upsert_content(
    State(state): State<Arc<AppState>>,
    LoggedJson(items): LoggedJson<Vec<ContentUpsert>>,
) -> AppResult<Json<Value>> {
    if let Some(bad) = items.iter().find(|i| i.id <= 0 || i.slug.trim().is_empty()) {
        return Err(AppError::Validation(format!(
            "content item {} needs a positive id and a slug",
            bad.id
        )));
    }
    let written = state.content.upsert(items).await?;
    tracing::info!(written, "content synced");
    Ok(Json(json!({ "upserted": written })))
}

/// POST /v1/scheduler/activate - (Re)register the periodic refresh.
pub async fn activate(State(state): State<Arc<AppState>>) -> Json<Value> {
    let replaced = state
        .scheduler
        .schedule(REFRESH_JOB, state.refresh_period, state.refresh.clone());
    Json(json!({
        "scheduled": true,
        "replaced": replaced,
        "interval_secs": state.refresh_period.as_secs(),
    }))
}

/// POST /v1/scheduler/deactivate - Stop the periodic refresh.
pub async fn deactivate(State(state): State<Arc<AppState>>) -> Json<Value> {
    let cancelled = state.scheduler.cancel(REFRESH_JOB);
    Json(json!({ "scheduled": false, "cancelled": cancelled }))
}
