use axum::{extract::Extension, Json};
use scrape_pipeline::{ScraperSettings, SettingsStore, SettingsUpdate};
use tracing::info;

use crate::server::app::AppState;
use crate::server::error::ApiError;
use crate::server::middleware::Caller;

/// `GET /api/settings`
pub async fn get_settings_handler(
    Extension(state): Extension<AppState>,
) -> Result<Json<ScraperSettings>, ApiError> {
    let settings = state.store.load_settings().await?;
    Ok(Json(settings))
}

/// `PATCH /api/settings`
///
/// Partial update; operator only. Bookkeeping fields (`lastRun`, counters)
/// are rejected as unknown fields.
pub async fn update_settings_handler(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<Caller>,
    Json(update): Json<SettingsUpdate>,
) -> Result<Json<ScraperSettings>, ApiError> {
    caller.require_operator()?;

    let mut settings = state.store.load_settings().await?;
    if update.is_empty() {
        return Ok(Json(settings));
    }

    settings.apply(&update)?;
    state.store.save_settings(&settings).await?;

    info!(?update, "Scraper settings updated");
    Ok(Json(settings))
}
