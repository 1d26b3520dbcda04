//! Batch imports: CSV upload and agent prompts. Operator only.

use axum::{extract::Extension, Json};
use scrape_pipeline::{import_csv, run_agent_prompt, ImportSummary};
use serde::Deserialize;

use crate::server::app::AppState;
use crate::server::error::ApiError;
use crate::server::middleware::Caller;

/// `POST /api/import/csv`, body is the CSV text.
pub async fn import_csv_handler(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<Caller>,
    body: String,
) -> Result<Json<ImportSummary>, ApiError> {
    caller.require_operator()?;

    let summary = import_csv(&*state.store, &body).await?;
    Ok(Json(summary))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRunRequest {
    pub prompt: String,
    #[serde(default)]
    pub max_credits: Option<u32>,
}

/// `POST /api/agent/run`
pub async fn agent_run_handler(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<Caller>,
    Json(request): Json<AgentRunRequest>,
) -> Result<Json<ImportSummary>, ApiError> {
    caller.require_operator()?;

    let summary = run_agent_prompt(
        &*state.store,
        &*state.extractor,
        &request.prompt,
        request.max_credits,
    )
    .await?;
    Ok(Json(summary))
}
