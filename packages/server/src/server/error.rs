//! API error type and its JSON rendering.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use scrape_pipeline::{PipelineError, StorageError};
use serde::Serialize;
use thiserror::Error;

use crate::kernel::QueueError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        ApiError::Pipeline(e.into())
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    fn status_and_body(&self) -> (StatusCode, ErrorBody) {
        let plain = |status: StatusCode, error: String| {
            (
                status,
                ErrorBody {
                    error,
                    details: None,
                },
            )
        };

        match self {
            ApiError::BadRequest(message) => plain(StatusCode::BAD_REQUEST, message.clone()),
            ApiError::Unauthorized => plain(StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ApiError::NotFound(message) => plain(StatusCode::NOT_FOUND, message.clone()),
            ApiError::Pipeline(PipelineError::JobNotFound { .. }) => {
                plain(StatusCode::NOT_FOUND, "Job not found".to_string())
            }
            ApiError::Pipeline(PipelineError::InvalidSubmission { reason }) => {
                plain(StatusCode::BAD_REQUEST, reason.clone())
            }
            ApiError::Pipeline(PipelineError::InvalidSettings { reason }) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: "Invalid settings".to_string(),
                    details: Some(reason.clone()),
                },
            ),
            ApiError::Pipeline(PipelineError::Csv { reason }) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: "Failed to parse CSV".to_string(),
                    details: Some(reason.clone()),
                },
            ),
            ApiError::Pipeline(PipelineError::Extraction(e)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody {
                    error: "Extraction service error".to_string(),
                    details: Some(e.to_string()),
                },
            ),
            other => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody {
                    error: "Internal server error".to_string(),
                    details: Some(other.to_string()),
                },
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, status = %status, "Request rejected");
        }
        (status, Json(body)).into_response()
    }
}
