//! Typed errors for the scrape pipeline.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so callers can tell
//! per-item failures (recorded on a `UrlEntry`) apart from job-fatal ones.

use std::fmt;

use thiserror::Error;

use crate::types::id::JobId;
use crate::types::job::{JobStatus, UrlStatus};

/// Errors raised while talking to the external extraction service.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Non-2xx response from the service
    #[error("extraction service error: {status} - {body}")]
    Service { status: u16, body: String },

    /// Transport-level failure (DNS, connect, TLS, body decode)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service reported the job as failed, or rejected the request
    #[error("extraction failed: {reason}")]
    ExtractionFailed { reason: String },

    /// Polling exhausted its attempt budget
    #[error("extraction timed out after {attempts} status checks")]
    Timeout { attempts: u32 },

    /// Shutdown was requested while waiting on the service
    #[error("extraction cancelled")]
    Cancelled,

    /// The response could not be understood
    #[error("invalid response from extraction service: {0}")]
    InvalidResponse(String),

    /// Client misconfiguration (missing API key, bad base URL)
    #[error("extraction client config error: {0}")]
    Config(String),
}

/// A single failed check during normalization.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    /// Canonical field name (camelCase, as exposed to operators)
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }

    pub fn missing(field: &'static str) -> Self {
        Self::new(field, format!("Missing required field: {}", field))
    }
}

/// Every validation failure for one record, collected rather than short-circuited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn push(&mut self, error: ValidationError) {
        self.0.push(error);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    /// Whether any failure concerns the given field.
    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.0.iter().map(|e| e.message.as_str()).collect();
        f.write_str(&messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Errors from the record/job/settings stores.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("storage backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Illegal lifecycle transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("job {job_id} is {status} and cannot be reopened")]
    JobTerminal { job_id: JobId, status: JobStatus },

    #[error("job {job_id} has no url entry at index {index}")]
    NoSuchEntry { job_id: JobId, index: usize },

    #[error("url {url} is already {status}")]
    EntryTerminal { url: String, status: UrlStatus },

    #[error("url {url} cannot move from {from} to {to}")]
    InvalidEntryState {
        url: String,
        from: UrlStatus,
        to: UrlStatus,
    },
}

/// Why one URL failed. Always recorded on the entry, never propagated.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Job-level and surface-level errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("job not found: {job_id}")]
    JobNotFound { job_id: JobId },

    #[error("crawl discovery failed: {0}")]
    CrawlDiscovery(#[source] ExtractionError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("invalid submission: {reason}")]
    InvalidSubmission { reason: String },

    #[error("invalid settings: {reason}")]
    InvalidSettings { reason: String },

    #[error("failed to parse CSV: {reason}")]
    Csv { reason: String },
}

impl PipelineError {
    /// Structural failures that abort the job they occurred in.
    pub fn is_job_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::JobNotFound { .. }
                | PipelineError::CrawlDiscovery(_)
                | PipelineError::Transition(_)
        )
    }
}

/// Result type alias for extraction service calls.
pub type ExtractResult<T> = std::result::Result<T, ExtractionError>;

/// Result type alias for store operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
