//! Scrape-Job Processing Pipeline
//!
//! Turns batches of target URLs, crawl roots or free-form prompts into
//! validated directory records, while respecting the extraction service's
//! rate limits and tracking progress per URL and per job.
//!
//! # Flow
//!
//! ```text
//! Dispatcher ─▶ Extractor ─▶ normalize ─▶ RecordStore (create-or-update)
//!     │                                           │
//!     └──────────── JobStateMachine ◀─────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use scrape_pipeline::{Dispatcher, FirecrawlExtractor, MemoryStore, ServiceCredentials};
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryStore::new());
//! let extractor = Arc::new(FirecrawlExtractor::new(ServiceCredentials::new(api_key))?);
//!
//! let job = scrape_pipeline::submit_urls(&*store, vec![url]).await?;
//! let dispatcher = Dispatcher::new(store.clone(), extractor);
//! let report = dispatcher.run_cycle(chrono::Utc::now()).await?;
//! ```
//!
//! # Modules
//!
//! - [`types`] - Jobs, settings, raw and canonical records
//! - [`traits`] - Extractor and storage abstractions
//! - [`extractors`] - Firecrawl client and a mock
//! - [`normalize`] - Raw fields → canonical record, CSV parsing
//! - [`machine`] - Job and entry lifecycle rules
//! - [`dispatcher`] - Timer cycle and queue-message entry points
//! - [`submission`] - Job creation and status
//! - [`import`] - CSV and agent-prompt batch imports
//! - [`stores`] - Storage implementations
//! - [`security`] - Credential handling
//! - [`testing`] - Test doubles and sample records

pub mod dispatcher;
pub mod error;
pub mod extractors;
pub mod import;
pub mod machine;
pub mod normalize;
pub mod security;
pub mod stores;
pub mod submission;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use error::{
    ExtractionError, ItemError, PipelineError, StorageError, TransitionError, ValidationError,
    ValidationErrors,
};
pub use traits::{
    extractor::Extractor,
    store::{JobStore, PipelineStore, RecordStore, SaveOutcome, SettingsStore},
};
pub use types::{
    id::{JobId, ProgramId},
    job::{JobStatus, JobType, ScrapeJob, UrlEntry, UrlStatus},
    record::{AgentRecord, DedupKey, ExtractedRecord, ProgramRecord, Scalar, StoredProgram},
    rich_text::RichText,
    settings::{CycleTallies, ScraperSettings, SettingsUpdate},
};

pub use dispatcher::{CycleReport, Dispatcher, MessageOutcome, ScrapeMessage, SkipReason};
pub use extractors::{FirecrawlExtractor, MockExtractor, PollPolicy};
pub use import::{import_csv, run_agent_prompt, ImportFailure, ImportSummary};
pub use machine::JobStateMachine;
pub use normalize::normalize;
pub use security::{SecretString, ServiceCredentials};
pub use submission::{
    job_status, submit, submit_crawl, submit_urls, JobStatusView, Submission, SubmitRequest,
};

// Re-export stores
pub use stores::MemoryStore;

#[cfg(feature = "postgres")]
pub use stores::PostgresStore;
