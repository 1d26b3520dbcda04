//! Storage traits for jobs, records and settings.
//!
//! The storage layer is split into focused traits:
//! - `JobStore`: scrape jobs and their URL entries
//! - `RecordStore`: directory records with (name, city, state) deduplication
//! - `SettingsStore`: the scraper settings singleton
//! - `PipelineStore`: composite trait combining all three

use async_trait::async_trait;

use crate::error::StorageResult;
use crate::types::id::{JobId, ProgramId};
use crate::types::job::ScrapeJob;
use crate::types::record::{DedupKey, ProgramRecord, StoredProgram};
use crate::types::settings::ScraperSettings;

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new job.
    async fn create_job(&self, job: &ScrapeJob) -> StorageResult<()>;

    async fn get_job(&self, id: JobId) -> StorageResult<Option<ScrapeJob>>;

    /// Persist a job's status, entries and counters together.
    ///
    /// Entries and counters must never be written separately.
    async fn save_job(&self, job: &ScrapeJob) -> StorageResult<()>;

    /// Jobs with status queued or processing, oldest first.
    async fn active_jobs(&self, limit: usize) -> StorageResult<Vec<ScrapeJob>>;
}

/// Outcome of a create-or-update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Created(ProgramId),
    Updated(ProgramId),
}

impl SaveOutcome {
    pub fn id(self) -> ProgramId {
        match self {
            SaveOutcome::Created(id) | SaveOutcome::Updated(id) => id,
        }
    }

    pub fn is_created(self) -> bool {
        matches!(self, SaveOutcome::Created(_))
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Existing record with the same (name, city, state), if any.
    async fn find_duplicate(&self, key: &DedupKey) -> StorageResult<Option<StoredProgram>>;

    async fn create_program(&self, record: &ProgramRecord, draft: bool)
        -> StorageResult<ProgramId>;

    /// Replace an existing record's fields. The draft flag is kept.
    async fn update_program(&self, id: ProgramId, record: &ProgramRecord) -> StorageResult<()>;

    async fn get_program(&self, id: ProgramId) -> StorageResult<Option<StoredProgram>>;

    /// Update the duplicate if one exists, otherwise create a draft.
    ///
    /// The dedup key is the only guard against duplicate creation when the
    /// same URL is processed twice.
    async fn save_program(&self, record: &ProgramRecord) -> StorageResult<SaveOutcome> {
        match self.find_duplicate(&record.dedup_key()).await? {
            Some(existing) => {
                self.update_program(existing.id, record).await?;
                Ok(SaveOutcome::Updated(existing.id))
            }
            None => {
                let id = self.create_program(record, true).await?;
                Ok(SaveOutcome::Created(id))
            }
        }
    }
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Current settings, or the defaults if none were ever saved.
    async fn load_settings(&self) -> StorageResult<ScraperSettings>;

    async fn save_settings(&self, settings: &ScraperSettings) -> StorageResult<()>;
}

/// Composite storage trait used by the dispatcher and import paths.
pub trait PipelineStore: JobStore + RecordStore + SettingsStore {}

// Blanket implementation: anything implementing all three traits is a PipelineStore
impl<T: JobStore + RecordStore + SettingsStore> PipelineStore for T {}
