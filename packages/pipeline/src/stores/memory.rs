//! In-memory storage implementation for testing and development.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

use crate::error::{StorageError, StorageResult};
use crate::traits::store::{JobStore, RecordStore, SettingsStore};
use crate::types::id::{JobId, ProgramId};
use crate::types::job::ScrapeJob;
use crate::types::record::{DedupKey, ProgramRecord, StoredProgram};
use crate::types::settings::ScraperSettings;

/// In-memory storage for jobs, records and settings.
///
/// Not suitable for production as data is lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    jobs: RwLock<HashMap<JobId, ScrapeJob>>,
    programs: RwLock<HashMap<ProgramId, StoredProgram>>,
    settings: RwLock<Option<ScraperSettings>>,
    /// Record names whose writes fail, for exercising storage errors
    failing_names: RwLock<HashSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with the given settings instead of the defaults.
    pub fn with_settings(settings: ScraperSettings) -> Self {
        Self {
            settings: RwLock::new(Some(settings)),
            ..Self::default()
        }
    }

    /// Make every create/update of a record with this name fail.
    pub async fn fail_writes_for(&self, name: impl Into<String>) {
        self.failing_names.write().await.insert(name.into());
    }

    pub async fn job_count(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn program_count(&self) -> usize {
        self.programs.read().await.len()
    }

    /// Every stored record, oldest first.
    pub async fn programs(&self) -> Vec<StoredProgram> {
        let mut all: Vec<StoredProgram> = self.programs.read().await.values().cloned().collect();
        all.sort_by_key(|p| (p.created_at, p.id));
        all
    }

    pub async fn clear(&self) {
        self.jobs.write().await.clear();
        self.programs.write().await.clear();
        *self.settings.write().await = None;
    }

    async fn check_writable(&self, record: &ProgramRecord) -> StorageResult<()> {
        if self.failing_names.read().await.contains(&record.name) {
            return Err(StorageError::Backend(
                format!("write rejected for {}", record.name).into(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn create_job(&self, job: &ScrapeJob) -> StorageResult<()> {
        self.jobs.write().await.insert(job.id, job.clone());
        Ok(())
    }

    async fn get_job(&self, id: JobId) -> StorageResult<Option<ScrapeJob>> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn save_job(&self, job: &ScrapeJob) -> StorageResult<()> {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&job.id) {
            Some(existing) => {
                *existing = job.clone();
                Ok(())
            }
            None => Err(StorageError::NotFound {
                entity: "scrape job",
                id: job.id.to_string(),
            }),
        }
    }

    async fn active_jobs(&self, limit: usize) -> StorageResult<Vec<ScrapeJob>> {
        let mut active: Vec<ScrapeJob> = self
            .jobs
            .read()
            .await
            .values()
            .filter(|j| !j.is_terminal())
            .cloned()
            .collect();
        active.sort_by_key(|j| (j.created_at, j.id));
        active.truncate(limit);
        Ok(active)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn find_duplicate(&self, key: &DedupKey) -> StorageResult<Option<StoredProgram>> {
        Ok(self
            .programs
            .read()
            .await
            .values()
            .find(|p| &p.record.dedup_key() == key)
            .cloned())
    }

    async fn create_program(
        &self,
        record: &ProgramRecord,
        draft: bool,
    ) -> StorageResult<ProgramId> {
        self.check_writable(record).await?;
        let now = Utc::now();
        let id = ProgramId::new();
        self.programs.write().await.insert(
            id,
            StoredProgram {
                id,
                draft,
                record: record.clone(),
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn update_program(&self, id: ProgramId, record: &ProgramRecord) -> StorageResult<()> {
        self.check_writable(record).await?;
        let mut programs = self.programs.write().await;
        let stored = programs.get_mut(&id).ok_or_else(|| StorageError::NotFound {
            entity: "program",
            id: id.to_string(),
        })?;
        stored.record = record.clone();
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn get_program(&self, id: ProgramId) -> StorageResult<Option<StoredProgram>> {
        Ok(self.programs.read().await.get(&id).cloned())
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn load_settings(&self) -> StorageResult<ScraperSettings> {
        Ok(self.settings.read().await.clone().unwrap_or_default())
    }

    async fn save_settings(&self, settings: &ScraperSettings) -> StorageResult<()> {
        *self.settings.write().await = Some(settings.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::job::JobStatus;
    use crate::testing::sample_program;

    #[tokio::test]
    async fn test_active_jobs_oldest_first_and_limited() {
        let store = MemoryStore::new();
        let mut first = ScrapeJob::for_urls(vec!["https://a.example".to_string()]);
        first.created_at = Utc::now() - chrono::Duration::minutes(10);
        let second = ScrapeJob::for_urls(vec!["https://b.example".to_string()]);
        let mut done = ScrapeJob::for_urls(vec!["https://c.example".to_string()]);
        done.status = JobStatus::Completed;

        for job in [&second, &done, &first] {
            store.create_job(job).await.unwrap();
        }

        let active = store.active_jobs(10).await.unwrap();
        assert_eq!(active.iter().map(|j| j.id).collect::<Vec<_>>(), vec![first.id, second.id]);
        assert_eq!(store.active_jobs(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_save_unknown_job_is_not_found() {
        let store = MemoryStore::new();
        let job = ScrapeJob::for_urls(vec!["https://a.example".to_string()]);
        let err = store.save_job(&job).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_save_program_dedups_on_name_city_state() {
        let store = MemoryStore::new();
        let record = sample_program("Faith Forum");

        let first = store.save_program(&record).await.unwrap();
        let second = store.save_program(&record).await.unwrap();

        assert!(first.is_created());
        assert!(!second.is_created());
        assert_eq!(first.id(), second.id());
        assert_eq!(store.program_count().await, 1);
        assert!(store.get_program(first.id()).await.unwrap().unwrap().draft);
    }

    #[tokio::test]
    async fn test_settings_default_until_saved() {
        let store = MemoryStore::new();
        assert_eq!(store.load_settings().await.unwrap(), ScraperSettings::default());

        let mut settings = ScraperSettings::default();
        settings.enabled = false;
        store.save_settings(&settings).await.unwrap();
        assert!(!store.load_settings().await.unwrap().enabled);
    }

    #[tokio::test]
    async fn test_failing_writes() {
        let store = MemoryStore::new();
        store.fail_writes_for("Broken").await;
        assert!(store.save_program(&sample_program("Broken")).await.is_err());
        assert_eq!(store.program_count().await, 0);
    }
}
