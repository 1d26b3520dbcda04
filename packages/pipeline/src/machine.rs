//! Lifecycle rules for scrape jobs and their URL entries.
//!
//! Job:   queued → processing → completed | failed
//! Entry: pending → processing → success | failed
//!
//! Every function mutates the job in memory only; the caller persists the
//! whole job (entries and counters together) with `JobStore::save_job`.
//! Terminal states are never reopened.

use chrono::{DateTime, Utc};

use crate::error::TransitionError;
use crate::types::id::ProgramId;
use crate::types::job::{JobStatus, ScrapeJob, UrlEntry, UrlStatus};

pub struct JobStateMachine;

impl JobStateMachine {
    /// Move a queued job to processing. Returns whether anything changed.
    pub fn start(job: &mut ScrapeJob, now: DateTime<Utc>) -> Result<bool, TransitionError> {
        Self::ensure_open(job)?;
        if job.status == JobStatus::Queued {
            job.status = JobStatus::Processing;
            job.updated_at = now;
            return Ok(true);
        }
        Ok(false)
    }

    /// Claim an entry for extraction.
    ///
    /// An entry already in `processing` was claimed by an invocation that
    /// never finished it and is claimed again.
    pub fn claim(
        job: &mut ScrapeJob,
        index: usize,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        Self::ensure_open(job)?;
        let job_id = job.id;
        let entry = Self::entry_mut(job, index)?;
        if entry.status.is_terminal() {
            return Err(TransitionError::EntryTerminal {
                url: entry.url.clone(),
                status: entry.status,
            });
        }
        if entry.status == UrlStatus::Processing {
            tracing::debug!(job_id = %job_id, url = %entry.url, "Re-claiming entry left in processing");
        }
        entry.status = UrlStatus::Processing;
        entry.error = None;
        job.updated_at = now;
        Ok(())
    }

    /// Mark a claimed entry successful and count it.
    ///
    /// Returns `false` without touching counters if the entry was already
    /// terminal, so a redelivered message never counts twice.
    pub fn record_success(
        job: &mut ScrapeJob,
        index: usize,
        program_id: ProgramId,
        now: DateTime<Utc>,
    ) -> Result<bool, TransitionError> {
        if !Self::settle(job, index, UrlStatus::Success)? {
            return Ok(false);
        }
        let entry = &mut job.urls[index];
        entry.program_id = Some(program_id);
        entry.error = None;
        job.successful_urls += 1;
        job.processed_urls += 1;
        job.updated_at = now;
        Ok(true)
    }

    /// Mark a claimed entry failed with the triggering message and count it.
    ///
    /// Same idempotence as [`record_success`](Self::record_success).
    pub fn record_failure(
        job: &mut ScrapeJob,
        index: usize,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<bool, TransitionError> {
        if !Self::settle(job, index, UrlStatus::Failed)? {
            return Ok(false);
        }
        let entry = &mut job.urls[index];
        entry.error = Some(message.into());
        entry.program_id = None;
        job.failed_urls += 1;
        job.processed_urls += 1;
        job.updated_at = now;
        Ok(true)
    }

    /// Complete the job if every entry is terminal and `processed >= total`.
    ///
    /// The guard is `>=` so a total revised below the processed count still
    /// completes. Returns whether the job completed.
    pub fn try_complete(job: &mut ScrapeJob, now: DateTime<Utc>) -> bool {
        if job.is_terminal() {
            return false;
        }
        if job.all_entries_terminal() && job.processed_urls >= job.total_urls {
            job.status = JobStatus::Completed;
            job.updated_at = now;
            return true;
        }
        false
    }

    /// Abort the job with a job-level error.
    pub fn fail(
        job: &mut ScrapeJob,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        Self::ensure_open(job)?;
        job.status = JobStatus::Failed;
        job.error_log = Some(message.into());
        job.updated_at = now;
        Ok(())
    }

    /// Add discovered URLs as pending entries and revise the total.
    ///
    /// URLs already present are skipped. Returns how many were added.
    pub fn apply_discovery(
        job: &mut ScrapeJob,
        urls: impl IntoIterator<Item = String>,
        now: DateTime<Utc>,
    ) -> Result<usize, TransitionError> {
        Self::ensure_open(job)?;
        let mut added = 0;
        for url in urls {
            if job.entry_index(&url).is_none() {
                job.urls.push(UrlEntry::pending(url));
                added += 1;
            }
        }
        job.total_urls = job.urls.len() as u32;
        job.updated_at = now;
        Ok(added)
    }

    fn ensure_open(job: &ScrapeJob) -> Result<(), TransitionError> {
        if job.is_terminal() {
            return Err(TransitionError::JobTerminal {
                job_id: job.id,
                status: job.status,
            });
        }
        Ok(())
    }

    fn entry_mut(job: &mut ScrapeJob, index: usize) -> Result<&mut UrlEntry, TransitionError> {
        let job_id = job.id;
        job.urls
            .get_mut(index)
            .ok_or(TransitionError::NoSuchEntry { job_id, index })
    }

    /// Move an entry from processing to `to`. `Ok(false)` if already terminal.
    fn settle(job: &mut ScrapeJob, index: usize, to: UrlStatus) -> Result<bool, TransitionError> {
        Self::ensure_open(job)?;
        let entry = Self::entry_mut(job, index)?;
        match entry.status {
            UrlStatus::Processing => {
                entry.status = to;
                Ok(true)
            }
            UrlStatus::Success | UrlStatus::Failed => Ok(false),
            UrlStatus::Pending => Err(TransitionError::InvalidEntryState {
                url: entry.url.clone(),
                from: entry.status,
                to,
            }),
        }
    }
}
