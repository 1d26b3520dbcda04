//! Dispatcher: the entry point each trigger invokes.
//!
//! `run_cycle` is called on a timer tick and walks every eligible job.
//! `process_message` is called once per queue message and handles one URL,
//! or one crawl. Both paths share the per-entry routine, so an entry is
//! claimed, extracted, normalized, stored and settled the same way whichever
//! trigger reached it.
//!
//! Invocations are assumed to be serialized per job by the host. Nothing
//! here locks a job across awaits.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ExtractionError, ItemError, PipelineError, Result};
use crate::machine::JobStateMachine;
use crate::normalize::normalize;
use crate::traits::extractor::Extractor;
use crate::traits::store::{PipelineStore, SaveOutcome};
use crate::types::id::JobId;
use crate::types::job::{JobType, ScrapeJob};
use crate::types::settings::CycleTallies;

/// One unit of queued work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeMessage {
    pub job_id: JobId,
    pub job_type: JobType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crawl_url: Option<String>,
}

impl ScrapeMessage {
    pub fn extract(job_id: JobId, url: impl Into<String>) -> Self {
        Self {
            job_id,
            job_type: JobType::Extract,
            url: Some(url.into()),
            crawl_url: None,
        }
    }

    pub fn crawl(job_id: JobId, crawl_url: impl Into<String>) -> Self {
        Self {
            job_id,
            job_type: JobType::Crawl,
            url: None,
            crawl_url: Some(crawl_url.into()),
        }
    }

    /// Messages that cover a freshly submitted job: one per URL, or a single
    /// crawl message.
    pub fn for_job(job: &ScrapeJob) -> Vec<Self> {
        match (job.job_type, &job.crawl_url) {
            (JobType::Crawl, Some(crawl_url)) => vec![Self::crawl(job.id, crawl_url.clone())],
            _ => job
                .urls
                .iter()
                .map(|entry| Self::extract(job.id, entry.url.clone()))
                .collect(),
        }
    }

    /// Messages for whatever is left of a job after a restart or a dropped
    /// delivery: the crawl message for a crawl job, otherwise one per
    /// claimable entry. Empty once the job is terminal.
    pub fn for_unsettled(job: &ScrapeJob) -> Vec<Self> {
        if job.is_terminal() {
            return Vec::new();
        }
        match (job.job_type, &job.crawl_url) {
            (JobType::Crawl, Some(crawl_url)) => vec![Self::crawl(job.id, crawl_url.clone())],
            _ => job
                .claimable_indices()
                .into_iter()
                .map(|i| Self::extract(job.id, job.urls[i].url.clone()))
                .collect(),
        }
    }
}

/// Why a cycle did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "reason")]
pub enum SkipReason {
    Disabled,
    NotDue { minutes_since_last_run: f64, frequency_minutes: u32 },
}

/// Result of one timer-driven cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub skipped: Option<SkipReason>,
    pub jobs_selected: usize,
    pub jobs_completed: usize,
    pub jobs_failed: usize,
    pub tallies: CycleTallies,
    /// Shutdown arrived before the cycle finished
    pub interrupted: bool,
}

impl CycleReport {
    fn skipped(reason: SkipReason) -> Self {
        Self {
            skipped: Some(reason),
            ..Self::default()
        }
    }

    pub fn ran(&self) -> bool {
        self.skipped.is_none()
    }

    /// Operator-facing one-liner.
    pub fn summary(&self) -> String {
        match self.skipped {
            Some(SkipReason::Disabled) => "Automatic processing is disabled".to_string(),
            Some(SkipReason::NotDue {
                minutes_since_last_run,
                frequency_minutes,
            }) => format!(
                "Skipping - only {:.1} minutes since last run (need {})",
                minutes_since_last_run, frequency_minutes
            ),
            None if self.jobs_selected == 0 => "No pending jobs to process".to_string(),
            None => format!("Processed {} URLs", self.tallies.processed),
        }
    }
}

/// What happened to a queue message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Work was done; acknowledge.
    Processed(CycleTallies),
    /// The scraper is disabled; deliver again later.
    Deferred,
    /// The job or URL does not exist, or the message is malformed; acknowledge.
    Dropped,
    /// The job or entry is already terminal; acknowledge.
    AlreadySettled,
    /// Shutdown interrupted the work; the entry stays claimable.
    Interrupted,
}

impl MessageOutcome {
    /// Whether the message is finished with and should not be delivered again.
    pub fn is_ack(self) -> bool {
        matches!(
            self,
            MessageOutcome::Processed(_) | MessageOutcome::Dropped | MessageOutcome::AlreadySettled
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobEnd {
    Open,
    Completed,
    Failed,
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryOutcome {
    Succeeded,
    Failed,
    /// Settled by an earlier delivery; counters untouched
    Unchanged,
    Interrupted,
}

/// Drives jobs through extraction, normalization and storage.
pub struct Dispatcher {
    store: Arc<dyn PipelineStore>,
    extractor: Arc<dyn Extractor>,
    shutdown: CancellationToken,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn PipelineStore>, extractor: Arc<dyn Extractor>) -> Self {
        Self {
            store,
            extractor,
            shutdown: CancellationToken::new(),
        }
    }

    /// Interrupt inter-request delays when `token` is cancelled.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Run one timer-driven cycle.
    ///
    /// Skips without touching anything when disabled or not yet due.
    /// Otherwise processes up to `batch_size` entries from each of up to
    /// `max_concurrent_jobs` active jobs, then stamps `last_run` and folds
    /// the tallies into the cumulative counters, even if no job was eligible.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<CycleReport> {
        let settings = self.store.load_settings().await?;

        if !settings.enabled {
            info!("Automatic processing is disabled, skipping cycle");
            return Ok(CycleReport::skipped(SkipReason::Disabled));
        }
        if !settings.is_due(now) {
            let minutes_since_last_run = settings
                .last_run
                .map(|last| now.signed_duration_since(last).num_milliseconds() as f64 / 60_000.0)
                .unwrap_or_default();
            debug!(
                minutes_since_last_run,
                frequency_minutes = settings.frequency_minutes,
                "Cycle not due yet"
            );
            return Ok(CycleReport::skipped(SkipReason::NotDue {
                minutes_since_last_run,
                frequency_minutes: settings.frequency_minutes,
            }));
        }

        let jobs = self
            .store
            .active_jobs(settings.max_concurrent_jobs as usize)
            .await?;
        let mut report = CycleReport {
            jobs_selected: jobs.len(),
            ..CycleReport::default()
        };
        info!(
            jobs = jobs.len(),
            batch_size = settings.batch_size,
            "Starting scrape cycle"
        );

        for mut job in jobs {
            if self.shutdown.is_cancelled() {
                report.interrupted = true;
                break;
            }

            let mut tallies = CycleTallies::default();
            let end = self
                .drive_job(
                    &mut job,
                    settings.batch_size as usize,
                    settings.delay(),
                    &mut tallies,
                )
                .await;
            report.tallies.merge(tallies);

            match self.settle_job(&mut job, end).await {
                Ok(JobEnd::Completed) => report.jobs_completed += 1,
                Ok(JobEnd::Failed) => report.jobs_failed += 1,
                Ok(JobEnd::Open) => {}
                Ok(JobEnd::Interrupted) => {
                    report.interrupted = true;
                    break;
                }
                Err(e) => {
                    warn!(job_id = %job.id, error = %e, "Job left for the next cycle");
                }
            }
        }

        self.record_cycle(now, report.tallies).await?;

        info!(
            processed = report.tallies.processed,
            successful = report.tallies.successful,
            failed = report.tallies.failed,
            completed_jobs = report.jobs_completed,
            failed_jobs = report.jobs_failed,
            "Scrape cycle finished"
        );
        Ok(report)
    }

    /// Handle one queue message.
    ///
    /// A redelivered message for an entry left in `processing` re-claims it;
    /// one for an entry already settled is acknowledged without extracting
    /// again. An `Err` means the message should be delivered again.
    pub async fn process_message(
        &self,
        message: &ScrapeMessage,
        now: DateTime<Utc>,
    ) -> Result<MessageOutcome> {
        let settings = self.store.load_settings().await?;
        if !settings.enabled {
            debug!(job_id = %message.job_id, "Automatic processing is disabled, deferring message");
            return Ok(MessageOutcome::Deferred);
        }

        let Some(mut job) = self.store.get_job(message.job_id).await? else {
            warn!(job_id = %message.job_id, "Job not found, dropping message");
            return Ok(MessageOutcome::Dropped);
        };
        if job.is_terminal() {
            debug!(job_id = %job.id, status = %job.status, "Job already terminal");
            return Ok(MessageOutcome::AlreadySettled);
        }

        let mut tallies = CycleTallies::default();
        let end = match (message.job_type, &message.url, &message.crawl_url) {
            (JobType::Extract, Some(url), _) => {
                let Some(index) = job.entry_index(url) else {
                    warn!(job_id = %job.id, url = %url, "URL is not part of the job, dropping message");
                    return Ok(MessageOutcome::Dropped);
                };
                if !job.urls[index].is_claimable() {
                    debug!(job_id = %job.id, url = %url, "Entry already settled");
                    return Ok(MessageOutcome::AlreadySettled);
                }
                self.drive_entry(&mut job, index, &mut tallies).await
            }
            (JobType::Crawl, _, Some(_)) => {
                self.drive_job(&mut job, usize::MAX, settings.delay(), &mut tallies)
                    .await
            }
            _ => {
                warn!(job_id = %job.id, "Malformed scrape message, dropping");
                return Ok(MessageOutcome::Dropped);
            }
        };

        let end = self.settle_job(&mut job, end).await?;
        self.record_cycle(now, tallies).await?;

        if end == JobEnd::Interrupted {
            return Ok(MessageOutcome::Interrupted);
        }
        Ok(MessageOutcome::Processed(tallies))
    }

    /// Wait out the configured inter-request delay. Returns `false` if
    /// shutdown came first.
    pub async fn throttle(&self) -> Result<bool> {
        let settings = self.store.load_settings().await?;
        Ok(self.pause(settings.delay()).await)
    }

    async fn pause(&self, delay: Duration) -> bool {
        if delay.is_zero() {
            return !self.shutdown.is_cancelled();
        }
        tokio::select! {
            _ = self.shutdown.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    /// Process up to `limit` claimable entries of one job, in order.
    async fn drive_job(
        &self,
        job: &mut ScrapeJob,
        limit: usize,
        delay: Duration,
        tallies: &mut CycleTallies,
    ) -> Result<JobEnd> {
        if job.awaiting_discovery() {
            self.discover(job).await?;
        }

        let batch: Vec<usize> = job.claimable_indices().into_iter().take(limit).collect();
        if batch.is_empty() {
            return self.finish(job).await;
        }

        if JobStateMachine::start(job, Utc::now())? {
            info!(job_id = %job.id, total_urls = job.total_urls, "Job started");
        }

        for (n, index) in batch.into_iter().enumerate() {
            if n > 0 && !self.pause(delay).await {
                return Ok(JobEnd::Interrupted);
            }
            match self.process_entry(job, index).await? {
                EntryOutcome::Succeeded => tallies.record(true),
                EntryOutcome::Failed => tallies.record(false),
                EntryOutcome::Unchanged => {}
                EntryOutcome::Interrupted => return Ok(JobEnd::Interrupted),
            }
        }

        self.finish(job).await
    }

    async fn drive_entry(
        &self,
        job: &mut ScrapeJob,
        index: usize,
        tallies: &mut CycleTallies,
    ) -> Result<JobEnd> {
        JobStateMachine::start(job, Utc::now())?;
        match self.process_entry(job, index).await? {
            EntryOutcome::Succeeded => tallies.record(true),
            EntryOutcome::Failed => tallies.record(false),
            EntryOutcome::Unchanged => {}
            EntryOutcome::Interrupted => return Ok(JobEnd::Interrupted),
        }
        self.finish(job).await
    }

    /// Claim, extract, normalize, store and settle one entry.
    ///
    /// The claim is persisted before the extraction call, and the settled
    /// entry is persisted together with its counters.
    async fn process_entry(&self, job: &mut ScrapeJob, index: usize) -> Result<EntryOutcome> {
        JobStateMachine::claim(job, index, Utc::now())?;
        self.store.save_job(job).await?;
        let url = job.urls[index].url.clone();

        let settled = match self.extract_and_store(&url).await {
            Ok(saved) => {
                debug!(
                    job_id = %job.id,
                    url = %url,
                    program_id = %saved.id(),
                    created = saved.is_created(),
                    "URL processed"
                );
                JobStateMachine::record_success(job, index, saved.id(), Utc::now())?
                    .then_some(EntryOutcome::Succeeded)
            }
            Err(ItemError::Extraction(ExtractionError::Cancelled)) => {
                info!(job_id = %job.id, url = %url, "Extraction interrupted, entry stays claimable");
                return Ok(EntryOutcome::Interrupted);
            }
            Err(e) => {
                warn!(job_id = %job.id, url = %url, error = %e, "URL failed");
                JobStateMachine::record_failure(job, index, e.to_string(), Utc::now())?
                    .then_some(EntryOutcome::Failed)
            }
        };

        self.store.save_job(job).await?;
        Ok(settled.unwrap_or(EntryOutcome::Unchanged))
    }

    async fn extract_and_store(&self, url: &str) -> std::result::Result<SaveOutcome, ItemError> {
        let raw = self.extractor.extract_one(url).await?;
        let record = normalize(&raw)?.with_source_urls([url]);
        Ok(self.store.save_program(&record).await?)
    }

    /// Run crawl discovery and turn the found pages into pending entries.
    async fn discover(&self, job: &mut ScrapeJob) -> Result<()> {
        let crawl_url = job.crawl_url.clone().ok_or_else(|| {
            PipelineError::CrawlDiscovery(ExtractionError::ExtractionFailed {
                reason: "crawl job has no crawl URL".to_string(),
            })
        })?;

        JobStateMachine::start(job, Utc::now())?;
        info!(job_id = %job.id, crawl_url = %crawl_url, extractor = self.extractor.name(), "Discovering pages");

        let urls = match self.extractor.discover(&crawl_url).await {
            Ok(urls) => urls,
            Err(ExtractionError::Cancelled) => return Err(ExtractionError::Cancelled.into()),
            Err(e) => return Err(PipelineError::CrawlDiscovery(e)),
        };

        let added = JobStateMachine::apply_discovery(job, urls, Utc::now())?;
        self.store.save_job(job).await?;
        info!(job_id = %job.id, added, "Crawl discovery finished");
        Ok(())
    }

    async fn finish(&self, job: &mut ScrapeJob) -> Result<JobEnd> {
        if JobStateMachine::try_complete(job, Utc::now()) {
            self.store.save_job(job).await?;
            info!(
                job_id = %job.id,
                processed = job.processed_urls,
                successful = job.successful_urls,
                failed = job.failed_urls,
                "Job completed"
            );
            return Ok(JobEnd::Completed);
        }
        Ok(JobEnd::Open)
    }

    /// Turn a job-fatal error into a failed job. Other errors are returned.
    async fn settle_job(&self, job: &mut ScrapeJob, end: Result<JobEnd>) -> Result<JobEnd> {
        match end {
            Ok(end) => Ok(end),
            Err(PipelineError::Extraction(ExtractionError::Cancelled)) => Ok(JobEnd::Interrupted),
            Err(e) if e.is_job_fatal() => {
                warn!(job_id = %job.id, error = %e, "Job failed");
                if !job.is_terminal() {
                    JobStateMachine::fail(job, e.to_string(), Utc::now())?;
                    self.store.save_job(job).await?;
                }
                Ok(JobEnd::Failed)
            }
            Err(e) => Err(e),
        }
    }

    /// Fold tallies into the stored settings and stamp `last_run`.
    ///
    /// Settings are re-read so an operator edit made during the cycle
    /// survives.
    async fn record_cycle(&self, now: DateTime<Utc>, tallies: CycleTallies) -> Result<()> {
        let mut settings = self.store.load_settings().await?;
        settings.record_cycle(now, tallies);
        self.store.save_settings(&settings).await?;
        Ok(())
    }
}
