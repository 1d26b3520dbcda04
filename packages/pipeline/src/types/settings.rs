//! Operator-tunable scraper settings and cycle bookkeeping.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Allowed values for `frequency_minutes`.
pub const ALLOWED_FREQUENCIES: [u32; 7] = [1, 2, 5, 10, 15, 30, 60];

pub const MAX_BATCH_SIZE: u32 = 20;
pub const MAX_DELAY_SECONDS: u32 = 60;
pub const MAX_CONCURRENT_JOBS: u32 = 10;

/// Process-wide scraper settings (singleton).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScraperSettings {
    pub enabled: bool,
    pub frequency_minutes: u32,
    pub batch_size: u32,
    pub delay_between_requests_seconds: u32,
    pub max_concurrent_jobs: u32,

    /// Set at the end of every cycle that passed the enabled and frequency gates
    pub last_run: Option<DateTime<Utc>>,
    pub total_processed: u64,
    pub total_successful: u64,
    pub total_failed: u64,
}

impl Default for ScraperSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            frequency_minutes: 5,
            batch_size: 5,
            delay_between_requests_seconds: 2,
            max_concurrent_jobs: 3,
            last_run: None,
            total_processed: 0,
            total_successful: 0,
            total_failed: 0,
        }
    }
}

/// Per-cycle outcome counts folded into the cumulative counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleTallies {
    pub processed: u32,
    pub successful: u32,
    pub failed: u32,
}

impl CycleTallies {
    pub fn record(&mut self, success: bool) {
        self.processed += 1;
        if success {
            self.successful += 1;
        } else {
            self.failed += 1;
        }
    }

    pub fn merge(&mut self, other: CycleTallies) {
        self.processed += other.processed;
        self.successful += other.successful;
        self.failed += other.failed;
    }
}

impl ScraperSettings {
    /// Whether enough time has passed since `last_run`.
    ///
    /// A missing `last_run` counts as the epoch, so the first cycle always runs.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        let Some(last) = self.last_run else {
            return true;
        };
        now.signed_duration_since(last) >= Duration::minutes(self.frequency_minutes as i64)
    }

    /// Stamp `last_run` and fold this cycle's tallies into the counters.
    pub fn record_cycle(&mut self, now: DateTime<Utc>, tallies: CycleTallies) {
        self.last_run = Some(now);
        self.total_processed += tallies.processed as u64;
        self.total_successful += tallies.successful as u64;
        self.total_failed += tallies.failed as u64;
    }

    pub fn delay(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.delay_between_requests_seconds as u64)
    }

    /// Check every knob against its allowed range.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let mut problems = Vec::new();

        if !ALLOWED_FREQUENCIES.contains(&self.frequency_minutes) {
            problems.push(format!(
                "frequencyMinutes must be one of {:?}",
                ALLOWED_FREQUENCIES
            ));
        }
        if !(1..=MAX_BATCH_SIZE).contains(&self.batch_size) {
            problems.push(format!("batchSize must be between 1 and {}", MAX_BATCH_SIZE));
        }
        if self.delay_between_requests_seconds > MAX_DELAY_SECONDS {
            problems.push(format!(
                "delayBetweenRequestsSeconds must be between 0 and {}",
                MAX_DELAY_SECONDS
            ));
        }
        if !(1..=MAX_CONCURRENT_JOBS).contains(&self.max_concurrent_jobs) {
            problems.push(format!(
                "maxConcurrentJobs must be between 1 and {}",
                MAX_CONCURRENT_JOBS
            ));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::InvalidSettings {
                reason: problems.join("; "),
            })
        }
    }

    /// Apply a partial update, rejecting it if the result is out of range.
    ///
    /// `self` is left untouched on error.
    pub fn apply(&mut self, update: &SettingsUpdate) -> Result<(), PipelineError> {
        let mut next = self.clone();
        if let Some(enabled) = update.enabled {
            next.enabled = enabled;
        }
        if let Some(v) = update.frequency_minutes {
            next.frequency_minutes = v;
        }
        if let Some(v) = update.batch_size {
            next.batch_size = v;
        }
        if let Some(v) = update.delay_between_requests_seconds {
            next.delay_between_requests_seconds = v;
        }
        if let Some(v) = update.max_concurrent_jobs {
            next.max_concurrent_jobs = v;
        }

        next.validate()?;
        *self = next;
        Ok(())
    }
}

/// Partial settings patch. Bookkeeping fields are not writable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SettingsUpdate {
    pub enabled: Option<bool>,
    pub frequency_minutes: Option<u32>,
    pub batch_size: Option<u32>,
    pub delay_between_requests_seconds: Option<u32>,
    pub max_concurrent_jobs: Option<u32>,
}

impl SettingsUpdate {
    pub fn is_empty(&self) -> bool {
        self == &SettingsUpdate::default()
    }
}
