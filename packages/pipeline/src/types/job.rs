//! Scrape job and per-URL entry types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::id::{JobId, ProgramId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    /// Explicit list of URLs
    #[default]
    Extract,
    /// One root URL whose pages are discovered first
    Crawl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UrlStatus {
    #[default]
    Pending,
    Processing,
    Success,
    Failed,
}

impl UrlStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, UrlStatus::Success | UrlStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UrlStatus::Pending => "pending",
            UrlStatus::Processing => "processing",
            UrlStatus::Success => "success",
            UrlStatus::Failed => "failed",
        }
    }
}

impl JobType {
    pub fn as_str(self) -> &'static str {
        match self {
            JobType::Extract => "extract",
            JobType::Crawl => "crawl",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for UrlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognised status/type text read back from storage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl FromStr for JobStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(ParseEnumError {
                kind: "job status",
                value: other.to_string(),
            }),
        }
    }
}

impl FromStr for JobType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "extract" => Ok(JobType::Extract),
            "crawl" => Ok(JobType::Crawl),
            other => Err(ParseEnumError {
                kind: "job type",
                value: other.to_string(),
            }),
        }
    }
}

/// One URL's extraction attempt within a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlEntry {
    pub url: String,
    pub status: UrlStatus,
    /// Set only on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program_id: Option<ProgramId>,
    /// Set only on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UrlEntry {
    pub fn pending(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: UrlStatus::Pending,
            program_id: None,
            error: None,
        }
    }

    /// Pending, or claimed by an invocation that never finished it.
    pub fn is_claimable(&self) -> bool {
        !self.status.is_terminal()
    }
}

/// A unit of scrape work: a URL list or one discovery crawl.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeJob {
    pub id: JobId,
    pub job_type: JobType,
    pub status: JobStatus,
    pub crawl_url: Option<String>,
    pub urls: Vec<UrlEntry>,
    pub total_urls: u32,
    pub processed_urls: u32,
    pub successful_urls: u32,
    pub failed_urls: u32,
    pub error_log: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScrapeJob {
    /// Queued extract job with one pending entry per URL.
    pub fn for_urls(urls: impl IntoIterator<Item = String>) -> Self {
        let entries: Vec<UrlEntry> = urls.into_iter().map(UrlEntry::pending).collect();
        let now = Utc::now();
        Self {
            id: JobId::new(),
            job_type: JobType::Extract,
            status: JobStatus::Queued,
            crawl_url: None,
            total_urls: entries.len() as u32,
            urls: entries,
            processed_urls: 0,
            successful_urls: 0,
            failed_urls: 0,
            error_log: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Queued crawl job; entries arrive with discovery.
    pub fn for_crawl(crawl_url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            job_type: JobType::Crawl,
            status: JobStatus::Queued,
            crawl_url: Some(crawl_url.into()),
            urls: Vec::new(),
            total_urls: 0,
            processed_urls: 0,
            successful_urls: 0,
            failed_urls: 0,
            error_log: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Crawl job whose pages have not been discovered yet.
    pub fn awaiting_discovery(&self) -> bool {
        self.job_type == JobType::Crawl
            && self.urls.is_empty()
            && self.total_urls == 0
            && !self.is_terminal()
    }

    /// Index of the first entry for `url`.
    pub fn entry_index(&self, url: &str) -> Option<usize> {
        self.urls.iter().position(|e| e.url == url)
    }

    /// Indices of entries still to be worked, in array order.
    pub fn claimable_indices(&self) -> Vec<usize> {
        self.urls
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_claimable())
            .map(|(i, _)| i)
            .collect()
    }

    pub fn all_entries_terminal(&self) -> bool {
        self.urls.iter().all(|e| e.status.is_terminal())
    }

    /// `round(processed / total * 100)`, 0 when there is nothing to do.
    pub fn progress(&self) -> u32 {
        if self.total_urls == 0 {
            return 0;
        }
        (self.processed_urls as f64 / self.total_urls as f64 * 100.0).round() as u32
    }

    /// processed = successful + failed, and processed ≤ total.
    pub fn counters_consistent(&self) -> bool {
        self.processed_urls == self.successful_urls + self.failed_urls
            && self.processed_urls <= self.total_urls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_urls_creates_pending_entries() {
        let job = ScrapeJob::for_urls(vec![
            "https://a.example".to_string(),
            "https://b.example".to_string(),
        ]);

        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.job_type, JobType::Extract);
        assert_eq!(job.total_urls, 2);
        assert!(job.urls.iter().all(|e| e.status == UrlStatus::Pending));
        assert!(job.counters_consistent());
    }

    #[test]
    fn test_crawl_job_awaits_discovery() {
        let job = ScrapeJob::for_crawl("https://network.example");
        assert!(job.awaiting_discovery());
        assert_eq!(job.total_urls, 0);
        assert_eq!(job.progress(), 0);
    }

    #[test]
    fn test_progress_rounds() {
        let mut job = ScrapeJob::for_urls((0..3).map(|i| format!("https://{}.example", i)));
        job.processed_urls = 2;
        job.successful_urls = 2;
        assert_eq!(job.progress(), 67);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Processing).unwrap(),
            "\"processing\""
        );
        assert_eq!("completed".parse::<JobStatus>().unwrap(), JobStatus::Completed);
        assert!("done".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_entry_serialization_omits_unset_fields() {
        let json = serde_json::to_value(UrlEntry::pending("https://a.example")).unwrap();
        assert_eq!(json["status"], "pending");
        assert!(json.get("programId").is_none());
        assert!(json.get("error").is_none());
    }
}
