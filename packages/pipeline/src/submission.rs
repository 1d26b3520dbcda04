//! Job submission and status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

use crate::error::{PipelineError, Result};
use crate::traits::store::JobStore;
use crate::types::id::JobId;
use crate::types::job::{JobStatus, JobType, ScrapeJob, UrlEntry};

/// Body of a submission: an explicit URL list, or a crawl root.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    #[serde(default)]
    pub urls: Option<Vec<String>>,
    #[serde(default)]
    pub crawl_url: Option<String>,
}

/// Validated submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Urls(Vec<String>),
    Crawl(String),
}

impl SubmitRequest {
    /// A crawl root takes precedence when both are given.
    pub fn into_submission(self) -> Result<Submission> {
        if let Some(crawl_url) = self.crawl_url {
            return Ok(Submission::Crawl(validate_url(&crawl_url)?));
        }

        let urls = self.urls.ok_or_else(|| invalid("Either urls or crawlUrl must be provided"))?;
        if urls.is_empty() {
            return Err(invalid("urls array cannot be empty"));
        }

        let mut valid: Vec<String> = Vec::with_capacity(urls.len());
        for raw in &urls {
            let url = validate_url(raw)?;
            if !valid.contains(&url) {
                valid.push(url);
            }
        }
        Ok(Submission::Urls(valid))
    }
}

fn invalid(reason: impl Into<String>) -> PipelineError {
    PipelineError::InvalidSubmission {
        reason: reason.into(),
    }
}

/// Accept absolute http(s) URLs with a host. Returns the trimmed input.
pub fn validate_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(invalid("URL cannot be empty"));
    }

    let parsed =
        Url::parse(trimmed).map_err(|e| invalid(format!("invalid URL '{}': {}", trimmed, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid(format!(
            "invalid URL '{}': scheme must be http or https",
            trimmed
        )));
    }
    if parsed.host_str().is_none() {
        return Err(invalid(format!("invalid URL '{}': missing host", trimmed)));
    }

    Ok(trimmed.to_string())
}

/// Create a queued job for a validated submission.
pub async fn submit<S>(store: &S, submission: Submission) -> Result<ScrapeJob>
where
    S: JobStore + ?Sized,
{
    let job = match submission {
        Submission::Urls(urls) => ScrapeJob::for_urls(urls),
        Submission::Crawl(crawl_url) => ScrapeJob::for_crawl(crawl_url),
    };
    store.create_job(&job).await?;

    info!(
        job_id = %job.id,
        job_type = %job.job_type,
        total_urls = job.total_urls,
        "Scrape job queued"
    );
    Ok(job)
}

/// Submit a list of URLs as an extract job.
pub async fn submit_urls<S>(store: &S, urls: Vec<String>) -> Result<ScrapeJob>
where
    S: JobStore + ?Sized,
{
    let submission = SubmitRequest {
        urls: Some(urls),
        crawl_url: None,
    }
    .into_submission()?;
    submit(store, submission).await
}

/// Submit a crawl root as a crawl job.
pub async fn submit_crawl<S>(store: &S, crawl_url: &str) -> Result<ScrapeJob>
where
    S: JobStore + ?Sized,
{
    submit(store, Submission::Crawl(validate_url(crawl_url)?)).await
}

/// Externally visible job status.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusView {
    pub job_id: JobId,
    pub status: JobStatus,
    pub job_type: JobType,
    pub crawl_url: Option<String>,
    pub total_urls: u32,
    pub processed_urls: u32,
    pub successful_urls: u32,
    pub failed_urls: u32,
    /// Percentage of URLs processed, rounded
    pub progress: u32,
    pub urls: Vec<UrlEntry>,
    pub error_log: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ScrapeJob> for JobStatusView {
    fn from(job: ScrapeJob) -> Self {
        Self {
            progress: job.progress(),
            job_id: job.id,
            status: job.status,
            job_type: job.job_type,
            crawl_url: job.crawl_url,
            total_urls: job.total_urls,
            processed_urls: job.processed_urls,
            successful_urls: job.successful_urls,
            failed_urls: job.failed_urls,
            urls: job.urls,
            error_log: job.error_log,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

pub async fn job_status<S>(store: &S, job_id: JobId) -> Result<JobStatusView>
where
    S: JobStore + ?Sized,
{
    store
        .get_job(job_id)
        .await?
        .map(JobStatusView::from)
        .ok_or(PipelineError::JobNotFound { job_id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MemoryStore;

    #[test]
    fn test_validate_url() {
        assert_eq!(
            validate_url("  https://example.org/a ").unwrap(),
            "https://example.org/a"
        );
        assert!(validate_url("").is_err());
        assert!(validate_url("not a url").is_err());
        assert!(validate_url("ftp://example.org").is_err());
        assert!(validate_url("mailto:someone@example.org").is_err());
    }

    #[test]
    fn test_request_validation_messages() {
        let err = SubmitRequest::default().into_submission().unwrap_err();
        assert!(err
            .to_string()
            .contains("Either urls or crawlUrl must be provided"));

        let err = SubmitRequest {
            urls: Some(vec![]),
            crawl_url: None,
        }
        .into_submission()
        .unwrap_err();
        assert!(err.to_string().contains("urls array cannot be empty"));
    }

    #[test]
    fn test_crawl_wins_and_duplicates_collapse() {
        let both = SubmitRequest {
            urls: Some(vec!["https://a.example".to_string()]),
            crawl_url: Some("https://root.example".to_string()),
        };
        assert_eq!(
            both.into_submission().unwrap(),
            Submission::Crawl("https://root.example".to_string())
        );

        let dupes = SubmitRequest {
            urls: Some(vec![
                "https://a.example".to_string(),
                " https://a.example".to_string(),
                "https://b.example".to_string(),
            ]),
            crawl_url: None,
        };
        assert_eq!(
            dupes.into_submission().unwrap(),
            Submission::Urls(vec![
                "https://a.example".to_string(),
                "https://b.example".to_string()
            ])
        );
    }

    #[tokio::test]
    async fn test_submit_and_status() {
        let store = MemoryStore::new();
        let job = submit_urls(
            &store,
            vec!["https://a.example".to_string(), "https://b.example".to_string()],
        )
        .await
        .unwrap();

        let view = job_status(&store, job.id).await.unwrap();
        assert_eq!(view.status, JobStatus::Queued);
        assert_eq!(view.total_urls, 2);
        assert_eq!(view.progress, 0);
        assert_eq!(view.urls.len(), 2);

        let crawl = submit_crawl(&store, "https://root.example").await.unwrap();
        let view = job_status(&store, crawl.id).await.unwrap();
        assert_eq!(view.job_type, JobType::Crawl);
        assert_eq!(view.total_urls, 0);
        assert!(view.urls.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let store = MemoryStore::new();
        let err = job_status(&store, JobId::new()).await.unwrap_err();
        assert!(matches!(err, PipelineError::JobNotFound { .. }));
    }

    #[test]
    fn test_status_view_serializes_camel_case() {
        let view = JobStatusView::from(ScrapeJob::for_urls(vec!["https://a.example".to_string()]));
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["status"], "queued");
        assert_eq!(json["totalUrls"], 1);
        assert_eq!(json["urls"][0]["status"], "pending");
        assert!(json.get("jobId").is_some());
    }
}
