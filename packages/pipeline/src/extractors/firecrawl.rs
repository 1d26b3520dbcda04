//! Firecrawl-based extractor implementation.
//!
//! Every operation is a submit-then-poll exchange: the service either answers
//! with data straight away or hands back a job id whose status endpoint is
//! polled on a fixed interval until it completes, fails, or the attempt
//! budget runs out.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::{ExtractResult, ExtractionError};
use crate::security::ServiceCredentials;
use crate::traits::extractor::Extractor;
use crate::types::record::{AgentRecord, ExtractedRecord};

const EXTRACT_PROMPT: &str = "Extract information about this faith-based leadership program. \
Include all available details about meetings, location, format, and contact information.";

/// How often, and how many times, to check a service-side job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollPolicy {
    pub const fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Single-URL extraction: every 2s, about a minute in total.
    pub const EXTRACT: PollPolicy = PollPolicy::new(Duration::from_secs(2), 30);

    /// Prompt-driven extraction: every 5s, ten minutes in total.
    pub const AGENT: PollPolicy = PollPolicy::new(Duration::from_secs(5), 120);

    /// Crawl discovery: every 10s, ten minutes in total.
    pub const CRAWL: PollPolicy = PollPolicy::new(Duration::from_secs(10), 60);
}

/// Extractor backed by the Firecrawl API.
///
/// # Example
///
/// ```rust,ignore
/// use scrape_pipeline::extractors::FirecrawlExtractor;
/// use scrape_pipeline::security::ServiceCredentials;
///
/// let extractor = FirecrawlExtractor::new(ServiceCredentials::new(api_key))?
///     .with_shutdown(shutdown.clone());
/// let record = extractor.extract_one("https://example.org/program").await?;
/// ```
pub struct FirecrawlExtractor {
    client: Client,
    credentials: ServiceCredentials,
    extract_poll: PollPolicy,
    agent_poll: PollPolicy,
    crawl_poll: PollPolicy,
    /// Page cap for crawl discovery
    crawl_limit: u32,
    shutdown: CancellationToken,
}

// Request/Response types for the Firecrawl API

#[derive(Serialize)]
struct ExtractRequest<'a> {
    urls: [&'a str; 1],
    schema: Value,
    prompt: &'a str,
}

#[derive(Serialize)]
struct AgentRequest<'a> {
    prompt: &'a str,
    schema: Value,
    #[serde(rename = "maxCredits", skip_serializing_if = "Option::is_none")]
    max_credits: Option<u32>,
}

#[derive(Serialize)]
struct CrawlRequest<'a> {
    url: &'a str,
    limit: u32,
    #[serde(rename = "scrapeOptions")]
    scrape_options: CrawlScrapeOptions,
}

#[derive(Serialize)]
struct CrawlScrapeOptions {
    formats: Vec<&'static str>,
}

/// Answer to a submission: inline data, a job id to poll, or a refusal.
#[derive(Deserialize)]
struct SubmitResponse<T> {
    #[serde(default)]
    success: bool,
    data: Option<T>,
    id: Option<String>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct StatusResponse<T> {
    status: Option<String>,
    data: Option<T>,
    error: Option<String>,
    completed: Option<u32>,
    total: Option<u32>,
}

#[derive(Deserialize, Default)]
struct AgentData {
    #[serde(default)]
    programs: Vec<ExtractedRecord>,
}

#[derive(Deserialize)]
struct CrawlPage {
    metadata: Option<CrawlPageMetadata>,
}

#[derive(Deserialize)]
struct CrawlPageMetadata {
    #[serde(rename = "sourceURL")]
    source_url: Option<String>,
}

impl FirecrawlExtractor {
    pub fn new(credentials: ServiceCredentials) -> ExtractResult<Self> {
        if credentials.api_key.is_empty() {
            return Err(ExtractionError::Config("API key is empty".to_string()));
        }
        url::Url::parse(&credentials.base_url)
            .map_err(|e| ExtractionError::Config(format!("invalid base URL: {}", e)))?;

        let client = Client::builder().timeout(Duration::from_secs(120)).build()?;

        Ok(Self {
            client,
            credentials,
            extract_poll: PollPolicy::EXTRACT,
            agent_poll: PollPolicy::AGENT,
            crawl_poll: PollPolicy::CRAWL,
            crawl_limit: 100,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn with_extract_poll(mut self, policy: PollPolicy) -> Self {
        self.extract_poll = policy;
        self
    }

    pub fn with_agent_poll(mut self, policy: PollPolicy) -> Self {
        self.agent_poll = policy;
        self
    }

    pub fn with_crawl_poll(mut self, policy: PollPolicy) -> Self {
        self.crawl_poll = policy;
        self
    }

    pub fn with_crawl_limit(mut self, limit: u32) -> Self {
        self.crawl_limit = limit;
        self
    }

    /// Abort poll waits with `Cancelled` once this token fires.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.credentials.base_url, path)
    }

    async fn post<T: Serialize, R: DeserializeOwned>(&self, path: &str, body: &T) -> ExtractResult<R> {
        let response = self
            .client
            .post(self.endpoint(path))
            .header("Authorization", self.credentials.bearer())
            .json(body)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn get<R: DeserializeOwned>(&self, path: &str) -> ExtractResult<R> {
        let response = self
            .client
            .get(self.endpoint(path))
            .header("Authorization", self.credentials.bearer())
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn decode<R: DeserializeOwned>(response: reqwest::Response) -> ExtractResult<R> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractionError::Service {
                status: status.as_u16(),
                body,
            });
        }
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ExtractionError::InvalidResponse(e.to_string()))
    }

    /// Sleep for one poll interval unless shutdown fires first.
    async fn wait(&self, interval: Duration) -> ExtractResult<()> {
        tokio::select! {
            _ = self.shutdown.cancelled() => Err(ExtractionError::Cancelled),
            _ = tokio::time::sleep(interval) => Ok(()),
        }
    }

    /// Submit, then poll `status_path/{id}` if the service answered with a job id.
    async fn submit_and_wait<B, T>(
        &self,
        submit_path: &str,
        status_path: &str,
        body: &B,
        policy: PollPolicy,
    ) -> ExtractResult<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let submitted: SubmitResponse<T> = self.post(submit_path, body).await?;

        if !submitted.success {
            return Err(ExtractionError::ExtractionFailed {
                reason: submitted
                    .error
                    .unwrap_or_else(|| format!("request to {} was rejected", submit_path)),
            });
        }

        if let Some(data) = submitted.data {
            return Ok(data);
        }

        let job_id = submitted.id.ok_or_else(|| {
            ExtractionError::InvalidResponse("response carried neither data nor a job id".to_string())
        })?;

        tracing::info!(job = %job_id, path = %status_path, "Service job started, polling for results");
        self.poll(&format!("{}/{}", status_path, job_id), policy).await
    }

    async fn poll<T: DeserializeOwned>(&self, path: &str, policy: PollPolicy) -> ExtractResult<T> {
        for attempt in 1..=policy.max_attempts {
            self.wait(policy.interval).await?;

            let status: StatusResponse<T> = self.get(path).await?;
            let state = status.status.as_deref().unwrap_or("unknown");

            match (state, status.data) {
                ("completed", Some(data)) => {
                    tracing::debug!(path = %path, attempt, "Service job completed");
                    return Ok(data);
                }
                ("failed" | "cancelled", _) => {
                    return Err(ExtractionError::ExtractionFailed {
                        reason: status
                            .error
                            .unwrap_or_else(|| format!("service job {} failed", state)),
                    });
                }
                _ => {
                    tracing::debug!(path = %path, attempt, status = %state, "Service job in progress");
                    if attempt % 6 == 0 {
                        tracing::info!(
                            path = %path,
                            attempt,
                            completed = ?status.completed,
                            total = ?status.total,
                            "Still waiting on service job"
                        );
                    }
                }
            }
        }

        Err(ExtractionError::Timeout {
            attempts: policy.max_attempts,
        })
    }
}

#[async_trait]
impl Extractor for FirecrawlExtractor {
    async fn extract_one(&self, url: &str) -> ExtractResult<ExtractedRecord> {
        tracing::info!(url = %url, "Extracting program");
        let request = ExtractRequest {
            urls: [url],
            schema: program_schema(),
            prompt: EXTRACT_PROMPT,
        };
        self.submit_and_wait("/v1/extract", "/v1/extract", &request, self.extract_poll)
            .await
    }

    async fn extract_from_prompt(
        &self,
        prompt: &str,
        max_credits: Option<u32>,
    ) -> ExtractResult<Vec<AgentRecord>> {
        tracing::info!(max_credits = ?max_credits, "Running agent prompt");
        let request = AgentRequest {
            prompt,
            schema: agent_schema(),
            max_credits,
        };
        let data: AgentData = self
            .submit_and_wait("/v2/agent", "/v2/agent", &request, self.agent_poll)
            .await?;

        tracing::info!(records = data.programs.len(), "Agent prompt returned");
        Ok(data.programs.into_iter().map(AgentRecord::from).collect())
    }

    async fn discover(&self, crawl_url: &str) -> ExtractResult<Vec<String>> {
        tracing::info!(url = %crawl_url, limit = self.crawl_limit, "Starting crawl discovery");
        let request = CrawlRequest {
            url: crawl_url,
            limit: self.crawl_limit,
            scrape_options: CrawlScrapeOptions {
                formats: vec!["markdown"],
            },
        };

        let pages: Vec<CrawlPage> = self
            .submit_and_wait("/v1/crawl", "/v1/crawl", &request, self.crawl_poll)
            .await?;

        let urls: Vec<String> = pages
            .into_iter()
            .filter_map(|p| p.metadata.and_then(|m| m.source_url))
            .filter(|u| !u.trim().is_empty())
            .collect();

        tracing::info!(url = %crawl_url, pages_discovered = urls.len(), "Crawl discovery completed");
        Ok(urls)
    }

    fn name(&self) -> &str {
        "firecrawl"
    }
}

/// JSON schema the service fills for one program.
pub fn program_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "name": { "type": "string" },
            "description": { "type": "string" },
            "religiousAffiliation": { "type": "string", "enum": ["protestant", "catholic"] },
            "address": { "type": "string" },
            "city": { "type": "string" },
            "state": { "type": "string" },
            "zipCode": { "type": "string" },
            "coordinates": {
                "type": "object",
                "properties": {
                    "lat": { "type": "number" },
                    "lng": { "type": "number" }
                }
            },
            "meetingFormat": { "type": "string", "enum": ["in-person", "online", "both"] },
            "meetingFrequency": { "type": "string", "enum": ["weekly", "monthly", "quarterly"] },
            "meetingLength": { "type": "string", "enum": ["1-2", "2-4", "4-8"] },
            "meetingType": { "type": "string", "enum": ["peer-group", "forum", "small-group"] },
            "averageAttendance": {
                "type": "string",
                "enum": ["1-10", "10-20", "20-50", "50-100", "100+"]
            },
            "hasConferences": { "type": "string", "enum": ["none", "annual", "multiple"] },
            "hasOutsideSpeakers": { "type": "boolean" },
            "hasEducationTraining": { "type": "boolean" },
            "annualPrice": { "type": "number" },
            "monthlyPrice": { "type": "number" },
            "contactEmail": { "type": "string" },
            "contactPhone": { "type": "string" },
            "website": { "type": "string" }
        }
    })
}

/// Schema for prompt-driven extraction: a list of programs, each with a
/// `<field>_citation` source list per field plus a record-level `citations`.
pub fn agent_schema() -> Value {
    let mut item = program_schema();
    if let Some(properties) = item.get_mut("properties").and_then(Value::as_object_mut) {
        let cited: Vec<String> = properties.keys().cloned().collect();
        for field in cited {
            if field == "coordinates" {
                if let Some(nested) = properties
                    .get_mut("coordinates")
                    .and_then(|c| c.get_mut("properties"))
                    .and_then(Value::as_object_mut)
                {
                    nested.insert("lat_citation".to_string(), citation_schema());
                    nested.insert("lng_citation".to_string(), citation_schema());
                }
                continue;
            }
            properties.insert(format!("{field}_citation"), citation_schema());
        }
        properties.insert("citations".to_string(), citation_schema());
    }
    json!({
        "type": "object",
        "properties": {
            "programs": { "type": "array", "items": item }
        }
    })
}

fn citation_schema() -> Value {
    json!({ "type": "array", "items": { "type": "string" } })
}
