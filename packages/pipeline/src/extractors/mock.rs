//! Mock extractor for testing.
//!
//! Canned records and errors per URL, a canned prompt answer, canned crawl
//! discoveries, and a log of every call for verification.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::{ExtractResult, ExtractionError};
use crate::traits::extractor::Extractor;
use crate::types::record::{AgentRecord, ExtractedRecord};

/// Canned outcome for one URL. Errors are stored as constructors because
/// `ExtractionError` is not `Clone`.
#[derive(Clone)]
enum Canned {
    Record(ExtractedRecord),
    Fail(Arc<dyn Fn() -> ExtractionError + Send + Sync>),
}

#[derive(Default)]
struct MockState {
    records: HashMap<String, Canned>,
    prompt_result: Option<Canned>,
    prompt_records: Vec<ExtractedRecord>,
    discoveries: HashMap<String, Result<Vec<String>, Canned>>,
    extract_calls: Vec<String>,
    prompt_calls: Vec<(String, Option<u32>)>,
    discover_calls: Vec<String>,
    /// Simulated service time per extraction call
    latency: Duration,
}

/// Mock extractor for testing.
///
/// # Example
///
/// ```rust,ignore
/// use scrape_pipeline::extractors::MockExtractor;
///
/// let mock = MockExtractor::new()
///     .with_record("https://a.example", record)
///     .with_service_error("https://b.example", 500, "boom");
/// ```
#[derive(Clone, Default)]
pub struct MockExtractor {
    state: Arc<Mutex<MockState>>,
}

impl MockExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every `extract_one` call take `latency` before answering.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.state().latency = latency;
        self
    }

    /// Return `record` for `url`.
    pub fn add_record(&self, url: impl Into<String>, record: ExtractedRecord) {
        self.state()
            .records
            .insert(url.into(), Canned::Record(record));
    }

    /// Fail `url` with the error built by `make`.
    pub fn add_error<F>(&self, url: impl Into<String>, make: F)
    where
        F: Fn() -> ExtractionError + Send + Sync + 'static,
    {
        self.state()
            .records
            .insert(url.into(), Canned::Fail(Arc::new(make)));
    }

    pub fn with_record(self, url: impl Into<String>, record: ExtractedRecord) -> Self {
        self.add_record(url, record);
        self
    }

    /// Fail `url` with a non-2xx service error.
    pub fn with_service_error(self, url: impl Into<String>, status: u16, body: &str) -> Self {
        let body = body.to_string();
        self.add_error(url, move || ExtractionError::Service {
            status,
            body: body.clone(),
        });
        self
    }

    /// Fail `url` as if polling ran out of attempts.
    pub fn with_timeout(self, url: impl Into<String>) -> Self {
        self.add_error(url, || ExtractionError::Timeout { attempts: 30 });
        self
    }

    /// Records returned by `extract_from_prompt`.
    pub fn with_prompt_records(self, records: Vec<ExtractedRecord>) -> Self {
        {
            let mut state = self.state();
            state.prompt_records = records;
            state.prompt_result = None;
        }
        self
    }

    /// Make `extract_from_prompt` fail.
    pub fn with_prompt_error<F>(self, make: F) -> Self
    where
        F: Fn() -> ExtractionError + Send + Sync + 'static,
    {
        self.state().prompt_result = Some(Canned::Fail(Arc::new(make)));
        self
    }

    /// URLs returned by `discover(crawl_url)`.
    pub fn with_discovery(self, crawl_url: impl Into<String>, urls: Vec<String>) -> Self {
        self.state().discoveries.insert(crawl_url.into(), Ok(urls));
        self
    }

    /// Make `discover(crawl_url)` fail.
    pub fn with_discovery_error<F>(self, crawl_url: impl Into<String>, make: F) -> Self
    where
        F: Fn() -> ExtractionError + Send + Sync + 'static,
    {
        self.state()
            .discoveries
            .insert(crawl_url.into(), Err(Canned::Fail(Arc::new(make))));
        self
    }

    /// URLs passed to `extract_one`, in call order.
    pub fn extract_calls(&self) -> Vec<String> {
        self.state().extract_calls.clone()
    }

    pub fn extract_call_count(&self) -> usize {
        self.state().extract_calls.len()
    }

    pub fn prompt_calls(&self) -> Vec<(String, Option<u32>)> {
        self.state().prompt_calls.clone()
    }

    pub fn discover_calls(&self) -> Vec<String> {
        self.state().discover_calls.clone()
    }

    pub fn reset_calls(&self) {
        let mut state = self.state();
        state.extract_calls.clear();
        state.prompt_calls.clear();
        state.discover_calls.clear();
    }
}

fn resolve(canned: &Canned) -> ExtractResult<ExtractedRecord> {
    match canned {
        Canned::Record(record) => Ok(record.clone()),
        Canned::Fail(make) => Err(make()),
    }
}

#[async_trait]
impl Extractor for MockExtractor {
    async fn extract_one(&self, url: &str) -> ExtractResult<ExtractedRecord> {
        let latency = {
            let mut state = self.state();
            state.extract_calls.push(url.to_string());
            state.latency
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let state = self.state();
        match state.records.get(url) {
            Some(canned) => resolve(canned),
            None => Err(ExtractionError::ExtractionFailed {
                reason: format!("no canned result for {}", url),
            }),
        }
    }

    async fn extract_from_prompt(
        &self,
        prompt: &str,
        max_credits: Option<u32>,
    ) -> ExtractResult<Vec<AgentRecord>> {
        let mut state = self.state();
        state.prompt_calls.push((prompt.to_string(), max_credits));
        if let Some(Canned::Fail(make)) = &state.prompt_result {
            return Err(make());
        }
        Ok(state
            .prompt_records
            .iter()
            .cloned()
            .map(AgentRecord::from)
            .collect())
    }

    async fn discover(&self, crawl_url: &str) -> ExtractResult<Vec<String>> {
        let mut state = self.state();
        state.discover_calls.push(crawl_url.to_string());
        match state.discoveries.get(crawl_url) {
            Some(Ok(urls)) => Ok(urls.clone()),
            Some(Err(canned)) => resolve(canned).map(|_| Vec::new()),
            None => Ok(Vec::new()),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
