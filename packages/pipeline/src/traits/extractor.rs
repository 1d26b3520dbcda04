//! Extractor trait: the external schema-driven extraction service.
//!
//! Implementations hide the service's submit-then-poll protocol behind a
//! single awaitable call per operation.
//!
//! # Usage
//!
//! ```rust,ignore
//! use scrape_pipeline::traits::extractor::Extractor;
//!
//! let record = extractor.extract_one("https://example.org/program").await?;
//! let pages = extractor.discover("https://example.org").await?;
//! ```

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::ExtractResult;
use crate::types::record::{AgentRecord, ExtractedRecord};

#[async_trait]
pub trait Extractor: Send + Sync {
    /// Extract one record from one page.
    async fn extract_one(&self, url: &str) -> ExtractResult<ExtractedRecord>;

    /// Run a free-form prompt and return every record the service found,
    /// each with its cited source URLs.
    ///
    /// `max_credits` caps what the service may spend on this prompt.
    async fn extract_from_prompt(
        &self,
        prompt: &str,
        max_credits: Option<u32>,
    ) -> ExtractResult<Vec<AgentRecord>>;

    /// Crawl from a root URL and return the page URLs found.
    async fn discover(&self, crawl_url: &str) -> ExtractResult<Vec<String>>;

    /// Name for logging.
    fn name(&self) -> &str {
        "unknown"
    }
}

#[async_trait]
impl<T: Extractor + ?Sized> Extractor for Arc<T> {
    async fn extract_one(&self, url: &str) -> ExtractResult<ExtractedRecord> {
        (**self).extract_one(url).await
    }

    async fn extract_from_prompt(
        &self,
        prompt: &str,
        max_credits: Option<u32>,
    ) -> ExtractResult<Vec<AgentRecord>> {
        (**self).extract_from_prompt(prompt, max_credits).await
    }

    async fn discover(&self, crawl_url: &str) -> ExtractResult<Vec<String>> {
        (**self).discover(crawl_url).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
