//! Extractor implementations.
//!
//! - `FirecrawlExtractor` - the hosted extraction service
//! - `MockExtractor` - for testing

mod firecrawl;
mod mock;

pub use firecrawl::{agent_schema, program_schema, FirecrawlExtractor, PollPolicy};
pub use mock::MockExtractor;

// Re-export from traits for convenience
pub use crate::traits::extractor::Extractor;
