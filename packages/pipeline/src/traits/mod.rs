//! Trait seams for the extraction service and persistence.

pub mod extractor;
pub mod store;
