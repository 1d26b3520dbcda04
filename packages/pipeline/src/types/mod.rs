//! Data types for jobs, settings and records.

pub mod id;
pub mod job;
pub mod record;
pub mod rich_text;
pub mod settings;
