// Scrape Pipeline - API Server
//
// HTTP surfaces for job submission, status, settings and imports, plus the
// cron and queue triggers that drive the scrape dispatcher.

pub mod config;
pub mod kernel;
pub mod server;

pub use config::*;
