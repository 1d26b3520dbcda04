use anyhow::{anyhow, Context, Result};
use dotenvy::dotenv;
use scrape_pipeline::SecretString;
use std::env;
use std::str::FromStr;

/// How submitted work reaches the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    /// A cron job runs a full cycle on every tick
    #[default]
    Cron,
    /// Each submission enqueues one message per URL (or one crawl message).
    /// The cron cycle still runs as a backstop.
    Queue,
}

impl FromStr for DispatchMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cron" => Ok(Self::Cron),
            "queue" => Ok(Self::Queue),
            other => Err(anyhow!("unknown dispatch mode: {}", other)),
        }
    }
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub firecrawl_api_key: SecretString,
    pub firecrawl_api_url: Option<String>,
    /// Absent means the in-memory store (development only)
    pub database_url: Option<String>,
    pub port: u16,
    pub operator_token: SecretString,
    pub cron_secret: SecretString,
    pub dispatch_mode: DispatchMode,
    pub cron_schedule: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| -> Result<String> {
            var(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("{} must be set", key))
        };

        Ok(Self {
            firecrawl_api_key: required("FIRECRAWL_API_KEY")?.into(),
            firecrawl_api_url: var("FIRECRAWL_API_URL").filter(|v| !v.trim().is_empty()),
            database_url: var("DATABASE_URL").filter(|v| !v.trim().is_empty()),
            port: var("PORT")
                .unwrap_or_else(|| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            operator_token: required("OPERATOR_TOKEN")?.into(),
            cron_secret: var("CRON_SECRET")
                .unwrap_or_else(|| "internal-cron".to_string())
                .into(),
            dispatch_mode: var("DISPATCH_MODE")
                .map(|v| v.parse())
                .transpose()
                .context("DISPATCH_MODE must be 'cron' or 'queue'")?
                .unwrap_or_default(),
            cron_schedule: var("CRON_SCHEDULE").unwrap_or_else(|| "0 * * * * *".to_string()),
        })
    }
}
