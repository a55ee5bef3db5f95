use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;

use crate::classifier::{ErrorClassifier, PhraseTable};

pub const DEFAULT_DATABASE_URL: &str = "sqlite://crawl_health.db";
pub const DEFAULT_RETAIN_DAYS: u32 = 30;
pub const DEFAULT_STALE_RUN_MINUTES: u32 = 120;

/// Crawl health configuration loaded from environment variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthConfig {
    pub database_url: String,
    /// Days of run history kept by `cleanup`.
    pub retain_days: u32,
    /// Age after which a still-running run is considered abandoned.
    pub stale_run_minutes: u32,
    /// JSON phrase table replacing the built-in classifier rules.
    pub phrases_path: Option<PathBuf>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            retain_days: DEFAULT_RETAIN_DAYS,
            stale_run_minutes: DEFAULT_STALE_RUN_MINUTES,
            phrases_path: None,
        }
    }
}

impl HealthConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("CRAWL_HEALTH_DATABASE_URL")
                .or_else(|_| env::var("DATABASE_URL"))
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            retain_days: env::var("CRAWL_HEALTH_RETAIN_DAYS")
                .unwrap_or_else(|_| DEFAULT_RETAIN_DAYS.to_string())
                .parse()
                .context("CRAWL_HEALTH_RETAIN_DAYS must be a non-negative number")?,
            stale_run_minutes: env::var("CRAWL_HEALTH_STALE_RUN_MINUTES")
                .unwrap_or_else(|_| DEFAULT_STALE_RUN_MINUTES.to_string())
                .parse()
                .context("CRAWL_HEALTH_STALE_RUN_MINUTES must be a non-negative number")?,
            phrases_path: env::var("CRAWL_HEALTH_PHRASES").ok().map(PathBuf::from),
        })
    }

    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = url.into();
        self
    }

    pub fn with_retain_days(mut self, days: u32) -> Self {
        self.retain_days = days;
        self
    }

    pub fn with_stale_run_minutes(mut self, minutes: u32) -> Self {
        self.stale_run_minutes = minutes;
        self
    }

    pub fn with_phrases_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.phrases_path = Some(path.into());
        self
    }

    pub fn stale_run_age(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.stale_run_minutes))
    }

    /// Build the classifier, loading the phrase table if one is configured.
    pub fn classifier(&self) -> Result<ErrorClassifier> {
        let Some(path) = &self.phrases_path else {
            return Ok(ErrorClassifier::new());
        };
        let table = PhraseTable::from_file(path)
            .with_context(|| format!("Failed to load phrase table {}", path.display()))?;
        ErrorClassifier::with_table(table)
            .with_context(|| format!("Invalid phrase table {}", path.display()))
    }
}
