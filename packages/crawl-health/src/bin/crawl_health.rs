//! Operator CLI for crawl health
//!
//! Every command prints a single JSON document on stdout. Logs go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::sync::Arc;

use crawl_health::logging::init_logging;
use crawl_health::{
    stores, HealthConfig, HealthStore, HealthTier, HealthTracker, SkipDecision, SourceHealth,
};

#[derive(Parser)]
#[command(name = "crawl-health")]
#[command(about = "Inspect and maintain crawl health state")]
struct Cli {
    /// Database URL (overrides CRAWL_HEALTH_DATABASE_URL)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// System-wide summary for today
    Summary,

    /// Health of one source, or all sources worst first
    Health { source: Option<String> },

    /// Sources on a failure streak
    Unhealthy {
        #[arg(long, default_value_t = 3)]
        min_failures: u32,
    },

    /// Delay and skip advice for a source
    Advise { source: String },

    /// Delete old run history
    Cleanup {
        /// Days to keep (defaults to CRAWL_HEALTH_RETAIN_DAYS)
        #[arg(long)]
        days: Option<u32>,
    },

    /// Fail runs that never completed
    Reconcile {
        /// Age in minutes (defaults to CRAWL_HEALTH_STALE_RUN_MINUTES)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        older_than_minutes: Option<u32>,
    },
}

// ============================================================================
// JSON Response Types
// ============================================================================

#[derive(Serialize)]
struct SourceView {
    #[serde(flatten)]
    health: SourceHealth,
    tier: HealthTier,
    success_rate: f64,
}

impl From<SourceHealth> for SourceView {
    fn from(health: SourceHealth) -> Self {
        Self {
            tier: health.tier(),
            success_rate: health.success_rate(),
            health,
        }
    }
}

#[derive(Serialize)]
struct Advice {
    source: String,
    delay_secs: u64,
    #[serde(flatten)]
    skip: SkipDecision,
}

#[derive(Serialize)]
struct MaintenanceResult {
    success: bool,
    count: u64,
    message: String,
}

fn output<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    let mut config = HealthConfig::from_env().context("Failed to load configuration")?;
    if let Some(url) = cli.database_url {
        config = config.with_database_url(url);
    }

    let store = stores::connect(&config.database_url)
        .await
        .with_context(|| format!("Failed to open store at {}", config.database_url))?;
    let tracker = HealthTracker::new(store).with_classifier(config.classifier()?);

    match cli.command {
        Commands::Summary => cmd_summary(&tracker).await,
        Commands::Health { source } => cmd_health(&tracker, source.as_deref()).await,
        Commands::Unhealthy { min_failures } => cmd_unhealthy(&tracker, min_failures).await,
        Commands::Advise { source } => cmd_advise(&tracker, &source).await,
        Commands::Cleanup { days } => {
            cmd_cleanup(&tracker, days.unwrap_or(config.retain_days)).await
        }
        Commands::Reconcile { older_than_minutes } => {
            let minutes = older_than_minutes.unwrap_or(config.stale_run_minutes);
            cmd_reconcile(&tracker, minutes).await
        }
    }
}

type Tracker = HealthTracker<Arc<dyn HealthStore>>;

// ============================================================================
// Commands
// ============================================================================

async fn cmd_summary(tracker: &Tracker) -> Result<()> {
    let summary = tracker
        .system_summary()
        .await
        .context("Failed to build summary")?;
    output(&summary)
}

async fn cmd_health(tracker: &Tracker, source: Option<&str>) -> Result<()> {
    match source {
        Some(source) => {
            let health = tracker
                .get_health(source)
                .await
                .context("Failed to load source health")?;
            output(&health.map(SourceView::from))
        }
        None => {
            let all: Vec<SourceView> = tracker
                .get_all_health()
                .await
                .context("Failed to load source health")?
                .into_iter()
                .map(SourceView::from)
                .collect();
            output(&all)
        }
    }
}

async fn cmd_unhealthy(tracker: &Tracker, min_failures: u32) -> Result<()> {
    let sources: Vec<SourceView> = tracker
        .unhealthy_sources(min_failures)
        .await
        .context("Failed to load unhealthy sources")?
        .into_iter()
        .map(SourceView::from)
        .collect();
    output(&sources)
}

async fn cmd_advise(tracker: &Tracker, source: &str) -> Result<()> {
    let delay = tracker
        .recommended_delay(source)
        .await
        .context("Failed to compute delay")?;
    let skip = tracker
        .should_skip(source)
        .await
        .context("Failed to compute skip decision")?;

    output(&Advice {
        source: source.to_string(),
        delay_secs: delay.as_secs(),
        skip,
    })
}

async fn cmd_cleanup(tracker: &Tracker, days: u32) -> Result<()> {
    let deleted = tracker
        .cleanup(days)
        .await
        .context("Failed to clean up run history")?;

    output(&MaintenanceResult {
        success: true,
        count: deleted,
        message: format!("Deleted runs started more than {} days ago", days),
    })
}

async fn cmd_reconcile(tracker: &Tracker, minutes: u32) -> Result<()> {
    let closed = tracker
        .reconcile_stale_runs(chrono::Duration::minutes(i64::from(minutes)))
        .await
        .context("Failed to reconcile stale runs")?;

    output(&MaintenanceResult {
        success: true,
        count: closed as u64,
        message: format!("Failed runs left running for over {} minutes", minutes),
    })
}
