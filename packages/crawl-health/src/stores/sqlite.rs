//! SQLite storage implementation.
//!
//! A file-based storage backend using SQLite. Good for:
//! - A single crawler host
//! - Local development
//! - Testing with `sqlite::memory:`
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC text, so string
//! comparison in SQL matches chronological order.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::error::{HealthError, Result};
use crate::scoring::{ScoreStep, MAX_SCORE, MIN_SCORE};
use crate::traits::store::HealthStore;
use crate::types::run::duration_secs;
use crate::types::{ErrorKind, Run, RunId, RunOutcome, RunStats, RunStatus, SourceHealth};

const RUN_COLUMNS: &str = "id, source_key, started_at, completed_at, duration_secs, status, \
     events_found, events_new, events_updated, error_message, error_kind, is_transient";

const HEALTH_COLUMNS: &str = "source_key, consecutive_failures, total_crawls, successful_crawls, \
     last_success_at, last_failure_at, last_error_kind, health_score, updated_at";

/// SQLite-based health store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) a SQLite database and set up the schema.
    ///
    /// # Example URLs
    /// - `sqlite::memory:` - In-memory database (ephemeral)
    /// - `sqlite://crawl_health.db` - File-based database
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(10));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    /// Create an in-memory SQLite store (for testing).
    ///
    /// Uses a single long-lived connection, since every SQLite in-memory
    /// connection is its own database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Self::from_pool(pool).await
    }

    /// Wrap an existing pool and set up the schema.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Create tables and indexes if they do not exist.
    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS crawl_runs (
                id TEXT PRIMARY KEY,
                source_key TEXT NOT NULL,
                started_at TEXT NOT NULL,
                completed_at TEXT,
                duration_secs REAL,
                status TEXT NOT NULL DEFAULT 'running',
                events_found INTEGER NOT NULL DEFAULT 0,
                events_new INTEGER NOT NULL DEFAULT 0,
                events_updated INTEGER NOT NULL DEFAULT 0,
                error_message TEXT,
                error_kind TEXT,
                is_transient INTEGER
            );

            CREATE INDEX IF NOT EXISTS idx_crawl_runs_started_at ON crawl_runs(started_at);
            CREATE INDEX IF NOT EXISTS idx_crawl_runs_source_key ON crawl_runs(source_key);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| HealthError::Migration(Box::new(e)))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS source_health (
                source_key TEXT PRIMARY KEY,
                consecutive_failures INTEGER NOT NULL DEFAULT 0,
                total_crawls INTEGER NOT NULL DEFAULT 0,
                successful_crawls INTEGER NOT NULL DEFAULT 0,
                last_success_at TEXT,
                last_failure_at TEXT,
                last_error_kind TEXT,
                health_score REAL NOT NULL DEFAULT 100.0,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| HealthError::Migration(Box::new(e)))?;

        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| HealthError::invalid_row(format!("invalid timestamp {:?}: {}", value, e)))
}

fn parse_opt_ts(value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value.as_deref().map(parse_ts).transpose()
}

fn parse_kind(value: Option<String>) -> Result<Option<ErrorKind>> {
    value
        .map(|k| k.parse::<ErrorKind>().map_err(HealthError::invalid_row))
        .transpose()
}

// Row types for sqlx queries
#[derive(Debug, FromRow)]
struct RunRow {
    id: String,
    source_key: String,
    started_at: String,
    completed_at: Option<String>,
    duration_secs: Option<f64>,
    status: String,
    events_found: i64,
    events_new: i64,
    events_updated: i64,
    error_message: Option<String>,
    error_kind: Option<String>,
    is_transient: Option<bool>,
}

impl RunRow {
    fn into_run(self) -> Result<Run> {
        Ok(Run {
            id: self
                .id
                .parse()
                .map_err(|e| HealthError::invalid_row(format!("invalid run id: {}", e)))?,
            source_key: self.source_key,
            started_at: parse_ts(&self.started_at)?,
            completed_at: parse_opt_ts(self.completed_at)?,
            duration_secs: self.duration_secs,
            status: self.status.parse().map_err(HealthError::invalid_row)?,
            events_found: self.events_found as u32,
            events_new: self.events_new as u32,
            events_updated: self.events_updated as u32,
            error_message: self.error_message,
            error_kind: parse_kind(self.error_kind)?,
            is_transient: self.is_transient,
        })
    }
}

#[derive(Debug, FromRow)]
struct HealthRow {
    source_key: String,
    consecutive_failures: i64,
    total_crawls: i64,
    successful_crawls: i64,
    last_success_at: Option<String>,
    last_failure_at: Option<String>,
    last_error_kind: Option<String>,
    health_score: f64,
    updated_at: String,
}

impl HealthRow {
    fn into_health(self) -> Result<SourceHealth> {
        Ok(SourceHealth {
            source_key: self.source_key,
            consecutive_failures: self.consecutive_failures as u32,
            total_crawls: self.total_crawls as u64,
            successful_crawls: self.successful_crawls as u64,
            last_success_at: parse_opt_ts(self.last_success_at)?,
            last_failure_at: parse_opt_ts(self.last_failure_at)?,
            last_error_kind: parse_kind(self.last_error_kind)?,
            health_score: self.health_score,
            updated_at: parse_ts(&self.updated_at)?,
        })
    }
}

#[async_trait]
impl HealthStore for SqliteStore {
    #[instrument(skip(self, started_at))]
    async fn insert_run(&self, source_key: &str, started_at: DateTime<Utc>) -> Result<RunId> {
        let id = RunId::new();

        sqlx::query(
            "INSERT INTO crawl_runs (id, source_key, started_at, status) VALUES (?, ?, ?, 'running')",
        )
        .bind(id.to_string())
        .bind(source_key)
        .bind(format_ts(started_at))
        .execute(&self.pool)
        .await?;

        debug!(run_id = %id, "run started");
        Ok(id)
    }

    async fn get_run(&self, run_id: RunId) -> Result<Option<Run>> {
        let row = sqlx::query_as::<_, RunRow>(&format!(
            "SELECT {} FROM crawl_runs WHERE id = ?",
            RUN_COLUMNS
        ))
        .bind(run_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(RunRow::into_run).transpose()
    }

    #[instrument(skip(self, outcome, step, completed_at), fields(run_id = %run_id, status = %outcome.status()))]
    async fn complete_run(
        &self,
        run_id: RunId,
        outcome: &RunOutcome,
        step: ScoreStep,
        completed_at: DateTime<Utc>,
    ) -> Result<Option<SourceHealth>> {
        let completed = format_ts(completed_at);
        let mut tx = self.pool.begin().await?;

        // Writing first takes the database write lock for the rest of the
        // transaction; the status guard makes a second completion a no-op.
        let claimed: Option<(String, String)> = sqlx::query_as(
            r#"
            UPDATE crawl_runs SET status = ?, completed_at = ?
            WHERE id = ? AND status = 'running'
            RETURNING source_key, started_at
            "#,
        )
        .bind(outcome.status().as_str())
        .bind(&completed)
        .bind(run_id.to_string())
        .fetch_optional(&mut *tx)
        .await?;

        let Some((source_key, started_at)) = claimed else {
            tx.rollback().await?;
            debug!("run missing or already finished");
            return Ok(None);
        };

        let duration = duration_secs(parse_ts(&started_at)?, completed_at);

        let row = match outcome {
            RunOutcome::Success(counts) => {
                sqlx::query(
                    r#"
                    UPDATE crawl_runs
                    SET duration_secs = ?, events_found = ?, events_new = ?, events_updated = ?
                    WHERE id = ?
                    "#,
                )
                .bind(duration)
                .bind(counts.found as i64)
                .bind(counts.new as i64)
                .bind(counts.updated as i64)
                .bind(run_id.to_string())
                .execute(&mut *tx)
                .await?;

                sqlx::query_as::<_, HealthRow>(&format!(
                    r#"
                    INSERT INTO source_health (
                        source_key, consecutive_failures, total_crawls, successful_crawls,
                        last_success_at, health_score, updated_at
                    )
                    VALUES (?, 0, 1, 1, ?, ?, ?)
                    ON CONFLICT(source_key) DO UPDATE SET
                        consecutive_failures = 0,
                        total_crawls = source_health.total_crawls + 1,
                        successful_crawls = source_health.successful_crawls + 1,
                        last_success_at = excluded.last_success_at,
                        health_score = MAX(?, MIN(?, source_health.health_score + ?)),
                        updated_at = excluded.updated_at
                    RETURNING {}
                    "#,
                    HEALTH_COLUMNS
                ))
                .bind(&source_key)
                .bind(&completed)
                .bind(step.initial())
                .bind(&completed)
                .bind(MIN_SCORE)
                .bind(MAX_SCORE)
                .bind(step.delta())
                .fetch_one(&mut *tx)
                .await?
            }
            RunOutcome::Failed(failure) => {
                sqlx::query(
                    r#"
                    UPDATE crawl_runs
                    SET duration_secs = ?, error_message = ?, error_kind = ?, is_transient = ?
                    WHERE id = ?
                    "#,
                )
                .bind(duration)
                .bind(&failure.message)
                .bind(failure.kind.as_str())
                .bind(failure.is_transient)
                .bind(run_id.to_string())
                .execute(&mut *tx)
                .await?;

                sqlx::query_as::<_, HealthRow>(&format!(
                    r#"
                    INSERT INTO source_health (
                        source_key, consecutive_failures, total_crawls, successful_crawls,
                        last_failure_at, last_error_kind, health_score, updated_at
                    )
                    VALUES (?, 1, 1, 0, ?, ?, ?, ?)
                    ON CONFLICT(source_key) DO UPDATE SET
                        consecutive_failures = source_health.consecutive_failures + 1,
                        total_crawls = source_health.total_crawls + 1,
                        last_failure_at = excluded.last_failure_at,
                        last_error_kind = excluded.last_error_kind,
                        health_score = MAX(?, MIN(?, source_health.health_score + ?)),
                        updated_at = excluded.updated_at
                    RETURNING {}
                    "#,
                    HEALTH_COLUMNS
                ))
                .bind(&source_key)
                .bind(&completed)
                .bind(failure.kind.as_str())
                .bind(step.initial())
                .bind(&completed)
                .bind(MIN_SCORE)
                .bind(MAX_SCORE)
                .bind(step.delta())
                .fetch_one(&mut *tx)
                .await?
            }
        };

        tx.commit().await?;
        row.into_health().map(Some)
    }

    async fn get_health(&self, source_key: &str) -> Result<Option<SourceHealth>> {
        let row = sqlx::query_as::<_, HealthRow>(&format!(
            "SELECT {} FROM source_health WHERE source_key = ?",
            HEALTH_COLUMNS
        ))
        .bind(source_key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(HealthRow::into_health).transpose()
    }

    async fn get_all_health(&self) -> Result<Vec<SourceHealth>> {
        let rows = sqlx::query_as::<_, HealthRow>(&format!(
            "SELECT {} FROM source_health ORDER BY health_score ASC, source_key ASC",
            HEALTH_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(HealthRow::into_health).collect()
    }

    async fn unhealthy_sources(&self, min_failures: u32) -> Result<Vec<SourceHealth>> {
        let rows = sqlx::query_as::<_, HealthRow>(&format!(
            r#"
            SELECT {} FROM source_health
            WHERE consecutive_failures >= ?
            ORDER BY consecutive_failures DESC, source_key ASC
            "#,
            HEALTH_COLUMNS
        ))
        .bind(min_failures as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(HealthRow::into_health).collect()
    }

    async fn run_stats(&self, since: DateTime<Utc>) -> Result<RunStats> {
        let rows: Vec<(String, Option<String>, i64)> = sqlx::query_as(
            r#"
            SELECT status, error_kind, COUNT(*)
            FROM crawl_runs
            WHERE started_at >= ?
            GROUP BY status, error_kind
            "#,
        )
        .bind(format_ts(since))
        .fetch_all(&self.pool)
        .await?;

        let mut stats = RunStats::default();
        for (status, kind, count) in rows {
            let status: RunStatus = status.parse().map_err(HealthError::invalid_row)?;
            stats.add(status, parse_kind(kind)?, count as u64);
        }
        Ok(stats)
    }

    async fn stale_runs(&self, started_before: DateTime<Utc>) -> Result<Vec<Run>> {
        let rows = sqlx::query_as::<_, RunRow>(&format!(
            r#"
            SELECT {} FROM crawl_runs
            WHERE status = 'running' AND started_at < ?
            ORDER BY started_at ASC
            "#,
            RUN_COLUMNS
        ))
        .bind(format_ts(started_before))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(RunRow::into_run).collect()
    }

    #[instrument(skip(self))]
    async fn delete_runs_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM crawl_runs WHERE started_at < ?")
            .bind(format_ts(cutoff))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
