use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, info};

use super::{FrameworkHistoryEntry, RunRecord, RunStore};
use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult};
use crate::evaluation::FrameworkAggregate;
use crate::report::BenchmarkReport;

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed run history
#[derive(Clone)]
pub struct SqliteRunStore {
    pool: SqlitePool,
}

impl SqliteRunStore {
    /// Open (or create) the database file and run migrations.
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());
        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true)
            .foreign_keys(true);

        Self::connect(options, config.max_connections).await
    }

    /// In-memory database; one connection so every query sees the same data.
    pub async fn new_in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .foreign_keys(true);

        Self::connect(options, 1).await
    }

    async fn connect(options: SqliteConnectOptions, max_connections: u32) -> StorageResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run database migrations using embedded sqlx migrations
    async fn run_migrations(&self) -> StorageResult<()> {
        info!("Running database migrations...");

        MIGRATOR.run(&self.pool).await.map_err(|e| StorageError::Migration {
            message: format!("Failed to run migrations: {}", e),
        })?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying pool for advanced queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl RunStore for SqliteRunStore {
    async fn save_report(&self, report: &BenchmarkReport) -> StorageResult<()> {
        let record = RunRecord::from(report);
        let frameworks = serde_json::to_string(&record.frameworks)?;
        let payload = serde_json::to_string(report)?;
        let created_at = report.generated_at.to_rfc3339();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO benchmark_runs
                (id, corpus_name, created_at, frameworks, overall_winner, overall_confidence, report)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.run_id)
        .bind(&record.corpus_name)
        .bind(&created_at)
        .bind(&frameworks)
        .bind(&record.overall_winner)
        .bind(record.overall_confidence)
        .bind(&payload)
        .execute(&mut *tx)
        .await?;

        for framework in &report.frameworks {
            let aggregate = serde_json::to_string(framework)?;
            sqlx::query(
                r#"
                INSERT INTO framework_results
                    (run_id, framework, core_method, overall_average, core_method_average,
                     total_cases, failures, aggregate, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&record.run_id)
            .bind(&framework.framework_name)
            .bind(&framework.core_method_id)
            .bind(framework.overall_average)
            .bind(framework.core_method_average)
            .bind(framework.total_cases as i64)
            .bind(framework.failure_count() as i64)
            .bind(&aggregate)
            .bind(&created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(run_id = %record.run_id, frameworks = report.frameworks.len(), "Run stored");
        Ok(())
    }

    async fn get_run(&self, run_id: &str) -> StorageResult<BenchmarkReport> {
        let payload: Option<(String,)> =
            sqlx::query_as("SELECT report FROM benchmark_runs WHERE id = ?")
                .bind(run_id)
                .fetch_optional(&self.pool)
                .await?;

        let (payload,) = payload.ok_or_else(|| StorageError::RunNotFound {
            run_id: run_id.to_string(),
        })?;
        Ok(serde_json::from_str(&payload)?)
    }

    async fn list_runs(&self, limit: u32) -> StorageResult<Vec<RunRecord>> {
        let rows: Vec<RunRow> = sqlx::query_as(
            r#"
            SELECT id, corpus_name, created_at, frameworks, overall_winner, overall_confidence
            FROM benchmark_runs
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(RunRecord::try_from).collect()
    }

    async fn framework_history(
        &self,
        framework: &str,
        limit: u32,
    ) -> StorageResult<Vec<FrameworkHistoryEntry>> {
        let rows: Vec<FrameworkRow> = sqlx::query_as(
            r#"
            SELECT run_id, framework, core_method, overall_average, core_method_average,
                   total_cases, failures, created_at
            FROM framework_results
            WHERE framework = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(framework)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(FrameworkHistoryEntry::from).collect())
    }

    async fn latest_framework_aggregate(
        &self,
        framework: &str,
    ) -> StorageResult<Option<FrameworkAggregate>> {
        let row: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT aggregate
            FROM framework_results
            WHERE framework = ?
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(framework)
        .fetch_optional(&self.pool)
        .await?;

        let Some((payload,)) = row else {
            return Ok(None);
        };
        let aggregate: FrameworkAggregate = serde_json::from_str(&payload)?;
        aggregate.validate().map_err(|e| StorageError::Query {
            message: format!("stored aggregate of {} is inconsistent: {}", framework, e),
        })?;
        Ok(Some(aggregate))
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

// Internal row types for SQLx mapping
#[derive(sqlx::FromRow)]
struct RunRow {
    id: String,
    corpus_name: String,
    created_at: String,
    frameworks: String,
    overall_winner: Option<String>,
    overall_confidence: Option<f64>,
}

impl TryFrom<RunRow> for RunRecord {
    type Error = StorageError;

    fn try_from(row: RunRow) -> Result<Self, Self::Error> {
        Ok(Self {
            run_id: row.id,
            corpus_name: row.corpus_name,
            created_at: parse_timestamp(&row.created_at),
            frameworks: serde_json::from_str(&row.frameworks)?,
            overall_winner: row.overall_winner,
            overall_confidence: row.overall_confidence,
        })
    }
}

#[derive(sqlx::FromRow)]
struct FrameworkRow {
    run_id: String,
    framework: String,
    core_method: String,
    overall_average: f64,
    core_method_average: f64,
    total_cases: i64,
    failures: i64,
    created_at: String,
}

impl From<FrameworkRow> for FrameworkHistoryEntry {
    fn from(row: FrameworkRow) -> Self {
        Self {
            run_id: row.run_id,
            framework: row.framework,
            core_method: row.core_method,
            overall_average: row.overall_average,
            core_method_average: row.core_method_average,
            total_cases: usize::try_from(row.total_cases).unwrap_or(0),
            failures: usize::try_from(row.failures).unwrap_or(0),
            created_at: parse_timestamp(&row.created_at),
        }
    }
}
