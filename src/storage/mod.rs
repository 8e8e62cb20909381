//! Run history persistence.
//!
//! Every completed run is stored append-only: one `benchmark_runs` row with
//! the full JSON export and one `framework_results` row per framework for
//! historical lookups. Nothing is ever updated in place.

mod sqlite;

pub use sqlite::SqliteRunStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageResult;
use crate::evaluation::FrameworkAggregate;
use crate::report::BenchmarkReport;

/// Summary row of a stored run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Unique run id.
    pub run_id: String,
    /// Scenario corpus name.
    pub corpus_name: String,
    /// When the run was recorded.
    pub created_at: DateTime<Utc>,
    /// Evaluated frameworks.
    pub frameworks: Vec<String>,
    /// Vote winner, when two frameworks were compared.
    pub overall_winner: Option<String>,
    /// Vote confidence, when two frameworks were compared.
    pub overall_confidence: Option<f64>,
}

impl From<&BenchmarkReport> for RunRecord {
    fn from(report: &BenchmarkReport) -> Self {
        Self {
            run_id: report.run_id.clone(),
            corpus_name: report.corpus_name.clone(),
            created_at: report.generated_at,
            frameworks: report
                .frameworks
                .iter()
                .map(|f| f.framework_name.clone())
                .collect(),
            overall_winner: report.comparison.as_ref().map(|c| c.overall_winner.clone()),
            overall_confidence: report.comparison.as_ref().map(|c| c.overall_confidence),
        }
    }
}

/// One framework's headline numbers in one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameworkHistoryEntry {
    /// Run the numbers belong to.
    pub run_id: String,
    /// Framework name.
    pub framework: String,
    /// Core method id.
    pub core_method: String,
    /// Mean of the scenario averages.
    pub overall_average: f64,
    /// Core method average.
    pub core_method_average: f64,
    /// Evaluated test cases.
    pub total_cases: usize,
    /// Failed method evaluations.
    pub failures: usize,
    /// When the run was recorded.
    pub created_at: DateTime<Utc>,
}

/// Storage of benchmark runs.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Persist a run. Saving the same run id twice is an error.
    async fn save_report(&self, report: &BenchmarkReport) -> StorageResult<()>;

    /// Load a stored run; `RunNotFound` when absent.
    async fn get_run(&self, run_id: &str) -> StorageResult<BenchmarkReport>;

    /// Most recent runs first.
    async fn list_runs(&self, limit: u32) -> StorageResult<Vec<RunRecord>>;

    /// Most recent results of one framework first.
    async fn framework_history(
        &self,
        framework: &str,
        limit: u32,
    ) -> StorageResult<Vec<FrameworkHistoryEntry>>;

    /// The framework's aggregate from its most recent run, re-validated.
    async fn latest_framework_aggregate(
        &self,
        framework: &str,
    ) -> StorageResult<Option<FrameworkAggregate>>;
}
