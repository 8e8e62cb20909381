//! Report rendering and export.
//!
//! A [`BenchmarkReport`] is the machine-readable export of one run. It is
//! written twice: pretty JSON (`report.json`) and Markdown (`report.md`).

mod markdown;

pub use markdown::grade;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::comparison::ComparisonResult;
use crate::conversation::ConversationSummary;
use crate::error::{AppError, AppResult};
use crate::evaluation::FrameworkAggregate;

/// File name of the JSON export.
pub const JSON_FILE: &str = "report.json";
/// File name of the Markdown report.
pub const MARKDOWN_FILE: &str = "report.md";

/// Everything one benchmark run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkReport {
    /// Unique run id.
    pub run_id: String,
    /// Scenario corpus name.
    pub corpus_name: String,
    /// When the report was created.
    pub generated_at: DateTime<Utc>,
    /// One aggregate per framework.
    pub frameworks: Vec<FrameworkAggregate>,
    /// Present when at least two frameworks were evaluated.
    #[serde(default)]
    pub comparison: Option<ComparisonResult>,
    /// Conversation summaries, when transcripts were supplied.
    #[serde(default)]
    pub conversations: Vec<ConversationSummary>,
}

/// Where a report was written.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportPaths {
    /// JSON export.
    pub json: PathBuf,
    /// Markdown report.
    pub markdown: PathBuf,
}

impl BenchmarkReport {
    /// Start a report with a fresh run id.
    pub fn new(corpus_name: impl Into<String>, frameworks: Vec<FrameworkAggregate>) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            corpus_name: corpus_name.into(),
            generated_at: Utc::now(),
            frameworks,
            comparison: None,
            conversations: Vec::new(),
        }
    }

    /// Attach the framework comparison.
    pub fn with_comparison(mut self, comparison: ComparisonResult) -> Self {
        self.comparison = Some(comparison);
        self
    }

    /// Attach conversation summaries.
    pub fn with_conversations(mut self, conversations: Vec<ConversationSummary>) -> Self {
        self.conversations = conversations;
        self
    }

    /// Render the Markdown report.
    pub fn to_markdown(&self) -> String {
        markdown::render(self)
    }

    /// Write `report.json` and `report.md` into `dir`, creating it if needed.
    pub fn write_to(&self, dir: &Path) -> AppResult<ReportPaths> {
        std::fs::create_dir_all(dir).map_err(|e| AppError::Report {
            message: format!("cannot create {}: {}", dir.display(), e),
        })?;

        let paths = ReportPaths {
            json: dir.join(JSON_FILE),
            markdown: dir.join(MARKDOWN_FILE),
        };
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&paths.json, json)?;
        std::fs::write(&paths.markdown, self.to_markdown())?;

        info!(
            run_id = %self.run_id,
            json = %paths.json.display(),
            markdown = %paths.markdown.display(),
            "Report written"
        );
        Ok(paths)
    }

    /// Load a JSON export and re-check every framework aggregate.
    pub fn load(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let report: BenchmarkReport = serde_json::from_str(&content)?;
        for framework in &report.frameworks {
            framework.validate()?;
        }
        Ok(report)
    }
}
