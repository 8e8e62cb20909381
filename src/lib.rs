//! # Memory Bench
//!
//! A benchmarking engine for the memory backends of long-running
//! conversational agents. It drives every retrieval method of each backend
//! ("framework") against a fixed scenario corpus, has an external LLM judge
//! score the retrieved content against expected answers, aggregates the
//! scores per scenario and framework, and compares two frameworks
//! head-to-head. A separate conversation track scores recorded multi-turn
//! transcripts and measures what retrieved memory changes.
//!
//! ## Architecture
//!
//! ```text
//! ScenarioCorpus → CaseEvaluator (RetrievalAdapter × SimilarityJudge)
//!                → ScenarioAggregate → FrameworkAggregate
//!                → ComparativeAnalyzer → BenchmarkReport (JSON + Markdown)
//!                                              ↓
//!                                        SQLite run history
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use memory_bench::config::Config;
//! use memory_bench::corpus::builtin_corpus;
//! use memory_bench::evaluation::{CaseEvaluator, FrameworkRunner};
//! use memory_bench::judge::LangbaseJudge;
//! use memory_bench::langbase::LangbaseClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let client = LangbaseClient::new(&config.langbase, config.request.clone())?;
//!     let judge = Arc::new(LangbaseJudge::new(client, &config.pipes.judge));
//!     let evaluator = CaseEvaluator::new("memobase", "context", methods, judge, config.evaluation)?;
//!     let aggregate = FrameworkRunner::new(evaluator).run(&builtin_corpus()?).await?;
//!     println!("{:.2}", aggregate.overall_average);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Framework head-to-head comparison and the weighted winner vote.
pub mod comparison;
/// Environment configuration and benchmark plans.
pub mod config;
/// Conversation-quality track: turn scoring, analysis, memory impact.
pub mod conversation;
/// Scenario corpus of query/expected-answer test cases.
pub mod corpus;
/// Error types and result aliases for the application.
pub mod error;
/// Case evaluation, aggregation and the framework runner.
pub mod evaluation;
/// Similarity judge interface and score parsing.
pub mod judge;
/// Langbase API client and types for pipe communication.
pub mod langbase;
/// System prompts for Langbase pipes.
pub mod prompts;
/// Markdown and JSON report export.
pub mod report;
/// Retrieval adapter interface and response normalization.
pub mod retrieval;
/// Small numeric helpers shared by the scorers.
pub mod stats;
/// SQLite run history.
pub mod storage;

pub use config::Config;
pub use error::{AppError, AppResult};
