//! Retrieval evaluation: per-case scoring, scenario and framework
//! aggregation, and the framework runner.
//!
//! Data flows one way:
//!
//! ```text
//! ScenarioCorpus → CaseEvaluator (RetrievalAdapter × SimilarityJudge)
//!               → ScenarioAggregate → FrameworkAggregate
//! ```

mod aggregate;
mod case;
mod runner;
mod types;

pub use aggregate::*;
pub use case::*;
pub use runner::*;
pub use types::*;
