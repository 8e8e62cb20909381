use serde::{Deserialize, Serialize};

use crate::corpus::TestCase;
use crate::error::{EvalError, EvalResult};
use crate::judge::clamp_score;
use crate::stats::mean;

/// How a single (case, method) result came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodOutcome {
    /// Judge returned a parseable score.
    Scored,
    /// Judge answered but no score pattern matched; score is 0.
    Unparsed,
    /// Retrieval call failed; scored 0 without judging.
    RetrievalFailed,
    /// Retrieval call exceeded the per-call timeout.
    RetrievalTimedOut,
    /// Judge call failed; score is 0.
    JudgeFailed,
    /// Judge call exceeded the per-call timeout.
    JudgeTimedOut,
}

impl MethodOutcome {
    /// Whether the result is a degraded (zero-score) failure.
    pub fn is_failure(&self) -> bool {
        !matches!(self, MethodOutcome::Scored)
    }
}

impl std::fmt::Display for MethodOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MethodOutcome::Scored => write!(f, "scored"),
            MethodOutcome::Unparsed => write!(f, "unparsed"),
            MethodOutcome::RetrievalFailed => write!(f, "retrieval failed"),
            MethodOutcome::RetrievalTimedOut => write!(f, "retrieval timed out"),
            MethodOutcome::JudgeFailed => write!(f, "judge failed"),
            MethodOutcome::JudgeTimedOut => write!(f, "judge timed out"),
        }
    }
}

/// Result of one retrieval method on one test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodResult {
    /// Method identifier.
    pub method_id: String,
    /// Normalized retrieved text; empty when nothing was found or retrieval failed.
    pub retrieved_content: String,
    /// Judge score in [0, 10].
    pub score: f64,
    /// Judge output verbatim, or the failure description.
    pub rationale: String,
    /// How the score was obtained.
    pub outcome: MethodOutcome,
}

impl MethodResult {
    /// Create a result. The score is clamped to [0, 10].
    pub fn new(
        method_id: impl Into<String>,
        retrieved_content: impl Into<String>,
        score: f64,
        rationale: impl Into<String>,
        outcome: MethodOutcome,
    ) -> Self {
        Self {
            method_id: method_id.into(),
            retrieved_content: retrieved_content.into(),
            score: clamp_score(score),
            rationale: rationale.into(),
            outcome,
        }
    }

    /// The canonical failure state: empty content, zero score.
    pub fn failed(
        method_id: impl Into<String>,
        rationale: impl Into<String>,
        outcome: MethodOutcome,
    ) -> Self {
        Self::new(method_id, String::new(), 0.0, rationale, outcome)
    }
}

/// All method results for one test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseEvaluation {
    /// The evaluated test case.
    pub case: TestCase,
    /// Method results sorted by method id.
    pub results: Vec<MethodResult>,
    /// Unweighted mean of every method score (failures count as 0).
    pub overall_average: f64,
    /// Score of the framework's core method.
    pub core_method_score: f64,
    /// Core method id the case was scored with.
    pub core_method_id: String,
}

impl CaseEvaluation {
    /// Build a case evaluation. Fails when the core method has no result.
    pub fn new(
        framework: &str,
        case: TestCase,
        mut results: Vec<MethodResult>,
        core_method_id: &str,
    ) -> EvalResult<Self> {
        results.sort_by(|a, b| a.method_id.cmp(&b.method_id));

        let core_method_score = results
            .iter()
            .find(|r| r.method_id == core_method_id)
            .map(|r| r.score)
            .ok_or_else(|| EvalError::MissingCoreMethod {
                framework: framework.to_string(),
                method_id: core_method_id.to_string(),
            })?;

        let scores: Vec<f64> = results.iter().map(|r| r.score).collect();
        let overall_average = mean(&scores).unwrap_or(0.0);

        Ok(Self {
            case,
            results,
            overall_average,
            core_method_score,
            core_method_id: core_method_id.to_string(),
        })
    }

    /// Score of a method on this case, if it was invoked.
    pub fn score_of(&self, method_id: &str) -> Option<f64> {
        self.results
            .iter()
            .find(|r| r.method_id == method_id)
            .map(|r| r.score)
    }

    /// Number of degraded results.
    pub fn failure_count(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_failure()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, score: f64) -> MethodResult {
        MethodResult::new(id, "content", score, "评分: x", MethodOutcome::Scored)
    }

    #[test]
    fn test_method_result_clamps() {
        assert_eq!(result("m", 12.0).score, 10.0);
        assert_eq!(result("m", -1.0).score, 0.0);
        assert_eq!(result("m", f64::NAN).score, 0.0);
    }

    #[test]
    fn test_case_evaluation_sorts_and_averages() {
        let eval = CaseEvaluation::new(
            "fw",
            TestCase::new("q", "e"),
            vec![result("search", 6.0), result("context", 8.0)],
            "context",
        )
        .unwrap();
        assert_eq!(eval.results[0].method_id, "context");
        assert_eq!(eval.overall_average, 7.0);
        assert_eq!(eval.core_method_score, 8.0);
        assert_eq!(eval.score_of("search"), Some(6.0));
    }

    #[test]
    fn test_failures_count_as_zero() {
        let eval = CaseEvaluation::new(
            "fw",
            TestCase::new("q", "e"),
            vec![
                result("context", 9.0),
                MethodResult::failed("profile", "timeout", MethodOutcome::RetrievalTimedOut),
            ],
            "context",
        )
        .unwrap();
        assert_eq!(eval.overall_average, 4.5);
        assert_eq!(eval.failure_count(), 1);
        assert_eq!(eval.results[1].retrieved_content, "");
    }

    #[test]
    fn test_missing_core_method_is_error() {
        let err = CaseEvaluation::new(
            "memu",
            TestCase::new("q", "e"),
            vec![result("clustered", 5.0)],
            "memory_items",
        )
        .unwrap_err();
        assert!(matches!(err, EvalError::MissingCoreMethod { .. }));
    }
}
