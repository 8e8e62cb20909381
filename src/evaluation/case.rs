use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::{CaseEvaluation, MethodOutcome, MethodResult, ScenarioAggregate};
use crate::config::EvaluationConfig;
use crate::corpus::{Scenario, TestCase};
use crate::error::{EvalError, EvalResult, JudgeError};
use crate::judge::{parse_judge_score, SimilarityJudge};
use crate::retrieval::RetrievalAdapter;

/// Runs every configured retrieval method of one framework against test
/// cases and scores each result with the judge.
///
/// Transient failures (retrieval errors, judge errors, timeouts) degrade a
/// single [`MethodResult`] to score 0 and never abort the run.
#[derive(Clone)]
pub struct CaseEvaluator {
    framework: String,
    core_method_id: String,
    methods: Vec<Arc<dyn RetrievalAdapter>>,
    judge: Arc<dyn SimilarityJudge>,
    options: EvaluationConfig,
}

impl CaseEvaluator {
    /// Create an evaluator. Method ids must be unique and the core method
    /// must be one of them.
    pub fn new(
        framework: impl Into<String>,
        core_method_id: impl Into<String>,
        methods: Vec<Arc<dyn RetrievalAdapter>>,
        judge: Arc<dyn SimilarityJudge>,
        options: EvaluationConfig,
    ) -> EvalResult<Self> {
        let framework = framework.into();
        let core_method_id = core_method_id.into();

        if methods.is_empty() {
            return Err(EvalError::NoMethods { framework });
        }
        let mut ids = HashSet::new();
        if let Some(method) = methods.iter().find(|m| !ids.insert(m.method_id())) {
            return Err(EvalError::DuplicateMethod {
                framework,
                method_id: method.method_id().to_string(),
            });
        }
        if !methods.iter().any(|m| m.method_id() == core_method_id) {
            return Err(EvalError::MissingCoreMethod {
                framework,
                method_id: core_method_id,
            });
        }

        Ok(Self {
            framework,
            core_method_id,
            methods,
            judge,
            options,
        })
    }

    /// Framework name.
    pub fn framework(&self) -> &str {
        &self.framework
    }

    /// Core method id.
    pub fn core_method_id(&self) -> &str {
        &self.core_method_id
    }

    /// Evaluate one test case across all methods.
    pub async fn evaluate(&self, case: &TestCase) -> EvalResult<CaseEvaluation> {
        let mut evaluations = self.evaluate_cases(std::slice::from_ref(case)).await?;
        evaluations.pop().ok_or_else(|| EvalError::TaskFailed {
            message: "no evaluation produced for case".to_string(),
        })
    }

    /// Evaluate a whole scenario and aggregate it.
    pub async fn evaluate_scenario(&self, scenario: &Scenario) -> EvalResult<ScenarioAggregate> {
        let evaluations = self.evaluate_cases(&scenario.cases).await?;
        ScenarioAggregate::from_cases(&scenario.name, evaluations)
    }

    /// Evaluate cases concurrently, bounded by `max_concurrency`. The output
    /// keeps case order; results inside a case are sorted by method id.
    pub async fn evaluate_cases(&self, cases: &[TestCase]) -> EvalResult<Vec<CaseEvaluation>> {
        let semaphore = Arc::new(Semaphore::new(self.options.max_concurrency.max(1)));
        let call_timeout = Duration::from_millis(self.options.call_timeout_ms);
        let mut tasks = JoinSet::new();

        for (case_idx, case) in cases.iter().enumerate() {
            let case = Arc::new(case.clone());
            for adapter in &self.methods {
                let semaphore = Arc::clone(&semaphore);
                let adapter = Arc::clone(adapter);
                let judge = Arc::clone(&self.judge);
                let case = Arc::clone(&case);
                let identity = self.options.identity.clone();

                tasks.spawn(async move {
                    // The semaphore is never closed, so acquisition only fails
                    // if it is; run unbounded in that case.
                    let _permit = semaphore.acquire_owned().await.ok();
                    let result = evaluate_method(
                        adapter.as_ref(),
                        judge.as_ref(),
                        &case,
                        identity.as_deref(),
                        call_timeout,
                    )
                    .await;
                    (case_idx, result)
                });
            }
        }

        // Per-task accumulation, merged after every task finished.
        let mut per_case: Vec<Vec<MethodResult>> = cases.iter().map(|_| Vec::new()).collect();
        while let Some(joined) = tasks.join_next().await {
            let (case_idx, result) = joined.map_err(|e| EvalError::TaskFailed {
                message: e.to_string(),
            })?;
            per_case[case_idx].push(result);
        }

        cases
            .iter()
            .zip(per_case)
            .map(|(case, results)| {
                CaseEvaluation::new(&self.framework, case.clone(), results, &self.core_method_id)
            })
            .collect()
    }
}

/// Retrieve, then judge. Never fails: every failure mode maps to a
/// zero-score result with a descriptive rationale.
async fn evaluate_method(
    adapter: &dyn RetrievalAdapter,
    judge: &dyn SimilarityJudge,
    case: &TestCase,
    identity: Option<&str>,
    call_timeout: Duration,
) -> MethodResult {
    let method_id = adapter.method_id();
    let timeout_ms = call_timeout.as_millis() as u64;

    let retrieved = match timeout(call_timeout, adapter.retrieve(&case.query, identity)).await {
        Ok(Ok(content)) => content.to_text(),
        Ok(Err(e)) => {
            warn!(method = %method_id, error = %e, "Retrieval failed, scoring as empty");
            return MethodResult::failed(
                method_id,
                format!("retrieval failed: {}", e),
                MethodOutcome::RetrievalFailed,
            );
        }
        Err(_) => {
            warn!(method = %method_id, timeout_ms, "Retrieval timed out, scoring as empty");
            return MethodResult::failed(
                method_id,
                format!("retrieval timed out after {}ms", timeout_ms),
                MethodOutcome::RetrievalTimedOut,
            );
        }
    };

    let judged = timeout(
        call_timeout,
        judge.score(&case.query, &retrieved, &case.expected, adapter.label()),
    )
    .await
    .unwrap_or(Err(JudgeError::Timeout { timeout_ms }));

    match judged {
        Ok(text) => {
            let parsed = parse_judge_score(&text);
            let outcome = if parsed.matched {
                MethodOutcome::Scored
            } else {
                warn!(method = %method_id, "Judge output had no parseable score, defaulting to 0");
                MethodOutcome::Unparsed
            };
            debug!(method = %method_id, score = parsed.score, "Method scored");
            MethodResult::new(method_id, retrieved, parsed.score, text, outcome)
        }
        Err(e) => {
            warn!(method = %method_id, error = %e, "Judge failed, defaulting to 0");
            let outcome = match e {
                JudgeError::Timeout { .. } => MethodOutcome::JudgeTimedOut,
                _ => MethodOutcome::JudgeFailed,
            };
            MethodResult::new(
                method_id,
                retrieved,
                0.0,
                format!("judge failed: {}", e),
                outcome,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{RetrievalError, RetrievalResult};
    use crate::judge::MockSimilarityJudge;
    use crate::retrieval::RetrievedContent;
    use async_trait::async_trait;

    struct FixedAdapter {
        id: &'static str,
        reply: Result<&'static str, ()>,
        delay_ms: u64,
    }

    #[async_trait]
    impl RetrievalAdapter for FixedAdapter {
        fn method_id(&self) -> &str {
            self.id
        }

        async fn retrieve(
            &self,
            _query: &str,
            _identity: Option<&str>,
        ) -> RetrievalResult<RetrievedContent> {
            if self.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            }
            match self.reply {
                Ok(text) => Ok(RetrievedContent::Text(text.to_string())),
                Err(()) => Err(RetrievalError::Api {
                    status: 500,
                    message: "boom".to_string(),
                }),
            }
        }
    }

    fn adapter(id: &'static str, reply: Result<&'static str, ()>) -> Arc<dyn RetrievalAdapter> {
        Arc::new(FixedAdapter {
            id,
            reply,
            delay_ms: 0,
        })
    }

    fn options(call_timeout_ms: u64) -> EvaluationConfig {
        EvaluationConfig {
            max_concurrency: 2,
            call_timeout_ms,
            identity: None,
        }
    }

    #[tokio::test]
    async fn test_scores_each_method_with_judge() {
        let mut judge = MockSimilarityJudge::new();
        judge
            .expect_score()
            .returning(|_, retrieved, _, _| {
                if retrieved.contains("green tea") {
                    Ok("评分: 9\n理由: 完全匹配".to_string())
                } else {
                    Ok("评分: 3".to_string())
                }
            })
            .times(2);

        let evaluator = CaseEvaluator::new(
            "memobase",
            "context",
            vec![adapter("profile", Ok("likes coffee")), adapter("context", Ok("green tea"))],
            Arc::new(judge),
            options(1000),
        )
        .unwrap();

        let eval = evaluator
            .evaluate(&TestCase::new("drink?", "green tea"))
            .await
            .unwrap();
        assert_eq!(eval.results[0].method_id, "context");
        assert_eq!(eval.core_method_score, 9.0);
        assert_eq!(eval.overall_average, 6.0);
    }

    #[tokio::test]
    async fn test_retrieval_failure_skips_judge() {
        let mut judge = MockSimilarityJudge::new();
        judge
            .expect_score()
            .returning(|_, _, _, _| Ok("评分: 8".to_string()))
            .times(1);

        let evaluator = CaseEvaluator::new(
            "fw",
            "context",
            vec![adapter("context", Ok("x")), adapter("events", Err(()))],
            Arc::new(judge),
            options(1000),
        )
        .unwrap();

        let eval = evaluator.evaluate(&TestCase::new("q", "e")).await.unwrap();
        let failed = &eval.results[1];
        assert_eq!(failed.method_id, "events");
        assert_eq!(failed.score, 0.0);
        assert_eq!(failed.outcome, MethodOutcome::RetrievalFailed);
        assert!(failed.retrieved_content.is_empty());
        assert_eq!(eval.overall_average, 4.0);
    }

    #[tokio::test]
    async fn test_unparseable_judge_output_keeps_rationale() {
        let mut judge = MockSimilarityJudge::new();
        judge
            .expect_score()
            .returning(|_, _, _, _| Ok("Looks related but incomplete.".to_string()));

        let evaluator = CaseEvaluator::new(
            "fw",
            "context",
            vec![adapter("context", Ok("x"))],
            Arc::new(judge),
            options(1000),
        )
        .unwrap();

        let eval = evaluator.evaluate(&TestCase::new("q", "e")).await.unwrap();
        assert_eq!(eval.results[0].score, 0.0);
        assert_eq!(eval.results[0].outcome, MethodOutcome::Unparsed);
        assert_eq!(eval.results[0].rationale, "Looks related but incomplete.");
    }

    #[tokio::test]
    async fn test_judge_error_degrades_to_zero() {
        let mut judge = MockSimilarityJudge::new();
        judge
            .expect_score()
            .returning(|_, _, _, _| Err(JudgeError::EmptyCompletion));

        let evaluator = CaseEvaluator::new(
            "fw",
            "context",
            vec![adapter("context", Ok("x"))],
            Arc::new(judge),
            options(1000),
        )
        .unwrap();

        let eval = evaluator.evaluate(&TestCase::new("q", "e")).await.unwrap();
        assert_eq!(eval.results[0].outcome, MethodOutcome::JudgeFailed);
        assert!(eval.results[0].rationale.starts_with("judge failed"));
        assert_eq!(eval.results[0].retrieved_content, "x");
    }

    #[tokio::test]
    async fn test_slow_retrieval_times_out() {
        let mut judge = MockSimilarityJudge::new();
        judge
            .expect_score()
            .returning(|_, _, _, _| Ok("评分: 5".to_string()));

        let slow: Arc<dyn RetrievalAdapter> = Arc::new(FixedAdapter {
            id: "slow",
            reply: Ok("late"),
            delay_ms: 500,
        });
        let evaluator = CaseEvaluator::new(
            "fw",
            "context",
            vec![adapter("context", Ok("x")), slow],
            Arc::new(judge),
            options(50),
        )
        .unwrap();

        let eval = evaluator.evaluate(&TestCase::new("q", "e")).await.unwrap();
        let slow_result = eval.results.iter().find(|r| r.method_id == "slow").unwrap();
        assert_eq!(slow_result.outcome, MethodOutcome::RetrievalTimedOut);
        assert_eq!(slow_result.score, 0.0);
        assert_eq!(eval.core_method_score, 5.0);
    }

    #[test]
    fn test_core_method_must_be_configured() {
        let judge = MockSimilarityJudge::new();
        let result = CaseEvaluator::new(
            "memu",
            "memory_items",
            vec![adapter("clustered", Ok("x"))],
            Arc::new(judge),
            options(1000),
        );
        assert!(matches!(result, Err(EvalError::MissingCoreMethod { .. })));
    }

    #[test]
    fn test_duplicate_method_ids_rejected() {
        let result = CaseEvaluator::new(
            "fw",
            "context",
            vec![
                adapter("context", Ok("x")),
                adapter("profile", Ok("y")),
                adapter("profile", Ok("z")),
            ],
            Arc::new(MockSimilarityJudge::new()),
            options(1000),
        );
        match result {
            Err(err @ EvalError::DuplicateMethod { .. }) => {
                assert!(err.is_configuration());
                assert!(err.to_string().contains("'profile'"));
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("duplicate method ids accepted"),
        }
    }

    #[tokio::test]
    async fn test_case_order_is_preserved() {
        let mut judge = MockSimilarityJudge::new();
        judge.expect_score().returning(|query, _, _, _| {
            Ok(format!("评分: {}", query.len()))
        });

        let evaluator = CaseEvaluator::new(
            "fw",
            "context",
            vec![adapter("context", Ok("x")), adapter("profile", Ok("y"))],
            Arc::new(judge),
            options(1000),
        )
        .unwrap();

        let cases = vec![
            TestCase::new("a", "e"),
            TestCase::new("abc", "e"),
            TestCase::new("ab", "e"),
        ];
        let evals = evaluator.evaluate_cases(&cases).await.unwrap();
        let scores: Vec<f64> = evals.iter().map(|e| e.core_method_score).collect();
        assert_eq!(scores, vec![1.0, 3.0, 2.0]);
        for eval in &evals {
            let ids: Vec<&str> = eval.results.iter().map(|r| r.method_id.as_str()).collect();
            assert_eq!(ids, vec!["context", "profile"]);
        }
    }
}
