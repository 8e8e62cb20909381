use std::time::Instant;

use tokio::sync::watch;
use tracing::{info, warn};

use super::{CaseEvaluator, FrameworkAggregate};
use crate::corpus::ScenarioCorpus;
use crate::error::{EvalError, EvalResult};

/// Receiver side of a run cancellation signal. `true` means stop.
pub type CancelSignal = watch::Receiver<bool>;

/// Create a cancellation channel. Send `true` to stop a run at the next
/// scenario boundary.
pub fn cancellation() -> (watch::Sender<bool>, CancelSignal) {
    watch::channel(false)
}

/// Drives a [`CaseEvaluator`] over every scenario of a corpus, one scenario
/// at a time, and aggregates the framework.
pub struct FrameworkRunner {
    evaluator: CaseEvaluator,
    cancel: Option<CancelSignal>,
}

impl FrameworkRunner {
    /// Create a runner.
    pub fn new(evaluator: CaseEvaluator) -> Self {
        Self {
            evaluator,
            cancel: None,
        }
    }

    /// Attach a cancellation signal, checked between scenarios.
    pub fn with_cancellation(mut self, cancel: CancelSignal) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }

    /// Evaluate the whole corpus.
    pub async fn run(&self, corpus: &ScenarioCorpus) -> EvalResult<FrameworkAggregate> {
        let framework = self.evaluator.framework();
        let started = Instant::now();
        let mut scenarios = Vec::with_capacity(corpus.scenarios().len());

        info!(
            framework = %framework,
            corpus = %corpus.name(),
            scenarios = corpus.scenarios().len(),
            cases = corpus.case_count(),
            "Starting framework evaluation"
        );

        for scenario in corpus.scenarios() {
            if self.is_cancelled() {
                warn!(framework = %framework, completed = scenarios.len(), "Run cancelled");
                return Err(EvalError::Cancelled {
                    framework: framework.to_string(),
                    completed: scenarios.len(),
                });
            }

            let aggregate = self.evaluator.evaluate_scenario(scenario).await?;
            info!(
                framework = %framework,
                scenario = %scenario.name,
                overall = aggregate.overall_average,
                core = aggregate.core_method_average(),
                "Scenario evaluated"
            );
            scenarios.push(aggregate);
        }

        let aggregate = FrameworkAggregate::from_scenarios(
            framework,
            self.evaluator.core_method_id(),
            scenarios,
        )?;

        info!(
            framework = %framework,
            overall = aggregate.overall_average,
            core = aggregate.core_method_average,
            failures = aggregate.failure_count(),
            elapsed_ms = started.elapsed().as_millis(),
            "Framework evaluation complete"
        );
        Ok(aggregate)
    }
}
