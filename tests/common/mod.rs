//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use memory_bench::corpus::TestCase;
use memory_bench::evaluation::{
    CaseEvaluation, FrameworkAggregate, MethodOutcome, MethodResult, ScenarioAggregate,
};

/// One case per scenario; every listed method gets the given score.
pub fn aggregate(
    framework: &str,
    core_method: &str,
    scenarios: &[(&str, Vec<(&str, f64)>)],
) -> FrameworkAggregate {
    let scenarios = scenarios
        .iter()
        .map(|(scenario, scores)| {
            let results = scores
                .iter()
                .map(|(method, score)| {
                    MethodResult::new(
                        *method,
                        format!("{} 检索内容", method),
                        *score,
                        format!("评分: {}", score),
                        MethodOutcome::Scored,
                    )
                })
                .collect();
            let case = CaseEvaluation::new(
                framework,
                TestCase::new(format!("{} 的问题", scenario), "预期答案"),
                results,
                core_method,
            )
            .expect("core method present");
            ScenarioAggregate::from_cases(*scenario, vec![case]).expect("non-empty scenario")
        })
        .collect();

    FrameworkAggregate::from_scenarios(framework, core_method, scenarios)
        .expect("valid aggregate")
}
