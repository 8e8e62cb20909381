//! Scenario and framework aggregates.
//!
//! Aggregates are pure functions of their inputs: they are built once from
//! case evaluations and never edited. Re-running produces a new tree.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use super::CaseEvaluation;
use crate::error::{EvalError, EvalResult};
use crate::stats::{approx_eq, mean};

/// Per-method averages over a set of cases. Each method is averaged only
/// over the cases where it was invoked.
pub fn method_averages<'a, I>(cases: I) -> BTreeMap<String, f64>
where
    I: IntoIterator<Item = &'a CaseEvaluation>,
{
    let mut sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for case in cases {
        for result in &case.results {
            let entry = sums.entry(result.method_id.clone()).or_insert((0.0, 0));
            entry.0 += result.score;
            entry.1 += 1;
        }
    }
    sums.into_iter()
        .map(|(method, (sum, count))| (method, sum / count as f64))
        .collect()
}

/// Aggregate of one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioAggregate {
    /// Scenario name.
    pub scenario_name: String,
    /// Case evaluations in corpus order.
    pub case_evaluations: Vec<CaseEvaluation>,
    /// Mean score per method across this scenario's cases.
    pub per_method_average: BTreeMap<String, f64>,
    /// Mean of the case overall averages.
    pub overall_average: f64,
}

impl ScenarioAggregate {
    /// Aggregate a scenario. Zero cases is an error, not a zero average.
    pub fn from_cases(
        scenario_name: impl Into<String>,
        case_evaluations: Vec<CaseEvaluation>,
    ) -> EvalResult<Self> {
        let scenario_name = scenario_name.into();
        let overall_average =
            Self::overall_of(&case_evaluations).ok_or_else(|| EvalError::EmptyScenario {
                scenario: scenario_name.clone(),
            })?;

        Ok(Self {
            per_method_average: method_averages(&case_evaluations),
            scenario_name,
            case_evaluations,
            overall_average,
        })
    }

    fn overall_of(cases: &[CaseEvaluation]) -> Option<f64> {
        let overalls: Vec<f64> = cases.iter().map(|c| c.overall_average).collect();
        mean(&overalls)
    }

    /// Recompute the overall average from the stored case evaluations.
    pub fn recompute_overall_average(&self) -> f64 {
        Self::overall_of(&self.case_evaluations).unwrap_or(0.0)
    }

    /// Mean core method score across the scenario's cases.
    pub fn core_method_average(&self) -> f64 {
        let scores: Vec<f64> = self
            .case_evaluations
            .iter()
            .map(|c| c.core_method_score)
            .collect();
        mean(&scores).unwrap_or(0.0)
    }

    /// Case with the highest overall average (first on ties).
    pub fn best_case(&self) -> Option<&CaseEvaluation> {
        self.case_evaluations.iter().reduce(|best, c| {
            if c.overall_average > best.overall_average {
                c
            } else {
                best
            }
        })
    }

    /// Case with the lowest overall average (first on ties).
    pub fn worst_case(&self) -> Option<&CaseEvaluation> {
        self.case_evaluations.iter().reduce(|worst, c| {
            if c.overall_average < worst.overall_average {
                c
            } else {
                worst
            }
        })
    }
}

/// Aggregate of one framework across all scenarios.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameworkAggregate {
    /// Framework name.
    pub framework_name: String,
    /// Core method id used for cross-framework comparison.
    pub core_method_id: String,
    /// Scenario aggregates keyed by scenario name.
    pub scenario_aggregates: BTreeMap<String, ScenarioAggregate>,
    /// Mean score per method across every case of the framework.
    pub per_method_average: BTreeMap<String, f64>,
    /// Mean of scenario overall averages (equal weight per scenario).
    pub overall_average: f64,
    /// Mean core method score across every case.
    pub core_method_average: f64,
    /// Union of method ids observed in the results.
    pub methods_tested: BTreeSet<String>,
    /// Number of evaluated cases.
    pub total_cases: usize,
}

impl FrameworkAggregate {
    /// Aggregate a framework from its scenario aggregates.
    pub fn from_scenarios(
        framework_name: impl Into<String>,
        core_method_id: impl Into<String>,
        scenarios: Vec<ScenarioAggregate>,
    ) -> EvalResult<Self> {
        let framework_name = framework_name.into();
        let core_method_id = core_method_id.into();

        if scenarios.is_empty() {
            return Err(EvalError::NoScenarios {
                framework: framework_name,
            });
        }

        let mut scenario_aggregates = BTreeMap::new();
        for scenario in scenarios {
            if scenario_aggregates.contains_key(&scenario.scenario_name) {
                return Err(EvalError::DuplicateScenario {
                    name: scenario.scenario_name,
                });
            }
            scenario_aggregates.insert(scenario.scenario_name.clone(), scenario);
        }

        let derived = Derived::compute(&scenario_aggregates);
        if !derived.methods_tested.contains(&core_method_id) {
            return Err(EvalError::MissingCoreMethod {
                framework: framework_name,
                method_id: core_method_id,
            });
        }

        let aggregate = Self {
            framework_name,
            core_method_id,
            scenario_aggregates,
            per_method_average: derived.per_method_average,
            overall_average: derived.overall_average,
            core_method_average: derived.core_method_average,
            methods_tested: derived.methods_tested,
            total_cases: derived.total_cases,
        };
        debug_assert!(aggregate.validate().is_ok());
        Ok(aggregate)
    }

    /// Re-derive every computed field and fail on any mismatch. Used on
    /// aggregates loaded from disk or history, and asserted in debug builds
    /// at construction.
    pub fn validate(&self) -> EvalResult<()> {
        let violation = |message: String| Err(EvalError::InvariantViolation { message });

        if self.scenario_aggregates.is_empty() {
            return violation(format!("{} has no scenarios", self.framework_name));
        }

        for (name, scenario) in &self.scenario_aggregates {
            if name != &scenario.scenario_name {
                return violation(format!(
                    "scenario keyed as '{}' is named '{}'",
                    name, scenario.scenario_name
                ));
            }
            if !approx_eq(scenario.overall_average, scenario.recompute_overall_average()) {
                return violation(format!("overall_average of '{}' is stale", name));
            }
            if method_averages(&scenario.case_evaluations) != scenario.per_method_average {
                return violation(format!("per_method_average of '{}' is stale", name));
            }
        }

        let derived = Derived::compute(&self.scenario_aggregates);
        if derived.methods_tested != self.methods_tested {
            return violation(format!(
                "methods_tested {:?} does not match observed {:?}",
                self.methods_tested, derived.methods_tested
            ));
        }
        if !approx_eq(derived.overall_average, self.overall_average)
            || !approx_eq(derived.core_method_average, self.core_method_average)
        {
            return violation(format!("averages of {} are stale", self.framework_name));
        }
        if derived.total_cases != self.total_cases {
            return violation(format!("total_cases of {} is stale", self.framework_name));
        }
        Ok(())
    }

    /// Scenario names in key order.
    pub fn scenario_names(&self) -> BTreeSet<&str> {
        self.scenario_aggregates.keys().map(String::as_str).collect()
    }

    /// Methods other than the core method.
    pub fn specialized_methods(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.per_method_average
            .iter()
            .filter(move |(id, _)| **id != self.core_method_id)
    }

    /// Number of degraded method results across the framework.
    pub fn failure_count(&self) -> usize {
        self.scenario_aggregates
            .values()
            .flat_map(|s| &s.case_evaluations)
            .map(CaseEvaluation::failure_count)
            .sum()
    }
}

struct Derived {
    per_method_average: BTreeMap<String, f64>,
    overall_average: f64,
    core_method_average: f64,
    methods_tested: BTreeSet<String>,
    total_cases: usize,
}

impl Derived {
    fn compute(scenarios: &BTreeMap<String, ScenarioAggregate>) -> Self {
        let cases: Vec<&CaseEvaluation> = scenarios
            .values()
            .flat_map(|s| s.case_evaluations.iter())
            .collect();

        let overalls: Vec<f64> = scenarios.values().map(|s| s.overall_average).collect();
        let core_scores: Vec<f64> = cases.iter().map(|c| c.core_method_score).collect();
        let methods: HashSet<&str> = cases
            .iter()
            .flat_map(|c| c.results.iter().map(|r| r.method_id.as_str()))
            .collect();

        Self {
            per_method_average: method_averages(cases.iter().copied()),
            overall_average: mean(&overalls).unwrap_or(0.0),
            core_method_average: mean(&core_scores).unwrap_or(0.0),
            methods_tested: methods.into_iter().map(str::to_string).collect(),
            total_cases: cases.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::TestCase;
    use crate::evaluation::{MethodOutcome, MethodResult};
    use pretty_assertions::assert_eq;

    fn case(scores: &[(&str, f64)]) -> CaseEvaluation {
        let results = scores
            .iter()
            .map(|(id, s)| MethodResult::new(*id, "c", *s, "评分", MethodOutcome::Scored))
            .collect();
        CaseEvaluation::new("fw", TestCase::new("q", "e"), results, "m1").unwrap()
    }

    #[test]
    fn test_scenario_two_cases_two_methods() {
        let scenario = ScenarioAggregate::from_cases(
            "prefs",
            vec![
                case(&[("m1", 8.0), ("m2", 6.0)]),
                case(&[("m1", 4.0), ("m2", 10.0)]),
            ],
        )
        .unwrap();

        let expected: BTreeMap<String, f64> =
            [("m1".to_string(), 6.0), ("m2".to_string(), 8.0)].into_iter().collect();
        assert_eq!(scenario.per_method_average, expected);
        assert_eq!(scenario.overall_average, 7.0);
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let scenario = ScenarioAggregate::from_cases(
            "s",
            vec![case(&[("m1", 3.3), ("m2", 7.1)]), case(&[("m1", 9.9), ("m2", 0.4)])],
        )
        .unwrap();
        let first = scenario.recompute_overall_average();
        let second = scenario.recompute_overall_average();
        assert_eq!(first, second);
        assert_eq!(first, scenario.overall_average);
    }

    #[test]
    fn test_empty_scenario_is_error() {
        let err = ScenarioAggregate::from_cases("empty", vec![]).unwrap_err();
        assert!(matches!(err, EvalError::EmptyScenario { .. }));
    }

    #[test]
    fn test_per_method_average_ignores_missing_methods() {
        let scenario = ScenarioAggregate::from_cases(
            "s",
            vec![case(&[("m1", 4.0), ("m2", 2.0)]), case(&[("m1", 6.0)])],
        )
        .unwrap();
        assert_eq!(scenario.per_method_average["m2"], 2.0);
        assert_eq!(scenario.per_method_average["m1"], 5.0);
    }

    #[test]
    fn test_framework_perfect_and_zero_method() {
        let scenarios = vec![
            ScenarioAggregate::from_cases("a", vec![case(&[("m1", 10.0), ("m2", 0.0)])]).unwrap(),
            ScenarioAggregate::from_cases(
                "b",
                vec![
                    case(&[("m1", 10.0), ("m2", 0.0)]),
                    case(&[("m1", 10.0), ("m2", 0.0)]),
                ],
            )
            .unwrap(),
        ];
        let framework = FrameworkAggregate::from_scenarios("fw", "m1", scenarios).unwrap();
        assert_eq!(framework.overall_average, 5.0);
        assert_eq!(framework.per_method_average["m1"], 10.0);
        assert_eq!(framework.per_method_average["m2"], 0.0);
        assert_eq!(framework.core_method_average, 10.0);
        assert_eq!(framework.total_cases, 3);
        assert!(framework.validate().is_ok());
    }

    #[test]
    fn test_framework_weights_scenarios_equally() {
        let scenarios = vec![
            ScenarioAggregate::from_cases("small", vec![case(&[("m1", 2.0)])]).unwrap(),
            ScenarioAggregate::from_cases(
                "large",
                vec![case(&[("m1", 8.0)]), case(&[("m1", 8.0)]), case(&[("m1", 8.0)])],
            )
            .unwrap(),
        ];
        let framework = FrameworkAggregate::from_scenarios("fw", "m1", scenarios).unwrap();
        assert_eq!(framework.overall_average, 5.0);
        // Per-method averages are per case.
        assert_eq!(framework.per_method_average["m1"], 6.5);
    }

    #[test]
    fn test_framework_empty_is_error() {
        let err = FrameworkAggregate::from_scenarios("fw", "m1", vec![]).unwrap_err();
        assert!(matches!(err, EvalError::NoScenarios { .. }));
    }

    #[test]
    fn test_validate_detects_tampered_methods() {
        let scenarios =
            vec![ScenarioAggregate::from_cases("a", vec![case(&[("m1", 5.0)])]).unwrap()];
        let mut framework = FrameworkAggregate::from_scenarios("fw", "m1", scenarios).unwrap();
        framework.methods_tested.insert("ghost".to_string());
        let err = framework.validate().unwrap_err();
        assert!(matches!(err, EvalError::InvariantViolation { .. }));
    }

    #[test]
    fn test_best_and_worst_case() {
        let scenario = ScenarioAggregate::from_cases(
            "s",
            vec![case(&[("m1", 5.0)]), case(&[("m1", 9.0)]), case(&[("m1", 1.0)])],
        )
        .unwrap();
        assert_eq!(scenario.best_case().map(|c| c.overall_average), Some(9.0));
        assert_eq!(scenario.worst_case().map(|c| c.overall_average), Some(1.0));
    }
}
