//! Head-to-head comparison of two framework aggregates.
//!
//! The comparison has four layers: the core method duel, a ranking of every
//! specialized method, a per-scenario method matrix, and a weighted vote over
//! retrieval quality and (when transcripts were supplied) the conversation
//! track. Narrative recommendations are derived from fixed thresholds only.

mod vote;
mod weights;

pub use vote::*;
pub use weights::*;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::conversation::ConversationSummary;
use crate::error::{EvalError, EvalResult};
use crate::evaluation::FrameworkAggregate;

/// Recommendation lines kept in a comparison.
pub const MAX_RECOMMENDATIONS: usize = 8;

/// How far apart two core method averages are on the 0–10 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapClass {
    /// Gap above 1.0.
    Significant,
    /// Gap in [0.5, 1.0].
    Moderate,
    /// Gap below 0.5.
    Comparable,
}

impl GapClass {
    /// Classify a gap with the fixed threshold table.
    pub fn classify(gap: f64) -> Self {
        if gap > 1.0 {
            GapClass::Significant
        } else if gap >= 0.5 {
            GapClass::Moderate
        } else {
            GapClass::Comparable
        }
    }

    /// Report label with the gap range.
    pub fn label(&self) -> &'static str {
        match self {
            GapClass::Significant => "显著差异 (>1.0分)",
            GapClass::Moderate => "中等差异 (0.5-1.0分)",
            GapClass::Comparable => "性能相当 (<0.5分)",
        }
    }
}

impl std::fmt::Display for GapClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GapClass::Significant => write!(f, "significant"),
            GapClass::Moderate => write!(f, "moderate"),
            GapClass::Comparable => write!(f, "comparable"),
        }
    }
}

/// Core method duel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreComparison {
    /// Core method of framework A.
    pub core_method_a: String,
    /// Core method of framework B.
    pub core_method_b: String,
    /// Core method average of A.
    pub score_a: f64,
    /// Core method average of B.
    pub score_b: f64,
    /// Framework with the larger core average; A on a tie.
    pub winner: String,
    /// Absolute difference of the core averages.
    pub gap: f64,
    /// Size class of `gap`.
    pub class: GapClass,
    /// `gap / 10 × 100`.
    pub advantage_percentage: f64,
}

/// A method score attributed to its framework.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedMethod {
    /// Owning framework.
    pub framework: String,
    /// Method id.
    pub method_id: String,
    /// Average judge score.
    pub score: f64,
}

impl RankedMethod {
    fn new(framework: &str, method_id: &str, score: f64) -> Self {
        Self {
            framework: framework.to_string(),
            method_id: method_id.to_string(),
            score,
        }
    }
}

/// Score descending, then method id, then framework.
fn rank(methods: &mut [RankedMethod]) {
    methods.sort_by(|x, y| {
        y.score
            .total_cmp(&x.score)
            .then_with(|| x.method_id.cmp(&y.method_id))
            .then_with(|| x.framework.cmp(&y.framework))
    });
}

/// One cell of the scenario/method matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixEntry {
    /// Owning framework.
    pub framework: String,
    /// Method id.
    pub method_id: String,
    /// Scenario average of the method.
    pub score: f64,
    /// From the expected fitness table, when one was supplied and lists the
    /// method.
    pub expected_fitness: Option<f64>,
}

/// All methods of both frameworks in one shared scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRow {
    /// Ranked like the specialized method list.
    pub entries: Vec<MatrixEntry>,
    /// Top entry, `None` for an empty row.
    pub best: Option<RankedMethod>,
}

/// Full comparison of two frameworks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    /// Name of framework A.
    pub framework_a: String,
    /// Name of framework B.
    pub framework_b: String,
    /// Core method duel.
    pub core: CoreComparison,
    /// Every non-core method of both frameworks.
    pub specialized_method_ranking: Vec<RankedMethod>,
    /// Per shared scenario, every method of both frameworks.
    pub scenario_method_matrix: BTreeMap<String, ScenarioRow>,
    /// Weighted bucket vote.
    pub vote: WinnerVote,
    /// Name of the vote winner.
    pub overall_winner: String,
    /// Vote confidence in [0, 1].
    pub overall_confidence: f64,
    /// Ranked advice for choosing between the frameworks.
    pub recommendations: Vec<String>,
}

impl ComparisonResult {
    /// Core method winner (same as `core.winner`).
    pub fn core_method_winner(&self) -> &str {
        &self.core.winner
    }

    /// Core method gap (same as `core.gap`).
    pub fn core_method_gap(&self) -> f64 {
        self.core.gap
    }

    /// Top of the specialized ranking.
    pub fn best_specialized_method(&self) -> Option<&RankedMethod> {
        self.specialized_method_ranking.first()
    }

    fn side_name(&self, side: Side) -> &str {
        match side {
            Side::A => &self.framework_a,
            Side::B => &self.framework_b,
        }
    }
}

/// Compares two framework aggregates.
#[derive(Debug, Clone, Default)]
pub struct ComparativeAnalyzer {
    weights: WinnerWeights,
    expected_fitness: Option<ExpectedFitness>,
}

impl ComparativeAnalyzer {
    /// Create an analyzer with vote weights and an optional fitness table.
    pub fn new(weights: WinnerWeights, expected_fitness: Option<ExpectedFitness>) -> Self {
        Self {
            weights,
            expected_fitness,
        }
    }

    /// Vote weights in use.
    pub fn weights(&self) -> &WinnerWeights {
        &self.weights
    }

    /// Compare `a` with `b`, optionally with both frameworks' conversation
    /// summaries. Frameworks sharing no scenario cannot be compared.
    pub fn compare(
        &self,
        a: &FrameworkAggregate,
        b: &FrameworkAggregate,
        conversations: Option<(&ConversationSummary, &ConversationSummary)>,
    ) -> EvalResult<ComparisonResult> {
        let shared: BTreeSet<&str> = a
            .scenario_names()
            .intersection(&b.scenario_names())
            .copied()
            .collect();
        if shared.is_empty() {
            return Err(EvalError::DisjointScenarios {
                framework_a: a.framework_name.clone(),
                framework_b: b.framework_name.clone(),
            });
        }

        let core = core_comparison(a, b);
        let specialized_method_ranking = specialized_ranking(a, b);
        let scenario_method_matrix = shared
            .iter()
            .map(|scenario| (scenario.to_string(), self.scenario_row(a, b, scenario)))
            .collect();
        let vote = weighted_vote(a, b, conversations, &self.weights);

        let mut result = ComparisonResult {
            framework_a: a.framework_name.clone(),
            framework_b: b.framework_name.clone(),
            core,
            specialized_method_ranking,
            scenario_method_matrix,
            overall_winner: String::new(),
            overall_confidence: vote.confidence,
            vote,
            recommendations: Vec::new(),
        };
        result.overall_winner = result.side_name(result.vote.winner).to_string();
        result.recommendations = recommendations(&result, conversations);

        info!(
            framework_a = %result.framework_a,
            framework_b = %result.framework_b,
            shared_scenarios = shared.len(),
            core_winner = %result.core.winner,
            core_gap = result.core.gap,
            winner = %result.overall_winner,
            confidence = result.overall_confidence,
            "Comparison complete"
        );
        Ok(result)
    }

    fn scenario_row(&self, a: &FrameworkAggregate, b: &FrameworkAggregate, scenario: &str) -> ScenarioRow {
        let mut entries: Vec<MatrixEntry> = [a, b]
            .iter()
            .filter_map(|fw| {
                fw.scenario_aggregates
                    .get(scenario)
                    .map(|agg| (fw.framework_name.as_str(), agg))
            })
            .flat_map(|(framework, agg)| {
                agg.per_method_average.iter().map(move |(method, score)| MatrixEntry {
                    framework: framework.to_string(),
                    method_id: method.clone(),
                    score: *score,
                    expected_fitness: None,
                })
            })
            .collect();

        if let Some(table) = &self.expected_fitness {
            for entry in &mut entries {
                if table.knows(&entry.method_id) {
                    entry.expected_fitness = Some(table.fitness(&entry.method_id, scenario));
                }
            }
        }

        entries.sort_by(|x, y| {
            y.score
                .total_cmp(&x.score)
                .then_with(|| x.method_id.cmp(&y.method_id))
                .then_with(|| x.framework.cmp(&y.framework))
        });
        let best = entries
            .first()
            .map(|e| RankedMethod::new(&e.framework, &e.method_id, e.score));
        ScenarioRow { entries, best }
    }
}

fn core_comparison(a: &FrameworkAggregate, b: &FrameworkAggregate) -> CoreComparison {
    let gap = (a.core_method_average - b.core_method_average).abs();
    let winner = if b.core_method_average > a.core_method_average {
        &b.framework_name
    } else {
        &a.framework_name
    };
    CoreComparison {
        core_method_a: a.core_method_id.clone(),
        core_method_b: b.core_method_id.clone(),
        score_a: a.core_method_average,
        score_b: b.core_method_average,
        winner: winner.clone(),
        gap,
        class: GapClass::classify(gap),
        advantage_percentage: gap / 10.0 * 100.0,
    }
}

fn specialized_ranking(a: &FrameworkAggregate, b: &FrameworkAggregate) -> Vec<RankedMethod> {
    let mut ranking: Vec<RankedMethod> = [a, b]
        .iter()
        .flat_map(|fw| {
            fw.specialized_methods()
                .map(move |(method, score)| RankedMethod::new(&fw.framework_name, method, *score))
        })
        .collect();
    rank(&mut ranking);
    ranking
}

fn short_scenario(name: &str) -> &str {
    name.split('（').next().unwrap_or(name)
}

fn recommendations(
    result: &ComparisonResult,
    conversations: Option<(&ConversationSummary, &ConversationSummary)>,
) -> Vec<String> {
    let mut out = Vec::new();
    let core = &result.core;

    out.push(match core.class {
        GapClass::Significant => format!(
            "{}的核心方法明显领先（差距 {:.2} 分），通用检索场景优先选择{}",
            core.winner, core.gap, core.winner
        ),
        GapClass::Moderate => format!(
            "{}的核心方法小幅领先（差距 {:.2} 分），可结合专用方法综合考虑",
            core.winner, core.gap
        ),
        GapClass::Comparable => format!(
            "两个框架核心方法表现相当（差距 {:.2} 分），可根据专用方法与接入成本选择",
            core.gap
        ),
    });

    if let Some(best) = result.best_specialized_method() {
        out.push(format!(
            "专用方法中{}的{}表现最佳（{:.2}分），适合作为核心方法的补充",
            best.framework, best.method_id, best.score
        ));
    }

    if let Some((ca, cb)) = conversations {
        out.extend(head_to_head(result, ca, cb));
        for summary in [ca, cb] {
            out.extend(impact_recommendations(summary));
        }
    }

    for (scenario, row) in &result.scenario_method_matrix {
        if let Some(best) = &row.best {
            out.push(format!(
                "{}场景推荐使用{}的{}（{:.1}分）",
                short_scenario(scenario),
                best.framework,
                best.method_id,
                best.score
            ));
        }
    }

    out.truncate(MAX_RECOMMENDATIONS);
    out
}

fn head_to_head(
    result: &ComparisonResult,
    ca: &ConversationSummary,
    cb: &ConversationSummary,
) -> Vec<String> {
    let pick = |a: f64, b: f64, lower_is_better: bool| {
        let a_wins = if lower_is_better { a < b } else { a > b };
        if a_wins {
            &result.framework_a
        } else {
            &result.framework_b
        }
    };

    let mut out = Vec::new();
    let (qa, qb) = (ca.impact.avg_quality_with_memory, cb.impact.avg_quality_with_memory);
    if (qa - qb).abs() > 0.1 {
        out.push(format!("在追求回复质量的场景下，推荐使用{}", pick(qa, qb, false)));
    }
    let (ta, tb) = (ca.experience.avg_response_time, cb.experience.avg_response_time);
    if (ta - tb).abs() > 0.5 {
        out.push(format!("在追求响应速度的场景下，推荐使用{}", pick(ta, tb, true)));
    }
    let (ua, ub) = (ca.impact.memory_utilization_rate, cb.impact.memory_utilization_rate);
    if (ua - ub).abs() > 0.2 {
        out.push(format!("在需要充分利用历史信息的场景下，推荐使用{}", pick(ua, ub, false)));
    }
    let (ra, rb) = (ca.impact.memory_relevance_score, cb.impact.memory_relevance_score);
    if (ra - rb).abs() > 0.15 {
        out.push(format!("在需要精准记忆检索的场景下，推荐使用{}", pick(ra, rb, false)));
    }

    match out.len() {
        0 => out.push("两个框架在对话表现上相近，可根据具体需求选择".to_string()),
        n if n > 2 => out.push("可以考虑在不同场景下混合使用两个框架".to_string()),
        _ => {}
    }
    out
}

fn impact_recommendations(summary: &ConversationSummary) -> Vec<String> {
    let impact = &summary.impact;
    let name = &summary.framework;
    let mut out = Vec::new();

    if impact.is_comparable() {
        if impact.quality_improvement > 0.1 {
            out.push(format!(
                "{}的记忆显著提升了回复质量（+{:.2}）",
                name, impact.quality_improvement
            ));
        } else if impact.quality_improvement < 0.0 {
            out.push(format!(
                "{}的记忆上下文反而降低了回复质量，建议检查检索内容的相关性",
                name
            ));
        }
        if impact.time_overhead > 0.5 {
            out.push(format!(
                "{}的记忆检索带来 {:.2} 秒额外耗时，建议优化检索性能",
                name, impact.time_overhead
            ));
        }
    }
    if impact.memory_relevance_score < 0.5 {
        out.push(format!("{}的记忆相关性偏低，建议优化记忆检索算法", name));
    }
    if impact.memory_utilization_rate < 0.5 {
        out.push(format!("{}的记忆利用率偏低，建议在回复中更多地引用历史信息", name));
    }
    out
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::corpus::TestCase;
    use crate::evaluation::{CaseEvaluation, MethodOutcome, MethodResult, ScenarioAggregate};

    fn framework(name: &str, core: &str, scenarios: &[(&str, &[(&str, f64)])]) -> FrameworkAggregate {
        let aggregates = scenarios
            .iter()
            .map(|(scenario, scores)| {
                let results = scores
                    .iter()
                    .map(|(m, s)| MethodResult::new(*m, "c", *s, "评分: x", MethodOutcome::Scored))
                    .collect();
                let case = CaseEvaluation::new(name, TestCase::new("q", "e"), results, core).unwrap();
                ScenarioAggregate::from_cases(*scenario, vec![case]).unwrap()
            })
            .collect();
        FrameworkAggregate::from_scenarios(name, core, aggregates).unwrap()
    }

    #[test]
    fn test_gap_classes() {
        assert_eq!(GapClass::classify(1.5), GapClass::Significant);
        assert_eq!(GapClass::classify(1.0), GapClass::Moderate);
        assert_eq!(GapClass::classify(0.5), GapClass::Moderate);
        assert_eq!(GapClass::classify(0.49), GapClass::Comparable);
    }

    #[test]
    fn test_core_winner_and_gap() {
        let a = framework("memobase", "context", &[("s1", &[("context", 7.0), ("profile", 6.0)])]);
        let b = framework("memu", "memory_items", &[("s1", &[("memory_items", 5.5)])]);
        let result = ComparativeAnalyzer::default().compare(&a, &b, None).unwrap();

        assert_eq!(result.core_method_winner(), "memobase");
        assert!((result.core_method_gap() - 1.5).abs() < 1e-12);
        assert_eq!(result.core.class, GapClass::Significant);
        assert!((result.core.advantage_percentage - 15.0).abs() < 1e-9);
        assert_eq!(result.overall_winner, "memobase");
    }

    #[test]
    fn test_self_comparison_is_a_draw() {
        let a = framework("memobase", "context", &[("s1", &[("context", 7.0), ("profile", 3.0)])]);
        let result = ComparativeAnalyzer::default().compare(&a, &a, None).unwrap();
        assert_eq!(result.core.gap, 0.0);
        assert_eq!(result.overall_confidence, 0.0);
        assert_eq!(result.core.class, GapClass::Comparable);
    }

    #[test]
    fn test_disjoint_scenarios_rejected() {
        let a = framework("a", "m", &[("s1", &[("m", 5.0)])]);
        let b = framework("b", "m", &[("s2", &[("m", 5.0)])]);
        let err = ComparativeAnalyzer::default().compare(&a, &b, None).unwrap_err();
        assert!(matches!(err, EvalError::DisjointScenarios { .. }));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_specialized_ranking_excludes_core_and_breaks_ties() {
        let a = framework(
            "memobase",
            "context",
            &[("s1", &[("context", 9.0), ("search_event", 6.0), ("profile", 6.0)])],
        );
        let b = framework("memu", "memory_items", &[("s1", &[("memory_items", 5.0), ("clustered", 8.0)])]);
        let result = ComparativeAnalyzer::default().compare(&a, &b, None).unwrap();

        let ids: Vec<&str> = result
            .specialized_method_ranking
            .iter()
            .map(|m| m.method_id.as_str())
            .collect();
        assert_eq!(ids, vec!["clustered", "profile", "search_event"]);
        assert_eq!(result.best_specialized_method().unwrap().framework, "memu");
    }

    #[test]
    fn test_matrix_covers_shared_scenarios_only() {
        let a = framework("a", "context", &[("s1", &[("context", 4.0)]), ("s2", &[("context", 6.0)])]);
        let b = framework("b", "memory_items", &[("s2", &[("memory_items", 7.0)])]);
        let analyzer = ComparativeAnalyzer::new(WinnerWeights::default(), Some(ExpectedFitness::builtin()));
        let result = analyzer.compare(&a, &b, None).unwrap();

        assert_eq!(result.scenario_method_matrix.len(), 1);
        let row = &result.scenario_method_matrix["s2"];
        assert_eq!(row.entries.len(), 2);
        assert_eq!(row.best.as_ref().unwrap().method_id, "memory_items");
        // Unknown scenario falls back to the default fitness.
        assert_eq!(row.entries[0].expected_fitness, Some(DEFAULT_FITNESS));
    }

    #[test]
    fn test_fitness_omitted_without_table() {
        let a = framework("a", "context", &[("s1", &[("context", 4.0)])]);
        let result = ComparativeAnalyzer::default().compare(&a, &a, None).unwrap();
        assert!(result.scenario_method_matrix["s1"]
            .entries
            .iter()
            .all(|e| e.expected_fitness.is_none()));
    }

    #[test]
    fn test_quality_only_vote() {
        let a = framework("a", "m", &[("s1", &[("m", 8.0)])]);
        let b = framework("b", "m", &[("s1", &[("m", 6.0)])]);
        let result = ComparativeAnalyzer::default().compare(&a, &b, None).unwrap();

        assert_eq!(result.vote.buckets.len(), 1);
        assert_eq!(result.vote.buckets[0].effective_weight, 1.0);
        assert_eq!(result.overall_winner, "a");
        assert_eq!(result.overall_confidence, 1.0);
        assert!(result.recommendations.len() <= MAX_RECOMMENDATIONS);
        assert!(result.recommendations[0].contains("明显领先"));
    }
}
