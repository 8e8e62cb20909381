use serde::{Deserialize, Serialize};

use super::WinnerWeights;
use crate::conversation::ConversationSummary;
use crate::evaluation::FrameworkAggregate;
use crate::stats::approx_eq;

/// A category of the overall winner vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    /// Judge scores plus conversation quality.
    Quality,
    /// Latency overhead and memory use.
    Performance,
    /// Relevance and consistency of the retrieved memory.
    MemoryEffectiveness,
    /// Engagement, response length and response time.
    UserExperience,
}

impl Bucket {
    /// Display name used in reports.
    pub fn label(&self) -> &'static str {
        match self {
            Bucket::Quality => "回复质量",
            Bucket::Performance => "性能",
            Bucket::MemoryEffectiveness => "记忆有效性",
            Bucket::UserExperience => "用户体验",
        }
    }

    fn weight(&self, weights: &WinnerWeights) -> f64 {
        match self {
            Bucket::Quality => weights.quality,
            Bucket::Performance => weights.performance,
            Bucket::MemoryEffectiveness => weights.memory_effectiveness,
            Bucket::UserExperience => weights.user_experience,
        }
    }
}

/// Side of a two-framework comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// The first framework passed to the comparison.
    A,
    /// The second framework.
    B,
}

/// One metric compared between the two frameworks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricVote {
    /// Metric name.
    pub metric: String,
    /// Value for side A.
    pub value_a: f64,
    /// Value for side B.
    pub value_b: f64,
    /// Whether the smaller value wins.
    pub lower_is_better: bool,
    /// `None` on a tie.
    pub winner: Option<Side>,
}

impl MetricVote {
    fn new(metric: &str, value_a: f64, value_b: f64, lower_is_better: bool) -> Self {
        let winner = if approx_eq(value_a, value_b) {
            None
        } else if (value_a > value_b) != lower_is_better {
            Some(Side::A)
        } else {
            Some(Side::B)
        };
        Self {
            metric: metric.to_string(),
            value_a,
            value_b,
            lower_is_better,
            winner,
        }
    }

    fn higher(metric: &str, value_a: f64, value_b: f64) -> Self {
        Self::new(metric, value_a, value_b, false)
    }

    fn lower(metric: &str, value_a: f64, value_b: f64) -> Self {
        Self::new(metric, value_a, value_b, true)
    }
}

/// A bucket's metrics and the weight it actually carried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketVote {
    /// The category voted on.
    pub bucket: Bucket,
    /// Weight after redistribution over the buckets with data.
    pub effective_weight: f64,
    /// Metric votes that decide the bucket.
    pub metrics: Vec<MetricVote>,
    /// Weight credited to A.
    pub score_a: f64,
    /// Weight credited to B.
    pub score_b: f64,
}

impl BucketVote {
    /// Side winning the majority of the bucket's metrics, `None` on a tie.
    /// Independent of the weight, so a zero-weight bucket still reports it.
    pub fn winner(&self) -> Option<Side> {
        majority(&self.metrics)
    }
}

/// Result of the weighted vote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WinnerVote {
    /// Buckets in vote order, quality first.
    pub buckets: Vec<BucketVote>,
    /// Sum of A's bucket scores.
    pub score_a: f64,
    /// Sum of B's bucket scores.
    pub score_b: f64,
    /// A wins ties.
    pub winner: Side,
    /// `|a - b| / (a + b)`, in [0, 1].
    pub confidence: f64,
}

fn quality_metrics(
    a: &FrameworkAggregate,
    b: &FrameworkAggregate,
    conversations: Option<(&ConversationSummary, &ConversationSummary)>,
) -> Vec<MetricVote> {
    let mut metrics = vec![
        MetricVote::higher("overall_average", a.overall_average, b.overall_average),
        MetricVote::higher(
            "core_method_average",
            a.core_method_average,
            b.core_method_average,
        ),
    ];
    if let Some((ca, cb)) = conversations {
        if ca.impact.is_comparable() && cb.impact.is_comparable() {
            metrics.push(MetricVote::higher(
                "quality_improvement",
                ca.impact.quality_improvement,
                cb.impact.quality_improvement,
            ));
        }
        metrics.push(MetricVote::higher(
            "avg_quality_with_memory",
            ca.impact.avg_quality_with_memory,
            cb.impact.avg_quality_with_memory,
        ));
        metrics.push(MetricVote::higher(
            "conversation_overall",
            ca.evaluation.overall_score,
            cb.evaluation.overall_score,
        ));
    }
    metrics
}

fn performance_metrics(ca: &ConversationSummary, cb: &ConversationSummary) -> Vec<MetricVote> {
    let mut metrics = Vec::new();
    if ca.impact.is_comparable() && cb.impact.is_comparable() {
        metrics.push(MetricVote::lower(
            "time_overhead",
            ca.impact.time_overhead,
            cb.impact.time_overhead,
        ));
    }
    metrics.push(MetricVote::higher(
        "memory_utilization",
        ca.impact.memory_utilization_rate,
        cb.impact.memory_utilization_rate,
    ));
    metrics.push(MetricVote::higher(
        "length_difference",
        ca.impact.length_difference,
        cb.impact.length_difference,
    ));
    metrics
}

fn memory_metrics(ca: &ConversationSummary, cb: &ConversationSummary) -> Vec<MetricVote> {
    vec![
        MetricVote::higher(
            "memory_relevance",
            ca.impact.memory_relevance_score,
            cb.impact.memory_relevance_score,
        ),
        MetricVote::higher(
            "memory_consistency",
            ca.impact.memory_consistency_score,
            cb.impact.memory_consistency_score,
        ),
        MetricVote::higher(
            "utilization_efficiency",
            ca.impact.utilization_efficiency(),
            cb.impact.utilization_efficiency(),
        ),
    ]
}

fn experience_metrics(ca: &ConversationSummary, cb: &ConversationSummary) -> Vec<MetricVote> {
    vec![
        MetricVote::higher(
            "engagement",
            ca.experience.engagement,
            cb.experience.engagement,
        ),
        MetricVote::higher(
            "avg_response_length",
            ca.experience.avg_response_length,
            cb.experience.avg_response_length,
        ),
        MetricVote::higher(
            "time_satisfaction",
            ca.experience.time_satisfaction,
            cb.experience.time_satisfaction,
        ),
    ]
}

/// Side winning more of `metrics`; `None` when both win equally often.
fn majority(metrics: &[MetricVote]) -> Option<Side> {
    let wins = |side: Side| metrics.iter().filter(|m| m.winner == Some(side)).count();
    let (a, b) = (wins(Side::A), wins(Side::B));
    match a.cmp(&b) {
        std::cmp::Ordering::Greater => Some(Side::A),
        std::cmp::Ordering::Less => Some(Side::B),
        std::cmp::Ordering::Equal => None,
    }
}

/// Run the weighted vote. Quality is always available; the other buckets
/// need conversation summaries for both frameworks.
pub fn weighted_vote(
    a: &FrameworkAggregate,
    b: &FrameworkAggregate,
    conversations: Option<(&ConversationSummary, &ConversationSummary)>,
    weights: &WinnerWeights,
) -> WinnerVote {
    let mut raw = vec![(Bucket::Quality, quality_metrics(a, b, conversations))];
    if let Some((ca, cb)) = conversations {
        raw.push((Bucket::Performance, performance_metrics(ca, cb)));
        raw.push((Bucket::MemoryEffectiveness, memory_metrics(ca, cb)));
        raw.push((Bucket::UserExperience, experience_metrics(ca, cb)));
    }

    let available: f64 = raw.iter().map(|(bucket, _)| bucket.weight(weights)).sum();

    let buckets: Vec<BucketVote> = raw
        .into_iter()
        .map(|(bucket, metrics)| {
            let effective_weight = if available > 0.0 {
                bucket.weight(weights) / available
            } else {
                0.0
            };
            // Winner takes the whole bucket weight; a tied bucket is split.
            let (score_a, score_b) = match majority(&metrics) {
                Some(Side::A) => (effective_weight, 0.0),
                Some(Side::B) => (0.0, effective_weight),
                None => (effective_weight / 2.0, effective_weight / 2.0),
            };
            BucketVote {
                bucket,
                effective_weight,
                metrics,
                score_a,
                score_b,
            }
        })
        .collect();

    let score_a: f64 = buckets.iter().map(|b| b.score_a).sum();
    let score_b: f64 = buckets.iter().map(|b| b.score_b).sum();
    let total = score_a + score_b;
    let confidence = if total > 0.0 {
        ((score_a - score_b).abs() / total).clamp(0.0, 1.0)
    } else {
        0.0
    };
    // Ties (including float noise) go to A.
    let winner = if score_b > score_a && !approx_eq(score_a, score_b) {
        Side::B
    } else {
        Side::A
    };

    WinnerVote {
        buckets,
        score_a,
        score_b,
        winner,
        confidence: if approx_eq(score_a, score_b) { 0.0 } else { confidence },
    }
}
