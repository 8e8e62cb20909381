use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::lexicon::{self, char_len, contains_any};
use super::quality::ResponseQualityEvaluator;
use super::types::{ConversationEvaluation, ConversationTurn, MemoryContext, TurnQuality};
use crate::error::{EvalError, EvalResult};
use crate::stats::{jaccard, mean, mean_or_zero};

/// Profile fields compared between adjacent memory contexts.
const PROFILE_KEY_FIELDS: [&str; 3] = ["personality_traits", "communication_style", "concerns"];

/// Quality, latency and content deltas attributable to memory context.
///
/// Turns are partitioned by whether they carried a non-empty memory context.
/// An empty partition averages to 0.0 and sets `partition_imbalanced`; the
/// deltas are then reported but must not be read as a like-for-like
/// comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryImpact {
    /// Number of turns.
    pub total_turns: usize,
    /// Turns with non-empty memory context.
    pub turns_with_memory: usize,
    /// Turns without memory context.
    pub turns_without_memory: usize,
    /// Mean turn score with memory.
    pub avg_quality_with_memory: f64,
    /// Mean turn score without memory.
    pub avg_quality_without_memory: f64,
    /// `avg_quality_with_memory - avg_quality_without_memory`
    pub quality_improvement: f64,
    /// Mean response time with memory, in seconds.
    pub avg_time_with_memory: f64,
    /// Mean response time without memory, in seconds.
    pub avg_time_without_memory: f64,
    /// Seconds added by memory retrieval.
    pub time_overhead: f64,
    /// Mean response length with memory, in characters.
    pub avg_length_with_memory: f64,
    /// Mean response length without memory, in characters.
    pub avg_length_without_memory: f64,
    /// `avg_length_with_memory - avg_length_without_memory`
    pub length_difference: f64,
    /// Mean richness of the supplied contexts and their use, in [0, 1].
    pub memory_relevance_score: f64,
    /// Share of turns with memory context.
    pub memory_utilization_rate: f64,
    /// Agreement between adjacent memory contexts.
    pub memory_consistency_score: f64,
    /// One partition is empty.
    pub partition_imbalanced: bool,
    /// What memory visibly improved.
    pub strengths: Vec<String>,
    /// Observations about the deltas.
    pub insights: Vec<String>,
}

impl MemoryImpact {
    /// Whether the quality and latency deltas compare two populated partitions.
    pub fn is_comparable(&self) -> bool {
        !self.partition_imbalanced
    }

    /// Utilization weighted by relevance.
    pub fn utilization_efficiency(&self) -> f64 {
        self.memory_utilization_rate * self.memory_relevance_score
    }
}

/// Measures how much retrieved memory changes agent turns.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryImpactAssessor;

impl MemoryImpactAssessor {
    /// Create an assessor.
    pub fn new() -> Self {
        Self
    }

    /// Assess a conversation. `qualities` must be the turn qualities of
    /// `turns`, in the same order.
    pub fn assess(
        &self,
        turns: &[ConversationTurn],
        qualities: &[TurnQuality],
    ) -> EvalResult<MemoryImpact> {
        if turns.is_empty() {
            return Err(EvalError::EmptyConversation);
        }
        if turns.len() != qualities.len() {
            return Err(EvalError::InvariantViolation {
                message: format!(
                    "{} turn qualities supplied for {} turns",
                    qualities.len(),
                    turns.len()
                ),
            });
        }

        let (with, without): (Vec<_>, Vec<_>) = turns
            .iter()
            .zip(qualities)
            .partition(|(turn, _)| turn.has_memory());

        let avg_quality_with_memory = side_mean(&with, |_, q| q.overall_score);
        let avg_quality_without_memory = side_mean(&without, |_, q| q.overall_score);
        let avg_time_with_memory = side_mean(&with, |t, _| t.response_time);
        let avg_time_without_memory = side_mean(&without, |t, _| t.response_time);
        let avg_length_with_memory = side_mean(&with, |t, _| char_len(&t.agent_response) as f64);
        let avg_length_without_memory =
            side_mean(&without, |t, _| char_len(&t.agent_response) as f64);

        let memory_turns: Vec<&ConversationTurn> = with.iter().map(|(t, _)| *t).collect();
        let partition_imbalanced = with.is_empty() || without.is_empty();
        if partition_imbalanced {
            warn!(
                with_memory = with.len(),
                without_memory = without.len(),
                "Memory partition is empty on one side; deltas are not comparable"
            );
        }

        let mut impact = MemoryImpact {
            total_turns: turns.len(),
            turns_with_memory: with.len(),
            turns_without_memory: without.len(),
            avg_quality_with_memory,
            avg_quality_without_memory,
            quality_improvement: avg_quality_with_memory - avg_quality_without_memory,
            avg_time_with_memory,
            avg_time_without_memory,
            time_overhead: avg_time_with_memory - avg_time_without_memory,
            avg_length_with_memory,
            avg_length_without_memory,
            length_difference: avg_length_with_memory - avg_length_without_memory,
            memory_relevance_score: memory_relevance(&memory_turns),
            memory_utilization_rate: with.len() as f64 / turns.len() as f64,
            memory_consistency_score: memory_consistency(&memory_turns),
            partition_imbalanced,
            strengths: Vec::new(),
            insights: Vec::new(),
        };
        impact.strengths = strengths(&impact);
        impact.insights = insights(&impact);

        info!(
            turns = impact.total_turns,
            with_memory = impact.turns_with_memory,
            improvement = impact.quality_improvement,
            relevance = impact.memory_relevance_score,
            "Memory impact assessed"
        );
        Ok(impact)
    }
}

/// Mean of `f` over one partition, 0.0 when the partition is empty.
fn side_mean<F>(side: &[(&ConversationTurn, &TurnQuality)], f: F) -> f64
where
    F: Fn(&ConversationTurn, &TurnQuality) -> f64,
{
    let values: Vec<f64> = side.iter().map(|&(t, q)| f(t, q)).collect();
    mean_or_zero(&values)
}

fn memory_relevance(turns: &[&ConversationTurn]) -> f64 {
    let scores: Vec<f64> = turns
        .iter()
        .filter_map(|turn| turn.memory().map(|ctx| (turn, ctx)))
        .map(|(turn, ctx)| {
            let mut score = 0.0;
            if char_len(&ctx.context_summary) > 10 {
                score += 0.3;
            }
            if let Some(relevance) = ctx.mean_relevance() {
                score += relevance * 0.4;
            }
            if ctx.memory_types.len() > 1 {
                score += 0.2;
            }
            if contains_any(&turn.agent_response, lexicon::MEMORY_INDICATORS) {
                score += 0.1;
            }
            f64::min(score, 1.0)
        })
        .collect();
    mean_or_zero(&scores)
}

fn memory_consistency(turns: &[&ConversationTurn]) -> f64 {
    let contexts: Vec<&MemoryContext> = turns.iter().filter_map(|t| t.memory()).collect();
    if contexts.len() < 2 {
        return 1.0;
    }
    let scores: Vec<f64> = contexts
        .windows(2)
        .map(|pair| context_consistency(pair[0], pair[1]))
        .collect();
    mean(&scores).unwrap_or(1.0)
}

fn context_consistency(a: &MemoryContext, b: &MemoryContext) -> f64 {
    let mut score = 0.0;

    if !a.user_profile.is_empty() && !b.user_profile.is_empty() {
        let matches = PROFILE_KEY_FIELDS
            .iter()
            .filter(|field| match (a.user_profile.get(**field), b.user_profile.get(**field)) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            })
            .count();
        score += matches as f64 / PROFILE_KEY_FIELDS.len() as f64 * 0.5;
    }

    let (types_a, types_b): (HashSet<&str>, HashSet<&str>) = (a.type_set(), b.type_set());
    if !types_a.is_empty() && !types_b.is_empty() {
        score += jaccard(&types_a, &types_b) * 0.3;
    }

    if a.total_memories > 0 || b.total_memories > 0 {
        let low = a.total_memories.min(b.total_memories) as f64;
        let high = a.total_memories.max(b.total_memories) as f64;
        score += low / high * 0.2;
    }

    score.min(1.0)
}

fn strengths(impact: &MemoryImpact) -> Vec<String> {
    let mut out = Vec::new();
    if impact.is_comparable() && impact.quality_improvement > 0.1 {
        out.push("显著提升回复质量".to_string());
    }
    if impact.memory_utilization_rate > 0.7 {
        out.push("高效利用历史记忆".to_string());
    }
    if impact.memory_relevance_score > 0.7 {
        out.push("记忆内容高度相关".to_string());
    }
    if impact.memory_consistency_score > 0.8 {
        out.push("记忆使用一致稳定".to_string());
    }
    if impact.is_comparable() && impact.time_overhead < 1.0 {
        out.push("记忆检索性能良好".to_string());
    }
    if impact.is_comparable() && impact.length_difference > 50.0 {
        out.push("记忆增强内容丰富度".to_string());
    }
    out
}

fn insights(impact: &MemoryImpact) -> Vec<String> {
    let mut out = Vec::new();

    if impact.partition_imbalanced {
        out.push(format!(
            "有记忆/无记忆回复数量为 {}/{}，质量与耗时差值不可直接比较",
            impact.turns_with_memory, impact.turns_without_memory
        ));
    } else {
        if impact.quality_improvement > 0.15 {
            out.push("记忆框架显著提升了回复质量，建议保持当前的记忆利用策略".to_string());
        } else if impact.quality_improvement < -0.05 {
            out.push("记忆框架对质量产生了负面影响，需要优化记忆检索和应用机制".to_string());
        }
        if impact.time_overhead > 2.0 {
            out.push("记忆检索产生了较大的性能开销，建议优化检索算法或缓存策略".to_string());
        } else if impact.time_overhead < 0.5 {
            out.push("记忆检索性能良好，对用户体验影响很小".to_string());
        }
        if impact.length_difference > 100.0 {
            out.push("记忆显著增强了回复的内容丰富度".to_string());
        } else if impact.length_difference < 0.0 {
            out.push("使用记忆后回复变得更简洁，可能表示更精准的信息提取".to_string());
        }
    }

    if impact.memory_utilization_rate < 0.3 {
        out.push("记忆利用率偏低，建议增强记忆触发机制或扩大适用场景".to_string());
    } else if impact.memory_utilization_rate > 0.8 {
        out.push("记忆利用率很高，说明框架能够有效识别需要历史信息的场景".to_string());
    }

    if impact.turns_with_memory > 0 {
        if impact.memory_relevance_score < 0.5 {
            out.push("检索到的记忆相关性较低，需要改进记忆匹配算法".to_string());
        } else if impact.memory_relevance_score > 0.8 {
            out.push("记忆检索高度相关，能够为AI提供有价值的上下文信息".to_string());
        }
        if impact.memory_consistency_score < 0.6 {
            out.push("记忆使用存在一致性问题，可能影响用户体验的连贯性".to_string());
        }
    }

    out
}

/// User-experience signals derived from the raw turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperienceMetrics {
    /// Turns per distinct session (turns without a session id share one).
    pub engagement: f64,
    /// Mean response length in characters.
    pub avg_response_length: f64,
    /// Mean response time in seconds.
    pub avg_response_time: f64,
    /// 1 at a 3.5 s average response time, falling linearly to 0 at ±10 s.
    pub time_satisfaction: f64,
}

impl ExperienceMetrics {
    /// Derive from a non-empty turn list.
    pub fn from_turns(turns: &[ConversationTurn]) -> Self {
        let sessions: HashSet<Option<&str>> =
            turns.iter().map(|t| t.session_id.as_deref()).collect();
        let lengths: Vec<f64> = turns
            .iter()
            .map(|t| char_len(&t.agent_response) as f64)
            .collect();
        let times: Vec<f64> = turns.iter().map(|t| t.response_time).collect();
        let avg_response_time = mean_or_zero(&times);

        Self {
            engagement: turns.len() as f64 / sessions.len().max(1) as f64,
            avg_response_length: mean_or_zero(&lengths),
            avg_response_time,
            time_satisfaction: 1.0 - ((avg_response_time - 3.5).abs() / 10.0).min(1.0),
        }
    }
}

/// Everything the conversation track contributes for one framework.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// Framework that produced the transcript.
    pub framework: String,
    /// Conversation quality.
    pub evaluation: ConversationEvaluation,
    /// Memory impact.
    pub impact: MemoryImpact,
    /// Experience metrics.
    pub experience: ExperienceMetrics,
}

impl ConversationSummary {
    /// Evaluate, assess and summarize a framework's transcript.
    pub fn build(
        framework: impl Into<String>,
        turns: &[ConversationTurn],
        evaluator: &ResponseQualityEvaluator,
    ) -> EvalResult<Self> {
        let evaluation = evaluator.evaluate_conversation(turns)?;
        let impact = MemoryImpactAssessor::new().assess(turns, &evaluation.turn_qualities)?;
        Ok(Self {
            framework: framework.into(),
            evaluation,
            impact,
            experience: ExperienceMetrics::from_turns(turns),
        })
    }
}
