use std::collections::BTreeMap;

use tracing::{debug, info};

use super::lexicon::{self, char_len, contains_any, count_present, tokenize};
use super::types::{ConversationEvaluation, ConversationTurn, MemoryContext, TurnQuality};
use crate::error::{EvalError, EvalResult};
use crate::stats::{jaccard, mean, mean_or_zero, variance};

/// The five turn-quality dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Dimension {
    /// Lexical and topical overlap between input and response.
    Relevance,
    /// Sentence completeness, connectives, topic consistency, repetition.
    Coherence,
    /// Domain terms, specificity, actionable advice, depth.
    Informativeness,
    /// Tone, register, style match, sensitivity.
    Appropriateness,
    /// Use of the supplied memory context.
    MemoryIntegration,
}

impl Dimension {
    /// All dimensions in scoring order.
    pub const ALL: [Dimension; 5] = [
        Dimension::Relevance,
        Dimension::Coherence,
        Dimension::Informativeness,
        Dimension::Appropriateness,
        Dimension::MemoryIntegration,
    ];

    /// Key used in `dimension_scores`.
    pub fn name(&self) -> &'static str {
        match self {
            Dimension::Relevance => "relevance",
            Dimension::Coherence => "coherence",
            Dimension::Informativeness => "informativeness",
            Dimension::Appropriateness => "appropriateness",
            Dimension::MemoryIntegration => "memory_integration",
        }
    }

    /// Weight in the turn overall score. Weights sum to 1.
    pub fn weight(&self) -> f64 {
        match self {
            Dimension::Relevance => 0.25,
            Dimension::Coherence => 0.20,
            Dimension::Informativeness => 0.20,
            Dimension::Appropriateness => 0.15,
            Dimension::MemoryIntegration => 0.20,
        }
    }

    /// Human-readable label used in feedback lines.
    pub fn description(&self) -> &'static str {
        match self {
            Dimension::Relevance => "回复与用户输入的相关性",
            Dimension::Coherence => "回复的逻辑性和连贯性",
            Dimension::Informativeness => "回复的信息含量和实用性",
            Dimension::Appropriateness => "回复的语气和风格适宜性",
            Dimension::MemoryIntegration => "对历史记忆的有效利用",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.name() == name)
    }
}

/// Rule-based scorer for agent responses.
///
/// Every score is a deterministic function of the turn text and its memory
/// context; there is no model call.
#[derive(Debug, Clone, Default)]
pub struct ResponseQualityEvaluator {
    user_style: Option<String>,
}

impl ResponseQualityEvaluator {
    /// Evaluator without a declared user style.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the user's preferred style (`简洁` for concise, `详细` for
    /// detailed). Without one, style match is not penalized.
    pub fn with_user_style(mut self, style: impl Into<String>) -> Self {
        self.user_style = Some(style.into());
        self
    }

    /// Score a single turn.
    pub fn evaluate_turn(&self, turn: &ConversationTurn) -> TurnQuality {
        self.score_turn(0, turn)
    }

    fn score_turn(&self, index: usize, turn: &ConversationTurn) -> TurnQuality {
        let mut dimension_scores = BTreeMap::new();
        let mut overall_score = 0.0;
        for dimension in Dimension::ALL {
            let score = self.dimension_score(dimension, turn).clamp(0.0, 1.0);
            overall_score += score * dimension.weight();
            dimension_scores.insert(dimension.name().to_string(), score);
        }

        let (strengths, weaknesses, suggestions) = feedback(&dimension_scores, turn);
        let turn_id = turn.id_or_index(index);
        debug!(turn = %turn_id, overall = overall_score, "Turn scored");

        TurnQuality {
            turn_id,
            overall_score: overall_score.clamp(0.0, 1.0),
            dimension_scores,
            strengths,
            weaknesses,
            suggestions,
        }
    }

    fn dimension_score(&self, dimension: Dimension, turn: &ConversationTurn) -> f64 {
        match dimension {
            Dimension::Relevance => relevance(&turn.user_input, &turn.agent_response),
            Dimension::Coherence => coherence(&turn.agent_response),
            Dimension::Informativeness => informativeness(&turn.agent_response),
            Dimension::Appropriateness => {
                appropriateness(&turn.agent_response, self.user_style.as_deref())
            }
            Dimension::MemoryIntegration => turn
                .memory()
                .map_or(0.0, |ctx| memory_integration(&turn.agent_response, ctx)),
        }
    }

    /// Score every turn and derive the conversation-level aggregates.
    pub fn evaluate_conversation(
        &self,
        turns: &[ConversationTurn],
    ) -> EvalResult<ConversationEvaluation> {
        if turns.is_empty() {
            return Err(EvalError::EmptyConversation);
        }

        let turn_qualities: Vec<TurnQuality> = turns
            .iter()
            .enumerate()
            .map(|(i, turn)| self.score_turn(i, turn))
            .collect();
        let overall: Vec<f64> = turn_qualities.iter().map(|q| q.overall_score).collect();

        let flow_score = conversation_flow(turns);
        let memory_utilization_score = memory_utilization(turns);
        let consistency_score = response_consistency(turns);
        let average_turn_score = mean_or_zero(&overall);
        let score_variance = variance(&overall);
        let user_satisfaction_estimate =
            (average_turn_score + (0.1 - score_variance).max(0.0)).min(1.0);

        let overall_score = (average_turn_score * 0.5
            + flow_score * 0.2
            + memory_utilization_score * 0.15
            + consistency_score * 0.15)
            .clamp(0.0, 1.0);

        let dimension_averages = dimension_averages(&turn_qualities);
        let memory_rate =
            turns.iter().filter(|t| t.has_memory()).count() as f64 / turns.len() as f64;
        let improvement_suggestions =
            improvement_suggestions(&dimension_averages, score_variance, memory_rate);

        info!(
            turns = turns.len(),
            overall = overall_score,
            flow = flow_score,
            memory = memory_utilization_score,
            "Conversation evaluated"
        );

        Ok(ConversationEvaluation {
            turn_qualities,
            flow_score,
            memory_utilization_score,
            consistency_score,
            user_satisfaction_estimate,
            overall_score,
            average_turn_score,
            score_variance,
            dimension_averages,
            improvement_suggestions,
        })
    }
}

// ---------------------------------------------------------------------------
// Dimensions
// ---------------------------------------------------------------------------

fn relevance(user_input: &str, response: &str) -> f64 {
    let user_tokens = tokenize(user_input);
    if user_tokens.is_empty() {
        return 0.5;
    }
    let response_tokens = tokenize(response);
    let direct = user_tokens.intersection(&response_tokens).count() as f64 / user_tokens.len() as f64;

    let has_question = contains_any(user_input, lexicon::QUESTION_INDICATORS);
    let has_answer = contains_any(response, lexicon::ANSWER_INDICATORS);
    let semantic = match (has_question, has_answer) {
        (true, true) => 0.8,
        (true, false) => 0.3,
        _ => 0.6,
    };

    let input_topics = lexicon::matching_topics(user_input, lexicon::RELEVANCE_TOPICS);
    let topical = if input_topics.is_empty() {
        0.5
    } else {
        let response_topics = lexicon::matching_topics(response, lexicon::RELEVANCE_TOPICS);
        let overlap = input_topics
            .iter()
            .filter(|t| response_topics.contains(t))
            .count();
        overlap as f64 / input_topics.len() as f64
    };

    (direct * 0.4 + semantic * 0.3 + topical * 0.3).min(1.0)
}

fn coherence(response: &str) -> f64 {
    let sentences = lexicon::split_sentences(response);
    if sentences.is_empty() {
        return 0.0;
    }

    let complete = sentences
        .iter()
        .filter(|s| char_len(s) > 3 && !s.ends_with('，') && !s.ends_with(','))
        .count() as f64
        / sentences.len() as f64;

    let expected_connectors = (char_len(response) as f64 / 100.0).max(1.0);
    let connections =
        (count_present(response, lexicon::CONNECTORS) as f64 / expected_connectors).min(1.0);

    let consistency = sentence_topic_consistency(&sentences);
    let repetition = repetition_ratio(&sentences);

    (complete * 0.3 + connections * 0.25 + consistency * 0.25 + (1.0 - repetition) * 0.2)
        .clamp(0.0, 1.0)
}

fn sentence_topic_consistency(sentences: &[&str]) -> f64 {
    if sentences.len() <= 1 {
        return 1.0;
    }
    let token_sets: Vec<_> = sentences.iter().map(|s| tokenize(s)).collect();
    let overlaps: Vec<f64> = token_sets
        .windows(2)
        .filter(|pair| !pair[0].is_empty() && !pair[1].is_empty())
        .map(|pair| jaccard(&pair[0], &pair[1]))
        .collect();
    mean(&overlaps).unwrap_or(0.5)
}

/// Share of sentence pairs that are near-duplicates (Jaccard > 0.7).
fn repetition_ratio(sentences: &[&str]) -> f64 {
    let n = sentences.len();
    if n <= 1 {
        return 0.0;
    }
    let token_sets: Vec<_> = sentences.iter().map(|s| tokenize(s)).collect();
    let mut repeated = 0usize;
    for i in 0..n {
        for j in (i + 1)..n {
            if jaccard(&token_sets[i], &token_sets[j]) > 0.7 {
                repeated += 1;
            }
        }
    }
    repeated as f64 / (n * (n - 1) / 2) as f64
}

fn informativeness(response: &str) -> f64 {
    let terms = lexicon::count_professional_terms(response) as f64;
    let term_density = (terms / (lexicon::word_count(response) as f64 / 10.0).max(1.0)).min(1.0);

    let (numbers, times, precise) = lexicon::specificity_markers(response);
    let specificity = ((numbers + times + precise) as f64 / 10.0).min(1.0);

    let advice = (count_present(response, lexicon::ADVICE_MARKERS) as f64 / 3.0).min(1.0);
    let depth = (count_present(response, lexicon::DEPTH_MARKERS) as f64 / 5.0).min(1.0);

    ((term_density + specificity + advice + depth) * 0.25).min(1.0)
}

fn tone(response: &str) -> f64 {
    let polite = (count_present(response, lexicon::POLITE_TERMS) as f64 / 3.0).min(1.0);
    let negative = (count_present(response, lexicon::NEGATIVE_TONE) as f64 / 2.0).min(0.5);
    (polite - negative).max(0.0)
}

fn appropriateness(response: &str, user_style: Option<&str>) -> f64 {
    let professionalism = (lexicon::count_professional_terms(response) as f64
        / (lexicon::word_count(response) as f64 / 5.0).max(1.0))
    .min(1.0);

    let length = char_len(response);
    let style_match = match user_style {
        None => 1.0,
        Some("简洁") => {
            if length < 200 {
                1.0
            } else {
                0.5
            }
        }
        Some("详细") => {
            if length > 100 {
                1.0
            } else {
                0.5
            }
        }
        Some(_) => 0.8,
    };

    let sensitivity =
        (1.0 - count_present(response, lexicon::SENSITIVE_TERMS) as f64 / 5.0).max(0.0);

    (tone(response) * 0.3 + professionalism * 0.3 + style_match * 0.2 + sensitivity * 0.2)
        .min(1.0)
}

fn memory_integration(response: &str, context: &MemoryContext) -> f64 {
    let references =
        (count_present(response, lexicon::MEMORY_REFERENCES) as f64 / 2.0).min(1.0);

    let continuity = if context.context_summary.is_empty() {
        0.0
    } else {
        let summary = tokenize(&context.context_summary);
        let reply = tokenize(response);
        (summary.intersection(&reply).count() as f64 / summary.len().max(1) as f64).min(1.0)
    };

    let relevance = context.mean_relevance().unwrap_or(0.0);

    (references * 0.4 + continuity * 0.3 + relevance * 0.3).min(1.0)
}

fn feedback(
    scores: &BTreeMap<String, f64>,
    turn: &ConversationTurn,
) -> (Vec<String>, Vec<String>, Vec<String>) {
    let mut strengths = Vec::new();
    let mut weaknesses = Vec::new();
    let mut suggestions = Vec::new();

    for dimension in Dimension::ALL {
        let score = scores.get(dimension.name()).copied().unwrap_or(0.0);
        if score >= 0.8 {
            strengths.push(format!("{}表现优秀", dimension.description()));
        } else if score < 0.5 {
            weaknesses.push(format!("{}需要改进", dimension.description()));
            suggestions.push(format!("建议提升{}", dimension.description()));
        }
    }

    let length = char_len(&turn.agent_response);
    if length < 50 {
        weaknesses.push("回复过于简短".to_string());
        suggestions.push("建议提供更详细的分析和建议".to_string());
    } else if length > 500 {
        weaknesses.push("回复可能过于冗长".to_string());
        suggestions.push("建议精简表达，突出重点".to_string());
    }

    let terms = lexicon::count_professional_terms(&turn.agent_response);
    if terms > 5 {
        strengths.push("专业术语使用恰当".to_string());
    } else if terms < 2 {
        suggestions.push("建议增加专业术语的使用".to_string());
    }

    if turn.has_memory() {
        let integration = scores
            .get(Dimension::MemoryIntegration.name())
            .copied()
            .unwrap_or(0.0);
        if integration > 0.7 {
            strengths.push("有效利用了历史记忆信息".to_string());
        } else {
            suggestions.push("建议更好地整合历史记忆信息".to_string());
        }
    }

    (strengths, weaknesses, suggestions)
}

// ---------------------------------------------------------------------------
// Conversation level
// ---------------------------------------------------------------------------

/// Mean topic continuity over adjacent turns; 1.0 below two turns.
fn conversation_flow(turns: &[ConversationTurn]) -> f64 {
    if turns.len() < 2 {
        return 1.0;
    }
    let scores: Vec<f64> = turns
        .windows(2)
        .map(|pair| {
            let previous = tokenize(&pair[0].agent_response);
            let input = tokenize(&pair[1].user_input);
            let current = tokenize(&pair[1].agent_response);
            let overlap = previous.intersection(&current).count() + input.intersection(&current).count();
            (overlap as f64 / current.len().max(1) as f64).min(1.0)
        })
        .collect();
    mean(&scores).unwrap_or(0.5)
}

/// Memory usage rate × 0.5 + mean integration over memory turns × 0.5.
fn memory_utilization(turns: &[ConversationTurn]) -> f64 {
    if turns.is_empty() {
        return 0.0;
    }
    let integrations: Vec<f64> = turns
        .iter()
        .filter_map(|t| t.memory().map(|ctx| memory_integration(&t.agent_response, ctx)))
        .collect();
    let rate = integrations.len() as f64 / turns.len() as f64;
    rate * 0.5 + mean_or_zero(&integrations) * 0.5
}

/// Tone stability × 0.5 + absence of contradictory advice × 0.5.
fn response_consistency(turns: &[ConversationTurn]) -> f64 {
    if turns.len() < 2 {
        return 1.0;
    }
    let tones: Vec<f64> = turns.iter().map(|t| tone(&t.agent_response)).collect();
    let tone_consistency = (1.0 - variance(&tones)).max(0.0);

    let all_text = turns
        .iter()
        .map(|t| t.agent_response.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let contradictions = lexicon::CONTRADICTORY_PAIRS
        .iter()
        .filter(|(positive, negative)| {
            contains_any(&all_text, positive) && contains_any(&all_text, negative)
        })
        .count();
    let viewpoint =
        (1.0 - contradictions as f64 / lexicon::CONTRADICTORY_PAIRS.len() as f64).max(0.0);

    tone_consistency * 0.5 + viewpoint * 0.5
}

fn dimension_averages(qualities: &[TurnQuality]) -> BTreeMap<String, f64> {
    Dimension::ALL
        .iter()
        .map(|d| {
            let scores: Vec<f64> = qualities.iter().map(|q| q.dimension(d.name())).collect();
            (d.name().to_string(), mean_or_zero(&scores))
        })
        .collect()
}

fn improvement_suggestions(
    averages: &BTreeMap<String, f64>,
    score_variance: f64,
    memory_rate: f64,
) -> Vec<String> {
    let mut suggestions: Vec<String> = averages
        .iter()
        .filter(|(_, avg)| **avg < 0.6)
        .filter_map(|(name, _)| Dimension::from_name(name))
        .map(|d| format!("需要重点改进：{}", d.description()))
        .collect();

    if score_variance > 0.1 {
        suggestions.push("需要提高回复质量的一致性".to_string());
    }
    if memory_rate < 0.5 {
        suggestions.push("建议更频繁地利用历史记忆信息".to_string());
    }
    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rich_turn() -> ConversationTurn {
        ConversationTurn::new(
            "我今年的事业运势怎么样？",
            "您好，根据您的八字分析，今年事业运势整体向好。因为流年大运相合，所以下半年有升职机会。\
             建议您在6月前完成手头的工作，同时注意与同事的关系。",
        )
        .with_memory(MemoryContext {
            context_summary: "用户从事互联网工作，关心事业发展".into(),
            relevance_scores: [("m1".to_string(), 0.9), ("m2".to_string(), 0.7)]
                .into_iter()
                .collect(),
            memory_types: vec!["profile".into(), "event".into()],
            total_memories: 2,
            ..Default::default()
        })
    }

    #[test]
    fn test_dimension_weights_sum_to_one() {
        let total: f64 = Dimension::ALL.iter().map(|d| d.weight()).sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_turn_scores_are_in_range() {
        let evaluator = ResponseQualityEvaluator::new();
        for turn in [
            rich_turn(),
            ConversationTurn::new("", ""),
            ConversationTurn::new("？？？", "死死死死死死 不行 不可能"),
        ] {
            let quality = evaluator.evaluate_turn(&turn);
            assert!((0.0..=1.0).contains(&quality.overall_score));
            assert_eq!(quality.dimension_scores.len(), 5);
            for score in quality.dimension_scores.values() {
                assert!((0.0..=1.0).contains(score));
            }
        }
    }

    #[test]
    fn test_memory_integration_zero_without_context() {
        let evaluator = ResponseQualityEvaluator::new();
        let quality = evaluator.evaluate_turn(&ConversationTurn::new("你好", "您好，请问有什么可以帮您？"));
        assert_eq!(quality.dimension("memory_integration"), 0.0);

        let quality = evaluator.evaluate_turn(&rich_turn());
        assert!(quality.dimension("memory_integration") > 0.0);
    }

    #[test]
    fn test_overall_is_weighted_sum() {
        let quality = ResponseQualityEvaluator::new().evaluate_turn(&rich_turn());
        let expected: f64 = Dimension::ALL
            .iter()
            .map(|d| quality.dimension(d.name()) * d.weight())
            .sum();
        assert!((quality.overall_score - expected).abs() < 1e-12);
    }

    #[test]
    fn test_short_reply_feedback() {
        let quality = ResponseQualityEvaluator::new().evaluate_turn(&ConversationTurn::new("财运？", "还行。"));
        assert!(quality.weaknesses.iter().any(|w| w == "回复过于简短"));
        assert!(quality.suggestions.iter().any(|s| s == "建议增加专业术语的使用"));
    }

    #[test]
    fn test_style_match() {
        let long = "很".repeat(250);
        let concise = appropriateness(&long, Some("简洁"));
        let detailed = appropriateness(&long, Some("详细"));
        assert!((detailed - concise - 0.1).abs() < 1e-12);
        assert!(appropriateness("好", None) > appropriateness("好", Some("其他")));
    }

    #[test]
    fn test_repetition_detected() {
        assert_eq!(repetition_ratio(&["今年运势很好", "今年运势很好"]), 1.0);
        assert_eq!(repetition_ratio(&["今年运势很好"]), 0.0);
    }

    #[test]
    fn test_conversation_empty_is_error() {
        let err = ResponseQualityEvaluator::new().evaluate_conversation(&[]).unwrap_err();
        assert!(matches!(err, EvalError::EmptyConversation));
    }

    #[test]
    fn test_single_turn_conversation() {
        let evaluation = ResponseQualityEvaluator::new()
            .evaluate_conversation(&[rich_turn()])
            .unwrap();
        assert_eq!(evaluation.flow_score, 1.0);
        assert_eq!(evaluation.consistency_score, 1.0);
        assert_eq!(evaluation.score_variance, 0.0);
        assert_eq!(evaluation.turn_qualities[0].turn_id, "turn-1");
        let expected_satisfaction = (evaluation.average_turn_score + 0.1).min(1.0);
        assert!((evaluation.user_satisfaction_estimate - expected_satisfaction).abs() < 1e-12);
    }

    #[test]
    fn test_contradictions_lower_consistency() {
        let turns = vec![
            ConversationTurn::new("a", "今年宜出行"),
            ConversationTurn::new("b", "今年忌出行"),
        ];
        let consistency = response_consistency(&turns);
        // Tone identical, one contradictory pair out of three.
        assert!((consistency - (0.5 + (2.0 / 3.0) * 0.5)).abs() < 1e-12);
    }

    #[test]
    fn test_low_memory_rate_suggestion() {
        let evaluation = ResponseQualityEvaluator::new()
            .evaluate_conversation(&[ConversationTurn::new("你好", "您好")])
            .unwrap();
        assert!(evaluation
            .improvement_suggestions
            .iter()
            .any(|s| s == "建议更频繁地利用历史记忆信息"));
    }
}
