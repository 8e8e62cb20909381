use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use tracing::info;

use super::lexicon::{self, char_len, classify_topics, contains_any, tokenize, word_count};
use super::quality::ResponseQualityEvaluator;
use super::trend::{binary_trend, emotion_trend, numeric_trend, TrendReport};
use super::types::{ConversationEvaluation, ConversationTurn};
use crate::error::{EvalError, EvalResult};
use crate::stats::{mean, mean_or_zero, variance};

/// Insight lines kept in an analysis.
pub const MAX_INSIGHTS: usize = 8;

/// Coarse emotional polarity of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Emotion {
    /// Satisfied or hopeful.
    Positive,
    /// Worried or disappointed.
    Negative,
    /// Neither.
    Neutral,
}

impl Emotion {
    const TABLE: [(Emotion, &'static [&'static str]); 3] = [
        (Emotion::Positive, lexicon::POSITIVE_EMOTION),
        (Emotion::Negative, lexicon::NEGATIVE_EMOTION),
        (Emotion::Neutral, lexicon::NEUTRAL_EMOTION),
    ];

    /// Classify by keyword hits; neutral when nothing matches.
    pub fn classify(text: &str) -> Self {
        lexicon::best_match(text, &Self::TABLE).unwrap_or(Emotion::Neutral)
    }

    /// Numeric encoding for trend regression.
    pub fn value(&self) -> f64 {
        match self {
            Emotion::Positive => 1.0,
            Emotion::Negative => -1.0,
            Emotion::Neutral => 0.0,
        }
    }
}

/// What the user is doing in a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionPattern {
    /// Asking for help or advice.
    SeekingHelp,
    /// Checking a prediction.
    Verifying,
    /// Asking why or how.
    Exploring,
    /// Agreeing with the agent.
    Confirming,
}

impl InteractionPattern {
    const TABLE: [(InteractionPattern, &'static [&'static str]); 4] = [
        (InteractionPattern::SeekingHelp, lexicon::SEEKING_HELP),
        (InteractionPattern::Verifying, lexicon::VERIFYING),
        (InteractionPattern::Exploring, lexicon::EXPLORING),
        (InteractionPattern::Confirming, lexicon::CONFIRMING),
    ];

    /// Classify by keyword hits; exploring when nothing matches.
    pub fn classify(text: &str) -> Self {
        lexicon::best_match(text, &Self::TABLE).unwrap_or(InteractionPattern::Exploring)
    }
}

/// Conversation phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Greeting and first question.
    Opening,
    /// Follow-up detail.
    Deepening,
    /// Checking what was said.
    Verification,
    /// Thanks and wrap-up.
    Closing,
}

impl Phase {
    const TABLE: [(Phase, &'static [&'static str]); 4] = [
        (Phase::Opening, lexicon::PHASE_OPENING),
        (Phase::Deepening, lexicon::PHASE_DEEPENING),
        (Phase::Verification, lexicon::PHASE_VERIFICATION),
        (Phase::Closing, lexicon::PHASE_CLOSING),
    ];
}

/// How long the user's messages are on average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageLength {
    /// Under 30 characters.
    Brief,
    /// 30 to 100 characters.
    Moderate,
    /// Over 100 characters.
    Detailed,
}

/// Counts, lengths and latencies of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicMetrics {
    /// Number of turns.
    pub total_turns: usize,
    /// Sum of response times in seconds.
    pub total_response_time: f64,
    /// Mean response time in seconds.
    pub avg_response_time: f64,
    /// Population variance of response times.
    pub response_time_variance: f64,
    /// Sum of `input_tokens`.
    pub total_input_tokens: u64,
    /// Sum of `output_tokens`.
    pub total_output_tokens: u64,
    /// Mean response length in characters.
    pub avg_response_length: f64,
    /// Mean user input length in characters.
    pub avg_input_length: f64,
    /// Population variance of response lengths.
    pub response_length_variance: f64,
    /// Longest response in characters.
    pub max_response_length: usize,
    /// Shortest response in characters.
    pub min_response_length: usize,
    /// Share of turns with memory context.
    pub memory_usage_rate: f64,
    /// First to last timestamp, when every turn carries one.
    pub duration_seconds: Option<f64>,
    /// Mean gap between consecutive timestamps in seconds.
    pub avg_interaction_interval: Option<f64>,
}

/// A change of topics between two adjacent turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicTransition {
    /// Index of the turn where the new topics start.
    pub turn_index: usize,
    /// Topics of the previous turn.
    pub from: Vec<String>,
    /// Topics of this turn.
    pub to: Vec<String>,
}

/// Topics discussed and how they shift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicAnalysis {
    /// Share of topic mentions across user inputs and agent responses.
    pub distribution: BTreeMap<String, f64>,
    /// Up to three topics by share.
    pub main_topics: Vec<(String, f64)>,
    /// Topic with the largest share.
    pub dominant_topic: Option<String>,
    /// Topic changes between adjacent turns.
    pub transitions: Vec<TopicTransition>,
    /// Number of distinct topics.
    pub diversity: usize,
    /// Share of the dominant topic.
    pub focus_score: f64,
    /// `1 - transitions / (turns - 1)`, 1.0 for a single turn.
    pub coherence: f64,
}

/// Emotional polarity across the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionAnalysis {
    /// Share of each emotion over all messages.
    pub distribution: BTreeMap<Emotion, f64>,
    /// Emotion per user input.
    pub user_progression: Vec<Emotion>,
    /// Emotion per agent response.
    pub agent_progression: Vec<Emotion>,
    /// Trend of the user's emotion.
    pub trend: TrendReport,
    /// Most frequent emotion.
    pub dominant: Emotion,
    /// Share of adjacent user inputs with the same emotion.
    pub stability: f64,
}

/// How the user interacts with the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionAnalysis {
    /// Share of each pattern.
    pub distribution: BTreeMap<InteractionPattern, f64>,
    /// Pattern per user input.
    pub sequence: Vec<InteractionPattern>,
    /// Number of pattern changes.
    pub transitions: usize,
    /// Most frequent pattern.
    pub dominant: InteractionPattern,
    /// Share of the most frequent pattern.
    pub consistency: f64,
}

/// How memory context was supplied over the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryUsageAnalysis {
    /// Turns with non-empty memory context.
    pub turns_with_memory: usize,
    /// Share of turns with memory context.
    pub utilization_rate: f64,
    /// Mean populated context fields per memory-carrying turn.
    pub avg_context_size: f64,
    /// Effectiveness per memory-carrying turn, in turn order.
    pub effectiveness_scores: Vec<f64>,
    /// Mean of `effectiveness_scores`.
    pub avg_effectiveness: Option<f64>,
    /// Memory type counts.
    pub type_distribution: BTreeMap<String, usize>,
    /// Trend of memory presence.
    pub usage_trend: TrendReport,
    /// Trend of context size.
    pub context_size_trend: TrendReport,
    /// Trend of effectiveness.
    pub effectiveness_trend: TrendReport,
}

/// Turn quality over the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityProgression {
    /// Overall score per turn.
    pub scores: Vec<f64>,
    /// Trend of the turn scores.
    pub trend: TrendReport,
    /// Trend of response times.
    pub response_time_trend: TrendReport,
    /// Mean turn score.
    pub average: f64,
    /// Population variance of turn scores.
    pub variance: f64,
    /// Id of the highest-scoring turn.
    pub best_turn: String,
    /// Id of the lowest-scoring turn.
    pub worst_turn: String,
    /// `1 - variance`, floored at 0.
    pub consistency: f64,
}

/// Lexical profile of the user's messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserBehavior {
    /// Mean input length in characters.
    pub avg_input_length: f64,
    /// Population variance of input lengths.
    pub input_length_variance: f64,
    /// Share of inputs asking a question.
    pub question_ratio: f64,
    /// Share of inputs with polite terms.
    pub politeness_ratio: f64,
    /// Share of inputs longer than 100 characters.
    pub detail_preference: f64,
    /// Share of urgent inputs.
    pub urgent_ratio: f64,
    /// Share of follow-up inputs.
    pub follow_up_ratio: f64,
    /// Class of the mean input length.
    pub length_class: MessageLength,
    /// Topic shares in user inputs.
    pub topic_interests: BTreeMap<String, f64>,
    /// Emotion words per input word, times 10, capped at 1.
    pub emotional_engagement: f64,
    /// Observations about the user.
    pub insights: Vec<String>,
}

/// A run of consecutive turns in one phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSpan {
    /// Phase of the run.
    pub phase: Phase,
    /// Index of the first turn.
    pub start: usize,
    /// Index of the last turn.
    pub end: usize,
    /// Number of turns.
    pub turns: usize,
}

/// Smoothness and structure of the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowAnalysis {
    /// Mean of the response-time and length consistency factors.
    pub smoothness: f64,
    /// Mean response time similarity of adjacent turns.
    pub response_time_consistency: f64,
    /// Mean response length similarity of adjacent turns.
    pub length_consistency: f64,
    /// Mean topic overlap of adjacent turns.
    pub topic_continuity: f64,
    /// Detected phases in turn order.
    pub phases: Vec<PhaseSpan>,
}

/// Full analysis of one conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationAnalysis {
    /// Conversation-level quality scores.
    pub evaluation: ConversationEvaluation,
    /// Counts and latencies.
    pub basic: BasicMetrics,
    /// Topic analysis.
    pub topics: TopicAnalysis,
    /// Emotion analysis.
    pub emotions: EmotionAnalysis,
    /// Interaction patterns.
    pub interaction: InteractionAnalysis,
    /// Memory usage.
    pub memory: MemoryUsageAnalysis,
    /// Quality over time.
    pub quality: QualityProgression,
    /// User behavior.
    pub behavior: UserBehavior,
    /// Flow analysis.
    pub flow: FlowAnalysis,
    /// Headline observations, at most `MAX_INSIGHTS`.
    pub insights: Vec<String>,
}

/// Lexical, rule-based conversation analyzer.
#[derive(Debug, Clone, Default)]
pub struct ConversationAnalyzer {
    evaluator: ResponseQualityEvaluator,
}

impl ConversationAnalyzer {
    /// Create an analyzer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom turn evaluator (for example one with a user style).
    pub fn with_evaluator(evaluator: ResponseQualityEvaluator) -> Self {
        Self { evaluator }
    }

    /// Analyze an ordered conversation. Fails only on an empty conversation.
    pub fn analyze(&self, turns: &[ConversationTurn]) -> EvalResult<ConversationAnalysis> {
        if turns.is_empty() {
            return Err(EvalError::EmptyConversation);
        }

        let evaluation = self.evaluator.evaluate_conversation(turns)?;
        let basic = basic_metrics(turns);
        let topics = topic_analysis(turns);
        let emotions = emotion_analysis(turns);
        let interaction = interaction_analysis(turns);
        let memory = memory_usage(turns);
        let quality = quality_progression(turns, &evaluation);
        let behavior = user_behavior(turns);
        let flow = flow_analysis(turns);

        let mut analysis = ConversationAnalysis {
            evaluation,
            basic,
            topics,
            emotions,
            interaction,
            memory,
            quality,
            behavior,
            flow,
            insights: Vec::new(),
        };
        analysis.insights = insights(&analysis);

        info!(
            turns = turns.len(),
            coherence = analysis.topics.coherence,
            emotion_trend = %analysis.emotions.trend.trend,
            memory_rate = analysis.memory.utilization_rate,
            "Conversation analyzed"
        );
        Ok(analysis)
    }
}

fn share<K: Ord + Clone>(counts: &BTreeMap<K, usize>) -> BTreeMap<K, f64> {
    let total: usize = counts.values().sum();
    if total == 0 {
        return BTreeMap::new();
    }
    counts
        .iter()
        .map(|(k, c)| (k.clone(), *c as f64 / total as f64))
        .collect()
}

/// Key with the highest share; the smallest key wins ties.
fn dominant<K: Ord + Clone>(shares: &BTreeMap<K, f64>) -> Option<K> {
    let mut best: Option<(&K, f64)> = None;
    for (key, value) in shares {
        if best.map_or(true, |(_, top)| *value > top) {
            best = Some((key, *value));
        }
    }
    best.map(|(k, _)| k.clone())
}

fn ratio(turns: &[ConversationTurn], predicate: impl Fn(&str) -> bool) -> f64 {
    turns.iter().filter(|t| predicate(&t.user_input)).count() as f64 / turns.len() as f64
}

fn basic_metrics(turns: &[ConversationTurn]) -> BasicMetrics {
    let times: Vec<f64> = turns.iter().map(|t| t.response_time).collect();
    let response_lengths: Vec<usize> = turns.iter().map(|t| char_len(&t.agent_response)).collect();
    let response_lengths_f: Vec<f64> = response_lengths.iter().map(|l| *l as f64).collect();
    let input_lengths: Vec<f64> = turns.iter().map(|t| char_len(&t.user_input) as f64).collect();

    let timestamps: Option<Vec<_>> = turns.iter().map(|t| t.timestamp).collect();
    let duration_seconds = timestamps.as_ref().and_then(|ts| match ts.as_slice() {
        [first, .., last] => Some((*last - *first).num_milliseconds() as f64 / 1000.0),
        _ => None,
    });
    let avg_interaction_interval = duration_seconds.map(|d| d / (turns.len() - 1) as f64);

    BasicMetrics {
        total_turns: turns.len(),
        total_response_time: times.iter().sum(),
        avg_response_time: mean_or_zero(&times),
        response_time_variance: variance(&times),
        total_input_tokens: turns.iter().map(|t| t.tokens("input_tokens")).sum(),
        total_output_tokens: turns.iter().map(|t| t.tokens("output_tokens")).sum(),
        avg_response_length: mean_or_zero(&response_lengths_f),
        avg_input_length: mean_or_zero(&input_lengths),
        response_length_variance: variance(&response_lengths_f),
        max_response_length: response_lengths.iter().copied().max().unwrap_or(0),
        min_response_length: response_lengths.iter().copied().min().unwrap_or(0),
        memory_usage_rate: ratio_with_memory(turns),
        duration_seconds,
        avg_interaction_interval,
    }
}

fn ratio_with_memory(turns: &[ConversationTurn]) -> f64 {
    turns.iter().filter(|t| t.has_memory()).count() as f64 / turns.len() as f64
}

fn topic_analysis(turns: &[ConversationTurn]) -> TopicAnalysis {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut transitions = Vec::new();
    let mut previous: Option<Vec<&str>> = None;

    for (index, turn) in turns.iter().enumerate() {
        let user_topics = classify_topics(&turn.user_input);
        for topic in user_topics.iter().chain(classify_topics(&turn.agent_response).iter()) {
            *counts.entry(topic.to_string()).or_default() += 1;
        }

        if let Some(prev) = &previous {
            let new: Vec<String> = user_topics
                .iter()
                .filter(|t| !prev.contains(t))
                .map(|t| t.to_string())
                .collect();
            if !new.is_empty() {
                transitions.push(TopicTransition {
                    turn_index: index,
                    from: prev.iter().map(|t| t.to_string()).collect(),
                    to: new,
                });
            }
        }
        previous = Some(user_topics);
    }

    let distribution = share(&counts);
    let mut ranked: Vec<(String, f64)> = distribution.iter().map(|(k, v)| (k.clone(), *v)).collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let dominant_topic = ranked.first().map(|(t, _)| t.clone());
    ranked.truncate(3);

    let coherence = if turns.len() <= 1 {
        1.0
    } else {
        (1.0 - transitions.len() as f64 / (turns.len() - 1) as f64).max(0.0)
    };

    TopicAnalysis {
        focus_score: distribution.values().copied().fold(0.0, f64::max),
        diversity: counts.len(),
        distribution,
        main_topics: ranked,
        dominant_topic,
        transitions,
        coherence,
    }
}

fn emotion_analysis(turns: &[ConversationTurn]) -> EmotionAnalysis {
    let user_progression: Vec<Emotion> =
        turns.iter().map(|t| Emotion::classify(&t.user_input)).collect();
    let agent_progression: Vec<Emotion> =
        turns.iter().map(|t| Emotion::classify(&t.agent_response)).collect();

    let mut counts = BTreeMap::new();
    for emotion in &user_progression {
        *counts.entry(*emotion).or_insert(0usize) += 1;
    }
    let distribution = share(&counts);
    let values: Vec<f64> = user_progression.iter().map(Emotion::value).collect();

    let stability = if user_progression.len() < 2 {
        1.0
    } else {
        let changes = user_progression.windows(2).filter(|w| w[0] != w[1]).count();
        (1.0 - changes as f64 / (user_progression.len() - 1) as f64).max(0.0)
    };

    EmotionAnalysis {
        dominant: dominant(&distribution).unwrap_or(Emotion::Neutral),
        distribution,
        trend: emotion_trend(&values),
        user_progression,
        agent_progression,
        stability,
    }
}

fn interaction_analysis(turns: &[ConversationTurn]) -> InteractionAnalysis {
    let sequence: Vec<InteractionPattern> = turns
        .iter()
        .map(|t| InteractionPattern::classify(&t.user_input))
        .collect();

    let mut counts = BTreeMap::new();
    for pattern in &sequence {
        *counts.entry(*pattern).or_insert(0usize) += 1;
    }
    let consistency = if sequence.len() < 2 {
        1.0
    } else {
        counts.values().copied().max().unwrap_or(0) as f64 / sequence.len() as f64
    };
    let distribution = share(&counts);

    InteractionAnalysis {
        dominant: dominant(&distribution).unwrap_or(InteractionPattern::Exploring),
        distribution,
        transitions: sequence.windows(2).filter(|w| w[0] != w[1]).count(),
        sequence,
        consistency,
    }
}

/// 0.3 explicit reference + 0.4 input/context overlap + 0.2 type diversity
/// + 0.1 × mean backend relevance, capped at 1.
fn memory_effectiveness(turn: &ConversationTurn) -> f64 {
    let Some(ctx) = turn.memory() else {
        return 0.0;
    };
    let mut score = 0.0;
    if contains_any(&turn.agent_response, lexicon::MEMORY_REFERENCES) {
        score += 0.3;
    }
    if !ctx.context_summary.is_empty() {
        let input = tokenize(&turn.user_input);
        let summary = tokenize(&ctx.context_summary);
        if input.intersection(&summary).next().is_some() {
            score += 0.4;
        }
    }
    if ctx.memory_types.len() > 1 {
        score += 0.2;
    }
    if let Some(relevance) = ctx.mean_relevance() {
        score += relevance * 0.1;
    }
    f64::min(score, 1.0)
}

fn memory_usage(turns: &[ConversationTurn]) -> MemoryUsageAnalysis {
    let usage: Vec<bool> = turns.iter().map(ConversationTurn::has_memory).collect();
    let sizes: Vec<f64> = turns
        .iter()
        .map(|t| t.memory().map_or(0.0, |c| c.size() as f64))
        .collect();
    let memory_turns: Vec<&ConversationTurn> = turns.iter().filter(|t| t.has_memory()).collect();
    let effectiveness_scores: Vec<f64> = memory_turns.iter().map(|t| memory_effectiveness(t)).collect();
    let memory_sizes: Vec<f64> = memory_turns
        .iter()
        .map(|t| t.memory().map_or(0.0, |c| c.size() as f64))
        .collect();

    let mut type_distribution = BTreeMap::new();
    for ctx in memory_turns.iter().filter_map(|t| t.memory()) {
        for kind in ctx.type_set() {
            *type_distribution.entry(kind.to_string()).or_insert(0usize) += 1;
        }
    }

    let (usage_trend, context_size_trend, effectiveness_trend) =
        if turns.len() < super::trend::MIN_TREND_POINTS {
            (
                TrendReport::insufficient(),
                TrendReport::insufficient(),
                TrendReport::insufficient(),
            )
        } else {
            (
                binary_trend(&usage),
                numeric_trend(&sizes),
                numeric_trend(&effectiveness_scores),
            )
        };

    MemoryUsageAnalysis {
        turns_with_memory: memory_turns.len(),
        utilization_rate: memory_turns.len() as f64 / turns.len() as f64,
        avg_context_size: mean_or_zero(&memory_sizes),
        avg_effectiveness: mean(&effectiveness_scores),
        effectiveness_scores,
        type_distribution,
        usage_trend,
        context_size_trend,
        effectiveness_trend,
    }
}

fn quality_progression(
    turns: &[ConversationTurn],
    evaluation: &ConversationEvaluation,
) -> QualityProgression {
    let scores: Vec<f64> = evaluation
        .turn_qualities
        .iter()
        .map(|q| q.overall_score)
        .collect();
    let times: Vec<f64> = turns.iter().map(|t| t.response_time).collect();

    // First turn wins ties in both directions.
    let mut best = 0;
    let mut worst = 0;
    for (i, score) in scores.iter().enumerate() {
        if *score > scores[best] {
            best = i;
        }
        if *score < scores[worst] {
            worst = i;
        }
    }
    let turn_id = |i: usize| {
        evaluation
            .turn_qualities
            .get(i)
            .map(|q| q.turn_id.clone())
            .unwrap_or_default()
    };
    let spread = variance(&scores);

    QualityProgression {
        trend: numeric_trend(&scores),
        response_time_trend: numeric_trend(&times),
        average: mean_or_zero(&scores),
        variance: spread,
        best_turn: turn_id(best),
        worst_turn: turn_id(worst),
        consistency: (1.0 - spread).max(0.0),
        scores,
    }
}

fn user_behavior(turns: &[ConversationTurn]) -> UserBehavior {
    let input_lengths: Vec<f64> = turns.iter().map(|t| char_len(&t.user_input) as f64).collect();
    let avg_input_length = mean_or_zero(&input_lengths);

    let all_input = turns
        .iter()
        .map(|t| t.user_input.as_str())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let topic_interests: BTreeMap<String, f64> = lexicon::TOPIC_TAXONOMY
        .iter()
        .map(|(topic, keywords)| {
            let hits = lexicon::count_present(&all_input, keywords);
            (topic.to_string(), hits as f64 / keywords.len() as f64)
        })
        .collect();

    let emotion_words: Vec<&str> = lexicon::POSITIVE_EMOTION
        .iter()
        .chain(lexicon::NEGATIVE_EMOTION)
        .chain(lexicon::NEUTRAL_EMOTION)
        .copied()
        .collect();
    let emotional_hits: usize = turns
        .iter()
        .map(|t| lexicon::count_present(&t.user_input, &emotion_words))
        .sum();
    let total_words: usize = turns.iter().map(|t| word_count(&t.user_input)).sum();
    let emotional_engagement = if total_words == 0 {
        0.0
    } else {
        (emotional_hits as f64 / total_words as f64 * 10.0).min(1.0)
    };

    let length_class = if avg_input_length > 100.0 {
        MessageLength::Detailed
    } else if avg_input_length < 30.0 {
        MessageLength::Brief
    } else {
        MessageLength::Moderate
    };

    let mut behavior = UserBehavior {
        avg_input_length,
        input_length_variance: variance(&input_lengths),
        question_ratio: ratio(turns, |s| s.contains('？') || s.contains('?')),
        politeness_ratio: ratio(turns, |s| contains_any(s, lexicon::POLITE_INPUT)),
        detail_preference: ratio(turns, |s| char_len(s) > 100),
        urgent_ratio: ratio(turns, |s| contains_any(s, lexicon::URGENT_TERMS)),
        follow_up_ratio: ratio(turns, |s| contains_any(s, lexicon::FOLLOW_UP_TERMS)),
        length_class,
        topic_interests,
        emotional_engagement,
        insights: Vec::new(),
    };
    behavior.insights = behavior_insights(&behavior, turns.len());
    behavior
}

fn behavior_insights(behavior: &UserBehavior, session_length: usize) -> Vec<String> {
    let mut insights = Vec::new();
    match behavior.length_class {
        MessageLength::Detailed => {
            insights.push("用户偏好详细表达，喜欢提供充分的背景信息".to_string())
        }
        MessageLength::Brief => insights.push("用户沟通简洁直接，偏好快速获得答案".to_string()),
        MessageLength::Moderate => {}
    }
    if behavior.politeness_ratio > 0.7 {
        insights.push("用户表现出高礼貌度，重视正式的交流方式".to_string());
    }
    if let Some(topic) = dominant(&behavior.topic_interests) {
        if behavior.topic_interests.get(&topic).copied().unwrap_or(0.0) > 0.3 {
            insights.push(format!("用户对{}话题表现出特别的兴趣", topic));
        }
    }
    if session_length > 10 {
        insights.push("用户表现出高度参与，进行了深入的多轮对话".to_string());
    } else if session_length < 3 {
        insights.push("用户进行了简短的咨询，可能更偏好快速解答".to_string());
    }
    if behavior.urgent_ratio > 0.3 {
        insights.push("用户经常表现出紧迫性，需要及时的回复和指导".to_string());
    }
    insights
}

fn phases(turns: &[ConversationTurn]) -> Vec<PhaseSpan> {
    let mut spans = Vec::new();
    let mut current = Phase::Opening;
    let mut start = 0;

    for (index, turn) in turns.iter().enumerate() {
        let input = turn.user_input.to_lowercase();
        let switch = Phase::TABLE
            .iter()
            .find(|(phase, keywords)| *phase != current && contains_any(&input, keywords));
        if let Some((phase, _)) = switch {
            if index > start {
                spans.push(PhaseSpan {
                    phase: current,
                    start,
                    end: index - 1,
                    turns: index - start,
                });
            }
            current = *phase;
            start = index;
        }
    }
    if turns.len() > start {
        spans.push(PhaseSpan {
            phase: current,
            start,
            end: turns.len() - 1,
            turns: turns.len() - start,
        });
    }
    spans
}

fn flow_analysis(turns: &[ConversationTurn]) -> FlowAnalysis {
    if turns.len() < 2 {
        return FlowAnalysis {
            smoothness: 1.0,
            response_time_consistency: 1.0,
            length_consistency: 1.0,
            topic_continuity: 1.0,
            phases: phases(turns),
        };
    }

    let mut time_factors = Vec::new();
    let mut length_factors = Vec::new();
    let mut continuity = Vec::new();
    for pair in turns.windows(2) {
        let (prev, curr) = (&pair[0], &pair[1]);
        time_factors.push(1.0 - ((prev.response_time - curr.response_time).abs() / 10.0).min(1.0));

        let (a, b) = (char_len(&prev.agent_response), char_len(&curr.agent_response));
        let longest = a.max(b).max(1) as f64;
        length_factors.push(1.0 - (a.abs_diff(b) as f64 / longest).min(1.0));

        let before: HashSet<&str> = classify_topics(&format!("{} {}", prev.user_input, prev.agent_response))
            .into_iter()
            .collect();
        let now: HashSet<&str> = classify_topics(&curr.user_input).into_iter().collect();
        let union: BTreeSet<&&str> = before.union(&now).collect();
        let overlap = before.intersection(&now).count();
        continuity.push(if union.is_empty() {
            0.0
        } else {
            overlap as f64 / union.len() as f64
        });
    }

    let all_factors: Vec<f64> = time_factors.iter().chain(&length_factors).copied().collect();
    FlowAnalysis {
        smoothness: mean_or_zero(&all_factors),
        response_time_consistency: mean_or_zero(&time_factors),
        length_consistency: mean_or_zero(&length_factors),
        topic_continuity: mean_or_zero(&continuity),
        phases: phases(turns),
    }
}

fn insights(analysis: &ConversationAnalysis) -> Vec<String> {
    let mut out = Vec::new();

    let avg_time = analysis.basic.avg_response_time;
    if avg_time > 5.0 {
        out.push("AI回复时间较长，建议优化响应速度以提升用户体验".to_string());
    } else if avg_time < 1.0 {
        out.push("AI回复速度很快，用户体验良好".to_string());
    }

    match analysis.topics.diversity {
        d if d > 4 => out.push("对话涵盖多个话题，表现出用户的广泛兴趣，建议保持话题间的平衡".to_string()),
        1 => out.push("对话专注于单一话题，建议深入挖掘用户在该领域的具体需求".to_string()),
        _ => {}
    }

    match analysis.emotions.dominant {
        Emotion::Negative => out.push("用户情感偏向消极，建议AI提供更多的安慰和积极引导".to_string()),
        Emotion::Positive => out.push("用户情感积极，建议保持当前的沟通方式和内容质量".to_string()),
        Emotion::Neutral => {}
    }

    let rate = analysis.memory.utilization_rate;
    if rate < 0.3 {
        out.push("记忆框架使用率较低，建议增强历史信息的整合和引用".to_string());
    } else if rate > 0.8 {
        out.push("记忆框架使用充分，有效利用了用户的历史信息".to_string());
    }

    out.extend(analysis.behavior.insights.iter().cloned());

    let smoothness = analysis.flow.smoothness;
    if smoothness > 0.8 {
        out.push("对话流程流畅，用户与AI的交互自然顺畅".to_string());
    } else if smoothness < 0.5 {
        out.push("对话流程存在不够流畅的地方，建议改善回复的一致性".to_string());
    }

    out.truncate(MAX_INSIGHTS);
    out
}
