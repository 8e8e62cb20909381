//! Conversation-quality track.
//!
//! Scores the agent turns of a recorded multi-turn transcript, measures what
//! retrieved memory changes, and produces a lexical analysis of the
//! conversation (topics, emotion, interaction patterns, phases). All scoring
//! is keyword and heuristic based; no model is called.

mod analyzer;
mod impact;
mod lexicon;
mod quality;
mod trend;
mod types;

pub use analyzer::{
    BasicMetrics, ConversationAnalysis, ConversationAnalyzer, Emotion, EmotionAnalysis,
    FlowAnalysis, InteractionAnalysis, InteractionPattern, MemoryUsageAnalysis, MessageLength,
    Phase, PhaseSpan, QualityProgression, TopicAnalysis, TopicTransition, UserBehavior,
    MAX_INSIGHTS,
};
pub use impact::{ConversationSummary, ExperienceMetrics, MemoryImpact, MemoryImpactAssessor};
pub use quality::{Dimension, ResponseQualityEvaluator};
pub use trend::{binary_trend, emotion_trend, numeric_trend, Trend, TrendReport, MIN_TREND_POINTS};
pub use types::{
    load_turns, ConversationEvaluation, ConversationTurn, MemoryContext, TurnQuality,
};
