use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, AppResult};

/// Memory context attached to an agent turn by the memory backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryContext {
    /// Free-text summary of the retrieved memories.
    #[serde(default)]
    pub context_summary: String,
    /// Per-memory relevance in [0, 1], as reported by the backend.
    #[serde(default)]
    pub relevance_scores: BTreeMap<String, f64>,
    /// Kinds of memory that contributed (profile, event, ...).
    #[serde(default)]
    pub memory_types: Vec<String>,
    /// Number of memories retrieved.
    #[serde(default)]
    pub total_memories: usize,
    /// User profile snapshot.
    #[serde(default)]
    pub user_profile: BTreeMap<String, Value>,
    /// Backend-specific fields kept for the export.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl MemoryContext {
    /// A context with no populated field counts as absent.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Number of populated fields.
    pub fn size(&self) -> usize {
        [
            !self.context_summary.is_empty(),
            !self.relevance_scores.is_empty(),
            !self.memory_types.is_empty(),
            self.total_memories > 0,
            !self.user_profile.is_empty(),
        ]
        .into_iter()
        .filter(|populated| *populated)
        .count()
            + self.extra.len()
    }

    /// Mean backend relevance clamped to [0, 1]; `None` when none reported.
    pub fn mean_relevance(&self) -> Option<f64> {
        let values: Vec<f64> = self.relevance_scores.values().copied().collect();
        crate::stats::mean(&values).map(|m| m.clamp(0.0, 1.0))
    }

    /// Distinct memory types.
    pub fn type_set(&self) -> HashSet<&str> {
        self.memory_types.iter().map(String::as_str).collect()
    }
}

/// One user/agent exchange, produced by an external chat harness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// What the user said.
    pub user_input: String,
    /// What the agent answered.
    #[serde(alias = "ai_response")]
    pub agent_response: String,
    /// Agent latency in seconds.
    #[serde(default)]
    pub response_time: f64,
    /// Memory retrieved for this turn.
    #[serde(default)]
    pub memory_context: Option<MemoryContext>,
    /// Token counters, `input_tokens` / `output_tokens`.
    #[serde(default)]
    pub token_usage: BTreeMap<String, u64>,
    /// When the turn happened.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Caller-supplied turn id.
    #[serde(default, alias = "response_id")]
    pub turn_id: Option<String>,
    /// Session the turn belongs to.
    #[serde(default)]
    pub session_id: Option<String>,
}

impl ConversationTurn {
    /// Create a turn without memory context.
    pub fn new(user_input: impl Into<String>, agent_response: impl Into<String>) -> Self {
        Self {
            user_input: user_input.into(),
            agent_response: agent_response.into(),
            response_time: 0.0,
            memory_context: None,
            token_usage: BTreeMap::new(),
            timestamp: None,
            turn_id: None,
            session_id: None,
        }
    }

    /// Attach a memory context.
    pub fn with_memory(mut self, context: MemoryContext) -> Self {
        self.memory_context = Some(context);
        self
    }

    /// Set the response time in seconds.
    pub fn with_response_time(mut self, seconds: f64) -> Self {
        self.response_time = seconds;
        self
    }

    /// Whether a non-empty memory context was supplied.
    pub fn has_memory(&self) -> bool {
        self.memory_context.as_ref().map_or(false, |c| !c.is_empty())
    }

    /// The memory context, only when non-empty.
    pub fn memory(&self) -> Option<&MemoryContext> {
        self.memory_context.as_ref().filter(|c| !c.is_empty())
    }

    /// Stable id: the supplied one, or `turn-<n>` (1-based).
    pub fn id_or_index(&self, index: usize) -> String {
        self.turn_id
            .clone()
            .unwrap_or_else(|| format!("turn-{}", index + 1))
    }

    /// Token counter by name, 0 when absent.
    pub fn tokens(&self, key: &str) -> u64 {
        self.token_usage.get(key).copied().unwrap_or(0)
    }
}

/// Load a conversation transcript: a JSON array of turns, or an object with
/// a `turns` array.
pub fn load_turns(path: &Path) -> AppResult<Vec<ConversationTurn>> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Transcript {
        Wrapped { turns: Vec<ConversationTurn> },
        Bare(Vec<ConversationTurn>),
    }

    let raw = std::fs::read_to_string(path).map_err(|e| AppError::Config {
        message: format!("cannot read transcript {}: {}", path.display(), e),
    })?;
    let transcript: Transcript = serde_json::from_str(&raw).map_err(|e| AppError::Config {
        message: format!("invalid transcript {}: {}", path.display(), e),
    })?;

    Ok(match transcript {
        Transcript::Wrapped { turns } | Transcript::Bare(turns) => turns,
    })
}

/// Quality of one agent turn. All scores are in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnQuality {
    /// Id of the scored turn.
    pub turn_id: String,
    /// Mean of the dimension scores.
    pub overall_score: f64,
    /// Score per quality dimension.
    pub dimension_scores: BTreeMap<String, f64>,
    /// Dimensions scoring high.
    pub strengths: Vec<String>,
    /// Dimensions scoring low.
    pub weaknesses: Vec<String>,
    /// Advice for the weak dimensions.
    pub suggestions: Vec<String>,
}

impl TurnQuality {
    /// Score of one dimension, 0 when missing.
    pub fn dimension(&self, name: &str) -> f64 {
        self.dimension_scores.get(name).copied().unwrap_or(0.0)
    }
}

/// Conversation-level aggregates, derived from the turn qualities and the raw
/// turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEvaluation {
    /// Quality of each turn, in turn order.
    pub turn_qualities: Vec<TurnQuality>,
    /// Topical continuity between turns.
    pub flow_score: f64,
    /// How well responses used the memory supplied.
    pub memory_utilization_score: f64,
    /// Absence of contradictory advice.
    pub consistency_score: f64,
    /// Estimated user satisfaction.
    pub user_satisfaction_estimate: f64,
    /// mean × 0.5 + flow × 0.2 + memory utilization × 0.15 + consistency × 0.15
    pub overall_score: f64,
    /// Mean of the turn scores.
    pub average_turn_score: f64,
    /// Population variance of the turn scores.
    pub score_variance: f64,
    /// Mean score per dimension.
    pub dimension_averages: BTreeMap<String, f64>,
    /// Suggestions for the weakest dimensions.
    pub improvement_suggestions: Vec<String>,
}
