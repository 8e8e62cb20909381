use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::corpus::{
    SCENARIO_CHAT_HABITS, SCENARIO_DIVINATION, SCENARIO_FRAGMENTED_PROFILE,
    SCENARIO_LIFE_TRAJECTORY, SCENARIO_PREFERENCE_TIMELINE, SCENARIO_RELATIONSHIPS,
    SCENARIO_SITUATIONAL,
};

/// Bucket weights of the overall winner vote.
///
/// Buckets without data (everything except quality when no conversation
/// summaries are supplied) drop out and the remaining weights are rescaled
/// proportionally.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WinnerWeights {
    /// Response quality bucket.
    pub quality: f64,
    /// Performance bucket.
    pub performance: f64,
    /// Memory effectiveness bucket.
    pub memory_effectiveness: f64,
    /// User experience bucket.
    pub user_experience: f64,
}

impl Default for WinnerWeights {
    fn default() -> Self {
        Self {
            quality: 0.35,
            performance: 0.20,
            memory_effectiveness: 0.25,
            user_experience: 0.20,
        }
    }
}

impl WinnerWeights {
    /// Weights must be finite and non-negative with a positive sum.
    pub fn validate(&self) -> Result<(), String> {
        let all = [
            ("quality", self.quality),
            ("performance", self.performance),
            ("memory_effectiveness", self.memory_effectiveness),
            ("user_experience", self.user_experience),
        ];
        for (name, weight) in all {
            if !weight.is_finite() || weight < 0.0 {
                return Err(format!("winner weight '{}' must be a non-negative number, got {}", name, weight));
            }
        }
        if all.iter().map(|(_, w)| w).sum::<f64>() <= 0.0 {
            return Err("winner weights must not all be zero".to_string());
        }
        Ok(())
    }
}

/// Fitness assumed for a (method, scenario) pair missing from the table.
pub const DEFAULT_FITNESS: f64 = 5.0;

/// Static method → scenario suitability table on the 0–10 scale.
///
/// Narrative only: it is shown next to measured scores and never enters a
/// score or the winner vote.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpectedFitness(pub BTreeMap<String, BTreeMap<String, f64>>);

impl ExpectedFitness {
    /// Table for the six well-known methods over the built-in scenarios.
    pub fn builtin() -> Self {
        let scenarios = [
            SCENARIO_PREFERENCE_TIMELINE,
            SCENARIO_FRAGMENTED_PROFILE,
            SCENARIO_RELATIONSHIPS,
            SCENARIO_DIVINATION,
            SCENARIO_CHAT_HABITS,
            SCENARIO_SITUATIONAL,
            SCENARIO_LIFE_TRAJECTORY,
        ];
        let rows: [(&str, [f64; 7]); 6] = [
            ("context", [8.0, 9.0, 9.0, 8.0, 9.0, 9.0, 8.0]),
            ("profile", [7.0, 9.0, 6.0, 9.0, 8.0, 7.0, 7.0]),
            ("search_event", [9.0, 6.0, 7.0, 6.0, 6.0, 8.0, 9.0]),
            ("search_event_gist", [6.0, 8.0, 5.0, 9.0, 5.0, 6.0, 6.0]),
            ("memory_items", [8.0; 7]),
            ("clustered", [6.0, 7.0, 8.0, 5.0, 7.0, 6.0, 6.0]),
        ];

        let table = rows
            .iter()
            .map(|(method, values)| {
                let per_scenario = scenarios
                    .iter()
                    .zip(values)
                    .map(|(s, v)| (s.to_string(), *v))
                    .collect();
                (method.to_string(), per_scenario)
            })
            .collect();
        Self(table)
    }

    /// Whether the table lists the method at all.
    pub fn knows(&self, method_id: &str) -> bool {
        self.0.contains_key(method_id)
    }

    /// Expected fitness, [`DEFAULT_FITNESS`] when the scenario is not listed.
    pub fn fitness(&self, method_id: &str, scenario: &str) -> f64 {
        self.0
            .get(method_id)
            .and_then(|row| row.get(scenario))
            .copied()
            .unwrap_or(DEFAULT_FITNESS)
    }
}
