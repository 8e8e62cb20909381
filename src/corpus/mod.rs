//! Scenario corpus: the fixed query/expected-answer triples a run is scored
//! against.
//!
//! A corpus is validated once at construction and is immutable afterwards.

mod builtin;

pub use builtin::*;

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult, EvalError, EvalResult};

/// One query and the answer a perfect memory backend would surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    /// Query sent to every retrieval method.
    pub query: String,
    /// Reference content the judge compares retrieval output against.
    pub expected: String,
}

impl TestCase {
    /// Create a new test case.
    pub fn new(query: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            expected: expected.into(),
        }
    }
}

/// A named group of test cases probing one class of memory behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Human-readable label, unique within a corpus.
    #[serde(alias = "sence", alias = "scenario")]
    pub name: String,
    /// Ordered test cases.
    #[serde(alias = "test_case", alias = "test_cases")]
    pub cases: Vec<TestCase>,
}

impl Scenario {
    /// Create a scenario from a name and its cases.
    pub fn new(name: impl Into<String>, cases: Vec<TestCase>) -> Self {
        Self {
            name: name.into(),
            cases,
        }
    }
}

/// Validated, immutable registry of scenarios.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioCorpus {
    name: String,
    scenarios: Vec<Scenario>,
}

/// Accepted on-disk layouts: a named corpus object or a bare scenario list.
#[derive(Deserialize)]
#[serde(untagged)]
enum CorpusFile {
    Named {
        name: String,
        scenarios: Vec<Scenario>,
    },
    Bare(Vec<Scenario>),
}

impl ScenarioCorpus {
    /// Build a corpus, rejecting empty corpora, empty scenarios and
    /// duplicate scenario names.
    pub fn new(name: impl Into<String>, scenarios: Vec<Scenario>) -> EvalResult<Self> {
        let name = name.into();
        if scenarios.is_empty() {
            return Err(EvalError::EmptyCorpus { corpus: name });
        }

        let mut seen = HashSet::new();
        for scenario in &scenarios {
            if !seen.insert(scenario.name.as_str()) {
                return Err(EvalError::DuplicateScenario {
                    name: scenario.name.clone(),
                });
            }
            if scenario.cases.is_empty() {
                return Err(EvalError::EmptyScenario {
                    scenario: scenario.name.clone(),
                });
            }
        }

        Ok(Self { name, scenarios })
    }

    /// Parse a corpus from JSON text. `fallback_name` names bare lists.
    pub fn from_json_str(json: &str, fallback_name: &str) -> AppResult<Self> {
        let parsed: CorpusFile = serde_json::from_str(json)?;
        let corpus = match parsed {
            CorpusFile::Named { name, scenarios } => Self::new(name, scenarios)?,
            CorpusFile::Bare(scenarios) => Self::new(fallback_name, scenarios)?,
        };
        Ok(corpus)
    }

    /// Load a corpus from a JSON file.
    pub fn load(path: &Path) -> AppResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| AppError::Config {
            message: format!("cannot read corpus {}: {}", path.display(), e),
        })?;
        let fallback = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("corpus");
        Self::from_json_str(&text, fallback)
    }

    /// Corpus name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Scenarios in definition order.
    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    /// Look up a scenario by exact name.
    pub fn get(&self, name: &str) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.name == name)
    }

    /// Scenario names in definition order.
    pub fn scenario_names(&self) -> Vec<&str> {
        self.scenarios.iter().map(|s| s.name.as_str()).collect()
    }

    /// Total number of test cases across all scenarios.
    pub fn case_count(&self) -> usize {
        self.scenarios.iter().map(|s| s.cases.len()).sum()
    }

    /// Restrict the corpus to the named scenarios, keeping corpus order.
    /// An empty selection keeps everything; an unknown name is an error.
    pub fn select(&self, names: &[String]) -> EvalResult<Self> {
        if names.is_empty() {
            return Ok(self.clone());
        }
        if let Some(unknown) = names.iter().find(|n| self.get(n).is_none()) {
            return Err(EvalError::UnknownScenario {
                name: unknown.clone(),
            });
        }
        let scenarios = self
            .scenarios
            .iter()
            .filter(|s| names.iter().any(|n| n == &s.name))
            .cloned()
            .collect();
        Self::new(self.name.clone(), scenarios)
    }
}
