//! Benchmark plan: which frameworks and methods a run drives.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::comparison::{ExpectedFitness, WinnerWeights};
use crate::error::{AppError, AppResult, EvalError, EvalResult};
use crate::retrieval::ResponseShape;

/// Top-level plan file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkPlan {
    /// Corpus file; the built-in corpus is used when absent.
    #[serde(default)]
    pub corpus: Option<PathBuf>,
    /// Frameworks under test.
    pub frameworks: Vec<FrameworkPlan>,
    /// Identity forwarded to every retrieval call; overrides `EVAL_IDENTITY`.
    #[serde(default)]
    pub identity: Option<String>,
    /// Narrative-only method/scenario suitability table.
    #[serde(default)]
    pub expected_fitness: Option<ExpectedFitness>,
    /// Overrides for the winner vote weights.
    #[serde(default)]
    pub weights: Option<WinnerWeights>,
}

/// One memory backend under test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameworkPlan {
    /// Framework name used in reports.
    pub name: String,
    /// General-purpose method used for head-to-head comparison. Mandatory.
    #[serde(default)]
    pub core_method: String,
    /// Retrieval methods.
    pub methods: Vec<MethodPlan>,
    /// Recorded conversation transcript (JSON list of turns) for the
    /// conversation-level track.
    #[serde(default)]
    pub conversation: Option<PathBuf>,
}

/// One retrieval method exposed over HTTP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodPlan {
    /// Method id (aggregation key).
    pub id: String,
    /// Label passed to the judge.
    #[serde(default)]
    pub label: Option<String>,
    /// Endpoint receiving `{query, method, user_id}`.
    pub endpoint: String,
    /// Shape of the endpoint's response.
    pub shape: ResponseShape,
    /// Extra request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl BenchmarkPlan {
    /// Load and validate a plan file.
    pub fn load(path: &Path) -> AppResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| AppError::Config {
            message: format!("cannot read plan {}: {}", path.display(), e),
        })?;
        let plan: BenchmarkPlan = serde_json::from_str(&text).map_err(|e| AppError::Config {
            message: format!("invalid plan {}: {}", path.display(), e),
        })?;
        plan.validate()?;
        if let Some(weights) = &plan.weights {
            weights
                .validate()
                .map_err(|message| AppError::Config { message })?;
        }
        Ok(plan)
    }

    /// Check mandatory configuration before any I/O happens.
    pub fn validate(&self) -> EvalResult<()> {
        if self.frameworks.is_empty() {
            return Err(EvalError::NoFrameworks);
        }
        let mut names = HashSet::new();
        for framework in &self.frameworks {
            if !names.insert(framework.name.as_str()) {
                return Err(EvalError::DuplicateFramework {
                    name: framework.name.clone(),
                });
            }
            framework.validate()?;
        }
        Ok(())
    }

    /// Keep only the named frameworks (all when `names` is empty).
    pub fn select_frameworks(&self, names: &[String]) -> AppResult<Vec<&FrameworkPlan>> {
        if names.is_empty() {
            return Ok(self.frameworks.iter().collect());
        }
        names
            .iter()
            .map(|name| {
                self.frameworks
                    .iter()
                    .find(|f| &f.name == name)
                    .ok_or_else(|| AppError::Config {
                        message: format!("unknown framework: {}", name),
                    })
            })
            .collect()
    }
}

impl FrameworkPlan {
    /// A framework needs uniquely named methods and a core method that is
    /// one of them.
    pub fn validate(&self) -> EvalResult<()> {
        if self.methods.is_empty() {
            return Err(EvalError::NoMethods {
                framework: self.name.clone(),
            });
        }
        let mut ids = HashSet::new();
        if let Some(method) = self.methods.iter().find(|m| !ids.insert(m.id.as_str())) {
            return Err(EvalError::DuplicateMethod {
                framework: self.name.clone(),
                method_id: method.id.clone(),
            });
        }
        if self.core_method.is_empty() || !self.methods.iter().any(|m| m.id == self.core_method) {
            return Err(EvalError::MissingCoreMethod {
                framework: self.name.clone(),
                method_id: self.core_method.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAN: &str = r#"{
        "frameworks": [
            {
                "name": "memobase",
                "core_method": "context",
                "methods": [
                    {"id": "context", "endpoint": "http://localhost:9000/context", "shape": "plain_text"},
                    {"id": "profile", "endpoint": "http://localhost:9000/profile", "shape": "profile"}
                ]
            },
            {
                "name": "memu",
                "core_method": "memory_items",
                "methods": [
                    {"id": "memory_items", "endpoint": "http://localhost:9100/items", "shape": "memory_items"}
                ]
            }
        ]
    }"#;

    #[test]
    fn test_plan_parses_and_validates() {
        let plan: BenchmarkPlan = serde_json::from_str(PLAN).unwrap();
        assert!(plan.validate().is_ok());
        assert_eq!(plan.frameworks[0].methods[1].shape, ResponseShape::Profile);
        assert!(plan.corpus.is_none());
    }

    #[test]
    fn test_missing_core_method_rejected() {
        let mut plan: BenchmarkPlan = serde_json::from_str(PLAN).unwrap();
        plan.frameworks[1].core_method = "clustered".to_string();
        let err = plan.validate().unwrap_err();
        assert!(
            matches!(err, EvalError::MissingCoreMethod { framework, .. } if framework == "memu")
        );

        plan.frameworks[1].core_method.clear();
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_duplicate_method_rejected() {
        let mut plan: BenchmarkPlan = serde_json::from_str(PLAN).unwrap();
        let copy = plan.frameworks[0].methods[1].clone();
        plan.frameworks[0].methods.push(copy);

        let err = plan.validate().unwrap_err();
        assert!(err.is_configuration());
        assert!(matches!(
            err,
            EvalError::DuplicateMethod { framework, method_id }
                if framework == "memobase" && method_id == "profile"
        ));
    }

    #[test]
    fn test_select_frameworks() {
        let plan: BenchmarkPlan = serde_json::from_str(PLAN).unwrap();
        let selected = plan.select_frameworks(&["memu".to_string()]).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name, "memu");
        assert!(plan.select_frameworks(&["zep".to_string()]).is_err());
    }
}
