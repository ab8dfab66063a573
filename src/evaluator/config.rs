//! Typed sub-config of the default evaluator.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::EvaluatorConfig;
use crate::explain::ExplainerAlgorithm;
use crate::{Error, Result};

const fn default_true() -> bool {
    true
}

const fn default_nsamples() -> usize {
    2000
}

/// Options understood by [`DefaultEvaluator`](super::DefaultEvaluator).
/// Unknown keys are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultEvaluatorConfig {
    /// Compute explainability artifacts
    #[serde(default = "default_true")]
    pub log_model_explainability: bool,
    /// Attribution algorithm; `None` lets the backend choose
    #[serde(default)]
    pub explainability_algorithm: Option<ExplainerAlgorithm>,
    /// Row cap for the sample handed to the explainability backend
    #[serde(default = "default_nsamples")]
    pub explainability_nsamples: usize,
    /// Log explainability failures and continue instead of failing
    #[serde(default = "default_true")]
    pub ignore_exceptions: bool,
}

impl Default for DefaultEvaluatorConfig {
    fn default() -> Self {
        Self {
            log_model_explainability: true,
            explainability_algorithm: None,
            explainability_nsamples: default_nsamples(),
            ignore_exceptions: true,
        }
    }
}

impl DefaultEvaluatorConfig {
    /// Parse an evaluator config object.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if a known key has the wrong type or an
    /// unknown algorithm name.
    pub fn from_config(config: &EvaluatorConfig) -> Result<Self> {
        serde_json::from_value(Value::Object(config.clone()))
            .map_err(|e| Error::InvalidConfig(format!("default evaluator: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> Result<DefaultEvaluatorConfig> {
        match value {
            Value::Object(map) => DefaultEvaluatorConfig::from_config(&map),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_defaults() {
        let config = parse(json!({"unrelated": 1})).unwrap();
        assert_eq!(config, DefaultEvaluatorConfig::default());
        assert_eq!(config.explainability_nsamples, 2000);
    }

    #[test]
    fn test_explicit_values() {
        let config = parse(json!({
            "log_model_explainability": false,
            "explainability_algorithm": "kernel",
            "explainability_nsamples": 10,
        }))
        .unwrap();
        assert!(!config.log_model_explainability);
        assert_eq!(config.explainability_algorithm, Some(ExplainerAlgorithm::Kernel));
        assert_eq!(config.explainability_nsamples, 10);
    }

    #[test]
    fn test_bad_values_are_invalid_config() {
        assert!(matches!(
            parse(json!({"explainability_algorithm": "magic"})),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            parse(json!({"log_model_explainability": "yes"})),
            Err(Error::InvalidConfig(_))
        ));
    }
}
