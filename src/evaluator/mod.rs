//! Evaluators
//!
//! A [`ModelEvaluator`] decides whether it applies to a model type and, if
//! so, turns an [`EvaluationContext`] into an [`EvaluationResult`]. The
//! built-in [`DefaultEvaluator`] is registered as `"default"` in
//! [`EvaluatorRegistry::with_builtins`].

mod config;
mod default;
mod registry;
mod result;

use serde_json::{Map, Value};

pub use config::DefaultEvaluatorConfig;
pub use default::DefaultEvaluator;
pub use registry::{EvaluatorFactory, EvaluatorRegistry};
pub use result::EvaluationResult;

use crate::custom_metric::CustomMetric;
use crate::dataset::{EvaluationDataset, ModelType};
use crate::model::Model;
use crate::tracking::TrackingStore;
use crate::Result;

/// Per-evaluator configuration: a JSON object.
pub type EvaluatorConfig = Map<String, Value>;

/// Everything an evaluator needs for one evaluation.
#[derive(Clone, Copy)]
pub struct EvaluationContext<'a> {
    /// Model under evaluation
    pub model: &'a dyn Model,
    /// Declared or inferred task type
    pub model_type: ModelType,
    /// Evaluation data
    pub dataset: &'a EvaluationDataset,
    /// Run results are persisted to
    pub run_id: &'a str,
    /// This evaluator's sub-config
    pub evaluator_config: &'a EvaluatorConfig,
    /// User metrics, in declaration order
    pub custom_metrics: &'a [CustomMetric],
    /// Persistence
    pub store: &'a dyn TrackingStore,
}

/// A pluggable evaluation policy.
pub trait ModelEvaluator: Send + Sync {
    /// Whether this evaluator can score a model of `model_type` with the
    /// given config.
    fn can_evaluate(&self, model_type: ModelType, evaluator_config: &EvaluatorConfig) -> bool;

    /// Compute, persist and return metrics and artifacts.
    ///
    /// # Errors
    ///
    /// Returns an error if prediction fails, a custom metric breaks its
    /// contract, two artifacts share a name, or persistence fails.
    fn evaluate(&self, context: &EvaluationContext<'_>) -> Result<EvaluationResult>;
}
