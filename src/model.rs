//! Model interface consumed by evaluators
//!
//! A [`Model`] is the serving-side wrapper: it predicts on a feature table and
//! carries an identifier used for provenance tagging. It may expose the
//! underlying [`Estimator`], whose optional capabilities (class
//! probabilities, self-score) enrich the evaluation when present.

use arrow::array::{ArrayRef, RecordBatch};
use serde::{Deserialize, Serialize};

use crate::Result;

/// Identity of a loaded model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelMetadata {
    model_uuid: String,
    flavor: String,
    explainable: bool,
}

impl ModelMetadata {
    /// Metadata for an explainable model of the given flavor.
    #[must_use]
    pub fn new(model_uuid: impl Into<String>, flavor: impl Into<String>) -> Self {
        Self {
            model_uuid: model_uuid.into(),
            flavor: flavor.into(),
            explainable: true,
        }
    }

    /// Mark the model as unsupported by explainability backends
    /// (e.g. distributed model flavors).
    #[must_use]
    pub const fn not_explainable(mut self) -> Self {
        self.explainable = false;
        self
    }

    /// Stable model identifier.
    #[must_use]
    pub fn model_uuid(&self) -> &str {
        &self.model_uuid
    }

    /// Loader flavor, e.g. `linear` or `spark`.
    #[must_use]
    pub fn flavor(&self) -> &str {
        &self.flavor
    }

    /// Whether explainability may be computed for this model.
    #[must_use]
    pub const fn is_explainable(&self) -> bool {
        self.explainable
    }
}

/// Prediction interface of a loaded model.
pub trait Model: Send + Sync {
    /// Identity of the model.
    fn metadata(&self) -> &ModelMetadata;

    /// Predict one value per row of `features`.
    ///
    /// # Errors
    ///
    /// Returns an error if prediction fails; evaluation aborts.
    fn predict(&self, features: &RecordBatch) -> Result<ArrayRef>;

    /// Underlying estimator, if the wrapper exposes one.
    fn raw_estimator(&self) -> Option<&dyn Estimator> {
        None
    }
}

/// Optional capabilities of the underlying estimator.
///
/// Each method returns `None` when the capability is not supported.
pub trait Estimator: Send + Sync {
    /// Class probabilities, one row per example and one column per class in
    /// ascending label order.
    fn predict_proba(&self, _features: &RecordBatch) -> Option<Result<Vec<Vec<f64>>>> {
        None
    }

    /// The estimator's own score on `(features, labels)`.
    fn score(&self, _features: &RecordBatch, _labels: &ArrayRef) -> Option<Result<f64>> {
        None
    }
}
