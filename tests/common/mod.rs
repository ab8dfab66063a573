//! Shared fixtures for integration tests: small models, an explainability
//! backend and evaluators with fixed behavior.

#![allow(dead_code)]

use std::sync::Arc;

use arrow::array::{ArrayRef, AsArray, Float64Array, Int64Array, RecordBatch};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type};
use ndarray::Array2;
use serde_json::json;
use trueno_eval::dataset::{labels_from_array, ModelType};
use trueno_eval::evaluator::{EvaluationContext, EvaluationResult, EvaluatorConfig, ModelEvaluator};
use trueno_eval::explain::{ExplainRequest, ExplainabilityBackend, Explanation};
use trueno_eval::metrics::Metrics;
use trueno_eval::model::{Estimator, Model, ModelMetadata};
use trueno_eval::{Error, Result};

fn column_values(batch: &RecordBatch, index: usize) -> Result<Vec<f64>> {
    let column = cast(batch.column(index), &DataType::Float64)?;
    Ok(column.as_primitive::<Float64Type>().values().to_vec())
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

// ============================================================================
// Models
// ============================================================================

/// Predicts `1` when the first feature reaches `threshold`, else `0`.
pub struct ThresholdClassifier {
    pub metadata: ModelMetadata,
    pub threshold: f64,
    pub with_proba: bool,
}

impl ThresholdClassifier {
    pub fn new(threshold: f64) -> Self {
        Self {
            metadata: ModelMetadata::new("threshold-clf", "custom"),
            threshold,
            with_proba: true,
        }
    }

    pub fn without_proba(mut self) -> Self {
        self.with_proba = false;
        self
    }
}

impl Model for ThresholdClassifier {
    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    fn predict(&self, features: &RecordBatch) -> Result<ArrayRef> {
        let values = column_values(features, 0)?;
        let preds: Int64Array = values
            .iter()
            .map(|v| Some(i64::from(*v >= self.threshold)))
            .collect();
        Ok(Arc::new(preds))
    }

    fn raw_estimator(&self) -> Option<&dyn Estimator> {
        Some(self)
    }
}

impl Estimator for ThresholdClassifier {
    fn predict_proba(&self, features: &RecordBatch) -> Option<Result<Vec<Vec<f64>>>> {
        if !self.with_proba {
            return None;
        }
        Some(column_values(features, 0).map(|values| {
            values
                .iter()
                .map(|v| {
                    let p = sigmoid(v - self.threshold);
                    vec![1.0 - p, p]
                })
                .collect()
        }))
    }

    fn score(&self, features: &RecordBatch, labels: &ArrayRef) -> Option<Result<f64>> {
        let run = || -> Result<f64> {
            let preds = labels_from_array(&self.predict(features)?)?;
            let truth = labels_from_array(labels)?;
            let correct = preds.iter().zip(&truth).filter(|(p, t)| p == t).count();
            #[allow(clippy::cast_precision_loss)]
            let accuracy = correct as f64 / truth.len() as f64;
            Ok(accuracy)
        };
        Some(run())
    }
}

/// Three-class model: class index from the first feature, bucketed at 1 and 2.
pub struct BucketClassifier {
    pub metadata: ModelMetadata,
}

impl BucketClassifier {
    pub fn new() -> Self {
        Self {
            metadata: ModelMetadata::new("bucket-clf", "custom"),
        }
    }
}

impl Model for BucketClassifier {
    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    fn predict(&self, features: &RecordBatch) -> Result<ArrayRef> {
        let values = column_values(features, 0)?;
        #[allow(clippy::cast_possible_truncation)]
        let preds: Int64Array = values
            .iter()
            .map(|v| Some(v.clamp(0.0, 2.0).floor() as i64))
            .collect();
        Ok(Arc::new(preds))
    }

    fn raw_estimator(&self) -> Option<&dyn Estimator> {
        Some(self)
    }
}

impl Estimator for BucketClassifier {
    fn predict_proba(&self, features: &RecordBatch) -> Option<Result<Vec<Vec<f64>>>> {
        Some(column_values(features, 0).map(|values| {
            values
                .iter()
                .map(|v| {
                    let scores = [
                        (-(v - 0.5).powi(2)).exp(),
                        (-(v - 1.5).powi(2)).exp(),
                        (-(v - 2.5).powi(2)).exp(),
                    ];
                    let total: f64 = scores.iter().sum();
                    scores.iter().map(|s| s / total).collect()
                })
                .collect()
        }))
    }
}

/// Predicts the first feature plus `shift`.
pub struct ShiftRegressor {
    pub metadata: ModelMetadata,
    pub shift: f64,
    pub score: Option<std::result::Result<f64, String>>,
}

impl ShiftRegressor {
    pub fn new(shift: f64) -> Self {
        Self {
            metadata: ModelMetadata::new("shift-reg", "custom"),
            shift,
            score: None,
        }
    }

    pub fn with_score(mut self, score: std::result::Result<f64, String>) -> Self {
        self.score = Some(score);
        self
    }
}

impl Model for ShiftRegressor {
    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    fn predict(&self, features: &RecordBatch) -> Result<ArrayRef> {
        let values = column_values(features, 0)?;
        Ok(Arc::new(Float64Array::from_iter_values(
            values.into_iter().map(|v| v + self.shift),
        )))
    }

    fn raw_estimator(&self) -> Option<&dyn Estimator> {
        Some(self)
    }
}

impl Estimator for ShiftRegressor {
    fn score(&self, _features: &RecordBatch, _labels: &ArrayRef) -> Option<Result<f64>> {
        self.score
            .clone()
            .map(|s| s.map_err(Error::Model))
    }
}

/// Always fails to predict.
pub struct BrokenModel {
    pub metadata: ModelMetadata,
}

impl Model for BrokenModel {
    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    fn predict(&self, _features: &RecordBatch) -> Result<ArrayRef> {
        Err(Error::Model("weights not loaded".to_string()))
    }
}

// ============================================================================
// Explainability
// ============================================================================

/// Attribution = feature value times column index + 1.
pub struct LinearExplainer {
    pub fail: bool,
}

impl ExplainabilityBackend for LinearExplainer {
    fn explain(&self, request: &ExplainRequest<'_>) -> Result<Explanation> {
        if self.fail {
            return Err(Error::Explainability("backend exploded".to_string()));
        }
        let rows = request.features.num_rows();
        let cols = request.features.num_columns();
        let mut data = Array2::zeros((rows, cols));
        for col in 0..cols {
            for (row, value) in column_values(request.features, col)?.into_iter().enumerate() {
                data[[row, col]] = value;
            }
        }
        let mut values = data.clone();
        for (col, mut column) in values.columns_mut().into_iter().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            column.mapv_inplace(|v| v * (col + 1) as f64);
        }
        Ok(Explanation {
            values,
            data,
            explainer: Some(json!({
                "algorithm": request.algorithm.map(|a| a.to_string()),
                "has_background": request.background.is_some(),
            })),
        })
    }
}

// ============================================================================
// Evaluators
// ============================================================================

/// Declines every model.
pub struct DecliningEvaluator;

impl ModelEvaluator for DecliningEvaluator {
    fn can_evaluate(&self, _model_type: ModelType, _config: &EvaluatorConfig) -> bool {
        false
    }

    fn evaluate(&self, _context: &EvaluationContext<'_>) -> Result<EvaluationResult> {
        unreachable!("declining evaluator is never run")
    }
}

/// Returns a fixed metric map and records the config it was called with.
pub struct FixedEvaluator {
    pub metrics: Metrics,
}

impl ModelEvaluator for FixedEvaluator {
    fn can_evaluate(&self, _model_type: ModelType, _config: &EvaluatorConfig) -> bool {
        true
    }

    fn evaluate(&self, context: &EvaluationContext<'_>) -> Result<EvaluationResult> {
        let mut metrics = self.metrics.clone();
        #[allow(clippy::cast_precision_loss)]
        metrics.insert("config_keys".to_string(), context.evaluator_config.len() as f64);
        Ok(EvaluationResult::new(metrics, Default::default()))
    }
}

// ============================================================================
// Data
// ============================================================================

/// Ten rows of a single feature with binary labels; the threshold
/// classifier at 0.5 gets eight right.
pub fn binary_rows() -> (Vec<Vec<f64>>, ArrayRef) {
    let x = [0.1, 0.9, 0.2, 0.8, 0.3, 0.7, 0.4, 0.6, 0.45, 0.55];
    let y = [0, 1, 0, 1, 1, 1, 0, 0, 0, 1];
    (
        x.iter().map(|v| vec![*v, v * 2.0]).collect(),
        Arc::new(Int64Array::from(y.to_vec())),
    )
}

/// Nine rows, three classes.
pub fn multiclass_rows() -> (Vec<Vec<f64>>, ArrayRef) {
    let x = [0.2, 0.7, 1.2, 1.4, 1.9, 2.3, 2.8, 0.4, 1.6];
    let y = [0, 0, 1, 1, 2, 2, 2, 1, 1];
    (
        x.iter().map(|v| vec![*v]).collect(),
        Arc::new(Int64Array::from(y.to_vec())),
    )
}

/// The regression example: `y = [1.1, 2.1, -3.5]`, predictions
/// `[1.5, 2.0, -3.0]` with a zero shift.
pub fn regression_rows() -> (Vec<Vec<f64>>, ArrayRef) {
    (
        vec![vec![1.5], vec![2.0], vec![-3.0]],
        Arc::new(Float64Array::from(vec![1.1, 2.1, -3.5])),
    )
}

pub fn assert_close(actual: f64, expected: f64, tol: f64) {
    assert!(
        (actual - expected).abs() < tol,
        "expected {expected}, got {actual}"
    );
}
