//! Evaluate a binary classifier end to end
//!
//! Builds a synthetic two-feature dataset, wraps a fixed logistic model and
//! runs the default evaluator with a linear attribution backend. Prints the
//! metrics and the artifacts logged to the tracking store.
//!
//! Run with: RUST_LOG=trueno_eval=debug cargo run --example evaluate_classifier

use std::sync::Arc;

use arrow::array::{ArrayRef, AsArray, Float64Array, Int64Array, RecordBatch};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use tracing_subscriber::EnvFilter;
use trueno_eval::dataset::DatasetSource;
use trueno_eval::evaluator::{DefaultEvaluator, EvaluatorRegistry};
use trueno_eval::explain::{ExplainRequest, ExplainabilityBackend, Explanation};
use trueno_eval::model::{Estimator, Model, ModelMetadata};
use trueno_eval::tracking::{MemoryTrackingStore, TrackingStore};
use trueno_eval::{evaluate, EvaluateOptions};

const WEIGHTS: [f64; 2] = [2.0, -1.5];
const BIAS: f64 = 0.25;

struct Logistic {
    metadata: ModelMetadata,
}

impl Logistic {
    fn probabilities(features: &RecordBatch) -> trueno_eval::Result<Vec<f64>> {
        let columns = feature_matrix(features)?;
        Ok(columns
            .rows()
            .into_iter()
            .map(|row| {
                let z = row[0].mul_add(WEIGHTS[0], row[1] * WEIGHTS[1]) + BIAS;
                1.0 / (1.0 + (-z).exp())
            })
            .collect())
    }
}

impl Model for Logistic {
    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    fn predict(&self, features: &RecordBatch) -> trueno_eval::Result<ArrayRef> {
        let preds: Int64Array = Self::probabilities(features)?
            .into_iter()
            .map(|p| Some(i64::from(p >= 0.5)))
            .collect();
        Ok(Arc::new(preds))
    }

    fn raw_estimator(&self) -> Option<&dyn Estimator> {
        Some(self)
    }
}

impl Estimator for Logistic {
    fn predict_proba(&self, features: &RecordBatch) -> Option<trueno_eval::Result<Vec<Vec<f64>>>> {
        Some(Self::probabilities(features).map(|ps| ps.into_iter().map(|p| vec![1.0 - p, p]).collect()))
    }
}

fn feature_matrix(features: &RecordBatch) -> trueno_eval::Result<Array2<f64>> {
    let mut matrix = Array2::zeros((features.num_rows(), features.num_columns()));
    for (col, column) in features.columns().iter().enumerate() {
        let values = cast(column, &DataType::Float64)?;
        for (row, v) in values.as_primitive::<Float64Type>().values().iter().enumerate() {
            matrix[[row, col]] = *v;
        }
    }
    Ok(matrix)
}

/// Attribution of a linear model: weight times distance from the column mean.
struct LinearAttribution;

impl ExplainabilityBackend for LinearAttribution {
    fn explain(&self, request: &ExplainRequest<'_>) -> trueno_eval::Result<Explanation> {
        let data = feature_matrix(request.features)?;
        let means = data
            .mean_axis(ndarray::Axis(0))
            .ok_or_else(|| trueno_eval::Error::Explainability("empty sample".to_string()))?;
        let mut values = data.clone();
        for (col, mut column) in values.columns_mut().into_iter().enumerate() {
            column.mapv_inplace(|v| (v - means[col]) * WEIGHTS[col]);
        }
        Ok(Explanation {
            values,
            data,
            explainer: Some(json!({"weights": WEIGHTS, "bias": BIAS})),
        })
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== trueno-eval: Binary Classifier Evaluation ===\n");

    let mut rng = StdRng::seed_from_u64(42);
    let n = 500;
    let income: Float64Array = (0..n).map(|_| Some(rng.gen_range(-2.0..2.0))).collect();
    let debt: Float64Array = (0..n).map(|_| Some(rng.gen_range(-2.0..2.0))).collect();
    let labels: Int64Array = income
        .values()
        .iter()
        .zip(debt.values())
        .map(|(i, d)| {
            let z = i.mul_add(WEIGHTS[0], d * WEIGHTS[1]) + BIAS + rng.gen_range(-1.0..1.0);
            Some(i64::from(z > 0.0))
        })
        .collect();
    let table = RecordBatch::try_from_iter(vec![
        ("income", Arc::new(income) as ArrayRef),
        ("debt", Arc::new(debt) as ArrayRef),
        ("approved", Arc::new(labels) as ArrayRef),
    ])?;

    let mut registry = EvaluatorRegistry::new();
    registry.register("default", || {
        Box::new(DefaultEvaluator::new().with_explainability_backend(Arc::new(LinearAttribution)))
    });

    let store = MemoryTrackingStore::new()?;
    let model = Logistic {
        metadata: ModelMetadata::new("credit-logistic-v1", "linear"),
    };
    let result = evaluate(
        &store,
        &registry,
        &model,
        DatasetSource::Table(table),
        "approved",
        EvaluateOptions::new()
            .model_type("classifier")
            .dataset_name("holdout")
            .evaluator_config(json!({"explainability_algorithm": "kernel"})),
    )?;

    println!("Metrics:");
    for (name, value) in result.metrics() {
        println!("  {name:<28} {value:.4}");
    }

    println!("\nArtifacts:");
    for (name, artifact) in result.artifacts() {
        println!("  {name:<28} {} {}", artifact.class_name(), artifact.uri());
    }

    let run_id = store
        .run_ids()
        .pop()
        .ok_or_else(|| anyhow::anyhow!("no run was recorded"))?;
    let run = store.get_run(&run_id)?;
    println!("\nRun {run_id} ({:?}) holds {} metrics", run.info.status(), run.metrics.len());

    Ok(())
}
