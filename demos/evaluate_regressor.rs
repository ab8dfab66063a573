//! Evaluate a regressor with a custom metric
//!
//! Runs the default evaluator on a noisy linear relationship, adds a
//! residual-quantile custom metric that also returns a JSON artifact, then
//! saves the result to disk and loads it back.
//!
//! Run with: cargo run --example evaluate_regressor

use std::collections::BTreeMap;
use std::sync::Arc;

use arrow::array::{ArrayRef, AsArray, Float64Array};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type};
use arrow::record_batch::RecordBatch;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use tracing_subscriber::EnvFilter;
use trueno_eval::artifacts::{ArtifactValue, JsonKind};
use trueno_eval::custom_metric::{CustomMetric, CustomMetricOutput};
use trueno_eval::dataset::DatasetSource;
use trueno_eval::evaluator::EvaluatorRegistry;
use trueno_eval::model::{Model, ModelMetadata};
use trueno_eval::tracking::MemoryTrackingStore;
use trueno_eval::{evaluate, EvaluateOptions, EvaluationResult};

struct Linear {
    metadata: ModelMetadata,
    slope: f64,
    intercept: f64,
}

impl Model for Linear {
    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    fn predict(&self, features: &RecordBatch) -> trueno_eval::Result<ArrayRef> {
        let x = cast(features.column(0), &DataType::Float64)?;
        Ok(Arc::new(Float64Array::from_iter_values(
            x.as_primitive::<Float64Type>()
                .values()
                .iter()
                .map(|v| v.mul_add(self.slope, self.intercept)),
        )))
    }
}

fn column(batch: &RecordBatch, name: &str) -> anyhow::Result<Vec<f64>> {
    let array = batch
        .column_by_name(name)
        .ok_or_else(|| anyhow::anyhow!("eval_df has no '{name}' column"))?;
    Ok(cast(array, &DataType::Float64)?
        .as_primitive::<Float64Type>()
        .values()
        .to_vec())
}

/// 50th/90th/99th percentile of absolute residuals.
fn residual_quantiles() -> CustomMetric {
    CustomMetric::new("residual_quantiles", |eval_df, builtin| {
        let truth = column(eval_df, "target")?;
        let pred = column(eval_df, "prediction")?;
        let mut residuals: Vec<f64> = truth.iter().zip(&pred).map(|(t, p)| (t - p).abs()).collect();
        residuals.sort_by(f64::total_cmp);
        #[allow(
            clippy::cast_precision_loss,
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss
        )]
        let quantile = |q: f64| residuals[((residuals.len() - 1) as f64 * q).round() as usize];

        let metrics = json!({
            "abs_residual_p50": quantile(0.5),
            "abs_residual_p90": quantile(0.9),
            "abs_residual_p99": quantile(0.99),
        });
        let summary = json!({
            "quantiles": metrics.clone(),
            "relative_to_mae": quantile(0.9) / builtin["mean_absolute_error"],
        });
        let artifacts = BTreeMap::from([("residual_summary".to_string(), ArtifactValue::from(summary))]);
        Ok(Some(CustomMetricOutput::MetricsAndArtifacts(metrics, artifacts)))
    })
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== trueno-eval: Regressor Evaluation ===\n");

    let mut rng = StdRng::seed_from_u64(7);
    let rows: Vec<Vec<f64>> = (0..1_000).map(|_| vec![rng.gen_range(0.0..10.0)]).collect();
    let targets: Float64Array = rows
        .iter()
        .map(|r| Some(3.0f64.mul_add(r[0], 1.0) + rng.gen_range(-0.5..0.5)))
        .collect();

    let store = MemoryTrackingStore::new()?;
    let model = Linear {
        metadata: ModelMetadata::new("linear-v2", "linear"),
        slope: 2.95,
        intercept: 1.1,
    };
    let result = evaluate(
        &store,
        &EvaluatorRegistry::with_builtins(),
        &model,
        DatasetSource::Rows(rows),
        Arc::new(targets) as ArrayRef,
        EvaluateOptions::new()
            .model_type("regressor")
            .dataset_name("synthetic")
            .custom_metric(residual_quantiles()),
    )?;

    println!("Metrics:");
    for (name, value) in result.metrics() {
        println!("  {name:<34} {value:.4}");
    }

    let dir = tempfile::tempdir()?;
    result.save(dir.path())?;
    let loaded = EvaluationResult::load(dir.path())?;
    println!("\nSaved and reloaded from {}", dir.path().display());

    let summary = loaded
        .artifact("residual_summary")
        .and_then(|a| a.downcast_ref::<JsonKind>())
        .ok_or_else(|| anyhow::anyhow!("residual_summary artifact missing"))?;
    println!("residual_summary = {}", summary.content()?);

    Ok(())
}
