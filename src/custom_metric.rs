//! User-supplied metrics
//!
//! A [`CustomMetric`] wraps a function invoked with the working table
//! (feature columns, `prediction`, `target`) and the builtin metrics. Whether
//! it also receives a scratch directory for file-backed artifacts is fixed
//! when the metric is created.
//!
//! ## Example
//!
//! ```rust
//! use serde_json::json;
//! use trueno_eval::custom_metric::{CustomMetric, CustomMetricOutput};
//!
//! let metric = CustomMetric::new("pred_rows", |eval_df, _builtin| {
//!     Ok(Some(CustomMetricOutput::Metrics(json!({ "rows": eval_df.num_rows() }))))
//! });
//! assert!(!metric.wants_artifacts_dir());
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use arrow::array::RecordBatch;
use serde_json::Value;

use crate::artifacts::ArtifactValue;
use crate::metrics::Metrics;
use crate::{Error, Result};

/// Return value of a custom metric function.
#[derive(Debug, Clone)]
pub enum CustomMetricOutput {
    /// Only metrics; must be a JSON object of numbers.
    Metrics(Value),
    /// Metrics plus named artifacts.
    MetricsAndArtifacts(Value, BTreeMap<String, ArtifactValue>),
}

type MetricsFn =
    dyn Fn(&RecordBatch, &Metrics) -> anyhow::Result<Option<CustomMetricOutput>> + Send + Sync;

type MetricsWithDirFn = dyn Fn(&RecordBatch, &Metrics, &Path) -> anyhow::Result<Option<CustomMetricOutput>>
    + Send
    + Sync;

#[derive(Clone)]
enum CustomMetricFn {
    Plain(Arc<MetricsFn>),
    WithArtifactsDir(Arc<MetricsWithDirFn>),
}

/// A named user metric function.
#[derive(Clone)]
pub struct CustomMetric {
    name: String,
    description: String,
    func: CustomMetricFn,
}

impl fmt::Debug for CustomMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomMetric")
            .field("name", &self.name)
            .field("wants_artifacts_dir", &self.wants_artifacts_dir())
            .finish_non_exhaustive()
    }
}

impl CustomMetric {
    /// Metric called with `(eval_df, builtin_metrics)`.
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&RecordBatch, &Metrics) -> anyhow::Result<Option<CustomMetricOutput>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            description: String::new(),
            func: CustomMetricFn::Plain(Arc::new(func)),
        }
    }

    /// Metric called with `(eval_df, builtin_metrics, artifacts_dir)`; files
    /// it writes under `artifacts_dir` may be returned as path artifacts.
    pub fn with_artifacts_dir<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&RecordBatch, &Metrics, &Path) -> anyhow::Result<Option<CustomMetricOutput>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            description: String::new(),
            func: CustomMetricFn::WithArtifactsDir(Arc::new(func)),
        }
    }

    /// Attach a free-form description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Metric name, used in error messages.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Free-form description.
    #[must_use]
    pub fn get_description(&self) -> &str {
        &self.description
    }

    /// Whether the function takes a scratch directory.
    #[must_use]
    pub const fn wants_artifacts_dir(&self) -> bool {
        matches!(self.func, CustomMetricFn::WithArtifactsDir(_))
    }
}

fn contract_error(metric: &CustomMetric, index: usize, message: impl Into<String>) -> Error {
    Error::CustomMetric {
        name: metric.name.clone(),
        index,
        message: message.into(),
    }
}

fn validate_metrics(metric: &CustomMetric, index: usize, value: Value) -> Result<Metrics> {
    let Value::Object(map) = value else {
        return Err(contract_error(
            metric,
            index,
            format!("did not return in an expected format: {value}"),
        ));
    };
    map.into_iter()
        .map(|(key, value)| match value.as_f64() {
            Some(number) if !key.is_empty() => Ok((key, number)),
            _ => Err(contract_error(
                metric,
                index,
                format!(
                    "did not return metrics as a dictionary of string metric names with \
                     numerical values: offending entry '{key}': {value}"
                ),
            )),
        })
        .collect()
}

/// Invoke one custom metric and validate what it returns.
///
/// `index` is the metric's position in the caller's list and appears in
/// error messages.
///
/// # Errors
///
/// Returns `CustomMetric` if the function fails, returns nothing, returns
/// metrics that are not an object of numbers, or returns an artifact with an
/// empty name. Returns `InvalidInput` if the metric needs a scratch directory
/// and none was provided.
pub fn evaluate_custom_metric(
    metric: &CustomMetric,
    index: usize,
    eval_df: &RecordBatch,
    builtin_metrics: &Metrics,
    artifacts_dir: Option<&Path>,
) -> Result<(Metrics, Option<BTreeMap<String, ArtifactValue>>)> {
    let output = match &metric.func {
        CustomMetricFn::Plain(func) => func(eval_df, builtin_metrics),
        CustomMetricFn::WithArtifactsDir(func) => {
            let dir = artifacts_dir.ok_or_else(|| {
                Error::InvalidInput(format!(
                    "Custom metric '{}' requires an artifacts directory",
                    metric.name
                ))
            })?;
            func(eval_df, builtin_metrics, dir)
        }
    }
    .map_err(|e| contract_error(metric, index, format!("failed: {e:#}")))?;

    match output {
        None => Err(contract_error(metric, index, "returned None")),
        Some(CustomMetricOutput::Metrics(metrics)) => {
            Ok((validate_metrics(metric, index, metrics)?, None))
        }
        Some(CustomMetricOutput::MetricsAndArtifacts(metrics, artifacts)) => {
            let metrics = validate_metrics(metric, index, metrics)?;
            if artifacts.keys().any(String::is_empty) {
                return Err(contract_error(
                    metric,
                    index,
                    "did not return artifacts as a dictionary of string artifact names with \
                     their corresponding objects",
                ));
            }
            Ok((metrics, Some(artifacts)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::regressor_metrics;
    use arrow::array::{ArrayRef, Float64Array, Int64Array};
    use serde_json::json;

    fn eval_df() -> RecordBatch {
        RecordBatch::try_from_iter(vec![
            (
                "prediction",
                std::sync::Arc::new(Float64Array::from(vec![1.2, 1.9, 3.2])) as ArrayRef,
            ),
            (
                "target",
                std::sync::Arc::new(Int64Array::from(vec![1, 2, 3])) as ArrayRef,
            ),
        ])
        .unwrap()
    }

    fn builtin() -> Metrics {
        regressor_metrics(&[1.0, 2.0, 3.0], &[1.2, 1.9, 3.2])
    }

    fn run(metric: &CustomMetric) -> Result<(Metrics, Option<BTreeMap<String, ArtifactValue>>)> {
        evaluate_custom_metric(metric, 0, &eval_df(), &builtin(), None)
    }

    #[test]
    fn test_returned_none() {
        let metric = CustomMetric::new("dummy_fn", |_, _| Ok(None));
        let err = run(&metric).unwrap_err().to_string();
        assert!(err.contains("'dummy_fn'"));
        assert!(err.contains("returned None"));
    }

    #[test]
    fn test_wrong_shape() {
        let metric = CustomMetric::new("incorrect_return_type", |_, _| {
            Ok(Some(CustomMetricOutput::Metrics(json!(3))))
        });
        let err = run(&metric).unwrap_err().to_string();
        assert!(err.contains("did not return in an expected format"));
    }

    #[test]
    fn test_non_numeric_metric_value() {
        let metric = CustomMetric::new("non_numerical_metric_value", |_, _| {
            Ok(Some(CustomMetricOutput::Metrics(
                json!({"stuff": 12, "non_numerical_metric": "123"}),
            )))
        });
        let err = run(&metric).unwrap_err().to_string();
        assert!(err.contains(
            "did not return metrics as a dictionary of string metric names with numerical values"
        ));
    }

    #[test]
    fn test_empty_artifact_name() {
        let metric = CustomMetric::new("non_str_artifact_name", |_, _| {
            let artifacts = BTreeMap::from([(String::new(), ArtifactValue::Json(json!([1, 2])))]);
            Ok(Some(CustomMetricOutput::MetricsAndArtifacts(
                json!({"a": 32.1}),
                artifacts,
            )))
        });
        let err = run(&metric).unwrap_err().to_string();
        assert!(err.contains("did not return artifacts as a dictionary"));
    }

    #[test]
    fn test_user_error_is_wrapped() {
        let metric = CustomMetric::new("boom", |_, _| anyhow::bail!("division by zero"));
        let err = run(&metric).unwrap_err();
        assert!(matches!(err, Error::CustomMetric { index: 0, .. }));
        assert!(err.to_string().contains("division by zero"));
    }

    #[test]
    fn test_success_uses_builtin_metrics() {
        let metric = CustomMetric::new("example_custom_metric", |_, given| {
            Ok(Some(CustomMetricOutput::Metrics(json!({
                "example_count_times_1_point_5": given["example_count"] * 1.5,
                "sum_on_label_minus_5": given["sum_on_label"] - 5.0,
            }))))
        });
        let (metrics, artifacts) = run(&metric).unwrap();
        assert!((metrics["example_count_times_1_point_5"] - 4.5).abs() < 1e-12);
        assert!((metrics["sum_on_label_minus_5"] - 1.0).abs() < 1e-12);
        assert!(artifacts.is_none());
    }

    #[test]
    fn test_scratch_dir_required() {
        let metric = CustomMetric::with_artifacts_dir("writes_files", |_, _, _| {
            Ok(Some(CustomMetricOutput::Metrics(json!({}))))
        });
        assert!(matches!(run(&metric), Err(Error::InvalidInput(_))));
        let dir = tempfile::tempdir().unwrap();
        assert!(
            evaluate_custom_metric(&metric, 0, &eval_df(), &builtin(), Some(dir.path())).is_ok()
        );
    }
}
