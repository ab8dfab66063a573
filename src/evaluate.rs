//! Evaluation entry point
//!
//! [`evaluate`] resolves which evaluators to run and with what config, scopes
//! the work to a tracking run, builds the [`EvaluationDataset`] and merges the
//! results of every evaluator that accepts the model.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use arrow::array::{ArrayRef, Float64Array};
//! use trueno_eval::dataset::DatasetSource;
//! use trueno_eval::evaluate::{evaluate, EvaluateOptions};
//! use trueno_eval::evaluator::EvaluatorRegistry;
//! use trueno_eval::model::Model;
//! use trueno_eval::tracking::MemoryTrackingStore;
//!
//! # fn run(model: &dyn Model) -> trueno_eval::Result<()> {
//! let store = MemoryTrackingStore::new()?;
//! let labels: ArrayRef = Arc::new(Float64Array::from(vec![1.1, 2.1, -3.5]));
//! let result = evaluate(
//!     &store,
//!     &EvaluatorRegistry::with_builtins(),
//!     model,
//!     DatasetSource::Rows(vec![vec![1.0], vec![2.0], vec![-3.0]]),
//!     labels,
//!     EvaluateOptions::new().model_type("regressor").dataset_name("holdout"),
//! )?;
//! println!("mse = {}", result.metrics()["mean_squared_error"]);
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::custom_metric::CustomMetric;
use crate::dataset::{
    infer_model_type_by_labels, DatasetSource, EvaluationDataset, ModelType, Targets,
};
use crate::evaluator::{EvaluationContext, EvaluationResult, EvaluatorConfig, EvaluatorRegistry};
use crate::model::Model;
use crate::tracking::{RunStatus, TrackingStore};
use crate::{Error, Result};

/// Which evaluators to run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EvaluatorSelection {
    /// Every registered evaluator, in registration order.
    #[default]
    All,
    /// One evaluator; its config is passed verbatim.
    One(String),
    /// Several evaluators; duplicates are run once.
    Many(Vec<String>),
}

impl From<&str> for EvaluatorSelection {
    fn from(name: &str) -> Self {
        Self::One(name.to_string())
    }
}

impl From<String> for EvaluatorSelection {
    fn from(name: String) -> Self {
        Self::One(name)
    }
}

impl From<Vec<String>> for EvaluatorSelection {
    fn from(names: Vec<String>) -> Self {
        Self::Many(names)
    }
}

impl From<Vec<&str>> for EvaluatorSelection {
    fn from(names: Vec<&str>) -> Self {
        Self::Many(names.into_iter().map(str::to_string).collect())
    }
}

/// True when `config` maps only names from `names` to objects.
fn is_nested_config(names: &[String], config: &serde_json::Map<String, Value>) -> bool {
    config
        .iter()
        .all(|(key, value)| names.contains(key) && value.is_object())
}

fn sub_config(config: &serde_json::Map<String, Value>, name: &str) -> EvaluatorConfig {
    match config.get(name) {
        Some(Value::Object(sub)) => sub.clone(),
        _ => EvaluatorConfig::new(),
    }
}

/// Resolve the evaluator selection and config into `(name, sub-config)`
/// pairs, in run order.
///
/// # Errors
///
/// Returns `InvalidConfig` when `evaluator_config` is not an object, or when
/// several evaluators may run and it does not map evaluator names to
/// sub-config objects.
pub fn normalize_evaluators_and_config(
    selection: &EvaluatorSelection,
    evaluator_config: Option<&Value>,
    registry: &EvaluatorRegistry,
) -> Result<Vec<(String, EvaluatorConfig)>> {
    let config = match evaluator_config {
        None | Some(Value::Null) => None,
        Some(Value::Object(map)) => Some(map),
        Some(other) => {
            return Err(Error::InvalidConfig(format!(
                "evaluator_config must be a dictionary, got {other}"
            )))
        }
    };

    match selection {
        EvaluatorSelection::All => {
            let names = registry.names();
            if names.len() > 1 {
                warn!(
                    evaluators = ?names,
                    "Multiple registered evaluators are available; all of them will run. \
                     Pass `evaluators` to select specific ones"
                );
            }
            let Some(config) = config else {
                return Ok(names.into_iter().map(|n| (n, EvaluatorConfig::new())).collect());
            };
            if names == ["default"] {
                // A lone default evaluator accepts its own config unwrapped
                let default = match config.get("default") {
                    Some(Value::Object(sub)) => sub.clone(),
                    _ => config.clone(),
                };
                return Ok(vec![("default".to_string(), default)]);
            }
            if !is_nested_config(&names, config) {
                return Err(Error::InvalidConfig(
                    "If `evaluators` argument is None, all available evaluators will be used. \
                     If only the default evaluator is available, the `evaluator_config` argument \
                     is interpreted as the config dictionary for the default evaluator. Otherwise, \
                     the `evaluator_config` argument must be a dictionary mapping each \
                     evaluator's name to its own evaluator config dictionary."
                        .to_string(),
                ));
            }
            Ok(names
                .into_iter()
                .map(|n| {
                    let sub = sub_config(config, &n);
                    (n, sub)
                })
                .collect())
        }
        EvaluatorSelection::One(name) => {
            Ok(vec![(name.clone(), config.cloned().unwrap_or_default())])
        }
        EvaluatorSelection::Many(names) => {
            if let Some(config) = config {
                if !is_nested_config(names, config) {
                    return Err(Error::InvalidConfig(
                        "If `evaluators` argument is an evaluator name list, evaluator_config \
                         must be a dict contains mapping from evaluator name to individual \
                         evaluator config dict."
                            .to_string(),
                    ));
                }
            }
            let mut seen = HashSet::new();
            Ok(names
                .iter()
                .filter(|n| seen.insert(n.as_str()))
                .map(|n| {
                    let sub = config.map(|c| sub_config(c, n)).unwrap_or_default();
                    (n.clone(), sub)
                })
                .collect())
        }
    }
}

/// Run scope returned by [`start_run_or_reuse_active_run`].
///
/// A run started by the guard is ended as `Success` by [`finish`](Self::finish)
/// and as `Failed` if the guard is dropped first. A reused run is never ended.
pub struct ActiveRun<'a> {
    store: &'a dyn TrackingStore,
    run_id: String,
    started_here: bool,
    finished: bool,
}

impl std::fmt::Debug for ActiveRun<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveRun")
            .field("run_id", &self.run_id)
            .field("started_here", &self.started_here)
            .finish_non_exhaustive()
    }
}

impl ActiveRun<'_> {
    /// Run identifier.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Whether this guard started the run.
    #[must_use]
    pub const fn started_here(&self) -> bool {
        self.started_here
    }

    /// End a run started by this guard as `Success`.
    ///
    /// # Errors
    ///
    /// Returns the store error if the run cannot be ended.
    pub fn finish(mut self) -> Result<()> {
        self.finished = true;
        if self.started_here {
            self.store.end_run(&self.run_id, RunStatus::Success)?;
            info!(run_id = %self.run_id, "Ended evaluation run");
        }
        Ok(())
    }
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        if self.started_here && !self.finished {
            if let Err(e) = self.store.end_run(&self.run_id, RunStatus::Failed) {
                warn!(run_id = %self.run_id, error = %e, "Failed to end evaluation run");
            } else {
                info!(run_id = %self.run_id, "Ended failed evaluation run");
            }
        }
    }
}

/// Reuse the store's active run or start a new one.
///
/// # Errors
///
/// Returns the store error if a new run cannot be started.
pub fn start_run_or_reuse_active_run(store: &dyn TrackingStore) -> Result<ActiveRun<'_>> {
    if let Some(run_id) = store.active_run_id() {
        debug!(%run_id, "Reusing active run");
        return Ok(ActiveRun {
            store,
            run_id,
            started_here: false,
            finished: false,
        });
    }
    let run_id = store.start_run()?;
    info!(%run_id, "Started evaluation run");
    Ok(ActiveRun {
        store,
        run_id,
        started_here: true,
        finished: false,
    })
}

/// Optional arguments of [`evaluate`].
#[derive(Debug, Clone, Default)]
pub struct EvaluateOptions {
    model_type: Option<String>,
    dataset_name: Option<String>,
    dataset_path: Option<String>,
    feature_names: Option<Vec<String>>,
    evaluators: EvaluatorSelection,
    evaluator_config: Option<Value>,
    custom_metrics: Vec<CustomMetric>,
}

impl EvaluateOptions {
    /// Defaults: inferred model type, hash as dataset name, every evaluator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `"classifier"` or `"regressor"`; inferred from the labels if unset.
    #[must_use]
    pub fn model_type(mut self, model_type: impl Into<String>) -> Self {
        self.model_type = Some(model_type.into());
        self
    }

    /// Dataset name used in metric and artifact key suffixes.
    #[must_use]
    pub fn dataset_name(mut self, name: impl Into<String>) -> Self {
        self.dataset_name = Some(name.into());
        self
    }

    /// Dataset provenance path.
    #[must_use]
    pub fn dataset_path(mut self, path: impl Into<String>) -> Self {
        self.dataset_path = Some(path.into());
        self
    }

    /// Feature names (or the feature column selection for tables).
    #[must_use]
    pub fn feature_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.feature_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Evaluator selection.
    #[must_use]
    pub fn evaluators(mut self, evaluators: impl Into<EvaluatorSelection>) -> Self {
        self.evaluators = evaluators.into();
        self
    }

    /// Evaluator config: one evaluator's config, or a map from evaluator
    /// name to config.
    #[must_use]
    pub fn evaluator_config(mut self, config: Value) -> Self {
        self.evaluator_config = Some(config);
        self
    }

    /// Append a custom metric.
    #[must_use]
    pub fn custom_metric(mut self, metric: CustomMetric) -> Self {
        self.custom_metrics.push(metric);
        self
    }

    /// Replace the custom metric list.
    #[must_use]
    pub fn custom_metrics(mut self, metrics: Vec<CustomMetric>) -> Self {
        self.custom_metrics = metrics;
        self
    }
}

/// Evaluate `model` on the given data with the selected evaluators.
///
/// Metrics and artifacts are persisted to the active run of `store` (or a
/// run started for this call) and returned unsuffixed. Results of several
/// evaluators are merged; later evaluators win on key collisions.
///
/// # Errors
///
/// - `UnsupportedModelType` for a model type other than classifier/regressor
/// - `InvalidConfig` for a malformed `evaluator_config`
/// - `InvalidInput` for malformed data or labels whose model type cannot be
///   inferred
/// - `NoApplicableEvaluator` if no selected evaluator accepts the model
/// - any error of the evaluators or the store
pub fn evaluate(
    store: &dyn TrackingStore,
    registry: &EvaluatorRegistry,
    model: &dyn Model,
    source: impl Into<DatasetSource>,
    targets: impl Into<Targets>,
    options: EvaluateOptions,
) -> Result<EvaluationResult> {
    let declared_type = options
        .model_type
        .as_deref()
        .map(str::parse::<ModelType>)
        .transpose()?;
    let selected = normalize_evaluators_and_config(
        &options.evaluators,
        options.evaluator_config.as_ref(),
        registry,
    )?;

    let run = start_run_or_reuse_active_run(store)?;

    let mut builder = EvaluationDataset::builder(source, targets);
    if let Some(name) = options.dataset_name {
        builder = builder.name(name);
    }
    if let Some(path) = options.dataset_path {
        builder = builder.path(path);
    }
    if let Some(names) = options.feature_names {
        builder = builder.feature_names(names);
    }
    let dataset = builder.build()?;

    let model_type = match declared_type {
        Some(model_type) => model_type,
        None => infer_model_type_by_labels(dataset.labels_data()).ok_or_else(|| {
            Error::InvalidInput(
                "Unable to infer the model type from the labels; please specify \
                 `model_type` as 'classifier' or 'regressor'"
                    .to_string(),
            )
        })?,
    };

    let mut result = EvaluationResult::default();
    let mut evaluated = 0_usize;
    for (name, evaluator_config) in &selected {
        let Some(evaluator) = registry.get(name) else {
            warn!(evaluator = %name, "Evaluator is not registered; skipping");
            continue;
        };
        if !evaluator.can_evaluate(model_type, evaluator_config) {
            debug!(evaluator = %name, %model_type, "Evaluator declined the model");
            continue;
        }
        info!(evaluator = %name, dataset = dataset.name(), "Evaluating with evaluator");
        let context = EvaluationContext {
            model,
            model_type,
            dataset: &dataset,
            run_id: run.run_id(),
            evaluator_config,
            custom_metrics: &options.custom_metrics,
            store,
        };
        result.merge(evaluator.evaluate(&context)?);
        evaluated += 1;
    }
    if evaluated == 0 {
        return Err(Error::NoApplicableEvaluator);
    }

    dataset.log_dataset_tag(store, run.run_id(), model.metadata().model_uuid())?;
    run.finish()?;
    Ok(result)
}
