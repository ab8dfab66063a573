//! Built-in evaluator for classifiers and regressors.
//!
//! Work happens in two phases. Everything is computed and staged in memory
//! first (predictions, metrics, plots, explanations, custom metrics); only a
//! fully successful computation is persisted to the run. Persisted keys carry
//! the `_on_data_<dataset name>` suffix, returned keys do not.

use std::collections::BTreeMap;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, Int64Array, RecordBatch};
use arrow::datatypes::{DataType, Field, Schema};
use tracing::{debug, info, warn};

use super::{DefaultEvaluatorConfig, EvaluationContext, EvaluationResult, EvaluatorConfig, ModelEvaluator};
use crate::artifacts::{ArtifactValue, EvaluationArtifact, StagedArtifact};
use crate::custom_metric::evaluate_custom_metric;
use crate::dataset::{
    compute_mode_or_mean, labels_from_array, labels_to_array, numeric_values, unique_labels, Label,
    ModelType,
};
use crate::explain::{
    beeswarm_plot, display_feature_names, feature_importance_plot, summary_plot,
    ExplainRequest, ExplainabilityBackend, ExplainerAlgorithm,
};
use crate::metrics::{
    binary_sum_up_label_pred_prob, classifier_curve, classifier_global_metrics,
    classifier_per_class_metrics, confusion_matrix, lift_curve, regressor_metrics, Curve,
    CurveArea, CurveType, Metrics,
};
use crate::plot::{Figure, Heatmap};
use crate::tracking::MetricRecord;
use crate::{Error, Result};

/// Name of the explainer object artifact (persisted only, never returned).
const EXPLAINER_ARTIFACT: &str = "explainer";

const EVAL_DF_PREDICTION: &str = "prediction";
const EVAL_DF_TARGET: &str = "target";

/// Evaluator computing the standard metric and artifact set.
///
/// Explainability artifacts are produced only when an
/// [`ExplainabilityBackend`] is attached.
#[derive(Clone, Default)]
pub struct DefaultEvaluator {
    explainer: Option<Arc<dyn ExplainabilityBackend>>,
}

impl std::fmt::Debug for DefaultEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultEvaluator")
            .field("explainability", &self.explainer.is_some())
            .finish()
    }
}

impl DefaultEvaluator {
    /// Evaluator without explainability.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an explainability backend.
    #[must_use]
    pub fn with_explainability_backend(mut self, backend: Arc<dyn ExplainabilityBackend>) -> Self {
        self.explainer = Some(backend);
        self
    }
}

impl ModelEvaluator for DefaultEvaluator {
    fn can_evaluate(&self, model_type: ModelType, _evaluator_config: &EvaluatorConfig) -> bool {
        matches!(model_type, ModelType::Classifier | ModelType::Regressor)
    }

    fn evaluate(&self, context: &EvaluationContext<'_>) -> Result<EvaluationResult> {
        let config = DefaultEvaluatorConfig::from_config(context.evaluator_config)?;
        let mut run = EvaluationRun::new(context, config, self.explainer.as_deref());
        run.compute()?;
        run.persist()
    }
}

/// Staged state of one default evaluation.
struct EvaluationRun<'a> {
    context: &'a EvaluationContext<'a>,
    config: DefaultEvaluatorConfig,
    explainer: Option<&'a dyn ExplainabilityBackend>,
    metrics: Metrics,
    artifacts: BTreeMap<String, StagedArtifact>,
    // persisted but not returned
    logged_only: BTreeMap<String, StagedArtifact>,
}

impl<'a> EvaluationRun<'a> {
    fn new(
        context: &'a EvaluationContext<'a>,
        config: DefaultEvaluatorConfig,
        explainer: Option<&'a dyn ExplainabilityBackend>,
    ) -> Self {
        Self {
            context,
            config,
            explainer,
            metrics: Metrics::new(),
            artifacts: BTreeMap::new(),
            logged_only: BTreeMap::new(),
        }
    }

    fn stage_figure(&mut self, name: &str, figure: impl Into<Figure>) -> Result<()> {
        let staged = StagedArtifact::stage(ArtifactValue::Figure(figure.into()))?;
        self.artifacts.insert(name.to_string(), staged);
        Ok(())
    }

    fn compute(&mut self) -> Result<()> {
        let dataset = self.context.dataset;
        let features = dataset.features_data();
        debug!(dataset = dataset.name(), rows = dataset.num_rows(), "Predicting");
        let y_pred = self.context.model.predict(features)?;
        if y_pred.len() != dataset.num_rows() {
            return Err(Error::Model(format!(
                "predict returned {} values for {} rows",
                y_pred.len(),
                dataset.num_rows()
            )));
        }

        match self.context.model_type {
            ModelType::Classifier => self.compute_classifier(&y_pred)?,
            ModelType::Regressor => self.compute_regressor(&y_pred)?,
        }
        self.compute_score();
        self.compute_explainability()?;
        self.compute_custom_metrics(&y_pred)
    }

    fn compute_regressor(&mut self, y_pred: &ArrayRef) -> Result<()> {
        let y_true = numeric_values(self.context.dataset.labels_data())?;
        let y_pred = numeric_values(y_pred)?;
        self.metrics.extend(regressor_metrics(&y_true, &y_pred));
        Ok(())
    }

    fn predict_proba(&self, num_labels: usize) -> Result<Option<Vec<Vec<f64>>>> {
        let Some(estimator) = self.context.model.raw_estimator() else {
            return Ok(None);
        };
        let Some(probs) = estimator.predict_proba(self.context.dataset.features_data()) else {
            debug!("Estimator has no probability function");
            return Ok(None);
        };
        let probs = probs?;
        let aligned = probs.len() == self.context.dataset.num_rows()
            && probs.iter().all(|row| row.len() == num_labels);
        if aligned {
            Ok(Some(probs))
        } else {
            warn!(
                num_labels,
                "Probability output does not have one column per label; skipping probability based metrics"
            );
            Ok(None)
        }
    }

    fn compute_classifier(&mut self, y_pred: &ArrayRef) -> Result<()> {
        let y_true = labels_from_array(self.context.dataset.labels_data())?;
        let y_pred = labels_from_array(y_pred)?;
        let labels = unique_labels(&y_true);
        let is_binary = labels.len() <= 2;
        let y_probs = self.predict_proba(labels.len())?;

        self.metrics.extend(classifier_global_metrics(
            is_binary,
            &y_true,
            &y_pred,
            y_probs.as_deref(),
            &labels,
        ));

        if is_binary {
            self.compute_binary_artifacts(&y_true, &y_pred, y_probs.as_deref(), &labels)?;
        } else {
            self.compute_multiclass_artifacts(&y_true, &y_pred, y_probs.as_deref(), &labels)?;
        }

        let matrix = confusion_matrix(&y_true, &y_pred, &labels);
        let tick_labels: Vec<String> = labels.iter().map(ToString::to_string).collect();
        #[allow(clippy::cast_precision_loss)]
        let heatmap = Heatmap {
            title: Some("Confusion matrix".to_string()),
            values: matrix.mapv(|count| count as f64),
            row_labels: tick_labels.clone(),
            col_labels: tick_labels,
            xlabel: "Predicted label".to_string(),
            ylabel: "True label".to_string(),
        };
        self.stage_figure("confusion_matrix", Figure::Heatmap(heatmap))
    }

    fn compute_binary_artifacts(
        &mut self,
        y_true: &[Label],
        y_pred: &[Label],
        y_probs: Option<&[Vec<f64>]>,
        labels: &[Label],
    ) -> Result<()> {
        let Some(positive) = labels.last() else {
            return Ok(());
        };
        let view = binary_sum_up_label_pred_prob(labels.len() - 1, positive, y_true, y_pred, None);
        self.metrics
            .extend(classifier_per_class_metrics(&view.y_true, &view.y_pred));

        let Some(probs) = y_probs else {
            return Ok(());
        };
        let roc = classifier_curve(true, y_true, probs, labels, CurveType::Roc);
        let pr = classifier_curve(true, y_true, probs, labels, CurveType::Pr);
        if let CurveArea::Single(area) = roc.area {
            self.metrics.insert("roc_auc".to_string(), area);
        }
        if let CurveArea::Single(area) = pr.area {
            self.metrics.insert("precision_recall_auc".to_string(), area);
        }
        self.stage_figure("roc_curve_plot", roc.plot)?;
        self.stage_figure("precision_recall_curve_plot", pr.plot)?;
        self.stage_figure("lift_curve_plot", lift_curve(y_true, probs, labels))
    }

    fn compute_multiclass_artifacts(
        &mut self,
        y_true: &[Label],
        y_pred: &[Label],
        y_probs: Option<&[Vec<f64>]>,
        labels: &[Label],
    ) -> Result<()> {
        let curves: Option<(Curve, Curve)> = y_probs.map(|probs| {
            (
                classifier_curve(false, y_true, probs, labels, CurveType::Roc),
                classifier_curve(false, y_true, probs, labels, CurveType::Pr),
            )
        });
        let per_label_area = |curve: &Curve| match &curve.area {
            CurveArea::PerLabel(areas) => areas.clone(),
            CurveArea::Single(area) => vec![*area],
        };
        let areas = curves
            .as_ref()
            .map(|(roc, pr)| (per_label_area(roc), per_label_area(pr)));

        let per_class: Vec<Metrics> = labels
            .iter()
            .enumerate()
            .map(|(index, label)| {
                let view = binary_sum_up_label_pred_prob(index, label, y_true, y_pred, None);
                classifier_per_class_metrics(&view.y_true, &view.y_pred)
            })
            .collect();
        let table = per_class_metrics_table(labels, &per_class, areas.as_ref())?;
        self.artifacts.insert(
            "per_class_metrics".to_string(),
            StagedArtifact::stage(ArtifactValue::Table(table))?,
        );

        if let Some((roc, pr)) = curves {
            self.stage_figure("roc_curve_plot", roc.plot)?;
            self.stage_figure("precision_recall_curve_plot", pr.plot)?;
        }
        Ok(())
    }

    fn compute_score(&mut self) {
        let Some(estimator) = self.context.model.raw_estimator() else {
            return;
        };
        let dataset = self.context.dataset;
        match estimator.score(dataset.features_data(), dataset.labels_data()) {
            Some(Ok(score)) => {
                self.metrics.insert("score".to_string(), score);
            }
            Some(Err(e)) => warn!(error = %e, "Estimator score failed; omitting the score metric"),
            None => debug!("Estimator has no score function"),
        }
    }

    fn explainability_skip_reason(&self) -> Option<&'static str> {
        if self.explainer.is_none() {
            return Some("no explainability backend is configured");
        }
        if !self.config.log_model_explainability {
            return Some("explainability is disabled by configuration");
        }
        if !self.context.model.metadata().is_explainable() {
            return Some("the model flavor does not support explainability");
        }
        let all_numeric = self
            .context
            .dataset
            .features_data()
            .schema()
            .fields()
            .iter()
            .all(|f| f.data_type().is_numeric() || f.data_type() == &DataType::Boolean);
        if !all_numeric && self.config.explainability_algorithm != Some(ExplainerAlgorithm::Kernel) {
            return Some("non-numeric features require the kernel algorithm");
        }
        None
    }

    fn compute_explainability(&mut self) -> Result<()> {
        if let Some(reason) = self.explainability_skip_reason() {
            if self.explainer.is_some() {
                warn!(reason, "Skipping explainability");
            } else {
                debug!(reason, "Skipping explainability");
            }
            return Ok(());
        }
        match self.explain() {
            Ok(()) => Ok(()),
            Err(e) if self.config.ignore_exceptions => {
                warn!(error = %e, "Explainability failed; continuing without it");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn explain(&mut self) -> Result<()> {
        let Some(backend) = self.explainer else {
            return Ok(());
        };
        let dataset = self.context.dataset;
        let features = dataset.features_data();
        let sample = features.slice(0, self.config.explainability_nsamples.min(features.num_rows()));
        let algorithm = self.config.explainability_algorithm;
        let background = if algorithm == Some(ExplainerAlgorithm::Kernel) {
            Some(compute_mode_or_mean(features)?)
        } else {
            None
        };
        let names = display_feature_names(dataset.feature_names());

        debug!(
            algorithm = algorithm.map_or("auto", ExplainerAlgorithm::as_str),
            rows = sample.num_rows(),
            "Computing explanations"
        );
        let explanation = backend.explain(&ExplainRequest {
            algorithm,
            features: &sample,
            background: background.as_ref(),
            feature_names: &names,
            model: self.context.model,
        })?;
        if explanation.values.ncols() != names.len() || explanation.data.dim() != explanation.values.dim() {
            return Err(Error::Explainability(format!(
                "expected attributions for {} features, got shape {:?}",
                names.len(),
                explanation.values.dim()
            )));
        }

        self.stage_figure("shap_beeswarm_plot", beeswarm_plot(&explanation, &names))?;
        self.stage_figure("shap_summary_plot", summary_plot(&explanation, &names))?;
        self.stage_figure(
            "shap_feature_importance_plot",
            feature_importance_plot(&explanation, &names),
        )?;
        if let Some(state) = explanation.explainer {
            self.logged_only.insert(
                EXPLAINER_ARTIFACT.to_string(),
                StagedArtifact::stage(ArtifactValue::Object(state))?,
            );
        }
        Ok(())
    }

    /// Features plus `prediction` and `target` columns. A feature column
    /// with either name is overwritten in place.
    fn eval_df(&self, y_pred: &ArrayRef) -> Result<RecordBatch> {
        let features = self.context.dataset.features_data();
        let labels = self.context.dataset.labels_data();
        let mut fields: Vec<Field> = features
            .schema()
            .fields()
            .iter()
            .map(|f| f.as_ref().clone())
            .collect();
        let mut columns: Vec<ArrayRef> = features.columns().to_vec();
        for (name, column) in [(EVAL_DF_PREDICTION, y_pred), (EVAL_DF_TARGET, labels)] {
            let field = Field::new(name, column.data_type().clone(), true);
            match fields.iter().position(|f| f.name() == name) {
                Some(i) => {
                    fields[i] = field;
                    columns[i] = Arc::clone(column);
                }
                None => {
                    fields.push(field);
                    columns.push(Arc::clone(column));
                }
            }
        }
        Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
    }

    fn compute_custom_metrics(&mut self, y_pred: &ArrayRef) -> Result<()> {
        let custom_metrics = self.context.custom_metrics;
        if custom_metrics.is_empty() {
            return Ok(());
        }
        let eval_df = self.eval_df(y_pred)?;
        // Removed on every exit path when dropped
        let scratch = if custom_metrics.iter().any(|m| m.wants_artifacts_dir()) {
            Some(tempfile::tempdir()?)
        } else {
            None
        };

        for (index, metric) in custom_metrics.iter().enumerate() {
            let builtin = self.metrics.clone();
            debug!(name = metric.name(), index, "Evaluating custom metric");
            let (metrics, artifacts) = evaluate_custom_metric(
                metric,
                index,
                &eval_df,
                &builtin,
                scratch.as_ref().map(tempfile::TempDir::path),
            )?;
            self.metrics.extend(metrics);
            for (name, value) in artifacts.into_iter().flatten() {
                if self.artifacts.contains_key(&name) {
                    return Err(Error::ArtifactNameConflict(format!(
                        "Custom metric '{}' (index = {index}) produced an artifact '{name}' that \
                         cannot be logged because there already exists an artifact with the same name",
                        metric.name()
                    )));
                }
                self.artifacts.insert(name, StagedArtifact::stage(value)?);
            }
        }
        Ok(())
    }

    fn persist(self) -> Result<EvaluationResult> {
        let context = self.context;
        let suffix = format!("_on_data_{}", context.dataset.name());

        let records: Vec<MetricRecord> = self
            .metrics
            .iter()
            .map(|(key, value)| MetricRecord::new(context.run_id, format!("{key}{suffix}"), 0, *value))
            .collect();
        context.store.log_metrics(records)?;

        let scratch = tempfile::tempdir()?;
        let mut artifacts: BTreeMap<String, Arc<dyn EvaluationArtifact>> = BTreeMap::new();
        for (key, staged) in self.artifacts {
            let file_name = format!("{key}{suffix}.{}", staged.extension());
            let local = scratch.path().join(&file_name);
            staged.write(&local)?;
            let uri = context.store.log_artifact(context.run_id, &local, &file_name)?;
            artifacts.insert(key, staged.into_artifact(uri));
        }
        for (key, staged) in self.logged_only {
            let file_name = format!("{key}{suffix}");
            let local = scratch.path().join(&file_name);
            staged.write(&local)?;
            context.store.log_artifact(context.run_id, &local, &file_name)?;
        }

        info!(
            run_id = context.run_id,
            dataset = context.dataset.name(),
            metrics = self.metrics.len(),
            artifacts = artifacts.len(),
            "Persisted default evaluation"
        );
        Ok(EvaluationResult::new(self.metrics, artifacts))
    }
}

/// One row per label: `positive_class`, the confusion counts, recall,
/// precision, f1 and, with probabilities, the per-class curve areas.
fn per_class_metrics_table(
    labels: &[Label],
    per_class: &[Metrics],
    areas: Option<&(Vec<f64>, Vec<f64>)>,
) -> Result<RecordBatch> {
    let mut fields = vec![Field::new(
        "positive_class",
        labels_to_array(labels).data_type().clone(),
        false,
    )];
    let mut columns: Vec<ArrayRef> = vec![labels_to_array(labels)];

    for key in ["true_negatives", "false_positives", "false_negatives", "true_positives"] {
        #[allow(clippy::cast_possible_truncation)]
        let counts: Int64Array = per_class.iter().map(|m| Some(m[key] as i64)).collect();
        fields.push(Field::new(key, DataType::Int64, false));
        columns.push(Arc::new(counts));
    }
    for key in ["recall", "precision", "f1_score"] {
        let values: Float64Array = per_class.iter().map(|m| Some(m[key])).collect();
        fields.push(Field::new(key, DataType::Float64, false));
        columns.push(Arc::new(values));
    }
    if let Some((roc, pr)) = areas {
        for (key, values) in [("roc_auc", roc), ("precision_recall_auc", pr)] {
            fields.push(Field::new(key, DataType::Float64, false));
            columns.push(Arc::new(Float64Array::from(values.clone())));
        }
    }
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}
