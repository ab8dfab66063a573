//! End-to-end tests of `evaluate`: evaluator selection, run scoping, model
//! type handling, result merging and dataset provenance tags.

mod common;

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, RecordBatch, StringArray};
use common::{
    assert_close, binary_rows, regression_rows, DecliningEvaluator, FixedEvaluator,
    ShiftRegressor, ThresholdClassifier,
};
use serde_json::{json, Value};
use trueno_eval::dataset::{DatasetSource, DATASETS_TAG_KEY};
use trueno_eval::evaluate::{evaluate, EvaluateOptions, EvaluatorSelection};
use trueno_eval::evaluator::EvaluatorRegistry;
use trueno_eval::metrics::Metrics;
use trueno_eval::tracking::{MemoryTrackingStore, RunStatus, TrackingStore};
use trueno_eval::Error;

fn declining_registry() -> EvaluatorRegistry {
    let mut registry = EvaluatorRegistry::new();
    registry.register("nope", || Box::new(DecliningEvaluator));
    registry
}

// ============================================================================
// Happy paths
// ============================================================================

#[test]
fn test_regressor_metrics_suffixed_on_run() {
    let store = MemoryTrackingStore::new().unwrap();
    let (rows, labels) = regression_rows();
    let result = evaluate(
        &store,
        &EvaluatorRegistry::with_builtins(),
        &ShiftRegressor::new(0.0),
        DatasetSource::Rows(rows),
        labels,
        EvaluateOptions::new()
            .model_type("regressor")
            .dataset_name("foo"),
    )
    .unwrap();

    assert!(result.metrics().contains_key("mean_squared_error"));
    assert!(!result.metrics().contains_key("mean_squared_error_on_data_foo"));
    assert_eq!(store.run_count(), 1);
    assert!(store.active_run_id().is_none());
}

#[test]
fn test_reuses_active_run_and_appends_provenance() {
    let store = MemoryTrackingStore::new().unwrap();
    let run_id = store.start_run().unwrap();
    let registry = EvaluatorRegistry::with_builtins();
    let model = ShiftRegressor::new(0.0);

    for name in ["first", "second", "first"] {
        let (rows, labels) = regression_rows();
        evaluate(
            &store,
            &registry,
            &model,
            DatasetSource::Rows(rows),
            labels,
            EvaluateOptions::new()
                .model_type("regressor")
                .dataset_name(name)
                .dataset_path("s3://bucket/holdout.parquet"),
        )
        .unwrap();
    }

    // The caller's run stays open
    assert_eq!(store.active_run_id().as_deref(), Some(run_id.as_str()));
    let run = store.get_run(&run_id).unwrap();
    assert_eq!(run.info.status(), RunStatus::Running);
    assert!(run.metrics.contains_key("mean_squared_error_on_data_first"));
    assert!(run.metrics.contains_key("mean_squared_error_on_data_second"));
    assert!(!run.metrics.contains_key("mean_squared_error"));

    let tag = &run.tags[DATASETS_TAG_KEY];
    assert!(!tag.contains(' '));
    let entries: Vec<Value> = serde_json::from_str(tag).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["name"], "first");
    assert_eq!(entries[1]["name"], "second");
    assert_eq!(entries[0]["model"], "shift-reg");
    assert_eq!(entries[0]["path"], "s3://bucket/holdout.parquet");
}

#[test]
fn test_model_type_inferred_from_labels() {
    let store = MemoryTrackingStore::new().unwrap();
    let features = RecordBatch::try_from_iter(vec![
        (
            "x",
            Arc::new(Float64Array::from(vec![0.1, 0.9, 0.2, 0.8])) as ArrayRef,
        ),
        (
            "label",
            Arc::new(StringArray::from(vec!["no", "yes", "no", "yes"])) as ArrayRef,
        ),
    ])
    .unwrap();

    // String labels: predictions must share the label type
    struct YesNo(trueno_eval::model::ModelMetadata);
    impl trueno_eval::model::Model for YesNo {
        fn metadata(&self) -> &trueno_eval::model::ModelMetadata {
            &self.0
        }
        fn predict(&self, features: &RecordBatch) -> trueno_eval::Result<ArrayRef> {
            let x = features
                .column(0)
                .as_any()
                .downcast_ref::<Float64Array>()
                .unwrap();
            Ok(Arc::new(StringArray::from_iter_values(
                x.values().iter().map(|v| if *v > 0.5 { "yes" } else { "no" }),
            )))
        }
    }

    let result = evaluate(
        &store,
        &EvaluatorRegistry::with_builtins(),
        &YesNo(trueno_eval::model::ModelMetadata::new("yes-no", "custom")),
        DatasetSource::Table(features),
        "label",
        EvaluateOptions::new(),
    )
    .unwrap();
    assert_close(result.metrics()["accuracy"], 1.0, 1e-12);
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_no_applicable_evaluator() {
    let store = MemoryTrackingStore::new().unwrap();
    let (rows, labels) = regression_rows();
    let err = evaluate(
        &store,
        &declining_registry(),
        &ShiftRegressor::new(0.0),
        DatasetSource::Rows(rows),
        labels,
        EvaluateOptions::new().model_type("regressor"),
    )
    .unwrap_err();

    assert!(matches!(err, Error::NoApplicableEvaluator));
    assert!(err
        .to_string()
        .contains("could not be evaluated by any of the registered evaluators"));

    // The run started for this call was closed as failed
    assert!(store.active_run_id().is_none());
}

#[test]
fn test_failed_call_ends_its_own_run_as_failed() {
    let store = MemoryTrackingStore::new().unwrap();
    let (rows, labels) = regression_rows();
    let result = evaluate(
        &store,
        &declining_registry(),
        &ShiftRegressor::new(0.0),
        DatasetSource::Rows(rows),
        labels,
        EvaluateOptions::new().model_type("regressor"),
    );
    assert!(result.is_err());
    assert_eq!(store.run_count(), 1);

    // A later run starts cleanly, proving nothing was left active
    let run_id = store.start_run().unwrap();
    store.end_run(&run_id, RunStatus::Success).unwrap();
}

#[test]
fn test_unsupported_model_type_reported_before_run() {
    let store = MemoryTrackingStore::new().unwrap();
    let (rows, labels) = regression_rows();
    let err = evaluate(
        &store,
        &EvaluatorRegistry::with_builtins(),
        &ShiftRegressor::new(0.0),
        DatasetSource::Rows(rows),
        labels,
        EvaluateOptions::new().model_type("ranker"),
    )
    .unwrap_err();
    assert!(matches!(err, Error::UnsupportedModelType(ref t) if t == "ranker"));
    assert_eq!(store.run_count(), 0);
}

#[test]
fn test_uninferable_model_type() {
    let store = MemoryTrackingStore::new().unwrap();
    let (rows, labels) = binary_rows();
    let err = evaluate(
        &store,
        &EvaluatorRegistry::with_builtins(),
        &ThresholdClassifier::new(0.5),
        DatasetSource::Rows(rows),
        labels,
        EvaluateOptions::new(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[test]
fn test_malformed_config_for_multiple_evaluators() {
    let store = MemoryTrackingStore::new().unwrap();
    let mut registry = EvaluatorRegistry::with_builtins();
    registry.register("fixed", || {
        Box::new(FixedEvaluator {
            metrics: Metrics::new(),
        })
    });
    let (rows, labels) = regression_rows();
    let err = evaluate(
        &store,
        &registry,
        &ShiftRegressor::new(0.0),
        DatasetSource::Rows(rows),
        labels,
        EvaluateOptions::new()
            .model_type("regressor")
            .evaluator_config(json!({"log_model_explainability": false})),
    )
    .unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
    assert_eq!(store.run_count(), 0);
}

// ============================================================================
// Selection and merging
// ============================================================================

#[test]
fn test_later_evaluator_wins_on_collision() {
    let store = MemoryTrackingStore::new().unwrap();
    let mut registry = EvaluatorRegistry::with_builtins();
    registry.register("fixed", || {
        Box::new(FixedEvaluator {
            metrics: Metrics::from([("max_error".to_string(), -1.0)]),
        })
    });
    let (rows, labels) = regression_rows();
    let result = evaluate(
        &store,
        &registry,
        &ShiftRegressor::new(0.0),
        DatasetSource::Rows(rows),
        labels,
        EvaluateOptions::new()
            .model_type("regressor")
            .evaluators(vec!["default", "fixed"])
            .evaluator_config(json!({"fixed": {"a": 1, "b": 2}})),
    )
    .unwrap();

    assert_eq!(result.metrics()["max_error"], -1.0);
    assert_eq!(result.metrics()["config_keys"], 2.0);
    assert!(result.metrics().contains_key("r2_score"));
}

#[test]
fn test_unregistered_names_are_skipped() {
    let store = MemoryTrackingStore::new().unwrap();
    let (rows, labels) = regression_rows();
    let result = evaluate(
        &store,
        &EvaluatorRegistry::with_builtins(),
        &ShiftRegressor::new(0.0),
        DatasetSource::Rows(rows),
        labels,
        EvaluateOptions::new()
            .model_type("regressor")
            .evaluators(EvaluatorSelection::Many(vec![
                "missing".to_string(),
                "default".to_string(),
            ])),
    )
    .unwrap();
    assert!(result.metrics().contains_key("mean_absolute_error"));

    let (rows, labels) = regression_rows();
    let err = evaluate(
        &store,
        &EvaluatorRegistry::with_builtins(),
        &ShiftRegressor::new(0.0),
        DatasetSource::Rows(rows),
        labels,
        EvaluateOptions::new()
            .model_type("regressor")
            .evaluators("missing"),
    )
    .unwrap_err();
    assert!(matches!(err, Error::NoApplicableEvaluator));
}

#[test]
fn test_saved_result_round_trips() {
    let store = MemoryTrackingStore::new().unwrap();
    let (rows, labels) = binary_rows();
    let result = evaluate(
        &store,
        &EvaluatorRegistry::with_builtins(),
        &ThresholdClassifier::new(0.5),
        DatasetSource::Rows(rows),
        labels,
        EvaluateOptions::new()
            .model_type("classifier")
            .dataset_name("holdout"),
    )
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    result.save(dir.path()).unwrap();
    let loaded = trueno_eval::EvaluationResult::load(dir.path()).unwrap();

    assert_eq!(loaded.metrics(), result.metrics());
    for (name, artifact) in result.artifacts() {
        let restored = &loaded.artifacts()[name];
        assert_eq!(restored.uri(), artifact.uri());
        assert_eq!(restored.class_name(), artifact.class_name());
    }
    let matrix = loaded.artifacts()["confusion_matrix"]
        .downcast_ref::<trueno_eval::artifacts::ImageKind>()
        .unwrap();
    let image = matrix.content().unwrap();
    assert!(image.width() > 0);
}
