//! Artifact tests: custom metric artifacts of every kind through a full
//! evaluation, result save/load, and user-registered kinds.

mod common;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int64Array, RecordBatch, StringArray};
use common::{regression_rows, ShiftRegressor};
use image::{DynamicImage, RgbImage};
use ndarray::{array, ArrayD};
use serde::Serialize;
use serde_json::json;
use trueno_eval::artifacts::{
    Artifact, ArtifactKind, ArtifactRegistry, ArtifactValue, CsvKind, EvaluationArtifact,
    ImageKind, JsonKind, NumpyKind, PickleKind, TextKind,
};
use trueno_eval::custom_metric::{CustomMetric, CustomMetricOutput};
use trueno_eval::dataset::DatasetSource;
use trueno_eval::evaluate::{evaluate, EvaluateOptions};
use trueno_eval::evaluator::{EvaluationResult, EvaluatorRegistry};
use trueno_eval::metrics::Metrics;
use trueno_eval::tracking::MemoryTrackingStore;
use trueno_eval::{Error, Result};

#[derive(Serialize)]
struct Thresholds {
    lower: f64,
    upper: f64,
}

fn sample_table() -> RecordBatch {
    RecordBatch::try_from_iter(vec![
        ("id", Arc::new(Int64Array::from(vec![1, 2])) as ArrayRef),
        ("score", Arc::new(Float64Array::from(vec![0.25, 1.0])) as ArrayRef),
        ("tag", Arc::new(StringArray::from(vec!["a", "b"])) as ArrayRef),
    ])
    .unwrap()
}

fn every_kind_metric() -> CustomMetric {
    CustomMetric::new("every_kind", |_, _| {
        let mut artifacts = BTreeMap::new();
        artifacts.insert(
            "array".to_string(),
            ArtifactValue::from(array![[1.0, 2.0], [3.0, 4.0]]),
        );
        artifacts.insert("table".to_string(), ArtifactValue::from(sample_table()));
        artifacts.insert(
            "dict".to_string(),
            ArtifactValue::from(json!({"k": [1, 2, 3]})),
        );
        artifacts.insert(
            "json_string".to_string(),
            ArtifactValue::from("{\"parsed\": true}"),
        );
        artifacts.insert("note".to_string(), ArtifactValue::from("plain words"));
        artifacts.insert(
            "object".to_string(),
            ArtifactValue::object(&Thresholds {
                lower: 0.1,
                upper: 0.9,
            })?,
        );
        artifacts.insert(
            "bitmap".to_string(),
            ArtifactValue::from(DynamicImage::ImageRgb8(RgbImage::new(4, 3))),
        );
        Ok(Some(CustomMetricOutput::MetricsAndArtifacts(
            json!({"kinds": 7}),
            artifacts,
        )))
    })
}

fn evaluate_with_every_kind(store: &MemoryTrackingStore) -> EvaluationResult {
    let (rows, labels) = regression_rows();
    evaluate(
        store,
        &EvaluatorRegistry::with_builtins(),
        &ShiftRegressor::new(0.0),
        DatasetSource::Rows(rows),
        labels,
        EvaluateOptions::new()
            .model_type("regressor")
            .dataset_name("kinds")
            .custom_metric(every_kind_metric()),
    )
    .unwrap()
}

// ============================================================================
// Type dispatch
// ============================================================================

#[test]
fn test_custom_artifacts_dispatch_by_type() {
    let store = MemoryTrackingStore::new().unwrap();
    let result = evaluate_with_every_kind(&store);

    let class = |name: &str| result.artifact(name).unwrap().class_name();
    assert_eq!(class("array"), "NumpyEvaluationArtifact");
    assert_eq!(class("table"), "CsvEvaluationArtifact");
    assert_eq!(class("dict"), "JsonEvaluationArtifact");
    assert_eq!(class("json_string"), "JsonEvaluationArtifact");
    assert_eq!(class("note"), "TextEvaluationArtifact");
    assert_eq!(class("object"), "PickleEvaluationArtifact");
    assert_eq!(class("bitmap"), "ImageEvaluationArtifact");

    assert!(result
        .artifact("array")
        .unwrap()
        .uri()
        .ends_with("array_on_data_kinds.npy"));
    assert!(result
        .artifact("object")
        .unwrap()
        .uri()
        .ends_with("object_on_data_kinds.pickle"));
}

#[test]
fn test_unsupported_path_extension() {
    let store = MemoryTrackingStore::new().unwrap();
    let metric = CustomMetric::with_artifacts_dir("binary_blob", |_, _, dir| {
        let path = dir.join("weights.bin");
        fs::write(&path, [0_u8, 1, 2])?;
        let artifacts = BTreeMap::from([("weights".to_string(), ArtifactValue::Path(path))]);
        Ok(Some(CustomMetricOutput::MetricsAndArtifacts(json!({}), artifacts)))
    });
    let (rows, labels) = regression_rows();
    let err = evaluate(
        &store,
        &EvaluatorRegistry::with_builtins(),
        &ShiftRegressor::new(0.0),
        DatasetSource::Rows(rows),
        labels,
        EvaluateOptions::new()
            .model_type("regressor")
            .custom_metric(metric),
    )
    .unwrap_err();
    assert!(matches!(err, Error::UnsupportedArtifact(_)));
}

// ============================================================================
// Save / load
// ============================================================================

#[test]
fn test_round_trip_content_after_reload() {
    let store = MemoryTrackingStore::new().unwrap();
    let result = evaluate_with_every_kind(&store);
    let dir = tempfile::tempdir().unwrap();
    result.save(dir.path()).unwrap();
    assert!(dir.path().join("artifacts/array.npy").exists());
    assert!(dir.path().join("artifacts/bitmap.png").exists());

    let loaded = EvaluationResult::load(dir.path()).unwrap();
    assert_eq!(loaded.metrics(), result.metrics());
    assert_eq!(loaded.artifacts().len(), result.artifacts().len());

    let content_of = |r: &EvaluationResult, name: &str| -> ArrayD<f64> {
        r.artifact(name)
            .unwrap()
            .downcast_ref::<NumpyKind>()
            .unwrap()
            .content()
            .unwrap()
            .clone()
    };
    assert_eq!(content_of(&loaded, "array"), content_of(&result, "array"));

    let table = loaded.artifacts()["table"]
        .downcast_ref::<CsvKind>()
        .unwrap()
        .content()
        .unwrap();
    assert_eq!(table, &sample_table());

    let object = loaded.artifacts()["object"]
        .downcast_ref::<PickleKind>()
        .unwrap()
        .content()
        .unwrap();
    assert_eq!(object["upper"], json!(0.9));

    let parsed = loaded.artifacts()["json_string"]
        .downcast_ref::<JsonKind>()
        .unwrap()
        .content()
        .unwrap();
    assert_eq!(parsed, &json!({"parsed": true}));

    let note = loaded.artifacts()["note"].downcast_ref::<TextKind>().unwrap();
    assert_eq!(note.content().unwrap(), "plain words");

    let bitmap = loaded.artifacts()["bitmap"].downcast_ref::<ImageKind>().unwrap();
    assert_eq!(bitmap.content().unwrap().width(), 4);
}

#[test]
fn test_load_falls_back_to_uri() {
    let store = MemoryTrackingStore::new().unwrap();
    let result = evaluate_with_every_kind(&store);
    let dir = tempfile::tempdir().unwrap();
    result.save(dir.path()).unwrap();
    fs::remove_dir_all(dir.path().join("artifacts")).unwrap();

    // The store still holds the logged copy behind each uri
    let loaded = EvaluationResult::load(dir.path()).unwrap();
    let dict = loaded.artifacts()["dict"].downcast_ref::<JsonKind>().unwrap();
    assert!(dict.local_path().is_none());
    assert_eq!(dict.content().unwrap(), &json!({"k": [1, 2, 3]}));
}

// ============================================================================
// User-registered kinds
// ============================================================================

/// One record per line.
struct LinesKind;

impl ArtifactKind for LinesKind {
    type Content = Vec<String>;
    const CLASS_NAME: &'static str = "LinesEvaluationArtifact";
    const DEFAULT_EXTENSION: &'static str = "lines";

    fn read(path: &Path) -> Result<Self::Content> {
        Ok(fs::read_to_string(path)?.lines().map(str::to_string).collect())
    }

    fn write(content: &Self::Content, path: &Path) -> Result<()> {
        fs::write(path, content.join("\n"))?;
        Ok(())
    }
}

#[test]
fn test_registered_custom_kind() {
    let store_dir = tempfile::tempdir().unwrap();
    let uri = format!("file://{}", store_dir.path().join("records.lines").display());
    let mut artifacts: BTreeMap<String, Arc<dyn EvaluationArtifact>> = BTreeMap::new();
    artifacts.insert(
        "records".to_string(),
        Arc::new(Artifact::<LinesKind>::with_content(
            uri,
            vec!["a".to_string(), "b".to_string()],
        )),
    );
    let result = EvaluationResult::new(Metrics::new(), artifacts);

    let dir = tempfile::tempdir().unwrap();
    result.save(dir.path()).unwrap();
    assert!(dir.path().join("artifacts/records.lines").exists());

    let err = EvaluationResult::load(dir.path()).unwrap_err();
    assert!(matches!(err, Error::UnsupportedArtifact(_)));

    let mut registry = ArtifactRegistry::with_builtins();
    registry.register::<LinesKind>();
    let loaded = EvaluationResult::load_with_registry(dir.path(), &registry).unwrap();
    let records = loaded.artifacts()["records"].downcast_ref::<LinesKind>().unwrap();
    assert!(!records.is_loaded());
    assert_eq!(records.content().unwrap(), &vec!["a".to_string(), "b".to_string()]);
}
