//! Evaluation dataset tests: hashing, naming, out-of-core sources and
//! provenance tagging.

use std::fs::File;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, FixedSizeListArray, Float64Array, Int64Array, RecordBatch, StringArray,
};
use arrow::datatypes::{DataType, Field, Float64Type};
use ndarray::array;
use parquet::arrow::ArrowWriter;
use serde_json::Value;
use trueno_eval::dataset::{
    compute_mode_or_mean, generate_feature_names, DatasetSource, EvaluationDataset,
    DATASETS_TAG_KEY,
};
use trueno_eval::tracking::{MemoryTrackingStore, TrackingStore};
use trueno_eval::Error;

fn labels(values: &[i64]) -> ArrayRef {
    Arc::new(Int64Array::from(values.to_vec()))
}

fn table(rows: usize) -> RecordBatch {
    #[allow(clippy::cast_precision_loss)]
    let x: Float64Array = (0..rows).map(|i| Some(i as f64 * 0.5)).collect();
    let city: StringArray = (0..rows).map(|i| Some(format!("city_{}", i % 3))).collect();
    let y: Int64Array = (0..rows).map(|i| Some((i % 2) as i64)).collect();
    RecordBatch::try_from_iter(vec![
        ("x", Arc::new(x) as ArrayRef),
        ("city", Arc::new(city) as ArrayRef),
        ("y", Arc::new(y) as ArrayRef),
    ])
    .unwrap()
}

// ============================================================================
// Hashing
// ============================================================================

#[test]
fn test_hash_is_stable_across_constructions() {
    let build = || {
        EvaluationDataset::builder(
            DatasetSource::Array(array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]),
            labels(&[0, 1, 0]),
        )
        .build()
        .unwrap()
    };
    let a = build();
    let b = build();
    assert_eq!(a.hash(), b.hash());
    assert_eq!(a.hash().len(), 64);
    assert_eq!(a.name(), a.hash());
}

#[test]
fn test_hash_changes_with_sampled_value() {
    let rows: Vec<Vec<f64>> = (0..30).map(|i| vec![f64::from(i)]).collect();
    let y = labels(&[0; 30]);
    let base = EvaluationDataset::builder(DatasetSource::Rows(rows.clone()), y.clone())
        .build()
        .unwrap();

    // First and last rows are sampled
    let mut head = rows.clone();
    head[0][0] = -1.0;
    let mut tail = rows;
    tail[29][0] = -1.0;
    for changed in [head, tail] {
        let other = EvaluationDataset::builder(DatasetSource::Rows(changed), y.clone())
            .build()
            .unwrap();
        assert_ne!(base.hash(), other.hash());
    }
}

#[test]
fn test_table_hash_includes_column_names() {
    let batch = table(4);
    let renamed = RecordBatch::try_from_iter(vec![
        ("x2", Arc::clone(batch.column(0))),
        ("city", Arc::clone(batch.column(1))),
        ("y", Arc::clone(batch.column(2))),
    ])
    .unwrap();
    let a = EvaluationDataset::builder(batch, "y").build().unwrap();
    let b = EvaluationDataset::builder(renamed, "y").build().unwrap();
    assert_ne!(a.hash(), b.hash());
}

// ============================================================================
// Feature names
// ============================================================================

#[test]
fn test_feature_name_padding() {
    let cases = [
        (9, "feature_1", "feature_9"),
        (10, "feature_01", "feature_10"),
        (99, "feature_01", "feature_99"),
        (100, "feature_001", "feature_100"),
    ];
    for (n, first, last) in cases {
        let names = generate_feature_names(n);
        assert_eq!(names.len(), n);
        assert_eq!(names[0], first);
        assert_eq!(names[n - 1], last);
    }
}

#[test]
fn test_table_feature_selection() {
    let dataset = EvaluationDataset::builder(table(5), "y")
        .feature_names(["city"])
        .build()
        .unwrap();
    assert_eq!(dataset.feature_names(), ["city"]);
    assert_eq!(dataset.features_data().num_columns(), 1);
    assert_eq!(dataset.features_data().schema().field(0).data_type(), &DataType::Utf8);

    let err = EvaluationDataset::builder(table(5), "y")
        .feature_names(["missing"])
        .build()
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[test]
fn test_vector_column_is_expanded() {
    let values = Float64Array::from(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    let vectors = FixedSizeListArray::try_new(
        Arc::new(Field::new("item", DataType::Float64, true)),
        3,
        Arc::new(values),
        None,
    )
    .unwrap();
    let batch = RecordBatch::try_from_iter(vec![
        ("features", Arc::new(vectors) as ArrayRef),
        ("label", labels(&[0, 1])),
    ])
    .unwrap();

    let dataset = EvaluationDataset::builder(batch, "label").build().unwrap();
    assert_eq!(dataset.feature_names(), ["feature_1", "feature_2", "feature_3"]);
    let second = dataset
        .features_data()
        .column(1)
        .as_any()
        .downcast_ref::<Float64Array>()
        .unwrap();
    assert_eq!(second.values().to_vec(), vec![2.0, 5.0]);
}

// ============================================================================
// Out-of-core sources
// ============================================================================

#[test]
fn test_batches_are_capped() {
    let batches = vec![table(6), table(6)];
    let dataset = EvaluationDataset::builder(DatasetSource::Batches(batches), "y")
        .row_limit(8)
        .build()
        .unwrap();
    assert_eq!(dataset.num_rows(), 8);
}

#[test]
fn test_parquet_source() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("holdout.parquet");
    let batch = table(20);
    let mut writer = ArrowWriter::try_new(File::create(&path).unwrap(), batch.schema(), None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();

    let dataset = EvaluationDataset::builder(DatasetSource::Parquet(path.clone()), "y")
        .row_limit(12)
        .path(path.display().to_string())
        .build()
        .unwrap();
    assert_eq!(dataset.num_rows(), 12);
    assert_eq!(dataset.feature_names(), ["x", "city"]);

    let in_memory = EvaluationDataset::builder(table(20).slice(0, 12), "y")
        .build()
        .unwrap();
    assert_eq!(dataset.hash(), in_memory.hash());

    let missing = EvaluationDataset::builder(
        DatasetSource::Parquet(dir.path().join("nope.parquet")),
        "y",
    )
    .build()
    .unwrap_err();
    assert!(matches!(missing, Error::StorageError(_)));
}

// ============================================================================
// Background row
// ============================================================================

#[test]
fn test_mode_or_mean_background() {
    let background = compute_mode_or_mean(&table(7)).unwrap();
    assert_eq!(background.num_rows(), 1);
    let x = background.column(0).as_primitive::<Float64Type>();
    assert!((x.value(0) - 1.5).abs() < 1e-12);
    let city = background.column(1).as_string::<i32>();
    assert_eq!(city.value(0), "city_0");
}

// ============================================================================
// Provenance
// ============================================================================

#[test]
fn test_dataset_tag_appends_and_dedupes() {
    let store = MemoryTrackingStore::new().unwrap();
    let run_id = store.start_run().unwrap();
    let first = EvaluationDataset::builder(table(4), "y")
        .name("train")
        .build()
        .unwrap();
    let second = EvaluationDataset::builder(table(5), "y")
        .name("test")
        .path("/data/test.parquet")
        .build()
        .unwrap();

    first.log_dataset_tag(&store, &run_id, "model-a").unwrap();
    second.log_dataset_tag(&store, &run_id, "model-a").unwrap();
    first.log_dataset_tag(&store, &run_id, "model-a").unwrap();
    first.log_dataset_tag(&store, &run_id, "model-b").unwrap();

    let tag = store.get_run(&run_id).unwrap().tags[DATASETS_TAG_KEY].clone();
    let entries: Vec<Value> = serde_json::from_str(&tag).unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0]["name"], "train");
    assert!(entries[0].get("path").is_none());
    assert_eq!(entries[1]["path"], "/data/test.parquet");
    assert_eq!(entries[2]["model"], "model-b");
    assert_eq!(entries[0]["hash"], Value::from(first.hash()));
}
