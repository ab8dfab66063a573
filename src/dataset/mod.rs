//! Evaluation datasets
//!
//! [`EvaluationDataset`] normalises the supported inputs (dense arrays,
//! row-major rows, Arrow tables, batch streams and Parquet files) into one
//! feature table plus one label array, and derives a stable content hash used
//! for naming and provenance tagging.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use arrow::array::{ArrayRef, Int64Array};
//! use trueno_eval::dataset::{DatasetSource, EvaluationDataset};
//!
//! let labels: ArrayRef = Arc::new(Int64Array::from(vec![0, 1]));
//! let dataset = EvaluationDataset::builder(
//!     DatasetSource::Rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]),
//!     labels,
//! )
//! .build()?;
//!
//! assert_eq!(dataset.feature_names(), ["feature_1", "feature_2"]);
//! assert_eq!(dataset.name(), dataset.hash());
//! # Ok::<(), trueno_eval::Error>(())
//! ```

pub mod hash;
mod labels;

use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, FixedSizeListArray, Float64Array, RecordBatch, RecordBatchOptions,
};
use arrow::compute::concat_batches;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use ndarray::Array2;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub use hash::NUM_SAMPLE_ROWS_FOR_HASH;
pub use labels::{
    compute_mode_or_mean, infer_model_type_by_labels, labels_from_array, labels_to_array,
    numeric_values, unique_labels, Label, ModelType,
};

use crate::tracking::TrackingStore;
use crate::{Error, Result};

/// Run tag under which dataset provenance records are accumulated.
pub const DATASETS_TAG_KEY: &str = "trueno.datasets";

/// Raw input accepted by [`EvaluationDataset`].
#[derive(Debug, Clone)]
pub enum DatasetSource {
    /// Dense 2D array, one row per example.
    Array(Array2<f64>),
    /// Row-major nested rows; every row must have the same length.
    Rows(Vec<Vec<f64>>),
    /// Labeled in-memory table.
    Table(RecordBatch),
    /// Out-of-core table delivered as a batch stream; only the first
    /// `row_limit` rows are materialised.
    Batches(Vec<RecordBatch>),
    /// Out-of-core table stored as a Parquet file; only the first
    /// `row_limit` rows are materialised.
    Parquet(PathBuf),
}

impl DatasetSource {
    const fn is_table(&self) -> bool {
        matches!(self, Self::Table(_) | Self::Batches(_) | Self::Parquet(_))
    }
}

impl From<Array2<f64>> for DatasetSource {
    fn from(array: Array2<f64>) -> Self {
        Self::Array(array)
    }
}

impl From<Vec<Vec<f64>>> for DatasetSource {
    fn from(rows: Vec<Vec<f64>>) -> Self {
        Self::Rows(rows)
    }
}

impl From<RecordBatch> for DatasetSource {
    fn from(batch: RecordBatch) -> Self {
        Self::Table(batch)
    }
}

/// Where the labels come from.
#[derive(Debug, Clone)]
pub enum Targets {
    /// Explicit label array, aligned with the feature rows.
    Labels(ArrayRef),
    /// Name of the label column inside a tabular source.
    Column(String),
}

impl From<ArrayRef> for Targets {
    fn from(labels: ArrayRef) -> Self {
        Self::Labels(labels)
    }
}

impl From<&str> for Targets {
    fn from(column: &str) -> Self {
        Self::Column(column.to_string())
    }
}

impl From<String> for Targets {
    fn from(column: String) -> Self {
        Self::Column(column)
    }
}

/// Provenance record of a dataset: `{hash, name, path}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    /// Content hash
    pub hash: String,
    /// Dataset name
    pub name: String,
    /// Optional provenance path
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub path: Option<String>,
}

#[derive(Serialize)]
struct DatasetTagEntry<'a> {
    #[serde(flatten)]
    metadata: &'a DatasetMetadata,
    model: &'a str,
}

/// Immutable feature/label view over an evaluation input.
#[derive(Debug, Clone)]
pub struct EvaluationDataset {
    features: RecordBatch,
    labels: ArrayRef,
    feature_names: Vec<String>,
    name: String,
    path: Option<String>,
    hash: String,
}

impl EvaluationDataset {
    /// Row cap applied to out-of-core inputs.
    pub const DISTRIBUTED_ROW_LIMIT: usize = 10_000;

    /// Rows sampled from each end of every hashed column.
    pub const NUM_SAMPLE_ROWS_FOR_HASH: usize = hash::NUM_SAMPLE_ROWS_FOR_HASH;

    /// Start building a dataset from raw data and targets.
    #[must_use]
    pub fn builder(
        source: impl Into<DatasetSource>,
        targets: impl Into<Targets>,
    ) -> EvaluationDatasetBuilder {
        EvaluationDatasetBuilder::new(source, targets)
    }

    /// Normalised feature table, in original row order.
    #[must_use]
    pub const fn features_data(&self) -> &RecordBatch {
        &self.features
    }

    /// Label array, in original row order.
    #[must_use]
    pub const fn labels_data(&self) -> &ArrayRef {
        &self.labels
    }

    /// Ordered, unique feature names.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Dataset name (the hash unless given explicitly).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Provenance path, if any.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Content hash.
    #[must_use]
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Number of examples.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.features.num_rows()
    }

    /// Provenance record for run tagging.
    #[must_use]
    pub fn metadata(&self) -> DatasetMetadata {
        DatasetMetadata {
            hash: self.hash.clone(),
            name: self.name.clone(),
            path: self.path.clone(),
        }
    }

    /// Append this dataset's provenance to the run's dataset tag.
    ///
    /// The tag holds a compact JSON array of `{hash, name, path, model}`
    /// records; an exact repeat of an existing record is not appended again.
    ///
    /// # Errors
    ///
    /// Returns an error if the run cannot be read, the existing tag is not a
    /// JSON array, or the tag cannot be written.
    pub fn log_dataset_tag(
        &self,
        store: &dyn TrackingStore,
        run_id: &str,
        model_uuid: &str,
    ) -> Result<()> {
        let metadata = self.metadata();
        let entry = serde_json::to_value(DatasetTagEntry {
            metadata: &metadata,
            model: model_uuid,
        })?;

        let run = store.get_run(run_id)?;
        let mut entries: Vec<serde_json::Value> = match run.tags.get(DATASETS_TAG_KEY) {
            Some(raw) => serde_json::from_str(raw)?,
            None => Vec::new(),
        };
        if entries.contains(&entry) {
            return Ok(());
        }
        entries.push(entry);
        store.set_tag(run_id, DATASETS_TAG_KEY, &serde_json::to_string(&entries)?)
    }
}

/// Builder for [`EvaluationDataset`].
#[derive(Debug)]
pub struct EvaluationDatasetBuilder {
    source: DatasetSource,
    targets: Targets,
    name: Option<String>,
    path: Option<String>,
    feature_names: Option<Vec<String>>,
    row_limit: usize,
}

impl EvaluationDatasetBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(source: impl Into<DatasetSource>, targets: impl Into<Targets>) -> Self {
        Self {
            source: source.into(),
            targets: targets.into(),
            name: None,
            path: None,
            feature_names: None,
            row_limit: EvaluationDataset::DISTRIBUTED_ROW_LIMIT,
        }
    }

    /// Set the dataset name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the provenance path.
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set feature names. For tables this selects (and orders) the feature
    /// columns; for arrays it names the positional columns.
    #[must_use]
    pub fn feature_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.feature_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Override the row cap for out-of-core inputs.
    #[must_use]
    pub const fn row_limit(mut self, limit: usize) -> Self {
        self.row_limit = limit;
        self
    }

    /// Validate the input and build the dataset.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if rows have inconsistent lengths, the feature
    /// row count differs from the label count, feature names are duplicated
    /// or do not match the column count, or the target column is missing.
    /// Parquet and Arrow errors are propagated.
    pub fn build(self) -> Result<EvaluationDataset> {
        let from_table = self.source.is_table();
        let (features, labels, feature_names) = match self.source {
            DatasetSource::Array(array) => {
                let width = array.ncols();
                let rows = array.outer_iter().map(|r| r.to_vec()).collect();
                positional(rows, Some(width), self.targets, self.feature_names)?
            }
            DatasetSource::Rows(rows) => {
                positional(rows, None, self.targets, self.feature_names)?
            }
            DatasetSource::Table(batch) => tabular(&batch, self.targets, self.feature_names)?,
            DatasetSource::Batches(batches) => {
                let batch = materialize_prefix(batches, self.row_limit)?;
                tabular(&batch, self.targets, self.feature_names)?
            }
            DatasetSource::Parquet(path) => {
                let batch = read_parquet_prefix(&path, self.row_limit)?;
                tabular(&batch, self.targets, self.feature_names)?
            }
        };

        if features.num_rows() != labels.len() {
            return Err(Error::InvalidInput(format!(
                "features example rows must be the same length with labels array ({} rows vs {} labels)",
                features.num_rows(),
                labels.len()
            )));
        }

        let mut hasher = Sha256::new();
        hash::update_with_columns(&mut hasher, features.columns())?;
        hash::update_with_columns(&mut hasher, std::slice::from_ref(&labels))?;
        if from_table {
            hasher.update(feature_names.join(",").as_bytes());
        }
        let hash = hash::finish_hex(hasher);

        tracing::debug!(
            rows = features.num_rows(),
            features = feature_names.len(),
            %hash,
            "Constructed evaluation dataset"
        );

        Ok(EvaluationDataset {
            features,
            labels,
            feature_names,
            name: self.name.unwrap_or_else(|| hash.clone()),
            path: self.path,
            hash,
        })
    }
}

/// `feature_1 .. feature_n`, zero padded to the digit count of `n`.
#[must_use]
pub fn generate_feature_names(num_features: usize) -> Vec<String> {
    let width = num_features.to_string().len();
    (1..=num_features)
        .map(|i| format!("feature_{i:0width$}"))
        .collect()
}

fn check_unique(names: &[String]) -> Result<()> {
    let mut seen = HashSet::with_capacity(names.len());
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(Error::InvalidInput(format!(
                "Duplicate feature name '{name}'; feature names must be unique"
            )));
        }
    }
    Ok(())
}

fn float_table(
    columns: Vec<ArrayRef>,
    names: &[String],
    num_rows: usize,
    nullable: bool,
) -> Result<RecordBatch> {
    let schema: SchemaRef = Arc::new(Schema::new(
        names
            .iter()
            .map(|n| Field::new(n, DataType::Float64, nullable))
            .collect::<Vec<_>>(),
    ));
    let options = RecordBatchOptions::new().with_row_count(Some(num_rows));
    Ok(RecordBatch::try_new_with_options(schema, columns, &options)?)
}

/// Float table from row-major values. `width` is the column count when
/// known up front; otherwise it comes from the first row.
fn positional(
    rows: Vec<Vec<f64>>,
    width: Option<usize>,
    targets: Targets,
    feature_names: Option<Vec<String>>,
) -> Result<(RecordBatch, ArrayRef, Vec<String>)> {
    let labels = match targets {
        Targets::Labels(labels) => labels,
        Targets::Column(column) => {
            return Err(Error::InvalidInput(format!(
                "targets must be a label array when data is not a table (got column name '{column}')"
            )))
        }
    };
    let width = width.unwrap_or_else(|| rows.first().map_or(0, Vec::len));
    if rows.iter().any(|r| r.len() != width) {
        return Err(Error::InvalidInput(
            "all rows must have the same length".to_string(),
        ));
    }
    let names = match feature_names {
        Some(names) if names.len() != width => {
            return Err(Error::InvalidInput(format!(
                "{} feature names given for {width} feature columns",
                names.len()
            )))
        }
        Some(names) => names,
        None => generate_feature_names(width),
    };
    check_unique(&names)?;

    let columns: Vec<ArrayRef> = (0..width)
        .map(|j| Arc::new(rows.iter().map(|r| r[j]).collect::<Float64Array>()) as ArrayRef)
        .collect();
    let features = float_table(columns, &names, rows.len(), false)?;
    Ok((features, labels, names))
}

fn tabular(
    batch: &RecordBatch,
    targets: Targets,
    feature_names: Option<Vec<String>>,
) -> Result<(RecordBatch, ArrayRef, Vec<String>)> {
    let (labels, target_column) = match targets {
        Targets::Column(column) => {
            let labels = batch.column_by_name(&column).cloned().ok_or_else(|| {
                Error::InvalidInput(format!("Target column '{column}' not found in data"))
            })?;
            (labels, Some(column))
        }
        Targets::Labels(labels) => (labels, None),
    };

    let names = feature_names.unwrap_or_else(|| {
        batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .filter(|n| Some(n) != target_column.as_ref())
            .collect()
    });
    check_unique(&names)?;

    let schema = batch.schema();
    let indices = names
        .iter()
        .map(|n| {
            schema.index_of(n).map_err(|_| {
                Error::InvalidInput(format!("Feature column '{n}' not found in data"))
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let features = batch.project(&indices)?;

    match expand_vector_column(&features)? {
        Some((expanded, names)) => Ok((expanded, labels, names)),
        None => Ok((features, labels, names)),
    }
}

/// A table whose only feature is a fixed-size list column is expanded into
/// one `Float64` column per list slot.
fn expand_vector_column(features: &RecordBatch) -> Result<Option<(RecordBatch, Vec<String>)>> {
    if features.num_columns() != 1 {
        return Ok(None);
    }
    let Some(vectors) = features.column(0).as_fixed_size_list_opt() else {
        return Ok(None);
    };
    let width = usize::try_from(vectors.value_length())
        .map_err(|_| Error::InvalidInput("Negative vector column width".to_string()))?;
    let values = arrow::compute::cast(vectors.values(), &DataType::Float64)?;
    let values = values.as_primitive::<arrow::datatypes::Float64Type>();
    let names = generate_feature_names(width);
    let columns: Vec<ArrayRef> = (0..width)
        .map(|j| {
            let column: Float64Array = (0..vectors.len())
                .map(|row| {
                    (vectors.is_valid(row)).then(|| values.value(vector_offset(vectors, row) + j))
                })
                .collect();
            Arc::new(column) as ArrayRef
        })
        .collect();
    Ok(Some((
        float_table(columns, &names, vectors.len(), true)?,
        names,
    )))
}

fn vector_offset(vectors: &FixedSizeListArray, row: usize) -> usize {
    usize::try_from(vectors.value_offset(row)).unwrap_or_default()
}

fn warn_truncated(limit: usize) {
    tracing::warn!(
        limit,
        "Specified table is too large for model evaluation. Only the first {limit} rows will be used."
    );
}

fn materialize_prefix(batches: Vec<RecordBatch>, limit: usize) -> Result<RecordBatch> {
    let Some(schema) = batches.first().map(RecordBatch::schema) else {
        return Err(Error::InvalidInput(
            "Batch stream input contains no record batches".to_string(),
        ));
    };
    let total: usize = batches.iter().map(RecordBatch::num_rows).sum();
    let batch = concat_batches(&schema, &batches)?;
    if total > limit {
        warn_truncated(limit);
        return Ok(batch.slice(0, limit));
    }
    Ok(batch)
}

fn read_parquet_prefix(path: &Path, limit: usize) -> Result<RecordBatch> {
    let file = File::open(path).map_err(|e| {
        Error::StorageError(format!(
            "Failed to open Parquet file {}: {e}",
            path.display()
        ))
    })?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let total = usize::try_from(builder.metadata().file_metadata().num_rows()).unwrap_or(0);
    let schema = Arc::clone(builder.schema());
    let reader = builder.with_limit(limit).build()?;
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    if total > limit {
        warn_truncated(limit);
    }
    Ok(concat_batches(&schema, &batches)?)
}
