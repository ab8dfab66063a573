//! Label values, model-type inference, and column reductions over Arrow arrays.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use arrow::array::{
    new_null_array, Array, ArrayRef, AsArray, BooleanArray, Float64Array, Int64Array,
    RecordBatch, StringArray, UInt32Array,
};
use arrow::compute::{cast, take};
use arrow::datatypes::{DataType, Float64Type, Int64Type, UInt64Type};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Task type of the model under evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    /// Predicts discrete class labels.
    Classifier,
    /// Predicts continuous values.
    Regressor,
}

impl ModelType {
    /// Wire name of the model type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Classifier => "classifier",
            Self::Regressor => "regressor",
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "classifier" => Ok(Self::Classifier),
            "regressor" => Ok(Self::Regressor),
            other => Err(Error::UnsupportedModelType(other.to_string())),
        }
    }
}

/// A single class label.
///
/// Labels form a total order (booleans < integers/floats < strings, numbers
/// compared by value) so the distinct labels of a target column can be sorted
/// into a stable class order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Label {
    /// Boolean label
    Bool(bool),
    /// Integer label
    Int(i64),
    /// Floating point label
    Float(f64),
    /// String label
    Str(String),
}

impl Label {
    const fn rank(&self) -> u8 {
        match self {
            Self::Bool(_) => 0,
            Self::Int(_) | Self::Float(_) => 1,
            Self::Str(_) => 2,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl PartialEq for Label {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Label {}

impl PartialOrd for Label {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Label {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Str(a), Self::Str(b)) => a.cmp(b),
            _ => match (self.as_number(), other.as_number()) {
                (Some(a), Some(b)) => a.total_cmp(&b),
                _ => self.rank().cmp(&other.rank()),
            },
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) if v.is_finite() && v.fract() == 0.0 => write!(f, "{v:.1}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<bool> for Label {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Label {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for Label {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Label {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Label {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Label {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

/// Cast an array to the canonical representation used for hashing and label
/// extraction: signed integers to `Int64`, unsigned to `UInt64`, floats to
/// `Float64`, strings and string dictionaries to `Utf8`.
pub(crate) fn canonical_array(array: &ArrayRef) -> Result<ArrayRef> {
    let target = match array.data_type() {
        DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 => DataType::Int64,
        DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64 => {
            DataType::UInt64
        }
        DataType::Float16 | DataType::Float32 | DataType::Float64 => DataType::Float64,
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => DataType::Utf8,
        DataType::Dictionary(_, value) if is_string_type(value) => DataType::Utf8,
        DataType::Dictionary(_, value) if value.is_numeric() => DataType::Float64,
        _ => return Ok(Arc::clone(array)),
    };
    if array.data_type() == &target {
        return Ok(Arc::clone(array));
    }
    Ok(cast(array, &target)?)
}

const fn is_string_type(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View
    )
}

/// Value at `row` of a canonical array as a [`Label`], `None` for nulls.
fn label_at(array: &dyn Array, row: usize) -> Result<Option<Label>> {
    if array.is_null(row) {
        return Ok(None);
    }
    let label = match array.data_type() {
        DataType::Boolean => Label::Bool(array.as_boolean().value(row)),
        DataType::Int64 => Label::Int(array.as_primitive::<Int64Type>().value(row)),
        DataType::UInt64 => {
            let v = array.as_primitive::<UInt64Type>().value(row);
            #[allow(clippy::cast_precision_loss)]
            i64::try_from(v).map_or(Label::Float(v as f64), Label::Int)
        }
        DataType::Float64 => Label::Float(array.as_primitive::<Float64Type>().value(row)),
        DataType::Utf8 => Label::Str(array.as_string::<i32>().value(row).to_string()),
        other => {
            return Err(Error::InvalidInput(format!(
                "Unsupported label data type {other}; labels must be boolean, numeric or string"
            )))
        }
    };
    Ok(Some(label))
}

/// Convert a label array into a vector of [`Label`]s.
///
/// # Errors
///
/// Returns `InvalidInput` if the array contains nulls or has a data type that
/// cannot hold class labels.
pub fn labels_from_array(array: &ArrayRef) -> Result<Vec<Label>> {
    let canonical = canonical_array(array)?;
    (0..canonical.len())
        .map(|row| {
            label_at(canonical.as_ref(), row)?.ok_or_else(|| {
                Error::InvalidInput(format!("Label array contains a null value at row {row}"))
            })
        })
        .collect()
}

/// Build an Arrow array from labels, choosing the narrowest common type.
#[must_use]
pub fn labels_to_array(labels: &[Label]) -> ArrayRef {
    if labels.iter().all(|l| matches!(l, Label::Bool(_))) && !labels.is_empty() {
        let values: BooleanArray = labels
            .iter()
            .map(|l| match l {
                Label::Bool(b) => Some(*b),
                _ => None,
            })
            .collect();
        return Arc::new(values);
    }
    if labels.iter().all(|l| matches!(l, Label::Int(_))) {
        let values: Int64Array = labels
            .iter()
            .map(|l| match l {
                Label::Int(v) => Some(*v),
                _ => None,
            })
            .collect();
        return Arc::new(values);
    }
    if labels.iter().all(|l| l.as_number().is_some()) {
        let values: Float64Array = labels.iter().map(Label::as_number).collect();
        return Arc::new(values);
    }
    let values: StringArray = labels.iter().map(|l| Some(l.to_string())).collect();
    Arc::new(values)
}

/// Sorted distinct labels.
#[must_use]
pub fn unique_labels(labels: &[Label]) -> Vec<Label> {
    let mut unique = labels.to_vec();
    unique.sort();
    unique.dedup();
    unique
}

/// Convert a numeric array into `f64` values.
///
/// # Errors
///
/// Returns `InvalidInput` if the array is not numeric or contains nulls.
pub fn numeric_values(array: &ArrayRef) -> Result<Vec<f64>> {
    let data_type = array.data_type();
    if !(data_type.is_numeric() || data_type == &DataType::Boolean) {
        return Err(Error::InvalidInput(format!(
            "Expected a numeric array, got {data_type}"
        )));
    }
    if array.null_count() > 0 {
        return Err(Error::InvalidInput(
            "Numeric array must not contain null values".to_string(),
        ));
    }
    let values = cast(array, &DataType::Float64)?;
    Ok(values.as_primitive::<Float64Type>().values().to_vec())
}

fn has_non_integral_value(array: &ArrayRef) -> Result<bool> {
    let values = cast(array, &DataType::Float64)?;
    Ok(values
        .as_primitive::<Float64Type>()
        .iter()
        .flatten()
        .any(|v| v.is_finite() && v.fract() != 0.0))
}

/// Whether a feature column holds continuous values: a float column with at
/// least one non-integral value.
fn is_continuous(array: &ArrayRef) -> Result<bool> {
    match array.data_type() {
        DataType::Float16 | DataType::Float32 | DataType::Float64 => has_non_integral_value(array),
        _ => Ok(false),
    }
}

/// Infer the model type from the label array.
///
/// Boolean, string and dictionary-encoded (categorical) labels indicate a
/// classifier; float labels with a non-integral value indicate a regressor.
/// Integer labels and integral floats are ambiguous and yield `None`.
#[must_use]
pub fn infer_model_type_by_labels(labels: &ArrayRef) -> Option<ModelType> {
    match labels.data_type() {
        DataType::Boolean
        | DataType::Utf8
        | DataType::LargeUtf8
        | DataType::Utf8View
        | DataType::Dictionary(_, _) => Some(ModelType::Classifier),
        DataType::Float16 | DataType::Float32 | DataType::Float64 => {
            match has_non_integral_value(labels) {
                Ok(true) => Some(ModelType::Regressor),
                _ => None,
            }
        }
        _ => None,
    }
}

fn column_mean(array: &ArrayRef) -> Result<Option<f64>> {
    let values = cast(array, &DataType::Float64)?;
    let (sum, count) = values
        .as_primitive::<Float64Type>()
        .iter()
        .flatten()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0_usize), |(s, c), v| (s + v, c + 1));
    #[allow(clippy::cast_precision_loss)]
    Ok((count > 0).then(|| sum / count as f64))
}

/// Row index holding the most frequent non-null value; ties go to the
/// smallest value.
fn column_mode_index(array: &ArrayRef) -> Result<Option<usize>> {
    let canonical = canonical_array(array)?;
    let mut counts: BTreeMap<Label, (usize, usize)> = BTreeMap::new();
    for row in 0..canonical.len() {
        let label = match label_at(canonical.as_ref(), row) {
            Ok(Some(Label::Float(v))) if v.is_nan() => continue,
            Ok(Some(label)) => label,
            Ok(None) => continue,
            // no ordering for this type: fall back to the first present value
            Err(_) => return Ok((0..canonical.len()).find(|&r| canonical.is_valid(r))),
        };
        counts.entry(label).or_insert((0, row)).0 += 1;
    }
    let mut best: Option<(usize, usize)> = None;
    for (count, first_row) in counts.values().copied() {
        if best.map_or(true, |(c, _)| count > c) {
            best = Some((count, first_row));
        }
    }
    Ok(best.map(|(_, row)| row))
}

/// Reduce every column of a feature table to a single representative value.
///
/// Continuous columns get the mean of their non-missing values; every other
/// column (integers, integral floats, booleans, strings, categoricals) gets its
/// mode. Column data types are preserved. The result is a one-row table used as
/// the background sample for kernel-based explainers.
///
/// # Errors
///
/// Returns an error if a column cannot be reduced or the result cannot be
/// assembled into a record batch.
pub fn compute_mode_or_mean(features: &RecordBatch) -> Result<RecordBatch> {
    let mut columns = Vec::with_capacity(features.num_columns());
    for column in features.columns() {
        let reduced: ArrayRef = if is_continuous(column)? {
            let mean: ArrayRef = Arc::new(Float64Array::from(vec![column_mean(column)?]));
            cast(&mean, column.data_type())?
        } else if let Some(row) = column_mode_index(column)? {
            let index = UInt32Array::from(vec![u32::try_from(row).map_err(|_| {
                Error::InvalidInput(format!("Row index {row} exceeds the supported table size"))
            })?]);
            take(column.as_ref(), &index, None)?
        } else {
            new_null_array(column.data_type(), 1)
        };
        columns.push(reduced);
    }
    Ok(RecordBatch::try_new(features.schema(), columns)?)
}
