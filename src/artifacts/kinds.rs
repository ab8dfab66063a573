//! Built-in artifact kinds.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float64Array, Int64Array, RecordBatch, StringArray,
};
use arrow::compute::concat_batches;
use arrow::datatypes::{DataType, Field, Float32Type, Float64Type, Int32Type, Int64Type, Schema};
use arrow::util::display::{ArrayFormatter, FormatOptions};
use image::DynamicImage;
use ndarray::ArrayD;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use serde_json::Value;
use serde_pickle::{DeOptions, SerOptions};

use super::{npy, ArtifactKind};
use crate::{Error, Result};

/// PNG or JPEG image.
#[derive(Debug, Clone, Copy)]
pub struct ImageKind;

impl ArtifactKind for ImageKind {
    type Content = DynamicImage;
    const CLASS_NAME: &'static str = "ImageEvaluationArtifact";
    const DEFAULT_EXTENSION: &'static str = "png";

    fn read(path: &Path) -> Result<Self::Content> {
        Ok(image::open(path)?)
    }

    fn write(content: &Self::Content, path: &Path) -> Result<()> {
        let is_jpeg = matches!(
            super::extension_of(&path.to_string_lossy()).as_deref(),
            Some("jpg" | "jpeg")
        );
        // JPEG has no alpha channel
        if is_jpeg {
            DynamicImage::ImageRgb8(content.to_rgb8()).save(path)?;
        } else {
            content.save(path)?;
        }
        Ok(())
    }
}

/// Comma separated table with a header row.
#[derive(Debug, Clone, Copy)]
pub struct CsvKind;

impl ArtifactKind for CsvKind {
    type Content = RecordBatch;
    const CLASS_NAME: &'static str = "CsvEvaluationArtifact";
    const DEFAULT_EXTENSION: &'static str = "csv";

    fn read(path: &Path) -> Result<Self::Content> {
        read_csv_table(File::open(path)?)
    }

    fn write(content: &Self::Content, path: &Path) -> Result<()> {
        write_csv_table(content, File::create(path)?)
    }
}

/// Arbitrary JSON document.
#[derive(Debug, Clone, Copy)]
pub struct JsonKind;

impl ArtifactKind for JsonKind {
    type Content = Value;
    const CLASS_NAME: &'static str = "JsonEvaluationArtifact";
    const DEFAULT_EXTENSION: &'static str = "json";

    fn read(path: &Path) -> Result<Self::Content> {
        Ok(serde_json::from_reader(BufReader::new(File::open(path)?))?)
    }

    fn write(content: &Self::Content, path: &Path) -> Result<()> {
        serde_json::to_writer(BufWriter::new(File::create(path)?), content)?;
        Ok(())
    }
}

/// NPY array.
#[derive(Debug, Clone, Copy)]
pub struct NumpyKind;

impl ArtifactKind for NumpyKind {
    type Content = ArrayD<f64>;
    const CLASS_NAME: &'static str = "NumpyEvaluationArtifact";
    const DEFAULT_EXTENSION: &'static str = "npy";

    fn read(path: &Path) -> Result<Self::Content> {
        npy::read_npy(BufReader::new(File::open(path)?))
    }

    fn write(content: &Self::Content, path: &Path) -> Result<()> {
        npy::write_npy(BufWriter::new(File::create(path)?), content)
    }
}

/// Parquet table.
#[derive(Debug, Clone, Copy)]
pub struct ParquetKind;

impl ArtifactKind for ParquetKind {
    type Content = RecordBatch;
    const CLASS_NAME: &'static str = "ParquetEvaluationArtifact";
    const DEFAULT_EXTENSION: &'static str = "parquet";

    fn read(path: &Path) -> Result<Self::Content> {
        let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?;
        let schema = builder.schema().clone();
        let batches = builder
            .build()?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(concat_batches(&schema, &batches)?)
    }

    fn write(content: &Self::Content, path: &Path) -> Result<()> {
        let mut writer = ArrowWriter::try_new(File::create(path)?, content.schema(), None)?;
        writer.write(content)?;
        writer.close()?;
        Ok(())
    }
}

/// UTF-8 text.
#[derive(Debug, Clone, Copy)]
pub struct TextKind;

impl ArtifactKind for TextKind {
    type Content = String;
    const CLASS_NAME: &'static str = "TextEvaluationArtifact";
    const DEFAULT_EXTENSION: &'static str = "txt";

    fn read(path: &Path) -> Result<Self::Content> {
        Ok(fs::read_to_string(path)?)
    }

    fn write(content: &Self::Content, path: &Path) -> Result<()> {
        Ok(fs::write(path, content)?)
    }
}

/// Pickled object, held as a JSON-shaped value.
#[derive(Debug, Clone, Copy)]
pub struct PickleKind;

impl ArtifactKind for PickleKind {
    type Content = Value;
    const CLASS_NAME: &'static str = "PickleEvaluationArtifact";
    const DEFAULT_EXTENSION: &'static str = "pickle";

    fn read(path: &Path) -> Result<Self::Content> {
        let bytes = fs::read(path)?;
        Ok(serde_pickle::from_slice(&bytes, DeOptions::new())?)
    }

    fn write(content: &Self::Content, path: &Path) -> Result<()> {
        let bytes = serde_pickle::to_vec(content, SerOptions::new())?;
        Ok(fs::write(path, bytes)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CsvColumnType {
    Int,
    Float,
    Bool,
    Text,
}

fn parse_bool(cell: &str) -> Option<bool> {
    match cell {
        "True" | "true" => Some(true),
        "False" | "false" => Some(false),
        _ => None,
    }
}

fn infer_csv_column(cells: &[String]) -> CsvColumnType {
    let mut present = cells.iter().filter(|c| !c.is_empty()).peekable();
    if present.peek().is_none() {
        return CsvColumnType::Text;
    }
    let present: Vec<&String> = present.collect();
    if present.iter().all(|c| c.parse::<i64>().is_ok()) {
        CsvColumnType::Int
    } else if present.iter().all(|c| c.parse::<f64>().is_ok()) {
        CsvColumnType::Float
    } else if present.iter().all(|c| parse_bool(c).is_some()) {
        CsvColumnType::Bool
    } else {
        CsvColumnType::Text
    }
}

fn non_empty(cell: &String) -> Option<&str> {
    (!cell.is_empty()).then_some(cell.as_str())
}

fn csv_column(cells: &[String]) -> (DataType, ArrayRef) {
    match infer_csv_column(cells) {
        CsvColumnType::Int => (
            DataType::Int64,
            Arc::new(Int64Array::from_iter(
                cells.iter().map(|c| non_empty(c).and_then(|s| s.parse().ok())),
            )),
        ),
        CsvColumnType::Float => (
            DataType::Float64,
            Arc::new(Float64Array::from_iter(
                cells.iter().map(|c| non_empty(c).and_then(|s| s.parse().ok())),
            )),
        ),
        CsvColumnType::Bool => (
            DataType::Boolean,
            Arc::new(BooleanArray::from_iter(
                cells.iter().map(|c| non_empty(c).and_then(parse_bool)),
            )),
        ),
        CsvColumnType::Text => (
            DataType::Utf8,
            Arc::new(StringArray::from_iter(cells.iter().map(non_empty))),
        ),
    }
}

/// Parse a headed CSV document into a table, inferring column types in the
/// order integer, float, boolean, text. Empty cells become nulls.
pub(crate) fn read_csv_table<R: std::io::Read>(reader: R) -> Result<RecordBatch> {
    let mut reader = csv::Reader::from_reader(reader);
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut columns: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record = record?;
        for (column, cell) in columns.iter_mut().zip(record.iter()) {
            column.push(cell.to_string());
        }
    }

    let (fields, arrays): (Vec<Field>, Vec<ArrayRef>) = headers
        .iter()
        .zip(&columns)
        .map(|(name, cells)| {
            let (data_type, array) = csv_column(cells);
            (Field::new(name, data_type, true), array)
        })
        .unzip();
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
}

fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

fn csv_cells(array: &ArrayRef) -> Result<Vec<String>> {
    let cell = |i: usize, render: &dyn Fn(usize) -> String| {
        if array.is_null(i) {
            String::new()
        } else {
            render(i)
        }
    };
    let cells = match array.data_type() {
        DataType::Float64 => {
            let values = array.as_primitive::<Float64Type>();
            (0..array.len()).map(|i| cell(i, &|i| format_float(values.value(i)))).collect()
        }
        DataType::Float32 => {
            let values = array.as_primitive::<Float32Type>();
            (0..array.len())
                .map(|i| cell(i, &|i| format_float(f64::from(values.value(i)))))
                .collect()
        }
        DataType::Int64 => {
            let values = array.as_primitive::<Int64Type>();
            (0..array.len()).map(|i| cell(i, &|i| values.value(i).to_string())).collect()
        }
        DataType::Int32 => {
            let values = array.as_primitive::<Int32Type>();
            (0..array.len()).map(|i| cell(i, &|i| values.value(i).to_string())).collect()
        }
        DataType::Boolean => {
            let values = array.as_boolean();
            (0..array.len())
                .map(|i| {
                    cell(i, &|i| {
                        if values.value(i) { "True" } else { "False" }.to_string()
                    })
                })
                .collect()
        }
        _ => {
            let formatter = ArrayFormatter::try_new(array.as_ref(), &FormatOptions::default())?;
            (0..array.len())
                .map(|i| cell(i, &|i| formatter.value(i).to_string()))
                .collect()
        }
    };
    Ok(cells)
}

/// Serialise a table as headed CSV. Integral floats keep a trailing `.0`
/// and booleans are written as `True`/`False`.
pub(crate) fn write_csv_table<W: std::io::Write>(batch: &RecordBatch, writer: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    let schema = batch.schema();
    writer.write_record(schema.fields().iter().map(|f| f.name().as_str()))?;

    let columns = batch
        .columns()
        .iter()
        .map(csv_cells)
        .collect::<Result<Vec<_>>>()?;
    for row in 0..batch.num_rows() {
        writer.write_record(columns.iter().map(|c| c[row].as_str()))?;
    }
    writer.flush().map_err(Error::from)
}
