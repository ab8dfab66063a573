//! Raw artifact values produced by custom metrics and the runtime type
//! dispatch that turns them into typed artifacts.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::RecordBatch;
use image::DynamicImage;
use ndarray::{Array2, ArrayD};
use serde::Serialize;
use serde_json::Value;

use super::{
    extension_of, Artifact, ArtifactKind, CsvKind, EvaluationArtifact, ImageKind, JsonKind,
    NumpyKind, ParquetKind, PickleKind, TextKind,
};
use crate::plot::{Figure, LinePlot};
use crate::{Error, Result};

/// An artifact as returned by a custom metric, before it is typed.
#[derive(Debug, Clone)]
pub enum ArtifactValue {
    /// File written by the metric; the extension selects the kind.
    Path(PathBuf),
    /// Figure, rasterised to a PNG image.
    Figure(Figure),
    /// Bitmap, saved as a PNG image.
    Image(DynamicImage),
    /// Table, saved as CSV.
    Table(RecordBatch),
    /// Dense array, saved as NPY.
    Array(ArrayD<f64>),
    /// JSON document.
    Json(Value),
    /// Text; saved as JSON when it parses as JSON.
    Text(String),
    /// Arbitrary serialisable object, saved as a pickle.
    Object(Value),
}

impl ArtifactValue {
    /// Capture any serialisable object as a pickle artifact.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` cannot be represented as a JSON value.
    pub fn object<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self::Object(serde_json::to_value(value)?))
    }
}

impl From<PathBuf> for ArtifactValue {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for ArtifactValue {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl From<Figure> for ArtifactValue {
    fn from(figure: Figure) -> Self {
        Self::Figure(figure)
    }
}

impl From<LinePlot> for ArtifactValue {
    fn from(plot: LinePlot) -> Self {
        Self::Figure(plot.into())
    }
}

impl From<DynamicImage> for ArtifactValue {
    fn from(image: DynamicImage) -> Self {
        Self::Image(image)
    }
}

impl From<RecordBatch> for ArtifactValue {
    fn from(table: RecordBatch) -> Self {
        Self::Table(table)
    }
}

impl From<ArrayD<f64>> for ArtifactValue {
    fn from(array: ArrayD<f64>) -> Self {
        Self::Array(array)
    }
}

impl From<Array2<f64>> for ArtifactValue {
    fn from(array: Array2<f64>) -> Self {
        Self::Array(array.into_dyn())
    }
}

impl From<Value> for ArtifactValue {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<String> for ArtifactValue {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for ArtifactValue {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// Typed artifact content held in memory until it is persisted.
#[derive(Debug, Clone)]
pub(crate) enum StagedArtifact {
    Image { image: DynamicImage, extension: String },
    Csv(RecordBatch),
    Json(Value),
    Numpy(ArrayD<f64>),
    Parquet(RecordBatch),
    Text(String),
    Pickle(Value),
}

impl StagedArtifact {
    /// Resolve a raw value to its artifact kind and materialise the content.
    pub(crate) fn stage(value: ArtifactValue) -> Result<Self> {
        Ok(match value {
            ArtifactValue::Path(path) => Self::from_path(&path)?,
            ArtifactValue::Figure(figure) => Self::image(DynamicImage::ImageRgb8(figure.render())),
            ArtifactValue::Image(image) => Self::image(image),
            ArtifactValue::Table(table) => Self::Csv(table),
            ArtifactValue::Array(array) => Self::Numpy(array),
            ArtifactValue::Json(value) => Self::Json(value),
            ArtifactValue::Text(text) => match serde_json::from_str::<Value>(&text) {
                Ok(value) => Self::Json(value),
                Err(_) => Self::Text(text),
            },
            ArtifactValue::Object(value) => Self::Pickle(value),
        })
    }

    fn image(image: DynamicImage) -> Self {
        Self::Image {
            image,
            extension: ImageKind::DEFAULT_EXTENSION.to_string(),
        }
    }

    fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::InvalidInput(format!(
                "Artifact file '{}' does not exist",
                path.display()
            )));
        }
        let extension = extension_of(&path.to_string_lossy()).unwrap_or_default();
        Ok(match extension.as_str() {
            "png" | "jpg" | "jpeg" => Self::Image {
                image: ImageKind::read(path)?,
                extension,
            },
            "json" => Self::Json(JsonKind::read(path)?),
            "npy" => Self::Numpy(NumpyKind::read(path)?),
            "csv" => Self::Csv(CsvKind::read(path)?),
            "parquet" => Self::Parquet(ParquetKind::read(path)?),
            "txt" | "text" => Self::Text(TextKind::read(path)?),
            _ => {
                return Err(Error::UnsupportedArtifact(format!(
                    "Unsupported artifact file '{}'. Supported extensions are: \
                     png, jpg, jpeg, json, npy, csv, parquet, txt, text",
                    path.display()
                )))
            }
        })
    }

    /// Serialisation extension.
    pub(crate) fn extension(&self) -> &str {
        match self {
            Self::Image { extension, .. } => extension.as_str(),
            Self::Csv(_) => CsvKind::DEFAULT_EXTENSION,
            Self::Json(_) => JsonKind::DEFAULT_EXTENSION,
            Self::Numpy(_) => NumpyKind::DEFAULT_EXTENSION,
            Self::Parquet(_) => ParquetKind::DEFAULT_EXTENSION,
            Self::Text(_) => TextKind::DEFAULT_EXTENSION,
            Self::Pickle(_) => PickleKind::DEFAULT_EXTENSION,
        }
    }

    /// Kind class name.
    pub(crate) fn class_name(&self) -> &'static str {
        match self {
            Self::Image { .. } => ImageKind::CLASS_NAME,
            Self::Csv(_) => CsvKind::CLASS_NAME,
            Self::Json(_) => JsonKind::CLASS_NAME,
            Self::Numpy(_) => NumpyKind::CLASS_NAME,
            Self::Parquet(_) => ParquetKind::CLASS_NAME,
            Self::Text(_) => TextKind::CLASS_NAME,
            Self::Pickle(_) => PickleKind::CLASS_NAME,
        }
    }

    /// Write the content to a local file.
    pub(crate) fn write(&self, path: &Path) -> Result<()> {
        match self {
            Self::Image { image, .. } => ImageKind::write(image, path),
            Self::Csv(table) => CsvKind::write(table, path),
            Self::Json(value) => JsonKind::write(value, path),
            Self::Numpy(array) => NumpyKind::write(array, path),
            Self::Parquet(table) => ParquetKind::write(table, path),
            Self::Text(text) => TextKind::write(text, path),
            Self::Pickle(value) => PickleKind::write(value, path),
        }
    }

    /// Wrap the content as a typed artifact stored at `uri`.
    pub(crate) fn into_artifact(self, uri: String) -> Arc<dyn EvaluationArtifact> {
        let extension = self.extension().to_string();
        match self {
            Self::Image { image, .. } => {
                Arc::new(Artifact::<ImageKind>::with_content(uri, image).with_extension(extension))
            }
            Self::Csv(table) => Arc::new(Artifact::<CsvKind>::with_content(uri, table)),
            Self::Json(value) => Arc::new(Artifact::<JsonKind>::with_content(uri, value)),
            Self::Numpy(array) => Arc::new(Artifact::<NumpyKind>::with_content(uri, array)),
            Self::Parquet(table) => Arc::new(Artifact::<ParquetKind>::with_content(uri, table)),
            Self::Text(text) => Arc::new(Artifact::<TextKind>::with_content(uri, text)),
            Self::Pickle(value) => Arc::new(Artifact::<PickleKind>::with_content(uri, value)),
        }
    }
}
