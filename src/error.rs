//! Error types for Trueno-Eval
//!
//! Every fatal path of an evaluation surfaces as one of these variants with a
//! message naming the offending function, key or evaluator.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Trueno-Eval error types
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed dataset or argument (shape mismatch, bad feature names)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Evaluator config does not have the expected structure
    #[error("Invalid evaluator config: {0}")]
    InvalidConfig(String),

    /// Model type is neither `classifier` nor `regressor`
    #[error("Unsupported model type '{0}'. Supported types are: classifier, regressor")]
    UnsupportedModelType(String),

    /// A custom metric function broke its return contract or failed
    #[error("Custom metric '{name}' (index = {index}) {message}")]
    CustomMetric {
        /// Declared metric name
        name: String,
        /// Position in the custom metric list
        index: usize,
        /// What went wrong
        message: String,
    },

    /// Two artifacts produced by one evaluator share a name
    #[error("{0}")]
    ArtifactNameConflict(String),

    /// Every selected evaluator declined the model
    #[error("The model could not be evaluated by any of the registered evaluators, please verify that the model type and other configs are set correctly.")]
    NoApplicableEvaluator,

    /// The model's predict call failed
    #[error("Model prediction failed: {0}")]
    Model(String),

    /// The explainability backend failed
    #[error("Explainability computation failed: {0}")]
    Explainability(String),

    /// Tracking store or artifact repository error
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Artifact class or file extension has no registered kind
    #[error("Unsupported artifact: {0}")]
    UnsupportedArtifact(String),

    /// Metric flush queue closed
    #[error("Metric queue closed (consumer dropped)")]
    QueueClosed,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Image codec error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Pickle codec error
    #[error("Pickle error: {0}")]
    Pickle(#[from] serde_pickle::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
