//! # Trueno-Eval: Model Evaluation Engine
//!
//! **Version**: 0.1.0
//!
//! Trueno-Eval scores a trained model against a labeled dataset, persists the
//! resulting metrics and artifacts to a tracking run, and returns them to the
//! caller.
//!
//! ## Pipeline
//!
//! ```text
//! data + targets ──> EvaluationDataset (hash, names, provenance)
//!                          │
//! EvaluatorRegistry ──> ModelEvaluator::can_evaluate / evaluate
//!                          │      ├─ builtin metrics + curves
//!                          │      ├─ explainability (optional backend)
//!                          │      └─ custom metrics
//!                          ▼
//!              TrackingStore (metrics `_on_data_<name>`, artifacts)
//!                          │
//!                          ▼
//!                  EvaluationResult (save / load)
//! ```
//!
//! ## Example Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use arrow::array::{ArrayRef, Float64Array, RecordBatch};
//! use trueno_eval::dataset::DatasetSource;
//! use trueno_eval::evaluate::{evaluate, EvaluateOptions};
//! use trueno_eval::evaluator::EvaluatorRegistry;
//! use trueno_eval::model::{Model, ModelMetadata};
//! use trueno_eval::tracking::MemoryTrackingStore;
//!
//! struct Identity(ModelMetadata);
//!
//! impl Model for Identity {
//!     fn metadata(&self) -> &ModelMetadata {
//!         &self.0
//!     }
//!     fn predict(&self, features: &RecordBatch) -> trueno_eval::Result<ArrayRef> {
//!         Ok(Arc::clone(features.column(0)))
//!     }
//! }
//!
//! let store = MemoryTrackingStore::new()?;
//! let model = Identity(ModelMetadata::new("identity-1", "custom"));
//! let labels: ArrayRef = Arc::new(Float64Array::from(vec![1.1, 2.1, -3.5]));
//! let result = evaluate(
//!     &store,
//!     &EvaluatorRegistry::with_builtins(),
//!     &model,
//!     DatasetSource::Rows(vec![vec![1.5], vec![2.0], vec![-3.0]]),
//!     labels,
//!     EvaluateOptions::new().model_type("regressor").dataset_name("holdout"),
//! )?;
//!
//! assert!((result.metrics()["max_error"] - 0.5).abs() < 1e-9);
//! # Ok::<(), trueno_eval::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod artifacts;
pub mod custom_metric;
pub mod dataset;
pub mod error;
pub mod evaluate;
pub mod evaluator;
pub mod explain;
pub mod metrics;
pub mod model;
pub mod plot;
pub mod tracking;

pub use error::{Error, Result};
pub use evaluate::{evaluate, EvaluateOptions, EvaluatorSelection};
pub use evaluator::{EvaluationResult, EvaluatorRegistry, ModelEvaluator};
