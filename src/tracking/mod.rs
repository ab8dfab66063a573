//! Tracking store interface and reference implementation
//!
//! Evaluation results are persisted through a [`TrackingStore`]: runs,
//! metric time series, string tags and artifact files.
//!
//! ## Schema Overview
//!
//! ```text
//! RunRecord (1) ──┬──< MetricRecord (N) [time-series]
//!                 ├──< tag (N)          [key -> string]
//!                 └──< ArtifactRecord (N) [CAS]
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use trueno_eval::tracking::{MemoryTrackingStore, MetricRecord, RunStatus, TrackingStore};
//!
//! let store = MemoryTrackingStore::new()?;
//! let run_id = store.start_run()?;
//! store.log_metric(MetricRecord::new(&run_id, "mean_squared_error_on_data_d", 0, 0.25))?;
//! store.end_run(&run_id, RunStatus::Success)?;
//!
//! let run = store.get_run(&run_id)?;
//! assert_eq!(run.metrics["mean_squared_error_on_data_d"], 0.25);
//! # Ok::<(), trueno_eval::Error>(())
//! ```

mod artifact_record;
mod memory;
mod metric_record;
#[cfg(feature = "tokio")]
mod queue;
mod run_record;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

pub use artifact_record::ArtifactRecord;
pub use memory::MemoryTrackingStore;
pub use metric_record::MetricRecord;
#[cfg(feature = "tokio")]
pub use queue::{MetricQueue, MAX_PENDING_METRICS};
pub use run_record::{RunRecord, RunStatus};

use crate::{Error, Result};

/// Snapshot of a run: its record, the latest value of every metric key and
/// all tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunData {
    /// Identity and lifecycle
    pub info: RunRecord,
    /// Latest value per metric key
    pub metrics: BTreeMap<String, f64>,
    /// Run tags
    pub tags: BTreeMap<String, String>,
}

/// Persistence API consumed by evaluation.
///
/// Implementations serialise concurrent writers themselves; callers treat
/// every method as an atomic operation.
pub trait TrackingStore: Send + Sync {
    /// Start a new run and make it the active run.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if another run is already active.
    fn start_run(&self) -> Result<String>;

    /// Currently active run, if any.
    fn active_run_id(&self) -> Option<String>;

    /// End a run; it stops being the active run.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the run does not exist.
    fn end_run(&self, run_id: &str, status: RunStatus) -> Result<()>;

    /// Log a batch of metric points.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if a referenced run does not exist.
    fn log_metrics(&self, records: Vec<MetricRecord>) -> Result<()>;

    /// Log a single metric point.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the run does not exist.
    fn log_metric(&self, record: MetricRecord) -> Result<()> {
        self.log_metrics(vec![record])
    }

    /// Set (or replace) a run tag.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the run does not exist.
    fn set_tag(&self, run_id: &str, key: &str, value: &str) -> Result<()>;

    /// Snapshot of a run.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the run does not exist.
    fn get_run(&self, run_id: &str) -> Result<RunData>;

    /// Full history of one metric key, ordered by step.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the run does not exist.
    fn metric_history(&self, run_id: &str, key: &str) -> Result<Vec<MetricRecord>>;

    /// Copy a local file into the run's artifacts under `artifact_path` and
    /// return its uri.
    ///
    /// # Errors
    ///
    /// Returns an error if the run does not exist or the file cannot be
    /// copied.
    fn log_artifact(&self, run_id: &str, local_path: &Path, artifact_path: &str) -> Result<String>;

    /// Artifacts logged to a run, ordered by path.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the run does not exist.
    fn list_artifacts(&self, run_id: &str) -> Result<Vec<ArtifactRecord>>;

    /// Log `text` as an artifact file.
    ///
    /// # Errors
    ///
    /// Returns an error if the scratch file cannot be written or logged.
    fn log_text(&self, run_id: &str, text: &str, artifact_path: &str) -> Result<String> {
        let scratch = tempfile::tempdir()?;
        let local = scratch.path().join(file_name_of(artifact_path)?);
        fs::write(&local, text)?;
        self.log_artifact(run_id, &local, artifact_path)
    }

    /// Log an image as an artifact file; the format follows the extension of
    /// `artifact_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the image cannot be encoded or logged.
    fn log_image(&self, run_id: &str, image: &DynamicImage, artifact_path: &str) -> Result<String> {
        let scratch = tempfile::tempdir()?;
        let local = scratch.path().join(file_name_of(artifact_path)?);
        image.save(&local)?;
        self.log_artifact(run_id, &local, artifact_path)
    }
}

fn file_name_of(artifact_path: &str) -> Result<&std::ffi::OsStr> {
    Path::new(artifact_path).file_name().ok_or_else(|| {
        Error::StorageError(format!("Artifact path '{artifact_path}' has no file name"))
    })
}
