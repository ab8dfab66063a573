//! In-memory tracking store using `DashMap`.
//!
//! Runs, metrics and tags live in memory and are lost on process exit.
//! Artifact files are copied under a local artifact root and addressed with
//! `file://` uris.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tempfile::TempDir;
use tracing::debug;
use uuid::Uuid;

use super::{ArtifactRecord, MetricRecord, RunData, RunRecord, RunStatus, TrackingStore};
use crate::{Error, Result};

/// Experiment that runs are created under.
const DEFAULT_EXPERIMENT_ID: &str = "0";

/// Thread-safe in-memory [`TrackingStore`].
///
/// # Example
///
/// ```rust
/// use trueno_eval::tracking::{MemoryTrackingStore, RunStatus, TrackingStore};
///
/// let store = MemoryTrackingStore::new()?;
/// let run_id = store.start_run()?;
/// store.set_tag(&run_id, "stage", "validation")?;
/// assert_eq!(store.get_run(&run_id)?.tags["stage"], "validation");
/// store.end_run(&run_id, RunStatus::Success)?;
/// assert!(store.active_run_id().is_none());
/// # Ok::<(), trueno_eval::Error>(())
/// ```
#[derive(Debug)]
pub struct MemoryTrackingStore {
    runs: DashMap<String, RunRecord>,
    metrics: DashMap<String, Vec<MetricRecord>>,
    tags: DashMap<String, BTreeMap<String, String>>,
    artifacts: DashMap<String, Vec<ArtifactRecord>>,
    active_run: Mutex<Option<String>>,
    artifact_root: PathBuf,
    // Keeps a scratch artifact root alive for the lifetime of the store
    _scratch: Option<TempDir>,
}

impl MemoryTrackingStore {
    /// Store whose artifacts go to a scratch directory removed on drop.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the scratch directory cannot be created.
    pub fn new() -> Result<Self> {
        let scratch = TempDir::new()?;
        Ok(Self::from_parts(scratch.path().to_path_buf(), Some(scratch)))
    }

    /// Store whose artifacts are copied under `root`.
    #[must_use]
    pub fn with_artifact_root(root: impl Into<PathBuf>) -> Self {
        Self::from_parts(root.into(), None)
    }

    fn from_parts(artifact_root: PathBuf, scratch: Option<TempDir>) -> Self {
        Self {
            runs: DashMap::new(),
            metrics: DashMap::new(),
            tags: DashMap::new(),
            artifacts: DashMap::new(),
            active_run: Mutex::new(None),
            artifact_root,
            _scratch: scratch,
        }
    }

    /// Local directory holding artifact files.
    #[must_use]
    pub fn artifact_root(&self) -> &Path {
        &self.artifact_root
    }

    /// Number of runs.
    #[must_use]
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Run ids, oldest first.
    #[must_use]
    pub fn run_ids(&self) -> Vec<String> {
        let mut runs: Vec<(chrono::DateTime<chrono::Utc>, String)> = self
            .runs
            .iter()
            .map(|entry| (entry.started_at(), entry.key().clone()))
            .collect();
        runs.sort();
        runs.into_iter().map(|(_, run_id)| run_id).collect()
    }

    fn active(&self) -> MutexGuard<'_, Option<String>> {
        self.active_run.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_run(&self, run_id: &str) -> Result<()> {
        if self.runs.contains_key(run_id) {
            Ok(())
        } else {
            Err(Error::StorageError(format!("Run '{run_id}' not found")))
        }
    }
}

impl TrackingStore for MemoryTrackingStore {
    fn start_run(&self) -> Result<String> {
        let mut active = self.active();
        if let Some(run_id) = active.as_ref() {
            return Err(Error::StorageError(format!(
                "Run '{run_id}' is already active; end it before starting a new one"
            )));
        }
        let run_id = Uuid::new_v4().simple().to_string();
        self.runs.insert(
            run_id.clone(),
            RunRecord::start(run_id.clone(), DEFAULT_EXPERIMENT_ID),
        );
        *active = Some(run_id.clone());
        debug!(run_id = %run_id, "Started run");
        Ok(run_id)
    }

    fn active_run_id(&self) -> Option<String> {
        self.active().clone()
    }

    fn end_run(&self, run_id: &str, status: RunStatus) -> Result<()> {
        self.runs
            .get_mut(run_id)
            .ok_or_else(|| Error::StorageError(format!("Run '{run_id}' not found")))?
            .end(status);
        let mut active = self.active();
        if active.as_deref() == Some(run_id) {
            *active = None;
        }
        debug!(run_id = %run_id, ?status, "Ended run");
        Ok(())
    }

    fn log_metrics(&self, records: Vec<MetricRecord>) -> Result<()> {
        for record in &records {
            self.ensure_run(record.run_id())?;
        }
        for record in records {
            self.metrics
                .entry(record.run_id().to_string())
                .or_default()
                .push(record);
        }
        Ok(())
    }

    fn set_tag(&self, run_id: &str, key: &str, value: &str) -> Result<()> {
        self.ensure_run(run_id)?;
        self.tags
            .entry(run_id.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get_run(&self, run_id: &str) -> Result<RunData> {
        let info = self
            .runs
            .get(run_id)
            .map(|r| r.value().clone())
            .ok_or_else(|| Error::StorageError(format!("Run '{run_id}' not found")))?;

        let mut latest: BTreeMap<String, &MetricRecord> = BTreeMap::new();
        let history = self.metrics.get(run_id);
        for record in history.iter().flat_map(|h| h.value().iter()) {
            match latest.get(record.key()) {
                Some(current) if current.recency() > record.recency() => {}
                _ => {
                    latest.insert(record.key().to_string(), record);
                }
            }
        }
        let metrics = latest
            .into_iter()
            .map(|(key, record)| (key, record.value()))
            .collect();

        let tags = self
            .tags
            .get(run_id)
            .map(|t| t.value().clone())
            .unwrap_or_default();
        Ok(RunData {
            info,
            metrics,
            tags,
        })
    }

    fn metric_history(&self, run_id: &str, key: &str) -> Result<Vec<MetricRecord>> {
        self.ensure_run(run_id)?;
        let mut history: Vec<MetricRecord> = self
            .metrics
            .get(run_id)
            .map(|h| h.value().iter().filter(|m| m.key() == key).cloned().collect())
            .unwrap_or_default();
        history.sort_by_key(MetricRecord::step);
        Ok(history)
    }

    fn log_artifact(&self, run_id: &str, local_path: &Path, artifact_path: &str) -> Result<String> {
        self.ensure_run(run_id)?;
        let relative = Path::new(artifact_path);
        if relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(Error::StorageError(format!(
                "Artifact path '{artifact_path}' must be relative to the run"
            )));
        }

        let bytes = fs::read(local_path)?;
        let destination = self
            .artifact_root
            .join(run_id)
            .join("artifacts")
            .join(relative);
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&destination, &bytes)?;

        let uri = format!("file://{}", destination.display());
        let cas_hash = format!("sha256:{:x}", Sha256::digest(&bytes));
        let record = ArtifactRecord::new(run_id, artifact_path, &uri, cas_hash, bytes.len() as u64);

        let mut records = self.artifacts.entry(run_id.to_string()).or_default();
        records.retain(|r| r.path() != artifact_path);
        records.push(record);
        debug!(run_id = %run_id, artifact_path, "Logged artifact");
        Ok(uri)
    }

    fn list_artifacts(&self, run_id: &str) -> Result<Vec<ArtifactRecord>> {
        self.ensure_run(run_id)?;
        let mut records = self
            .artifacts
            .get(run_id)
            .map(|r| r.value().clone())
            .unwrap_or_default();
        records.sort_by(|a, b| a.path().cmp(b.path()));
        Ok(records)
    }
}
