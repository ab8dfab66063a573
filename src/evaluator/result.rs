//! Evaluation result and its on-disk layout.
//!
//! ```text
//! <dir>/
//! ├── metrics.json              {name: number | null}
//! ├── artifacts_metadata.json   {name: {uri, class_name}}
//! └── artifacts/<name>.<ext>
//! ```

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::artifacts::{extension_of, ArtifactRegistry, EvaluationArtifact};
use crate::metrics::Metrics;
use crate::Result;

const METRICS_FILE: &str = "metrics.json";
const ARTIFACTS_METADATA_FILE: &str = "artifacts_metadata.json";
const ARTIFACTS_DIR: &str = "artifacts";

#[derive(Debug, Serialize, Deserialize)]
struct ArtifactMetadata {
    uri: String,
    class_name: String,
}

/// Metrics and artifacts produced by one or more evaluators.
#[derive(Debug, Clone, Default)]
pub struct EvaluationResult {
    metrics: Metrics,
    artifacts: BTreeMap<String, Arc<dyn EvaluationArtifact>>,
}

impl EvaluationResult {
    /// Create a result.
    #[must_use]
    pub const fn new(
        metrics: Metrics,
        artifacts: BTreeMap<String, Arc<dyn EvaluationArtifact>>,
    ) -> Self {
        Self { metrics, artifacts }
    }

    /// Metrics by unsuffixed name.
    #[must_use]
    pub const fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Artifacts by unsuffixed name.
    #[must_use]
    pub const fn artifacts(&self) -> &BTreeMap<String, Arc<dyn EvaluationArtifact>> {
        &self.artifacts
    }

    /// One artifact by name.
    #[must_use]
    pub fn artifact(&self, name: &str) -> Option<&Arc<dyn EvaluationArtifact>> {
        self.artifacts.get(name)
    }

    /// Union with `other`; `other` wins on key collisions.
    pub fn merge(&mut self, other: Self) {
        self.metrics.extend(other.metrics);
        self.artifacts.extend(other.artifacts);
    }

    /// Write the result under `path`.
    ///
    /// Non-finite metric values are written as `null`.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be written or an artifact's content
    /// cannot be loaded.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let artifacts_dir = path.join(ARTIFACTS_DIR);
        fs::create_dir_all(&artifacts_dir)?;

        let metrics: Map<String, Value> = self
            .metrics
            .iter()
            .map(|(name, value)| (name.clone(), Value::from(*value)))
            .collect();
        serde_json::to_writer(BufWriter::new(File::create(path.join(METRICS_FILE))?), &metrics)?;

        let mut metadata = BTreeMap::new();
        for (name, artifact) in &self.artifacts {
            metadata.insert(
                name.clone(),
                ArtifactMetadata {
                    uri: artifact.uri().to_string(),
                    class_name: artifact.class_name().to_string(),
                },
            );
            artifact.save(&artifacts_dir.join(format!("{name}.{}", artifact.extension())))?;
        }
        serde_json::to_writer(
            BufWriter::new(File::create(path.join(ARTIFACTS_METADATA_FILE))?),
            &metadata,
        )?;
        Ok(())
    }

    /// Read a result written by [`save`](Self::save) using the built-in
    /// artifact kinds.
    ///
    /// # Errors
    ///
    /// Returns an error if a file is missing or malformed, or an artifact
    /// class is unknown.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_with_registry(path, &ArtifactRegistry::with_builtins())
    }

    /// Read a result, resolving artifact classes through `registry`.
    /// Artifact content is read lazily from the saved copy.
    ///
    /// # Errors
    ///
    /// Returns an error if a file is missing or malformed, or an artifact
    /// class is not registered.
    pub fn load_with_registry(path: impl AsRef<Path>, registry: &ArtifactRegistry) -> Result<Self> {
        let path = path.as_ref();
        let raw: BTreeMap<String, Option<f64>> =
            serde_json::from_reader(BufReader::new(File::open(path.join(METRICS_FILE))?))?;
        let metrics = raw
            .into_iter()
            .map(|(name, value)| (name, value.unwrap_or(f64::NAN)))
            .collect();

        let metadata: BTreeMap<String, ArtifactMetadata> = serde_json::from_reader(
            BufReader::new(File::open(path.join(ARTIFACTS_METADATA_FILE))?),
        )?;
        let artifacts_dir = path.join(ARTIFACTS_DIR);
        let mut artifacts = BTreeMap::new();
        for (name, meta) in metadata {
            let local = saved_copy(&artifacts_dir, &name, &meta.uri)?;
            let artifact = registry.construct(&meta.class_name, meta.uri, local)?;
            artifacts.insert(name, artifact);
        }
        Ok(Self { metrics, artifacts })
    }
}

/// Local copy of an artifact saved under `artifacts_dir`, if present.
fn saved_copy(artifacts_dir: &Path, name: &str, uri: &str) -> Result<Option<PathBuf>> {
    if let Some(ext) = extension_of(uri) {
        let candidate = artifacts_dir.join(format!("{name}.{ext}"));
        return Ok(candidate.exists().then_some(candidate));
    }
    if !artifacts_dir.exists() {
        return Ok(None);
    }
    for entry in fs::read_dir(artifacts_dir)? {
        let candidate = entry?.path();
        if candidate.file_stem().and_then(|s| s.to_str()) == Some(name) {
            return Ok(Some(candidate));
        }
    }
    Ok(None)
}
