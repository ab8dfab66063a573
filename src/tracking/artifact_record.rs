//! Artifact record: a file logged to a run's artifact root.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A logged artifact file.
///
/// `cas_hash` has the form `algorithm:hex_digest`, e.g.
/// `sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactRecord {
    run_id: String,
    path: String,
    uri: String,
    cas_hash: String,
    size_bytes: u64,
    created_at: DateTime<Utc>,
}

impl ArtifactRecord {
    /// Record an artifact stored at `uri` under the run-relative `path`.
    #[must_use]
    pub fn new(
        run_id: impl Into<String>,
        path: impl Into<String>,
        uri: impl Into<String>,
        cas_hash: impl Into<String>,
        size_bytes: u64,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            path: path.into(),
            uri: uri.into(),
            cas_hash: cas_hash.into(),
            size_bytes,
            created_at: Utc::now(),
        }
    }

    /// Owning run.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Path relative to the run's artifact root.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Storage location.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Content-addressable hash.
    #[must_use]
    pub fn cas_hash(&self) -> &str {
        &self.cas_hash
    }

    /// Size in bytes.
    #[must_use]
    pub const fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
