//! Evaluation artifacts
//!
//! An artifact is a named, typed byproduct of an evaluation (plot, table,
//! array, serialised object) stored at a `uri`. Content is typed per kind and
//! loaded lazily on first access.
//!
//! ## Kinds
//!
//! | kind              | content                 | extension |
//! |-------------------|-------------------------|-----------|
//! | [`ImageKind`]     | `image::DynamicImage`   | png       |
//! | [`CsvKind`]       | `RecordBatch`           | csv       |
//! | [`JsonKind`]      | `serde_json::Value`     | json      |
//! | [`NumpyKind`]     | `ndarray::ArrayD<f64>`  | npy       |
//! | [`ParquetKind`]   | `RecordBatch`           | parquet   |
//! | [`TextKind`]      | `String`                | txt       |
//! | [`PickleKind`]    | `serde_json::Value`     | pickle    |

mod kinds;
pub mod npy;
mod value;

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

pub use kinds::{CsvKind, ImageKind, JsonKind, NumpyKind, ParquetKind, PickleKind, TextKind};
pub use value::ArtifactValue;
pub(crate) use value::StagedArtifact;

use crate::{Error, Result};

/// Serialisation contract of one artifact kind.
pub trait ArtifactKind: Send + Sync + 'static {
    /// In-memory content type.
    type Content: fmt::Debug + Send + Sync;

    /// Stable class name recorded in `artifacts_metadata.json`.
    const CLASS_NAME: &'static str;

    /// File extension used when none is known.
    const DEFAULT_EXTENSION: &'static str;

    /// Read content from a local file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or decoded.
    fn read(path: &Path) -> Result<Self::Content>;

    /// Write content to a local file.
    ///
    /// # Errors
    ///
    /// Returns an error if the content cannot be encoded or written.
    fn write(content: &Self::Content, path: &Path) -> Result<()>;
}

/// Object-safe view of an artifact, used in result maps.
pub trait EvaluationArtifact: fmt::Debug + Send + Sync {
    /// Location in the artifact store.
    fn uri(&self) -> &str;

    /// Kind class name.
    fn class_name(&self) -> &'static str;

    /// Serialisation extension (without the dot).
    fn extension(&self) -> &str;

    /// Write the content to `output_path`, loading it first if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the content cannot be loaded or written.
    fn save(&self, output_path: &Path) -> Result<()>;

    /// Upcast for downcasting to a concrete [`Artifact`].
    fn as_any(&self) -> &dyn Any;
}

impl dyn EvaluationArtifact {
    /// Downcast to a concrete artifact kind.
    #[must_use]
    pub fn downcast_ref<K: ArtifactKind>(&self) -> Option<&Artifact<K>> {
        self.as_any().downcast_ref::<Artifact<K>>()
    }
}

/// Resolve a `file://` (or scheme-less) uri to a local path.
///
/// # Errors
///
/// Returns `StorageError` for uris with any other scheme.
pub fn local_path_from_uri(uri: &str) -> Result<PathBuf> {
    if let Some(path) = uri.strip_prefix("file://") {
        return Ok(PathBuf::from(path));
    }
    if uri.contains("://") {
        return Err(Error::StorageError(format!(
            "Cannot resolve artifact uri '{uri}' to a local path"
        )));
    }
    Ok(PathBuf::from(uri))
}

/// Extension of a path or uri, lowercased.
pub(crate) fn extension_of(path: &str) -> Option<String> {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// Artifact of kind `K` with lazily loaded content.
pub struct Artifact<K: ArtifactKind> {
    uri: String,
    extension: String,
    local_path: Option<PathBuf>,
    content: OnceLock<K::Content>,
}

impl<K: ArtifactKind> fmt::Debug for Artifact<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("class_name", &K::CLASS_NAME)
            .field("uri", &self.uri)
            .field("extension", &self.extension)
            .field("local_path", &self.local_path)
            .field("loaded", &self.content.get().is_some())
            .finish()
    }
}

impl<K: ArtifactKind> Artifact<K> {
    /// Reference an artifact by uri; content loads on first access.
    #[must_use]
    pub fn from_uri(uri: impl Into<String>) -> Self {
        let uri = uri.into();
        let extension = extension_of(&uri).unwrap_or_else(|| K::DEFAULT_EXTENSION.to_string());
        Self {
            uri,
            extension,
            local_path: None,
            content: OnceLock::new(),
        }
    }

    /// Artifact with content already in memory.
    #[must_use]
    pub fn with_content(uri: impl Into<String>, content: K::Content) -> Self {
        let artifact = Self::from_uri(uri);
        let _ = artifact.content.set(content);
        artifact
    }

    /// Prefer this local copy over the uri when loading.
    #[must_use]
    pub fn with_local_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_path = Some(path.into());
        self
    }

    /// Override the serialisation extension.
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Location in the artifact store.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Local copy used for loading, if any.
    #[must_use]
    pub fn local_path(&self) -> Option<&Path> {
        self.local_path.as_deref()
    }

    /// Whether the content has been materialised.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.content.get().is_some()
    }

    fn source_path(&self) -> Result<PathBuf> {
        match &self.local_path {
            Some(path) if path.exists() => Ok(path.clone()),
            _ => local_path_from_uri(&self.uri),
        }
    }

    /// Content, loading it from the local copy or the uri on first access.
    ///
    /// # Errors
    ///
    /// Returns an error if the content is not loaded and cannot be read.
    pub fn content(&self) -> Result<&K::Content> {
        if let Some(content) = self.content.get() {
            return Ok(content);
        }
        let loaded = K::read(&self.source_path()?)?;
        let _ = self.content.set(loaded);
        self.content.get().ok_or_else(|| {
            Error::Other(format!("Artifact content of '{}' failed to load", self.uri))
        })
    }

    /// Drop any cached content and load it again from storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the content cannot be read.
    pub fn reload(&mut self) -> Result<&K::Content> {
        self.content = OnceLock::new();
        self.content()
    }
}

impl<K: ArtifactKind> EvaluationArtifact for Artifact<K> {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn class_name(&self) -> &'static str {
        K::CLASS_NAME
    }

    fn extension(&self) -> &str {
        &self.extension
    }

    fn save(&self, output_path: &Path) -> Result<()> {
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)?;
        }
        K::write(self.content()?, output_path)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Image artifact
pub type ImageArtifact = Artifact<ImageKind>;
/// CSV table artifact
pub type CsvArtifact = Artifact<CsvKind>;
/// JSON artifact
pub type JsonArtifact = Artifact<JsonKind>;
/// NPY array artifact
pub type NumpyArtifact = Artifact<NumpyKind>;
/// Parquet table artifact
pub type ParquetArtifact = Artifact<ParquetKind>;
/// Plain text artifact
pub type TextArtifact = Artifact<TextKind>;
/// Pickled object artifact
pub type PickleArtifact = Artifact<PickleKind>;

type ArtifactConstructor =
    Box<dyn Fn(String, Option<PathBuf>) -> Arc<dyn EvaluationArtifact> + Send + Sync>;

/// Maps artifact class names to constructors, so saved results can be loaded
/// back into typed artifacts.
pub struct ArtifactRegistry {
    constructors: HashMap<String, ArtifactConstructor>,
}

impl fmt::Debug for ArtifactRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.constructors.keys().collect();
        names.sort();
        f.debug_struct("ArtifactRegistry").field("kinds", &names).finish()
    }
}

impl Default for ArtifactRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl ArtifactRegistry {
    /// Registry without any kinds.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Registry with every built-in kind.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register::<ImageKind>();
        registry.register::<CsvKind>();
        registry.register::<JsonKind>();
        registry.register::<NumpyKind>();
        registry.register::<ParquetKind>();
        registry.register::<TextKind>();
        registry.register::<PickleKind>();
        registry
    }

    /// Register a kind under its class name.
    pub fn register<K: ArtifactKind>(&mut self) {
        self.constructors.insert(
            K::CLASS_NAME.to_string(),
            Box::new(|uri, local_path| {
                let artifact = Artifact::<K>::from_uri(uri);
                Arc::new(match local_path {
                    Some(path) => artifact.with_local_path(path),
                    None => artifact,
                })
            }),
        );
    }

    /// Whether a class name is registered.
    #[must_use]
    pub fn contains(&self, class_name: &str) -> bool {
        self.constructors.contains_key(class_name)
    }

    /// Build a lazily loaded artifact of the given class.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedArtifact` if the class name is not registered.
    pub fn construct(
        &self,
        class_name: &str,
        uri: String,
        local_path: Option<PathBuf>,
    ) -> Result<Arc<dyn EvaluationArtifact>> {
        let constructor = self.constructors.get(class_name).ok_or_else(|| {
            Error::UnsupportedArtifact(format!("Unknown artifact class '{class_name}'"))
        })?;
        Ok(constructor(uri, local_path))
    }
}
