//! Where uploaded images live.
//!
//! [`StorageBackend`] is implemented by [`local::LocalStorage`] (a directory
//! tree served as static files) and [`s3::S3Storage`] (an S3 bucket). The
//! backend is chosen once at startup and shared through `AppState`.

pub mod local;
pub mod s3;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;

use crate::{
    config::{StorageConfig, StorageKind},
    error::Result,
    models::image::ImageEntry,
};

/// Addresses one stored file: an optional target folder plus a file name.
///
/// Both parts are expected to be sanitized already.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectKey {
    pub target: Option<String>,
    pub name: String,
}

impl ObjectKey {
    pub fn new(target: Option<String>, name: impl Into<String>) -> Self {
        Self {
            target,
            name: name.into(),
        }
    }

    /// Prefix used for listing, `target/` or empty.
    pub fn prefix(target: Option<&str>) -> String {
        target.map(|t| format!("{}/", t)).unwrap_or_default()
    }

    /// A sibling key in the same target folder.
    pub fn sibling(&self, name: impl Into<String>) -> Self {
        Self::new(self.target.clone(), name)
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.target {
            Some(target) => write!(f, "{}/{}", target, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// The result of saving one upload.
#[derive(Debug, Clone)]
pub struct SavedObject {
    pub key: ObjectKey,
    pub url: String,
    /// Filesystem path of the saved file, for backends that have one.
    pub local_path: Option<PathBuf>,
}

/// The result of a delete request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Which backend this is.
    fn kind(&self) -> StorageKind;

    /// Public URL for `key`.
    fn public_url(&self, key: &ObjectKey) -> String;

    /// Moves the staged file at `staged` to `key`.
    async fn save(&self, staged: &Path, key: &ObjectKey) -> Result<SavedObject>;

    /// Lists non-derivative entries under `target`, oldest first.
    async fn list(&self, target: Option<&str>) -> Result<Vec<ImageEntry>>;

    /// Deletes `key`.
    async fn delete(&self, key: &ObjectKey) -> Result<DeleteOutcome>;
}

/// Builds the configured backend, creating local directories as needed.
pub async fn from_config(config: &StorageConfig) -> Result<Arc<dyn StorageBackend>> {
    tokio::fs::create_dir_all(&config.tmp_dir).await?;

    match (config.kind, &config.s3) {
        (StorageKind::S3, Some(s3_config)) => {
            let storage = s3::S3Storage::connect(s3_config.clone()).await;
            tracing::info!("✅ Using S3 storage: bucket {}", s3_config.bucket);
            Ok(Arc::new(storage))
        }
        _ => {
            let storage = local::LocalStorage::new(config.uploads_dir());
            storage.ensure_root().await?;
            tracing::info!("✅ Using local storage at {}", config.uploads_dir().display());
            Ok(Arc::new(storage))
        }
    }
}
