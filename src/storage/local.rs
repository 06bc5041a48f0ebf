use std::{
    collections::HashSet,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::SystemTime,
};

use async_trait::async_trait;

use super::{DeleteOutcome, ObjectKey, SavedObject, StorageBackend};
use crate::{
    config::StorageKind,
    error::{AppError, Result},
    models::image::ImageEntry,
    validation::names::{is_derivative, medium_name, thumb_name},
};

/// URL prefix under which the uploads directory is served.
const PUBLIC_PREFIX: &str = "/uploads";

/// Uploads stored under a directory that is also served as static files.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_root(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    fn dir_for(&self, target: Option<&str>) -> PathBuf {
        match target {
            Some(target) => self.root.join(target),
            None => self.root.clone(),
        }
    }

    fn path_for(&self, key: &ObjectKey) -> Result<PathBuf> {
        let path = self.dir_for(key.target.as_deref()).join(&key.name);
        if !path.starts_with(&self.root) || key.name.contains(['/', '\\']) {
            return Err(AppError::Validation("Invalid filename".to_string()));
        }
        Ok(path)
    }
}

/// Moves `from` to `to`, copying when a rename crosses filesystems.
async fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    match tokio::fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::debug!("rename failed ({}), copying {} instead", e, from.display());
            tokio::fs::copy(from, to).await?;
            tokio::fs::remove_file(from).await
        }
    }
}

async fn remove_if_present(path: &Path) -> std::io::Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    fn kind(&self) -> StorageKind {
        StorageKind::Local
    }

    fn public_url(&self, key: &ObjectKey) -> String {
        format!("{}/{}", PUBLIC_PREFIX, key)
    }

    async fn save(&self, staged: &Path, key: &ObjectKey) -> Result<SavedObject> {
        let dest = self.path_for(key)?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        move_file(staged, &dest).await?;
        tracing::info!("💾 Saved upload to {}", dest.display());

        Ok(SavedObject {
            key: key.clone(),
            url: self.public_url(key),
            local_path: Some(dest),
        })
    }

    async fn list(&self, target: Option<&str>) -> Result<Vec<ImageEntry>> {
        let dir = self.dir_for(target);
        let mut reader = match tokio::fs::read_dir(&dir).await {
            Ok(reader) => reader,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = HashSet::new();
        let mut originals: Vec<(SystemTime, String)> = Vec::new();

        while let Some(entry) = reader.next_entry().await? {
            let metadata = match entry.metadata().await {
                Ok(metadata) if metadata.is_file() => metadata,
                Ok(_) => continue,
                Err(e) => {
                    tracing::debug!("skipping {}: {}", entry.path().display(), e);
                    continue;
                }
            };
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };

            names.insert(name.clone());
            if is_derivative(&name) {
                continue;
            }

            let mtime = metadata
                .modified()
                .or_else(|_| metadata.created())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            originals.push((mtime, name));
        }

        originals.sort();

        let target = target.map(str::to_string);
        let images = originals
            .into_iter()
            .map(|(_, name)| {
                let key = ObjectKey::new(target.clone(), name.clone());
                let mut image = ImageEntry::new(self.public_url(&key), name.clone());

                let thumb = thumb_name(&name);
                if names.contains(&thumb) {
                    image.thumb = Some(self.public_url(&key.sibling(thumb)));
                }
                let medium = medium_name(&name);
                if names.contains(&medium) {
                    image.medium = Some(self.public_url(&key.sibling(medium)));
                }
                image
            })
            .collect();

        Ok(images)
    }

    async fn delete(&self, key: &ObjectKey) -> Result<DeleteOutcome> {
        let path = self.path_for(key)?;

        match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => {}
            Ok(_) => return Ok(DeleteOutcome::NotFound),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(DeleteOutcome::NotFound),
            Err(e) => return Err(e.into()),
        }

        if !remove_if_present(&path).await? {
            return Ok(DeleteOutcome::NotFound);
        }

        if !is_derivative(&key.name) {
            for derivative in [thumb_name(&key.name), medium_name(&key.name)] {
                let derivative_path = self.path_for(&key.sibling(derivative))?;
                if let Err(e) = remove_if_present(&derivative_path).await {
                    tracing::warn!("⚠️ Could not remove {}: {}", derivative_path.display(), e);
                }
            }
        }

        tracing::info!("🗑️ Deleted {}", path.display());
        Ok(DeleteOutcome::Deleted)
    }
}
