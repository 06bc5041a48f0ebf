use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::{Client, error::DisplayErrorContext, primitives::ByteStream};

use super::{DeleteOutcome, ObjectKey, SavedObject, StorageBackend};
use crate::{
    config::{S3Config, StorageKind},
    error::{AppError, Result},
    models::image::ImageEntry,
    validation::names::is_derivative,
};

/// Uploads stored in an S3 bucket.
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    config: S3Config,
}

impl S3Storage {
    /// Builds a client from the default AWS credential chain.
    pub async fn connect(config: S3Config) -> Self {
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .load()
            .await;

        Self::with_client(Client::new(&sdk_config), config)
    }

    pub fn with_client(client: Client, config: S3Config) -> Self {
        Self { client, config }
    }

    /// Public URL for a raw object key.
    pub fn url_for_key(&self, key: &str) -> String {
        object_url(&self.config, key)
    }

    /// Uploads the file at `path` under `key`.
    pub async fn put_file(&self, path: &Path, key: &str) -> Result<()> {
        let content_type = infer::get_from_path(path)
            .ok()
            .flatten()
            .map(|kind| kind.mime_type())
            .unwrap_or("application/octet-stream");

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| AppError::Storage(format!("reading {}: {}", path.display(), e)))?;

        self.client
            .put_object()
            .bucket(&self.config.bucket)
            .key(key)
            .content_type(content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("put {}: {}", key, DisplayErrorContext(&e))))?;

        Ok(())
    }
}

/// `S3_PUBLIC_URL/key` when configured, else the virtual-hosted bucket URL.
fn object_url(config: &S3Config, key: &str) -> String {
    match &config.public_url {
        Some(base) => format!("{}/{}", base.trim_end_matches('/'), key),
        None => format!(
            "https://{}.s3.{}.amazonaws.com/{}",
            config.bucket, config.region, key
        ),
    }
}

/// Last path segment of an object key.
fn key_basename(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

#[async_trait]
impl StorageBackend for S3Storage {
    fn kind(&self) -> StorageKind {
        StorageKind::S3
    }

    fn public_url(&self, key: &ObjectKey) -> String {
        object_url(&self.config, &key.to_string())
    }

    async fn save(&self, staged: &Path, key: &ObjectKey) -> Result<SavedObject> {
        let object_key = key.to_string();
        self.put_file(staged, &object_key).await?;

        if let Err(e) = tokio::fs::remove_file(staged).await {
            tracing::warn!("⚠️ Could not remove staged upload {}: {}", staged.display(), e);
        }

        tracing::info!("☁️ Uploaded {} to bucket {}", object_key, self.config.bucket);

        Ok(SavedObject {
            key: key.clone(),
            url: self.public_url(key),
            local_path: None,
        })
    }

    async fn list(&self, target: Option<&str>) -> Result<Vec<ImageEntry>> {
        let prefix = ObjectKey::prefix(target);
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.config.bucket)
            .prefix(&prefix)
            .into_paginator()
            .send();

        let mut objects: Vec<(i64, u32, String)> = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page
                .map_err(|e| AppError::Storage(format!("list {}: {}", prefix, DisplayErrorContext(&e))))?;

            for object in page.contents() {
                let Some(key) = object.key() else { continue };
                if key.ends_with('/') || is_derivative(key_basename(key)) {
                    continue;
                }
                let (secs, nanos) = object
                    .last_modified()
                    .map(|t| (t.secs(), t.subsec_nanos()))
                    .unwrap_or((0, 0));
                objects.push((secs, nanos, key.to_string()));
            }
        }

        objects.sort();

        Ok(objects
            .into_iter()
            .map(|(_, _, key)| ImageEntry::new(self.url_for_key(&key), key_basename(&key).to_string()))
            .collect())
    }

    async fn delete(&self, key: &ObjectKey) -> Result<DeleteOutcome> {
        let object_key = key.to_string();

        let head = self
            .client
            .head_object()
            .bucket(&self.config.bucket)
            .key(&object_key)
            .send()
            .await;

        if let Err(e) = head {
            let service_error = e.into_service_error();
            if service_error.is_not_found() {
                return Ok(DeleteOutcome::NotFound);
            }
            return Err(AppError::Storage(format!(
                "head {}: {}",
                object_key,
                DisplayErrorContext(&service_error)
            )));
        }

        self.client
            .delete_object()
            .bucket(&self.config.bucket)
            .key(&object_key)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("delete {}: {}", object_key, DisplayErrorContext(&e))))?;

        tracing::info!("🗑️ Deleted {} from bucket {}", object_key, self.config.bucket);
        Ok(DeleteOutcome::Deleted)
    }
}
