//! Streams multipart file fields to disk before they are stored or mailed.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use axum::extract::{Multipart, multipart::Field};
use tokio::{
    io::{AsyncWriteExt, BufWriter},
    time::{Duration, timeout},
};
use uuid::Uuid;

use crate::error::{AppError, Result};

const FIELD_TIMEOUT: Duration = Duration::from_secs(300);

/// A file field written under the staging directory.
///
/// The staging file is removed when this value is dropped, unless it was
/// moved away first.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    /// The client-supplied file name, unsanitized.
    pub original_name: String,
    /// The content type the client declared, if any.
    pub declared_type: Option<String>,
    pub size: u64,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("🧹 Removed staged file {}", self.path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("⚠️ Could not remove staged file {}: {}", self.path.display(), e),
        }
    }
}

/// The next multipart field, failing when the client stalls.
pub async fn next_field(multipart: &mut Multipart) -> Result<Option<Field<'_>>> {
    match timeout(FIELD_TIMEOUT, multipart.next_field()).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(AppError::Multipart("Upload timeout exceeded".to_string())),
    }
}

/// Writes `field` to `{tmp_dir}/{uuid}.part`, refusing more than `max_bytes`.
pub async fn stage_field(mut field: Field<'_>, tmp_dir: &Path, max_bytes: u64) -> Result<StagedFile> {
    let mut staged = StagedFile {
        path: tmp_dir.join(format!("{}.part", Uuid::new_v4())),
        original_name: field.file_name().unwrap_or_default().to_string(),
        declared_type: field.content_type().map(str::to_string),
        size: 0,
    };

    let file = tokio::fs::File::create(&staged.path).await?;
    let mut writer = BufWriter::new(file);

    loop {
        let chunk = match timeout(FIELD_TIMEOUT, field.chunk()).await {
            Ok(Ok(Some(chunk))) => chunk,
            Ok(Ok(None)) => break,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(AppError::Multipart("Upload timeout exceeded".to_string())),
        };

        staged.size += chunk.len() as u64;
        if staged.size > max_bytes {
            tracing::warn!(
                "❌ {} exceeds the {} byte limit",
                staged.original_name,
                max_bytes
            );
            return Err(AppError::Validation(format!(
                "File too large: {}",
                staged.original_name
            )));
        }

        writer.write_all(&chunk).await?;
    }

    writer.flush().await?;
    tracing::debug!(
        "📥 Staged {} ({} bytes) at {}",
        staged.original_name,
        staged.size,
        staged.path.display()
    );

    Ok(staged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropping_removes_the_staging_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.part");
        std::fs::write(&path, b"data").unwrap();

        let staged = StagedFile {
            path: path.clone(),
            original_name: "x.jpg".to_string(),
            declared_type: None,
            size: 4,
        };
        drop(staged);
        assert!(!path.exists());
    }

    #[test]
    fn dropping_after_a_move_is_quiet() {
        let dir = tempfile::tempdir().unwrap();
        let staged = StagedFile {
            path: dir.path().join("moved.part"),
            original_name: String::new(),
            declared_type: None,
            size: 0,
        };
        drop(staged);
    }
}
