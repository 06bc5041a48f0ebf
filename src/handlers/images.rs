use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{
    config::StorageKind,
    error::{AppError, Result},
    models::image::ImageEntry,
    services::staging::{StagedFile, next_field, stage_field},
    state::AppState,
    storage::{DeleteOutcome, ObjectKey},
    validation::names::{sanitize_target, stored_file_name, validate_existing_name},
};

/// `?target=` on gallery endpoints.
#[derive(Deserialize, Debug, Default)]
pub struct TargetQuery {
    pub target: Option<String>,
}

impl TargetQuery {
    fn sanitized(&self) -> Option<String> {
        self.target.as_deref().and_then(sanitize_target)
    }
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub uploaded: Vec<ImageEntry>,
}

#[derive(Serialize)]
pub struct DeletedResponse {
    pub deleted: String,
}

/// Handles a multipart upload of `images` fields.
///
/// A `target` text field is honored only when the query has none, and only
/// for files that follow it in the body.
pub async fn upload(
    State(state): State<AppState>,
    Query(query): Query<TargetQuery>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let limits = state.config.uploads;
    let query_target = query.sanitized();
    let mut target = query_target.clone();

    let mut files_seen = 0usize;
    let mut uploaded = Vec::new();

    while let Some(field) = next_field(&mut multipart).await? {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "images" => {
                if field.file_name().is_none_or(str::is_empty) {
                    continue;
                }

                files_seen += 1;
                if files_seen > limits.max_files {
                    return Err(AppError::Validation(format!(
                        "Too many files (max {})",
                        limits.max_files
                    )));
                }

                let staged = stage_field(field, &state.config.storage.tmp_dir, limits.max_file_bytes).await?;
                if let Some(entry) = store_upload(&state, target.clone(), &staged).await {
                    uploaded.push(entry);
                }
            }
            "target" if query_target.is_none() => {
                target = sanitize_target(&field.text().await?);
            }
            _ => {}
        }
    }

    if files_seen == 0 {
        return Err(AppError::Validation("No files uploaded".to_string()));
    }

    tracing::info!(
        "📤 Upload finished: {}/{} files stored (target: {})",
        uploaded.len(),
        files_seen,
        target.as_deref().unwrap_or("/")
    );

    Ok(Json(UploadResponse { uploaded }))
}

/// Saves one staged file. Storage failures are logged and skipped.
async fn store_upload(state: &AppState, target: Option<String>, staged: &StagedFile) -> Option<ImageEntry> {
    let name = stored_file_name(&staged.original_name, Utc::now().timestamp_millis());
    let key = ObjectKey::new(target, name);

    let saved = match state.storage.save(staged.path(), &key).await {
        Ok(saved) => saved,
        Err(e) => {
            tracing::error!("❌ Failed to store {}: {}", key, e);
            return None;
        }
    };

    let mut entry = ImageEntry::new(saved.url, key.name.clone());
    if state.storage.kind() == StorageKind::S3 {
        entry.key = Some(key.to_string());
    }

    if let (Some(thumbnailer), Some(path)) = (state.thumbnails, saved.local_path.as_deref()) {
        if !is_image(path) {
            tracing::debug!("Skipping thumbnails for non-image {}", key);
            return Some(entry);
        }

        match thumbnailer.generate(path).await {
            Ok(derivatives) => {
                entry.thumb = Some(state.storage.public_url(&key.sibling(derivatives.thumb)));
                entry.medium = Some(state.storage.public_url(&key.sibling(derivatives.medium)));
            }
            Err(e) => tracing::warn!("⚠️ Thumbnail generation failed for {}: {}", key, e),
        }
    }

    Some(entry)
}

fn is_image(path: &std::path::Path) -> bool {
    infer::get_from_path(path)
        .ok()
        .flatten()
        .is_some_and(|kind| kind.matcher_type() == infer::MatcherType::Image)
}

/// Lists gallery entries under `?target=`, oldest first.
pub async fn list_images(
    State(state): State<AppState>,
    Query(query): Query<TargetQuery>,
) -> Result<Json<Vec<ImageEntry>>> {
    let images = state.storage.list(query.sanitized().as_deref()).await?;
    Ok(Json(images))
}

/// Deletes one entry, plus its derivatives on local storage.
pub async fn delete_image(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<TargetQuery>,
) -> Result<Json<DeletedResponse>> {
    let name = validate_existing_name(&name)?;
    let key = ObjectKey::new(query.sanitized(), name.clone());

    match state.storage.delete(&key).await? {
        DeleteOutcome::Deleted => {
            tracing::info!("✅ Deleted {}", key);
            Ok(Json(DeletedResponse { deleted: name }))
        }
        DeleteOutcome::NotFound => Err(AppError::NotFound("File not found".to_string())),
    }
}
