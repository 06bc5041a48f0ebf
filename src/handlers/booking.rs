use std::collections::HashMap;

use axum::{
    Json,
    extract::{Multipart, State},
};

use crate::{
    error::{AppError, Result},
    handlers::auth::OkResponse,
    services::{
        mail::{MailAttachment, OutgoingMail},
        staging::{StagedFile, next_field, stage_field},
    },
    state::AppState,
    validation::{booking::BookingForm, names::sanitize_attachment_name},
};

/// Largest attachment accepted with a booking.
pub const MAX_ATTACHMENT_BYTES: u64 = 25 * 1024 * 1024;

/// Relays the public booking form to the studio inbox.
pub async fn book(State(state): State<AppState>, mut multipart: Multipart) -> Result<Json<OkResponse>> {
    let Some(mailer) = state.mailer.clone() else {
        tracing::error!("❌ Booking refused: SMTP not configured");
        return Err(AppError::Unavailable("SMTP not configured".to_string()));
    };

    let mut fields = HashMap::new();
    let mut staged: Option<StagedFile> = None;

    while let Some(field) = next_field(&mut multipart).await? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "attachment" {
            if field.file_name().is_none_or(str::is_empty) {
                continue;
            }
            staged = Some(stage_field(field, &state.config.storage.tmp_dir, MAX_ATTACHMENT_BYTES).await?);
        } else if !name.is_empty() {
            fields.insert(name, field.text().await?);
        }
    }

    let form = BookingForm::from_fields(fields).validated()?;

    let attachment = match &staged {
        Some(file) => Some(read_attachment(file).await?),
        None => None,
    };

    let mail = OutgoingMail {
        subject: form.subject(),
        body: form.mail_body(),
        reply_to: Some(form.email.clone()),
        attachment,
    };

    mailer.send(mail).await.map_err(|e| {
        tracing::error!("❌ Booking email failed: {}", e);
        AppError::Mail(e.to_string())
    })?;

    tracing::info!("✅ Booking relayed for {}", form.name);
    Ok(OkResponse::ok())
}

async fn read_attachment(file: &StagedFile) -> Result<MailAttachment> {
    let data = tokio::fs::read(file.path()).await?;

    let content_type = infer::get(&data)
        .map(|kind| kind.mime_type().to_string())
        .or_else(|| file.declared_type.clone())
        .unwrap_or_else(|| "application/octet-stream".to_string());

    let filename = match sanitize_attachment_name(&file.original_name) {
        name if name.is_empty() => "attachment".to_string(),
        name => name,
    };

    Ok(MailAttachment {
        filename,
        content_type,
        data,
    })
}
