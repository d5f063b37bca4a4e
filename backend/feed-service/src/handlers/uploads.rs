/// Media upload endpoint.
///
/// Accepts one multipart file field. Depending on the configured mode the
/// response carries either the final storage keys or a pending placeholder
/// to embed in a post, resolved later by the background upload task.
use crate::error::{AppError, Result};
use crate::middleware::AuthenticatedUser;
use crate::services::media::{MediaService, UploadOutcome};
use actix_multipart::Multipart;
use actix_web::HttpResponse;
use actix_web::web;
use futures_util::StreamExt;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    /// Storage key, or a pending placeholder when the upload is deferred
    pub reference: String,
    pub pending: bool,
    pub kind: Option<&'static str>,
    pub preview_key: Option<String>,
}

pub async fn upload_media(
    media: web::Data<Arc<MediaService>>,
    user: AuthenticatedUser,
    mut payload: Multipart,
) -> Result<HttpResponse> {
    let mut filename = String::new();
    let mut content_type: Option<String> = None;
    let mut bytes: Vec<u8> = Vec::new();

    while let Some(item) = payload.next().await {
        let mut field =
            item.map_err(|e| AppError::BadRequest(format!("invalid multipart payload: {e}")))?;

        if let Some(name) = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
        {
            filename = name.to_string();
        }
        content_type = field.content_type().map(|m| m.essence_str().to_string());

        while let Some(chunk) = field.next().await {
            let chunk =
                chunk.map_err(|e| AppError::BadRequest(format!("upload read failed: {e}")))?;
            bytes.extend_from_slice(&chunk);
        }
    }

    if filename.is_empty() || bytes.is_empty() {
        return Err(AppError::BadRequest("a file field is required".to_string()));
    }

    tracing::info!(
        user_id = %user.id,
        filename,
        size = bytes.len(),
        "media upload received"
    );

    let outcome = media
        .upload(&filename, content_type.as_deref(), bytes)
        .await?;

    let response = match outcome {
        UploadOutcome::Stored(keys) => UploadResponse {
            reference: keys.key,
            pending: false,
            kind: Some(keys.kind),
            preview_key: keys.preview_key,
        },
        UploadOutcome::Pending(placeholder) => UploadResponse {
            reference: placeholder,
            pending: true,
            kind: None,
            preview_key: None,
        },
    };

    Ok(HttpResponse::Created().json(response))
}
