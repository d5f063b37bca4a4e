/// Media upload pipeline.
///
/// Validates uploads against per-kind size and type limits, stores them in
/// object storage, and supports a deferred mode where the request returns a
/// pending placeholder immediately and a background task finalizes the post
/// once the bytes land in storage.
use crate::config::MediaConfig;
use crate::db::{pending_upload_repo, post_repo};
use crate::error::{AppError, Result};
use crate::metrics::FeedMetrics;
use crate::services::storage::{media_key, Storage};
use sqlx::PgPool;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

const PENDING_PREFIX: &str = "pending:";

/// Accepted media kinds and their storage columns on a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Pdf,
}

impl MediaKind {
    /// Determine the media kind from the file extension, cross-checked
    /// against the declared content type when one is present.
    pub fn sniff(filename: &str, content_type: Option<&str>) -> Option<Self> {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())?;

        let kind = match ext.as_str() {
            "jpg" | "jpeg" | "png" | "gif" => MediaKind::Image,
            "mp4" | "webm" => MediaKind::Video,
            "pdf" => MediaKind::Pdf,
            _ => return None,
        };

        if let Some(ct) = content_type {
            let ok = match kind {
                MediaKind::Image => ct.starts_with("image/"),
                MediaKind::Video => ct.starts_with("video/"),
                MediaKind::Pdf => ct == "application/pdf" || ct == "application/octet-stream",
            };
            if !ok {
                return None;
            }
        }

        Some(kind)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Pdf => "pdf",
        }
    }

    fn max_bytes(self, config: &MediaConfig) -> usize {
        match self {
            MediaKind::Image => config.image_max_bytes,
            MediaKind::Video => config.video_max_bytes,
            MediaKind::Pdf => config.pdf_max_bytes,
        }
    }
}

/// Keys produced by a completed upload.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MediaKeys {
    pub kind: &'static str,
    pub key: String,
    pub preview_key: Option<String>,
}

/// What an upload request hands back: final keys when stored eagerly, or a
/// placeholder reference resolved later by the background task.
#[derive(Debug, Clone)]
pub enum UploadOutcome {
    Stored(MediaKeys),
    Pending(String),
}

/// Placeholder written into a post's media column while the upload is
/// still in flight.
pub fn pending_placeholder(upload_id: Uuid) -> String {
    format!("{PENDING_PREFIX}{upload_id}")
}

/// Extract the upload ID from a pending placeholder, if the key is one.
pub fn parse_pending(key: &str) -> Option<Uuid> {
    key.strip_prefix(PENDING_PREFIX)
        .and_then(|raw| Uuid::parse_str(raw).ok())
}

#[derive(Clone)]
pub struct MediaService {
    pool: PgPool,
    storage: Storage,
    config: MediaConfig,
    metrics: Arc<FeedMetrics>,
}

impl MediaService {
    pub fn new(
        pool: PgPool,
        storage: Storage,
        config: MediaConfig,
        metrics: Arc<FeedMetrics>,
    ) -> Self {
        Self {
            pool,
            storage,
            config,
            metrics,
        }
    }

    /// Validate and store an upload.
    ///
    /// In eager mode the bytes are stored before returning. Otherwise a
    /// pending row is recorded, a background task performs the store and
    /// finalization, and the caller receives the placeholder to embed in
    /// the post.
    pub async fn upload(
        &self,
        filename: &str,
        content_type: Option<&str>,
        bytes: Vec<u8>,
    ) -> Result<UploadOutcome> {
        let kind = MediaKind::sniff(filename, content_type).ok_or_else(|| {
            AppError::UnsupportedMediaType(format!("'{}' is not an accepted upload", filename))
        })?;

        let max = kind.max_bytes(&self.config);
        if bytes.len() > max {
            return Err(AppError::PayloadTooLarge(format!(
                "{} exceeds the {} byte limit for {} uploads",
                filename,
                max,
                kind.as_str()
            )));
        }

        let key = media_key(filename);
        let content_type = content_type.unwrap_or("application/octet-stream").to_string();

        if self.config.eager_uploads {
            // Main object first; a failed put then leaves no orphan preview
            // behind in storage.
            self.storage.put(&key, bytes.clone(), &content_type).await?;
            let preview_key = if kind == MediaKind::Video {
                self.store_video_preview(&key, &bytes).await
            } else {
                None
            };

            return Ok(UploadOutcome::Stored(MediaKeys {
                kind: kind.as_str(),
                key,
                preview_key,
            }));
        }

        let upload_id = Uuid::new_v4();
        pending_upload_repo::insert_pending_upload(
            &self.pool,
            upload_id,
            &format!("store:{}", key),
        )
        .await?;

        let service = self.clone();
        tokio::spawn(async move {
            if let Err(err) = service
                .complete_background_upload(upload_id, kind, key, bytes, content_type)
                .await
            {
                tracing::error!(upload_id = %upload_id, error = %err, "background upload failed");
            }
        });

        Ok(UploadOutcome::Pending(pending_placeholder(upload_id)))
    }

    async fn complete_background_upload(
        &self,
        upload_id: Uuid,
        kind: MediaKind,
        key: String,
        bytes: Vec<u8>,
        content_type: String,
    ) -> Result<()> {
        self.storage.put(&key, bytes.clone(), &content_type).await?;
        let preview_key = if kind == MediaKind::Video {
            self.store_video_preview(&key, &bytes).await
        } else {
            None
        };

        self.finalize_upload(upload_id, kind, &key, preview_key.as_deref())
            .await?;

        Ok(())
    }

    /// Resolve a finished upload onto every post referencing its
    /// placeholder. Idempotent: a second call finds no pending row and
    /// changes nothing.
    pub async fn finalize_upload(
        &self,
        upload_id: Uuid,
        kind: MediaKind,
        key: &str,
        preview_key: Option<&str>,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let pending = pending_upload_repo::delete_returning(&mut tx, upload_id).await?;
        if pending.is_none() {
            tx.rollback().await?;
            return Ok(false);
        }

        let placeholder = pending_placeholder(upload_id);
        let rewritten = match kind {
            MediaKind::Image => post_repo::resolve_pending_image(&mut tx, &placeholder, key).await?,
            MediaKind::Pdf => post_repo::resolve_pending_pdf(&mut tx, &placeholder, key).await?,
            MediaKind::Video => {
                post_repo::resolve_pending_video(&mut tx, &placeholder, key, preview_key).await?
            }
        };

        tx.commit().await?;

        self.metrics.uploads_finalized.inc();
        tracing::info!(
            upload_id = %upload_id,
            kind = kind.as_str(),
            posts = rewritten,
            "upload finalized"
        );

        Ok(true)
    }

    /// Extract and store a single-frame preview for a video. Best-effort:
    /// any failure leaves the post without a preview rather than failing
    /// the upload.
    async fn store_video_preview(&self, video_key: &str, bytes: &[u8]) -> Option<String> {
        let frame = match extract_preview_frame(bytes).await {
            Ok(frame) => frame,
            Err(err) => {
                tracing::warn!(video_key, error = %err, "video preview extraction failed");
                return None;
            }
        };

        let preview_key = format!("{}.preview.jpg", video_key);
        match self.storage.put(&preview_key, frame, "image/jpeg").await {
            Ok(()) => Some(preview_key),
            Err(err) => {
                tracing::warn!(video_key, error = %err, "video preview store failed");
                None
            }
        }
    }
}

/// Run ffmpeg to pull the first frame out of a video as a JPEG.
async fn extract_preview_frame(bytes: &[u8]) -> Result<Vec<u8>> {
    let dir = std::env::temp_dir();
    let stem = Uuid::new_v4();
    let input = dir.join(format!("{stem}.video"));
    let output = dir.join(format!("{stem}.jpg"));

    tokio::fs::write(&input, bytes)
        .await
        .map_err(|e| AppError::Internal(format!("preview temp write: {e}")))?;

    let status = tokio::process::Command::new("ffmpeg")
        .arg("-y")
        .arg("-i")
        .arg(&input)
        .arg("-frames:v")
        .arg("1")
        .arg(&output)
        .status()
        .await;

    let _ = tokio::fs::remove_file(&input).await;

    match status {
        Ok(status) if status.success() => {
            let frame = tokio::fs::read(&output)
                .await
                .map_err(|e| AppError::Internal(format!("preview temp read: {e}")))?;
            let _ = tokio::fs::remove_file(&output).await;
            Ok(frame)
        }
        Ok(status) => {
            let _ = tokio::fs::remove_file(&output).await;
            Err(AppError::Internal(format!("ffmpeg exited with {status}")))
        }
        Err(e) => Err(AppError::Internal(format!("ffmpeg spawn failed: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_kind_from_extension() {
        assert_eq!(MediaKind::sniff("a.JPG", None), Some(MediaKind::Image));
        assert_eq!(MediaKind::sniff("a.webm", None), Some(MediaKind::Video));
        assert_eq!(MediaKind::sniff("doc.pdf", None), Some(MediaKind::Pdf));
        assert_eq!(MediaKind::sniff("a.exe", None), None);
        assert_eq!(MediaKind::sniff("noext", None), None);
    }

    #[test]
    fn content_type_must_agree_with_extension() {
        assert_eq!(
            MediaKind::sniff("a.png", Some("image/png")),
            Some(MediaKind::Image)
        );
        assert_eq!(MediaKind::sniff("a.png", Some("video/mp4")), None);
        assert_eq!(
            MediaKind::sniff("doc.pdf", Some("application/pdf")),
            Some(MediaKind::Pdf)
        );
    }

    #[test]
    fn placeholder_round_trips_through_parse() {
        let id = Uuid::new_v4();
        let placeholder = pending_placeholder(id);
        assert_eq!(parse_pending(&placeholder), Some(id));
    }

    #[test]
    fn size_ceilings_follow_the_kind() {
        let config = MediaConfig {
            image_max_bytes: 5 * 1024 * 1024,
            video_max_bytes: 20 * 1024 * 1024,
            pdf_max_bytes: 10 * 1024 * 1024,
            eager_uploads: true,
        };
        assert_eq!(MediaKind::Image.max_bytes(&config), 5 * 1024 * 1024);
        assert_eq!(MediaKind::Video.max_bytes(&config), 20 * 1024 * 1024);
        assert_eq!(MediaKind::Pdf.max_bytes(&config), 10 * 1024 * 1024);
    }

    #[test]
    fn ordinary_keys_are_not_pending() {
        assert_eq!(parse_pending("feed/abc-photo.jpg"), None);
        assert_eq!(parse_pending("pending:not-a-uuid"), None);
    }
}
