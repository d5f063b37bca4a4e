/// Object storage for feed media.
///
/// Thin wrapper over the S3 client: keyed puts with bounded retries on
/// transient failures, and presigned GET URLs for serving private media.
use crate::config::StorageConfig;
use crate::error::{AppError, Result};
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::time::Duration;
use uuid::Uuid;

const PUT_ATTEMPTS: u32 = 3;
const PUT_RETRY_BACKOFF: Duration = Duration::from_millis(250);

#[derive(Clone)]
pub struct Storage {
    client: Client,
    bucket: String,
    presign_expiry: Duration,
}

impl Storage {
    pub async fn connect(config: &StorageConfig) -> Self {
        use aws_sdk_s3::config::Region;

        let mut builder = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        // Custom endpoint for S3-compatible storage (minio, localstack)
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        let aws_config = builder.load().await;

        Self {
            client: Client::new(&aws_config),
            bucket: config.bucket.clone(),
            presign_expiry: Duration::from_secs(config.presign_expiry_secs),
        }
    }

    /// Store a media object under its key, retrying transient failures.
    pub async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = self
                .client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .body(ByteStream::from(bytes.clone()))
                .content_type(content_type)
                .send()
                .await;

            match result {
                Ok(_) => return Ok(()),
                Err(err) if attempt < PUT_ATTEMPTS && is_transient(&err) => {
                    tracing::warn!(key, attempt, error = %err, "storage put failed, retrying");
                    tokio::time::sleep(PUT_RETRY_BACKOFF * attempt).await;
                }
                Err(err) => {
                    return Err(AppError::Internal(format!(
                        "storage put failed for {}: {}",
                        key, err
                    )))
                }
            }
        }
    }

    /// Presigned GET URL for serving a stored object.
    pub async fn presigned_get_url(&self, key: &str) -> Result<String> {
        let presigning_config = PresigningConfig::builder()
            .expires_in(self.presign_expiry)
            .build()
            .map_err(|e| AppError::Internal(format!("presigning config: {e}")))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning_config)
            .await
            .map_err(|e| AppError::Internal(format!("presign failed for {}: {}", key, e)))?;

        Ok(request.uri().to_string())
    }

    /// Connectivity check used by the readiness endpoint.
    pub async fn health_check(&self) -> Result<()> {
        self.client
            .list_objects_v2()
            .bucket(&self.bucket)
            .max_keys(1)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("storage health check failed: {e}")))?;

        Ok(())
    }
}

/// Object key for an uploaded media file. The UUID prefix avoids collisions
/// between same-named uploads.
pub fn media_key(filename: &str) -> String {
    format!("feed/{}-{}", Uuid::new_v4(), filename)
}

fn is_transient<E>(err: &SdkError<E>) -> bool {
    matches!(
        err,
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) | SdkError::ResponseError(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_keys_live_under_the_feed_prefix() {
        let key = media_key("photo.jpg");
        assert!(key.starts_with("feed/"));
        assert!(key.ends_with("-photo.jpg"));
    }

    #[test]
    fn media_keys_are_unique_per_call() {
        assert_ne!(media_key("a.png"), media_key("a.png"));
    }
}
