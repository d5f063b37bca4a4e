/// Notification dispatch.
///
/// Consumes feed events and delivers notifications through a pluggable
/// channel with exponential-backoff retries. New-post fan-out is guarded by
/// a cache marker so only the first consumer of a duplicate event delivers.
use crate::config::NotificationConfig;
use crate::db::directory_repo;
use crate::error::{AppError, Result};
use crate::kafka::events::{self, FeedEvent};
use crate::metrics::FeedMetrics;
use async_trait::async_trait;
use redis_utils::TtlGuard;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// A single notification bound for one recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: Uuid,
    pub kind: String,
    pub post_id: Uuid,
    pub message: String,
}

/// Downstream delivery channel.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> Result<()>;
}

/// Default channel: POSTs the notification as JSON to a webhook.
pub struct WebhookChannel {
    http: reqwest::Client,
    url: String,
}

impl WebhookChannel {
    pub fn new(url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    async fn deliver(&self, notification: &Notification) -> Result<()> {
        self.http
            .post(&self.url)
            .json(notification)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("webhook send: {e}")))?
            .error_for_status()
            .map_err(|e| AppError::Internal(format!("webhook status: {e}")))?;

        Ok(())
    }
}

pub struct NotificationDispatcher {
    pool: PgPool,
    channel: Arc<dyn NotificationChannel>,
    guard: TtlGuard,
    metrics: Arc<FeedMetrics>,
    retry_attempts: u32,
    retry_base: Duration,
    fanout_ttl: Duration,
}

impl NotificationDispatcher {
    pub fn new(
        pool: PgPool,
        channel: Arc<dyn NotificationChannel>,
        guard: TtlGuard,
        metrics: Arc<FeedMetrics>,
        config: &NotificationConfig,
    ) -> Self {
        Self {
            pool,
            channel,
            guard,
            metrics,
            retry_attempts: config.retry_attempts.max(1),
            retry_base: Duration::from_millis(config.retry_base_ms),
            fanout_ttl: Duration::from_secs(config.fanout_ttl_secs),
        }
    }

    /// Route a feed event to the right delivery path.
    pub async fn handle_event(&self, event: &FeedEvent) -> Result<()> {
        match event.event.as_str() {
            events::POST_CREATED => self.fan_out_new_post(event).await,
            events::POST_LIKED | events::POST_COMMENTED | events::POST_MODERATED => {
                self.notify_author(event).await
            }
            other => {
                tracing::debug!(event = other, "ignoring unknown feed event");
                Ok(())
            }
        }
    }

    /// Notify every active member of the organization about a new post.
    ///
    /// The cache marker makes duplicate events (redelivery, competing
    /// consumers) a no-op: only the first caller within the TTL fans out.
    async fn fan_out_new_post(&self, event: &FeedEvent) -> Result<()> {
        let marker = format!("feed:notify:new_post:{}", event.post_id);
        let first = self
            .guard
            .acquire(&marker, self.fanout_ttl)
            .await
            .map_err(|e| AppError::CacheError(e.to_string()))?;

        if !first {
            tracing::debug!(post_id = %event.post_id, "new-post fan-out already performed");
            return Ok(());
        }

        let recipients = directory_repo::active_user_ids(&self.pool, event.organization_id)
            .await?
            .into_iter()
            .filter(|id| *id != event.author_id);

        for recipient in recipients {
            let notification = Notification {
                recipient,
                kind: events::POST_CREATED.to_string(),
                post_id: event.post_id,
                message: "A new post was published in your community".to_string(),
            };
            // One bad recipient must not stop the fan-out.
            if let Err(err) = self.notify(&notification).await {
                tracing::error!(
                    recipient = %recipient,
                    post_id = %event.post_id,
                    error = %err,
                    "new-post notification failed"
                );
            }
        }

        Ok(())
    }

    /// Notify a post's author about activity on their post. Self-activity
    /// is skipped.
    async fn notify_author(&self, event: &FeedEvent) -> Result<()> {
        if event.actor_id == Some(event.author_id) {
            return Ok(());
        }

        let notification = Notification {
            recipient: event.author_id,
            kind: event.event.clone(),
            post_id: event.post_id,
            message: author_message(&event.event),
        };

        self.notify(&notification).await
    }

    /// Deliver one notification, retrying with exponential backoff.
    pub async fn notify(&self, notification: &Notification) -> Result<()> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.channel.deliver(notification).await {
                Ok(()) => {
                    self.metrics.notifications_sent.inc();
                    return Ok(());
                }
                Err(err) if attempt < self.retry_attempts => {
                    tracing::warn!(
                        recipient = %notification.recipient,
                        attempt,
                        error = %err,
                        "notification delivery failed, retrying"
                    );
                    tokio::time::sleep(retry_delay(self.retry_base, attempt)).await;
                }
                Err(err) => {
                    self.metrics.notifications_failed.inc();
                    return Err(err);
                }
            }
        }
    }
}

fn author_message(event: &str) -> String {
    match event {
        events::POST_LIKED => "Someone liked your post".to_string(),
        events::POST_COMMENTED => "Someone commented on your post".to_string(),
        events::POST_MODERATED => "Your post was reviewed by a moderator".to_string(),
        other => format!("Activity on your post: {other}"),
    }
}

/// Delay before retry `attempt + 1`: base doubled per completed attempt.
fn retry_delay(base: Duration, attempt: u32) -> Duration {
    base * 2u32.saturating_pow(attempt.saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn backoff_doubles_per_attempt() {
        let base = Duration::from_millis(200);
        assert_eq!(retry_delay(base, 1), Duration::from_millis(200));
        assert_eq!(retry_delay(base, 2), Duration::from_millis(400));
        assert_eq!(retry_delay(base, 3), Duration::from_millis(800));
    }

    #[test]
    fn author_messages_cover_known_events() {
        assert_eq!(author_message(events::POST_LIKED), "Someone liked your post");
        assert!(author_message("post.weird").contains("post.weird"));
    }

    struct FlakyChannel {
        calls: AtomicU32,
        fail_first: u32,
    }

    #[async_trait]
    impl NotificationChannel for FlakyChannel {
        async fn deliver(&self, _notification: &Notification) -> Result<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first {
                Err(AppError::Internal("down".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn channel_failures_surface_after_each_attempt() {
        let channel = FlakyChannel {
            calls: AtomicU32::new(0),
            fail_first: 2,
        };
        let notification = Notification {
            recipient: Uuid::new_v4(),
            kind: events::POST_LIKED.to_string(),
            post_id: Uuid::new_v4(),
            message: "m".to_string(),
        };

        assert!(channel.deliver(&notification).await.is_err());
        assert!(channel.deliver(&notification).await.is_err());
        assert!(channel.deliver(&notification).await.is_ok());
        assert_eq!(channel.calls.load(Ordering::SeqCst), 3);
    }
}
