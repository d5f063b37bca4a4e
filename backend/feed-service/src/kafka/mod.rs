/// Feed event publishing
///
/// A single producer publishes post lifecycle events to the feed topic.
/// Delivery is retried a bounded number of times; callers that must not fail
/// on broker trouble use the logging wrapper.
pub mod events;

use crate::config::KafkaConfig;
use crate::error::{AppError, Result};
use events::FeedEvent;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;

pub struct EventPublisher {
    producer: FutureProducer,
    topic: String,
    retry_attempts: u32,
    retry_backoff: Duration,
    request_timeout: Duration,
}

impl EventPublisher {
    pub fn new(config: &KafkaConfig) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", config.brokers.join(","))
            .set("message.timeout.ms", config.request_timeout_ms.to_string())
            .create()
            .map_err(|e| AppError::Internal(format!("kafka producer: {e}")))?;

        Ok(Self {
            producer,
            topic: config.events_topic.clone(),
            retry_attempts: config.retry_attempts.max(1),
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
            request_timeout: Duration::from_millis(config.request_timeout_ms),
        })
    }

    /// Publish one event, retrying transient delivery failures.
    pub async fn publish(&self, event: &FeedEvent) -> Result<()> {
        let key = event.key();
        let payload = serde_json::to_string(event)?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let record = FutureRecord::to(&self.topic).key(&key).payload(&payload);

            match self
                .producer
                .send(record, Timeout::After(self.request_timeout))
                .await
            {
                Ok((partition, offset)) => {
                    tracing::debug!(
                        event = %event.event,
                        partition,
                        offset,
                        "feed event published"
                    );
                    return Ok(());
                }
                Err((err, _)) if attempt < self.retry_attempts => {
                    tracing::warn!(
                        event = %event.event,
                        attempt,
                        error = %err,
                        "feed event delivery failed, retrying"
                    );
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                }
                Err((err, _)) => {
                    return Err(AppError::Internal(format!(
                        "feed event delivery failed after {} attempts: {}",
                        attempt, err
                    )))
                }
            }
        }
    }

    /// Publish where the caller treats delivery as best-effort.
    pub async fn publish_logged(&self, event: &FeedEvent) {
        if let Err(err) = self.publish(event).await {
            tracing::error!(event = %event.event, post_id = %event.post_id, error = %err, "dropping feed event");
        }
    }
}
