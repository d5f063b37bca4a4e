/// Notification consumer.
///
/// Subscribes to the feed events topic and hands each event to the
/// notification dispatcher. Offsets are committed manually after an event is
/// handled (or recognized as malformed), so a dispatch failure leaves the
/// message uncommitted and Kafka redelivers it.
use crate::config::KafkaConfig;
use crate::error::{AppError, Result};
use crate::kafka::events::FeedEvent;
use crate::services::notifications::NotificationDispatcher;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::Message;
use std::sync::Arc;
use std::time::Duration;

pub struct NotificationConsumer {
    consumer: StreamConsumer,
    dispatcher: Arc<NotificationDispatcher>,
}

/// Consumer configuration. Auto-commit stays off so offsets only advance
/// once a message has actually been handled.
fn consumer_config(config: &KafkaConfig) -> ClientConfig {
    let mut client_config = ClientConfig::new();
    client_config
        .set("bootstrap.servers", config.brokers.join(","))
        .set("group.id", &config.group_id)
        .set("enable.auto.commit", "false")
        .set("auto.offset.reset", "earliest");
    client_config
}

impl NotificationConsumer {
    pub fn new(config: &KafkaConfig, dispatcher: Arc<NotificationDispatcher>) -> Result<Self> {
        let consumer: StreamConsumer = consumer_config(config)
            .create()
            .map_err(|e| AppError::Internal(format!("kafka consumer: {e}")))?;

        consumer
            .subscribe(&[config.events_topic.as_str()])
            .map_err(|e| AppError::Internal(format!("kafka subscribe: {e}")))?;

        Ok(Self {
            consumer,
            dispatcher,
        })
    }

    pub async fn run(&self) {
        tracing::info!("notification consumer started");

        loop {
            match self.consumer.recv().await {
                Ok(message) => {
                    let handled = match message.payload() {
                        Some(payload) => match serde_json::from_slice::<FeedEvent>(payload) {
                            Ok(event) => match self.dispatcher.handle_event(&event).await {
                                Ok(()) => true,
                                Err(err) => {
                                    tracing::error!(
                                        event = %event.event,
                                        post_id = %event.post_id,
                                        error = %err,
                                        "notification dispatch failed, leaving message for redelivery"
                                    );
                                    false
                                }
                            },
                            Err(err) => {
                                // Malformed payloads never become valid;
                                // commit past them.
                                tracing::warn!(error = %err, "skipping malformed feed event");
                                true
                            }
                        },
                        None => true,
                    };

                    if handled {
                        if let Err(err) = self.consumer.commit_message(&message, CommitMode::Async)
                        {
                            tracing::error!(error = %err, "kafka offset commit failed");
                        }
                    }
                }
                Err(err) => {
                    tracing::error!(error = %err, "kafka receive error");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kafka_config() -> KafkaConfig {
        KafkaConfig {
            brokers: vec!["localhost:9092".to_string()],
            events_topic: "hubx-feed-events".to_string(),
            group_id: "feed-service-notifications".to_string(),
            request_timeout_ms: 5_000,
            retry_backoff_ms: 200,
            retry_attempts: 3,
        }
    }

    #[test]
    fn offsets_are_committed_manually() {
        let config = consumer_config(&kafka_config());
        assert_eq!(config.get("enable.auto.commit"), Some("false"));
        assert_eq!(config.get("auto.offset.reset"), Some("earliest"));
        assert_eq!(config.get("group.id"), Some("feed-service-notifications"));
    }
}
