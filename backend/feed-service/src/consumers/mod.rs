/// Kafka consumers
pub mod notification_consumer;
