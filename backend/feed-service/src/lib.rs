/// Feed Service Library
///
/// Handles the Hubx feed: post creation and search, automated and human
/// content moderation, media uploads, syndicated feed ingestion, and
/// notification fan-out.
///
/// # Modules
///
/// - `handlers`: Feed-related HTTP request handlers
/// - `models`: Data structures for posts, moderation, uploads, ingestion
/// - `services`: Business logic layer
/// - `db`: Database access layer and repositories
/// - `kafka`: Feed event publishing
/// - `consumers`: Kafka consumers (notification dispatch)
/// - `jobs`: Periodic background jobs (feed ingestion, plugin runs)
/// - `middleware`: Request identity extraction
/// - `error`: Error types and handling
/// - `config`: Configuration management
/// - `metrics`: Observability and metrics collection
pub mod config;
pub mod consumers;
pub mod db;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod kafka;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{AppError, Result};
