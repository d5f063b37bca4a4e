/// Periodic background jobs
pub mod feed_ingestion;
pub mod plugin_runner;
