/// Business logic layer
pub mod classifier;
pub mod ingestion;
pub mod link_preview;
pub mod media;
pub mod moderation;
pub mod notifications;
pub mod plugins;
pub mod posts;
pub mod rate_limit;
pub mod storage;
