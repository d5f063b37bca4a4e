/// Configuration management for Feed Service
///
/// This module handles loading and managing configuration from environment
/// variables.
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application settings
    pub app: AppConfig,
    /// CORS configuration
    pub cors: CorsConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Cache (Redis) configuration
    pub cache: CacheConfig,
    /// Kafka configuration
    pub kafka: KafkaConfig,
    /// Object storage (S3) configuration
    pub storage: StorageConfig,
    /// Media upload limits
    pub media: MediaConfig,
    /// Content moderation configuration
    pub moderation: ModerationConfig,
    /// Syndicated feed ingestion configuration
    pub ingestion: IngestionConfig,
    /// Notification dispatch configuration
    pub notifications: NotificationConfig,
    /// Per-user request rate limits
    pub rate_limits: RateLimitConfig,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application environment (dev, staging, prod)
    pub env: String,
    /// Server host to bind to
    pub host: String,
    /// Server port to bind to
    pub port: u16,
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Comma-separated list of allowed origins
    pub allowed_origins: String,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL
    pub url: String,
    /// Max connections in pool
    pub max_connections: u32,
}

/// Cache (Redis) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Redis URL
    pub url: String,
}

/// Kafka configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaConfig {
    /// Kafka brokers
    pub brokers: Vec<String>,
    /// Feed events topic
    pub events_topic: String,
    /// Consumer group for the notification dispatcher
    pub group_id: String,
    #[serde(default = "default_kafka_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_kafka_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_kafka_retry_attempts")]
    pub retry_attempts: u32,
}

/// Object storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// S3 bucket for feed media
    pub bucket: String,
    /// AWS region
    pub region: String,
    /// Optional custom endpoint (minio, localstack)
    pub endpoint: Option<String>,
    /// Presigned GET URL expiry in seconds
    pub presign_expiry_secs: u64,
}

/// Media upload limits and mode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Max image size in bytes
    pub image_max_bytes: usize,
    /// Max video size in bytes
    pub video_max_bytes: usize,
    /// Max pdf size in bytes
    pub pdf_max_bytes: usize,
    /// When true, uploads go straight to storage and the request waits for
    /// the final key; when false, uploads are dispatched to a background
    /// task and a pending placeholder is returned immediately.
    pub eager_uploads: bool,
}

/// Content moderation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationConfig {
    /// Banned words used by the classifier
    pub bad_words: Vec<String>,
    /// Score at or above which content is marked suspect
    pub suspect_threshold: f64,
    /// Score at or above which content is rejected outright
    pub rejected_threshold: f64,
    /// Flag count at which a post is forced back to pending review
    pub flag_limit: i64,
    /// Max post content length in characters
    pub content_limit: usize,
}

/// Syndicated feed ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Max entries ingested per organization per run
    pub max_items: usize,
    /// TTL of the per-organization ingestion lock, in seconds
    pub lock_ttl_secs: u64,
    /// Timeout for external HTTP fetches (feed body, link preview, images)
    pub fetch_timeout_secs: u64,
    /// Interval between ingestion runs, in seconds
    pub run_interval_secs: u64,
}

/// Notification dispatch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Downstream notification channel endpoint
    pub webhook_url: String,
    /// Delivery attempts before a notification is surfaced as failed
    pub retry_attempts: u32,
    /// Base delay of the exponential backoff between attempts, in ms
    pub retry_base_ms: u64,
    /// TTL of the "first caller wins" new-post fan-out marker, in seconds
    pub fanout_ttl_secs: u64,
    /// Interval between feed plugin scheduler runs, in seconds
    pub plugin_interval_secs: u64,
}

/// Per-user request rate limits, scaled per organization by its
/// rate-limit multiplier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Post creations allowed per user per minute
    pub posts_per_minute: u32,
    /// Reads and light actions allowed per user per minute
    pub reads_per_minute: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        let app_env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        Ok(Config {
            app: AppConfig {
                env: app_env.clone(),
                host: std::env::var("FEED_SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("FEED_SERVICE_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(8081),
            },
            cors: {
                let allowed_origins = match std::env::var("CORS_ALLOWED_ORIGINS") {
                    Ok(value) => value,
                    Err(_) if app_env.eq_ignore_ascii_case("production") => {
                        return Err("CORS_ALLOWED_ORIGINS must be set in production".to_string())
                    }
                    Err(_) => "http://localhost:3000".to_string(),
                };

                if app_env.eq_ignore_ascii_case("production") && allowed_origins.trim() == "*" {
                    return Err("CORS_ALLOWED_ORIGINS cannot be '*' in production".to_string());
                }

                CorsConfig { allowed_origins }
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "postgresql://localhost/hubx".to_string()),
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|c| c.parse().ok())
                    .unwrap_or(10),
            },
            cache: CacheConfig {
                url: std::env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            },
            kafka: KafkaConfig {
                brokers: std::env::var("KAFKA_BROKERS")
                    .unwrap_or_else(|_| "localhost:9092".to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .collect(),
                events_topic: std::env::var("KAFKA_EVENTS_TOPIC")
                    .unwrap_or_else(|_| "hubx-feed-events".to_string()),
                group_id: std::env::var("KAFKA_GROUP_ID")
                    .unwrap_or_else(|_| "feed-service-notifications".to_string()),
                request_timeout_ms: std::env::var("KAFKA_REQUEST_TIMEOUT_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_else(default_kafka_request_timeout_ms),
                retry_backoff_ms: std::env::var("KAFKA_RETRY_BACKOFF_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_else(default_kafka_retry_backoff_ms),
                retry_attempts: std::env::var("KAFKA_RETRY_ATTEMPTS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_else(default_kafka_retry_attempts),
            },
            storage: StorageConfig {
                bucket: std::env::var("FEED_MEDIA_BUCKET")
                    .unwrap_or_else(|_| "hubx-feed-media".to_string()),
                region: std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
                endpoint: std::env::var("S3_ENDPOINT").ok().filter(|s| !s.is_empty()),
                presign_expiry_secs: std::env::var("FEED_MEDIA_PRESIGN_EXPIRY_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(3_600),
            },
            media: MediaConfig {
                image_max_bytes: std::env::var("FEED_IMAGE_MAX_SIZE")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(5 * 1024 * 1024),
                video_max_bytes: std::env::var("FEED_VIDEO_MAX_SIZE")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(20 * 1024 * 1024),
                pdf_max_bytes: std::env::var("FEED_PDF_MAX_SIZE")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(10 * 1024 * 1024),
                eager_uploads: std::env::var("FEED_EAGER_UPLOADS")
                    .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                    .unwrap_or(false),
            },
            moderation: ModerationConfig {
                bad_words: std::env::var("FEED_BAD_WORDS")
                    .unwrap_or_default()
                    .split(',')
                    .map(|s| s.trim().to_lowercase())
                    .filter(|s| !s.is_empty())
                    .collect(),
                suspect_threshold: parse_env_or_default("FEED_SUSPECT_THRESHOLD", 0.5)?,
                rejected_threshold: parse_env_or_default("FEED_REJECTED_THRESHOLD", 0.8)?,
                flag_limit: std::env::var("FEED_FLAG_LIMIT")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(3),
                content_limit: std::env::var("FEED_CONTENT_LIMIT")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(500),
            },
            ingestion: IngestionConfig {
                max_items: std::env::var("FEED_INGEST_MAX_ITEMS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(3),
                lock_ttl_secs: std::env::var("FEED_INGEST_LOCK_TTL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(600),
                fetch_timeout_secs: std::env::var("FEED_FETCH_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(5),
                run_interval_secs: std::env::var("FEED_INGEST_INTERVAL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(900),
            },
            notifications: NotificationConfig {
                webhook_url: std::env::var("NOTIFICATION_WEBHOOK_URL")
                    .unwrap_or_else(|_| "http://localhost:8090/notify".to_string()),
                retry_attempts: std::env::var("NOTIFICATION_RETRY_ATTEMPTS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(4),
                retry_base_ms: std::env::var("NOTIFICATION_RETRY_BASE_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(200),
                fanout_ttl_secs: std::env::var("NOTIFICATION_FANOUT_TTL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(3_600),
                plugin_interval_secs: std::env::var("FEED_PLUGIN_INTERVAL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(60),
            },
            rate_limits: RateLimitConfig {
                posts_per_minute: std::env::var("FEED_RATE_LIMIT_POSTS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(20),
                reads_per_minute: std::env::var("FEED_RATE_LIMIT_READS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(100),
            },
        })
    }
}

fn parse_env_or_default(key: &str, default: f64) -> Result<f64, String> {
    match std::env::var(key) {
        Ok(val) => val
            .parse()
            .map_err(|e| format!("Failed to parse {}='{}': {}", key, val, e)),
        Err(_) => Ok(default),
    }
}

fn default_kafka_request_timeout_ms() -> u64 {
    5_000
}

fn default_kafka_retry_backoff_ms() -> u64 {
    200
}

fn default_kafka_retry_attempts() -> u32 {
    3
}
