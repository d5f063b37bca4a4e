/// Data structures for posts, moderation, uploads, and ingestion.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Feed placement of a post.
pub const FEED_TYPES: [&str; 4] = ["global", "user_wall", "group", "event"];

/// Classifier verdict for a piece of content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accepted,
    Suspect,
    Rejected,
}

impl Decision {
    /// Moderation status a decision maps to when applied to a post.
    pub fn status(self) -> ModerationStatus {
        match self {
            Decision::Accepted => ModerationStatus::Approved,
            Decision::Suspect => ModerationStatus::Pending,
            Decision::Rejected => ModerationStatus::Rejected,
        }
    }
}

/// Persisted review state of a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationStatus {
    Pending,
    Approved,
    Rejected,
}

impl ModerationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ModerationStatus::Pending => "pending",
            ModerationStatus::Approved => "approved",
            ModerationStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(ModerationStatus::Pending),
            "approved" => Some(ModerationStatus::Approved),
            "rejected" => Some(ModerationStatus::Rejected),
            _ => None,
        }
    }
}

/// A feed post.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub organization_id: Uuid,
    pub feed_type: String,
    pub content: String,
    pub image_key: Option<String>,
    pub pdf_key: Option<String>,
    pub video_key: Option<String>,
    pub video_preview_key: Option<String>,
    pub group_id: Option<Uuid>,
    pub event_id: Option<Uuid>,
    pub link_preview: Option<serde_json::Value>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Review state of a post, one row per post.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ModerationRecord {
    pub post_id: Uuid,
    pub status: String,
    pub reason: String,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user's report of a post. Append-only; (post, user) unique.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Flag {
    pub id: Uuid,
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// A like-style reaction; toggling soft-deletes and restores the row.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Reaction {
    pub id: Uuid,
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub vote: String,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub reply_to: Option<Uuid>,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Bookmark {
    pub id: Uuid,
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// A media upload dispatched to a background task, awaiting its final key.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PendingUpload {
    pub id: Uuid,
    pub task_ref: String,
    pub created_at: DateTime<Utc>,
}

/// Dedup ledger of already-ingested external feed entries. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrganizationFeedSync {
    pub organization_id: Uuid,
    pub external_id: String,
    pub title: String,
    pub link: String,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Per-organization schedule of a registered feed plugin.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FeedPluginConfig {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub plugin_key: String,
    pub frequency_minutes: i32,
    pub last_run: Option<DateTime<Utc>>,
}

/// Organization row consumed from the directory (read-only here).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Organization {
    pub id: Uuid,
    pub feed_url: Option<String>,
    pub inactive: bool,
    pub rate_limit_multiplier: f64,
    pub created_at: DateTime<Utc>,
}

/// User row consumed from the directory (read-only here).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DirectoryUser {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub is_active: bool,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

/// Link preview metadata attached to a post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkPreview {
    pub url: String,
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    pub site_name: String,
}
