use crate::models::Post;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const POST_CREATED: &str = "post.created";
pub const POST_LIKED: &str = "post.liked";
pub const POST_COMMENTED: &str = "post.commented";
pub const POST_MODERATED: &str = "post.moderated";

/// Event emitted on the feed topic for every post lifecycle change. The
/// notification dispatcher consumes these to fan out deliveries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedEvent {
    pub event: String,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub organization_id: Uuid,
    /// User whose action produced the event, when distinct from the author.
    pub actor_id: Option<Uuid>,
    pub occurred_at: DateTime<Utc>,
}

impl FeedEvent {
    fn new(event: &str, post: &Post, actor_id: Option<Uuid>) -> Self {
        Self {
            event: event.to_string(),
            post_id: post.id,
            author_id: post.author_id,
            organization_id: post.organization_id,
            actor_id,
            occurred_at: Utc::now(),
        }
    }

    pub fn post_created(post: &Post) -> Self {
        Self::new(POST_CREATED, post, None)
    }

    pub fn post_liked(post: &Post, actor_id: Uuid) -> Self {
        Self::new(POST_LIKED, post, Some(actor_id))
    }

    pub fn post_commented(post: &Post, actor_id: Uuid) -> Self {
        Self::new(POST_COMMENTED, post, Some(actor_id))
    }

    pub fn post_moderated(post: &Post, reviewer: Uuid) -> Self {
        Self::new(POST_MODERATED, post, Some(reviewer))
    }

    /// Partition key: events for one post stay ordered.
    pub fn key(&self) -> String {
        self.post_id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_post() -> Post {
        Post {
            id: Uuid::new_v4(),
            author_id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            feed_type: "global".to_string(),
            content: "hello".to_string(),
            image_key: None,
            pdf_key: None,
            video_key: None,
            video_preview_key: None,
            group_id: None,
            event_id: None,
            link_preview: None,
            tags: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    #[test]
    fn events_are_keyed_by_post() {
        let post = sample_post();
        let event = FeedEvent::post_created(&post);
        assert_eq!(event.key(), post.id.to_string());
        assert_eq!(event.event, POST_CREATED);
        assert!(event.actor_id.is_none());
    }

    #[test]
    fn event_json_round_trips() {
        let post = sample_post();
        let actor = Uuid::new_v4();
        let event = FeedEvent::post_liked(&post, actor);
        let json = serde_json::to_string(&event).unwrap();
        let back: FeedEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.event, POST_LIKED);
        assert_eq!(back.actor_id, Some(actor));
        assert_eq!(back.post_id, post.id);
    }
}
