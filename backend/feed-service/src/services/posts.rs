use crate::config::ModerationConfig;
use crate::db::{bookmark_repo, comment_repo, post_repo, reaction_repo};
use crate::db::post_repo::{NewPost, PostSearch};
use crate::error::{AppError, Result};
use crate::kafka::events::FeedEvent;
use crate::kafka::EventPublisher;
use crate::metrics::FeedMetrics;
use crate::models::{Bookmark, Comment, Decision, Post, FEED_TYPES};
use crate::services::classifier::Classifier;
use crate::services::link_preview::{fallback_preview, first_link, LinkPreviewClient};
use crate::services::moderation::ModerationService;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

const LIKE_VOTE: &str = "like";

/// Result of a reaction or bookmark toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Created,
    Removed,
}

impl ToggleOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            ToggleOutcome::Created => "created",
            ToggleOutcome::Removed => "removed",
        }
    }
}

/// Post lifecycle: creation through the classifier, search with moderation
/// visibility, reactions, comments, and bookmarks.
pub struct PostService {
    pool: PgPool,
    classifier: Classifier,
    moderation: Arc<ModerationService>,
    publisher: Arc<EventPublisher>,
    preview: LinkPreviewClient,
    metrics: Arc<FeedMetrics>,
    content_limit: usize,
}

impl PostService {
    pub fn new(
        pool: PgPool,
        moderation_config: &ModerationConfig,
        moderation: Arc<ModerationService>,
        publisher: Arc<EventPublisher>,
        preview: LinkPreviewClient,
        metrics: Arc<FeedMetrics>,
    ) -> Self {
        Self {
            pool,
            classifier: Classifier::new(moderation_config),
            moderation,
            publisher,
            preview,
            metrics,
            content_limit: moderation_config.content_limit,
        }
    }

    /// Create a post. Content runs through the classifier first; a rejected
    /// verdict blocks the write entirely. Accepted and suspect posts are
    /// stored together with their moderation row in one transaction.
    pub async fn create_post(&self, mut new: NewPost) -> Result<Post> {
        self.validate_content(&new.content)?;
        validate_placement(&new)?;

        let verdict = self.classifier.classify(&new.content);
        if verdict.decision == Decision::Rejected {
            self.metrics.posts_rejected.inc();
            return Err(AppError::ValidationError(
                "content rejected by moderation".to_string(),
            ));
        }

        if new.link_preview.is_none() {
            new.link_preview = self.scrape_preview(&new.content).await;
        }

        let mut tx = self.pool.begin().await?;
        let post = post_repo::create_post(&mut tx, &new).await?;
        self.moderation
            .apply_verdict(&mut tx, post.id, verdict.decision, verdict.score)
            .await?;
        tx.commit().await?;

        self.metrics.posts_created.inc();
        self.publish(FeedEvent::post_created(&post));

        Ok(post)
    }

    /// Edit a post's content. Re-runs the classifier; the new verdict
    /// replaces the old moderation decision.
    pub async fn update_content(&self, post_id: Uuid, content: &str) -> Result<Post> {
        self.validate_content(content)?;

        let verdict = self.classifier.classify(content);
        if verdict.decision == Decision::Rejected {
            self.metrics.posts_rejected.inc();
            return Err(AppError::ValidationError(
                "content rejected by moderation".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;
        post_repo::update_post_content(&mut tx, post_id, content).await?;
        self.moderation
            .apply_verdict(&mut tx, post_id, verdict.decision, verdict.score)
            .await?;
        tx.commit().await?;

        self.get_post(post_id).await
    }

    pub async fn get_post(&self, post_id: Uuid) -> Result<Post> {
        post_repo::find_post_by_id(&self.pool, post_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("post {} not found", post_id)))
    }

    pub async fn search(&self, search: &PostSearch) -> Result<Vec<Post>> {
        Ok(post_repo::search_posts(&self.pool, search).await?)
    }

    pub async fn delete_post(&self, post_id: Uuid) -> Result<()> {
        post_repo::soft_delete_post(&self.pool, post_id).await?;
        Ok(())
    }

    /// Toggle a like. The reaction row is soft-deleted and restored rather
    /// than recreated, so the pair (post, user) stays unique.
    pub async fn toggle_reaction(&self, post: &Post, user_id: Uuid) -> Result<ToggleOutcome> {
        let existing =
            reaction_repo::find_reaction(&self.pool, post.id, user_id, LIKE_VOTE).await?;

        let outcome = match existing {
            None => {
                reaction_repo::insert_reaction(&self.pool, post.id, user_id, LIKE_VOTE).await?;
                ToggleOutcome::Created
            }
            Some(reaction) if reaction.deleted_at.is_none() => {
                reaction_repo::set_reaction_deleted(&self.pool, reaction.id, true).await?;
                ToggleOutcome::Removed
            }
            Some(reaction) => {
                reaction_repo::set_reaction_deleted(&self.pool, reaction.id, false).await?;
                ToggleOutcome::Created
            }
        };

        match outcome {
            ToggleOutcome::Created => {
                self.metrics.reactions_active.inc();
                self.publish(FeedEvent::post_liked(post, user_id));
            }
            ToggleOutcome::Removed => self.metrics.reactions_active.dec(),
        }

        Ok(outcome)
    }

    /// Active like count on a post.
    pub async fn like_count(&self, post_id: Uuid) -> Result<i64> {
        Ok(reaction_repo::count_active(&self.pool, post_id).await?)
    }

    pub async fn toggle_bookmark(&self, post_id: Uuid, user_id: Uuid) -> Result<ToggleOutcome> {
        match bookmark_repo::find_bookmark(&self.pool, post_id, user_id).await? {
            Some(bookmark) => {
                bookmark_repo::delete_bookmark(&self.pool, bookmark.id).await?;
                Ok(ToggleOutcome::Removed)
            }
            None => {
                bookmark_repo::insert_bookmark(&self.pool, post_id, user_id).await?;
                Ok(ToggleOutcome::Created)
            }
        }
    }

    /// A user's bookmarks, newest first.
    pub async fn list_bookmarks(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Bookmark>> {
        Ok(bookmark_repo::list_bookmarks_for_user(&self.pool, user_id, limit, offset).await?)
    }

    pub async fn add_comment(
        &self,
        post: &Post,
        user_id: Uuid,
        reply_to: Option<Uuid>,
        body: &str,
    ) -> Result<Comment> {
        self.validate_content(body)?;

        let comment =
            comment_repo::insert_comment(&self.pool, post.id, user_id, reply_to, body).await?;
        self.publish(FeedEvent::post_commented(post, user_id));

        Ok(comment)
    }

    pub async fn list_comments(
        &self,
        post_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Comment>> {
        Ok(comment_repo::list_comments(&self.pool, post_id, limit, offset).await?)
    }

    pub async fn find_comment(&self, comment_id: Uuid) -> Result<Comment> {
        comment_repo::find_comment(&self.pool, comment_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("comment {} not found", comment_id)))
    }

    pub async fn delete_comment(&self, comment_id: Uuid) -> Result<()> {
        comment_repo::delete_comment(&self.pool, comment_id).await?;
        Ok(())
    }

    fn validate_content(&self, content: &str) -> Result<()> {
        if content.trim().is_empty() {
            return Err(AppError::ValidationError("content must not be empty".to_string()));
        }
        if content.chars().count() > self.content_limit {
            return Err(AppError::ValidationError(format!(
                "content exceeds {} characters",
                self.content_limit
            )));
        }
        Ok(())
    }

    /// Best-effort preview for the first link in the content. Scrape
    /// failures degrade to a bare preview; no link means no preview.
    async fn scrape_preview(&self, content: &str) -> Option<serde_json::Value> {
        let url = first_link(content)?;
        let preview = match self.preview.fetch(&url).await {
            Ok(preview) => preview,
            Err(err) => {
                tracing::debug!(url, error = %err, "link preview scrape failed");
                fallback_preview(&url)
            }
        };
        serde_json::to_value(preview).ok()
    }

    /// Event delivery never fails the request; failures are logged by the
    /// publisher.
    fn publish(&self, event: FeedEvent) {
        let publisher = Arc::clone(&self.publisher);
        tokio::spawn(async move {
            publisher.publish_logged(&event).await;
        });
    }
}

/// Placement and attachment invariants: group/event feeds need their target
/// id, and a post carries at most one document-style attachment.
fn validate_placement(new: &NewPost) -> Result<()> {
    if !FEED_TYPES.contains(&new.feed_type.as_str()) {
        return Err(AppError::ValidationError(format!(
            "unknown feed type '{}'",
            new.feed_type
        )));
    }
    if new.feed_type == "group" && new.group_id.is_none() {
        return Err(AppError::ValidationError(
            "group posts require a group_id".to_string(),
        ));
    }
    if new.feed_type == "event" && new.event_id.is_none() {
        return Err(AppError::ValidationError(
            "event posts require an event_id".to_string(),
        ));
    }
    if new.image_key.is_some() && new.pdf_key.is_some() {
        return Err(AppError::ValidationError(
            "a post cannot carry both an image and a pdf".to_string(),
        ));
    }
    Ok(())
}

/// Split a free-text query into OR terms on '|'.
pub fn parse_query_terms(q: &str) -> Vec<String> {
    q.split('|')
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_query_terms_on_pipes() {
        assert_eq!(
            parse_query_terms("music | festival|  "),
            vec!["music".to_string(), "festival".to_string()]
        );
    }

    #[test]
    fn empty_query_yields_no_terms() {
        assert!(parse_query_terms("").is_empty());
        assert!(parse_query_terms(" | | ").is_empty());
    }

    fn base_post() -> NewPost {
        NewPost {
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
        }
    }

    #[test]
    fn group_posts_require_their_group() {
        let mut new = base_post();
        new.feed_type = "group".to_string();
        assert!(validate_placement(&new).is_err());
        new.group_id = Some(Uuid::new_v4());
        assert!(validate_placement(&new).is_ok());
    }

    #[test]
    fn event_posts_require_their_event() {
        let mut new = base_post();
        new.feed_type = "event".to_string();
        assert!(validate_placement(&new).is_err());
        new.event_id = Some(Uuid::new_v4());
        assert!(validate_placement(&new).is_ok());
    }

    #[test]
    fn image_and_pdf_are_mutually_exclusive() {
        let mut new = base_post();
        new.image_key = Some("feed/a.jpg".to_string());
        new.pdf_key = Some("feed/a.pdf".to_string());
        assert!(validate_placement(&new).is_err());
    }

    #[test]
    fn unknown_feed_types_are_invalid() {
        let mut new = base_post();
        new.feed_type = "timeline".to_string();
        assert!(validate_placement(&new).is_err());
    }

    #[test]
    fn toggle_outcome_serializes_to_lowercase() {
        assert_eq!(ToggleOutcome::Created.as_str(), "created");
        assert_eq!(ToggleOutcome::Removed.as_str(), "removed");
    }
}
