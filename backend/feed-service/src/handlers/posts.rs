/// Post handlers - HTTP endpoints for post operations
use crate::db::post_repo::{NewPost, PostSearch};
use crate::error::{AppError, Result};
use crate::kafka::events::FeedEvent;
use crate::kafka::EventPublisher;
use crate::middleware::AuthenticatedUser;
use crate::models::{ModerationStatus, Post};
use crate::services::media::parse_pending;
use crate::services::moderation::ModerationService;
use crate::services::posts::{parse_query_terms, PostService};
use crate::services::rate_limit::RateLimitService;
use crate::services::storage::Storage;
use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub feed_type: String,
    pub content: String,
    pub image_key: Option<String>,
    pub pdf_key: Option<String>,
    pub video_key: Option<String>,
    pub video_preview_key: Option<String>,
    pub group_id: Option<Uuid>,
    pub event_id: Option<Uuid>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePostRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ModeratePostRequest {
    pub status: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct ListPostsQuery {
    pub feed_type: Option<String>,
    pub group_id: Option<Uuid>,
    pub event_id: Option<Uuid>,
    /// Comma-separated tag filter
    pub tags: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Free-text query; '|' separates OR terms
    pub q: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Post detail payload: the post plus presigned media URLs and its
/// moderation status.
#[derive(Debug, Serialize)]
pub struct PostDetailResponse {
    #[serde(flatten)]
    pub post: Post,
    pub moderation_status: Option<String>,
    pub likes: i64,
    pub image_url: Option<String>,
    pub pdf_url: Option<String>,
    pub video_url: Option<String>,
    pub video_preview_url: Option<String>,
}

/// Create a new post
pub async fn create_post(
    posts: web::Data<Arc<PostService>>,
    rate_limits: web::Data<Arc<RateLimitService>>,
    user: AuthenticatedUser,
    req: web::Json<CreatePostRequest>,
) -> Result<HttpResponse> {
    rate_limits.check_post(&user).await?;
    let req = req.into_inner();

    let post = posts
        .create_post(NewPost {
            author_id: user.id,
            organization_id: user.organization_id,
            feed_type: req.feed_type,
            content: req.content,
            image_key: req.image_key,
            pdf_key: req.pdf_key,
            video_key: req.video_key,
            video_preview_key: req.video_preview_key,
            group_id: req.group_id,
            event_id: req.event_id,
            link_preview: None,
            tags: req.tags,
        })
        .await?;

    Ok(HttpResponse::Created().json(post))
}

/// List visible posts with filters
pub async fn list_posts(
    posts: web::Data<Arc<PostService>>,
    rate_limits: web::Data<Arc<RateLimitService>>,
    user: AuthenticatedUser,
    query: web::Query<ListPostsQuery>,
) -> Result<HttpResponse> {
    rate_limits.check_read(&user).await?;
    let query = query.into_inner();

    let search = PostSearch {
        feed_type: query.feed_type,
        organization_id: Some(user.organization_id),
        group_id: query.group_id,
        event_id: query.event_id,
        tags: query
            .tags
            .map(|t| {
                t.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default(),
        created_from: query.from,
        created_to: query.to,
        terms: query.q.map(|q| parse_query_terms(&q)).unwrap_or_default(),
        viewer: Some(user.id),
        staff: user.is_staff,
        limit: query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        offset: query.offset.unwrap_or(0).max(0),
    };

    let results = posts.search(&search).await?;
    Ok(HttpResponse::Ok().json(results))
}

/// Get a single post with presigned media URLs
pub async fn get_post(
    posts: web::Data<Arc<PostService>>,
    moderation: web::Data<Arc<ModerationService>>,
    storage: web::Data<Storage>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let post = posts.get_post(path.into_inner()).await?;
    let record = moderation.record_for(post.id).await?;
    let status = record.as_ref().map(|r| r.status.clone());

    ensure_visible(&post, status.as_deref(), &user)?;

    let likes = posts.like_count(post.id).await?;
    let image_url = presign_final(&storage, post.image_key.as_deref()).await;
    let pdf_url = presign_final(&storage, post.pdf_key.as_deref()).await;
    let video_url = presign_final(&storage, post.video_key.as_deref()).await;
    let video_preview_url = presign_final(&storage, post.video_preview_key.as_deref()).await;

    Ok(HttpResponse::Ok().json(PostDetailResponse {
        post,
        moderation_status: status,
        likes,
        image_url,
        pdf_url,
        video_url,
        video_preview_url,
    }))
}

/// Edit a post's content (author only)
pub async fn update_post(
    posts: web::Data<Arc<PostService>>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
    req: web::Json<UpdatePostRequest>,
) -> Result<HttpResponse> {
    let post = posts.get_post(path.into_inner()).await?;
    if post.author_id != user.id {
        return Err(AppError::Forbidden("only the author can edit a post".to_string()));
    }

    let updated = posts.update_content(post.id, &req.content).await?;
    Ok(HttpResponse::Ok().json(updated))
}

/// Soft-delete a post (author or staff)
pub async fn delete_post(
    posts: web::Data<Arc<PostService>>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let post = posts.get_post(path.into_inner()).await?;
    if post.author_id != user.id && !user.is_staff {
        return Err(AppError::Forbidden(
            "only the author or staff can delete a post".to_string(),
        ));
    }

    posts.delete_post(post.id).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Flag a post for review. A second flag from the same user conflicts.
pub async fn flag_post(
    posts: web::Data<Arc<PostService>>,
    moderation: web::Data<Arc<ModerationService>>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let post = posts.get_post(path.into_inner()).await?;
    let flags = moderation.register_flag(post.id, user.id).await?;

    Ok(HttpResponse::Created().json(serde_json::json!({ "flags": flags })))
}

/// Record a staff review decision on a post
pub async fn moderate_post(
    posts: web::Data<Arc<PostService>>,
    moderation: web::Data<Arc<ModerationService>>,
    publisher: web::Data<Arc<EventPublisher>>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
    req: web::Json<ModeratePostRequest>,
) -> Result<HttpResponse> {
    if !user.is_staff {
        return Err(AppError::Forbidden("moderation requires staff".to_string()));
    }

    let status = ModerationStatus::parse(&req.status).ok_or_else(|| {
        AppError::ValidationError(format!("unknown moderation status '{}'", req.status))
    })?;

    let post = posts.get_post(path.into_inner()).await?;
    let record = moderation
        .apply_review(post.id, status, &req.reason, user.id)
        .await?;

    let event = FeedEvent::post_moderated(&post, user.id);
    let publisher = Arc::clone(publisher.get_ref());
    tokio::spawn(async move {
        publisher.publish_logged(&event).await;
    });

    Ok(HttpResponse::Ok().json(record))
}

/// Same visibility rule the search applies: rejected posts are hidden from
/// everyone; non-approved posts show only to staff and their author.
fn ensure_visible(post: &Post, status: Option<&str>, user: &AuthenticatedUser) -> Result<()> {
    if status == Some(ModerationStatus::Rejected.as_str()) {
        return Err(AppError::NotFound(format!("post {} not found", post.id)));
    }
    if status != Some(ModerationStatus::Approved.as_str())
        && !user.is_staff
        && post.author_id != user.id
    {
        return Err(AppError::NotFound(format!("post {} not found", post.id)));
    }
    Ok(())
}

/// Presign a stored media key. Pending placeholders have nothing to serve
/// yet, and presign failures degrade to no URL.
async fn presign_final(storage: &Storage, key: Option<&str>) -> Option<String> {
    let key = key?;
    if parse_pending(key).is_some() {
        return None;
    }
    match storage.presigned_get_url(key).await {
        Ok(url) => Some(url),
        Err(err) => {
            tracing::warn!(key, error = %err, "media presign failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_post(author_id: Uuid) -> Post {
        Post {
            id: Uuid::new_v4(),
            author_id,
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

    fn viewer(id: Uuid, staff: bool) -> AuthenticatedUser {
        AuthenticatedUser {
            id,
            organization_id: Uuid::new_v4(),
            is_staff: staff,
        }
    }

    #[test]
    fn rejected_posts_are_hidden_from_everyone() {
        let author = Uuid::new_v4();
        let post = sample_post(author);
        let rejected = Some(ModerationStatus::Rejected.as_str());

        assert!(ensure_visible(&post, rejected, &viewer(Uuid::new_v4(), false)).is_err());
        assert!(ensure_visible(&post, rejected, &viewer(Uuid::new_v4(), true)).is_err());
        assert!(ensure_visible(&post, rejected, &viewer(author, false)).is_err());
    }

    #[test]
    fn pending_posts_show_to_staff_and_author_only() {
        let author = Uuid::new_v4();
        let post = sample_post(author);
        let pending = Some(ModerationStatus::Pending.as_str());

        assert!(ensure_visible(&post, pending, &viewer(author, false)).is_ok());
        assert!(ensure_visible(&post, pending, &viewer(Uuid::new_v4(), true)).is_ok());
        assert!(ensure_visible(&post, pending, &viewer(Uuid::new_v4(), false)).is_err());
    }

    #[test]
    fn approved_posts_are_visible_to_anyone() {
        let post = sample_post(Uuid::new_v4());
        let approved = Some(ModerationStatus::Approved.as_str());
        assert!(ensure_visible(&post, approved, &viewer(Uuid::new_v4(), false)).is_ok());
    }
}
