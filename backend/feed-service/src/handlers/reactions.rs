/// Reaction and bookmark toggles
use crate::error::Result;
use crate::middleware::AuthenticatedUser;
use crate::services::posts::PostService;
use crate::services::rate_limit::RateLimitService;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct ListBookmarksQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Toggle a like on a post. Responds with whether the like now exists.
pub async fn toggle_like(
    posts: web::Data<Arc<PostService>>,
    rate_limits: web::Data<Arc<RateLimitService>>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    rate_limits.check_read(&user).await?;

    let post = posts.get_post(path.into_inner()).await?;
    let outcome = posts.toggle_reaction(&post, user.id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "status": outcome.as_str() })))
}

/// Toggle a bookmark on a post
pub async fn toggle_bookmark(
    posts: web::Data<Arc<PostService>>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let post = posts.get_post(path.into_inner()).await?;
    let outcome = posts.toggle_bookmark(post.id, user.id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "status": outcome.as_str() })))
}

/// List the caller's bookmarks, newest first
pub async fn list_bookmarks(
    posts: web::Data<Arc<PostService>>,
    user: AuthenticatedUser,
    query: web::Query<ListBookmarksQuery>,
) -> Result<HttpResponse> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0).max(0);

    let bookmarks = posts.list_bookmarks(user.id, limit, offset).await?;
    Ok(HttpResponse::Ok().json(bookmarks))
}
