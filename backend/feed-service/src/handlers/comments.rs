/// Comment handlers
use crate::error::{AppError, Result};
use crate::middleware::AuthenticatedUser;
use crate::services::posts::PostService;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub body: String,
    pub reply_to: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ListCommentsQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn create_comment(
    posts: web::Data<Arc<PostService>>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
    req: web::Json<CreateCommentRequest>,
) -> Result<HttpResponse> {
    let post = posts.get_post(path.into_inner()).await?;
    let comment = posts
        .add_comment(&post, user.id, req.reply_to, &req.body)
        .await?;

    Ok(HttpResponse::Created().json(comment))
}

pub async fn list_comments(
    posts: web::Data<Arc<PostService>>,
    _user: AuthenticatedUser,
    path: web::Path<Uuid>,
    query: web::Query<ListCommentsQuery>,
) -> Result<HttpResponse> {
    let post = posts.get_post(path.into_inner()).await?;
    let comments = posts
        .list_comments(
            post.id,
            query.limit.unwrap_or(50).clamp(1, 100),
            query.offset.unwrap_or(0).max(0),
        )
        .await?;

    Ok(HttpResponse::Ok().json(comments))
}

/// Delete a comment (author or staff)
pub async fn delete_comment(
    posts: web::Data<Arc<PostService>>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let comment = posts.find_comment(path.into_inner()).await?;
    if comment.user_id != user.id && !user.is_staff {
        return Err(AppError::Forbidden(
            "only the author or staff can delete a comment".to_string(),
        ));
    }

    posts.delete_comment(comment.id).await?;
    Ok(HttpResponse::NoContent().finish())
}
