use crate::models::Comment;
use sqlx::PgPool;
use uuid::Uuid;

pub async fn insert_comment(
    pool: &PgPool,
    post_id: Uuid,
    user_id: Uuid,
    reply_to: Option<Uuid>,
    body: &str,
) -> Result<Comment, sqlx::Error> {
    let comment = sqlx::query_as::<_, Comment>(
        r#"
        INSERT INTO post_comments (post_id, user_id, reply_to, body)
        VALUES ($1, $2, $3, $4)
        RETURNING id, post_id, user_id, reply_to, body, created_at, updated_at
        "#,
    )
    .bind(post_id)
    .bind(user_id)
    .bind(reply_to)
    .bind(body)
    .fetch_one(pool)
    .await?;

    Ok(comment)
}

/// Comments on a post, oldest first.
pub async fn list_comments(
    pool: &PgPool,
    post_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<Comment>, sqlx::Error> {
    let comments = sqlx::query_as::<_, Comment>(
        r#"
        SELECT id, post_id, user_id, reply_to, body, created_at, updated_at
        FROM post_comments
        WHERE post_id = $1
        ORDER BY created_at ASC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(post_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(comments)
}

pub async fn find_comment(
    pool: &PgPool,
    comment_id: Uuid,
) -> Result<Option<Comment>, sqlx::Error> {
    let comment = sqlx::query_as::<_, Comment>(
        r#"
        SELECT id, post_id, user_id, reply_to, body, created_at, updated_at
        FROM post_comments
        WHERE id = $1
        "#,
    )
    .bind(comment_id)
    .fetch_optional(pool)
    .await?;

    Ok(comment)
}

pub async fn delete_comment(pool: &PgPool, comment_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM post_comments WHERE id = $1")
        .bind(comment_id)
        .execute(pool)
        .await?;

    Ok(())
}
