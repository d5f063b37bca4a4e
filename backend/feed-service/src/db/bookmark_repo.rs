use crate::models::Bookmark;
use sqlx::PgPool;
use uuid::Uuid;

pub async fn find_bookmark(
    pool: &PgPool,
    post_id: Uuid,
    user_id: Uuid,
) -> Result<Option<Bookmark>, sqlx::Error> {
    let bookmark = sqlx::query_as::<_, Bookmark>(
        r#"
        SELECT id, post_id, user_id, created_at
        FROM post_bookmarks
        WHERE post_id = $1 AND user_id = $2
        "#,
    )
    .bind(post_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(bookmark)
}

pub async fn insert_bookmark(
    pool: &PgPool,
    post_id: Uuid,
    user_id: Uuid,
) -> Result<Bookmark, sqlx::Error> {
    let bookmark = sqlx::query_as::<_, Bookmark>(
        r#"
        INSERT INTO post_bookmarks (post_id, user_id)
        VALUES ($1, $2)
        RETURNING id, post_id, user_id, created_at
        "#,
    )
    .bind(post_id)
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(bookmark)
}

pub async fn delete_bookmark(pool: &PgPool, bookmark_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM post_bookmarks WHERE id = $1")
        .bind(bookmark_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Bookmarked posts of a user, newest bookmark first.
pub async fn list_bookmarks_for_user(
    pool: &PgPool,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<Bookmark>, sqlx::Error> {
    let bookmarks = sqlx::query_as::<_, Bookmark>(
        r#"
        SELECT id, post_id, user_id, created_at
        FROM post_bookmarks
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(bookmarks)
}
