use crate::models::Reaction;
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// Find a user's reaction on a post, including soft-deleted rows, so the
/// toggle can restore instead of inserting a duplicate.
pub async fn find_reaction(
    pool: &PgPool,
    post_id: Uuid,
    user_id: Uuid,
    vote: &str,
) -> Result<Option<Reaction>, sqlx::Error> {
    let reaction = sqlx::query_as::<_, Reaction>(
        r#"
        SELECT id, post_id, user_id, vote, created_at, deleted_at
        FROM post_reactions
        WHERE post_id = $1 AND user_id = $2 AND vote = $3
        "#,
    )
    .bind(post_id)
    .bind(user_id)
    .bind(vote)
    .fetch_optional(pool)
    .await?;

    Ok(reaction)
}

pub async fn insert_reaction(
    pool: &PgPool,
    post_id: Uuid,
    user_id: Uuid,
    vote: &str,
) -> Result<Reaction, sqlx::Error> {
    let reaction = sqlx::query_as::<_, Reaction>(
        r#"
        INSERT INTO post_reactions (post_id, user_id, vote)
        VALUES ($1, $2, $3)
        RETURNING id, post_id, user_id, vote, created_at, deleted_at
        "#,
    )
    .bind(post_id)
    .bind(user_id)
    .bind(vote)
    .fetch_one(pool)
    .await?;

    Ok(reaction)
}

/// Toggle the soft-delete marker on an existing reaction row.
pub async fn set_reaction_deleted(
    pool: &PgPool,
    reaction_id: Uuid,
    deleted: bool,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE post_reactions
        SET deleted_at = CASE WHEN $1 THEN NOW() ELSE NULL END
        WHERE id = $2
        "#,
    )
    .bind(deleted)
    .bind(reaction_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Count active (non-deleted) reactions on a post.
pub async fn count_active(pool: &PgPool, post_id: Uuid) -> Result<i64, sqlx::Error> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS count FROM post_reactions WHERE post_id = $1 AND deleted_at IS NULL",
    )
    .bind(post_id)
    .fetch_one(pool)
    .await?;

    Ok(row.get::<i64, _>("count"))
}
