use crate::models::{Flag, ModerationRecord};
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

/// Upsert the moderation decision for a post. There is exactly one moderation
/// row per post; a later decision overwrites the earlier one.
pub async fn upsert_decision(
    tx: &mut Transaction<'_, Postgres>,
    post_id: Uuid,
    status: &str,
    reason: &str,
    reviewed_by: Option<Uuid>,
) -> Result<ModerationRecord, sqlx::Error> {
    let record = sqlx::query_as::<_, ModerationRecord>(
        r#"
        INSERT INTO post_moderation (post_id, status, reason, reviewed_by, reviewed_at)
        VALUES ($1, $2, $3, $4, CASE WHEN $4::uuid IS NULL THEN NULL ELSE NOW() END)
        ON CONFLICT (post_id) DO UPDATE
        SET status = EXCLUDED.status,
            reason = EXCLUDED.reason,
            reviewed_by = EXCLUDED.reviewed_by,
            reviewed_at = EXCLUDED.reviewed_at,
            updated_at = NOW()
        RETURNING post_id, status, reason, reviewed_by, reviewed_at, created_at, updated_at
        "#,
    )
    .bind(post_id)
    .bind(status)
    .bind(reason)
    .bind(reviewed_by)
    .fetch_one(&mut **tx)
    .await?;

    Ok(record)
}

pub async fn find_by_post(
    pool: &PgPool,
    post_id: Uuid,
) -> Result<Option<ModerationRecord>, sqlx::Error> {
    let record = sqlx::query_as::<_, ModerationRecord>(
        r#"
        SELECT post_id, status, reason, reviewed_by, reviewed_at, created_at, updated_at
        FROM post_moderation
        WHERE post_id = $1
        "#,
    )
    .bind(post_id)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

/// Insert a flag. Fails with a unique violation when the same user already
/// flagged the post; the caller maps that to a conflict response.
pub async fn insert_flag(
    tx: &mut Transaction<'_, Postgres>,
    post_id: Uuid,
    user_id: Uuid,
) -> Result<Flag, sqlx::Error> {
    let flag = sqlx::query_as::<_, Flag>(
        r#"
        INSERT INTO post_flags (post_id, user_id)
        VALUES ($1, $2)
        RETURNING id, post_id, user_id, created_at
        "#,
    )
    .bind(post_id)
    .bind(user_id)
    .fetch_one(&mut **tx)
    .await?;

    Ok(flag)
}

/// Count distinct flags on a post, inside the flagging transaction so the
/// threshold check sees the flag just inserted.
pub async fn count_flags(
    tx: &mut Transaction<'_, Postgres>,
    post_id: Uuid,
) -> Result<i64, sqlx::Error> {
    let row = sqlx::query("SELECT COUNT(*) AS count FROM post_flags WHERE post_id = $1")
        .bind(post_id)
        .fetch_one(&mut **tx)
        .await?;

    Ok(row.get::<i64, _>("count"))
}

/// Current moderation status of a post, read inside an open transaction.
pub async fn status_for_update(
    tx: &mut Transaction<'_, Postgres>,
    post_id: Uuid,
) -> Result<Option<String>, sqlx::Error> {
    let row = sqlx::query("SELECT status FROM post_moderation WHERE post_id = $1 FOR UPDATE")
        .bind(post_id)
        .fetch_optional(&mut **tx)
        .await?;

    Ok(row.map(|r| r.get::<String, _>("status")))
}
