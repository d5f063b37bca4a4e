use crate::models::PendingUpload;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

pub async fn insert_pending_upload(
    pool: &PgPool,
    id: Uuid,
    task_ref: &str,
) -> Result<PendingUpload, sqlx::Error> {
    let pending = sqlx::query_as::<_, PendingUpload>(
        r#"
        INSERT INTO pending_uploads (id, task_ref)
        VALUES ($1, $2)
        RETURNING id, task_ref, created_at
        "#,
    )
    .bind(id)
    .bind(task_ref)
    .fetch_one(pool)
    .await?;

    Ok(pending)
}

/// Delete the pending row and return it. `None` means the upload was already
/// finalized, making repeated finalization a no-op.
pub async fn delete_returning(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
) -> Result<Option<PendingUpload>, sqlx::Error> {
    let pending = sqlx::query_as::<_, PendingUpload>(
        r#"
        DELETE FROM pending_uploads
        WHERE id = $1
        RETURNING id, task_ref, created_at
        "#,
    )
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(pending)
}
