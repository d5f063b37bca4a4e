use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::collections::HashSet;
use uuid::Uuid;

/// External IDs already ingested for an organization, used to drop duplicate
/// entries before publishing.
pub async fn existing_external_ids(
    pool: &PgPool,
    organization_id: Uuid,
) -> Result<HashSet<String>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT external_id FROM organization_feed_sync WHERE organization_id = $1",
    )
    .bind(organization_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|r| r.get::<String, _>("external_id"))
        .collect())
}

/// Record an ingested entry in the dedup ledger, inside the same transaction
/// that created its post.
pub async fn insert_sync_record(
    tx: &mut Transaction<'_, Postgres>,
    organization_id: Uuid,
    external_id: &str,
    title: &str,
    link: &str,
    published_at: Option<DateTime<Utc>>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO organization_feed_sync (organization_id, external_id, title, link, published_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(organization_id)
    .bind(external_id)
    .bind(title)
    .bind(link)
    .bind(published_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
