use crate::models::{DirectoryUser, Organization};
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// Organizations eligible for syndicated feed ingestion: active, with a
/// configured feed URL.
pub async fn feed_organizations(pool: &PgPool) -> Result<Vec<Organization>, sqlx::Error> {
    let organizations = sqlx::query_as::<_, Organization>(
        r#"
        SELECT id, feed_url, inactive, rate_limit_multiplier, created_at
        FROM organizations
        WHERE feed_url IS NOT NULL AND feed_url <> '' AND inactive = FALSE
        ORDER BY created_at ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(organizations)
}

pub async fn find_organization(
    pool: &PgPool,
    organization_id: Uuid,
) -> Result<Option<Organization>, sqlx::Error> {
    let organization = sqlx::query_as::<_, Organization>(
        r#"
        SELECT id, feed_url, inactive, rate_limit_multiplier, created_at
        FROM organizations
        WHERE id = $1
        "#,
    )
    .bind(organization_id)
    .fetch_optional(pool)
    .await?;

    Ok(organization)
}

/// Oldest active admin of an organization. Ingested posts are attributed to
/// this user; organizations without one are skipped by ingestion.
pub async fn oldest_active_admin(
    pool: &PgPool,
    organization_id: Uuid,
) -> Result<Option<DirectoryUser>, sqlx::Error> {
    let user = sqlx::query_as::<_, DirectoryUser>(
        r#"
        SELECT id, organization_id, is_active, role, created_at
        FROM users
        WHERE organization_id = $1 AND is_active = TRUE AND role IN ('admin', 'root')
        ORDER BY created_at ASC
        LIMIT 1
        "#,
    )
    .bind(organization_id)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

/// All active members of an organization, the new-post fan-out audience.
pub async fn active_user_ids(
    pool: &PgPool,
    organization_id: Uuid,
) -> Result<Vec<Uuid>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT id FROM users WHERE organization_id = $1 AND is_active = TRUE",
    )
    .bind(organization_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(|r| r.get::<Uuid, _>("id")).collect())
}
