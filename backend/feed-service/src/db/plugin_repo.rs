use crate::models::FeedPluginConfig;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

pub async fn list_plugin_configs(pool: &PgPool) -> Result<Vec<FeedPluginConfig>, sqlx::Error> {
    let configs = sqlx::query_as::<_, FeedPluginConfig>(
        r#"
        SELECT id, organization_id, plugin_key, frequency_minutes, last_run
        FROM feed_plugin_configs
        ORDER BY organization_id, plugin_key
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(configs)
}

/// Advance the schedule marker after a successful plugin run.
pub async fn update_last_run(
    pool: &PgPool,
    config_id: Uuid,
    ran_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE feed_plugin_configs SET last_run = $1 WHERE id = $2")
        .bind(ran_at)
        .bind(config_id)
        .execute(pool)
        .await?;

    Ok(())
}
