/// Feed plugins.
///
/// Organizations schedule named plugins that generate feed content on a
/// fixed frequency. Plugins live in a static registry keyed by name; a
/// schedule row referencing an unregistered key is skipped with a warning
/// rather than failing the run.
use crate::db::{directory_repo, plugin_repo, post_repo};
use crate::db::post_repo::NewPost;
use crate::error::Result;
use crate::metrics::FeedMetrics;
use crate::models::FeedPluginConfig;
use crate::services::posts::PostService;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// A piece of content produced by a plugin run.
#[derive(Debug, Clone)]
pub struct PluginItem {
    pub content: String,
    pub tags: Vec<String>,
}

#[async_trait]
pub trait FeedPlugin: Send + Sync {
    /// Registry key referenced by schedule rows.
    fn key(&self) -> &'static str;

    /// Produce content for one organization. An empty result is a valid
    /// run and still advances the schedule.
    async fn run(&self, pool: &PgPool, organization_id: Uuid) -> Result<Vec<PluginItem>>;
}

#[derive(Default)]
pub struct PluginRegistry {
    plugins: HashMap<&'static str, Arc<dyn FeedPlugin>>,
}

impl PluginRegistry {
    /// Registry preloaded with the built-in plugins.
    pub fn with_builtins() -> Self {
        let mut registry = Self::default();
        registry.register(Arc::new(NewsHighlightsPlugin::default()));
        registry
    }

    pub fn register(&mut self, plugin: Arc<dyn FeedPlugin>) {
        self.plugins.insert(plugin.key(), plugin);
    }

    pub fn get(&self, key: &str) -> Option<&Arc<dyn FeedPlugin>> {
        self.plugins.get(key)
    }
}

/// Built-in plugin: a digest post of the organization's recent news posts.
#[derive(Default)]
pub struct NewsHighlightsPlugin;

impl NewsHighlightsPlugin {
    const RECENT_LIMIT: i64 = 5;
}

#[async_trait]
impl FeedPlugin for NewsHighlightsPlugin {
    fn key(&self) -> &'static str {
        "news_highlights"
    }

    async fn run(&self, pool: &PgPool, organization_id: Uuid) -> Result<Vec<PluginItem>> {
        let recent = post_repo::recent_posts_with_tag(
            pool,
            organization_id,
            crate::services::ingestion::INGESTED_TAG,
            Self::RECENT_LIMIT,
        )
        .await?;

        if recent.is_empty() {
            return Ok(vec![]);
        }

        let mut body = String::from("News highlights:\n");
        for post in &recent {
            let headline = post.content.lines().next().unwrap_or_default();
            body.push_str("- ");
            body.push_str(headline);
            body.push('\n');
        }

        Ok(vec![PluginItem {
            content: body,
            tags: vec!["highlights".to_string()],
        }])
    }
}

/// Executes due plugin schedules. Failures are isolated per plugin and do
/// not advance the schedule, so a broken plugin retries next cycle.
pub struct PluginRunner {
    pool: PgPool,
    registry: PluginRegistry,
    posts: Arc<PostService>,
    metrics: Arc<FeedMetrics>,
}

impl PluginRunner {
    pub fn new(
        pool: PgPool,
        registry: PluginRegistry,
        posts: Arc<PostService>,
        metrics: Arc<FeedMetrics>,
    ) -> Self {
        Self {
            pool,
            registry,
            posts,
            metrics,
        }
    }

    pub async fn run_due_plugins(&self) -> Result<()> {
        let configs = plugin_repo::list_plugin_configs(&self.pool).await?;
        let now = Utc::now();

        for config in configs {
            if !is_due(config.last_run, config.frequency_minutes, now) {
                continue;
            }
            if let Err(err) = self.run_one(&config).await {
                self.metrics.plugin_failures.inc();
                tracing::error!(
                    plugin = config.plugin_key,
                    organization_id = %config.organization_id,
                    error = %err,
                    "plugin run failed"
                );
            }
        }

        Ok(())
    }

    async fn run_one(&self, config: &FeedPluginConfig) -> Result<()> {
        let Some(plugin) = self.registry.get(&config.plugin_key) else {
            tracing::warn!(plugin = config.plugin_key, "unregistered plugin key, skipping");
            return Ok(());
        };

        let Some(author) =
            directory_repo::oldest_active_admin(&self.pool, config.organization_id).await?
        else {
            tracing::warn!(
                organization_id = %config.organization_id,
                "no active admin for plugin posts, skipping"
            );
            return Ok(());
        };

        let items = plugin.run(&self.pool, config.organization_id).await?;
        let produced = items.len();

        for item in items {
            self.posts
                .create_post(NewPost {
                    author_id: author.id,
                    organization_id: config.organization_id,
                    feed_type: "global".to_string(),
                    content: item.content,
                    image_key: None,
                    pdf_key: None,
                    video_key: None,
                    video_preview_key: None,
                    group_id: None,
                    event_id: None,
                    link_preview: None,
                    tags: item.tags,
                })
                .await?;
        }

        plugin_repo::update_last_run(&self.pool, config.id, Utc::now()).await?;
        tracing::info!(
            plugin = config.plugin_key,
            organization_id = %config.organization_id,
            produced,
            "plugin run finished"
        );

        Ok(())
    }
}

/// A schedule is due when it never ran or its frequency has elapsed.
pub fn is_due(last_run: Option<DateTime<Utc>>, frequency_minutes: i32, now: DateTime<Utc>) -> bool {
    match last_run {
        None => true,
        Some(last) => now - last >= Duration::minutes(frequency_minutes.max(0) as i64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_run_schedules_are_due() {
        assert!(is_due(None, 60, Utc::now()));
    }

    #[test]
    fn schedules_become_due_once_the_frequency_elapses() {
        let now = Utc::now();
        assert!(!is_due(Some(now - Duration::minutes(30)), 60, now));
        assert!(is_due(Some(now - Duration::minutes(60)), 60, now));
        assert!(is_due(Some(now - Duration::minutes(90)), 60, now));
    }

    #[test]
    fn registry_resolves_builtin_keys() {
        let registry = PluginRegistry::with_builtins();
        assert!(registry.get("news_highlights").is_some());
        assert!(registry.get("unknown_plugin").is_none());
    }
}
