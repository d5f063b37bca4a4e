/// Syndicated feed ingestion.
///
/// Pulls each organization's RSS/Atom feed, normalizes and dedups its
/// entries, runs them through the content classifier, and publishes the
/// newest ones as posts attributed to the organization's oldest active
/// admin. A per-organization cache lock keeps concurrent runs from
/// ingesting the same feed twice.
use crate::config::IngestionConfig;
use crate::db::{directory_repo, feed_sync_repo, post_repo};
use crate::db::post_repo::NewPost;
use crate::error::{AppError, Result};
use crate::kafka::events::FeedEvent;
use crate::kafka::EventPublisher;
use crate::metrics::FeedMetrics;
use crate::models::{Decision, DirectoryUser, Organization};
use crate::services::classifier::Classifier;
use crate::services::link_preview::{fallback_preview, LinkPreviewClient};
use crate::services::moderation::ModerationService;
use crate::services::storage::{media_key, Storage};
use chrono::{DateTime, Utc};
use redis_utils::TtlGuard;
use sqlx::PgPool;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Tag attached to every ingested post.
pub const INGESTED_TAG: &str = "news";

/// One feed entry reduced to the fields the pipeline cares about.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEntry {
    pub external_id: String,
    pub link: String,
    pub title: String,
    pub summary: String,
    pub published_at: Option<DateTime<Utc>>,
}

pub struct IngestionService {
    pool: PgPool,
    guard: TtlGuard,
    classifier: Classifier,
    moderation: Arc<ModerationService>,
    publisher: Arc<EventPublisher>,
    preview: LinkPreviewClient,
    storage: Storage,
    metrics: Arc<FeedMetrics>,
    http: reqwest::Client,
    max_items: usize,
    lock_ttl: Duration,
    content_limit: usize,
}

impl IngestionService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: PgPool,
        guard: TtlGuard,
        classifier: Classifier,
        moderation: Arc<ModerationService>,
        publisher: Arc<EventPublisher>,
        preview: LinkPreviewClient,
        storage: Storage,
        metrics: Arc<FeedMetrics>,
        config: &IngestionConfig,
        content_limit: usize,
    ) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("HubxFeedIngestion/1.0")
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            pool,
            guard,
            classifier,
            moderation,
            publisher,
            preview,
            storage,
            metrics,
            http,
            max_items: config.max_items,
            lock_ttl: Duration::from_secs(config.lock_ttl_secs),
            content_limit,
        }
    }

    /// Ingest every organization with a configured feed. Per-organization
    /// failures are logged and do not stop the run.
    pub async fn run(&self) -> Result<()> {
        let organizations = directory_repo::feed_organizations(&self.pool).await?;
        tracing::info!(count = organizations.len(), "starting feed ingestion run");

        for org in organizations {
            if let Err(err) = self.ingest_organization(&org).await {
                tracing::error!(organization_id = %org.id, error = %err, "feed ingestion failed");
            }
        }

        Ok(())
    }

    /// Ingest one organization's feed under its cache lock. A run that finds
    /// the lock taken skips silently; the lock always comes off afterwards,
    /// even on failure.
    pub async fn ingest_organization(&self, org: &Organization) -> Result<usize> {
        let lock_key = format!("feed:ingest:{}", org.id);
        let acquired = self
            .guard
            .acquire(&lock_key, self.lock_ttl)
            .await
            .map_err(|e| AppError::CacheError(e.to_string()))?;

        if !acquired {
            tracing::info!(organization_id = %org.id, "ingestion already in progress, skipping");
            return Ok(0);
        }

        let result = self.sync_organization(org).await;

        if let Err(err) = self.guard.release(&lock_key).await {
            tracing::warn!(organization_id = %org.id, error = %err, "failed to release ingestion lock");
        }

        result
    }

    async fn sync_organization(&self, org: &Organization) -> Result<usize> {
        let Some(author) = directory_repo::oldest_active_admin(&self.pool, org.id).await? else {
            tracing::warn!(organization_id = %org.id, "no active admin to attribute posts to, skipping");
            return Ok(0);
        };

        let Some(feed_url) = org.feed_url.as_deref() else {
            return Ok(0);
        };

        let bytes = self
            .http
            .get(feed_url)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("feed fetch {feed_url}: {e}")))?
            .error_for_status()
            .map_err(|e| AppError::Internal(format!("feed fetch {feed_url}: {e}")))?
            .bytes()
            .await
            .map_err(|e| AppError::Internal(format!("feed body {feed_url}: {e}")))?;

        let feed = feed_rs::parser::parse(&bytes[..])
            .map_err(|e| AppError::ValidationError(format!("unparsable feed {feed_url}: {e}")))?;

        // Sort and cap first, then drop what the ledger already holds: a
        // fully-ledgered newest window means nothing is published, rather
        // than back-catalog entries sliding into the freed slots.
        let existing = feed_sync_repo::existing_external_ids(&self.pool, org.id).await?;
        let entries = filter_new(
            sort_and_limit(normalize_entries(&feed), self.max_items),
            &existing,
        );

        let mut published = 0;
        for entry in entries {
            match self.publish_entry(org, &author, &entry).await {
                Ok(true) => {
                    published += 1;
                    self.metrics.entries_ingested.inc();
                }
                Ok(false) => {}
                Err(err) => {
                    tracing::error!(
                        organization_id = %org.id,
                        external_id = entry.external_id,
                        error = %err,
                        "failed to publish ingested entry"
                    );
                }
            }
        }

        tracing::info!(organization_id = %org.id, published, "feed ingestion finished");
        Ok(published)
    }

    /// Turn one entry into a post. The post, its moderation row, and the
    /// dedup ledger record commit atomically; a crash mid-entry leaves it
    /// eligible for the next run.
    async fn publish_entry(
        &self,
        org: &Organization,
        author: &DirectoryUser,
        entry: &NormalizedEntry,
    ) -> Result<bool> {
        let content = truncate_content(&entry_text(entry), &entry.link, self.content_limit);

        let verdict = self.classifier.classify(&content);
        if verdict.decision == Decision::Rejected {
            tracing::warn!(
                organization_id = %org.id,
                external_id = entry.external_id,
                "ingested entry rejected by classifier"
            );
            return Ok(false);
        }

        let preview = match self.preview.fetch(&entry.link).await {
            Ok(preview) => preview,
            Err(err) => {
                tracing::debug!(link = entry.link, error = %err, "entry preview scrape failed");
                fallback_preview(&entry.link)
            }
        };

        let image_key = match &preview.image {
            Some(image_url) => self.rehost_image(image_url).await,
            None => None,
        };

        let new = NewPost {
            author_id: author.id,
            organization_id: org.id,
            feed_type: "global".to_string(),
            content,
            image_key,
            pdf_key: None,
            video_key: None,
            video_preview_key: None,
            group_id: None,
            event_id: None,
            link_preview: serde_json::to_value(&preview).ok(),
            tags: vec![INGESTED_TAG.to_string()],
        };

        let mut tx = self.pool.begin().await?;
        let post = post_repo::create_post(&mut tx, &new).await?;
        self.moderation
            .apply_verdict(&mut tx, post.id, verdict.decision, verdict.score)
            .await?;
        feed_sync_repo::insert_sync_record(
            &mut tx,
            org.id,
            &entry.external_id,
            &entry.title,
            &entry.link,
            entry.published_at,
        )
        .await?;
        tx.commit().await?;

        self.metrics.posts_created.inc();
        self.publisher.publish_logged(&FeedEvent::post_created(&post)).await;

        Ok(true)
    }

    /// Copy an entry's preview image into our own storage. Best-effort; on
    /// any failure the post simply carries no image.
    async fn rehost_image(&self, image_url: &str) -> Option<String> {
        let response = match self.http.get(image_url).send().await {
            Ok(r) => r,
            Err(err) => {
                tracing::debug!(image_url, error = %err, "entry image fetch failed");
                return None;
            }
        };

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();

        let bytes = match response.bytes().await {
            Ok(b) => b.to_vec(),
            Err(err) => {
                tracing::debug!(image_url, error = %err, "entry image body failed");
                return None;
            }
        };

        let filename = image_url
            .rsplit('/')
            .next()
            .filter(|n| !n.is_empty())
            .unwrap_or("image.jpg");
        let key = media_key(filename);

        match self.storage.put(&key, bytes, &content_type).await {
            Ok(()) => Some(key),
            Err(err) => {
                tracing::debug!(image_url, error = %err, "entry image store failed");
                None
            }
        }
    }
}

/// Reduce parsed feed entries to normalized form. Entries without a link
/// are dropped; a missing id falls back to the link.
pub fn normalize_entries(feed: &feed_rs::model::Feed) -> Vec<NormalizedEntry> {
    feed.entries
        .iter()
        .filter_map(|entry| {
            let link = entry.links.first().map(|l| l.href.clone())?;
            let external_id = if entry.id.is_empty() {
                link.clone()
            } else {
                entry.id.clone()
            };
            let title = entry
                .title
                .as_ref()
                .map(|t| t.content.trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| link.clone());
            let summary = entry
                .summary
                .as_ref()
                .map(|t| strip_html(&t.content))
                .unwrap_or_default();

            Some(NormalizedEntry {
                external_id,
                link,
                title,
                summary,
                published_at: entry.published.or(entry.updated),
            })
        })
        .collect()
}

/// Post body for an entry: title and summary joined by a blank line, with
/// either part standing alone when the other is missing.
pub fn entry_text(entry: &NormalizedEntry) -> String {
    [entry.title.as_str(), entry.summary.as_str()]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Drop entries already present in the dedup ledger.
pub fn filter_new(
    entries: Vec<NormalizedEntry>,
    existing: &HashSet<String>,
) -> Vec<NormalizedEntry> {
    entries
        .into_iter()
        .filter(|e| !existing.contains(&e.external_id))
        .collect()
}

/// Newest entries first, capped at `max`. Entries without a publish date
/// sort last.
pub fn sort_and_limit(mut entries: Vec<NormalizedEntry>, max: usize) -> Vec<NormalizedEntry> {
    entries.sort_by(|a, b| match (&b.published_at, &a.published_at) {
        (Some(b), Some(a)) => b.cmp(a),
        (Some(_), None) => std::cmp::Ordering::Greater,
        (None, Some(_)) => std::cmp::Ordering::Less,
        (None, None) => std::cmp::Ordering::Equal,
    });
    entries.truncate(max);
    entries
}

/// Compose the post body from the entry text and its link, truncating the
/// text so the whole body fits the limit but the link always survives.
pub fn truncate_content(text: &str, link: &str, limit: usize) -> String {
    let text = text.trim();
    let suffix = format!("\n\n{link}");
    let suffix_len = suffix.chars().count();

    if suffix_len >= limit {
        return link.to_string();
    }

    let budget = limit - suffix_len;
    if text.chars().count() <= budget {
        return format!("{text}{suffix}");
    }

    let truncated: String = text.chars().take(budget.saturating_sub(1)).collect();
    format!("{}…{suffix}", truncated.trim_end())
}

/// Strip markup out of feed summaries, collapsing whitespace.
pub fn strip_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    for c in input.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0"?>
        <rss version="2.0"><channel>
            <title>Town News</title>
            <item>
                <title>Old Story</title>
                <link>https://news.example/old</link>
                <guid>news-1</guid>
                <description>An &lt;b&gt;older&lt;/b&gt; story</description>
                <pubDate>Mon, 01 Jan 2024 10:00:00 GMT</pubDate>
            </item>
            <item>
                <title>Fresh Story</title>
                <link>https://news.example/fresh</link>
                <guid>news-2</guid>
                <description>Breaking news</description>
                <pubDate>Tue, 02 Jan 2024 10:00:00 GMT</pubDate>
            </item>
            <item>
                <title>Undated Story</title>
                <link>https://news.example/undated</link>
                <guid>news-3</guid>
            </item>
        </channel></rss>"#;

    fn parsed_entries() -> Vec<NormalizedEntry> {
        let feed = feed_rs::parser::parse(RSS.as_bytes()).unwrap();
        normalize_entries(&feed)
    }

    #[test]
    fn normalizes_rss_items() {
        let entries = parsed_entries();
        assert_eq!(entries.len(), 3);

        let old = entries.iter().find(|e| e.external_id == "news-1").unwrap();
        assert_eq!(old.link, "https://news.example/old");
        assert_eq!(old.title, "Old Story");
        assert_eq!(old.summary, "An older story");
        assert!(old.published_at.is_some());
    }

    #[test]
    fn sorts_newest_first_with_undated_last() {
        let sorted = sort_and_limit(parsed_entries(), 10);
        assert_eq!(sorted[0].external_id, "news-2");
        assert_eq!(sorted[1].external_id, "news-1");
        assert_eq!(sorted[2].external_id, "news-3");
    }

    #[test]
    fn limits_to_the_newest_entries() {
        let sorted = sort_and_limit(parsed_entries(), 1);
        assert_eq!(sorted.len(), 1);
        assert_eq!(sorted[0].external_id, "news-2");
    }

    #[test]
    fn dedup_filter_drops_known_ids_and_is_idempotent() {
        let existing: HashSet<String> = ["news-1".to_string()].into_iter().collect();
        let first = filter_new(parsed_entries(), &existing);
        assert_eq!(first.len(), 2);
        assert!(first.iter().all(|e| e.external_id != "news-1"));

        let again = filter_new(first.clone(), &existing);
        assert_eq!(again, first);
    }

    #[test]
    fn ledgered_newest_entries_do_not_admit_backlog() {
        // The cap applies to the newest entries before the ledger check, so
        // an already-ingested newest window publishes nothing instead of
        // pulling older entries into the freed slots.
        let existing: HashSet<String> = ["news-2".to_string()].into_iter().collect();
        let picked = filter_new(sort_and_limit(parsed_entries(), 1), &existing);
        assert!(picked.is_empty());

        let wrong_order = sort_and_limit(filter_new(parsed_entries(), &existing), 1);
        assert_eq!(wrong_order.len(), 1);
    }

    #[test]
    fn entry_text_joins_title_and_summary() {
        let entries = parsed_entries();
        let fresh = entries.iter().find(|e| e.external_id == "news-2").unwrap();
        assert_eq!(entry_text(fresh), "Fresh Story\n\nBreaking news");

        let undated = entries.iter().find(|e| e.external_id == "news-3").unwrap();
        assert_eq!(entry_text(undated), "Undated Story");
    }

    #[test]
    fn truncation_preserves_the_link() {
        let link = "https://news.example/x";
        let long_text = "word ".repeat(200);
        let content = truncate_content(&long_text, link, 120);
        assert!(content.chars().count() <= 120);
        assert!(content.ends_with(link));
        assert!(content.contains('…'));
    }

    #[test]
    fn short_text_is_kept_whole() {
        let content = truncate_content("brief", "https://a.example", 500);
        assert_eq!(content, "brief\n\nhttps://a.example");
    }

    #[test]
    fn tiny_limits_fall_back_to_the_bare_link() {
        let content = truncate_content("anything", "https://a.example", 5);
        assert_eq!(content, "https://a.example");
    }

    #[test]
    fn strips_tags_and_collapses_whitespace() {
        assert_eq!(
            strip_html("<p>Hello   <b>world</b></p>\n<br/>today"),
            "Hello world today"
        );
    }
}
