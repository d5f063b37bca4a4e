/// Metrics collection for Feed Service.
///
/// Counters live on an injected `FeedMetrics` value owned by the process and
/// passed to each component, rather than on module-level statics; the
/// registry is private to the instance so tests can construct isolated sets.
use actix_web::{web, HttpResponse};
use prometheus::{Encoder, IntCounter, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

pub struct FeedMetrics {
    registry: Registry,
    /// Posts persisted (user submissions and ingested entries)
    pub posts_created: IntCounter,
    /// Post writes blocked by a rejected classifier verdict
    pub posts_rejected: IntCounter,
    /// External feed entries turned into posts
    pub entries_ingested: IntCounter,
    /// Async uploads finalized onto their referencing posts
    pub uploads_finalized: IntCounter,
    /// Notifications delivered to the downstream channel
    pub notifications_sent: IntCounter,
    /// Notifications abandoned after exhausting retries
    pub notifications_failed: IntCounter,
    /// Currently active like reactions
    pub reactions_active: IntGauge,
    /// Feed plugin invocations that returned an error
    pub plugin_failures: IntCounter,
}

impl FeedMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let posts_created = IntCounter::with_opts(Opts::new(
            "feed_posts_created_total",
            "Posts persisted by feed-service",
        ))?;
        let posts_rejected = IntCounter::with_opts(Opts::new(
            "feed_posts_rejected_total",
            "Post writes blocked by the content classifier",
        ))?;
        let entries_ingested = IntCounter::with_opts(Opts::new(
            "feed_entries_ingested_total",
            "External feed entries ingested as posts",
        ))?;
        let uploads_finalized = IntCounter::with_opts(Opts::new(
            "feed_uploads_finalized_total",
            "Async media uploads finalized onto posts",
        ))?;
        let notifications_sent = IntCounter::with_opts(Opts::new(
            "feed_notifications_sent_total",
            "Notifications delivered to the downstream channel",
        ))?;
        let notifications_failed = IntCounter::with_opts(Opts::new(
            "feed_notifications_failed_total",
            "Notifications abandoned after exhausting retries",
        ))?;
        let reactions_active = IntGauge::with_opts(Opts::new(
            "feed_reactions_active",
            "Currently active like reactions",
        ))?;
        let plugin_failures = IntCounter::with_opts(Opts::new(
            "feed_plugin_failures_total",
            "Feed plugin invocations that returned an error",
        ))?;

        registry.register(Box::new(posts_created.clone()))?;
        registry.register(Box::new(posts_rejected.clone()))?;
        registry.register(Box::new(entries_ingested.clone()))?;
        registry.register(Box::new(uploads_finalized.clone()))?;
        registry.register(Box::new(notifications_sent.clone()))?;
        registry.register(Box::new(notifications_failed.clone()))?;
        registry.register(Box::new(reactions_active.clone()))?;
        registry.register(Box::new(plugin_failures.clone()))?;

        Ok(Self {
            registry,
            posts_created,
            posts_rejected,
            entries_ingested,
            uploads_finalized,
            notifications_sent,
            notifications_failed,
            reactions_active,
            plugin_failures,
        })
    }

    /// Render all registered metrics in the Prometheus text format.
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

pub async fn serve_metrics(metrics: web::Data<Arc<FeedMetrics>>) -> HttpResponse {
    match metrics.export() {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(body),
        Err(err) => HttpResponse::InternalServerError().body(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero_and_increment() {
        let metrics = FeedMetrics::new().unwrap();
        assert_eq!(metrics.posts_created.get(), 0);
        metrics.posts_created.inc();
        assert_eq!(metrics.posts_created.get(), 1);
    }

    #[test]
    fn reaction_gauge_returns_to_baseline_after_toggle_pair() {
        let metrics = FeedMetrics::new().unwrap();
        let baseline = metrics.reactions_active.get();
        metrics.reactions_active.inc();
        metrics.reactions_active.dec();
        assert_eq!(metrics.reactions_active.get(), baseline);
    }

    #[test]
    fn export_contains_registered_metric_names() {
        let metrics = FeedMetrics::new().unwrap();
        metrics.entries_ingested.inc();
        let body = metrics.export().unwrap();
        assert!(body.contains("feed_entries_ingested_total"));
    }
}
