use feed_service::config::{Config, ModerationConfig};
use feed_service::models::{Decision, ModerationStatus};
use feed_service::services::classifier::Classifier;
use feed_service::services::ingestion::{sort_and_limit, strip_html, truncate_content};
use feed_service::services::link_preview::{fallback_preview, first_link};
use feed_service::services::media::{parse_pending, pending_placeholder};
use feed_service::services::posts::parse_query_terms;
use uuid::Uuid;

fn moderation_config() -> ModerationConfig {
    ModerationConfig {
        bad_words: vec!["ruim".to_string()],
        suspect_threshold: 0.5,
        rejected_threshold: 0.8,
        flag_limit: 3,
        content_limit: 500,
    }
}

#[test]
fn decisions_map_to_moderation_statuses() {
    assert_eq!(Decision::Accepted.status(), ModerationStatus::Approved);
    assert_eq!(Decision::Suspect.status(), ModerationStatus::Pending);
    assert_eq!(Decision::Rejected.status(), ModerationStatus::Rejected);
}

#[test]
fn moderation_status_round_trips_through_strings() {
    for status in [
        ModerationStatus::Pending,
        ModerationStatus::Approved,
        ModerationStatus::Rejected,
    ] {
        assert_eq!(ModerationStatus::parse(status.as_str()), Some(status));
    }
    assert_eq!(ModerationStatus::parse("weird"), None);
}

#[test]
fn classifier_decisions_follow_the_score() {
    let classifier = Classifier::new(&moderation_config());

    assert_eq!(
        classifier.classify("totally fine text").decision,
        Decision::Accepted
    );
    assert_eq!(
        classifier.classify("ruim fine ruim fine").decision,
        Decision::Suspect
    );
    assert_eq!(classifier.classify("ruim ruim").decision, Decision::Rejected);
}

#[test]
fn pending_placeholders_round_trip() {
    let id = Uuid::new_v4();
    assert_eq!(parse_pending(&pending_placeholder(id)), Some(id));
    assert_eq!(parse_pending("feed/abc.jpg"), None);
}

#[test]
fn ingestion_truncation_always_keeps_the_link() {
    let link = "https://example.org/story";
    for limit in [30, 80, 500] {
        let content = truncate_content(&"x".repeat(1_000), link, limit);
        assert!(content.ends_with(link), "limit {limit} lost the link");
        assert!(content.chars().count() <= limit.max(link.chars().count()));
    }
}

#[test]
fn ingestion_sorting_caps_and_orders_entries() {
    use chrono::{TimeZone, Utc};
    use feed_service::services::ingestion::NormalizedEntry;

    let entry = |id: &str, ts: Option<i64>| NormalizedEntry {
        external_id: id.to_string(),
        link: format!("https://example.org/{id}"),
        title: id.to_string(),
        summary: String::new(),
        published_at: ts.map(|t| Utc.timestamp_opt(t, 0).unwrap()),
    };

    let sorted = sort_and_limit(
        vec![entry("a", Some(100)), entry("b", None), entry("c", Some(200))],
        2,
    );
    assert_eq!(sorted.len(), 2);
    assert_eq!(sorted[0].external_id, "c");
    assert_eq!(sorted[1].external_id, "a");
}

#[test]
fn html_is_stripped_from_summaries() {
    assert_eq!(strip_html("<p>a <em>b</em></p>"), "a b");
}

#[test]
fn search_terms_split_on_pipes() {
    assert_eq!(parse_query_terms("a|b | "), vec!["a", "b"]);
}

#[test]
fn link_helpers_extract_and_degrade() {
    assert_eq!(
        first_link("see https://example.org/x."),
        Some("https://example.org/x".to_string())
    );
    let preview = fallback_preview("https://example.org/x");
    assert_eq!(preview.site_name, "example.org");
}

#[test]
fn config_defaults_cover_local_development() {
    // Relies on a clean environment; CI does not export FEED_* overrides.
    let config = Config::from_env().expect("default config loads");
    assert_eq!(config.moderation.suspect_threshold, 0.5);
    assert_eq!(config.moderation.rejected_threshold, 0.8);
    assert_eq!(config.moderation.flag_limit, 3);
    assert_eq!(config.ingestion.max_items, 3);
    assert_eq!(config.media.image_max_bytes, 5 * 1024 * 1024);
    assert_eq!(config.media.video_max_bytes, 20 * 1024 * 1024);
    assert_eq!(config.media.pdf_max_bytes, 10 * 1024 * 1024);
    assert_eq!(config.rate_limits.posts_per_minute, 20);
    assert_eq!(config.rate_limits.reads_per_minute, 100);
}

#[test]
fn rate_limits_scale_with_the_organization_multiplier() {
    use feed_service::services::rate_limit::effective_limit;

    assert_eq!(effective_limit(20, 2.0), 40);
    assert_eq!(effective_limit(20, 0.0), 1);
}
