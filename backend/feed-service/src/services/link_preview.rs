/// Link preview extraction.
///
/// Fetches the first link found in post content and scrapes Open Graph /
/// Twitter card metadata into a small preview blob stored on the post.
/// Failures degrade to a bare preview holding only the URL.
use crate::models::LinkPreview;
use reqwest::Url;
use scraper::{Html, Selector};
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = "HubxLinkPreview/1.0";

#[derive(Debug, Error)]
pub enum LinkPreviewError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),
}

#[derive(Clone)]
pub struct LinkPreviewClient {
    http: reqwest::Client,
}

impl LinkPreviewClient {
    pub fn new(fetch_timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(fetch_timeout)
            .build()
            .unwrap_or_default();

        Self { http }
    }

    pub async fn fetch(&self, url: &str) -> Result<LinkPreview, LinkPreviewError> {
        let parsed = Url::parse(url).map_err(|e| LinkPreviewError::InvalidUrl(e.to_string()))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(LinkPreviewError::InvalidUrl(format!(
                "unsupported scheme '{}'",
                parsed.scheme()
            )));
        }

        let body = self
            .http
            .get(parsed.clone())
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        Ok(parse_document(&body, &parsed))
    }
}

/// First http(s) URL appearing in a piece of text.
pub fn first_link(content: &str) -> Option<String> {
    content
        .split_whitespace()
        .find(|w| w.starts_with("http://") || w.starts_with("https://"))
        .map(|w| w.trim_end_matches(|c: char| matches!(c, '.' | ',' | ')' | ']')).to_string())
}

/// Minimal preview for a link whose page could not be scraped.
pub fn fallback_preview(url: &str) -> LinkPreview {
    LinkPreview {
        url: url.to_string(),
        title: url.to_string(),
        description: String::new(),
        image: None,
        site_name: host_of(url).unwrap_or_default(),
    }
}

fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
}

/// Scrape preview metadata out of an HTML document. Kept synchronous since
/// the parsed DOM is not Send.
fn parse_document(body: &str, base: &Url) -> LinkPreview {
    let document = Html::parse_document(body);

    let title = meta_content(&document, &["og:title", "twitter:title"])
        .or_else(|| element_text(&document, "title"))
        .unwrap_or_else(|| base.as_str().to_string());

    let description = meta_content(
        &document,
        &["og:description", "twitter:description", "description"],
    )
    .unwrap_or_default();

    let image = meta_content(&document, &["og:image", "twitter:image"])
        .and_then(|src| base.join(&src).ok().map(|u| u.to_string()));

    let site_name = meta_content(&document, &["og:site_name"])
        .or_else(|| base.host_str().map(|h| h.to_string()))
        .unwrap_or_default();

    LinkPreview {
        url: base.as_str().to_string(),
        title,
        description,
        image,
        site_name,
    }
}

/// First matching meta tag content, searching property= then name= forms.
fn meta_content(document: &Html, keys: &[&str]) -> Option<String> {
    for key in keys {
        for attr in ["property", "name"] {
            let selector = Selector::parse(&format!(r#"meta[{attr}="{key}"]"#)).ok()?;
            if let Some(element) = document.select(&selector).next() {
                if let Some(content) = element.value().attr("content") {
                    let content = content.trim();
                    if !content.is_empty() {
                        return Some(content.to_string());
                    }
                }
            }
        }
    }
    None
}

fn element_text(document: &Html, tag: &str) -> Option<String> {
    let selector = Selector::parse(tag).ok()?;
    document
        .select(&selector)
        .next()
        .map(|e| e.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><head>
            <title>Fallback Title</title>
            <meta property="og:title" content="Concert Night" />
            <meta property="og:description" content="An evening of music" />
            <meta property="og:image" content="/img/poster.jpg" />
            <meta property="og:site_name" content="Town Hall" />
        </head><body></body></html>
    "#;

    #[test]
    fn scrapes_open_graph_metadata() {
        let base = Url::parse("https://townhall.example/events/42").unwrap();
        let preview = parse_document(PAGE, &base);
        assert_eq!(preview.title, "Concert Night");
        assert_eq!(preview.description, "An evening of music");
        assert_eq!(
            preview.image.as_deref(),
            Some("https://townhall.example/img/poster.jpg")
        );
        assert_eq!(preview.site_name, "Town Hall");
    }

    #[test]
    fn falls_back_to_title_tag_and_host() {
        let html = "<html><head><title>Plain Page</title></head></html>";
        let base = Url::parse("https://example.org/post").unwrap();
        let preview = parse_document(html, &base);
        assert_eq!(preview.title, "Plain Page");
        assert_eq!(preview.site_name, "example.org");
        assert!(preview.image.is_none());
    }

    #[test]
    fn twitter_tags_cover_missing_open_graph() {
        let html = r#"<html><head>
            <meta name="twitter:title" content="Card Title" />
            <meta name="description" content="Plain description" />
        </head></html>"#;
        let base = Url::parse("https://example.org/").unwrap();
        let preview = parse_document(html, &base);
        assert_eq!(preview.title, "Card Title");
        assert_eq!(preview.description, "Plain description");
    }

    #[test]
    fn finds_the_first_link_in_content() {
        assert_eq!(
            first_link("read this https://a.example/x, then https://b.example"),
            Some("https://a.example/x".to_string())
        );
        assert_eq!(first_link("no links here"), None);
    }

    #[test]
    fn fallback_preview_keeps_the_url() {
        let preview = fallback_preview("https://example.org/page");
        assert_eq!(preview.url, "https://example.org/page");
        assert_eq!(preview.site_name, "example.org");
    }
}
