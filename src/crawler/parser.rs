//! Page parsing for the crawl driver
//!
//! Reads the title a page declares, the links it offers, and the unit URLs
//! listed by the course-blocks API.

use scraper::{Html, Selector};
use serde::Deserialize;
use std::collections::BTreeMap;
use url::Url;

/// Extracted information from an HTML page
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    /// Text of the first `<title>` element, trimmed
    pub title: Option<String>,

    /// Absolute http(s) links found on the page
    pub links: Vec<String>,
}

/// Parses HTML content and extracts the title and followable links
///
/// # Link Extraction Rules
///
/// **Include:** `<a href>` and `<area href>` anywhere in the document.
///
/// **Exclude:** `download` anchors, fragment-only links, and the
/// `javascript:`, `mailto:`, `tel:` and `data:` schemes.
///
/// # Example
///
/// ```
/// use a11y_sweep::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Dashboard</title></head><body><a href="/courses">Courses</a></body></html>"#;
/// let base_url = Url::parse("http://localhost:8000/dashboard").unwrap();
/// let parsed = parse_html(html, &base_url);
/// assert_eq!(parsed.title.as_deref(), Some("Dashboard"));
/// assert_eq!(parsed.links, vec!["http://localhost:8000/courses".to_string()]);
/// ```
pub fn parse_html(html: &str, base_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);

    ParsedPage {
        title: title_of(&document),
        links: extract_links(&document, base_url),
    }
}

/// Returns the title a page declares, if any
pub fn extract_title(html: &str) -> Option<String> {
    title_of(&Html::parse_document(html))
}

fn title_of(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    let mut links = Vec::new();

    if let Ok(selector) = Selector::parse("a[href], area[href]") {
        for element in document.select(&selector) {
            if element.value().attr("download").is_some() {
                continue;
            }

            if let Some(href) = element.value().attr("href") {
                if let Some(absolute_url) = resolve_link(href, base_url) {
                    links.push(absolute_url);
                }
            }
        }
    }

    links
}

/// Resolves an href against the page URL
///
/// Returns `None` for special schemes, fragment-only links, and anything
/// that does not resolve to http(s).
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;
    if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" {
        Some(absolute_url.to_string())
    } else {
        None
    }
}

#[derive(Debug, Deserialize)]
struct BlocksPayload {
    #[serde(default)]
    blocks: BTreeMap<String, Block>,
}

#[derive(Debug, Deserialize)]
struct Block {
    lms_web_url: Option<String>,
    student_view_url: Option<String>,
}

/// Lists the unit URLs of a course-blocks API response
///
/// Every block contributes its `lms_web_url` and `student_view_url`.
/// A body that is not a blocks payload yields nothing.
pub fn course_block_urls(body: &str, base_url: &Url) -> Vec<String> {
    let Ok(payload) = serde_json::from_str::<BlocksPayload>(body) else {
        return Vec::new();
    };

    payload
        .blocks
        .values()
        .flat_map(|block| [&block.lms_web_url, &block.student_view_url])
        .flatten()
        .filter_map(|href| resolve_link(href, base_url))
        .collect()
}
