//! HTML link discovery
//!
//! This module turns a fetched HTML page into:
//! - Page links to feed back into the scheduler
//! - Document links to claim and harvest
//!
//! Discovery is pure: no I/O, no scheduler access.

use crate::crawler::doctype::{DocumentRules, LinkKind};
use crate::url::normalize_parsed;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Links found on one page, split by what they point at
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovered {
    /// Links to crawl further (normalized, absolute, in document order)
    pub pages: Vec<Url>,

    /// Links to harvest as documents
    pub documents: Vec<Url>,
}

impl Discovered {
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty() && self.documents.is_empty()
    }
}

/// Parses HTML and splits its links into pages and documents
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` and `<area href="...">`
///
/// **Exclude:**
/// - `javascript:`, `mailto:`, `tel:`, `data:` links
/// - Fragment-only links (same page anchors)
/// - Anything that is not http(s) after resolution
/// - Images and excluded extensions
///
/// A link appearing several times on the page is reported once, at its
/// first position.
///
/// # Arguments
///
/// * `page_url` - Final URL of the page, used to resolve relative links
/// * `html` - Raw page body; invalid UTF-8 is replaced, broken markup is
///   recovered by the HTML5 parser
/// * `rules` - Include/exclude extension rules
///
/// # Example
///
/// ```
/// use docscoop::crawler::{discover, DocumentRules};
/// use url::Url;
///
/// let html = br#"<a href="/about">About</a><a href="files/q3.pdf">Q3</a>"#;
/// let base = Url::parse("https://example.com/reports/").unwrap();
/// let found = discover(&base, html, &DocumentRules::default());
///
/// assert_eq!(found.pages[0].as_str(), "https://example.com/about");
/// assert_eq!(found.documents[0].as_str(), "https://example.com/reports/files/q3.pdf");
/// ```
pub fn discover(page_url: &Url, html: &[u8], rules: &DocumentRules) -> Discovered {
    let text = String::from_utf8_lossy(html);
    let document = Html::parse_document(&text);

    // <base href> overrides the page URL for resolution
    let base = base_href(&document, page_url).unwrap_or_else(|| page_url.clone());

    let mut discovered = Discovered::default();
    let mut seen = HashSet::new();

    let Ok(selector) = Selector::parse("a[href], area[href]") else {
        return discovered;
    };

    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(url) = resolve_link(href, &base) else {
            continue;
        };
        if !seen.insert(url.as_str().to_string()) {
            continue;
        }

        match rules.link_kind(&url) {
            LinkKind::Document(_) => discovered.documents.push(url),
            LinkKind::Page => discovered.pages.push(url),
            LinkKind::Ignored => {
                tracing::trace!("Ignoring link {}", url);
            }
        }
    }

    discovered
}

fn base_href(document: &Html, page_url: &Url) -> Option<Url> {
    let selector = Selector::parse("base[href]").ok()?;
    let href = document.select(&selector).next()?.value().attr("href")?;
    page_url.join(href.trim()).ok()
}

/// Resolves a link href to a normalized absolute URL
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only and empty hrefs
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    normalize_parsed(absolute).ok()
}
