// src/checker/extract.rs
// =============================================================================
// This module pulls candidate links out of a fetched page body.
//
// Two strategies implement the LinkExtractor trait:
// - AnchorPattern: one fixed regex, `<a ... href="...">`, run straight over
//   the raw bytes. Case-sensitive, double quotes only. This is the default.
// - HtmlAnchors: parses the body with `scraper` (html5ever) and selects
//   every `a[href]`, so single quotes, upper-case tags and entities work.
//
// Both stop after MAX_LINKS_PER_PAGE candidates, so a pathological page
// cannot make one worker allocate without bound.
//
// resolve_href() then turns a candidate into an absolute address using the
// page it was found on.
// =============================================================================

use regex::bytes::{Regex, RegexBuilder};
use scraper::{Html, Selector};
use std::sync::{Arc, OnceLock};
use url::{ParseError, Url};

// Candidates kept per page
pub const MAX_LINKS_PER_PAGE: usize = 1000;

const ANCHOR_PATTERN: &str = r#"<a [^>]*href="([^"]+)"[^>]*>"#;

// Produces candidate href strings from a body buffer
pub trait LinkExtractor: Send + Sync {
    fn extract(&self, body: &[u8]) -> Vec<String>;
}

// Which extractor the crawl uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtractorKind {
    #[default]
    Pattern,
    Html,
}

pub fn extractor_for(kind: ExtractorKind) -> Arc<dyn LinkExtractor> {
    match kind {
        ExtractorKind::Pattern => Arc::new(AnchorPattern),
        ExtractorKind::Html => Arc::new(HtmlAnchors),
    }
}

// The fixed `<a ... href="...">` pattern
#[derive(Debug, Default, Clone, Copy)]
pub struct AnchorPattern;

impl LinkExtractor for AnchorPattern {
    fn extract(&self, body: &[u8]) -> Vec<String> {
        anchor_regex()
            .captures_iter(body)
            .take(MAX_LINKS_PER_PAGE)
            .filter_map(|captures| captures.get(1))
            .map(|href| String::from_utf8_lossy(href.as_bytes()).into_owned())
            .collect()
    }
}

fn anchor_regex() -> &'static Regex {
    static ANCHOR: OnceLock<Regex> = OnceLock::new();
    // The pattern is a constant and known to be valid. Unicode mode is off so
    // the classes match any byte, not only valid UTF-8.
    ANCHOR.get_or_init(|| {
        RegexBuilder::new(ANCHOR_PATTERN)
            .unicode(false)
            .build()
            .expect("anchor pattern compiles")
    })
}

// HTML-aware extraction through scraper
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlAnchors;

impl LinkExtractor for HtmlAnchors {
    fn extract(&self, body: &[u8]) -> Vec<String> {
        let html = String::from_utf8_lossy(body);
        let document = Html::parse_document(&html);

        document
            .select(anchor_selector())
            .filter_map(|element| element.value().attr("href"))
            .take(MAX_LINKS_PER_PAGE)
            .map(str::to_string)
            .collect()
    }
}

fn anchor_selector() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    // "a[href]" is constant and known to be valid
    SELECTOR.get_or_init(|| Selector::parse("a[href]").expect("anchor selector parses"))
}

// Resolves an href found on `page` into an absolute address
//
// Returns:
//   Ok(None)      - fragment-only reference ("#top", "#"), nothing to fetch
//   Ok(Some(url)) - absolute address with the fragment cleared
//   Err(_)        - the href is not a usable URL
//
// Scheme, host and path are inherited from the page whenever the href
// leaves them out:
//   page = "http://example.com/docs/a"
//   href = "b"            -> "http://example.com/docs/b"
//   href = "?page=2"      -> "http://example.com/docs/a?page=2"
//   href = "//cdn.com/x"  -> "http://cdn.com/x"
pub fn resolve_href(page: &Url, href: &str) -> Result<Option<Url>, ParseError> {
    let target = href.split('#').next().unwrap_or_default();
    if target.trim().is_empty() {
        return Ok(None);
    }

    let mut url = page.join(href)?;
    url.set_fragment(None);
    Ok(Some(url))
}
