// src/crawl/link.rs
// =============================================================================
// A Link is one unit of crawl work: an address plus where it came from.
//
// Links are created for the seed (depth 0, no referrer) and by fetch
// workers for every anchor they extract (depth + 1, referrer = page).
// Once a link is on a queue nobody mutates it; the frontier takes it by
// value, normalizes it, and forwards the normalized copy.
// =============================================================================

use std::fmt;
use url::{ParseError, Url};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub url: Url,
    pub depth: usize,
    pub referrer: String,
}

impl Link {
    // The depth-0 link the crawl starts from
    pub fn seed(url: Url) -> Self {
        Link {
            url,
            depth: 0,
            referrer: String::new(),
        }
    }

    // A link discovered on `parent`'s page, one level deeper
    pub fn child(parent: &Link, mut url: Url) -> Self {
        url.set_fragment(None);
        Link {
            url,
            depth: parent.depth + 1,
            referrer: parent.url.to_string(),
        }
    }

    // Parses a seed address, defaulting to http:// when no scheme is given
    //
    // "example.com/start" is not an absolute URL, so the url crate refuses
    // it; we retry once with the insecure scheme in front.
    pub fn parse_seed(raw: &str) -> Option<Url> {
        let raw = raw.trim();
        match Url::parse(raw) {
            Ok(url) => Some(url),
            Err(ParseError::RelativeUrlWithoutBase) => Url::parse(&format!("http://{raw}")).ok(),
            Err(_) => None,
        }
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

// `example.com` for default ports, `example.com:8080` otherwise
pub fn host_key(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}
