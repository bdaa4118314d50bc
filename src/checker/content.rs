// src/checker/content.rs
// =============================================================================
// Required-content validation.
//
// Every fetched page is matched against every labelled pattern in the
// policy. Labels whose pattern does not match are collected, and a page
// with at least one failure gets a single FAIL line naming all of them.
// Nothing is remembered between pages.
// =============================================================================

use regex::bytes::Regex;
use std::collections::BTreeMap;
use tracing::warn;
use url::Url;

// Labels whose pattern does not match `body`, in label order
pub fn failed_labels<'a>(body: &[u8], patterns: &'a BTreeMap<String, Regex>) -> Vec<&'a str> {
    patterns
        .iter()
        .filter(|(_, pattern)| !pattern.is_match(body))
        .map(|(label, _)| label.as_str())
        .collect()
}

// Validates one page, logging a FAIL line when something is missing
//
// Returns true when the page was flagged.
pub fn check_required_content(url: &Url, body: &[u8], patterns: &BTreeMap<String, Regex>) -> bool {
    let failed = failed_labels(body, patterns);
    if failed.is_empty() {
        return false;
    }

    warn!(url = %url, labels = ?failed, "FAIL {} {}", url, failed.join(" "));
    true
}
