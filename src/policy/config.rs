// src/policy/config.rs
// =============================================================================
// Loads the policy document and compiles it into an immutable Policy.
//
// The document is JSON with the key names the crawler has always used
// (StartUrl, DropHttps, AllowedDomains, ...). Loading does all the fallible
// work up front:
// - reading and decoding the file
// - compiling every reject pattern and required-content pattern
// - parsing the start address
//
// Once a Policy exists the crawl core never sees a malformed regex or URL.
// =============================================================================

use regex::bytes::{Regex as BytesRegex, RegexBuilder as BytesRegexBuilder};
use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::crawl::Link;

// Default documents collapsed to "/" when no list is configured
const DEFAULT_DOCUMENTS: &[&str] = &["index.php"];

// Everything that can go wrong before the crawl starts
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The policy file could not be read
    #[error("failed to open config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not a valid policy document
    #[error("failed to decode policy document: {0}")]
    Decode(#[from] serde_json::Error),

    /// One of the FilteredUrls entries is not a valid regex
    #[error("invalid reject pattern '{pattern}': {source}")]
    RejectPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// One of the RequiredPatterns entries is not a valid regex
    #[error("invalid required pattern '{label}' ({pattern}): {source}")]
    RequiredPattern {
        label: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// StartUrl could not be parsed, even with a default scheme
    #[error("couldn't parse URL {0}")]
    StartAddress(String),
}

// The policy document exactly as it appears on disk
//
// Only StartUrl is mandatory; everything else defaults to "empty".
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PolicyDocument {
    pub start_url: String,
    pub drop_https: bool,
    pub allowed_domains: HashMap<String, bool>,
    pub rewrite_domains: HashMap<String, String>,
    pub filtered_urls: Vec<String>,
    pub dropped_parameters: Vec<String>,
    pub required_patterns: BTreeMap<String, String>,
    pub default_documents: Option<Vec<String>>,
}

impl PolicyDocument {
    // Compiles the document into a Policy, failing on the first bad entry
    pub fn compile(self) -> Result<Policy, PolicyError> {
        let start_address = Link::parse_seed(&self.start_url)
            .ok_or_else(|| PolicyError::StartAddress(self.start_url.clone()))?;

        let reject_patterns = self
            .filtered_urls
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| PolicyError::RejectPattern {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut required_content_patterns = BTreeMap::new();
        for (label, pattern) in &self.required_patterns {
            // Byte semantics: `.` and classes match any byte, so pages in a
            // legacy encoding are checked the same way as UTF-8 ones
            let compiled = BytesRegexBuilder::new(pattern)
                .unicode(false)
                .build()
                .map_err(|source| PolicyError::RequiredPattern {
                    label: label.clone(),
                    pattern: pattern.clone(),
                    source,
                })?;
            required_content_patterns.insert(label.clone(), compiled);
        }

        let default_documents = self
            .default_documents
            .unwrap_or_else(|| DEFAULT_DOCUMENTS.iter().map(|doc| doc.to_string()).collect());

        Ok(Policy {
            start_address,
            drop_secure_scheme: self.drop_https,
            allowed_domains: self.allowed_domains,
            domain_rewrite: self.rewrite_domains,
            reject_patterns,
            dropped_query_params: self.dropped_parameters,
            required_content_patterns,
            default_documents,
        })
    }
}

// The compiled, immutable crawl policy
#[derive(Debug, Clone)]
pub struct Policy {
    pub start_address: Url,
    pub drop_secure_scheme: bool,
    pub allowed_domains: HashMap<String, bool>,
    pub domain_rewrite: HashMap<String, String>,
    pub reject_patterns: Vec<Regex>,
    pub dropped_query_params: Vec<String>,
    pub required_content_patterns: BTreeMap<String, BytesRegex>,
    pub default_documents: Vec<String>,
}

impl Policy {
    // Reads, decodes and compiles a policy file
    pub fn load(path: &Path) -> Result<Self, PolicyError> {
        let raw = fs::read_to_string(path).map_err(|source| PolicyError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    // Decodes and compiles a policy from a JSON string
    pub fn from_json(raw: &str) -> Result<Self, PolicyError> {
        let document: PolicyDocument = serde_json::from_str(raw)?;
        document.compile()
    }

    // Looks up a host key in the allow-list (absent and false both mean "no")
    pub fn is_domain_allowed(&self, host: &str) -> bool {
        self.allowed_domains.get(host).copied().unwrap_or(false)
    }

    // Returns the replacement host for a rewritten domain, if any
    pub fn rewrite_for(&self, host: &str) -> Option<&str> {
        self.domain_rewrite.get(host).map(String::as_str)
    }

    // True when the rendered link matches any reject pattern
    pub fn is_rejected(&self, rendered: &str) -> bool {
        self.reject_patterns
            .iter()
            .any(|pattern| pattern.is_match(rendered))
    }

    // True when the path is one of the default-document aliases of "/"
    pub fn is_default_document(&self, path: &str) -> bool {
        let trimmed = path.strip_prefix('/').unwrap_or(path);
        self.default_documents.iter().any(|doc| doc == trimmed)
    }
}
