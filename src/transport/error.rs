// src/transport/error.rs
// =============================================================================
// Fetch failures, sorted into the classes the crawler reports.
//
// reqwest errors can happen for many reasons:
// - Network timeout
// - DNS resolution failure
// - TLS certificate issues
// - Too many redirects
// - The body stream breaking half way
//
// None of these stop the crawl. The worker logs the class and the address,
// then moves on; nothing is retried.
// =============================================================================

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    /// The request (or the per-fetch timeout) expired
    #[error("request timed out")]
    Timeout(#[source] reqwest::Error),
    /// Hostname did not resolve
    #[error("could not resolve hostname")]
    Dns(#[source] reqwest::Error),
    /// TCP connect failed for another reason
    #[error("connection failed")]
    Connect(#[source] reqwest::Error),
    /// Certificate or handshake problem
    #[error("TLS error")]
    Tls(#[source] reqwest::Error),
    /// Redirect loop or redirect limit hit
    #[error("too many redirects")]
    TooManyRedirects(#[source] reqwest::Error),
    /// Headers arrived but the body could not be read
    #[error("failed to read body: {0}")]
    Body(#[source] reqwest::Error),
    /// The pool could not construct a new client
    #[error("could not build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    /// Anything else reqwest reports
    #[error("{0}")]
    Other(#[source] reqwest::Error),
}

impl FetchError {
    // Sorts a send() error into one of the classes above
    pub fn from_request(error: reqwest::Error) -> Self {
        // Convert error to string once, the DNS and TLS checks only have text
        let text = error.to_string().to_lowercase();

        if error.is_timeout() {
            FetchError::Timeout(error)
        } else if error.is_redirect() {
            FetchError::TooManyRedirects(error)
        } else if error.is_connect() {
            if text.contains("dns") {
                FetchError::Dns(error)
            } else {
                FetchError::Connect(error)
            }
        } else if text.contains("certificate") || text.contains("tls") || text.contains("ssl") {
            FetchError::Tls(error)
        } else {
            FetchError::Other(error)
        }
    }

    // Body read errors keep the timeout class, everything else is Body
    pub fn from_body(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            FetchError::Timeout(error)
        } else {
            FetchError::Body(error)
        }
    }

    // Short label for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Timeout(_) => "timeout",
            FetchError::Dns(_) => "dns",
            FetchError::Connect(_) => "connect",
            FetchError::Tls(_) => "tls",
            FetchError::TooManyRedirects(_) => "redirect",
            FetchError::Body(_) => "body",
            FetchError::ClientBuild(_) => "client",
            FetchError::Other(_) => "other",
        }
    }
}
