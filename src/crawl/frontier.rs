// src/crawl/frontier.rs
// =============================================================================
// The frontier decides whether a discovered link is ever fetched.
//
// Every raw link (the seed, and everything workers extract) flows through
// `Frontier::accept`, which applies the policy in a fixed order:
//
//   depth ceiling -> secure scheme -> scheme check -> domain rewrite
//   -> allow-list -> &amp; fix-up -> default documents -> query strip/sort
//   -> reject patterns -> visited set
//
// The first rule that drops a link ends processing for that link.
// Survivors are rendered to a canonical string, remembered in the visited
// set, and forwarded to the work queue.
//
// Ownership:
// - The visited set and the dropped-domain set live inside `Frontier`
// - `Frontier::run` moves the frontier into one task, so exactly one
//   logical thread ever touches them; no locks needed
// - When the task stops it hands the frontier back, which is how the
//   scheduler reads the dropped domains after the crawl
// =============================================================================

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};
use url::{form_urlencoded, Url};

use super::gauge::BacklogGauge;
use super::link::{host_key, Link};
use crate::policy::Policy;

// Why a link did not make it to the work queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Deeper than the configured maximum depth
    TooDeep,
    /// https link while the policy drops the secure scheme
    SecureScheme,
    /// Anything that is not http or https (mailto:, javascript:, ...)
    UnsupportedScheme,
    /// Host missing from the allow-list, or mapped to false
    DomainNotAllowed,
    /// Canonical string matched a reject pattern
    Rejected,
    /// Canonical string was already forwarded once
    AlreadySeen,
}

// Outcome of running one link through the frontier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Forward(Link),
    Drop(DropReason),
}

pub struct Frontier {
    policy: Arc<Policy>,
    max_depth: usize,
    visited: HashSet<String>,
    dropped_domains: BTreeSet<String>,
}

impl Frontier {
    pub fn new(policy: Arc<Policy>, max_depth: usize) -> Self {
        Frontier {
            policy,
            max_depth,
            visited: HashSet::with_capacity(10_000),
            dropped_domains: BTreeSet::new(),
        }
    }

    // Applies the policy to one raw link
    pub fn accept(&mut self, link: Link) -> Decision {
        if link.depth > self.max_depth {
            return Decision::Drop(DropReason::TooDeep);
        }

        let Link {
            mut url,
            depth,
            referrer,
        } = link;

        if self.policy.drop_secure_scheme && url.scheme() == "https" {
            return Decision::Drop(DropReason::SecureScheme);
        }
        if url.scheme() != "http" && url.scheme() != "https" {
            return Decision::Drop(DropReason::UnsupportedScheme);
        }

        let mut host = host_key(&url);
        if let Some(replacement) = self.policy.rewrite_for(&host) {
            let replacement = replacement.to_string();
            if rewrite_host(&mut url, &replacement).is_none() {
                self.dropped_domains.insert(replacement);
                return Decision::Drop(DropReason::DomainNotAllowed);
            }
            host = host_key(&url);
        }

        if !self.policy.is_domain_allowed(&host) {
            self.dropped_domains.insert(host);
            return Decision::Drop(DropReason::DomainNotAllowed);
        }

        if let Some(query) = url.query() {
            if query.contains("&amp;") {
                let unescaped = query.replace("&amp;", "&");
                url.set_query(Some(&unescaped));
            }
        }

        if self.policy.is_default_document(url.path()) {
            url.set_path("/");
        }

        canonicalize_query(&mut url, &self.policy.dropped_query_params);
        url.set_fragment(None);

        let canonical = url.to_string();
        if self.policy.is_rejected(&canonical) {
            return Decision::Drop(DropReason::Rejected);
        }

        if !self.visited.insert(canonical) {
            return Decision::Drop(DropReason::AlreadySeen);
        }

        Decision::Forward(Link {
            url,
            depth,
            referrer,
        })
    }

    // Hosts that failed the allow-list, sorted
    pub fn dropped_domains(&self) -> Vec<String> {
        self.dropped_domains.iter().cloned().collect()
    }

    pub fn visited_len(&self) -> usize {
        self.visited.len()
    }

    // Drains the input queue until shutdown or until every producer is gone
    //
    // Returns the frontier so the caller can read the end-of-run state.
    pub async fn run(
        mut self,
        mut input: mpsc::Receiver<Link>,
        work: mpsc::Sender<Link>,
        gauge: Arc<BacklogGauge>,
        mut shutdown: oneshot::Receiver<()>,
    ) -> Self {
        loop {
            let link = tokio::select! {
                biased;
                _ = &mut shutdown => break,
                link = input.recv() => match link {
                    Some(link) => link,
                    None => break,
                },
            };

            let raw = link.url.to_string();
            match self.accept(link) {
                Decision::Forward(link) => {
                    trace!(url = %link.url, depth = link.depth, "new link");
                    gauge.link_forwarded();
                    tokio::select! {
                        biased;
                        _ = &mut shutdown => break,
                        sent = work.send(link) => {
                            if sent.is_err() {
                                break;
                            }
                        }
                    }
                }
                Decision::Drop(reason) => {
                    trace!(url = %raw, ?reason, "dropped link");
                    gauge.link_dropped();
                }
            }
        }

        debug!(
            visited = self.visited_len(),
            ignored_domains = self.dropped_domains.len(),
            "frontier stopped"
        );
        self
    }
}

// Replaces the host (and port) of `url` with a `host[:port]` string
fn rewrite_host(url: &mut Url, replacement: &str) -> Option<()> {
    let parsed = Url::parse(&format!("{}://{}", url.scheme(), replacement)).ok()?;
    let host = parsed.host_str()?;
    url.set_host(Some(host)).ok()?;
    url.set_port(parsed.port()).ok()?;
    Some(())
}

// Strips dropped parameters and re-encodes the query sorted by key
//
// The sort is stable, so repeated keys keep their relative order.
fn canonicalize_query(url: &mut Url, dropped: &[String]) {
    if url.query().is_none() {
        return;
    }

    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !dropped.iter().any(|name| name.as_str() == &**key))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    if pairs.is_empty() {
        url.set_query(None);
    } else {
        let encoded = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&pairs)
            .finish();
        url.set_query(Some(&encoded));
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why does run() take `mut self` and return Self?
//    - Moving the frontier into the task means no other code can reach the
//      visited set while the crawl runs
//    - Returning it when the loop ends gives the state back to the caller
//
// 2. What does `biased;` do in tokio::select!?
//    - Branches are polled top to bottom instead of in random order
//    - A pending shutdown always wins over more input
//
// 3. Why HashSet::insert for the visited check?
//    - insert() returns false when the value was already present
//    - One call both tests and records membership
// -----------------------------------------------------------------------------
