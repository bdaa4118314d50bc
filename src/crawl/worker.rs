// src/crawl/worker.rs
// =============================================================================
// A fetch worker runs exactly one fetch-and-extract cycle, then reports.
//
// How one cycle goes:
// 1. Wait for a link on the work queue (or give up if the backlog drains)
// 2. Borrow a client from the pool
// 3. GET the page; transport errors are logged and end the cycle
// 4. Skip non-HTML content types and empty bodies
// 5. Below the depth ceiling, extract hrefs and submit child links to the
//    frontier input
// 6. Check the required-content patterns
// 7. Send one completion signal to the scheduler, whatever happened
//
// Nothing here is retried. A failed page is simply a page we did not get.
// =============================================================================

use reqwest::header::CONTENT_TYPE;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use super::gauge::BacklogGauge;
use super::link::Link;
use crate::checker::{check_required_content, resolve_href, LinkExtractor};
use crate::policy::Policy;
use crate::transport::{ClientPool, FetchError};

// What one worker cycle ended with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// HTML page fetched and processed
    Fetched {
        /// Child links submitted to the frontier
        links: usize,
        /// At least one required pattern was missing
        flagged: bool,
    },
    /// Response was not HTML, or had an empty body
    Skipped,
    /// Transport error; the page was abandoned
    Failed,
    /// No work arrived before the backlog drained
    Idle,
}

// Everything a worker needs, shared by all workers of one crawl
pub struct WorkerContext {
    pub policy: Arc<Policy>,
    pub pool: Arc<ClientPool>,
    pub extractor: Arc<dyn LinkExtractor>,
    pub gauge: Arc<BacklogGauge>,
    pub frontier_tx: mpsc::Sender<Link>,
    pub work_rx: Mutex<mpsc::Receiver<Link>>,
    pub max_depth: usize,
}

// One worker task: take a link, process it, signal completion exactly once
pub async fn run_worker(ctx: Arc<WorkerContext>, done: mpsc::UnboundedSender<Outcome>) {
    let outcome = match next_link(&ctx).await {
        Some(link) => spider_page(&ctx, &link).await,
        None => Outcome::Idle,
    };

    // The scheduler only goes away after it stopped listening
    let _ = done.send(outcome);
}

// Waits for a work item, or returns None once nothing is left to wait for
async fn next_link(ctx: &WorkerContext) -> Option<Link> {
    loop {
        // Created before the drained check so no decision slips between them
        let decided = ctx.gauge.decided();
        let mut work = ctx.work_rx.lock().await;

        if let Ok(link) = work.try_recv() {
            ctx.gauge.work_taken();
            return Some(link);
        }
        if ctx.gauge.is_drained() {
            return None;
        }

        tokio::select! {
            link = work.recv() => {
                let link = link?;
                ctx.gauge.work_taken();
                return Some(link);
            }
            _ = decided => {}
        }
    }
}

// Fetches one page and does everything that follows from it
pub async fn spider_page(ctx: &WorkerContext, link: &Link) -> Outcome {
    // Released back to the pool when `client` goes out of scope
    let client = match ctx.pool.acquire() {
        Ok(client) => client,
        Err(err) => {
            warn!(url = %link.url, kind = err.kind(), "ERROR: {}: {}", link.url, err);
            return Outcome::Failed;
        }
    };

    let started = Instant::now();
    let response = match client.get(link.url.clone()).send().await {
        Ok(response) => response,
        Err(err) => {
            let err = FetchError::from_request(err);
            warn!(url = %link.url, kind = err.kind(), "ERROR: {}: {}", link.url, err);
            return Outcome::Failed;
        }
    };

    let status = response.status();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned());
    if let Some(content_type) = &content_type {
        if !content_type.starts_with("text/html") {
            debug!(url = %link.url, content_type = %content_type, "not html, skipping");
            return Outcome::Skipped;
        }
    }

    let body = match response.bytes().await {
        Ok(body) => body,
        Err(err) => {
            let err = FetchError::from_body(err);
            warn!(url = %link.url, kind = err.kind(), "ERROR: {}: {}", link.url, err);
            return Outcome::Failed;
        }
    };
    if body.is_empty() {
        return Outcome::Skipped;
    }

    debug!(
        "[{}, {}, {:.6}] {}",
        status.as_u16(),
        content_type.as_deref().unwrap_or(""),
        started.elapsed().as_secs_f64(),
        link.url
    );

    let links = if link.depth < ctx.max_depth {
        submit_links(ctx, link, &body).await
    } else {
        0
    };

    let flagged = check_required_content(&link.url, &body, &ctx.policy.required_content_patterns);

    Outcome::Fetched { links, flagged }
}

// Extracts hrefs from `body` and feeds them to the frontier input
async fn submit_links(ctx: &WorkerContext, page: &Link, body: &[u8]) -> usize {
    let mut submitted = 0;

    for href in ctx.extractor.extract(body) {
        let url = match resolve_href(&page.url, &href) {
            Ok(Some(url)) => url,
            Ok(None) => continue,
            Err(err) => {
                warn!(page = %page.url, "PARSE ERROR: {}: {}", href, err);
                continue;
            }
        };

        ctx.gauge.link_submitted();
        if ctx.frontier_tx.send(Link::child(page, url)).await.is_err() {
            // Frontier has stopped; the crawl is over
            ctx.gauge.link_dropped();
            break;
        }
        submitted += 1;
    }

    submitted
}
