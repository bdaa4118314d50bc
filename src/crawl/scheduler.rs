// src/crawl/scheduler.rs
// =============================================================================
// The scheduler bootstraps a crawl, sizes the worker pool to the backlog,
// and notices (exactly once) when there is nothing left to do.
//
// Control loop, reacting to three kinds of events:
// - a worker completed:  active -= 1, then either terminate (backlog and
//                        active both zero) or spawn
//                        min(backlog, ceiling - active) new workers
// - the stats timer:     log a queue/worker snapshot if stats are enabled
// - a stop request:      leave the loop at once; in-flight workers are
//                        abandoned, not awaited
//
// States: Idle -> Seeding -> Running -> Draining -> Terminated
// Workers are only ever spawned from this loop, and the loop is the only
// place that changes the active-worker count.
// =============================================================================

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, error, info};

use super::frontier::Frontier;
use super::gauge::BacklogGauge;
use super::link::Link;
use super::worker::{run_worker, Outcome, WorkerContext};
use crate::checker::{extractor_for, ExtractorKind};
use crate::policy::Policy;
use crate::report::CrawlReport;
use crate::transport::ClientPool;

// How often live stats are printed
pub const STATS_INTERVAL: Duration = Duration::from_secs(1);

// Capacity of the frontier input and the work queue; producers wait when full
pub const QUEUE_CAPACITY: usize = 100_000;

// The command-line knobs the crawl honours
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlSettings {
    pub max_workers: usize,
    pub max_depth: usize,
    pub show_stats: bool,
    pub extractor: ExtractorKind,
    pub timeout: Option<Duration>,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        CrawlSettings {
            max_workers: 1,
            max_depth: 2,
            show_stats: false,
            extractor: ExtractorKind::Pattern,
            timeout: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlState {
    Idle,
    Seeding,
    Running,
    Draining,
    Terminated,
}

// Workers to start after a completion
//
// Never more than the backlog can feed, never past the ceiling.
pub fn spawn_count(backlog: usize, active: usize, ceiling: usize) -> usize {
    backlog.min(ceiling.saturating_sub(active))
}

pub struct Scheduler {
    policy: Arc<Policy>,
    settings: CrawlSettings,
    state: CrawlState,
    active: usize,
    report: CrawlReport,
}

impl Scheduler {
    pub fn new(policy: Arc<Policy>, settings: CrawlSettings) -> Self {
        Scheduler {
            policy,
            settings,
            state: CrawlState::Idle,
            active: 0,
            report: CrawlReport::default(),
        }
    }

    pub fn state(&self) -> CrawlState {
        self.state
    }

    // Runs the crawl to completion, or until `stop` resolves
    pub async fn run<F>(mut self, stop: F) -> CrawlReport
    where
        F: Future<Output = ()>,
    {
        let started = Instant::now();
        let ceiling = self.settings.max_workers.max(1);
        self.transition(CrawlState::Seeding);

        let (input_tx, input_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (work_tx, work_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let (frontier_stop_tx, frontier_stop_rx) = oneshot::channel();
        let gauge = Arc::new(BacklogGauge::new());

        let ctx = Arc::new(WorkerContext {
            policy: Arc::clone(&self.policy),
            pool: Arc::new(ClientPool::new(self.settings.timeout)),
            extractor: extractor_for(self.settings.extractor),
            gauge: Arc::clone(&gauge),
            frontier_tx: input_tx,
            work_rx: Mutex::new(work_rx),
            max_depth: self.settings.max_depth,
        });

        gauge.link_submitted();
        let seed = Link::seed(self.policy.start_address.clone());
        if ctx.frontier_tx.send(seed).await.is_err() {
            gauge.link_dropped();
        }

        let frontier = Frontier::new(Arc::clone(&self.policy), self.settings.max_depth);
        let frontier = tokio::spawn(frontier.run(
            input_rx,
            work_tx,
            Arc::clone(&gauge),
            frontier_stop_rx,
        ));
        self.spawn_worker(&ctx, &done_tx);
        self.transition(CrawlState::Running);

        let mut stats = tokio::time::interval_at(
            tokio::time::Instant::now() + STATS_INTERVAL,
            STATS_INTERVAL,
        );
        tokio::pin!(stop);

        let cancelled = loop {
            tokio::select! {
                Some(outcome) = done_rx.recv() => {
                    self.active -= 1;
                    self.report.record(outcome);

                    let backlog = gauge.backlog();
                    if backlog == 0 && self.active == 0 {
                        self.transition(CrawlState::Draining);
                        break false;
                    }

                    for _ in 0..spawn_count(backlog, self.active, ceiling) {
                        self.spawn_worker(&ctx, &done_tx);
                    }
                }
                _ = stats.tick() => {
                    if self.settings.show_stats {
                        info!(
                            "WORK QUEUE: {}/{} [{} workers, {} done]",
                            gauge.work_len(),
                            gauge.frontier_len(),
                            self.active,
                            self.report.completed()
                        );
                    }
                }
                _ = &mut stop => {
                    info!(active = self.active, "stop requested, abandoning in-flight fetches");
                    break true;
                }
            }
        };

        let _ = frontier_stop_tx.send(());
        let dropped_domains = match frontier.await {
            Ok(frontier) => frontier.dropped_domains(),
            Err(err) => {
                error!("frontier task failed: {}", err);
                Vec::new()
            }
        };

        self.transition(CrawlState::Terminated);
        debug!(
            clients = ctx.pool.created(),
            idle_clients = ctx.pool.idle_len(),
            "client pool at exit"
        );

        let mut report = self.report;
        report.dropped_domains = dropped_domains;
        report.cancelled = cancelled;
        report.elapsed_secs = started.elapsed().as_secs_f64();
        report
    }

    fn spawn_worker(&mut self, ctx: &Arc<WorkerContext>, done: &mpsc::UnboundedSender<Outcome>) {
        self.active += 1;
        self.report.peak_workers = self.report.peak_workers.max(self.active);
        tokio::spawn(run_worker(Arc::clone(ctx), done.clone()));
    }

    // Terminated is absorbing
    fn transition(&mut self, next: CrawlState) {
        if self.state() == CrawlState::Terminated {
            return;
        }
        debug!(from = ?self.state, to = ?next, "crawl state");
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn host_of(server: &MockServer) -> String {
        let addr: &SocketAddr = server.address();
        addr.to_string()
    }

    // A policy whose seed is the mock server's root and whose allow-list
    // holds the mock server's host:port
    fn policy_for(server: &MockServer, extra: &str) -> Arc<Policy> {
        let json = format!(
            r#"{{"StartUrl": "{}/", "AllowedDomains": {{"{}": true}}{}}}"#,
            server.uri(),
            host_of(server),
            extra
        );
        Arc::new(Policy::from_json(&json).unwrap())
    }

    fn html(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/html")
    }

    async fn page(server: &MockServer, at: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(html(body))
            .mount(server)
            .await;
    }

    async fn crawl(policy: Arc<Policy>, settings: CrawlSettings) -> CrawlReport {
        let scheduler = Scheduler::new(policy, settings);
        tokio::time::timeout(
            Duration::from_secs(20),
            scheduler.run(std::future::pending::<()>()),
        )
        .await
        .expect("crawl terminated")
    }

    async fn requested_paths(server: &MockServer) -> Vec<String> {
        let requests: Vec<Request> = server.received_requests().await.unwrap_or_default();
        requests.iter().map(|r| r.url.path().to_string()).collect()
    }

    #[test]
    fn test_spawn_count_bounded_by_backlog() {
        assert_eq!(spawn_count(2, 0, 10), 2);
        assert_eq!(spawn_count(0, 0, 10), 0);
    }

    #[test]
    fn test_spawn_count_bounded_by_ceiling() {
        assert_eq!(spawn_count(50, 3, 4), 1);
        assert_eq!(spawn_count(50, 4, 4), 0);
        assert_eq!(spawn_count(50, 0, 4), 4);
    }

    #[test]
    fn test_new_scheduler_is_idle() {
        let policy = Arc::new(Policy::from_json(r#"{"StartUrl": "http://example.com/"}"#).unwrap());
        let scheduler = Scheduler::new(policy, CrawlSettings::default());
        assert_eq!(scheduler.state(), CrawlState::Idle);
    }

    #[tokio::test]
    async fn test_single_page_without_links_terminates_after_one_fetch() {
        let server = MockServer::start().await;
        page(&server, "/", "<html><body>nothing to see</body></html>").await;

        let report = crawl(policy_for(&server, ""), CrawlSettings::default()).await;

        assert!(!report.cancelled);
        assert_eq!(report.pages_fetched, 1);
        assert_eq!(report.links_submitted, 0);
        assert_eq!(requested_paths(&server).await, vec!["/"]);
    }

    #[tokio::test]
    async fn test_rejected_seed_terminates_without_fetching() {
        let server = MockServer::start().await;
        page(&server, "/", "<html></html>").await;
        let json = format!(r#"{{"StartUrl": "{}/"}}"#, server.uri());
        let policy = Arc::new(Policy::from_json(&json).unwrap());

        let report = crawl(policy, CrawlSettings::default()).await;

        assert_eq!(report.pages_fetched, 0);
        assert_eq!(report.idle_workers, 1);
        assert_eq!(report.dropped_domains, vec![host_of(&server)]);
        assert!(requested_paths(&server).await.is_empty());
    }

    #[tokio::test]
    async fn test_depth_ceiling_stops_extraction() {
        let server = MockServer::start().await;
        page(&server, "/", r#"<a href="/one">1</a>"#).await;
        page(&server, "/one", r#"<a href="/two">2</a>"#).await;
        page(&server, "/two", "<p>too deep</p>").await;

        let settings = CrawlSettings {
            max_depth: 1,
            ..CrawlSettings::default()
        };
        let report = crawl(policy_for(&server, ""), settings).await;

        let mut paths = requested_paths(&server).await;
        paths.sort();
        assert_eq!(paths, vec!["/", "/one"]);
        assert_eq!(report.pages_fetched, 2);
        assert_eq!(report.links_submitted, 1);
    }

    #[tokio::test]
    async fn test_duplicate_and_equivalent_links_fetched_once() {
        let server = MockServer::start().await;
        page(
            &server,
            "/",
            r##"<a href="/a?y=2&x=1">a</a>
               <a href="/a?x=1&amp;y=2">a again</a>
               <a href="/index.php">home</a>
               <a href="#top">top</a>
               <a href="/a?x=1&y=2#frag">a with fragment</a>"##,
        )
        .await;
        page(&server, "/a", r#"<a href="/">back home</a>"#).await;

        let settings = CrawlSettings {
            max_workers: 4,
            ..CrawlSettings::default()
        };
        let report = crawl(policy_for(&server, ""), settings).await;

        let mut paths = requested_paths(&server).await;
        paths.sort();
        assert_eq!(paths, vec!["/", "/a"]);
        assert_eq!(report.pages_fetched, 2);
    }

    #[tokio::test]
    async fn test_malformed_href_does_not_stop_extraction() {
        let server = MockServer::start().await;
        page(
            &server,
            "/",
            r#"<a href="http://[::1">broken</a><a href="/next">next</a>"#,
        )
        .await;
        page(&server, "/next", "<p>still reached</p>").await;

        let report = crawl(policy_for(&server, ""), CrawlSettings::default()).await;

        let mut paths = requested_paths(&server).await;
        paths.sort();
        assert_eq!(paths, vec!["/", "/next"]);
        assert_eq!(report.pages_fetched, 2);
        assert_eq!(report.links_submitted, 1);
    }

    #[tokio::test]
    async fn test_secure_links_dropped_before_fetch() {
        let server = MockServer::start().await;
        let secure = format!("https://{}/secure", host_of(&server));
        page(&server, "/", &format!(r#"<a href="{}">s</a>"#, secure)).await;

        let report = crawl(
            policy_for(&server, r#", "DropHttps": true"#),
            CrawlSettings::default(),
        )
        .await;

        assert_eq!(report.pages_fetched, 1);
        assert_eq!(report.fetch_errors, 0);
    }

    #[tokio::test]
    async fn test_dropped_parameters_collapse_links() {
        let server = MockServer::start().await;
        page(
            &server,
            "/",
            r#"<a href="/p?sid=1&a=1">1</a><a href="/p?a=1&sid=2">2</a>"#,
        )
        .await;
        page(&server, "/p", "<p>leaf</p>").await;

        let report = crawl(
            policy_for(&server, r#", "DroppedParameters": ["sid"]"#),
            CrawlSettings::default(),
        )
        .await;

        let requests = server.received_requests().await.unwrap_or_default();
        let leaf: Vec<_> = requests.iter().filter(|r| r.url.path() == "/p").collect();
        assert_eq!(leaf.len(), 1);
        assert_eq!(leaf[0].url.query(), Some("a=1"));
        assert_eq!(report.pages_fetched, 2);
    }

    #[tokio::test]
    async fn test_worker_ceiling_is_respected() {
        let server = MockServer::start().await;
        let links: String = (0..20)
            .map(|i| format!(r#"<a href="/page/{i}">{i}</a>"#))
            .collect();
        page(&server, "/", &links).await;
        Mock::given(method("GET"))
            .and(wiremock::matchers::path_regex("^/page/"))
            .respond_with(html("<p>leaf</p>").set_delay(Duration::from_millis(50)))
            .mount(&server)
            .await;

        let settings = CrawlSettings {
            max_workers: 3,
            ..CrawlSettings::default()
        };
        let report = crawl(policy_for(&server, ""), settings).await;

        assert_eq!(report.pages_fetched, 21);
        assert!(report.peak_workers <= 3, "peak was {}", report.peak_workers);
        assert!(report.peak_workers > 1);
    }

    #[tokio::test]
    async fn test_non_html_and_empty_bodies_are_not_parsed() {
        let server = MockServer::start().await;
        page(
            &server,
            "/",
            r#"<a href="/file.bin">bin</a><a href="/empty">empty</a>"#,
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/file.bin"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(br#"<a href="/hidden">x</a>"#.to_vec(), "application/octet-stream"),
            )
            .mount(&server)
            .await;
        page(&server, "/empty", "").await;
        page(&server, "/hidden", "<p>never</p>").await;

        let report = crawl(policy_for(&server, ""), CrawlSettings::default()).await;

        assert_eq!(report.pages_fetched, 1);
        assert_eq!(report.pages_skipped, 2);
        assert!(!requested_paths(&server).await.contains(&"/hidden".to_string()));
    }

    #[tokio::test]
    async fn test_missing_required_pattern_flags_page() {
        let server = MockServer::start().await;
        page(
            &server,
            "/",
            r#"<a href="/bare">bare</a><footer>ok</footer>"#,
        )
        .await;
        page(&server, "/bare", "<p>no footer here</p>").await;

        let report = crawl(
            policy_for(&server, r#", "RequiredPatterns": {"footer": "</footer>"}"#),
            CrawlSettings::default(),
        )
        .await;

        assert_eq!(report.pages_fetched, 2);
        assert_eq!(report.flagged_pages, 1);
    }

    #[tokio::test]
    async fn test_cookies_carry_across_fetches() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                html(r#"<a href="/members">members</a>"#)
                    .insert_header("set-cookie", "session=abc; Path=/"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/members"))
            .and(header("cookie", "session=abc"))
            .respond_with(html("<p>welcome back</p>"))
            .mount(&server)
            .await;

        let report = crawl(policy_for(&server, ""), CrawlSettings::default()).await;

        // Without the cookie the mock server answers 404 with an empty body
        assert_eq!(report.pages_fetched, 2);
        assert_eq!(report.pages_skipped, 0);
    }

    #[tokio::test]
    async fn test_transport_failure_is_recovered() {
        let server = MockServer::start().await;
        page(&server, "/", r#"<a href="http://127.0.0.1:1/down">down</a>"#).await;

        // Not allow-listed yet: dropped and reported, never fetched
        let report = crawl(policy_for(&server, ""), CrawlSettings::default()).await;
        assert_eq!(report.pages_fetched, 1);
        assert_eq!(report.fetch_errors, 0);
        assert_eq!(report.dropped_domains, vec!["127.0.0.1:1".to_string()]);

        let json = format!(
            r#"{{"StartUrl": "{}/", "AllowedDomains": {{"{}": true, "127.0.0.1:1": true}}}}"#,
            server.uri(),
            host_of(&server)
        );
        let policy = Arc::new(Policy::from_json(&json).unwrap());
        let report = crawl(policy, CrawlSettings::default()).await;
        assert_eq!(report.pages_fetched, 1);
        assert_eq!(report.fetch_errors, 1);
    }

    #[tokio::test]
    async fn test_rewritten_domain_is_crawled() {
        let server = MockServer::start().await;
        page(
            &server,
            "/",
            r#"<a href="http://old.example.com/moved">moved</a>"#,
        )
        .await;
        page(&server, "/moved", "<p>new home</p>").await;

        let extra = format!(r#", "RewriteDomains": {{"old.example.com": "{}"}}"#, host_of(&server));
        let report = crawl(policy_for(&server, &extra), CrawlSettings::default()).await;

        assert_eq!(report.pages_fetched, 2);
        assert!(report.dropped_domains.is_empty());
    }

    #[tokio::test]
    async fn test_stop_request_abandons_in_flight_work() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(html("<p>slow</p>").set_delay(Duration::from_secs(30)))
            .mount(&server)
            .await;

        let scheduler = Scheduler::new(policy_for(&server, ""), CrawlSettings::default());
        let report = tokio::time::timeout(
            Duration::from_secs(5),
            scheduler.run(tokio::time::sleep(Duration::from_millis(200))),
        )
        .await
        .expect("stop honoured");

        assert!(report.cancelled);
        assert_eq!(report.pages_fetched, 0);
    }

    #[tokio::test]
    async fn test_html_extractor_follows_single_quoted_links() {
        let server = MockServer::start().await;
        page(&server, "/", "<A HREF='/upper'>x</A>").await;
        page(&server, "/upper", "<p>found</p>").await;

        let settings = CrawlSettings {
            extractor: ExtractorKind::Html,
            ..CrawlSettings::default()
        };
        let report = crawl(policy_for(&server, ""), settings).await;
        assert_eq!(report.pages_fetched, 2);
    }
}
