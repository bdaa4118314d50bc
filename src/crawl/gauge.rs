// src/crawl/gauge.rs
// =============================================================================
// Backlog accounting shared by the scheduler, the frontier and the workers.
//
// Two counters:
// - frontier: links sent to the frontier input that it has not decided on
// - work:     links forwarded to the work queue that no worker has taken
//
// Ordering rules that keep "backlog == 0" trustworthy:
// - producers bump a counter BEFORE sending on the channel
// - the frontier bumps `work` BEFORE it releases `frontier` on a forward
// - a worker sends all of its child links BEFORE it signals completion
//
// With those rules the sum can only read zero when nothing is in flight
// anywhere between the two queues.
// =============================================================================

use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::futures::Notified;
use tokio::sync::Notify;

#[derive(Debug, Default)]
pub struct BacklogGauge {
    frontier: AtomicUsize,
    work: AtomicUsize,
    decided: Notify,
}

impl BacklogGauge {
    pub fn new() -> Self {
        Self::default()
    }

    // A link is about to be sent to the frontier input
    pub fn link_submitted(&self) {
        self.frontier.fetch_add(1, Ordering::AcqRel);
    }

    // The frontier dropped a link
    pub fn link_dropped(&self) {
        self.frontier.fetch_sub(1, Ordering::AcqRel);
        self.decided.notify_waiters();
    }

    // The frontier forwarded a link to the work queue
    pub fn link_forwarded(&self) {
        self.work.fetch_add(1, Ordering::AcqRel);
        self.frontier.fetch_sub(1, Ordering::AcqRel);
        self.decided.notify_waiters();
    }

    // A worker took a link off the work queue
    pub fn work_taken(&self) {
        self.work.fetch_sub(1, Ordering::AcqRel);
    }

    pub fn frontier_len(&self) -> usize {
        self.frontier.load(Ordering::Acquire)
    }

    pub fn work_len(&self) -> usize {
        self.work.load(Ordering::Acquire)
    }

    // Combined count of pending links across both queues
    pub fn backlog(&self) -> usize {
        // Read `frontier` first: a concurrent forward moves a unit from
        // `frontier` to `work`, and this order can only over-count it.
        let frontier = self.frontier_len();
        frontier + self.work_len()
    }

    pub fn is_drained(&self) -> bool {
        self.backlog() == 0
    }

    // Resolves after the frontier's next decision
    //
    // The future sees notifications from the moment it is created, so
    // callers create it before checking `is_drained`.
    pub fn decided(&self) -> Notified<'_> {
        self.decided.notified()
    }
}
