// src/crawl/mod.rs
// =============================================================================
// This module is the crawl engine.
//
// Submodules:
// - link: the Link work item
// - gauge: backlog counters shared by the queues' producers and consumers
// - frontier: policy filtering, normalization and deduplication
// - worker: one fetch-and-extract cycle per task
// - scheduler: seeds the crawl, sizes the worker pool, detects the end
//
// Data flow:
//   seed -> frontier input -> Frontier -> work queue -> workers
//                ^                                        |
//                +------------ extracted links -----------+
// =============================================================================

mod frontier;
mod gauge;
mod link;
mod scheduler;
mod worker;

pub use link::Link;
pub use scheduler::{CrawlSettings, Scheduler};
pub use worker::Outcome;
