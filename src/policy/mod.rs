// src/policy/mod.rs
// =============================================================================
// This module holds the crawl policy: which links may be fetched, how they
// are rewritten and normalized, and which content every page must contain.
//
// Submodules:
// - config: the JSON policy document, its loader and the compiled Policy
//
// The Policy is built once before the crawl starts and is never mutated
// afterwards. Every other component only borrows it (through an Arc).
// =============================================================================

mod config;

pub use config::Policy;
