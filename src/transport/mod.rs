// src/transport/mod.rs
// =============================================================================
// Network plumbing for fetch workers.
//
// Submodules:
// - pool: the shared-cookie client pool every fetch borrows from
// - error: classification of fetch failures
// =============================================================================

mod error;
mod pool;

pub use error::FetchError;
pub use pool::ClientPool;
