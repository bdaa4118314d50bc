// src/logging.rs
// =============================================================================
// Diagnostics go through `tracing` and are written to stderr, so the
// end-of-run report on stdout stays clean (and parseable with --json).
//
// RUST_LOG overrides the defaults below.
// =============================================================================

use tracing_subscriber::EnvFilter;

// Installs the global subscriber; call once at startup
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

// Verbose only raises our own crate to debug; hyper and friends stay quiet
fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "info,site_spider=debug"
    } else {
        "info"
    }
}
