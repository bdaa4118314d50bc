// src/main.rs
// =============================================================================
// This is the entry point of the crawler.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Set up logging
// 3. Load and compile the policy file
// 4. Run the crawl until it finishes or Ctrl-C is pressed
// 5. Print the report and exit with the proper code
//    (0 = nothing flagged, 1 = pages failed required patterns, 2 = error)
// =============================================================================

mod checker;
mod cli;
mod crawl;
mod logging;
mod policy;
mod report;
mod transport;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{debug, info, warn};

use cli::Cli;
use crawl::Scheduler;
use policy::Policy;

#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            // Logging may not be up yet, so this goes straight to stderr
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let policy = Policy::load(&cli.config).with_context(|| {
        format!("couldn't load configuration file {}", cli.config.display())
    })?;
    debug!(?policy, "loaded configuration");

    info!("Spidering {}", policy.start_address);

    let scheduler = Scheduler::new(Arc::new(policy), cli.crawl_settings());
    let report = scheduler.run(stop_requested()).await;

    report::print_report(&report, cli.json)?;

    if report.flagged_pages > 0 {
        Ok(1)
    } else {
        Ok(0)
    }
}

// Resolves on Ctrl-C; never resolves if the handler can't be installed
async fn stop_requested() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("couldn't listen for Ctrl-C: {}", err);
        std::future::pending::<()>().await;
    }
}
