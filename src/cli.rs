// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// The crawler takes one positional argument (the policy file) and a handful
// of flags that bound the crawl. The short flags (-n, -d, -v, -s) are the
// ones the crawler has always had; the long-only flags are newer.
// =============================================================================

use clap::builder::RangedU64ValueParser;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use crate::checker::ExtractorKind;
use crate::crawl::CrawlSettings;

#[derive(Parser, Debug)]
#[command(
    name = "site-spider",
    version,
    about = "Crawl a site under a policy and flag pages missing required content",
    long_about = "site-spider starts from the policy's StartUrl, follows links that pass the \
                  policy up to a maximum depth, and reports every page that fails one of the \
                  policy's required content patterns."
)]
pub struct Cli {
    /// Policy file (JSON)
    pub config: PathBuf,

    /// Maximum concurrent requests
    #[arg(
        short = 'n',
        long = "workers",
        default_value_t = 1,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub workers: usize,

    /// Maximum depth
    ///
    /// The start page is depth 0; links found on it are depth 1, and so on.
    #[arg(short = 'd', long, default_value_t = 2)]
    pub max_depth: usize,

    /// Verbose output (one line per fetch, loaded policy dump)
    #[arg(short, long)]
    pub verbose: bool,

    /// Show live stats once a second
    #[arg(short, long)]
    pub stats: bool,

    /// Per-fetch timeout in seconds (default: wait forever)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// How links are pulled out of pages
    #[arg(long, value_enum, default_value_t = ExtractorArg::Pattern)]
    pub extractor: ExtractorArg,

    /// Print the end-of-run report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractorArg {
    /// Fixed `<a ... href="...">` pattern
    Pattern,
    /// Full HTML parse
    Html,
}

impl Cli {
    // The parts of the command line the crawl engine cares about
    pub fn crawl_settings(&self) -> CrawlSettings {
        CrawlSettings {
            max_workers: self.workers,
            max_depth: self.max_depth,
            show_stats: self.stats,
            extractor: match self.extractor {
                ExtractorArg::Pattern => ExtractorKind::Pattern,
                ExtractorArg::Html => ExtractorKind::Html,
            },
            timeout: self.timeout.map(Duration::from_secs),
        }
    }
}
