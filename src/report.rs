// src/report.rs
// =============================================================================
// The end-of-run report.
//
// The scheduler fills a CrawlReport while the crawl runs (one record() call
// per worker completion) and adds the dropped domains at the end. main.rs
// prints it either as a human-readable summary or as JSON.
// =============================================================================

use anyhow::Result;
use serde::Serialize;
use std::fmt::Write;

use crate::crawl::Outcome;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CrawlReport {
    /// HTML pages fetched and processed
    pub pages_fetched: usize,
    /// Responses that were not HTML or had an empty body
    pub pages_skipped: usize,
    /// Fetches abandoned because of a transport error
    pub fetch_errors: usize,
    /// Pages missing at least one required pattern
    pub flagged_pages: usize,
    /// Child links handed to the frontier
    pub links_submitted: usize,
    /// Workers that exited without work
    pub idle_workers: usize,
    /// Highest number of workers running at once
    pub peak_workers: usize,
    /// Hosts rejected by the allow-list
    pub dropped_domains: Vec<String>,
    /// True when the crawl was stopped before it finished
    pub cancelled: bool,
    /// Wall-clock duration of the crawl
    pub elapsed_secs: f64,
}

impl CrawlReport {
    // Folds one worker completion into the totals
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Fetched { links, flagged } => {
                self.pages_fetched += 1;
                self.links_submitted += links;
                if flagged {
                    self.flagged_pages += 1;
                }
            }
            Outcome::Skipped => self.pages_skipped += 1,
            Outcome::Failed => self.fetch_errors += 1,
            Outcome::Idle => self.idle_workers += 1,
        }
    }

    // Completions that involved a fetch attempt
    pub fn completed(&self) -> usize {
        self.pages_fetched + self.pages_skipped + self.fetch_errors
    }
}

// Prints the report either as a summary or as JSON
pub fn print_report(report: &CrawlReport, json: bool) -> Result<()> {
    if json {
        let json_output = serde_json::to_string_pretty(report)?;
        println!("{}", json_output);
    } else {
        print!("{}", render_text(report));
    }
    Ok(())
}

// Human-readable summary, one IGNORED DOMAIN line per dropped host
pub fn render_text(report: &CrawlReport) -> String {
    let mut out = String::new();

    if report.cancelled {
        out.push_str("Stopped spidering\n");
    } else {
        out.push_str("Done spidering\n");
    }

    for domain in &report.dropped_domains {
        let _ = writeln!(out, "IGNORED DOMAIN: {}", domain);
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "📊 Summary:");
    let _ = writeln!(out, "   📄 Fetched: {}", report.pages_fetched);
    let _ = writeln!(out, "   ⏭️  Skipped: {}", report.pages_skipped);
    let _ = writeln!(out, "   ❌ Errors: {}", report.fetch_errors);
    let _ = writeln!(out, "   🚩 Flagged: {}", report.flagged_pages);
    let _ = writeln!(out, "   ⏱️  Elapsed: {:.2}s", report.elapsed_secs);

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_counts_each_outcome() {
        let mut report = CrawlReport::default();
        report.record(Outcome::Fetched { links: 3, flagged: false });
        report.record(Outcome::Fetched { links: 2, flagged: true });
        report.record(Outcome::Skipped);
        report.record(Outcome::Failed);
        report.record(Outcome::Idle);

        assert_eq!(report.pages_fetched, 2);
        assert_eq!(report.links_submitted, 5);
        assert_eq!(report.flagged_pages, 1);
        assert_eq!(report.pages_skipped, 1);
        assert_eq!(report.fetch_errors, 1);
        assert_eq!(report.idle_workers, 1);
        assert_eq!(report.completed(), 4);
    }

    #[test]
    fn test_text_lists_ignored_domains() {
        let report = CrawlReport {
            dropped_domains: vec!["ads.example.net".to_string(), "cdn.example.org".to_string()],
            ..CrawlReport::default()
        };
        let text = render_text(&report);
        assert!(text.starts_with("Done spidering\n"));
        assert!(text.contains("IGNORED DOMAIN: ads.example.net\n"));
        assert!(text.contains("IGNORED DOMAIN: cdn.example.org\n"));
    }

    #[test]
    fn test_text_marks_cancelled_run() {
        let report = CrawlReport {
            cancelled: true,
            ..CrawlReport::default()
        };
        assert!(render_text(&report).starts_with("Stopped spidering"));
    }

    #[test]
    fn test_json_field_names() {
        let report = CrawlReport {
            pages_fetched: 4,
            ..CrawlReport::default()
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["pages_fetched"], 4);
        assert_eq!(value["cancelled"], false);
        assert!(value["dropped_domains"].as_array().unwrap().is_empty());
    }
}
