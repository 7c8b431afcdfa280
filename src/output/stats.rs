//! Statistics from an existing report directory
//!
//! Backs the `--stats` flag: reads stored JSON reports and prints totals
//! without crawling anything.

use crate::check::FindingType;
use crate::output::summary::{CodeTally, OutputResult};
use crate::storage::{read_index, read_reports};
use std::collections::BTreeMap;
use std::path::Path;

/// Report directory statistics summary
#[derive(Debug, Clone, Default)]
pub struct ReportStatistics {
    /// Number of stored reports
    pub total_reports: u64,

    /// Number of distinct URLs in the results index
    pub indexed_pages: u64,

    /// Finding count by type
    pub findings_by_type: BTreeMap<&'static str, u64>,

    /// Most frequent finding codes
    pub top_codes: Vec<(String, u64)>,

    /// Pages with the most errors
    pub worst_pages: Vec<(String, u64)>,
}

/// Loads statistics from a JSON report directory
///
/// # Arguments
///
/// * `reports_dir` - The reports directory of an earlier run
pub fn load_statistics(reports_dir: &Path) -> OutputResult<ReportStatistics> {
    let reports = read_reports(reports_dir)?;
    let index = read_index(reports_dir)?;

    let mut findings_by_type: BTreeMap<&'static str, u64> = BTreeMap::new();
    let mut tally = CodeTally::new();
    let mut errors_by_page: BTreeMap<String, u64> = BTreeMap::new();

    for report in &reports {
        for finding in &report.findings {
            *findings_by_type.entry(finding.kind.as_str()).or_insert(0) += 1;
        }
        tally.add(&report.findings);

        let errors = report
            .findings
            .iter()
            .filter(|f| f.kind == FindingType::Error)
            .count() as u64;
        let entry = errors_by_page.entry(report.page.url.clone()).or_insert(0);
        *entry = (*entry).max(errors);
    }

    let mut worst_pages: Vec<(String, u64)> = errors_by_page
        .into_iter()
        .filter(|(_, errors)| *errors > 0)
        .collect();
    worst_pages.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    worst_pages.truncate(10);

    Ok(ReportStatistics {
        total_reports: reports.len() as u64,
        indexed_pages: index.len() as u64,
        findings_by_type,
        top_codes: tally.top(10),
        worst_pages,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &ReportStatistics) {
    println!("=== Accessibility Report Statistics ===\n");

    println!("Overview:");
    println!("  Stored reports: {}", stats.total_reports);
    println!("  Indexed pages: {}", stats.indexed_pages);
    println!();

    println!("Findings by Type:");
    for (kind, count) in &stats.findings_by_type {
        println!("  {}: {}", kind, count);
    }
    println!();

    if !stats.top_codes.is_empty() {
        println!("Most Frequent Codes:");
        for (code, count) in &stats.top_codes {
            println!("  {} ({})", code, count);
        }
        println!();
    }

    if !stats.worst_pages.is_empty() {
        println!("Pages with Most Errors:");
        for (url, errors) in &stats.worst_pages {
            println!("  {}: {}", url, errors);
        }
        println!();
    }
}
