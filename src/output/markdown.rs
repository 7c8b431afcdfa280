//! Markdown summary generation
//!
//! This module generates a human-readable markdown summary of a sweep:
//! finding totals, pages checked and dropped, scope rejections and the most
//! frequent finding codes with links to their technique documentation.

use crate::output::codes::code_info;
use crate::output::summary::{OutputResult, RunSummary};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Generates a markdown summary file
///
/// # Arguments
///
/// * `summary` - The run summary data
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote markdown summary
/// * `Err(OutputError)` - Failed to write summary
pub fn generate_markdown_summary(summary: &RunSummary, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_summary(summary);

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a run summary as markdown
pub fn format_markdown_summary(summary: &RunSummary) -> String {
    let mut md = String::new();

    md.push_str("# Accessibility Sweep Summary\n\n");

    // Run metadata
    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Site**: {}\n", summary.base_url));
    md.push_str(&format!("- **Started**: {}\n", summary.started_at.to_rfc3339()));
    if let Some(finished) = &summary.finished_at {
        md.push_str(&format!("- **Finished**: {}\n", finished.to_rfc3339()));
    }
    if let Some(duration) = summary.duration_seconds() {
        md.push_str(&format!(
            "- **Duration**: {} seconds ({:.2} minutes)\n",
            duration,
            duration as f64 / 60.0
        ));
    }
    md.push_str(&format!("- **Status**: {}\n", summary.status.as_str()));
    md.push_str(&format!("- **Logins**: {}\n", summary.logins));
    md.push_str(&format!("- **Config Hash**: {}\n\n", summary.config_hash));

    // Findings
    md.push_str("## Findings\n\n");
    md.push_str("| Type | Count |\n");
    md.push_str("|------|-------|\n");
    md.push_str(&format!("| Error | {} |\n", summary.counters.error));
    md.push_str(&format!("| Warning | {} |\n", summary.counters.warning));
    md.push_str(&format!("| Notice | {} |\n\n", summary.counters.notice));

    // Pages
    md.push_str("## Pages\n\n");
    md.push_str(&format!("- **Checked**: {}\n", summary.counters.pages));
    md.push_str(&format!("- **Dropped**: {}\n", summary.counters.dropped));
    md.push_str(&format!(
        "- **Title Mismatches**: {}\n\n",
        summary.counters.title_mismatches
    ));

    // Scope
    md.push_str("## Scope Rejections\n\n");
    md.push_str("| Reason | Count |\n");
    md.push_str("|--------|-------|\n");
    md.push_str(&format!("| Duplicate | {} |\n", summary.scope.duplicates));
    md.push_str(&format!("| API endpoint | {} |\n", summary.scope.api_rejected));
    md.push_str(&format!("| Malformed URL | {} |\n\n", summary.scope.malformed));

    if !summary.dropped_urls.is_empty() {
        md.push_str("## Dropped Pages\n\n");
        for url in &summary.dropped_urls {
            md.push_str(&format!("- {}\n", url));
        }
        md.push('\n');
    }

    if !summary.top_codes.is_empty() {
        md.push_str(&format!(
            "## Top {} Finding Codes\n\n",
            summary.top_codes.len()
        ));
        md.push_str("| Code | Count | Techniques |\n");
        md.push_str("|------|-------|------------|\n");

        for (code, count) in &summary.top_codes {
            let links: Vec<String> = code_info(code)
                .doc_links
                .iter()
                .map(|(tech, url)| format!("[{}]({})", tech, url))
                .collect();
            md.push_str(&format!("| {} | {} | {} |\n", code, count, links.join(", ")));
        }
        md.push('\n');
    }

    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::summary::RunStatus;
    use chrono::Duration;

    fn create_test_summary() -> RunSummary {
        let mut summary = RunSummary::new("http://localhost:8000", "abc123");
        summary.finished_at = Some(summary.started_at + Duration::seconds(3600));
        summary.counters.error = 12;
        summary.counters.warning = 40;
        summary.counters.notice = 7;
        summary.counters.pages = 25;
        summary.counters.dropped = 1;
        summary.scope.duplicates = 9;
        summary.logins = 2;
        summary
    }

    #[test]
    fn test_format_markdown_summary() {
        let markdown = format_markdown_summary(&create_test_summary());

        assert!(markdown.contains("# Accessibility Sweep Summary"));
        assert!(markdown.contains("- **Site**: http://localhost:8000"));
        assert!(markdown.contains("| Error | 12 |"));
        assert!(markdown.contains("- **Checked**: 25"));
        assert!(markdown.contains("| Duplicate | 9 |"));
        assert!(markdown.contains("3600 seconds"));
        assert!(markdown.contains("- **Config Hash**: abc123"));
    }

    #[test]
    fn test_markdown_with_codes_and_drops() {
        let mut summary = create_test_summary();
        summary.status = RunStatus::Cancelled;
        summary.dropped_urls = vec!["http://localhost:8000/slow".to_string()];
        summary.top_codes = vec![(
            "WCAG2AA.Principle1.Guideline1_1.1_1_1.H37".to_string(),
            5,
        )];

        let markdown = format_markdown_summary(&summary);

        assert!(markdown.contains("- **Status**: cancelled"));
        assert!(markdown.contains("## Dropped Pages"));
        assert!(markdown.contains("- http://localhost:8000/slow"));
        assert!(markdown.contains("[H37](https://www.w3.org/TR/WCAG20-TECHS/H37)"));
    }

    #[test]
    fn test_generate_writes_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("summary.md");
        generate_markdown_summary(&create_test_summary(), &path).unwrap();
        assert!(std::fs::read_to_string(path).unwrap().starts_with("# Accessibility"));
    }
}
