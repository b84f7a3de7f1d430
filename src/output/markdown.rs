//! Markdown summary generation
//!
//! This module renders a [`CrawlReport`] as a human-readable markdown file:
//! run information, counts, failures by kind, external hosts and the saved
//! page index.

use crate::output::{CrawlReport, SinkError};
use std::path::Path;

/// Maximum rows listed per section before the rest are elided
const MAX_LISTED: usize = 50;

/// Writes a markdown summary of `report` to `output_path`
///
/// # Arguments
///
/// * `report` - The finished crawl report
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote markdown summary
/// * `Err(SinkError)` - Failed to write summary
pub async fn write_markdown_summary(
    report: &CrawlReport,
    output_path: &Path,
) -> Result<(), SinkError> {
    let markdown = format_markdown_summary(report);

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(output_path, markdown).await?;

    Ok(())
}

/// Formats a crawl report as markdown
pub fn format_markdown_summary(report: &CrawlReport) -> String {
    let mut md = String::new();

    md.push_str("# Tidewalk Crawl Summary\n\n");

    // Run metadata
    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Seed**: {}\n", report.seed));
    md.push_str(&format!("- **Started**: {}\n", report.started_at.to_rfc3339()));
    md.push_str(&format!("- **Finished**: {}\n", report.finished_at.to_rfc3339()));
    md.push_str(&format!(
        "- **Duration**: {} seconds\n",
        report.duration_seconds()
    ));
    md.push_str(&format!("- **Outcome**: {}\n\n", report.outcome));

    // Overall statistics
    md.push_str("## Overall Statistics\n\n");
    md.push_str("| Metric | Count |\n");
    md.push_str("|--------|-------|\n");
    md.push_str(&format!("| URLs visited | {} |\n", report.visited));
    md.push_str(&format!("| Pages saved | {} |\n", report.pages_saved()));
    md.push_str(&format!("| Assets saved | {} |\n", report.assets.len()));
    md.push_str(&format!(
        "| External links | {} |\n",
        report.external_links.len()
    ));
    md.push_str(&format!("| Failures | {} |\n", report.failures.len()));
    md.push_str(&format!("| Batches | {} |\n", report.batches));
    md.push_str(&format!(
        "| Not dispatched | {} |\n\n",
        report.frontier_remaining
    ));

    // Failures
    let by_kind = report.failures_by_kind();
    if !by_kind.is_empty() {
        md.push_str("## Failures\n\n");
        md.push_str("| Kind | Count |\n");
        md.push_str("|------|-------|\n");
        for (kind, count) in &by_kind {
            md.push_str(&format!("| {} | {} |\n", kind, count));
        }
        md.push('\n');

        md.push_str("| URL | Kind | Message |\n");
        md.push_str("|-----|------|---------|\n");
        for failure in report.failures.iter().take(MAX_LISTED) {
            md.push_str(&format!(
                "| {} | {} | {} |\n",
                failure.url,
                failure.kind,
                escape_cell(&failure.message)
            ));
        }
        push_elided(&mut md, report.failures.len());
    }

    // External hosts
    let hosts = report.external_hosts();
    if !hosts.is_empty() {
        md.push_str("## External Hosts\n\n");
        md.push_str("| Host | References |\n");
        md.push_str("|------|------------|\n");
        for (host, count) in hosts.iter().take(MAX_LISTED) {
            md.push_str(&format!("| {} | {} |\n", host, count));
        }
        push_elided(&mut md, hosts.len());
    }

    // Saved pages
    if !report.index.is_empty() {
        md.push_str("## Saved Pages\n\n");
        for entry in report.index.iter().take(MAX_LISTED) {
            md.push_str(&format!("- [{}]({})\n", entry.url, entry.saved_name));
        }
        push_elided(&mut md, report.index.len());
    }

    md
}

fn push_elided(md: &mut String, total: usize) {
    if total > MAX_LISTED {
        md.push_str(&format!("\n... and {} more\n\n", total - MAX_LISTED));
    } else {
        md.push('\n');
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}
