//! Markdown run reports
//!
//! Renders one or more [`CrawlSummary`] values as a human-readable report:
//! counters, field extraction rates and the categorized error lists.

use crate::output::summary::{CrawlSummary, OutputResult};
use crate::state::FieldStatsTable;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Entries listed per error section before the rest is elided
const MAX_LISTED: usize = 20;

/// Writes a markdown report for a set of runs
///
/// # Arguments
///
/// * `summaries` - One summary per crawled source
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote the report
/// * `Err(OutputError)` - Failed to write the report
pub fn generate_markdown_report(summaries: &[CrawlSummary], output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_report(summaries);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a set of runs as markdown
pub fn format_markdown_report(summaries: &[CrawlSummary]) -> String {
    let mut md = String::new();

    md.push_str("# Folio Harvest Run Report\n\n");

    if summaries.is_empty() {
        md.push_str("No sources were crawled.\n");
        return md;
    }

    md.push_str("| Source | Session | Pages | Found | Processed | Duplicates | Filtered | Stopped |\n");
    md.push_str("|--------|---------|-------|-------|-----------|------------|----------|---------|\n");
    for s in summaries {
        md.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {} | {} |\n",
            s.source_id,
            s.session_id,
            s.pages_processed,
            s.items_found,
            s.items_processed,
            s.duplicates_skipped,
            s.total_filtered_items,
            stop_label(s)
        ));
    }
    md.push('\n');

    for summary in summaries {
        md.push_str(&format_source_section(summary));
    }

    md
}

fn stop_label(summary: &CrawlSummary) -> &'static str {
    summary
        .stopped_reason
        .map(|r| r.as_str())
        .unwrap_or("running")
}

fn format_source_section(summary: &CrawlSummary) -> String {
    let mut md = String::new();

    md.push_str(&format!("## {}\n\n", summary.source_id));
    md.push_str(&format!("- **Session**: {}\n", summary.session_id));
    md.push_str(&format!("- **Started**: {}\n", summary.started_at.to_rfc3339()));
    if let Some(ended) = summary.ended_at {
        md.push_str(&format!("- **Finished**: {}\n", ended.to_rfc3339()));
    }
    if let Some(seconds) = summary.duration_seconds() {
        md.push_str(&format!(
            "- **Duration**: {} seconds ({:.2} minutes)\n",
            seconds,
            seconds as f64 / 60.0
        ));
    }
    md.push_str(&format!("- **Stopped**: {}\n", stop_label(summary)));
    if let Some(hash) = &summary.config_hash {
        md.push_str(&format!("- **Config Hash**: {}\n", hash));
    }
    md.push_str(&format!(
        "- **Items with errors**: {}\n\n",
        summary.items_with_errors
    ));

    md.push_str(&format_field_table("Listing Fields", &summary.listing_field_stats));
    md.push_str(&format_field_table("Content Fields", &summary.content_field_stats));

    md.push_str(&format_list("Listing Errors", &summary.listing_errors));
    md.push_str(&format_list("Content Errors", &summary.content_errors));
    md.push_str(&format_list("Content Warnings", &summary.content_warnings));

    md
}

fn format_field_table(title: &str, table: &FieldStatsTable) -> String {
    if table.is_empty() {
        return String::new();
    }

    let mut md = format!("### {}\n\n", title);
    md.push_str("| Field | Found | Attempts | Rate | Optional |\n");
    md.push_str("|-------|-------|----------|------|----------|\n");
    for stats in table.iter() {
        md.push_str(&format!(
            "| {} | {} | {} | {:.1}% | {} |\n",
            stats.field_name,
            stats.success_count,
            stats.total_attempts,
            stats.success_rate(),
            if stats.is_optional { "yes" } else { "no" }
        ));
    }
    md.push('\n');
    md
}

fn format_list(title: &str, entries: &[String]) -> String {
    if entries.is_empty() {
        return String::new();
    }

    let mut md = format!("### {} ({})\n\n", title, entries.len());
    for entry in entries.iter().take(MAX_LISTED) {
        md.push_str(&format!("- {}\n", entry));
    }
    if entries.len() > MAX_LISTED {
        md.push_str(&format!("- ... and {} more\n", entries.len() - MAX_LISTED));
    }
    md.push('\n');
    md
}
