//! Terminal output formatting for all arbor commands.
//! Uses comfy-table for tabular output and colored for
//! severity-aware terminal styling.

use colored::Colorize;
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, ContentArrangement, Table};

use arbor_core::commands::schema_sync::{NetworkSyncReport, SyncReport};
use arbor_core::{ReplaceReport, ScrubReport};

/// `1 change` / `n changes`.
fn change_count(n: usize) -> String {
    if n == 1 {
        "1 change".to_string()
    } else {
        format!("{} changes", n)
    }
}

/// Print a scrub report summary.
pub fn print_scrub_report(report: &ScrubReport) {
    println!(
        "{}",
        format!(
            "Cleared {} sensitive option(s).",
            report.options_cleared.len()
        )
        .green()
        .bold()
    );
    for name in &report.options_cleared {
        println!("  {} {}", "→".green(), name);
    }
}

/// Print per-table search-replace results.
pub fn print_replace_report(report: &ReplaceReport) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Table"),
            Cell::new("Columns"),
            Cell::new("Status"),
            Cell::new("Rows"),
        ]);

    for result in &report.results {
        let status = if result.success {
            "OK".green().to_string()
        } else {
            "Failed".red().bold().to_string()
        };
        let rows = if result.success {
            result.rows_touched.to_string()
        } else {
            result.message.clone()
        };
        table.add_row(vec![
            Cell::new(&result.table),
            Cell::new(result.columns.join(",")),
            Cell::new(status),
            Cell::new(rows),
        ]);
    }

    println!("{table}");

    if report.all_succeeded {
        println!(
            "{}",
            format!("Replaced '{}' with '{}'.", report.from, report.to)
                .green()
                .bold()
        );
    } else {
        println!(
            "{}",
            "Search-replace completed with errors (see table above).".yellow()
        );
    }
}

/// Print a single-site schema sync report.
pub fn print_sync_report(report: &SyncReport) {
    if report.changes.is_empty() {
        println!("{}", "No changes.".green());
        return;
    }

    for change in &report.changes {
        println!("{}", change);
    }

    println!("{}", change_count(report.changes.len()).green().bold());
}

/// Print a network-wide schema sync summary.
pub fn print_network_sync_report(report: &NetworkSyncReport) {
    for result in &report.results {
        println!();
        println!("{} {}", "Updating:".magenta(), result.domain_path);
        if result.success {
            if result.changes.is_empty() {
                println!("{}", "No changes.".green());
            } else {
                for change in &result.changes {
                    println!("{}", change);
                }
                println!("{}", change_count(result.changes.len()).green().bold());
            }
        } else {
            println!("{} {}", "Failed:".red().bold(), result.message);
        }
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Site"),
            Cell::new("Scope"),
            Cell::new("Status"),
            Cell::new("Changes"),
        ]);

    for result in &report.results {
        let status = if result.success {
            "OK".green().to_string()
        } else {
            "Failed".red().bold().to_string()
        };
        table.add_row(vec![
            Cell::new(&result.domain_path),
            Cell::new(result.scope.as_str()),
            Cell::new(status),
            Cell::new(result.changes.len()),
        ]);
    }

    println!();
    println!("{table}");

    if report.dry_run {
        println!("{}", "Dry run: no schema was modified.".dimmed());
    }
}
