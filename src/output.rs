//! CLI output formatting for all pipeline stages.
//!
//! # Output Format
//!
//! ## Fix
//!
//! ```text
//! Assets
//!     renamed 3, removed 2
//!     til-logo.png -> ai-logo.png
//!
//! Case
//!     renamed 5 files, updated 12 pages
//!
//! Routes
//!     /careers -> page123.html
//!
//! Rewrite
//!     fixed 41 references in 12 files, 2 broken
//!
//! Audit
//!     checked 120 references in 14 pages, 2 broken
//!     index.html -> old-page.html
//!
//! Rename map: 8 entries -> logs/mysite_rename_map.json
//! ```
//!
//! ## Audit
//!
//! ```text
//! Audit
//!     checked 120 references in 14 pages, 0 broken
//! ```
//!
//! # Architecture
//!
//! Each stage has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure — no I/O, no side effects.

use crate::audit::AuditReport;
use crate::pipeline::RunStats;
use crate::routes::RouteTable;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

// ============================================================================
// Fix
// ============================================================================

/// Format the full fix-run summary.
pub fn format_fix_output(stats: &RunStats) -> Vec<String> {
    let mut lines = Vec::new();

    lines.push("Assets".to_string());
    lines.push(format!(
        "{}renamed {}, removed {}",
        indent(1),
        stats.assets_renamed,
        stats.assets_removed
    ));

    lines.push(String::new());
    lines.push("Scrub".to_string());
    let page = if stats.not_found_updated {
        ", 404 page normalized"
    } else {
        ""
    };
    lines.push(format!(
        "{}cleaned {} service files{page}",
        indent(1),
        stats.files_scrubbed
    ));

    lines.push(String::new());
    lines.push("Case".to_string());
    lines.push(format!(
        "{}renamed {} files, updated {} pages",
        indent(1),
        stats.case_renames,
        stats.files_case_updated
    ));

    lines.push(String::new());
    lines.push("Rewrite".to_string());
    lines.push(format!(
        "{}fixed {} references in {} files, {} broken ({} routes applied)",
        indent(1),
        stats.references_fixed,
        stats.files_rewritten,
        stats.references_broken,
        stats.routes
    ));

    lines.push(String::new());
    lines.extend(format_audit_output(&stats.audit));

    if let Some(path) = &stats.rename_map_path {
        lines.push(String::new());
        lines.push(format!(
            "Rename map: {} entries -> {}",
            stats.rename_map_entries,
            path.display()
        ));
    }

    for warning in &stats.warnings {
        lines.push(format!("warning: {warning}"));
    }

    lines.push(String::new());
    lines.push(format!("Completed in {:.2}s", stats.elapsed.as_secs_f64()));
    lines
}

pub fn print_fix_output(stats: &RunStats) {
    for line in format_fix_output(stats) {
        println!("{line}");
    }
}

// ============================================================================
// Audit
// ============================================================================

/// Format the audit summary, one line per broken reference.
pub fn format_audit_output(report: &AuditReport) -> Vec<String> {
    let mut lines = vec!["Audit".to_string()];
    lines.push(format!(
        "{}checked {} references in {} pages, {} broken",
        indent(1),
        report.checked,
        report.files,
        report.broken_count()
    ));
    for broken in &report.broken {
        lines.push(format!("{}{} -> {}", indent(1), broken.file, broken.link));
    }
    for warning in &report.warnings {
        lines.push(format!("warning: {warning}"));
    }
    lines
}

pub fn print_audit_output(report: &AuditReport) {
    for line in format_audit_output(report) {
        println!("{line}");
    }
}

// ============================================================================
// Routes
// ============================================================================

/// Format the parsed route table, one `alias -> target` line per entry.
pub fn format_routes_output(table: &RouteTable) -> Vec<String> {
    let mut lines = vec!["Routes".to_string()];
    if table.is_empty() {
        lines.push(format!("{}(no routing rules found)", indent(1)));
    }
    for entry in table.all() {
        let marker = if entry.exists { "" } else { "  [missing]" };
        lines.push(format!(
            "{}{} -> {}{marker}",
            indent(1),
            entry.alias,
            entry.target
        ));
    }
    for warning in table.warnings() {
        lines.push(format!("warning: {warning}"));
    }
    lines
}

pub fn print_routes_output(table: &RouteTable) {
    for line in format_routes_output(table) {
        println!("{line}");
    }
}
