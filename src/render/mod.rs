//! Read-only views of a negotiation session.
//!
//! Every function returns the rendered text; the command layer decides where
//! it goes.

pub mod export;

pub use export::{SkippedMode, export_document};

use console::style;
use std::fmt::Write;

use crate::negotiate::NegotiationState;
use crate::phase::Phase;
use crate::ui::icons::{CLOCK, MERGE, SKIPPED, SPLIT, file_action_icon};

const WRAP_WIDTH: usize = 76;

/// Phase listing: number, id, title, skip marker, lineage and file count.
pub fn render_list(state: &NegotiationState) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<4} {:<10} {:<6} {}",
        "#", "Id", "Files", "Title"
    );
    let _ = writeln!(out, "{:<4} {:<10} {:<6} -----", "----", "----------", "-----");

    for phase in state.current_phases() {
        let mut title = phase.title.clone();
        if let Some(label) = phase.lineage_label() {
            title = format!("{} {}", title, style(format!("({})", label)).dim());
        }
        if state.is_skipped(&phase.id) {
            title = format!("{} {}", style(title).dim(), style("[skipped]").yellow());
        }
        let _ = writeln!(
            out,
            "{:<4} {:<10} {:<6} {}",
            phase.number,
            phase.id,
            phase.files.len(),
            title
        );
    }

    let skipped = state.skipped_ids().len();
    let _ = writeln!(out);
    if skipped > 0 {
        let _ = writeln!(
            out,
            "{} phases ({} active, {} skipped)",
            state.current_phases().len(),
            state.active_count(),
            skipped
        );
    } else {
        let _ = writeln!(out, "{} phases", state.current_phases().len());
    }
    out
}

fn wrapped(text: &str) -> String {
    let options = textwrap::Options::new(WRAP_WIDTH)
        .initial_indent("  ")
        .subsequent_indent("  ");
    text.lines()
        .map(|line| textwrap::fill(line, &options))
        .collect::<Vec<_>>()
        .join("\n")
}

fn write_list(out: &mut String, heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n{}", style(heading).bold());
    for (i, item) in items.iter().enumerate() {
        let _ = writeln!(out, "  {}. {}", i + 1, item);
    }
}

/// Full detail view of one phase.
pub fn render_phase(state: &NegotiationState, phase: &Phase) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} {}",
        style(format!("Phase {} ({})", phase.number, phase.id)).bold().cyan(),
        style(&phase.title).bold()
    );

    if state.is_skipped(&phase.id) {
        let _ = writeln!(out, "{}skipped: excluded from execution and export", SKIPPED);
    }
    if let Some(lineage) = &phase.split_from {
        let _ = writeln!(out, "{}split from {} (part {})", SPLIT, lineage.parent, lineage.ordinal);
    }
    if !phase.merged_from.is_empty() {
        let _ = writeln!(out, "{}merged from {}", MERGE, phase.merged_from.join(", "));
    }
    if let Some(original) = &phase.original_id {
        let _ = writeln!(out, "  originally {}", original);
    }

    if !phase.context.is_empty() {
        let _ = writeln!(out, "\n{}\n{}", style("Context").bold(), wrapped(&phase.context));
    }
    if !phase.goal.is_empty() {
        let _ = writeln!(out, "\n{}\n{}", style("Goal").bold(), wrapped(&phase.goal));
    }

    let _ = writeln!(out, "\n{}", style(format!("Files ({})", phase.files.len())).bold());
    for file in &phase.files {
        if file.description.is_empty() {
            let _ = writeln!(out, "  {}{} ({})", file_action_icon(file.action), file.path, file.action);
        } else {
            let _ = writeln!(
                out,
                "  {}{} ({}): {}",
                file_action_icon(file.action),
                file.path,
                file.action,
                file.description
            );
        }
    }

    write_list(&mut out, "Plan", &phase.plan);
    write_list(&mut out, "Verification", &phase.verification);
    write_list(&mut out, "Acceptance Criteria", &phase.acceptance_criteria);
    write_list(&mut out, "Rollback", &phase.rollback);
    out
}

/// The operation log, oldest first.
pub fn render_history(state: &NegotiationState) -> String {
    let mut out = String::new();
    if state.operations().is_empty() {
        let _ = writeln!(out, "No operations recorded");
        return out;
    }

    for (i, op) in state.operations().iter().enumerate() {
        let _ = writeln!(
            out,
            "{:>3}. {}{} {:<8} {}",
            i + 1,
            CLOCK,
            style(op.timestamp.format("%Y-%m-%d %H:%M:%S")).dim(),
            op.op_type,
            op.description
        );
    }
    out
}

/// Differences between the original and the current phase list.
pub fn render_diff(state: &NegotiationState) -> String {
    let diff = state.diff();
    let mut out = String::new();

    let _ = writeln!(
        out,
        "Original: {} phases  Current: {} phases ({} active)  Operations: {}",
        diff.original_count, diff.current_count, diff.active_count, diff.operation_count
    );
    if diff.removed.is_empty() && diff.added.is_empty() && diff.skipped.is_empty() {
        let _ = writeln!(out, "No changes from the original phase list");
        return out;
    }

    for id in &diff.removed {
        let _ = writeln!(out, "  {} {}", style("-").red(), id);
    }
    for id in &diff.added {
        let _ = writeln!(out, "  {} {}", style("+").green(), id);
    }
    for id in &diff.skipped {
        let _ = writeln!(out, "  {} {} (skipped)", style("~").yellow(), id);
    }
    out
}

/// Session metadata for `status`.
pub fn render_status(state: &NegotiationState) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Source:     {}", state.source_file().display());
    let _ = writeln!(out, "Hash:       {}", state.source_hash());
    let _ = writeln!(out, "Session:    {}", state.session_id());
    let _ = writeln!(
        out,
        "Created:    {}",
        state.created_at().format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(
        out,
        "Modified:   {}",
        state.modified_at().format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(
        out,
        "Phases:     {} ({} active, {} skipped)",
        state.current_phases().len(),
        state.active_count(),
        state.skipped_ids().len()
    );
    let _ = writeln!(out, "Operations: {}", state.operations().len());
    out
}
