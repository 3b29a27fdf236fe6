//! Markdown export of the negotiated phase list.
//!
//! The output uses the same layout the source parser reads, so an exported
//! document can be negotiated again. Headings are numbered sequentially
//! among the included phases only; the numbers are display-only.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

use crate::negotiate::NegotiationState;
use crate::phase::Phase;

/// How skipped phases appear in an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkippedMode {
    /// Leave skipped phases out entirely
    Omit,
    /// Keep them inside an HTML comment so reviewers can still see them
    #[default]
    Comment,
}

impl std::str::FromStr for SkippedMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "omit" => Ok(SkippedMode::Omit),
            "comment" => Ok(SkippedMode::Comment),
            _ => anyhow::bail!("Invalid skipped mode '{}'. Valid values: omit, comment", s),
        }
    }
}

impl std::fmt::Display for SkippedMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkippedMode::Omit => write!(f, "omit"),
            SkippedMode::Comment => write!(f, "comment"),
        }
    }
}

/// Render the current phase list as a markdown audit document.
pub fn export_document(state: &NegotiationState, skipped: SkippedMode) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "<!--");
    let _ = writeln!(out, "Negotiated audit plan");
    let _ = writeln!(out, "source: {}", state.source_file().display());
    let _ = writeln!(out, "source_hash: {}", state.source_hash());
    let _ = writeln!(out, "session: {}", state.session_id());
    let _ = writeln!(out, "operations: {}", state.operations().len());
    let _ = writeln!(out, "skipped: {}", state.skipped_ids().len());
    let _ = writeln!(out, "exported_at: {}", Utc::now().to_rfc3339());
    let _ = writeln!(out, "-->");

    let mut display_number = 0;
    for phase in state.current_phases() {
        if state.is_skipped(&phase.id) {
            if skipped == SkippedMode::Comment {
                let body = render_section(phase, &format!("Skipped: {}", phase.title));
                let _ = writeln!(out);
                let _ = writeln!(out, "<!-- SKIPPED {}", phase.id);
                // a stray terminator would end the comment early
                out.push_str(&body.replace("-->", "-- >"));
                let _ = writeln!(out, "-->");
            }
            continue;
        }

        display_number += 1;
        let heading = format!("Phase {}: {}", display_number, phase.title);
        let _ = writeln!(out);
        out.push_str(&render_section(phase, &heading));
    }
    out
}

fn render_section(phase: &Phase, heading: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "## {}", heading);
    let _ = writeln!(out);
    match phase.lineage_label() {
        Some(label) => {
            let _ = writeln!(out, "_Phase id: {} ({})_", phase.id, label);
        }
        None => {
            let _ = writeln!(out, "_Phase id: {}_", phase.id);
        }
    }

    write_text(&mut out, "Context", &phase.context);
    write_text(&mut out, "Goal", &phase.goal);

    let _ = writeln!(out, "\n### Files\n");
    for file in &phase.files {
        if file.description.is_empty() {
            let _ = writeln!(out, "- `{}` ({})", file.path, file.action);
        } else {
            let _ = writeln!(out, "- `{}` ({}): {}", file.path, file.action, file.description);
        }
    }

    write_list(&mut out, "Plan", &phase.plan, true);
    write_list(&mut out, "Verification", &phase.verification, false);
    write_list(&mut out, "Acceptance Criteria", &phase.acceptance_criteria, false);
    write_list(&mut out, "Rollback", &phase.rollback, false);
    out
}

fn write_text(out: &mut String, heading: &str, text: &str) {
    if text.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n### {}\n\n{}", heading, text);
}

fn write_list(out: &mut String, heading: &str, items: &[String], numbered: bool) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n### {}\n", heading);
    for (i, item) in items.iter().enumerate() {
        if numbered {
            let _ = writeln!(out, "{}. {}", i + 1, item);
        } else {
            let _ = writeln!(out, "- {}", item);
        }
    }
}
