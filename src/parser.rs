//! Source document parsing.
//!
//! Audit plans arrive either as a JSON phase list (`{"phases": [...]}`) or as
//! a markdown document laid out like this:
//!
//! ```markdown
//! ## Phase 1: Audit authentication
//!
//! ### Context
//! Login was rewritten last quarter.
//!
//! ### Files
//! - `src/auth.rs` (modify): tighten session checks
//! - `src/token.rs` (create)
//!
//! ### Plan
//! 1. Read the login flow
//! 2. Add expiry checks
//! ```
//!
//! Each `## Phase N: Title` heading opens a phase with id `PN`. Subsections
//! other than the recognised ones are ignored, as is anything inside
//! `<!-- ... -->` comments.

use anyhow::{Context, Result};
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::errors::NegotiationError;
use crate::negotiate::renumber::canonical_id;
use crate::negotiate::store::compute_source_hash;
use crate::phase::{FileAction, FileChange, Phase, PhasesFile};

static PHASE_HEADING_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^##\s+phase\s+(\d+)\s*[:.\-]\s*(\S.*?)\s*$").unwrap());

static SECTION_HEADING_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^###\s+(.+?)\s*#*\s*$").unwrap());

static FILE_ITEM_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[-*+]\s+`([^`]+)`\s*\(([A-Za-z]+)\)\s*(?::\s*(.*?))?\s*$").unwrap()
});

static LIST_ITEM_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*+]|\d+[.)])\s+(.*?)\s*$").unwrap());

/// A loaded source document and its record key.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub hash: String,
    pub phases: Vec<Phase>,
}

/// Read and parse a source document, choosing the format by extension.
pub fn load_source(path: &Path) -> Result<SourceDocument> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read source document: {}", path.display()))?;
    let hash = compute_source_hash(&bytes);
    let content = String::from_utf8(bytes)
        .with_context(|| format!("Source document is not valid UTF-8: {}", path.display()))?;

    let is_json = path.extension().is_some_and(|e| e == "json");
    let phases = if is_json {
        PhasesFile::parse(&content)
            .with_context(|| format!("Failed to parse phases JSON: {}", path.display()))?
            .phases
    } else {
        parse_document(&content)
            .with_context(|| format!("Failed to parse audit document: {}", path.display()))?
    };

    tracing::debug!(path = %path.display(), %hash, phases = phases.len(), "Source loaded");
    Ok(SourceDocument {
        path: path.to_path_buf(),
        hash,
        phases,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    /// Between the phase heading and its first subsection
    Preamble,
    Context,
    Goal,
    Files,
    Plan,
    Verification,
    AcceptanceCriteria,
    Rollback,
    Ignored,
}

impl Section {
    fn from_heading(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "context" | "background" => Section::Context,
            "goal" | "objective" => Section::Goal,
            "files" | "files to change" => Section::Files,
            "plan" | "steps" => Section::Plan,
            "verification" => Section::Verification,
            "acceptance criteria" | "acceptance" => Section::AcceptanceCriteria,
            "rollback" => Section::Rollback,
            _ => Section::Ignored,
        }
    }
}

struct PhaseBuilder {
    phase: Phase,
    line: usize,
    section: Section,
    context: Vec<String>,
    goal: Vec<String>,
}

impl PhaseBuilder {
    fn new(number: usize, title: &str, line: usize) -> Self {
        Self {
            phase: Phase::new(&canonical_id(number), number, title),
            line,
            section: Section::Preamble,
            context: Vec::new(),
            goal: Vec::new(),
        }
    }

    fn push_line(&mut self, raw: &str, line: usize) -> Result<(), NegotiationError> {
        match self.section {
            Section::Preamble | Section::Ignored => {}
            Section::Context => self.context.push(raw.trim_end().to_string()),
            Section::Goal => self.goal.push(raw.trim_end().to_string()),
            Section::Files => self.push_file(raw, line)?,
            Section::Plan => push_list_item(&mut self.phase.plan, raw),
            Section::Verification => push_list_item(&mut self.phase.verification, raw),
            Section::AcceptanceCriteria => {
                push_list_item(&mut self.phase.acceptance_criteria, raw)
            }
            Section::Rollback => push_list_item(&mut self.phase.rollback, raw),
        }
        Ok(())
    }

    fn push_file(&mut self, raw: &str, line: usize) -> Result<(), NegotiationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(());
        }

        if let Some(caps) = FILE_ITEM_REGEX.captures(raw) {
            let action: FileAction = caps[2].parse().map_err(|e: anyhow::Error| {
                NegotiationError::Parse {
                    line,
                    message: e.to_string(),
                }
            })?;
            let description = caps.get(3).map_or("", |m| m.as_str());
            self.phase
                .files
                .push(FileChange::new(&caps[1], action, description));
            return Ok(());
        }

        // indented text continues the previous file's description
        if raw.starts_with(char::is_whitespace)
            && let Some(last) = self.phase.files.last_mut()
        {
            if !last.description.is_empty() {
                last.description.push(' ');
            }
            last.description.push_str(trimmed);
            return Ok(());
        }

        Err(NegotiationError::Parse {
            line,
            message: format!(
                "expected a file entry like \"- `path` (modify): description\", found \"{}\"",
                trimmed
            ),
        })
    }

    fn finish(self) -> Result<Phase, NegotiationError> {
        let mut phase = self.phase;
        phase.context = join_text(&self.context);
        phase.goal = join_text(&self.goal);
        if phase.files.is_empty() {
            return Err(NegotiationError::Parse {
                line: self.line,
                message: format!("phase {} lists no files", phase.number),
            });
        }
        Ok(phase)
    }
}

fn push_list_item(list: &mut Vec<String>, raw: &str) {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return;
    }
    if let Some(caps) = LIST_ITEM_REGEX.captures(raw) {
        list.push(caps[1].to_string());
    } else if let Some(last) = list.last_mut() {
        last.push(' ');
        last.push_str(trimmed);
    } else {
        list.push(trimmed.to_string());
    }
}

fn join_text(lines: &[String]) -> String {
    lines.join("\n").trim().to_string()
}

/// Parse a markdown audit document into phases in document order.
pub fn parse_document(content: &str) -> Result<Vec<Phase>, NegotiationError> {
    let mut phases = Vec::new();
    let mut numbers = HashSet::new();
    let mut current: Option<PhaseBuilder> = None;
    let mut in_comment = false;
    let mut in_fence = false;

    for (index, raw) in content.lines().enumerate() {
        let line = index + 1;
        let trimmed = raw.trim();

        if in_comment {
            if trimmed.contains("-->") {
                in_comment = false;
            }
            continue;
        }
        if !in_fence && let Some(rest) = trimmed.strip_prefix("<!--") {
            in_comment = !rest.contains("-->");
            continue;
        }
        if trimmed.starts_with("```") {
            in_fence = !in_fence;
        } else if !in_fence {
            if let Some(caps) = PHASE_HEADING_REGEX.captures(raw) {
                if let Some(builder) = current.take() {
                    phases.push(builder.finish()?);
                }
                let number: usize = caps[1].parse().map_err(|_| NegotiationError::Parse {
                    line,
                    message: format!("phase number '{}' is too large", &caps[1]),
                })?;
                if number == 0 || !numbers.insert(number) {
                    return Err(NegotiationError::Parse {
                        line,
                        message: format!("phase number {} is zero or repeated", number),
                    });
                }
                current = Some(PhaseBuilder::new(number, &caps[2], line));
                continue;
            }
            if raw.starts_with("# ") || raw.starts_with("## ") {
                // any other top-level heading closes the current phase
                if let Some(builder) = current.take() {
                    phases.push(builder.finish()?);
                }
                continue;
            }
            if let Some(caps) = SECTION_HEADING_REGEX.captures(raw) {
                if let Some(builder) = current.as_mut() {
                    builder.section = Section::from_heading(&caps[1]);
                }
                continue;
            }
        }

        if let Some(builder) = current.as_mut() {
            builder.push_line(raw, line)?;
        }
    }

    if let Some(builder) = current.take() {
        phases.push(builder.finish()?);
    }
    if phases.is_empty() {
        return Err(NegotiationError::EmptyPhaseList);
    }
    Ok(phases)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"# Security audit

Intro text that belongs to no phase.

## Phase 1: Audit authentication

### Context
Login was rewritten.
It has no tests.

### Goal
Find session bugs.

### Files
- `src/auth.rs` (modify): tighten checks
  around expiry
- `src/token.rs` (create)

### Plan
1. Read the login flow
2. Add expiry checks
   for refresh tokens

### Acceptance Criteria
- Expired sessions are rejected

### Notes
- ignored section

## Phase 2: Remove legacy API

<!-- reviewer note:
## Phase 9: Not a phase
-->

### Files
* `src/legacy.rs` (delete): unused

### Rollback
- git revert
"#;

    #[test]
    fn test_parse_document_sections() {
        let phases = parse_document(DOC).unwrap();
        assert_eq!(phases.len(), 2);

        let p1 = &phases[0];
        assert_eq!(p1.id, "P1");
        assert_eq!(p1.number, 1);
        assert_eq!(p1.title, "Audit authentication");
        assert_eq!(p1.context, "Login was rewritten.\nIt has no tests.");
        assert_eq!(p1.goal, "Find session bugs.");
        assert_eq!(p1.files.len(), 2);
        assert_eq!(p1.files[0].path, "src/auth.rs");
        assert_eq!(p1.files[0].description, "tighten checks around expiry");
        assert_eq!(p1.files[1].action, FileAction::Create);
        assert_eq!(p1.files[1].description, "");
        assert_eq!(
            p1.plan,
            vec!["Read the login flow", "Add expiry checks for refresh tokens"]
        );
        assert_eq!(p1.acceptance_criteria, vec!["Expired sessions are rejected"]);
        assert!(p1.verification.is_empty());

        let p2 = &phases[1];
        assert_eq!(p2.id, "P2");
        assert_eq!(p2.files[0].action, FileAction::Delete);
        assert_eq!(p2.rollback, vec!["git revert"]);
    }

    #[test]
    fn test_parse_document_without_phases() {
        assert_eq!(
            parse_document("# Nothing here\n\nJust prose.\n").unwrap_err(),
            NegotiationError::EmptyPhaseList
        );
    }

    #[test]
    fn test_parse_error_reports_line() {
        let doc = "## Phase 1: A\n\n### Files\n- src/a.rs without backticks\n";
        match parse_document(doc).unwrap_err() {
            NegotiationError::Parse { line, message } => {
                assert_eq!(line, 4);
                assert!(message.contains("src/a.rs"));
            }
            other => panic!("Expected Parse, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_unknown_action_and_repeated_number() {
        let bad_action = "## Phase 1: A\n### Files\n- `a.rs` (rename)\n";
        assert!(matches!(
            parse_document(bad_action),
            Err(NegotiationError::Parse { line: 3, .. })
        ));

        let repeated = "## Phase 1: A\n### Files\n- `a.rs` (modify)\n## Phase 1: B\n### Files\n- `b.rs` (modify)\n";
        assert!(matches!(
            parse_document(repeated),
            Err(NegotiationError::Parse { line: 4, .. })
        ));
    }

    #[test]
    fn test_parse_rejects_phase_without_files() {
        let doc = "## Phase 1: A\n### Plan\n- think\n";
        assert!(matches!(
            parse_document(doc),
            Err(NegotiationError::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn test_headings_inside_code_fences_are_text() {
        let doc = "## Phase 1: A\n### Context\n```\n## Phase 2: fake\n```\n### Files\n- `a.rs` (modify)\n";
        let phases = parse_document(doc).unwrap();
        assert_eq!(phases.len(), 1);
        assert!(phases[0].context.contains("## Phase 2: fake"));
    }

    #[test]
    fn test_load_source_markdown_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let md = dir.path().join("audit.md");
        std::fs::write(&md, DOC).unwrap();
        let doc = load_source(&md).unwrap();
        assert_eq!(doc.phases.len(), 2);
        assert_eq!(doc.hash, compute_source_hash(DOC.as_bytes()));

        let json = dir.path().join("phases.json");
        std::fs::write(
            &json,
            r#"{"phases": [{"id": "P1", "number": 1, "title": "A",
                "files": [{"path": "a.rs", "action": "modify"}]}]}"#,
        )
        .unwrap();
        assert_eq!(load_source(&json).unwrap().phases[0].title, "A");

        assert!(load_source(&dir.path().join("missing.md")).is_err());
    }
}
