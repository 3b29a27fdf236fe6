//! Phase definition and JSON loading for phase negotiation.
//!
//! This module provides:
//! - `Phase` struct representing a single audit phase
//! - `FileChange` and `FileAction` describing the files a phase touches
//! - `SplitLineage`, the record a split part carries back to its parent
//! - `PhasesFile` for JSON-based phase lists

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// What a phase does to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileAction {
    Create,
    Modify,
    Delete,
}

impl std::fmt::Display for FileAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileAction::Create => write!(f, "create"),
            FileAction::Modify => write!(f, "modify"),
            FileAction::Delete => write!(f, "delete"),
        }
    }
}

impl std::str::FromStr for FileAction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "create" | "new" | "add" => Ok(FileAction::Create),
            "modify" | "update" | "edit" => Ok(FileAction::Modify),
            "delete" | "remove" => Ok(FileAction::Delete),
            _ => anyhow::bail!(
                "Invalid file action '{}'. Valid values: create, modify, delete",
                s
            ),
        }
    }
}

/// One file touched by a phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    /// Path relative to the audited project
    pub path: String,
    pub action: FileAction,
    #[serde(default)]
    pub description: String,
}

impl FileChange {
    pub fn new(path: &str, action: FileAction, description: &str) -> Self {
        Self {
            path: path.to_string(),
            action,
            description: description.to_string(),
        }
    }
}

/// Lineage of a phase produced by splitting another phase.
///
/// The printable id of a split part is derived from this record rather than
/// stored independently, so identity and display never drift apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitLineage {
    /// Id of the phase that was split
    pub parent: String,
    /// 1-based position of this part among its siblings
    pub ordinal: u32,
}

impl SplitLineage {
    pub fn new(parent: &str, ordinal: u32) -> Self {
        Self {
            parent: parent.to_string(),
            ordinal,
        }
    }

    /// Display id of this part: `P2` + 1 → `P2a`, `P2a` + 2 → `P2a.b`.
    pub fn display_id(&self) -> String {
        let separator = if self.parent.ends_with(|c: char| c.is_ascii_alphabetic()) {
            "."
        } else {
            ""
        };
        format!(
            "{}{}{}",
            self.parent,
            separator,
            ordinal_letters(self.ordinal)
        )
    }
}

/// Bijective base-26 letters: 1 → `a`, 26 → `z`, 27 → `aa`.
pub fn ordinal_letters(ordinal: u32) -> String {
    let mut n = ordinal.max(1);
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'a' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Represents a single audit phase.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Phase {
    /// Stable identity (e.g., "P3", "P3a")
    pub id: String,
    /// Display position, 1-based
    pub number: usize,
    pub title: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub files: Vec<FileChange>,
    #[serde(default)]
    pub plan: Vec<String>,
    #[serde(default)]
    pub verification: Vec<String>,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    #[serde(default)]
    pub rollback: Vec<String>,
    /// First identity this phase had, when renumbering rewrote its id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_id: Option<String>,
    /// Set when this phase is a part of a split
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split_from: Option<SplitLineage>,
    /// Ids of the phases merged into this one, in merge order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub merged_from: Vec<String>,
    /// Original phase ids this phase descends from (empty when untouched)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub origins: Vec<String>,
}

impl Phase {
    /// Create a phase with the given identity and no content.
    pub fn new(id: &str, number: usize, title: &str) -> Self {
        Self {
            id: id.to_string(),
            number,
            title: title.to_string(),
            context: String::new(),
            goal: String::new(),
            files: Vec::new(),
            plan: Vec::new(),
            verification: Vec::new(),
            acceptance_criteria: Vec::new(),
            rollback: Vec::new(),
            original_id: None,
            split_from: None,
            merged_from: Vec::new(),
            origins: Vec::new(),
        }
    }

    /// Builder-style helper to attach files.
    pub fn with_files(mut self, files: Vec<FileChange>) -> Self {
        self.files = files;
        self
    }

    /// A phase is derived when it came out of a split or a merge.
    #[inline]
    pub fn is_derived(&self) -> bool {
        self.split_from.is_some() || !self.merged_from.is_empty()
    }

    /// Original ids this phase traces back to.
    pub fn root_ids(&self) -> Vec<&str> {
        if !self.origins.is_empty() {
            return self.origins.iter().map(String::as_str).collect();
        }
        vec![self.original_id.as_deref().unwrap_or(&self.id)]
    }

    /// Whether this phase is, or descends from, the given original id.
    pub fn descends_from(&self, original_id: &str) -> bool {
        self.root_ids().contains(&original_id)
    }

    /// Whether any file path is shared with `other`.
    pub fn shares_files_with(&self, other: &Phase) -> bool {
        self.files
            .iter()
            .any(|f| other.files.iter().any(|o| o.path == f.path))
    }

    /// Short lineage annotation for listings, e.g. "split from P2".
    pub fn lineage_label(&self) -> Option<String> {
        if let Some(lineage) = &self.split_from {
            Some(format!("split from {}", lineage.parent))
        } else if !self.merged_from.is_empty() {
            Some(format!("merged from {}", self.merged_from.join(", ")))
        } else {
            None
        }
    }
}

/// Represents a JSON phase list, the non-markdown source format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhasesFile {
    pub phases: Vec<Phase>,
}

impl PhasesFile {
    /// Parse phases from JSON text.
    pub fn parse(content: &str) -> Result<Self> {
        let phases_file: PhasesFile = serde_json::from_str(content)?;
        Ok(phases_file)
    }
}
