//! Negotiation session state and its append-only operation log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::renumber::renumber;
use super::validate::resolve_phase;
use crate::errors::NegotiationError;
use crate::phase::Phase;

/// Default cap on how much of a replaced value `modify` records in the log.
pub const DEFAULT_OLD_VALUE_CHARS: usize = 80;

/// Kind of a logged operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpType {
    Split,
    Merge,
    Reorder,
    Skip,
    Unskip,
    Modify,
    Reset,
}

impl std::fmt::Display for OpType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpType::Split => write!(f, "split"),
            OpType::Merge => write!(f, "merge"),
            OpType::Reorder => write!(f, "reorder"),
            OpType::Skip => write!(f, "skip"),
            OpType::Unskip => write!(f, "unskip"),
            OpType::Modify => write!(f, "modify"),
            OpType::Reset => write!(f, "reset"),
        }
    }
}

impl std::str::FromStr for OpType {
    type Err = NegotiationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "split" => Ok(OpType::Split),
            "merge" => Ok(OpType::Merge),
            "reorder" | "move" => Ok(OpType::Reorder),
            "skip" => Ok(OpType::Skip),
            "unskip" => Ok(OpType::Unskip),
            "modify" | "edit" => Ok(OpType::Modify),
            "reset" => Ok(OpType::Reset),
            _ => Err(NegotiationError::InvalidInput(format!(
                "unknown operation '{}' (valid: split, merge, reorder, skip, unskip, modify, reset)",
                s
            ))),
        }
    }
}

/// One entry of the operation log. Never edited after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NegotiationOp {
    pub op_type: OpType,
    pub timestamp: DateTime<Utc>,
    pub target_ids: Vec<String>,
    pub params: serde_json::Map<String, serde_json::Value>,
    pub description: String,
}

/// Result of a successfully applied operation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OpOutcome {
    /// Human-readable summary
    pub message: String,
    /// Advisory notes that did not block the operation
    pub warnings: Vec<String>,
    /// Ids of the phases the operation produced or touched
    pub affected_ids: Vec<String>,
}

/// Full negotiation state for one source document.
///
/// `original_phases` is captured once and never mutated. `current_phases`
/// only changes through the operations in `ops.rs`, each of which leaves the
/// state unchanged when it fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NegotiationState {
    pub(crate) session_id: Uuid,
    pub(crate) source_file: PathBuf,
    pub(crate) source_hash: String,
    pub(crate) original_phases: Vec<Phase>,
    pub(crate) current_phases: Vec<Phase>,
    pub(crate) operations: Vec<NegotiationOp>,
    pub(crate) skipped_ids: BTreeSet<String>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) modified_at: DateTime<Utc>,
    #[serde(skip, default = "default_old_value_chars")]
    pub(crate) old_value_chars: usize,
}

fn default_old_value_chars() -> usize {
    DEFAULT_OLD_VALUE_CHARS
}

/// A phase staged for commit together with its skip flag.
///
/// Operations stage the next phase list with skip flags attached so the skip
/// set follows phases through id rewrites during renumbering.
#[derive(Debug, Clone)]
pub(crate) struct Staged {
    pub phase: Phase,
    pub skipped: bool,
}

impl NegotiationState {
    /// Start a session from a parsed phase list.
    ///
    /// The input is ordered by `number`, renumbered to `1..=N`, and deep-copied
    /// into both the original and the current list.
    pub fn new(
        phases: Vec<Phase>,
        source_file: impl Into<PathBuf>,
        source_hash: &str,
    ) -> Result<Self, NegotiationError> {
        let phases = normalize_input(phases)?;
        let now = Utc::now();
        let state = Self {
            session_id: Uuid::new_v4(),
            source_file: source_file.into(),
            source_hash: source_hash.to_string(),
            original_phases: phases.clone(),
            current_phases: phases,
            operations: Vec::new(),
            skipped_ids: BTreeSet::new(),
            created_at: now,
            modified_at: now,
            old_value_chars: DEFAULT_OLD_VALUE_CHARS,
        };
        tracing::info!(
            session = %state.session_id,
            phases = state.current_phases.len(),
            source = %state.source_file.display(),
            "Negotiation session created"
        );
        Ok(state)
    }

    /// Set how many characters of a replaced value `modify` logs.
    pub fn with_old_value_chars(mut self, chars: usize) -> Self {
        self.old_value_chars = chars.max(1);
        self
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn source_file(&self) -> &Path {
        &self.source_file
    }

    pub fn source_hash(&self) -> &str {
        &self.source_hash
    }

    pub fn original_phases(&self) -> &[Phase] {
        &self.original_phases
    }

    pub fn current_phases(&self) -> &[Phase] {
        &self.current_phases
    }

    pub fn operations(&self) -> &[NegotiationOp] {
        &self.operations
    }

    pub fn skipped_ids(&self) -> &BTreeSet<String> {
        &self.skipped_ids
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn modified_at(&self) -> DateTime<Utc> {
        self.modified_at
    }

    pub fn is_skipped(&self, id: &str) -> bool {
        self.skipped_ids.contains(id)
    }

    /// Number of phases that will run.
    pub fn active_count(&self) -> usize {
        self.active_phases().count()
    }

    /// Current phases that are not skipped, in order.
    pub fn active_phases(&self) -> impl Iterator<Item = &Phase> {
        self.current_phases
            .iter()
            .filter(|p| !self.is_skipped(&p.id))
    }

    /// Look up a current phase by id or numeric shorthand.
    pub fn find_phase(&self, reference: &str) -> Result<&Phase, NegotiationError> {
        let index = resolve_phase(&self.current_phases, reference)?;
        Ok(&self.current_phases[index])
    }

    /// Ids removed, added and skipped relative to the original list.
    pub fn diff(&self) -> SessionDiff {
        let original: BTreeSet<&str> = self.original_phases.iter().map(|p| p.id.as_str()).collect();
        let current: BTreeSet<&str> = self.current_phases.iter().map(|p| p.id.as_str()).collect();

        SessionDiff {
            removed: original.difference(&current).map(|s| s.to_string()).collect(),
            added: current.difference(&original).map(|s| s.to_string()).collect(),
            skipped: self.skipped_ids.iter().cloned().collect(),
            original_count: self.original_phases.len(),
            current_count: self.current_phases.len(),
            active_count: self.active_count(),
            operation_count: self.operations.len(),
        }
    }

    /// Verify the at-rest invariants: unique ids, numbers exactly `1..=N`,
    /// skip set within current ids, and at least one file per phase.
    pub fn check_invariants(&self) -> Result<(), String> {
        let mut seen = HashSet::new();
        for (index, phase) in self.current_phases.iter().enumerate() {
            if !seen.insert(phase.id.as_str()) {
                return Err(format!("duplicate phase id {}", phase.id));
            }
            if phase.number != index + 1 {
                return Err(format!(
                    "phase {} has number {} at position {}",
                    phase.id,
                    phase.number,
                    index + 1
                ));
            }
            if phase.files.is_empty() {
                return Err(format!("phase {} has no files", phase.id));
            }
        }
        if let Some(stray) = self.skipped_ids.iter().find(|id| !seen.contains(id.as_str())) {
            return Err(format!("skipped id {} is not a current phase", stray));
        }
        Ok(())
    }

    pub(crate) fn stage(&self) -> Vec<Staged> {
        self.current_phases
            .iter()
            .map(|phase| Staged {
                skipped: self.is_skipped(&phase.id),
                phase: phase.clone(),
            })
            .collect()
    }

    /// Renumber a staged list and install it as the current list.
    ///
    /// Fails without touching state if the staged list would break id
    /// uniqueness or contain a phase without files.
    pub(crate) fn commit(&mut self, staged: Vec<Staged>) -> Result<(), NegotiationError> {
        let (mut phases, flags): (Vec<Phase>, Vec<bool>) =
            staged.into_iter().map(|s| (s.phase, s.skipped)).unzip();
        renumber(&mut phases);

        let mut seen = HashSet::new();
        for phase in &phases {
            if !seen.insert(phase.id.as_str()) {
                return Err(NegotiationError::InvalidInput(format!(
                    "operation would produce duplicate phase id {}",
                    phase.id
                )));
            }
            if phase.files.is_empty() {
                return Err(NegotiationError::InvalidInput(format!(
                    "operation would leave phase {} without files",
                    phase.id
                )));
            }
        }

        self.skipped_ids = phases
            .iter()
            .zip(flags)
            .filter(|(_, skipped)| *skipped)
            .map(|(p, _)| p.id.clone())
            .collect();
        self.current_phases = phases;
        Ok(())
    }

    pub(crate) fn record(
        &mut self,
        op_type: OpType,
        target_ids: Vec<String>,
        params: serde_json::Map<String, serde_json::Value>,
        description: String,
    ) {
        let now = Utc::now();
        tracing::info!(op = %op_type, targets = ?target_ids, "{}", description);
        self.operations.push(NegotiationOp {
            op_type,
            timestamp: now,
            target_ids,
            params,
            description,
        });
        self.modified_at = now;
    }

    pub(crate) fn touch(&mut self) {
        self.modified_at = Utc::now();
    }
}

/// Summary of how the current list differs from the original.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionDiff {
    pub removed: Vec<String>,
    pub added: Vec<String>,
    pub skipped: Vec<String>,
    pub original_count: usize,
    pub current_count: usize,
    pub active_count: usize,
    pub operation_count: usize,
}

fn normalize_input(mut phases: Vec<Phase>) -> Result<Vec<Phase>, NegotiationError> {
    if phases.is_empty() {
        return Err(NegotiationError::EmptyPhaseList);
    }

    let mut ids = HashSet::new();
    let mut numbers = HashSet::new();
    for phase in &phases {
        if phase.id.trim().is_empty() {
            return Err(NegotiationError::InvalidInput(format!(
                "phase {} has an empty id",
                phase.number
            )));
        }
        if !ids.insert(phase.id.clone()) {
            return Err(NegotiationError::InvalidInput(format!(
                "duplicate phase id {}",
                phase.id
            )));
        }
        if phase.number == 0 || !numbers.insert(phase.number) {
            return Err(NegotiationError::InvalidInput(format!(
                "phase {} has a zero or duplicate number {}",
                phase.id, phase.number
            )));
        }
        if phase.title.trim().is_empty() {
            return Err(NegotiationError::InvalidInput(format!(
                "phase {} has an empty title",
                phase.id
            )));
        }
        if phase.files.is_empty() {
            return Err(NegotiationError::InvalidInput(format!(
                "phase {} lists no files",
                phase.id
            )));
        }
    }

    phases.sort_by_key(|p| p.number);
    renumber(&mut phases);
    // the normalized id is the phase's original identity for this session
    for phase in &mut phases {
        phase.original_id = None;
    }
    Ok(phases)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::{FileAction, FileChange};

    fn phase(id: &str, number: usize, files: usize) -> Phase {
        let files = (0..files)
            .map(|i| FileChange::new(&format!("{id}/{i}.rs"), FileAction::Modify, ""))
            .collect();
        Phase::new(id, number, &format!("Phase {id}")).with_files(files)
    }

    #[test]
    fn test_new_rejects_empty_list() {
        let err = NegotiationState::new(vec![], "audit.md", "abc").unwrap_err();
        assert_eq!(err, NegotiationError::EmptyPhaseList);
    }

    #[test]
    fn test_new_rejects_duplicate_ids_and_empty_titles() {
        let dup = vec![phase("P1", 1, 1), phase("P1", 2, 1)];
        assert!(matches!(
            NegotiationState::new(dup, "audit.md", "abc"),
            Err(NegotiationError::InvalidInput(_))
        ));

        let mut untitled = phase("P1", 1, 1);
        untitled.title = "  ".into();
        assert!(NegotiationState::new(vec![untitled], "audit.md", "abc").is_err());
    }

    #[test]
    fn test_new_rejects_phase_without_files() {
        let result = NegotiationState::new(vec![phase("P1", 1, 0)], "audit.md", "abc");
        assert!(matches!(result, Err(NegotiationError::InvalidInput(_))));
    }

    #[test]
    fn test_new_orders_by_number_and_copies_lists() {
        let state =
            NegotiationState::new(vec![phase("P2", 2, 1), phase("P1", 1, 1)], "audit.md", "abc")
                .unwrap();
        let ids: Vec<&str> = state.current_phases().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["P1", "P2"]);
        assert_eq!(state.original_phases(), state.current_phases());
        assert!(state.operations().is_empty());
        assert!(state.check_invariants().is_ok());
    }

    #[test]
    fn test_new_closes_number_gaps() {
        let state =
            NegotiationState::new(vec![phase("P1", 1, 1), phase("P5", 5, 1)], "audit.md", "abc")
                .unwrap();
        assert_eq!(state.current_phases()[1].number, 2);
        assert_eq!(state.current_phases()[1].id, "P2");
        assert!(state.original_phases()[1].original_id.is_none());
        assert_eq!(state.original_phases()[1].root_ids(), vec!["P2"]);
    }

    #[test]
    fn test_commit_rejects_duplicate_derived_ids_without_mutating() {
        let mut state =
            NegotiationState::new(vec![phase("P1", 1, 1), phase("P2", 2, 1)], "audit.md", "abc")
                .unwrap();
        let before = state.clone();

        let mut staged = state.stage();
        for s in staged.iter_mut() {
            s.phase.id = "X".into();
            s.phase.merged_from = vec!["P1".into()];
        }
        assert!(state.commit(staged).is_err());
        assert_eq!(state, before);
    }

    #[test]
    fn test_op_type_round_trips_through_str() {
        for op in [
            OpType::Split,
            OpType::Merge,
            OpType::Reorder,
            OpType::Skip,
            OpType::Unskip,
            OpType::Modify,
            OpType::Reset,
        ] {
            assert_eq!(op.to_string().parse::<OpType>().unwrap(), op);
        }
        assert!("explode".parse::<OpType>().is_err());
    }

    #[test]
    fn test_active_phases_leave_out_skipped() {
        let mut state = NegotiationState::new(
            vec![phase("P1", 1, 1), phase("P2", 2, 1), phase("P3", 3, 1)],
            "audit.md",
            "abc",
        )
        .unwrap();
        state.skipped_ids.insert("P2".to_string());

        let active: Vec<&str> = state.active_phases().map(|p| p.id.as_str()).collect();
        assert_eq!(active, vec!["P1", "P3"]);
        assert_eq!(state.active_count(), 2);
    }

    #[test]
    fn test_diff_of_fresh_session_is_empty() {
        let state = NegotiationState::new(vec![phase("P1", 1, 1)], "audit.md", "abc").unwrap();
        let diff = state.diff();
        assert!(diff.removed.is_empty());
        assert!(diff.added.is_empty());
        assert_eq!(diff.active_count, 1);
        assert_eq!(diff.operation_count, 0);
    }
}
