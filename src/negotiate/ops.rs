//! The six negotiation operations.
//!
//! Every operation validates first, builds the next phase list on a staged
//! copy, and only then commits and logs. A returned error always means the
//! session is exactly as it was before the call.

use serde_json::{Map, Value, json};
use std::collections::BTreeSet;

use super::field::{FieldValue, ModifiableField};
use super::state::{NegotiationState, OpOutcome, OpType, Staged};
use super::validate::{
    is_consecutive, reorder_conflicts, resolve_phase, validate_cut_points, validate_mergeable,
    validate_position, validate_splittable,
};
use crate::errors::NegotiationError;
use crate::phase::{Phase, SplitLineage};

/// What a reset applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetScope {
    /// Discard every edit and start a fresh session
    All,
    /// Restore one original phase by id
    Phase(String),
}

impl std::str::FromStr for ResetScope {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            Ok(ResetScope::All)
        } else {
            Ok(ResetScope::Phase(s.to_string()))
        }
    }
}

fn params(pairs: impl IntoIterator<Item = (&'static str, Value)>) -> Map<String, Value> {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

fn truncate_chars(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        return value.to_string();
    }
    let kept: String = value.chars().take(max).collect();
    format!("{}...", kept)
}

impl NegotiationState {
    /// Split a phase into parts at the given file indices.
    ///
    /// `split_at` lists the file index each new part starts at; `None` or an
    /// empty list cuts before every file.
    pub fn split(
        &mut self,
        reference: &str,
        split_at: Option<&[usize]>,
    ) -> Result<OpOutcome, NegotiationError> {
        let index = resolve_phase(&self.current_phases, reference)?;
        let original = &self.current_phases[index];
        validate_splittable(original)?;
        let cuts = validate_cut_points(original, split_at.unwrap_or(&[]))?;

        let mut bounds = Vec::with_capacity(cuts.len() + 2);
        bounds.push(0);
        bounds.extend(cuts.iter().copied());
        bounds.push(original.files.len());
        let part_count = bounds.len() - 1;

        let taken: BTreeSet<&str> = self
            .current_phases
            .iter()
            .filter(|p| p.id != original.id)
            .map(|p| p.id.as_str())
            .collect();
        let mut ordinal = self
            .current_phases
            .iter()
            .filter_map(|p| p.split_from.as_ref())
            .filter(|l| l.parent == original.id)
            .map(|l| l.ordinal)
            .max()
            .unwrap_or(0);

        let origins: Vec<String> = original.root_ids().into_iter().map(String::from).collect();
        let mut parts = Vec::with_capacity(part_count);
        for (i, window) in bounds.windows(2).enumerate() {
            let first = i == 0;
            let last = i + 1 == part_count;

            let lineage = loop {
                ordinal += 1;
                let candidate = SplitLineage::new(&original.id, ordinal);
                if !taken.contains(candidate.display_id().as_str()) {
                    break candidate;
                }
            };

            let goal = if first || original.goal.is_empty() {
                original.goal.clone()
            } else {
                format!("(continued) {}", original.goal)
            };

            parts.push(Phase {
                id: lineage.display_id(),
                number: 0,
                title: format!("{} (part {}/{})", original.title, i + 1, part_count),
                context: original.context.clone(),
                goal,
                files: original.files[window[0]..window[1]].to_vec(),
                plan: if first { original.plan.clone() } else { Vec::new() },
                verification: if last {
                    original.verification.clone()
                } else {
                    Vec::new()
                },
                acceptance_criteria: if last {
                    original.acceptance_criteria.clone()
                } else {
                    Vec::new()
                },
                rollback: original.rollback.clone(),
                original_id: None,
                split_from: Some(lineage),
                merged_from: Vec::new(),
                origins: origins.clone(),
            });
        }

        let original_id = original.id.clone();
        let new_ids: Vec<String> = parts.iter().map(|p| p.id.clone()).collect();
        let mut staged = self.stage();
        let was_skipped = staged[index].skipped;
        staged.splice(
            index..=index,
            parts.into_iter().map(|phase| Staged {
                phase,
                skipped: was_skipped,
            }),
        );
        self.commit(staged)?;

        let description = format!(
            "Split {} into {} phases: {}",
            original_id,
            part_count,
            new_ids.join(", ")
        );
        self.record(
            OpType::Split,
            vec![original_id],
            params([
                ("split_at", json!(cuts)),
                ("new_count", json!(part_count)),
                ("new_ids", json!(new_ids)),
            ]),
            description.clone(),
        );

        Ok(OpOutcome {
            message: description,
            warnings: Vec::new(),
            affected_ids: new_ids,
        })
    }

    /// Merge two or more phases into the position of the lowest-numbered one.
    ///
    /// Non-consecutive targets fail with `NonConsecutiveMerge` unless `force`
    /// is set; the caller decides whether to confirm and retry.
    pub fn merge(
        &mut self,
        references: &[String],
        force: bool,
    ) -> Result<OpOutcome, NegotiationError> {
        let indices = validate_mergeable(&self.current_phases, references)?;
        let consecutive = is_consecutive(&self.current_phases, &indices);
        if !consecutive && !force {
            return Err(NegotiationError::NonConsecutiveMerge {
                ids: indices
                    .iter()
                    .map(|&i| self.current_phases[i].id.clone())
                    .collect(),
                numbers: indices
                    .iter()
                    .map(|&i| self.current_phases[i].number)
                    .collect(),
            });
        }

        let sources: Vec<&Phase> = indices.iter().map(|&i| &self.current_phases[i]).collect();
        let first = sources[0];
        let source_ids: Vec<String> = sources.iter().map(|p| p.id.clone()).collect();

        let mut origins: Vec<String> = Vec::new();
        for source in &sources {
            for root in source.root_ids() {
                if !origins.iter().any(|o| o == root) {
                    origins.push(root.to_string());
                }
            }
        }

        let merged = Phase {
            id: first.id.clone(),
            number: 0,
            title: format!("{} (merged)", first.title),
            context: first.context.clone(),
            goal: first.goal.clone(),
            files: sources.iter().flat_map(|p| p.files.iter().cloned()).collect(),
            plan: sources.iter().flat_map(|p| p.plan.iter().cloned()).collect(),
            verification: sources
                .iter()
                .flat_map(|p| p.verification.iter().cloned())
                .collect(),
            acceptance_criteria: sources
                .iter()
                .flat_map(|p| p.acceptance_criteria.iter().cloned())
                .collect(),
            rollback: sources
                .iter()
                .flat_map(|p| p.rollback.iter().cloned())
                .collect(),
            original_id: None,
            split_from: None,
            merged_from: source_ids.clone(),
            origins,
        };
        let merged_id = merged.id.clone();

        let staged = self.stage();
        let all_skipped = indices.iter().all(|&i| staged[i].skipped);
        let mut merged = Some(merged);
        let mut next = Vec::with_capacity(staged.len() - indices.len() + 1);
        for (i, entry) in staged.into_iter().enumerate() {
            if i == indices[0] {
                if let Some(phase) = merged.take() {
                    next.push(Staged {
                        phase,
                        skipped: all_skipped,
                    });
                }
            } else if !indices.contains(&i) {
                next.push(entry);
            }
        }
        self.commit(next)?;

        let description = format!(
            "Merged {} into {}",
            source_ids.join(", "),
            merged_id
        );
        let mut warnings = Vec::new();
        if !consecutive {
            warnings.push("Merged phases were not consecutive".to_string());
        }
        self.record(
            OpType::Merge,
            source_ids,
            params([("merged_id", json!(merged_id)), ("forced", json!(!consecutive))]),
            description.clone(),
        );

        Ok(OpOutcome {
            message: description,
            warnings,
            affected_ids: vec![merged_id],
        })
    }

    /// Move a phase to a 1-based position.
    pub fn reorder(
        &mut self,
        reference: &str,
        new_position: usize,
    ) -> Result<OpOutcome, NegotiationError> {
        let from = resolve_phase(&self.current_phases, reference)?;
        validate_position(new_position, self.current_phases.len())?;
        let to = new_position - 1;

        let moved_id = self.current_phases[from].id.clone();
        let conflicts = reorder_conflicts(&self.current_phases, from, to);

        let mut staged = self.stage();
        let entry = staged.remove(from);
        staged.insert(to, entry);
        self.commit(staged)?;

        let current_id = self.current_phases[to].id.clone();
        let warnings: Vec<String> = conflicts
            .iter()
            .map(|other| {
                format!(
                    "{} and {} touch the same files; check the new order",
                    current_id, other
                )
            })
            .collect();
        for warning in &warnings {
            tracing::warn!("{}", warning);
        }

        let description = format!("Moved {} from position {} to {}", moved_id, from + 1, new_position);
        self.record(
            OpType::Reorder,
            vec![moved_id],
            params([("from", json!(from + 1)), ("to", json!(new_position))]),
            description.clone(),
        );

        Ok(OpOutcome {
            message: description,
            warnings,
            affected_ids: vec![current_id],
        })
    }

    /// Exclude a phase from execution and export without removing it.
    pub fn skip(&mut self, reference: &str) -> Result<OpOutcome, NegotiationError> {
        let index = resolve_phase(&self.current_phases, reference)?;
        let id = self.current_phases[index].id.clone();
        if self.skipped_ids.contains(&id) {
            return Err(NegotiationError::AlreadySkipped { id });
        }

        self.skipped_ids.insert(id.clone());
        let description = format!("Skipped {}", id);
        self.record(OpType::Skip, vec![id.clone()], Map::new(), description.clone());

        Ok(OpOutcome {
            message: description,
            warnings: Vec::new(),
            affected_ids: vec![id],
        })
    }

    pub fn unskip(&mut self, reference: &str) -> Result<OpOutcome, NegotiationError> {
        let index = resolve_phase(&self.current_phases, reference)?;
        let id = self.current_phases[index].id.clone();
        if !self.skipped_ids.remove(&id) {
            return Err(NegotiationError::NotSkipped { id });
        }

        let description = format!("Unskipped {}", id);
        self.record(OpType::Unskip, vec![id.clone()], Map::new(), description.clone());

        Ok(OpOutcome {
            message: description,
            warnings: Vec::new(),
            affected_ids: vec![id],
        })
    }

    /// Overwrite one editable field of a phase.
    pub fn modify(
        &mut self,
        reference: &str,
        field: ModifiableField,
        value: FieldValue,
    ) -> Result<OpOutcome, NegotiationError> {
        let index = resolve_phase(&self.current_phases, reference)?;
        let phase = &mut self.current_phases[index];
        let id = phase.id.clone();

        let old_value = truncate_chars(&field.read(phase).render(), self.old_value_chars);
        field.write(phase, value);

        let description = format!("Modified {} of {}", field, id);
        self.record(
            OpType::Modify,
            vec![id.clone()],
            params([
                ("field", json!(field.as_str())),
                ("old_value", json!(old_value)),
            ]),
            description.clone(),
        );

        Ok(OpOutcome {
            message: description,
            warnings: Vec::new(),
            affected_ids: vec![id],
        })
    }

    /// `modify` taking the field name and value as raw text.
    pub fn modify_named(
        &mut self,
        reference: &str,
        field: &str,
        raw_value: &str,
    ) -> Result<OpOutcome, NegotiationError> {
        let field: ModifiableField = field.parse()?;
        self.modify(reference, field, FieldValue::parse_for(field, raw_value))
    }

    /// Reset everything, or restore a single original phase.
    pub fn reset(&mut self, scope: &ResetScope) -> Result<OpOutcome, NegotiationError> {
        match scope {
            ResetScope::All => Ok(self.reset_all()),
            ResetScope::Phase(reference) => self.reset_phase(reference),
        }
    }

    /// Replace this session with a fresh one built from the original list.
    ///
    /// The discarded log is not carried over; the new session gets a new id.
    fn reset_all(&mut self) -> OpOutcome {
        let discarded = self.operations.len();
        let previous = self.session_id;
        let fresh = NegotiationState {
            session_id: uuid::Uuid::new_v4(),
            source_file: self.source_file.clone(),
            source_hash: self.source_hash.clone(),
            original_phases: self.original_phases.clone(),
            current_phases: self.original_phases.clone(),
            operations: Vec::new(),
            skipped_ids: BTreeSet::new(),
            created_at: chrono::Utc::now(),
            modified_at: chrono::Utc::now(),
            old_value_chars: self.old_value_chars,
        };
        *self = fresh;

        tracing::info!(
            previous_session = %previous,
            session = %self.session_id,
            discarded_operations = discarded,
            "Session reset to original phases"
        );

        OpOutcome {
            message: format!(
                "Reset all phases to original ({} operation(s) discarded)",
                discarded
            ),
            warnings: Vec::new(),
            affected_ids: self.current_phases.iter().map(|p| p.id.clone()).collect(),
        }
    }

    fn reset_phase(&mut self, reference: &str) -> Result<OpOutcome, NegotiationError> {
        let reference = reference.trim();
        let original_index = self
            .original_phases
            .iter()
            .position(|p| p.id == reference)
            .or_else(|| {
                reference
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| self.original_phases.iter().position(|p| p.number == n))
            })
            .ok_or_else(|| NegotiationError::NotInOriginal {
                id: reference.to_string(),
            })?;
        let original = self.original_phases[original_index].clone();
        let root = original.id.clone();

        let staged = self.stage();
        let first_match = staged.iter().position(|s| s.phase.descends_from(&root));
        let mut replaced = Vec::new();
        let mut next = Vec::with_capacity(staged.len() + 1);

        match first_match {
            Some(target) => {
                for (i, entry) in staged.into_iter().enumerate() {
                    if i == target {
                        replaced.push(entry.phase.id);
                        next.push(Staged {
                            phase: original.clone(),
                            skipped: false,
                        });
                    } else if entry.phase.root_ids() == [root.as_str()] {
                        replaced.push(entry.phase.id);
                    } else {
                        next.push(entry);
                    }
                }
            }
            None => {
                next = staged;
                let at = original_index.min(next.len());
                next.insert(
                    at,
                    Staged {
                        phase: original,
                        skipped: false,
                    },
                );
            }
        }
        self.commit(next)?;

        let restored_id = self
            .current_phases
            .iter()
            .find(|p| p.descends_from(&root) && !p.is_derived())
            .map(|p| p.id.clone())
            .unwrap_or_else(|| root.clone());

        let description = if replaced.is_empty() {
            format!("Restored {} from original", root)
        } else {
            format!("Reset {} to original (replaced {})", root, replaced.join(", "))
        };
        self.record(
            OpType::Reset,
            vec![root.clone()],
            params([("scope", json!(root)), ("replaced", json!(replaced))]),
            description.clone(),
        );

        Ok(OpOutcome {
            message: description,
            warnings: Vec::new(),
            affected_ids: vec![restored_id],
        })
    }
}
