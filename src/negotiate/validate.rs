//! Pure precondition checks run before any mutation.
//!
//! Nothing here touches session state; every function either returns the
//! resolved indices the operation needs or the error to surface verbatim.

use std::collections::BTreeSet;

use crate::errors::NegotiationError;
use crate::phase::Phase;

/// Resolve a phase reference to its index in `phases`.
///
/// Tries the exact id, then a case-insensitive id, then numeric shorthand
/// (`"3"` or `"#3"` for the phase numbered 3).
pub fn resolve_phase(phases: &[Phase], reference: &str) -> Result<usize, NegotiationError> {
    let reference = reference.trim();
    if let Some(index) = phases.iter().position(|p| p.id == reference) {
        return Ok(index);
    }
    if let Some(index) = phases
        .iter()
        .position(|p| p.id.eq_ignore_ascii_case(reference))
    {
        return Ok(index);
    }
    if let Ok(number) = reference.trim_start_matches('#').parse::<usize>()
        && let Some(index) = phases.iter().position(|p| p.number == number)
    {
        return Ok(index);
    }

    Err(NegotiationError::NotFound {
        reference: reference.to_string(),
        available: phases.iter().map(|p| p.id.clone()).collect(),
    })
}

/// A 1-based target position must lie within `1..=len`.
pub fn validate_position(position: usize, len: usize) -> Result<(), NegotiationError> {
    if position == 0 || position > len {
        return Err(NegotiationError::OutOfRange {
            position,
            min: 1,
            max: len,
        });
    }
    Ok(())
}

pub fn validate_splittable(phase: &Phase) -> Result<(), NegotiationError> {
    if phase.files.len() < 2 {
        return Err(NegotiationError::NotSplittable {
            id: phase.id.clone(),
            file_count: phase.files.len(),
        });
    }
    Ok(())
}

/// Normalize split cut points for `phase`.
///
/// Each point is a file index the new part starts at, so it must lie in
/// `1..file_count`. Returns the points sorted with duplicates removed; an
/// empty request means "cut before every file".
pub fn validate_cut_points(phase: &Phase, cuts: &[usize]) -> Result<Vec<usize>, NegotiationError> {
    validate_splittable(phase)?;
    let file_count = phase.files.len();

    if cuts.is_empty() {
        return Ok((1..file_count).collect());
    }

    let mut normalized = BTreeSet::new();
    for &cut in cuts {
        if cut == 0 || cut >= file_count {
            return Err(NegotiationError::OutOfRange {
                position: cut,
                min: 1,
                max: file_count - 1,
            });
        }
        normalized.insert(cut);
    }
    Ok(normalized.into_iter().collect())
}

/// Resolve merge targets to distinct indices in list order.
pub fn validate_mergeable(
    phases: &[Phase],
    references: &[String],
) -> Result<Vec<usize>, NegotiationError> {
    let mut indices = BTreeSet::new();
    for reference in references {
        indices.insert(resolve_phase(phases, reference)?);
    }
    if indices.len() < 2 {
        return Err(NegotiationError::InsufficientTargets {
            given: indices.len(),
        });
    }
    Ok(indices.into_iter().collect())
}

/// Advisory: whether the phases at `indices` have contiguous numbers.
pub fn is_consecutive(phases: &[Phase], indices: &[usize]) -> bool {
    let mut numbers: Vec<usize> = indices.iter().map(|&i| phases[i].number).collect();
    numbers.sort_unstable();
    numbers.windows(2).all(|w| w[1] == w[0] + 1)
}

/// Advisory: phases that share at least one file path with the moved phase
/// and either swap order with it or end up ahead of it.
pub fn reorder_conflicts(phases: &[Phase], from: usize, to: usize) -> Vec<String> {
    let moved = &phases[from];
    let passed = if to < from { to..from } else { from + 1..to + 1 };
    phases
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != from)
        .filter(|&(i, _)| {
            // position among the remaining phases once the moved one is taken out
            let rest = if i < from { i } else { i - 1 };
            passed.contains(&i) || rest < to
        })
        .filter(|(_, other)| moved.shares_files_with(other))
        .map(|(_, other)| other.id.clone())
        .collect()
}
