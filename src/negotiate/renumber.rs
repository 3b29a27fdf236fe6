//! Display-order renumbering that never touches derived identity.
//!
//! `number` is positional and reassigned after every structural edit. Only
//! plain phases whose id follows the canonical `P<n>` form have their id
//! rewritten to match; split parts and merge results keep their id forever.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::phase::Phase;

/// Prefix of canonical, number-based phase ids.
pub const CANONICAL_PREFIX: &str = "P";

static CANONICAL_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^P\d+$").unwrap());

/// Canonical id for a display position.
pub fn canonical_id(number: usize) -> String {
    format!("{}{}", CANONICAL_PREFIX, number)
}

pub fn is_canonical_id(id: &str) -> bool {
    CANONICAL_ID_REGEX.is_match(id)
}

fn is_rewritable(phase: &Phase) -> bool {
    !phase.is_derived() && is_canonical_id(&phase.id)
}

/// Reassign `number` to `1..=N` in list order and realign canonical ids.
///
/// A rewritten phase remembers its first id in `original_id`. When the
/// canonical id for a position is held by a derived phase, the plain phase
/// takes the next free canonical id above `N`.
pub fn renumber(phases: &mut [Phase]) {
    let reserved: HashSet<String> = phases
        .iter()
        .filter(|p| !is_rewritable(p))
        .map(|p| p.id.clone())
        .collect();
    let mut assigned: HashSet<String> = HashSet::new();
    let mut next_spare = phases.len() + 1;

    for (index, phase) in phases.iter_mut().enumerate() {
        phase.number = index + 1;
        if !is_rewritable(phase) {
            continue;
        }

        let mut candidate = canonical_id(index + 1);
        while reserved.contains(&candidate) || assigned.contains(&candidate) {
            candidate = canonical_id(next_spare);
            next_spare += 1;
        }

        if candidate != phase.id {
            if phase.original_id.is_none() {
                phase.original_id = Some(phase.id.clone());
            }
            phase.id = candidate.clone();
        }
        assigned.insert(candidate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::SplitLineage;

    fn plain(id: &str) -> Phase {
        Phase::new(id, 0, id)
    }

    fn split_part(parent: &str, ordinal: u32) -> Phase {
        let lineage = SplitLineage::new(parent, ordinal);
        let mut phase = Phase::new(&lineage.display_id(), 0, "part");
        phase.split_from = Some(lineage);
        phase
    }

    #[test]
    fn test_numbers_are_sequential() {
        let mut phases = vec![plain("P3"), plain("P1"), plain("P2")];
        renumber(&mut phases);
        let numbers: Vec<usize> = phases.iter().map(|p| p.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn test_plain_ids_follow_position_and_remember_origin() {
        let mut phases = vec![plain("P2"), plain("P1")];
        renumber(&mut phases);
        assert_eq!(phases[0].id, "P1");
        assert_eq!(phases[0].original_id.as_deref(), Some("P2"));
        assert_eq!(phases[1].id, "P2");
        assert_eq!(phases[1].original_id.as_deref(), Some("P1"));
    }

    #[test]
    fn test_original_id_is_kept_across_rewrites() {
        let mut phases = vec![plain("P2"), plain("P1")];
        renumber(&mut phases);
        phases.swap(0, 1);
        renumber(&mut phases);
        assert_eq!(phases[0].id, "P1");
        assert_eq!(phases[0].original_id.as_deref(), Some("P1"));
    }

    #[test]
    fn test_derived_ids_are_never_rewritten() {
        let mut phases = vec![plain("P1"), split_part("P2", 1), split_part("P2", 2), plain("P3")];
        renumber(&mut phases);
        assert_eq!(phases[1].id, "P2a");
        assert_eq!(phases[2].id, "P2b");
        assert_eq!(phases[3].id, "P4");
        assert_eq!(phases[3].number, 4);
    }

    #[test]
    fn test_non_canonical_plain_ids_are_left_alone() {
        let mut phases = vec![plain("AUTH"), plain("P1")];
        renumber(&mut phases);
        assert_eq!(phases[0].id, "AUTH");
        assert_eq!(phases[1].id, "P2");
    }

    #[test]
    fn test_reserved_canonical_id_pushes_plain_phase_to_spare() {
        let mut merged = Phase::new("P1", 0, "merged");
        merged.merged_from = vec!["P1".into(), "P2".into()];
        let mut phases = vec![plain("P3"), plain("P4"), merged];
        renumber(&mut phases);

        assert_eq!(phases[2].id, "P1");
        assert_ne!(phases[0].id, "P1");
        let ids: HashSet<&str> = phases.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids.len(), 3);
        assert!(phases.iter().all(|p| p.id != "P1" || p.is_derived()));
    }

    #[test]
    fn test_canonical_id_pattern() {
        assert!(is_canonical_id("P12"));
        assert!(!is_canonical_id("P12a"));
        assert!(!is_canonical_id("p1"));
        assert!(!is_canonical_id("P"));
    }
}
