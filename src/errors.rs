//! Typed error hierarchy for phase negotiation.
//!
//! Two top-level enums cover the two failure domains:
//! - `NegotiationError`: recoverable validation failures; the session is
//!   left untouched and the caller may correct the request and retry
//! - `StoreError`: session record I/O and decoding failures

use thiserror::Error;

/// Errors from validating or applying a negotiation operation.
///
/// Every variant carries enough context (the offending value and the valid
/// range or set) for the caller to correct the request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NegotiationError {
    #[error("Phase '{reference}' not found (available: {})", available.join(", "))]
    NotFound {
        reference: String,
        available: Vec<String>,
    },

    #[error("Position {position} is out of range (valid: {min}..={max})")]
    OutOfRange {
        position: usize,
        min: usize,
        max: usize,
    },

    #[error("Phase {id} has {file_count} file(s); at least 2 are needed to split")]
    NotSplittable { id: String, file_count: usize },

    #[error("Merge needs at least 2 distinct phases, got {given}")]
    InsufficientTargets { given: usize },

    #[error(
        "Phases {} are not consecutive (numbers {}); confirm to merge anyway",
        ids.join(", "),
        numbers.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(", ")
    )]
    NonConsecutiveMerge { ids: Vec<String>, numbers: Vec<usize> },

    #[error("Phase {id} is already skipped")]
    AlreadySkipped { id: String },

    #[error("Phase {id} is not skipped")]
    NotSkipped { id: String },

    #[error("Field '{field}' cannot be modified (modifiable: {})", valid.join(", "))]
    NotModifiable { field: String, valid: Vec<String> },

    #[error("Phase {id} does not exist in the original phase list")]
    NotInOriginal { id: String },

    #[error("Cannot start a negotiation session with zero phases")]
    EmptyPhaseList,

    #[error("Invalid phase input: {0}")]
    InvalidInput(String),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
}

/// Errors from the session store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to access session record at {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed session record at {path}: {source}")]
    Parse {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Session record at {path} is inconsistent: {message}")]
    Invalid {
        path: std::path::PathBuf,
        message: String,
    },

    #[error("Failed to serialize session: {0}")]
    Serialize(#[source] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_lists_available_ids() {
        let err = NegotiationError::NotFound {
            reference: "P9".to_string(),
            available: vec!["P1".into(), "P2".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("P9"));
        assert!(msg.contains("P1, P2"));
    }

    #[test]
    fn out_of_range_carries_bounds() {
        let err = NegotiationError::OutOfRange {
            position: 7,
            min: 1,
            max: 3,
        };
        match &err {
            NegotiationError::OutOfRange { position, min, max } => {
                assert_eq!((*position, *min, *max), (7, 1, 3));
            }
            _ => panic!("Expected OutOfRange"),
        }
        assert!(err.to_string().contains("1..=3"));
    }

    #[test]
    fn non_consecutive_merge_renders_numbers() {
        let err = NegotiationError::NonConsecutiveMerge {
            ids: vec!["P1".into(), "P3".into()],
            numbers: vec![1, 3],
        };
        assert!(err.to_string().contains("numbers 1, 3"));
    }

    #[test]
    fn store_error_parse_carries_path() {
        use std::path::PathBuf;
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = StoreError::Parse {
            path: PathBuf::from("/sessions/abc.json"),
            source,
        };
        match &err {
            StoreError::Parse { path, .. } => assert_eq!(path, &PathBuf::from("/sessions/abc.json")),
            _ => panic!("Expected Parse"),
        }
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&NegotiationError::EmptyPhaseList);
        assert_std_error(&StoreError::Serialize(
            serde_json::from_str::<serde_json::Value>("x").unwrap_err(),
        ));
    }
}
