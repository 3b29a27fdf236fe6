//! JSON session records keyed by a hash of the source document.

use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

use super::state::NegotiationState;
use crate::errors::StoreError;

/// Length of the hex prefix used as a record key.
const KEY_LEN: usize = 16;

/// Record key for a source document: first 16 hex chars of its SHA-256.
pub fn compute_source_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let result = hasher.finalize();
    format!("{:x}", result)[..KEY_LEN].to_string()
}

/// Directory of saved negotiation sessions, one file per source hash.
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn record_path(&self, source_hash: &str) -> PathBuf {
        self.dir.join(format!("{}.json", source_hash))
    }

    /// Persist `state`, refreshing its `modified_at`.
    ///
    /// The record is written next to its final path and renamed into place so
    /// a crash never leaves a half-written file behind.
    pub fn save(&self, state: &mut NegotiationState) -> Result<PathBuf, StoreError> {
        state.touch();
        let path = self.record_path(state.source_hash());
        let content = serde_json::to_string_pretty(state).map_err(StoreError::Serialize)?;

        fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;

        tracing::debug!(
            session = %state.session_id(),
            path = %path.display(),
            operations = state.operations().len(),
            "Session saved"
        );
        Ok(path)
    }

    /// Load the record for `source_hash`, or `None` when there is none.
    pub fn load(&self, source_hash: &str) -> Result<Option<NegotiationState>, StoreError> {
        let path = self.record_path(source_hash);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        let state: NegotiationState = serde_json::from_str(&content)
            .map_err(|source| StoreError::Parse {
                path: path.clone(),
                source,
            })?;

        state
            .check_invariants()
            .map_err(|message| StoreError::Invalid {
                path: path.clone(),
                message,
            })?;
        if state.source_hash() != source_hash {
            return Err(StoreError::Invalid {
                path,
                message: format!(
                    "record is for source hash {}, expected {}",
                    state.source_hash(),
                    source_hash
                ),
            });
        }

        tracing::debug!(
            session = %state.session_id(),
            operations = state.operations().len(),
            "Session loaded"
        );
        Ok(Some(state))
    }

    /// Remove the record for `source_hash`. Returns whether one existed.
    pub fn delete(&self, source_hash: &str) -> Result<bool, StoreError> {
        let path = self.record_path(source_hash);
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!(path = %path.display(), "Session discarded");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }
}
