//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module   | Commands handled                                                   |
//! |----------|--------------------------------------------------------------------|
//! | `view`   | `List`, `Show`, `History`, `Diff`, `Status`, `Export`              |
//! | `edit`   | `Split`, `Merge`, `Reorder`, `Skip`, `Unskip`, `Modify`, `Reset`, `Batch`, `Discard` |
//! | `config` | `Config`                                                           |

pub mod config;
pub mod edit;
pub mod view;

pub use config::cmd_config;
pub use edit::{
    cmd_batch, cmd_discard, cmd_merge, cmd_modify, cmd_reorder, cmd_reset, cmd_skip, cmd_split,
    cmd_unskip,
};
pub use view::{cmd_diff, cmd_export, cmd_history, cmd_list, cmd_show, cmd_status};

use anyhow::{Context, Result};
use console::style;
use std::path::{Path, PathBuf};

use forge_negotiate::config::NegotiateConfig;
use forge_negotiate::negotiate::{
    NegotiationState, OpOutcome, SessionStore, compute_source_hash,
};
use forge_negotiate::parser::load_source;
use forge_negotiate::ui::icons::{CHECK, WARN};

use super::Cli;

/// A negotiation session opened for one command.
pub struct Session {
    pub config: NegotiateConfig,
    pub store: SessionStore,
    pub state: NegotiationState,
    pub source_path: PathBuf,
    /// Whether the session came from a saved record
    pub resumed: bool,
}

/// Resolved configuration, store and source path, before anything is read.
pub struct SessionLocation {
    pub config: NegotiateConfig,
    pub store: SessionStore,
    pub source_path: PathBuf,
}

impl SessionLocation {
    pub fn resolve(project_dir: &Path, cli: &Cli) -> Result<Self> {
        let config = NegotiateConfig::with_cli_args(
            project_dir.to_path_buf(),
            cli.source.clone(),
            cli.session_dir.clone(),
            cli.yes,
        )?;
        for warning in config.validate() {
            tracing::warn!("{}", warning);
        }

        let source_path = config.source_file()?;
        let store = SessionStore::new(config.session_dir());
        Ok(Self {
            config,
            store,
            source_path,
        })
    }

    /// Record key of the source document, computed from its raw bytes only.
    pub fn source_hash(&self) -> Result<String> {
        let bytes = std::fs::read(&self.source_path).with_context(|| {
            format!("Failed to read source document: {}", self.source_path.display())
        })?;
        Ok(compute_source_hash(&bytes))
    }
}

impl Session {
    /// Resolve configuration, read the source document, and resume its saved
    /// session or start a new one.
    pub fn open(project_dir: &Path, cli: &Cli) -> Result<Self> {
        let SessionLocation {
            config,
            store,
            source_path,
        } = SessionLocation::resolve(project_dir, cli)?;
        let source = load_source(&source_path)?;

        let saved = store
            .load(&source.hash)
            .with_context(|| format!("Failed to load session for {}", source_path.display()))?;
        let resumed = saved.is_some();
        let state = match saved {
            Some(state) => state,
            None => NegotiationState::new(source.phases, source.path.clone(), &source.hash)
                .with_context(|| format!("Cannot negotiate {}", source_path.display()))?,
        }
        .with_old_value_chars(config.old_value_chars());

        tracing::debug!(resumed, session = %state.session_id(), "Session opened");
        Ok(Self {
            config,
            store,
            state,
            source_path,
            resumed,
        })
    }

    pub fn save(&mut self) -> Result<PathBuf> {
        self.store
            .save(&mut self.state)
            .context("Failed to save negotiation session")
    }
}

/// Print an operation's message and any advisory warnings.
pub fn report(outcome: &OpOutcome) {
    println!("{}{}", CHECK, outcome.message);
    for warning in &outcome.warnings {
        println!("{}{}", WARN, style(warning).yellow());
    }
}
