//! Configuration for phase negotiation.
//!
//! Settings are read from `.forge/negotiate.toml` and layered
//! file → environment → CLI.
//!
//! # Configuration File Format
//!
//! ```toml
//! [session]
//! dir = ".forge/negotiate/sessions"
//!
//! [log]
//! old_value_max_chars = 80
//!
//! [export]
//! skipped = "comment"   # or "omit"
//!
//! [merge]
//! confirm_non_consecutive = true
//! ```

use anyhow::{Context, Result, anyhow};
use glob::glob;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::negotiate::state::DEFAULT_OLD_VALUE_CHARS;
use crate::render::SkippedMode;

/// Environment variable overriding the session directory.
pub const SESSION_DIR_ENV: &str = "FORGE_NEGOTIATE_SESSION_DIR";

/// Session directory relative to the project when nothing else is set.
pub const DEFAULT_SESSION_DIR: &str = ".forge/negotiate/sessions";

const CONFIG_FILE: &str = "negotiate.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSection {
    /// Where session records live (relative paths resolve against the project)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSection {
    /// How much of a replaced value `modify` keeps in the operation log
    #[serde(default = "default_old_value_max_chars")]
    pub old_value_max_chars: usize,
}

fn default_old_value_max_chars() -> usize {
    DEFAULT_OLD_VALUE_CHARS
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            old_value_max_chars: default_old_value_max_chars(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportSection {
    #[serde(default)]
    pub skipped: SkippedMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeSection {
    /// Ask before merging phases that are not adjacent
    #[serde(default = "default_confirm_non_consecutive")]
    pub confirm_non_consecutive: bool,
}

fn default_confirm_non_consecutive() -> bool {
    true
}

impl Default for MergeSection {
    fn default() -> Self {
        Self {
            confirm_non_consecutive: default_confirm_non_consecutive(),
        }
    }
}

/// Contents of `negotiate.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NegotiateToml {
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub log: LogSection,
    #[serde(default)]
    pub export: ExportSection,
    #[serde(default)]
    pub merge: MergeSection,
}

impl NegotiateToml {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse negotiate.toml")
    }

    /// Load `.forge/negotiate.toml`, or defaults when it does not exist.
    pub fn load_or_default(forge_dir: &Path) -> Result<Self> {
        let config_path = forge_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize negotiate.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.log.old_value_max_chars == 0 {
            warnings.push(
                "log.old_value_max_chars is 0; at least one character is always kept".to_string(),
            );
        }
        if let Some(dir) = &self.session.dir
            && dir.as_os_str().is_empty()
        {
            warnings.push("session.dir is empty; the default location is used".to_string());
        }
        warnings
    }
}

/// Resolved configuration: file settings plus environment and CLI overrides.
#[derive(Debug, Clone)]
pub struct NegotiateConfig {
    pub project_dir: PathBuf,
    pub forge_dir: PathBuf,
    pub toml: NegotiateToml,
    /// CLI override: source document
    pub cli_source: Option<PathBuf>,
    /// CLI override: session directory
    pub cli_session_dir: Option<PathBuf>,
    /// CLI override: answer yes to confirmations
    pub yes: bool,
}

impl NegotiateConfig {
    pub fn new(project_dir: PathBuf) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let forge_dir = project_dir.join(".forge");
        let toml = NegotiateToml::load_or_default(&forge_dir)?;

        Ok(Self {
            project_dir,
            forge_dir,
            toml,
            cli_source: None,
            cli_session_dir: None,
            yes: false,
        })
    }

    pub fn with_cli_args(
        project_dir: PathBuf,
        source: Option<PathBuf>,
        session_dir: Option<PathBuf>,
        yes: bool,
    ) -> Result<Self> {
        let mut config = Self::new(project_dir)?;
        config.cli_source = source;
        config.cli_session_dir = session_dir;
        config.yes = yes;
        Ok(config)
    }

    /// Session directory (CLI → env → file → default).
    pub fn session_dir(&self) -> PathBuf {
        self.resolve_session_dir(std::env::var(SESSION_DIR_ENV).ok())
    }

    fn resolve_session_dir(&self, env_value: Option<String>) -> PathBuf {
        if let Some(dir) = &self.cli_session_dir {
            return dir.clone();
        }
        if let Some(dir) = env_value.filter(|v| !v.trim().is_empty()) {
            return PathBuf::from(dir);
        }
        match &self.toml.session.dir {
            Some(dir) if !dir.as_os_str().is_empty() => self.project_dir.join(dir),
            _ => self.project_dir.join(DEFAULT_SESSION_DIR),
        }
    }

    pub fn old_value_chars(&self) -> usize {
        self.toml.log.old_value_max_chars.max(1)
    }

    pub fn skipped_mode(&self) -> SkippedMode {
        self.toml.export.skipped
    }

    /// Whether a non-consecutive merge needs confirmation before it runs.
    pub fn confirm_non_consecutive(&self) -> bool {
        self.toml.merge.confirm_non_consecutive && !self.yes
    }

    /// The source document: `--source`, else `.forge/audit.md`, else the most
    /// recently modified `docs/plans/*audit*.md`.
    pub fn source_file(&self) -> Result<PathBuf> {
        if let Some(source) = &self.cli_source {
            return Ok(source.clone());
        }

        let forge_audit = self.forge_dir.join("audit.md");
        if forge_audit.exists() {
            return Ok(forge_audit);
        }

        let pattern = self
            .project_dir
            .join("docs/plans/*audit*.md")
            .to_string_lossy()
            .to_string();

        let mut candidates: Vec<PathBuf> = glob(&pattern)
            .context("Failed to read glob pattern")?
            .filter_map(|entry| entry.ok())
            .collect();

        if candidates.is_empty() {
            return Err(anyhow!(
                "No audit document found. Create .forge/audit.md or pass --source"
            ));
        }

        // most recently modified first
        candidates.sort_by(|a, b| {
            let a_time = a.metadata().and_then(|m| m.modified()).ok();
            let b_time = b.metadata().and_then(|m| m.modified()).ok();
            b_time.cmp(&a_time)
        });

        Ok(candidates.remove(0))
    }

    pub fn validate(&self) -> Vec<String> {
        self.toml.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let toml = NegotiateToml::default();
        assert!(toml.session.dir.is_none());
        assert_eq!(toml.log.old_value_max_chars, 80);
        assert_eq!(toml.export.skipped, SkippedMode::Comment);
        assert!(toml.merge.confirm_non_consecutive);
        assert!(toml.validate().is_empty());
    }

    #[test]
    fn test_parse_partial_file_fills_defaults() {
        let toml = NegotiateToml::parse(
            r#"
[export]
skipped = "omit"

[log]
old_value_max_chars = 20
"#,
        )
        .unwrap();
        assert_eq!(toml.export.skipped, SkippedMode::Omit);
        assert_eq!(toml.log.old_value_max_chars, 20);
        assert!(toml.merge.confirm_non_consecutive);
    }

    #[test]
    fn test_parse_invalid_skipped_mode_fails() {
        assert!(NegotiateToml::parse("[export]\nskipped = \"hide\"\n").is_err());
    }

    #[test]
    fn test_validate_warns_on_zero_chars() {
        let toml = NegotiateToml::parse("[log]\nold_value_max_chars = 0\n").unwrap();
        assert_eq!(toml.validate().len(), 1);
    }

    #[test]
    fn test_load_and_save() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("negotiate.toml");
        let mut toml = NegotiateToml::default();
        toml.merge.confirm_non_consecutive = false;
        toml.save(&path).unwrap();

        let loaded = NegotiateToml::load(&path).unwrap();
        assert!(!loaded.merge.confirm_non_consecutive);
    }

    #[test]
    fn test_session_dir_layering() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".forge")).unwrap();
        fs::write(
            dir.path().join(".forge/negotiate.toml"),
            "[session]\ndir = \"custom/sessions\"\n",
        )
        .unwrap();

        let mut config = NegotiateConfig::new(dir.path().to_path_buf()).unwrap();
        let root = dir.path().canonicalize().unwrap();
        assert_eq!(config.resolve_session_dir(None), root.join("custom/sessions"));
        assert_eq!(
            config.resolve_session_dir(Some("/tmp/env-sessions".into())),
            PathBuf::from("/tmp/env-sessions")
        );

        config.cli_session_dir = Some(PathBuf::from("/tmp/cli-sessions"));
        assert_eq!(
            config.resolve_session_dir(Some("/tmp/env-sessions".into())),
            PathBuf::from("/tmp/cli-sessions")
        );
    }

    #[test]
    fn test_session_dir_default() {
        let dir = tempdir().unwrap();
        let config = NegotiateConfig::new(dir.path().to_path_buf()).unwrap();
        assert_eq!(
            config.resolve_session_dir(None),
            dir.path().canonicalize().unwrap().join(DEFAULT_SESSION_DIR)
        );
    }

    #[test]
    fn test_yes_disables_merge_confirmation() {
        let dir = tempdir().unwrap();
        let config =
            NegotiateConfig::with_cli_args(dir.path().to_path_buf(), None, None, true).unwrap();
        assert!(!config.confirm_non_consecutive());
    }

    #[test]
    fn test_source_file_discovery() {
        let dir = tempdir().unwrap();
        let config = NegotiateConfig::new(dir.path().to_path_buf()).unwrap();
        assert!(config.source_file().is_err());

        let plans = dir.path().join("docs/plans");
        fs::create_dir_all(&plans).unwrap();
        fs::write(plans.join("q3-audit.md"), "## Phase 1: A").unwrap();
        let found = config.source_file().unwrap();
        assert!(found.ends_with("q3-audit.md"));

        fs::create_dir_all(dir.path().join(".forge")).unwrap();
        fs::write(dir.path().join(".forge/audit.md"), "## Phase 1: A").unwrap();
        assert!(config.source_file().unwrap().ends_with(".forge/audit.md"));

        let explicit = NegotiateConfig::with_cli_args(
            dir.path().to_path_buf(),
            Some(PathBuf::from("other.md")),
            None,
            false,
        )
        .unwrap();
        assert_eq!(explicit.source_file().unwrap(), PathBuf::from("other.md"));
    }
}
