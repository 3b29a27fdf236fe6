//! Batch application of operation descriptors.
//!
//! A batch is best-effort: each descriptor is validated and applied on its
//! own, a failure is reported, and later descriptors still run.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::field::{FieldValue, ModifiableField};
use super::ops::ResetScope;
use super::state::{NegotiationState, OpOutcome, OpType};
use crate::errors::NegotiationError;

/// One operation as written in a batch file.
///
/// ```yaml
/// - type: split
///   targets: [P2]
///   params: { split_at: [1, 2] }
/// - type: merge
///   targets: [P4, P5]
///   params: { force: true }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpDescriptor {
    #[serde(rename = "type")]
    pub op_type: String,
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

/// A typed, validated negotiation command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Split {
        phase: String,
        split_at: Option<Vec<usize>>,
    },
    Merge {
        phases: Vec<String>,
        force: bool,
    },
    Reorder {
        phase: String,
        position: usize,
    },
    Skip {
        phase: String,
    },
    Unskip {
        phase: String,
    },
    Modify {
        phase: String,
        field: ModifiableField,
        value: FieldValue,
    },
    Reset {
        scope: ResetScope,
    },
}

fn single_target(desc: &OpDescriptor) -> Result<String, NegotiationError> {
    match desc.targets.as_slice() {
        [one] => Ok(one.clone()),
        other => Err(NegotiationError::InvalidInput(format!(
            "{} takes exactly one target, got {}",
            desc.op_type,
            other.len()
        ))),
    }
}

fn param_str<'a>(desc: &'a OpDescriptor, key: &str) -> Result<&'a str, NegotiationError> {
    desc.params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            NegotiationError::InvalidInput(format!(
                "{} needs a string '{}' parameter",
                desc.op_type, key
            ))
        })
}

impl TryFrom<&OpDescriptor> for Command {
    type Error = NegotiationError;

    fn try_from(desc: &OpDescriptor) -> Result<Self, Self::Error> {
        let op_type: OpType = desc.op_type.parse()?;
        match op_type {
            OpType::Split => {
                let split_at = match desc.params.get("split_at") {
                    None | Some(serde_json::Value::Null) => None,
                    Some(value) => Some(serde_json::from_value(value.clone()).map_err(|e| {
                        NegotiationError::InvalidInput(format!(
                            "split_at must be a list of file indices: {}",
                            e
                        ))
                    })?),
                };
                Ok(Command::Split {
                    phase: single_target(desc)?,
                    split_at,
                })
            }
            OpType::Merge => Ok(Command::Merge {
                phases: desc.targets.clone(),
                force: desc
                    .params
                    .get("force")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false),
            }),
            OpType::Reorder => {
                let position = desc
                    .params
                    .get("position")
                    .or_else(|| desc.params.get("to"))
                    .and_then(|v| v.as_u64())
                    .ok_or_else(|| {
                        NegotiationError::InvalidInput(
                            "reorder needs a numeric 'position' parameter".to_string(),
                        )
                    })?;
                Ok(Command::Reorder {
                    phase: single_target(desc)?,
                    position: position as usize,
                })
            }
            OpType::Skip => Ok(Command::Skip {
                phase: single_target(desc)?,
            }),
            OpType::Unskip => Ok(Command::Unskip {
                phase: single_target(desc)?,
            }),
            OpType::Modify => {
                let field: ModifiableField = param_str(desc, "field")?.parse()?;
                let value = match desc.params.get("value") {
                    Some(serde_json::Value::Array(items)) => FieldValue::Lines(
                        items
                            .iter()
                            .map(|v| v.as_str().map(String::from).unwrap_or_else(|| v.to_string()))
                            .collect(),
                    ),
                    _ => FieldValue::parse_for(field, param_str(desc, "value")?),
                };
                Ok(Command::Modify {
                    phase: single_target(desc)?,
                    field,
                    value,
                })
            }
            OpType::Reset => {
                let scope = match desc.params.get("scope").and_then(|v| v.as_str()) {
                    Some(scope) => scope.to_string(),
                    None => single_target(desc)?,
                };
                let Ok(scope) = scope.parse::<ResetScope>();
                Ok(Command::Reset { scope })
            }
        }
    }
}

impl NegotiationState {
    /// Dispatch a typed command to its operation.
    pub fn apply(&mut self, command: &Command) -> Result<OpOutcome, NegotiationError> {
        match command {
            Command::Split { phase, split_at } => self.split(phase, split_at.as_deref()),
            Command::Merge { phases, force } => self.merge(phases, *force),
            Command::Reorder { phase, position } => self.reorder(phase, *position),
            Command::Skip { phase } => self.skip(phase),
            Command::Unskip { phase } => self.unskip(phase),
            Command::Modify {
                phase,
                field,
                value,
            } => self.modify(phase, *field, value.clone()),
            Command::Reset { scope } => self.reset(scope),
        }
    }
}

/// Result of one batch entry.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchEntry {
    /// 0-based position in the batch
    pub index: usize,
    pub op_type: String,
    pub result: Result<OpOutcome, NegotiationError>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub entries: Vec<BatchEntry>,
}

impl BatchReport {
    pub fn applied(&self) -> usize {
        self.entries.iter().filter(|e| e.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.entries.len() - self.applied()
    }
}

/// Apply descriptors in order, continuing past failures.
pub fn apply_batch(state: &mut NegotiationState, descriptors: &[OpDescriptor]) -> BatchReport {
    let mut report = BatchReport::default();
    for (index, desc) in descriptors.iter().enumerate() {
        let result = Command::try_from(desc).and_then(|command| state.apply(&command));
        if let Err(e) = &result {
            tracing::warn!(index, op = %desc.op_type, error = %e, "Batch entry failed");
        }
        report.entries.push(BatchEntry {
            index,
            op_type: desc.op_type.clone(),
            result,
        });
    }
    report
}

/// Load descriptors from a YAML or JSON file (chosen by extension).
pub fn load_batch(path: &Path) -> Result<Vec<OpDescriptor>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read batch file: {}", path.display()))?;

    let is_json = path.extension().is_some_and(|e| e == "json");
    let descriptors = if is_json {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse batch JSON: {}", path.display()))?
    } else {
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse batch YAML: {}", path.display()))?
    };
    Ok(descriptors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::{FileAction, FileChange, Phase};
    use serde_json::json;

    fn session() -> NegotiationState {
        let phases = (1..=3)
            .map(|n| {
                Phase::new(&format!("P{n}"), n, &format!("Phase {n}")).with_files(vec![
                    FileChange::new(&format!("a{n}.rs"), FileAction::Modify, ""),
                    FileChange::new(&format!("b{n}.rs"), FileAction::Create, ""),
                ])
            })
            .collect();
        NegotiationState::new(phases, "audit.md", "hash").unwrap()
    }

    fn desc(op_type: &str, targets: &[&str], params: serde_json::Value) -> OpDescriptor {
        OpDescriptor {
            op_type: op_type.to_string(),
            targets: targets.iter().map(|s| s.to_string()).collect(),
            params: params.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn test_descriptor_to_command() {
        let split = Command::try_from(&desc("split", &["P1"], json!({"split_at": [1]}))).unwrap();
        assert_eq!(
            split,
            Command::Split {
                phase: "P1".into(),
                split_at: Some(vec![1])
            }
        );

        let modify = Command::try_from(&desc(
            "modify",
            &["P2"],
            json!({"field": "rollback", "value": ["revert", "redeploy"]}),
        ))
        .unwrap();
        assert_eq!(
            modify,
            Command::Modify {
                phase: "P2".into(),
                field: ModifiableField::Rollback,
                value: FieldValue::Lines(vec!["revert".into(), "redeploy".into()]),
            }
        );

        let reset = Command::try_from(&desc("reset", &[], json!({"scope": "all"}))).unwrap();
        assert_eq!(reset, Command::Reset { scope: ResetScope::All });
    }

    #[test]
    fn test_descriptor_errors() {
        assert!(Command::try_from(&desc("explode", &["P1"], json!({}))).is_err());
        assert!(Command::try_from(&desc("skip", &[], json!({}))).is_err());
        assert!(Command::try_from(&desc("reorder", &["P1"], json!({}))).is_err());
        assert!(matches!(
            Command::try_from(&desc("modify", &["P1"], json!({"field": "id", "value": "x"}))),
            Err(NegotiationError::NotModifiable { .. })
        ));
    }

    #[test]
    fn test_batch_continues_past_failures() {
        let mut state = session();
        let report = apply_batch(
            &mut state,
            &[
                desc("skip", &["P3"], json!({})),
                desc("skip", &["P3"], json!({})),
                desc("reorder", &["P9"], json!({"position": 1})),
                desc("split", &["P1"], json!({})),
            ],
        );

        assert_eq!(report.entries.len(), 4);
        assert_eq!(report.applied(), 2);
        assert_eq!(report.failed(), 2);
        assert!(matches!(
            report.entries[1].result,
            Err(NegotiationError::AlreadySkipped { .. })
        ));
        assert_eq!(state.current_phases().len(), 4);
        assert_eq!(state.operations().len(), 2);
        assert!(state.check_invariants().is_ok());
    }

    #[test]
    fn test_load_batch_yaml_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("ops.yaml");
        std::fs::write(
            &yaml,
            "- type: merge\n  targets: [P1, P2]\n  params:\n    force: true\n- type: skip\n  targets: [P3]\n",
        )
        .unwrap();
        let loaded = load_batch(&yaml).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].params["force"], json!(true));

        let json_path = dir.path().join("ops.json");
        std::fs::write(&json_path, r#"[{"type": "unskip", "targets": ["P1"]}]"#).unwrap();
        let loaded = load_batch(&json_path).unwrap();
        assert_eq!(loaded[0].op_type, "unskip");
        assert!(loaded[0].params.is_empty());
    }
}
