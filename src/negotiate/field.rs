//! Closed set of phase fields a user may edit.

use crate::errors::NegotiationError;
use crate::phase::Phase;

/// A phase field that `modify` may overwrite.
///
/// Structural fields (`id`, `number`, `files`, lineage) are not listed; they
/// only change through split, merge, reorder and reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModifiableField {
    Title,
    Context,
    Goal,
    Plan,
    Verification,
    AcceptanceCriteria,
    Rollback,
}

impl ModifiableField {
    pub const ALL: [ModifiableField; 7] = [
        ModifiableField::Title,
        ModifiableField::Context,
        ModifiableField::Goal,
        ModifiableField::Plan,
        ModifiableField::Verification,
        ModifiableField::AcceptanceCriteria,
        ModifiableField::Rollback,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ModifiableField::Title => "title",
            ModifiableField::Context => "context",
            ModifiableField::Goal => "goal",
            ModifiableField::Plan => "plan",
            ModifiableField::Verification => "verification",
            ModifiableField::AcceptanceCriteria => "acceptance_criteria",
            ModifiableField::Rollback => "rollback",
        }
    }

    /// List fields hold one entry per step or criterion.
    pub fn is_list(self) -> bool {
        matches!(
            self,
            ModifiableField::Plan
                | ModifiableField::Verification
                | ModifiableField::AcceptanceCriteria
                | ModifiableField::Rollback
        )
    }

    pub fn valid_names() -> Vec<String> {
        Self::ALL.iter().map(|f| f.as_str().to_string()).collect()
    }

    pub(crate) fn read(self, phase: &Phase) -> FieldValue {
        match self {
            ModifiableField::Title => FieldValue::Text(phase.title.clone()),
            ModifiableField::Context => FieldValue::Text(phase.context.clone()),
            ModifiableField::Goal => FieldValue::Text(phase.goal.clone()),
            ModifiableField::Plan => FieldValue::Lines(phase.plan.clone()),
            ModifiableField::Verification => FieldValue::Lines(phase.verification.clone()),
            ModifiableField::AcceptanceCriteria => {
                FieldValue::Lines(phase.acceptance_criteria.clone())
            }
            ModifiableField::Rollback => FieldValue::Lines(phase.rollback.clone()),
        }
    }

    pub(crate) fn write(self, phase: &mut Phase, value: FieldValue) {
        match self {
            ModifiableField::Title => phase.title = value.into_text(),
            ModifiableField::Context => phase.context = value.into_text(),
            ModifiableField::Goal => phase.goal = value.into_text(),
            ModifiableField::Plan => phase.plan = value.into_lines(),
            ModifiableField::Verification => phase.verification = value.into_lines(),
            ModifiableField::AcceptanceCriteria => phase.acceptance_criteria = value.into_lines(),
            ModifiableField::Rollback => phase.rollback = value.into_lines(),
        }
    }
}

impl std::fmt::Display for ModifiableField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ModifiableField {
    type Err = NegotiationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == normalized)
            .ok_or_else(|| NegotiationError::NotModifiable {
                field: s.to_string(),
                valid: Self::valid_names(),
            })
    }
}

/// New content for a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Lines(Vec<String>),
}

impl FieldValue {
    /// Interpret raw user input for `field`.
    ///
    /// List fields split on newlines and `;`, dropping empty entries.
    pub fn parse_for(field: ModifiableField, raw: &str) -> Self {
        if field.is_list() {
            FieldValue::Lines(
                raw.split(['\n', ';'])
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect(),
            )
        } else {
            FieldValue::Text(raw.trim().to_string())
        }
    }

    pub fn render(&self) -> String {
        match self {
            FieldValue::Text(text) => text.clone(),
            FieldValue::Lines(lines) => lines.join("; "),
        }
    }

    fn into_text(self) -> String {
        match self {
            FieldValue::Text(text) => text,
            FieldValue::Lines(lines) => lines.join("\n"),
        }
    }

    fn into_lines(self) -> Vec<String> {
        match self {
            FieldValue::Text(text) => text
                .lines()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            FieldValue::Lines(lines) => lines,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_field_name() {
        for field in ModifiableField::ALL {
            assert_eq!(field.as_str().parse::<ModifiableField>().unwrap(), field);
        }
    }

    #[test]
    fn accepts_hyphenated_and_mixed_case_names() {
        assert_eq!(
            "Acceptance-Criteria".parse::<ModifiableField>().unwrap(),
            ModifiableField::AcceptanceCriteria
        );
        assert_eq!(" GOAL ".parse::<ModifiableField>().unwrap(), ModifiableField::Goal);
    }

    #[test]
    fn unknown_field_is_not_modifiable() {
        let err = "files".parse::<ModifiableField>().unwrap_err();
        match err {
            NegotiationError::NotModifiable { field, valid } => {
                assert_eq!(field, "files");
                assert_eq!(valid.len(), 7);
                assert!(valid.contains(&"rollback".to_string()));
            }
            other => panic!("Expected NotModifiable, got {other:?}"),
        }
    }

    #[test]
    fn list_values_split_on_semicolons_and_newlines() {
        let value = FieldValue::parse_for(ModifiableField::Plan, "step one; step two\nstep three;;");
        assert_eq!(
            value,
            FieldValue::Lines(vec![
                "step one".into(),
                "step two".into(),
                "step three".into()
            ])
        );
    }

    #[test]
    fn text_values_keep_semicolons() {
        let value = FieldValue::parse_for(ModifiableField::Goal, " a; b ");
        assert_eq!(value, FieldValue::Text("a; b".into()));
    }

    #[test]
    fn read_and_write_round_trip_through_phase() {
        let mut phase = Phase::new("P1", 1, "Old");
        ModifiableField::Rollback.write(
            &mut phase,
            FieldValue::parse_for(ModifiableField::Rollback, "git revert"),
        );
        assert_eq!(phase.rollback, vec!["git revert"]);
        assert_eq!(
            ModifiableField::Title.read(&phase),
            FieldValue::Text("Old".into())
        );
    }
}
