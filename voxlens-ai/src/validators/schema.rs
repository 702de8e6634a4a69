//! Per-stage output schemas
//!
//! Field names here are the stable contract downstream consumers bind to.
//! Extra fields are tolerated; only declared fields are checked.

use crate::stages::{COMMUNICATION_STAGE, CONFIDENCE_STAGE, PERSONALITY_STAGE};

/// Longest list accepted for observation-style fields
pub const MAX_LIST_ITEMS: usize = 5;

const LEVELS: &[&str] = &["Low", "Medium", "High"];
const PACING: &[&str] = &["Too Slow", "Balanced", "Too Fast"];
const TONES: &[&str] = &["Neutral", "Positive", "Nervous", "Assertive"];
const PERSONALITY_TYPES: &[&str] = &["Introvert", "Ambivert", "Extrovert"];
const INTERACTION_STYLES: &[&str] = &["Reserved", "Balanced", "Expressive"];
const PRESENCE: &[&str] = &["Developing", "Competent", "Strong"];

/// Expected shape of one field
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    /// Integer within `min..=max`
    Score { min: i64, max: i64 },
    /// One of a fixed set of labels (exact match); `fallback` is used by coercion
    Choice {
        options: &'static [&'static str],
        fallback: &'static str,
    },
    /// List of strings with bounded length
    StringList { min: usize, max: Option<usize> },
    /// Free text with a minimum length in characters
    Text { min_len: usize },
}

/// One required field
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldRule {
    pub name: &'static str,
    pub kind: FieldKind,
}

const fn rule(name: &'static str, kind: FieldKind) -> FieldRule {
    FieldRule { name, kind }
}

const fn choice(options: &'static [&'static str], fallback: &'static str) -> FieldKind {
    FieldKind::Choice { options, fallback }
}

const fn list() -> FieldKind {
    FieldKind::StringList { min: 0, max: None }
}

/// Output contract of one stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageSchema {
    pub stage: &'static str,
    pub fields: &'static [FieldRule],
}

pub static COMMUNICATION_SCHEMA: StageSchema = StageSchema {
    stage: COMMUNICATION_STAGE,
    fields: &[
        rule("communication_score", FieldKind::Score { min: 0, max: 100 }),
        rule("clarity_level", choice(LEVELS, "Medium")),
        rule("fluency_level", choice(LEVELS, "Medium")),
        rule("speech_pacing", choice(PACING, "Balanced")),
        rule(
            "key_observations",
            FieldKind::StringList { min: 1, max: Some(MAX_LIST_ITEMS) },
        ),
        rule("communication_strengths", list()),
        rule("communication_gaps", list()),
        rule("improvement_suggestions", list()),
    ],
};

pub static CONFIDENCE_SCHEMA: StageSchema = StageSchema {
    stage: CONFIDENCE_STAGE,
    fields: &[
        rule("confidence_score", FieldKind::Score { min: 0, max: 100 }),
        rule("confidence_level", choice(LEVELS, "Medium")),
        rule("emotional_tone", choice(TONES, "Neutral")),
        rule("vocal_energy_assessment", choice(LEVELS, "Medium")),
        rule("confidence_indicators", list()),
        rule("possible_challenges", list()),
        rule("confidence_enhancement_tips", list()),
    ],
};

pub static PERSONALITY_SCHEMA: StageSchema = StageSchema {
    stage: PERSONALITY_STAGE,
    fields: &[
        rule("personality_type", choice(PERSONALITY_TYPES, "Ambivert")),
        rule("interaction_style", choice(INTERACTION_STYLES, "Balanced")),
        rule("professional_presence", choice(PRESENCE, "Competent")),
        rule("key_personality_traits", list()),
        rule("strengths_in_interaction", list()),
        rule("growth_opportunities", list()),
        rule("overall_summary", FieldKind::Text { min_len: 10 }),
    ],
};

/// Schema registered for `stage_name`
pub fn schema_for(stage_name: &str) -> Option<&'static StageSchema> {
    [&COMMUNICATION_SCHEMA, &CONFIDENCE_SCHEMA, &PERSONALITY_SCHEMA]
        .into_iter()
        .find(|schema| schema.stage == stage_name)
}

impl StageSchema {
    pub fn field(&self, name: &str) -> Option<&FieldRule> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_stage_has_schema() {
        for stage in [COMMUNICATION_STAGE, CONFIDENCE_STAGE, PERSONALITY_STAGE] {
            assert_eq!(schema_for(stage).map(|s| s.stage), Some(stage));
        }
        assert!(schema_for("summary_agent").is_none());
    }

    #[test]
    fn test_observations_are_bounded() {
        let field = COMMUNICATION_SCHEMA.field("key_observations").unwrap();
        assert_eq!(
            field.kind,
            FieldKind::StringList { min: 1, max: Some(5) }
        );
    }
}
