//! Personality stage: synthesises the communication and confidence results
//!
//! Reads only prior stage outputs, so it is scheduled after both. A degraded
//! prior result still counts as present and is passed to the model as-is.

use super::communication::COMMUNICATION_ANALYSIS;
use super::confidence::CONFIDENCE_ANALYSIS;
use super::prompts::PERSONALITY_PROMPT;
use super::{InputKind, PromptBinding, RetrievalPlan, RetrievalSubject, StageInput, StageSpec};

pub const PERSONALITY_STAGE: &str = "personality_agent";
pub const PERSONALITY_ANALYSIS: &str = "personality_analysis";

pub fn personality_spec() -> StageSpec {
    StageSpec {
        name: PERSONALITY_STAGE,
        output_key: PERSONALITY_ANALYSIS,
        inputs: vec![
            StageInput::required(
                COMMUNICATION_ANALYSIS,
                InputKind::Object,
                "No communication analysis available",
            ),
            StageInput::required(
                CONFIDENCE_ANALYSIS,
                InputKind::Object,
                "No confidence analysis available",
            ),
        ],
        primary_score: None,
        retrieval: Some(RetrievalPlan {
            domain: "personality",
            subject: RetrievalSubject::VisibleState,
        }),
        template: PERSONALITY_PROMPT,
        bindings: vec![
            PromptBinding::Result {
                placeholder: "communication_analysis",
                key: COMMUNICATION_ANALYSIS,
            },
            PromptBinding::Result {
                placeholder: "confidence_analysis",
                key: CONFIDENCE_ANALYSIS,
            },
            PromptBinding::ResultField {
                placeholder: "communication_score",
                key: COMMUNICATION_ANALYSIS,
                field: "communication_score",
            },
            PromptBinding::ResultField {
                placeholder: "confidence_score",
                key: CONFIDENCE_ANALYSIS,
                field: "confidence_score",
            },
        ],
    }
}
