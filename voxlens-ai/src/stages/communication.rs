//! Communication stage: clarity, fluency and pacing from the transcript

use super::prompts::COMMUNICATION_PROMPT;
use super::{
    DerivedScore, InputKind, PromptBinding, RetrievalPlan, RetrievalSubject, StageInput, StageSpec,
};
use crate::state::{AUDIO_FEATURES, TRANSCRIPT};
use crate::types::AudioFeatures;

pub const COMMUNICATION_STAGE: &str = "communication_agent";
pub const COMMUNICATION_ANALYSIS: &str = "communication_analysis";

pub fn communication_spec() -> StageSpec {
    StageSpec {
        name: COMMUNICATION_STAGE,
        output_key: COMMUNICATION_ANALYSIS,
        inputs: vec![
            StageInput::required(TRANSCRIPT, InputKind::Text, "No transcript available"),
            StageInput::optional(AUDIO_FEATURES, InputKind::Object),
        ],
        primary_score: Some("communication_score"),
        retrieval: Some(RetrievalPlan {
            domain: "communication",
            subject: RetrievalSubject::Input(AUDIO_FEATURES),
        }),
        template: COMMUNICATION_PROMPT,
        bindings: vec![
            PromptBinding::Text {
                placeholder: "transcript",
                key: TRANSCRIPT,
            },
            PromptBinding::Feature {
                placeholder: "speech_rate",
                name: AudioFeatures::SPEECH_RATE,
            },
            PromptBinding::Feature {
                placeholder: "pause_ratio",
                name: AudioFeatures::PAUSE_RATIO,
            },
            PromptBinding::Score {
                placeholder: "communication_score",
                score: DerivedScore::Communication,
            },
        ],
    }
}
