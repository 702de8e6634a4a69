//! Confidence stage: vocal confidence and emotional tone from acoustic features

use super::prompts::CONFIDENCE_PROMPT;
use super::{
    DerivedScore, InputKind, PromptBinding, RetrievalPlan, RetrievalSubject, StageInput, StageSpec,
};
use crate::state::AUDIO_FEATURES;
use crate::types::AudioFeatures;

pub const CONFIDENCE_STAGE: &str = "confidence_agent";
pub const CONFIDENCE_ANALYSIS: &str = "confidence_emotion_analysis";

pub fn confidence_spec() -> StageSpec {
    StageSpec {
        name: CONFIDENCE_STAGE,
        output_key: CONFIDENCE_ANALYSIS,
        inputs: vec![StageInput::required(
            AUDIO_FEATURES,
            InputKind::Object,
            "No audio features available",
        )],
        primary_score: Some("confidence_score"),
        retrieval: Some(RetrievalPlan {
            domain: "confidence",
            subject: RetrievalSubject::Input(AUDIO_FEATURES),
        }),
        template: CONFIDENCE_PROMPT,
        bindings: vec![
            PromptBinding::Feature {
                placeholder: "pitch_variance",
                name: AudioFeatures::PITCH_VARIANCE,
            },
            PromptBinding::Feature {
                placeholder: "energy_level",
                name: AudioFeatures::ENERGY_LEVEL,
            },
            PromptBinding::Feature {
                placeholder: "pause_ratio",
                name: AudioFeatures::PAUSE_RATIO,
            },
            PromptBinding::Score {
                placeholder: "confidence_score",
                score: DerivedScore::Confidence,
            },
        ],
    }
}
