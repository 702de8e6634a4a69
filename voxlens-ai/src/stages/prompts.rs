//! Prompt templates for the analysis stages.
//!
//! Placeholders are `{name}`; `{rag_context}` is filled by the stage with
//! formatted expert context (or nothing). Literal JSON braces in the output
//! format sections are left untouched by the renderer.

use super::{COMMUNICATION_STAGE, CONFIDENCE_STAGE, PERSONALITY_STAGE};

/// Placeholder receiving formatted retrieval context
pub const CONTEXT_PLACEHOLDER: &str = "rag_context";

/// Header-line markers identifying which template a rendered prompt came from
pub const COMMUNICATION_MARKER: &str = "expert speech and communication coach";
pub const CONFIDENCE_MARKER: &str = "expert in vocal confidence and emotional tone";
pub const PERSONALITY_MARKER: &str = "expert in professional personality assessment";

/// Template for the communication stage
pub const COMMUNICATION_PROMPT: &str = r#"You are an expert speech and communication coach.
{rag_context}
Analyze the communication patterns of the speaker below.

TRANSCRIPT:
{transcript}

MEASUREMENTS:
- Speech rate: {speech_rate} words per minute
- Pause ratio: {pause_ratio}
- Computed communication score: {communication_score}/100

Respond with ONLY a JSON object in this format:
{
  "communication_score": <integer 0-100>,
  "clarity_level": "Low" | "Medium" | "High",
  "fluency_level": "Low" | "Medium" | "High",
  "speech_pacing": "Too Slow" | "Balanced" | "Too Fast",
  "key_observations": [<1 to 5 short observations>],
  "communication_strengths": [<strings>],
  "communication_gaps": [<strings>],
  "improvement_suggestions": [<strings>]
}"#;

/// Template for the confidence stage
pub const CONFIDENCE_PROMPT: &str = r#"You are an expert in vocal confidence and emotional tone.
{rag_context}
Assess the speaker's confidence from these vocal measurements.

MEASUREMENTS:
- Pitch variance: {pitch_variance}
- Energy level: {energy_level}
- Pause ratio: {pause_ratio}
- Computed confidence score: {confidence_score}/100

Respond with ONLY a JSON object in this format:
{
  "confidence_score": <integer 0-100>,
  "confidence_level": "Low" | "Medium" | "High",
  "emotional_tone": "Neutral" | "Positive" | "Nervous" | "Assertive",
  "vocal_energy_assessment": "Low" | "Medium" | "High",
  "confidence_indicators": [<strings>],
  "possible_challenges": [<strings>],
  "confidence_enhancement_tips": [<strings>]
}"#;

/// Template for the personality stage
pub const PERSONALITY_PROMPT: &str = r#"You are an expert in professional personality assessment.
{rag_context}
Build a personality profile from the prior analyses of this speaker.

COMMUNICATION ANALYSIS (score {communication_score}):
{communication_analysis}

CONFIDENCE ANALYSIS (score {confidence_score}):
{confidence_analysis}

Respond with ONLY a JSON object in this format:
{
  "personality_type": "Introvert" | "Ambivert" | "Extrovert",
  "interaction_style": "Reserved" | "Balanced" | "Expressive",
  "professional_presence": "Developing" | "Competent" | "Strong",
  "key_personality_traits": [<strings>],
  "strengths_in_interaction": [<strings>],
  "growth_opportunities": [<strings>],
  "overall_summary": "<two or three sentences>"
}"#;

/// Stage whose template produced `prompt`
///
/// Only the header line is inspected; transcript text and retrieved context
/// come later in the prompt and never affect the result.
pub fn stage_for_prompt(prompt: &str) -> Option<&'static str> {
    let header = prompt.lines().next()?;
    [
        (COMMUNICATION_MARKER, COMMUNICATION_STAGE),
        (CONFIDENCE_MARKER, CONFIDENCE_STAGE),
        (PERSONALITY_MARKER, PERSONALITY_STAGE),
    ]
    .into_iter()
    .find(|(marker, _)| header.contains(marker))
    .map(|(_, stage)| stage)
}

/// Context section, present only when retrieval returned text
pub fn format_context(context: &str) -> String {
    if context.is_empty() {
        String::new()
    } else {
        format!("EXPERT KNOWLEDGE:\n{}\n", context)
    }
}
