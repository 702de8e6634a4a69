//! Analysis stages
//!
//! One generic [`AnalysisStage`] driven by a declarative [`StageSpec`]. The
//! communication, confidence and personality stages are specs, not separate
//! implementations.
//!
//! # Stage steps
//! 1. Check required inputs; a missing input yields a degraded result with no
//!    model call
//! 2. Retrieve expert context (empty when unavailable)
//! 3. Render the prompt
//! 4. Invoke the language model
//! 5. Recover structured output from the response text
//! 6. Validate against the stage schema
//!
//! Only steps 4 and 6, plus a wrongly-shaped state, produce a [`StageError`].

pub mod communication;
pub mod confidence;
pub mod personality;
pub mod prompts;

pub use communication::{communication_spec, COMMUNICATION_ANALYSIS, COMMUNICATION_STAGE};
pub use confidence::{confidence_spec, CONFIDENCE_ANALYSIS, CONFIDENCE_STAGE};
pub use personality::{personality_spec, PERSONALITY_ANALYSIS, PERSONALITY_STAGE};

use crate::capability::Capabilities;
use crate::error::StageError;
use crate::parser::{is_parse_failure, recover};
use crate::scoring::{BaselineScorer, FeatureScorer};
use crate::state::{StateView, AUDIO_FEATURES};
use crate::types::{AudioFeatures, LanguageModel, Mapping};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Default bound on free text embedded in a prompt
pub const DEFAULT_TRANSCRIPT_LIMIT: usize = 500;

/// `{name}` placeholders; anything else in braces is literal template text
static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([a-z_]+)\}").expect("placeholder pattern is valid"));

// ============================================================================
// Declarative stage description
// ============================================================================

/// JSON shape of a stage input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Text,
    Object,
}

/// What happens when an input is absent or empty
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputRequirement {
    /// Stage returns a degraded result carrying this message
    Required { missing_error: &'static str },
    /// Stage proceeds; bound values render as "N/A"
    Optional,
}

/// One state key read by a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageInput {
    pub key: &'static str,
    pub kind: InputKind,
    pub requirement: InputRequirement,
}

impl StageInput {
    pub const fn required(key: &'static str, kind: InputKind, missing_error: &'static str) -> Self {
        Self {
            key,
            kind,
            requirement: InputRequirement::Required { missing_error },
        }
    }

    pub const fn optional(key: &'static str, kind: InputKind) -> Self {
        Self {
            key,
            kind,
            requirement: InputRequirement::Optional,
        }
    }
}

/// Score derived from acoustic features by the [`FeatureScorer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivedScore {
    Communication,
    Confidence,
}

/// Source of one prompt placeholder value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptBinding {
    /// Text input, bounded to the transcript limit
    Text { placeholder: &'static str, key: &'static str },
    /// Named acoustic measurement
    Feature { placeholder: &'static str, name: &'static str },
    /// Score computed from the acoustic features
    Score { placeholder: &'static str, score: DerivedScore },
    /// Whole prior stage result as JSON
    Result { placeholder: &'static str, key: &'static str },
    /// Single field of a prior stage result
    ResultField {
        placeholder: &'static str,
        key: &'static str,
        field: &'static str,
    },
}

/// What a stage sends to the retriever
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalSubject {
    /// The value of one input key
    Input(&'static str),
    /// Every key the stage can see
    VisibleState,
}

/// Retrieval request made by a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalPlan {
    pub domain: &'static str,
    pub subject: RetrievalSubject,
}

/// Declarative stage definition
#[derive(Debug, Clone, PartialEq)]
pub struct StageSpec {
    /// Stage name, also the validator schema tag
    pub name: &'static str,
    /// State key the result is merged under
    pub output_key: &'static str,
    pub inputs: Vec<StageInput>,
    /// Field zeroed in degraded results (`None` = error field only)
    pub primary_score: Option<&'static str>,
    pub retrieval: Option<RetrievalPlan>,
    pub template: &'static str,
    pub bindings: Vec<PromptBinding>,
}

impl StageSpec {
    /// State keys this stage reads
    pub fn reads(&self) -> Vec<&'static str> {
        self.inputs.iter().map(|input| input.key).collect()
    }

    /// Degraded result for a missing input or a substituted failure
    pub fn degraded(&self, message: &str) -> Mapping {
        let mut envelope = Mapping::new();
        envelope.insert("error".to_string(), Value::String(message.to_string()));
        if let Some(score_field) = self.primary_score {
            envelope.insert(score_field.to_string(), Value::from(0));
        }
        envelope
    }
}

/// The three standard stages
pub fn default_specs() -> Vec<StageSpec> {
    vec![communication_spec(), confidence_spec(), personality_spec()]
}

// ============================================================================
// Stage execution
// ============================================================================

/// Stage output, ready to merge
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutput {
    pub key: &'static str,
    pub value: Mapping,
    /// Reason the result is degraded (missing input or unrecoverable text)
    pub degraded: Option<String>,
}

/// A unit the orchestrator can schedule
#[async_trait]
pub trait PipelineStage: Send + Sync {
    fn name(&self) -> &str;

    /// State key written on completion
    fn output_key(&self) -> &str;

    /// State keys read
    fn reads(&self) -> Vec<&str>;

    /// Execute against a view restricted to [`reads`](Self::reads)
    ///
    /// # Errors
    /// `StageError` for a stage-fatal failure
    async fn run(&self, view: &StateView) -> Result<StageOutput, StageError>;

    /// Placeholder merged when a failure is substituted
    fn degraded(&self, message: &str) -> Mapping;
}

/// Collaborators shared by every stage of a pipeline
#[derive(Clone)]
pub struct StageRuntime {
    pub model: Arc<dyn LanguageModel>,
    pub capabilities: Capabilities,
    pub scorer: Arc<dyn FeatureScorer>,
    /// Maximum characters of free text embedded in a prompt
    pub transcript_limit: usize,
}

impl StageRuntime {
    /// Runtime with the baseline scorer and default transcript limit
    pub fn new(model: Arc<dyn LanguageModel>, capabilities: Capabilities) -> Self {
        Self {
            model,
            capabilities,
            scorer: Arc::new(BaselineScorer::new()),
            transcript_limit: DEFAULT_TRANSCRIPT_LIMIT,
        }
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn FeatureScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn with_transcript_limit(mut self, limit: usize) -> Self {
        self.transcript_limit = limit;
        self
    }
}

/// Generic analysis stage
#[derive(Clone)]
pub struct AnalysisStage {
    spec: StageSpec,
    runtime: StageRuntime,
}

impl AnalysisStage {
    pub fn new(spec: StageSpec, runtime: StageRuntime) -> Self {
        Self { spec, runtime }
    }

    pub fn spec(&self) -> &StageSpec {
        &self.spec
    }

    /// Step 1: the message of the first missing required input, if any
    fn missing_input(&self, view: &StateView) -> Result<Option<&'static str>, StageError> {
        for input in &self.spec.inputs {
            let present = self.is_present(view, input)?;
            match input.requirement {
                InputRequirement::Required { missing_error } if !present => {
                    warn!(stage = self.spec.name, input = input.key, "Required input missing");
                    return Ok(Some(missing_error));
                }
                InputRequirement::Optional if !present => {
                    warn!(stage = self.spec.name, input = input.key, "Optional input missing");
                }
                _ => {}
            }
        }
        Ok(None)
    }

    fn is_present(&self, view: &StateView, input: &StageInput) -> Result<bool, StageError> {
        let present = match input.kind {
            InputKind::Text => view
                .text(input.key)
                .map(|text| text.is_some_and(|t| !t.trim().is_empty())),
            InputKind::Object => view
                .object(input.key)
                .map(|object| object.is_some_and(|o| !o.is_empty())),
        };
        present.map_err(|source| self.invalid_state(source))
    }

    fn invalid_state(&self, source: crate::state::StateError) -> StageError {
        error!(stage = self.spec.name, error = %source, "Invalid state structure");
        StageError::InvalidState {
            stage: self.spec.name.to_string(),
            source,
        }
    }

    /// Step 2
    async fn context(&self, view: &StateView) -> String {
        let Some(plan) = self.spec.retrieval else {
            return String::new();
        };
        let subject = match plan.subject {
            RetrievalSubject::Input(key) => view
                .get(key)
                .cloned()
                .unwrap_or_else(|| Value::Object(Mapping::new())),
            RetrievalSubject::VisibleState => view.to_value(),
        };
        self.runtime
            .capabilities
            .retriever
            .get_context(plan.domain, &subject)
            .await
    }

    /// Step 3
    fn render(&self, view: &StateView, context: &str) -> Result<String, StageError> {
        let features = AudioFeatures::new(
            view.object(AUDIO_FEATURES)
                .map_err(|source| self.invalid_state(source))?
                .cloned()
                .unwrap_or_default(),
        );

        let mut values: HashMap<&str, String> = HashMap::new();
        values.insert(prompts::CONTEXT_PLACEHOLDER, prompts::format_context(context));

        for binding in &self.spec.bindings {
            let (placeholder, value) = match *binding {
                PromptBinding::Text { placeholder, key } => {
                    let text = view
                        .text(key)
                        .map_err(|source| self.invalid_state(source))?
                        .unwrap_or("");
                    (placeholder, bounded(text.trim(), self.runtime.transcript_limit))
                }
                PromptBinding::Feature { placeholder, name } => (placeholder, features.display(name)),
                PromptBinding::Score { placeholder, score } => {
                    let value = match score {
                        DerivedScore::Communication => self.runtime.scorer.communication_score(&features),
                        DerivedScore::Confidence => self.runtime.scorer.confidence_score(&features),
                    };
                    info!(stage = self.spec.name, score = value, "Feature score calculated");
                    (placeholder, value.to_string())
                }
                PromptBinding::Result { placeholder, key } => {
                    let result = view.object(key).map_err(|source| self.invalid_state(source))?;
                    let rendered = result
                        .map(|r| Value::Object(r.clone()).to_string())
                        .unwrap_or_else(|| "N/A".to_string());
                    (placeholder, rendered)
                }
                PromptBinding::ResultField { placeholder, key, field } => {
                    let result = view.object(key).map_err(|source| self.invalid_state(source))?;
                    let rendered = match result.and_then(|r| r.get(field)) {
                        None | Some(Value::Null) => "N/A".to_string(),
                        Some(Value::String(s)) => s.clone(),
                        Some(other) => other.to_string(),
                    };
                    (placeholder, rendered)
                }
            };
            values.insert(placeholder, value);
        }

        Ok(render_template(self.spec.template, &values))
    }
}

/// First `limit` characters of `text`
fn bounded(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

/// Substitute known `{name}` placeholders, leaving other braces untouched
pub fn render_template(template: &str, values: &HashMap<&str, String>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| match values.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

#[async_trait]
impl PipelineStage for AnalysisStage {
    fn name(&self) -> &str {
        self.spec.name
    }

    fn output_key(&self) -> &str {
        self.spec.output_key
    }

    fn reads(&self) -> Vec<&str> {
        self.spec.reads()
    }

    async fn run(&self, view: &StateView) -> Result<StageOutput, StageError> {
        let name = self.spec.name;

        if let Some(message) = self.missing_input(view)? {
            return Ok(StageOutput {
                key: self.spec.output_key,
                value: self.spec.degraded(message),
                degraded: Some(message.to_string()),
            });
        }

        let context = self.context(view).await;
        debug!(stage = name, context_chars = context.len(), "Context gathered");

        let prompt = self.render(view, &context)?;

        debug!(stage = name, model = self.runtime.model.name(), "Invoking language model");
        let response = self.runtime.model.invoke(&prompt).await.map_err(|source| {
            error!(stage = name, error = %source, "Language model invocation failed");
            StageError::Model {
                stage: name.to_string(),
                source,
            }
        })?;

        let recovered = recover(response);
        let degraded = if is_parse_failure(&recovered) {
            let reason = recovered
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unrecoverable response")
                .to_string();
            warn!(stage = name, error = %reason, "Response not recoverable, returning diagnostic");
            Some(reason)
        } else {
            None
        };

        let validator = &self.runtime.capabilities.validator;
        let value = validator.validate(recovered, name).map_err(|source| {
            error!(stage = name, validator = validator.name(), error = %source, "Validation failed");
            StageError::Validation {
                stage: name.to_string(),
                source,
            }
        })?;

        info!(stage = name, "Analysis completed successfully");
        Ok(StageOutput {
            key: self.spec.output_key,
            value,
            degraded,
        })
    }

    fn degraded(&self, message: &str) -> Mapping {
        self.spec.degraded(message)
    }
}

/// Instantiate the standard stages over one runtime
pub fn default_stages(runtime: &StageRuntime) -> Vec<Arc<dyn PipelineStage>> {
    default_specs()
        .into_iter()
        .map(|spec| Arc::new(AnalysisStage::new(spec, runtime.clone())) as Arc<dyn PipelineStage>)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_leaves_unknown_braces() {
        let mut values = HashMap::new();
        values.insert("transcript", "hello".to_string());
        let rendered = render_template(
            "Say {transcript} as {\"score\": 1} with {unknown}",
            &values,
        );
        assert_eq!(rendered, "Say hello as {\"score\": 1} with {unknown}");
    }

    #[test]
    fn test_render_does_not_reexpand_values() {
        let mut values = HashMap::new();
        values.insert("a", "{b}".to_string());
        values.insert("b", "x".to_string());
        assert_eq!(render_template("{a}{b}", &values), "{b}x");
    }

    #[test]
    fn test_bounded_counts_characters() {
        assert_eq!(bounded("héllo wörld", 5), "héllo");
        assert_eq!(bounded("hi", 500), "hi");
    }

    #[test]
    fn test_degraded_envelope_shapes() {
        assert_eq!(
            Value::Object(communication_spec().degraded("No transcript available")),
            serde_json::json!({"error": "No transcript available", "communication_score": 0})
        );
        assert_eq!(
            Value::Object(personality_spec().degraded("x")),
            serde_json::json!({"error": "x"})
        );
    }

    #[test]
    fn test_default_specs_have_distinct_outputs() {
        let specs = default_specs();
        let keys: Vec<_> = specs.iter().map(|s| s.output_key).collect();
        assert_eq!(
            keys,
            vec![COMMUNICATION_ANALYSIS, CONFIDENCE_ANALYSIS, PERSONALITY_ANALYSIS]
        );
    }
}
