//! Core Types and Trait Definitions for voxlens-ai
//!
//! Defines the collaborator seams used by the analysis stages:
//! - **LanguageModel:** prompt in, free text out (no structural contract)
//! - **ContextRetriever:** optional retrieval augmentation, never fails
//! - **ResponseValidator:** optional schema enforcement, may reject output
//!
//! Real and fallback implementations of the optional collaborators live in
//! [`crate::capability`]; stage code only ever sees these traits.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// JSON object used for stage results and parser outcomes
pub type Mapping = serde_json::Map<String, Value>;

// ============================================================================
// Feature Input
// ============================================================================

/// Acoustic measurements supplied by the feature-extraction collaborator
///
/// Opaque to the pipeline: values are looked up by name for prompt rendering
/// and scoring, never interpreted structurally. Known names are exposed as
/// constants; any additional measurement is carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AudioFeatures(Mapping);

impl AudioFeatures {
    pub const SPEECH_RATE: &'static str = "speech_rate";
    pub const PITCH_VARIANCE: &'static str = "pitch_variance";
    pub const PAUSE_RATIO: &'static str = "pause_ratio";
    pub const ENERGY_LEVEL: &'static str = "energy_level";

    /// Wrap a measurement mapping
    pub fn new(measurements: Mapping) -> Self {
        Self(measurements)
    }

    /// True when no measurement is present
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Raw measurement value
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Numeric measurement, accepting numeric strings
    pub fn number(&self, name: &str) -> Option<f64> {
        match self.0.get(name)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Categorical measurement as lowercase text
    pub fn category(&self, name: &str) -> Option<String> {
        match self.0.get(name)? {
            Value::String(s) => Some(s.trim().to_lowercase()),
            _ => None,
        }
    }

    /// Prompt-ready rendering of a measurement ("N/A" when absent)
    pub fn display(&self, name: &str) -> String {
        match self.0.get(name) {
            None | Some(Value::Null) => "N/A".to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }

    /// Measurements as a JSON value (retrieval queries)
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

impl From<Mapping> for AudioFeatures {
    fn from(measurements: Mapping) -> Self {
        Self(measurements)
    }
}

// ============================================================================
// Language Model
// ============================================================================

/// Language-model collaborator
///
/// The returned text carries no structural guarantee; stages always pass it
/// through [`crate::parser::recover`].
#[async_trait::async_trait]
pub trait LanguageModel: Send + Sync {
    /// Model name for logging
    fn name(&self) -> &str;

    /// Single-shot completion of `prompt`
    ///
    /// # Errors
    /// Returns `LlmError` on transport or service failure
    async fn invoke(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Language-model invocation error
#[derive(Debug, Error)]
pub enum LlmError {
    /// Could not reach the model service
    #[error("Connection error: {0}")]
    Connection(String),

    /// Model service answered with an error status
    #[error("Service error (HTTP {status}): {message}")]
    Service { status: u16, message: String },

    /// Model service response was not understood
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

// ============================================================================
// Retrieval
// ============================================================================

/// Retrieval-augmentation capability
///
/// Best-effort by contract: implementations absorb every failure and return
/// an empty string, so callers never branch on availability.
#[async_trait::async_trait]
pub trait ContextRetriever: Send + Sync {
    /// Capability name for logging
    fn name(&self) -> &'static str;

    /// Expert context for an analysis `domain` given the analysis subject
    /// (feature measurements or prior stage results)
    async fn get_context(&self, domain: &str, subject: &Value) -> String;
}

/// Retrieval backend error, absorbed by the retriever capability
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Retrieval service unreachable or timed out
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query rejected as malformed
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Retrieval service failed
    #[error("Service error (HTTP {status}): {message}")]
    Service { status: u16, message: String },

    /// Retrieval response was not understood
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

// ============================================================================
// Validation
// ============================================================================

/// Response-validation capability
///
/// The only stage step permitted to reject model output.
pub trait ResponseValidator: Send + Sync {
    /// Capability name for logging
    fn name(&self) -> &'static str;

    /// Check (and possibly correct) a recovered stage result
    ///
    /// # Errors
    /// Returns `ValidationError` when the value violates the stage schema
    fn validate(&self, value: Mapping, stage_name: &str) -> Result<Mapping, ValidationError>;
}

/// Validation error
#[derive(Debug, Error)]
pub enum ValidationError {
    /// One or more schema violations
    #[error("{stage} output violates schema: {}", violations.join("; "))]
    SchemaViolation {
        stage: String,
        violations: Vec<String>,
    },

    /// No schema registered for the stage
    #[error("No schema registered for stage '{0}'")]
    UnknownStage(String),
}

// ============================================================================
// Tests
// ============================================================================
