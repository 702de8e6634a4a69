//! Error types for voxlens-ai
//!
//! Only fatal conditions are errors here. Missing stage input, retrieval
//! failures and unparseable model output are absorbed as data (degraded
//! results, empty context, diagnostic envelopes) and never reach these types.

use crate::state::StateError;
use crate::types::{LlmError, ValidationError};
use thiserror::Error;

/// Fatal stage failure, always naming the stage
#[derive(Debug, Error)]
pub enum StageError {
    /// Shared state has the wrong shape for this stage
    #[error("{stage}: invalid state structure: {source}")]
    InvalidState {
        stage: String,
        #[source]
        source: StateError,
    },

    /// Language model invocation failed
    #[error("{stage}: agent execution failed: {source}")]
    Model {
        stage: String,
        #[source]
        source: LlmError,
    },

    /// Validator rejected the recovered output
    #[error("{stage}: agent execution failed: {source}")]
    Validation {
        stage: String,
        #[source]
        source: ValidationError,
    },
}

impl StageError {
    /// Name of the failing stage
    pub fn stage(&self) -> &str {
        match self {
            StageError::InvalidState { stage, .. }
            | StageError::Model { stage, .. }
            | StageError::Validation { stage, .. } => stage,
        }
    }
}

/// Pipeline-level failure
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A stage failed under the abort policy
    #[error("Pipeline aborted: {0}")]
    Stage(#[from] StageError),

    /// Stages depend on each other's outputs in a cycle
    #[error("Dependency cycle among stages: {}", .0.join(", "))]
    DependencyCycle(Vec<String>),

    /// Two stages declare the same output key
    #[error("Output key '{key}' declared by both '{first}' and '{second}'")]
    DuplicateOutput {
        key: String,
        first: String,
        second: String,
    },

    /// A stage output collides with an existing state key
    #[error("State merge failed: {0}")]
    State(#[from] StateError),
}

/// Result type for pipeline runs
pub type PipelineResult<T> = Result<T, PipelineError>;
