//! voxlens-ai library interface
//!
//! Speech-analysis core: recovers structured results from language-model
//! text and runs the communication, confidence and personality stages over
//! a shared state.
//!
//! # Modules
//! - [`parser`]: never-failing text-to-mapping recovery
//! - [`capability`]: resolve-once optional collaborators with no-op fallbacks
//! - [`stages`]: the generic analysis stage and the three stage specs
//! - [`pipeline`]: dependency-ordered, concurrent stage orchestration
//! - [`validators`]: per-stage output schemas
//! - [`llm`]: Ollama and stub language models

pub mod capability;
pub mod config;
pub mod error;
pub mod llm;
pub mod parser;
pub mod pipeline;
pub mod scoring;
pub mod stages;
pub mod state;
pub mod types;
pub mod validators;

pub use crate::error::{PipelineError, PipelineResult, StageError};
pub use crate::parser::recover;
pub use crate::pipeline::{FailurePolicy, Orchestrator};
pub use crate::state::SharedState;
pub use crate::types::{AudioFeatures, Mapping};
