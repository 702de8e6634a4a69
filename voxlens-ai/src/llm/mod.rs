//! Language model clients
//!
//! [`resolve_model`] picks the model used for a process: the configured
//! Ollama model when it answers a probe, otherwise (if allowed) the
//! deterministic [`StubModel`].

pub mod ollama;
pub mod stub;

pub use ollama::OllamaModel;
pub use stub::StubModel;

use crate::config::LlmConfig;
use crate::types::{LanguageModel, LlmError};
use std::sync::Arc;
use tracing::{info, warn};

/// Prompt used to check the model server answers
const PROBE_PROMPT: &str = "hi";

/// Resolve the language model once at startup
///
/// # Errors
/// The probe failure when the server is unreachable and stub fallback is disabled
pub async fn resolve_model(config: &LlmConfig) -> Result<Arc<dyn LanguageModel>, LlmError> {
    let probed = match OllamaModel::new(config) {
        Ok(model) => {
            let probe = model.invoke(PROBE_PROMPT).await;
            probe.map(|_| model)
        }
        Err(e) => Err(e),
    };

    match probed {
        Ok(model) => {
            info!(model = %config.model, url = %config.base_url, "Language model available");
            Ok(Arc::new(model))
        }
        Err(e) if config.allow_stub_fallback => {
            warn!(error = %e, "Language model not available - using stub model");
            Ok(Arc::new(StubModel::new()))
        }
        Err(e) => Err(e),
    }
}
