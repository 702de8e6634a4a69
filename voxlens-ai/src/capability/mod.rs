//! Capability gate for optional collaborators
//!
//! Retrieval augmentation and response validation are optional. Each is
//! resolved exactly once; when the real collaborator is disabled or cannot be
//! reached, a same-interface fallback is installed and the fallback is logged
//! once. Stage code calls [`Capabilities`] the same way in every case.
//!
//! | Capability | Real | Fallback |
//! |---|---|---|
//! | retriever | [`RagRetriever`] | [`NoopRetriever`] (`""`) |
//! | validator | [`SchemaValidator`] | [`PassthroughValidator`] (identity) |

pub mod retriever;

pub use retriever::{HttpRetrievalBackend, RagRetriever, RetrievalBackend};

use crate::config::{RetrieverConfig, ValidationConfig};
use crate::types::{ContextRetriever, Mapping, ResponseValidator, ValidationError};
use crate::validators::SchemaValidator;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// Retriever fallback: always empty context
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRetriever;

#[async_trait]
impl ContextRetriever for NoopRetriever {
    fn name(&self) -> &'static str {
        "noop"
    }

    async fn get_context(&self, _domain: &str, _subject: &Value) -> String {
        String::new()
    }
}

/// Validator fallback: identity
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughValidator;

impl ResponseValidator for PassthroughValidator {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn validate(&self, value: Mapping, _stage_name: &str) -> Result<Mapping, ValidationError> {
        Ok(value)
    }
}

/// Resolved collaborators, shared read-only by every stage
#[derive(Clone)]
pub struct Capabilities {
    pub retriever: Arc<dyn ContextRetriever>,
    pub validator: Arc<dyn ResponseValidator>,
}

impl Capabilities {
    pub fn new(retriever: Arc<dyn ContextRetriever>, validator: Arc<dyn ResponseValidator>) -> Self {
        Self {
            retriever,
            validator,
        }
    }

    /// Both fallbacks (no augmentation, no validation)
    pub fn minimal() -> Self {
        Self::new(Arc::new(NoopRetriever), Arc::new(PassthroughValidator))
    }
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities")
            .field("retriever", &self.retriever.name())
            .field("validator", &self.validator.name())
            .finish()
    }
}

/// Resolve-once gate
pub struct CapabilityGate {
    backend: Option<Arc<dyn RetrievalBackend>>,
    validation: ValidationConfig,
    resolved: OnceCell<Capabilities>,
}

impl CapabilityGate {
    /// Gate over an explicit retrieval backend (`None` = retrieval unavailable)
    pub fn new(backend: Option<Arc<dyn RetrievalBackend>>, validation: ValidationConfig) -> Self {
        Self {
            backend,
            validation,
            resolved: OnceCell::new(),
        }
    }

    /// Gate built from configuration
    ///
    /// A backend that cannot be constructed is treated like an unreachable one.
    pub fn from_config(retriever: &RetrieverConfig, validation: &ValidationConfig) -> Self {
        let backend: Option<Arc<dyn RetrievalBackend>> = if !retriever.enabled {
            None
        } else {
            match HttpRetrievalBackend::new(retriever) {
                Ok(backend) => Some(Arc::new(backend)),
                Err(e) => {
                    warn!(error = %e, "Retrieval backend unavailable");
                    None
                }
            }
        };
        Self::new(backend, validation.clone())
    }

    /// Resolved capabilities; the first call performs resolution
    pub async fn resolve(&self) -> &Capabilities {
        self.resolved
            .get_or_init(|| async {
                let capabilities = Capabilities::new(
                    self.resolve_retriever().await,
                    self.resolve_validator(),
                );
                info!(
                    retriever = capabilities.retriever.name(),
                    validator = capabilities.validator.name(),
                    "Capabilities resolved"
                );
                capabilities
            })
            .await
    }

    async fn resolve_retriever(&self) -> Arc<dyn ContextRetriever> {
        let Some(backend) = &self.backend else {
            warn!("Retrieval not available - stages will run without expert context");
            return Arc::new(NoopRetriever);
        };

        match backend.health_check().await {
            Ok(()) => Arc::new(RagRetriever::new(Arc::clone(backend))),
            Err(e) => {
                warn!(error = %e, "Retrieval service unreachable - stages will run without expert context");
                Arc::new(NoopRetriever)
            }
        }
    }

    fn resolve_validator(&self) -> Arc<dyn ResponseValidator> {
        if self.validation.enabled {
            Arc::new(SchemaValidator::new(self.validation.policy))
        } else {
            warn!("Response validation disabled - using passthrough validation");
            Arc::new(PassthroughValidator)
        }
    }
}
