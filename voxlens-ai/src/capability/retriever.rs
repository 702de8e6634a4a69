//! Retrieval augmentation
//!
//! [`RagRetriever`] adapts a [`RetrievalBackend`] to the never-failing
//! [`ContextRetriever`] contract: every backend error is logged and becomes an
//! empty context string.
//!
//! # API
//! - `GET {base_url}/health`: liveness probe used once at capability resolution
//! - `POST {base_url}/context`: `{collection, domain, top_k, query}` →
//!   `{context}` or `{passages: [..]}`

use crate::config::RetrieverConfig;
use crate::types::{ContextRetriever, RetrievalError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Separator between retrieved passages
const PASSAGE_SEPARATOR: &str = "\n\n";

/// Knowledge-retrieval service
#[async_trait]
pub trait RetrievalBackend: Send + Sync {
    /// Check the service is reachable
    async fn health_check(&self) -> Result<(), RetrievalError>;

    /// Fetch context text for an analysis domain
    async fn fetch_context(&self, domain: &str, query: &Value) -> Result<String, RetrievalError>;
}

#[derive(Debug, Serialize)]
struct ContextRequest<'a> {
    collection: &'a str,
    domain: &'a str,
    top_k: u32,
    query: &'a Value,
}

#[derive(Debug, Deserialize)]
struct ContextResponse {
    #[serde(default)]
    context: Option<String>,
    #[serde(default)]
    passages: Vec<String>,
}

impl ContextResponse {
    fn into_text(self) -> String {
        match self.context {
            Some(context) => context,
            None => self.passages.join(PASSAGE_SEPARATOR),
        }
    }
}

/// HTTP retrieval service client
pub struct HttpRetrievalBackend {
    http_client: Client,
    base_url: String,
    collection: String,
    top_k: u32,
}

impl HttpRetrievalBackend {
    /// Build a client for the configured service
    ///
    /// # Errors
    /// `RetrievalError::Connection` if the HTTP client cannot be constructed
    pub fn new(config: &RetrieverConfig) -> Result<Self, RetrievalError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RetrievalError::Connection(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            collection: config.collection.clone(),
            top_k: config.top_k,
        })
    }
}

#[async_trait]
impl RetrievalBackend for HttpRetrievalBackend {
    async fn health_check(&self) -> Result<(), RetrievalError> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| RetrievalError::Connection(format!("{}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(RetrievalError::Service {
                status: response.status().as_u16(),
                message: "health check failed".to_string(),
            });
        }
        Ok(())
    }

    async fn fetch_context(&self, domain: &str, query: &Value) -> Result<String, RetrievalError> {
        let url = format!("{}/context", self.base_url);
        let request = ContextRequest {
            collection: &self.collection,
            domain,
            top_k: self.top_k,
            query,
        };

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RetrievalError::Connection(format!("Retrieval request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                    RetrievalError::InvalidArgument(body)
                }
                _ => RetrievalError::Service {
                    status: status.as_u16(),
                    message: body,
                },
            });
        }

        let body: ContextResponse = response
            .json()
            .await
            .map_err(|e| RetrievalError::InvalidResponse(format!("Parse context failed: {}", e)))?;
        Ok(body.into_text())
    }
}

/// Best-effort retriever over a backend
pub struct RagRetriever {
    backend: Arc<dyn RetrievalBackend>,
}

impl RagRetriever {
    pub fn new(backend: Arc<dyn RetrievalBackend>) -> Self {
        Self { backend }
    }
}

fn is_empty_subject(subject: &Value) -> bool {
    match subject {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

#[async_trait]
impl ContextRetriever for RagRetriever {
    fn name(&self) -> &'static str {
        "rag"
    }

    async fn get_context(&self, domain: &str, subject: &Value) -> String {
        if is_empty_subject(subject) {
            warn!(domain, "No analysis subject provided for context retrieval");
            return String::new();
        }

        match self.backend.fetch_context(domain, subject).await {
            Ok(context) => {
                debug!(domain, chars = context.len(), "Retrieved context");
                context
            }
            Err(RetrievalError::Connection(e)) => {
                error!(domain, error = %e, "Context retrieval connection failed");
                String::new()
            }
            Err(RetrievalError::InvalidArgument(e)) => {
                error!(domain, error = %e, "Invalid context retrieval parameters");
                String::new()
            }
            Err(e) => {
                error!(domain, error = %e, "Unexpected context retrieval failure");
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_passages_joined_when_no_context() {
        let body: ContextResponse =
            serde_json::from_value(json!({"passages": ["Pace: 120-160 wpm.", "Pauses aid clarity."]}))
                .unwrap();
        assert_eq!(body.into_text(), "Pace: 120-160 wpm.\n\nPauses aid clarity.");

        let body: ContextResponse = serde_json::from_value(json!({"context": "direct"})).unwrap();
        assert_eq!(body.into_text(), "direct");
    }

    #[test]
    fn test_empty_subjects() {
        assert!(is_empty_subject(&json!({})));
        assert!(is_empty_subject(&Value::Null));
        assert!(!is_empty_subject(&json!({"speech_rate": 140})));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let config = RetrieverConfig {
            base_url: "http://localhost:8000/".to_string(),
            ..RetrieverConfig::default()
        };
        let backend = HttpRetrievalBackend::new(&config).unwrap();
        assert_eq!(backend.base_url, "http://localhost:8000");
    }
}
