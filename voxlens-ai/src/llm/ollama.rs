//! Ollama Client
//!
//! Non-streaming completion against a local Ollama server.
//!
//! # API Reference
//! - Endpoint: `POST {base_url}/api/generate`
//! - Request: `{model, prompt, stream: false, options: {temperature, num_predict}}`
//! - Response: `{response, done, ...}`

use crate::config::LlmConfig;
use crate::types::{LanguageModel, LlmError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Ollama language model
pub struct OllamaModel {
    http_client: Client,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OllamaModel {
    /// Build a client for the configured server and model
    ///
    /// # Errors
    /// `LlmError::Connection` if the HTTP client cannot be constructed
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Connection(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl LanguageModel for OllamaModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn invoke(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
                num_predict: self.max_tokens,
            },
        };

        debug!(model = %self.model, prompt_chars = prompt.len(), "Invoking Ollama");

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Connection(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Service {
                status: status.as_u16(),
                message,
            });
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("Parse Ollama response failed: {}", e)))?;

        debug!(model = %self.model, response_chars = body.response.len(), "Ollama completed");
        Ok(body.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_shape() {
        let request = GenerateRequest {
            model: "llama3.2",
            prompt: "hi",
            stream: false,
            options: GenerateOptions {
                temperature: 0.5,
                num_predict: 64,
            },
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "model": "llama3.2",
                "prompt": "hi",
                "stream": false,
                "options": {"temperature": 0.5, "num_predict": 64}
            })
        );
    }

    #[test]
    fn test_response_ignores_extra_fields() {
        let body: GenerateResponse = serde_json::from_value(json!({
            "model": "llama3.2",
            "response": "{\"ok\": true}",
            "done": true
        }))
        .unwrap();
        assert_eq!(body.response, "{\"ok\": true}");
    }
}
