//! Configuration resolution for voxlens-ai
//!
//! Provides multi-tier configuration resolution with ENV → TOML → compiled
//! default priority. The TOML file itself is located by
//! [`voxlens_common::config::resolve_config_path`].

use crate::pipeline::FailurePolicy;
use crate::validators::ValidationPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use voxlens_common::config::{
    env_override, load_toml_config, resolve_config_path, user_config_path, write_toml_config,
    LoggingConfig,
};
use voxlens_common::{Error, Result};

/// Config file name under the user config directory
pub const CONFIG_FILE_NAME: &str = "voxlens.toml";

/// Environment variable naming an explicit config file
pub const ENV_CONFIG_PATH: &str = "VOXLENS_CONFIG";
pub const ENV_LLM_URL: &str = "VOXLENS_LLM_URL";
pub const ENV_LLM_MODEL: &str = "VOXLENS_LLM_MODEL";
pub const ENV_RETRIEVER_URL: &str = "VOXLENS_RETRIEVER_URL";
pub const ENV_VALIDATION_POLICY: &str = "VOXLENS_VALIDATION_POLICY";

/// Complete analysis configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub llm: LlmConfig,
    pub retriever: RetrieverConfig,
    pub validation: ValidationConfig,
    pub pipeline: PipelineSettings,
    pub logging: LoggingConfig,
}

/// Language model service settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Ollama-compatible base URL
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    /// Generation limit passed as `num_predict`
    pub max_tokens: u32,
    pub timeout_secs: u64,
    /// Install the deterministic stub model when the service is unreachable
    pub allow_stub_fallback: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.2".to_string(),
            temperature: 0.3,
            max_tokens: 1024,
            timeout_secs: 120,
            allow_stub_fallback: true,
        }
    }
}

/// Retrieval-augmentation service settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverConfig {
    pub enabled: bool,
    pub base_url: String,
    /// Knowledge collection queried for expert context
    pub collection: String,
    /// Number of passages requested per query
    pub top_k: u32,
    pub timeout_secs: u64,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "http://localhost:8000".to_string(),
            collection: "speech_analysis_knowledge".to_string(),
            top_k: 3,
            timeout_secs: 10,
        }
    }
}

/// Response validation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub enabled: bool,
    pub policy: ValidationPolicy,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            policy: ValidationPolicy::Strict,
        }
    }
}

/// Orchestration settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub failure_policy: FailurePolicy,
    /// Maximum transcript characters embedded in a prompt
    pub transcript_limit: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::Abort,
            transcript_limit: 500,
        }
    }
}

impl AnalysisConfig {
    /// Load configuration: file (explicit path, `VOXLENS_CONFIG`, user dir) then ENV overrides
    ///
    /// # Errors
    /// `Error::Config` for an unreadable/unparsable file or an invalid override
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let path = resolve_config_path(cli_path, ENV_CONFIG_PATH, CONFIG_FILE_NAME);
        let mut config: AnalysisConfig = load_toml_config(path.as_deref())?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply individual ENV overrides on top of file values
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(url) = env_override(ENV_LLM_URL) {
            info!("LLM base URL overridden from environment");
            self.llm.base_url = url;
        }
        if let Some(model) = env_override(ENV_LLM_MODEL) {
            info!("LLM model overridden from environment");
            self.llm.model = model;
        }
        if let Some(url) = env_override(ENV_RETRIEVER_URL) {
            info!("Retriever URL overridden from environment (retriever enabled)");
            self.retriever.base_url = url;
            self.retriever.enabled = true;
        }
        if let Some(policy) = env_override(ENV_VALIDATION_POLICY) {
            self.validation.policy = policy.parse().map_err(|_| {
                Error::Config(format!(
                    "{} must be 'strict' or 'coerce', got '{}'",
                    ENV_VALIDATION_POLICY, policy
                ))
            })?;
        }
        Ok(())
    }

    /// Reject values that would make every run fail
    pub fn validate(&self) -> Result<()> {
        if self.llm.base_url.trim().is_empty() {
            return Err(Error::Config("llm.base_url must not be empty".to_string()));
        }
        if self.llm.model.trim().is_empty() {
            return Err(Error::Config("llm.model must not be empty".to_string()));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(Error::Config(format!(
                "llm.temperature must be within 0.0-2.0, got {}",
                self.llm.temperature
            )));
        }
        if self.pipeline.transcript_limit == 0 {
            return Err(Error::Config("pipeline.transcript_limit must be positive".to_string()));
        }
        if self.retriever.enabled && self.retriever.top_k == 0 {
            warn!("retriever.top_k is 0; retrieval will return no context");
        }
        Ok(())
    }

    /// Write this configuration as TOML (used by `voxlens-ai init-config`)
    pub fn write(&self, target: &Path) -> Result<()> {
        write_toml_config(self, target)?;
        info!("Configuration written to {}", target.display());
        Ok(())
    }
}

/// Default location for `init-config`
pub fn default_config_path() -> Option<PathBuf> {
    user_config_path(CONFIG_FILE_NAME)
}
