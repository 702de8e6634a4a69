//! Test Helper Utilities
//!
//! Scripted collaborators for exercising stages and the orchestrator
//! without a model server or retrieval service.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Barrier;
use voxlens_ai::capability::{Capabilities, PassthroughValidator, RetrievalBackend};
use voxlens_ai::stages::prompts::stage_for_prompt;
use voxlens_ai::stages::{StageRuntime, COMMUNICATION_STAGE, CONFIDENCE_STAGE, PERSONALITY_STAGE};
use voxlens_ai::types::{ContextRetriever, LanguageModel, LlmError, RetrievalError};
use voxlens_ai::validators::{SchemaValidator, ValidationPolicy};
use voxlens_ai::{AudioFeatures, Mapping};

pub fn object(value: Value) -> Mapping {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {}", other),
    }
}

pub fn sample_features() -> AudioFeatures {
    AudioFeatures::new(object(json!({
        "speech_rate": 142.0,
        "pitch_variance": 28.5,
        "pause_ratio": 0.18,
        "energy_level": "Medium"
    })))
}

pub fn communication_json() -> Value {
    json!({
        "communication_score": 82,
        "clarity_level": "High",
        "fluency_level": "High",
        "speech_pacing": "Balanced",
        "key_observations": ["Clear articulation"],
        "communication_strengths": ["Well structured"],
        "communication_gaps": [],
        "improvement_suggestions": ["Pause before key points"]
    })
}

pub fn confidence_json() -> Value {
    json!({
        "confidence_score": 68,
        "confidence_level": "Medium",
        "emotional_tone": "Positive",
        "vocal_energy_assessment": "Medium",
        "confidence_indicators": ["Steady volume"],
        "possible_challenges": ["Flat pitch at sentence ends"],
        "confidence_enhancement_tips": ["Project the closing sentence"]
    })
}

pub fn personality_json() -> Value {
    json!({
        "personality_type": "Ambivert",
        "interaction_style": "Balanced",
        "professional_presence": "Competent",
        "key_personality_traits": ["Composed"],
        "strengths_in_interaction": ["Listens before answering"],
        "growth_opportunities": ["Show more enthusiasm"],
        "overall_summary": "A composed speaker with a measured, balanced presence."
    })
}

/// Stage recognised from the prompt's template header
pub fn stage_of(prompt: &str) -> &'static str {
    match stage_for_prompt(prompt) {
        Some(COMMUNICATION_STAGE) => "communication",
        Some(CONFIDENCE_STAGE) => "confidence",
        Some(PERSONALITY_STAGE) => "personality",
        _ => "unknown",
    }
}

/// Model answering each stage with a fixed text and recording every prompt
#[derive(Default)]
pub struct ScriptedModel {
    communication: String,
    confidence: String,
    personality: String,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    /// Well-formed JSON for every stage
    pub fn well_formed() -> Self {
        Self::new(
            &communication_json().to_string(),
            &confidence_json().to_string(),
            &personality_json().to_string(),
        )
    }

    pub fn new(communication: &str, confidence: &str, personality: &str) -> Self {
        Self {
            communication: communication.to_string(),
            confidence: confidence.to_string(),
            personality: personality.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn invoke(&self, prompt: &str) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(match stage_of(prompt) {
            "personality" => self.personality.clone(),
            "confidence" => self.confidence.clone(),
            _ => self.communication.clone(),
        })
    }
}

/// Model that fails every call
pub struct FailingModel;

#[async_trait]
impl LanguageModel for FailingModel {
    fn name(&self) -> &str {
        "failing"
    }

    async fn invoke(&self, _prompt: &str) -> Result<String, LlmError> {
        Err(LlmError::Connection("connection refused".to_string()))
    }
}

/// Model failing only for one stage
pub struct FailingStageModel {
    pub failing: &'static str,
    pub inner: ScriptedModel,
}

#[async_trait]
impl LanguageModel for FailingStageModel {
    fn name(&self) -> &str {
        "failing-stage"
    }

    async fn invoke(&self, prompt: &str) -> Result<String, LlmError> {
        if stage_of(prompt) == self.failing {
            return Err(LlmError::Service {
                status: 500,
                message: "model crashed".to_string(),
            });
        }
        self.inner.invoke(prompt).await
    }
}

/// Model whose communication and confidence calls only return once both
/// are in flight at the same time
pub struct BarrierModel {
    barrier: Barrier,
    inner: ScriptedModel,
    pub order: Mutex<Vec<&'static str>>,
}

impl BarrierModel {
    pub fn new() -> Self {
        Self {
            barrier: Barrier::new(2),
            inner: ScriptedModel::well_formed(),
            order: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl LanguageModel for BarrierModel {
    fn name(&self) -> &str {
        "barrier"
    }

    async fn invoke(&self, prompt: &str) -> Result<String, LlmError> {
        let stage = stage_of(prompt);
        if stage != "personality" {
            self.barrier.wait().await;
        }
        self.order.lock().unwrap().push(stage);
        self.inner.invoke(prompt).await
    }
}

/// Retriever returning fixed context and recording each request
pub struct RecordingRetriever {
    context: String,
    pub calls: Mutex<Vec<(String, Value)>>,
}

impl RecordingRetriever {
    pub fn new(context: &str) -> Self {
        Self {
            context: context.to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ContextRetriever for RecordingRetriever {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn get_context(&self, domain: &str, subject: &Value) -> String {
        self.calls
            .lock()
            .unwrap()
            .push((domain.to_string(), subject.clone()));
        self.context.clone()
    }
}

/// Retrieval backend with scripted health and fetch results
pub struct ScriptedBackend {
    pub healthy: bool,
    pub fetch: fn() -> Result<String, RetrievalError>,
    pub health_checks: AtomicUsize,
    pub fetches: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new(healthy: bool, fetch: fn() -> Result<String, RetrievalError>) -> Self {
        Self {
            healthy,
            fetch,
            health_checks: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RetrievalBackend for ScriptedBackend {
    async fn health_check(&self) -> Result<(), RetrievalError> {
        self.health_checks.fetch_add(1, Ordering::SeqCst);
        if self.healthy {
            Ok(())
        } else {
            Err(RetrievalError::Connection("connection refused".to_string()))
        }
    }

    async fn fetch_context(&self, _domain: &str, _query: &Value) -> Result<String, RetrievalError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        (self.fetch)()
    }
}

/// Runtime with fallback capabilities
pub fn minimal_runtime(model: Arc<dyn LanguageModel>) -> StageRuntime {
    StageRuntime::new(model, Capabilities::minimal())
}

/// Runtime with the strict schema validator and a custom retriever
pub fn validating_runtime(
    model: Arc<dyn LanguageModel>,
    retriever: Arc<dyn ContextRetriever>,
) -> StageRuntime {
    StageRuntime::new(
        model,
        Capabilities::new(
            retriever,
            Arc::new(SchemaValidator::new(ValidationPolicy::Strict)),
        ),
    )
}

/// Runtime with a custom retriever and no validation
pub fn retrieving_runtime(
    model: Arc<dyn LanguageModel>,
    retriever: Arc<dyn ContextRetriever>,
) -> StageRuntime {
    StageRuntime::new(model, Capabilities::new(retriever, Arc::new(PassthroughValidator)))
}

/// Upper bound for tests that would otherwise hang on a broken schedule
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);
