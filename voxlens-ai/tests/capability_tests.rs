//! Capability Gate Tests
//!
//! Resolution happens once; unavailable collaborators are replaced by
//! same-interface fallbacks, and stages complete either way.

mod helpers;

use helpers::*;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use voxlens_ai::capability::{CapabilityGate, RagRetriever, RetrievalBackend};
use voxlens_ai::config::ValidationConfig;
use voxlens_ai::stages::{communication_spec, AnalysisStage, PipelineStage, StageRuntime};
use voxlens_ai::state::SharedState;
use voxlens_ai::types::{ContextRetriever, RetrievalError};

fn ok_context() -> Result<String, RetrievalError> {
    Ok("Pauses of 0.5-1s help listeners follow.".to_string())
}

fn connection_error() -> Result<String, RetrievalError> {
    Err(RetrievalError::Connection("connection reset".to_string()))
}

fn invalid_argument() -> Result<String, RetrievalError> {
    Err(RetrievalError::InvalidArgument("query too long".to_string()))
}

#[tokio::test]
async fn test_unreachable_retriever_resolves_to_fallback_once() {
    // Given: a backend that fails its health check
    let backend = Arc::new(ScriptedBackend::new(false, ok_context));
    let gate = CapabilityGate::new(
        Some(backend.clone() as Arc<dyn RetrievalBackend>),
        ValidationConfig::default(),
    );

    // When: resolved twice
    let first = gate.resolve().await.retriever.name();
    let second = gate.resolve().await.retriever.name();

    // Then: fallback installed, service probed once, never queried
    assert_eq!(first, "noop");
    assert_eq!(second, "noop");
    assert_eq!(backend.health_checks.load(Ordering::SeqCst), 1);
    assert_eq!(backend.fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_healthy_retriever_resolves_to_rag() {
    let backend = Arc::new(ScriptedBackend::new(true, ok_context));
    let gate = CapabilityGate::new(Some(backend.clone()), ValidationConfig::default());

    let capabilities = gate.resolve().await;
    let context = capabilities
        .retriever
        .get_context("communication", &json!({"speech_rate": 150}))
        .await;

    assert_eq!(capabilities.retriever.name(), "rag");
    assert_eq!(context, "Pauses of 0.5-1s help listeners follow.");
    assert_eq!(backend.fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_retrieval_errors_absorbed_as_empty_context() {
    for fetch in [connection_error as fn() -> _, invalid_argument] {
        let retriever = RagRetriever::new(Arc::new(ScriptedBackend::new(true, fetch)));
        let context = retriever
            .get_context("confidence", &json!({"energy_level": "High"}))
            .await;
        assert_eq!(context, "");
    }
}

#[tokio::test]
async fn test_empty_subject_skips_backend() {
    let backend = Arc::new(ScriptedBackend::new(true, ok_context));
    let retriever = RagRetriever::new(backend.clone());

    assert_eq!(retriever.get_context("communication", &json!({})).await, "");
    assert_eq!(backend.fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_stage_completes_with_unresolved_retriever() {
    // Given: the gate fell back for retrieval
    let gate = CapabilityGate::new(None, ValidationConfig::default());
    let capabilities = gate.resolve().await.clone();
    let model = Arc::new(ScriptedModel::well_formed());
    let stage = AnalysisStage::new(
        communication_spec(),
        StageRuntime::new(model.clone(), capabilities),
    );
    let state = SharedState::from_inputs("We grew revenue by ten percent.", Some(sample_features()));

    // When
    let output = stage.run(&state.view(&stage.reads())).await.unwrap();

    // Then: no context section, schema-valid result
    assert!(output.degraded.is_none());
    assert!(!model.prompts()[0].contains("EXPERT KNOWLEDGE"));
    assert_eq!(output.value["communication_score"], 82);
}
