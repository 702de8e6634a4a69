//! Pipeline Orchestrator
//!
//! Runs stages over a dependency DAG of shared-state keys and merges each
//! stage's single output key into the [`SharedState`].
//!
//! # Scheduling
//! A stage depends on every stage whose output key it reads; keys no stage
//! produces are initial inputs. Stages are grouped into levels: every stage
//! in a level has all of its dependencies completed in earlier levels, and
//! the stages of a level run concurrently on read-only views.
//!
//! # Stage phases
//! `Pending → Ready → Running → Completed | Failed`
//!
//! # Failure policy
//! - **abort** (default): the first fatal stage error ends the run and is
//!   returned to the caller; no partial state is returned
//! - **substitute:** the failed stage's output key receives a degraded
//!   placeholder and dependants still run

use crate::error::{PipelineError, PipelineResult, StageError};
use crate::stages::{default_stages, PipelineStage, StageRuntime};
use crate::state::{SharedState, StateError};
use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use voxlens_common::events::{EventBus, PipelineEvent};

/// Handling of a fatal stage error
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Propagate the error and stop the run
    #[default]
    Abort,
    /// Merge a degraded placeholder and continue
    Substitute,
}

/// Per-stage lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StagePhase {
    Pending,
    Ready,
    Running,
    Completed,
    Failed,
}

/// Outcome of a completed run
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Run identifier used in log lines
    pub run_id: Uuid,
    pub state: SharedState,
    /// Final phase of each stage, in declaration order
    pub phases: Vec<(String, StagePhase)>,
    /// Stages whose merged result is degraded, with the reason
    pub degraded: Vec<(String, String)>,
}

/// Stage scheduler and state owner
pub struct Orchestrator {
    stages: Vec<Arc<dyn PipelineStage>>,
    failure_policy: FailurePolicy,
    events: Option<EventBus>,
}

impl Orchestrator {
    pub fn new(stages: Vec<Arc<dyn PipelineStage>>) -> Self {
        Self {
            stages,
            failure_policy: FailurePolicy::Abort,
            events: None,
        }
    }

    /// Communication, confidence and personality stages over one runtime
    pub fn standard(runtime: &StageRuntime) -> Self {
        Self::new(default_stages(runtime))
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Report progress on an event bus
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    /// Stage indices grouped into concurrently runnable levels
    ///
    /// # Errors
    /// - `PipelineError::DuplicateOutput` if two stages write the same key
    /// - `PipelineError::DependencyCycle` if the reads form a cycle
    pub fn plan(&self) -> PipelineResult<Vec<Vec<usize>>> {
        let mut producers: HashMap<&str, usize> = HashMap::new();
        for (index, stage) in self.stages.iter().enumerate() {
            if let Some(&first) = producers.get(stage.output_key()) {
                return Err(PipelineError::DuplicateOutput {
                    key: stage.output_key().to_string(),
                    first: self.stages[first].name().to_string(),
                    second: stage.name().to_string(),
                });
            }
            producers.insert(stage.output_key(), index);
        }

        let dependencies: Vec<Vec<usize>> = self
            .stages
            .iter()
            .map(|stage| {
                stage
                    .reads()
                    .into_iter()
                    .filter_map(|key| producers.get(key).copied())
                    .collect()
            })
            .collect();

        let mut done = vec![false; self.stages.len()];
        let mut remaining: Vec<usize> = (0..self.stages.len()).collect();
        let mut levels = Vec::new();

        while !remaining.is_empty() {
            let (ready, blocked): (Vec<usize>, Vec<usize>) = remaining
                .iter()
                .partition(|&&index| dependencies[index].iter().all(|&dep| done[dep]));

            if ready.is_empty() {
                return Err(PipelineError::DependencyCycle(
                    blocked
                        .iter()
                        .map(|&index| self.stages[index].name().to_string())
                        .collect(),
                ));
            }

            for &index in &ready {
                done[index] = true;
            }
            levels.push(ready);
            remaining = blocked;
        }

        Ok(levels)
    }

    /// Run every stage and return the merged state
    ///
    /// # Errors
    /// A planning error, or the first fatal stage error under the abort policy
    pub async fn run(&self, initial: SharedState) -> PipelineResult<SharedState> {
        self.run_with_report(initial).await.map(|report| report.state)
    }

    /// Run every stage and return the merged state with per-stage outcomes
    pub async fn run_with_report(&self, initial: SharedState) -> PipelineResult<PipelineReport> {
        let run_id = Uuid::new_v4();
        let levels = self.plan()?;

        for stage in &self.stages {
            if initial.contains_key(stage.output_key()) {
                return Err(StateError::KeyAlreadyWritten(stage.output_key().to_string()).into());
            }
        }

        let order: Vec<String> = levels
            .iter()
            .flatten()
            .map(|&index| self.stages[index].name().to_string())
            .collect();
        info!(%run_id, stages = ?order, levels = levels.len(), "Pipeline started");
        self.emit(PipelineEvent::PipelineStarted {
            stages: order,
            timestamp: Utc::now(),
        });

        let mut state = initial;
        let mut phases = vec![StagePhase::Pending; self.stages.len()];
        let mut degraded = Vec::new();

        for level in levels {
            for &index in &level {
                phases[index] = StagePhase::Ready;
                debug!(%run_id, stage = self.stages[index].name(), "Stage ready");
            }

            let runs = level.iter().map(|&index| {
                let stage = &self.stages[index];
                let view = state.view(&stage.reads());
                phases[index] = StagePhase::Running;
                self.emit(PipelineEvent::StageStarted {
                    stage: stage.name().to_string(),
                    timestamp: Utc::now(),
                });
                async move { (index, stage.run(&view).await) }
            });
            let results = join_all(runs.collect::<Vec<_>>()).await;

            for (index, result) in results {
                let stage = &self.stages[index];
                match result {
                    Ok(output) => {
                        state.merge(stage.output_key(), Value::Object(output.value))?;
                        phases[index] = StagePhase::Completed;
                        match output.degraded {
                            Some(reason) => {
                                self.emit_degraded(stage.as_ref(), &reason);
                                degraded.push((stage.name().to_string(), reason));
                            }
                            None => self.emit(PipelineEvent::StageCompleted {
                                stage: stage.name().to_string(),
                                output_key: stage.output_key().to_string(),
                                timestamp: Utc::now(),
                            }),
                        }
                    }
                    Err(e) => {
                        phases[index] = StagePhase::Failed;
                        self.emit(PipelineEvent::StageFailed {
                            stage: stage.name().to_string(),
                            message: e.to_string(),
                            timestamp: Utc::now(),
                        });
                        let reason = self.handle_failure(run_id, e)?;
                        state.merge(stage.output_key(), Value::Object(stage.degraded(&reason)))?;
                        self.emit_degraded(stage.as_ref(), &reason);
                        degraded.push((stage.name().to_string(), reason));
                    }
                }
            }
        }

        let keys: Vec<String> = state.keys().cloned().collect();
        info!(%run_id, keys = ?keys, degraded = degraded.len(), "Pipeline completed");
        self.emit(PipelineEvent::PipelineCompleted {
            keys,
            timestamp: Utc::now(),
        });

        let phases = self
            .stages
            .iter()
            .zip(phases)
            .map(|(stage, phase)| (stage.name().to_string(), phase))
            .collect();

        Ok(PipelineReport {
            run_id,
            state,
            phases,
            degraded,
        })
    }

    /// Apply the failure policy; returns the substitution reason
    fn handle_failure(&self, run_id: Uuid, e: StageError) -> PipelineResult<String> {
        match self.failure_policy {
            FailurePolicy::Abort => {
                error!(%run_id, stage = e.stage(), error = %e, "Stage failed, aborting pipeline");
                Err(e.into())
            }
            FailurePolicy::Substitute => {
                warn!(%run_id, stage = e.stage(), error = %e, "Stage failed, substituting degraded result");
                Ok(e.to_string())
            }
        }
    }

    fn emit_degraded(&self, stage: &dyn PipelineStage, reason: &str) {
        self.emit(PipelineEvent::StageDegraded {
            stage: stage.name().to_string(),
            output_key: stage.output_key().to_string(),
            reason: reason.to_string(),
            timestamp: Utc::now(),
        });
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(events) = &self.events {
            events.emit_lossy(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::StageOutput;
    use crate::state::StateView;
    use crate::types::Mapping;
    use async_trait::async_trait;

    struct KeyStage {
        name: &'static str,
        output: &'static str,
        reads: Vec<&'static str>,
    }

    #[async_trait]
    impl PipelineStage for KeyStage {
        fn name(&self) -> &str {
            self.name
        }

        fn output_key(&self) -> &str {
            self.output
        }

        fn reads(&self) -> Vec<&str> {
            self.reads.clone()
        }

        async fn run(&self, _view: &StateView) -> Result<StageOutput, StageError> {
            Ok(StageOutput {
                key: self.output,
                value: Mapping::new(),
                degraded: None,
            })
        }

        fn degraded(&self, _message: &str) -> Mapping {
            Mapping::new()
        }
    }

    fn stage(name: &'static str, output: &'static str, reads: &[&'static str]) -> Arc<dyn PipelineStage> {
        Arc::new(KeyStage {
            name,
            output,
            reads: reads.to_vec(),
        })
    }

    #[test]
    fn test_plan_levels() {
        let orchestrator = Orchestrator::new(vec![
            stage("c", "c_out", &["a_out", "b_out"]),
            stage("a", "a_out", &["transcript"]),
            stage("b", "b_out", &["audio_features"]),
        ]);
        assert_eq!(orchestrator.plan().unwrap(), vec![vec![1, 2], vec![0]]);
    }

    #[test]
    fn test_plan_detects_cycle() {
        let orchestrator = Orchestrator::new(vec![
            stage("a", "a_out", &["b_out"]),
            stage("b", "b_out", &["a_out"]),
            stage("c", "c_out", &[]),
        ]);
        match orchestrator.plan() {
            Err(PipelineError::DependencyCycle(stages)) => assert_eq!(stages, vec!["a", "b"]),
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_plan_rejects_duplicate_outputs() {
        let orchestrator = Orchestrator::new(vec![
            stage("a", "shared", &[]),
            stage("b", "shared", &[]),
        ]);
        assert!(matches!(
            orchestrator.plan(),
            Err(PipelineError::DuplicateOutput { .. })
        ));
    }

    #[tokio::test]
    async fn test_initial_key_collision_rejected() {
        let orchestrator = Orchestrator::new(vec![stage("a", "transcript", &[])]);
        let result = orchestrator.run(SharedState::from_inputs("hi", None)).await;
        assert!(matches!(
            result,
            Err(PipelineError::State(StateError::KeyAlreadyWritten(_)))
        ));
    }

    #[test]
    fn test_policy_serde() {
        assert_eq!(
            serde_json::to_value(FailurePolicy::Substitute).unwrap(),
            "substitute"
        );
        assert_eq!(FailurePolicy::default(), FailurePolicy::Abort);
    }
}
