//! Pipeline event types and broadcast event bus
//!
//! Events are advisory progress reports. Nothing in the analysis pipeline
//! depends on a subscriber being present.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Analysis pipeline events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PipelineEvent {
    /// Pipeline run started
    PipelineStarted {
        /// Stage names in scheduling order
        stages: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// Stage dependencies satisfied and execution started
    StageStarted {
        stage: String,
        timestamp: DateTime<Utc>,
    },

    /// Stage produced a validated result
    StageCompleted {
        stage: String,
        /// State key the result was merged under
        output_key: String,
        timestamp: DateTime<Utc>,
    },

    /// Stage produced a degraded result (missing input, or substituted after failure)
    StageDegraded {
        stage: String,
        output_key: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Stage raised a fatal error
    StageFailed {
        stage: String,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Pipeline run finished with every stage merged
    PipelineCompleted {
        /// State keys present in the final state
        keys: Vec<String>,
        timestamp: DateTime<Utc>,
    },
}

impl PipelineEvent {
    /// Stage name for stage-scoped events
    pub fn stage(&self) -> Option<&str> {
        match self {
            PipelineEvent::StageStarted { stage, .. }
            | PipelineEvent::StageCompleted { stage, .. }
            | PipelineEvent::StageDegraded { stage, .. }
            | PipelineEvent::StageFailed { stage, .. } => Some(stage),
            PipelineEvent::PipelineStarted { .. } | PipelineEvent::PipelineCompleted { .. } => None,
        }
    }
}

/// Central event distribution bus
///
/// Uses `tokio::sync::broadcast`: publishing never blocks, slow subscribers
/// observe `Lagged`, and dropped receivers are cleaned up automatically.
///
/// # Examples
///
/// ```
/// use voxlens_common::events::{EventBus, PipelineEvent};
///
/// let bus = EventBus::new(16);
/// let mut rx = bus.subscribe();
/// bus.emit_lossy(PipelineEvent::StageStarted {
///     stage: "communication_agent".to_string(),
///     timestamp: chrono::Utc::now(),
/// });
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PipelineEvent>,
    capacity: usize,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, returning the number of receivers
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: PipelineEvent,
    ) -> Result<usize, broadcast::error::SendError<PipelineEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the no-subscriber case
    pub fn emit_lossy(&self, event: PipelineEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
