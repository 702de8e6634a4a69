//! Shared pipeline state
//!
//! An append-only mapping from input names and stage output keys to values.
//! The orchestrator owns the [`SharedState`]; a stage only ever sees a
//! [`StateView`] restricted to the keys it declares, and its single output
//! key is merged back by the orchestrator once the stage completes.

use crate::types::{AudioFeatures, Mapping};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Input key carrying the speech transcript
pub const TRANSCRIPT: &str = "transcript";

/// Input key carrying the acoustic feature mapping
pub const AUDIO_FEATURES: &str = "audio_features";

/// State access error
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StateError {
    /// Append-only violation
    #[error("State key '{0}' already written")]
    KeyAlreadyWritten(String),

    /// Key present with an unexpected JSON type
    #[error("State key '{key}' must be {expected}, found {found}")]
    UnexpectedShape {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// Append-only-by-merge pipeline state
///
/// Serializes as a plain JSON object (key → value), which is the shape
/// surfaced to callers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SharedState {
    entries: Mapping,
}

impl SharedState {
    /// Empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Initial state from the pipeline inputs
    ///
    /// Absent features are valid input; stages that need them degrade.
    pub fn from_inputs(transcript: impl Into<String>, features: Option<AudioFeatures>) -> Self {
        let mut entries = Mapping::new();
        entries.insert(TRANSCRIPT.to_string(), Value::String(transcript.into()));
        if let Some(features) = features {
            entries.insert(AUDIO_FEATURES.to_string(), features.to_value());
        }
        Self { entries }
    }

    /// Initial state from an arbitrary input mapping
    pub fn from_mapping(entries: Mapping) -> Self {
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write `key` once
    ///
    /// # Errors
    /// `StateError::KeyAlreadyWritten` if the key exists; the state is unchanged.
    pub fn merge(&mut self, key: &str, value: Value) -> Result<(), StateError> {
        if self.entries.contains_key(key) {
            return Err(StateError::KeyAlreadyWritten(key.to_string()));
        }
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    /// Read-only snapshot containing only `keys` (absent keys stay absent)
    pub fn view(&self, keys: &[&str]) -> StateView {
        let entries = keys
            .iter()
            .filter_map(|key| {
                self.entries
                    .get(*key)
                    .map(|value| (key.to_string(), value.clone()))
            })
            .collect();
        StateView { entries }
    }

    pub fn as_mapping(&self) -> &Mapping {
        &self.entries
    }

    pub fn into_mapping(self) -> Mapping {
        self.entries
    }
}

/// Read-only snapshot of the keys a stage declared
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateView {
    entries: Mapping,
}

impl StateView {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Text value; `None` when absent or null
    ///
    /// # Errors
    /// `StateError::UnexpectedShape` when present but not a string
    pub fn text(&self, key: &str) -> Result<Option<&str>, StateError> {
        match self.entries.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(shape_error(key, "a string", other)),
        }
    }

    /// Object value; `None` when absent or null
    ///
    /// # Errors
    /// `StateError::UnexpectedShape` when present but not an object
    pub fn object(&self, key: &str) -> Result<Option<&Mapping>, StateError> {
        match self.entries.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(map)) => Ok(Some(map)),
            Some(other) => Err(shape_error(key, "an object", other)),
        }
    }

    /// Visible keys as a JSON object (retrieval queries, prompt embedding)
    pub fn to_value(&self) -> Value {
        Value::Object(self.entries.clone())
    }
}

fn shape_error(key: &str, expected: &'static str, found: &Value) -> StateError {
    StateError::UnexpectedShape {
        key: key.to_string(),
        expected,
        found: json_type_name(found),
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
