//! Job payload.
//!
//! The body a caller submits. Only the workload reads it.

use serde::{Deserialize, Serialize};

/// Body of a submitted job.
///
/// The engine treats this as opaque; only the workload looks inside. Non-empty
/// `prompt` is guaranteed by the caller's validation layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobPayload {
    pub prompt: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub parameters: serde_json::Map<String, serde_json::Value>,
}

impl JobPayload {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: None,
            parameters: serde_json::Map::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// Input size in characters (drives the simulated duration).
    pub fn input_chars(&self) -> usize {
        self.prompt.chars().count()
    }
}
