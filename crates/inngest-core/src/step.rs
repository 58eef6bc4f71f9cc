//! Step plan records exchanged with the orchestrator.

use crate::JsonMap;
use serde::{Deserialize, Serialize};

/// Step operation kind, serialized with the orchestrator's opcode names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepOp {
    /// A `run` step that executed (or is scheduled to execute)
    StepPlanned,
    /// A timer the orchestrator resumes after
    Sleep,
    /// A pause until a matching event arrives or the wait times out
    WaitForEvent,
    /// An invocation of another function by composite id
    InvokeFunction,
}

impl StepOp {
    /// Whether the orchestrator, not the SDK, performs this operation
    pub fn is_deferred(&self) -> bool {
        !matches!(self, Self::StepPlanned)
    }
}

/// One entry of the plan list reported back to the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedStep {
    /// Hash-id of the step within the run
    pub id: String,
    pub op: StepOp,
    /// The caller-provided step id, for display
    #[serde(rename = "displayName")]
    pub display_name: String,
    /// Op-specific options
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opts: Option<JsonMap>,
}

impl PlannedStep {
    /// Create a plan entry
    pub fn new(id: impl Into<String>, op: StepOp, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            op,
            display_name: display_name.into(),
            opts: None,
        }
    }

    /// Attach op-specific options
    pub fn opts(mut self, opts: JsonMap) -> Self {
        self.opts = Some(opts);
        self
    }
}

/// The `error` half of a memoized step record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepErrorRecord {
    #[serde(default = "default_error_name")]
    pub name: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

fn default_error_name() -> String {
    "Error".to_string()
}
