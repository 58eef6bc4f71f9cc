use crate::{JsonMap, Result};
use derive_setters::Setters;
use serde::{Deserialize, Serialize};

/// Core event type sent to and received from the orchestrator.
///
/// Events are immutable once constructed; the setters consume and return the
/// value, so mutation only happens while building. The wire form omits
/// `user` when it was never set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Setters)]
#[setters(strip_option, into)]
pub struct Event {
    /// Unique event identifier, generated when absent
    #[serde(default = "generate_event_id")]
    pub id: String,
    /// Event name, e.g. `"billing/invoice.paid"`
    #[setters(skip)]
    pub name: String,
    /// Event payload
    #[serde(default)]
    pub data: JsonMap,
    /// Optional user attribution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<JsonMap>,
    /// Event timestamp in Unix milliseconds, populated when absent
    #[serde(default = "now_millis")]
    pub ts: i64,
}

fn generate_event_id() -> String {
    format!("evt_{}", uuid::Uuid::new_v4())
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl Event {
    /// Create a new event with a generated id and the current timestamp
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: generate_event_id(),
            name: name.into(),
            data: JsonMap::new(),
            user: None,
            ts: now_millis(),
        }
    }

    /// Get the event name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Validate the event
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(crate::Error::event("Event name cannot be empty"));
        }

        if self.name.len() > 255 {
            return Err(crate::Error::event(
                "Event name too long (max 255 characters)",
            ));
        }

        Ok(())
    }
}
