//! The step engine: memoization, step-identity derivation, and planned-step
//! emission.
//!
//! Each invocation gets a fresh engine seeded with the memo the orchestrator
//! supplied. A step call whose hash-id is in the memo consumes the recorded
//! outcome; a miss either executes immediately (`run`) or appends a deferred
//! plan entry (`sleep`, `wait_for_event`, `invoke`) for the orchestrator to
//! perform. Plan entries accumulate in call order.
//!
//! After a deferred miss the handler keeps running; relying on that op's
//! return value within the same attempt is a user-side error, since the value
//! only exists in the memo of a later attempt.

use inngest_core::step::{PlannedStep, StepErrorRecord, StepOp};
use inngest_core::{Event, FunctionError, Json, JsonMap, SleepDuration};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::json;
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default)]
struct EngineState {
    memo: HashMap<String, Json>,
    counters: HashMap<String, u32>,
    plan: Vec<PlannedStep>,
}

/// Per-invocation step tool handed to function handlers.
///
/// Cloning is cheap and shares the engine, so the serve handler keeps a handle
/// to collect the plan after the handler returns.
#[derive(Debug, Clone, Default)]
pub struct Step {
    state: Arc<Mutex<EngineState>>,
}

impl Step {
    /// Create an engine seeded with the memo of completed steps
    pub fn new(memo: HashMap<String, Json>) -> Self {
        Self {
            state: Arc::new(Mutex::new(EngineState {
                memo,
                counters: HashMap::new(),
                plan: Vec::new(),
            })),
        }
    }

    /// Derive the hash-id for the next occurrence of `id`.
    ///
    /// The first occurrence hashes the id itself, the second hashes
    /// `"<id>:0"`, the third `"<id>:1"`, matching the orchestrator's
    /// numbering for duplicate ids.
    fn next_hashed_id(&self, id: &str) -> String {
        let mut state = self.state.lock();
        let count = state.counters.entry(id.to_string()).or_insert(0);
        let key = if *count == 0 {
            id.to_string()
        } else {
            format!("{id}:{}", *count - 1)
        };
        *count += 1;
        hex::encode(Sha1::digest(key.as_bytes()))
    }

    fn memoized(&self, hashed_id: &str) -> Option<Json> {
        self.state.lock().memo.get(hashed_id).cloned()
    }

    fn push_plan(&self, entry: PlannedStep) {
        self.state.lock().plan.push(entry);
    }

    /// Execute a code step, or consume its memoized outcome on replay.
    ///
    /// On a memo miss the thunk runs immediately and its value is returned;
    /// a plan entry records that the step executed. On a hit the thunk is
    /// never invoked: the recorded value is decoded, and a recorded failure
    /// is re-raised as a step error.
    pub async fn run<T, F, Fut>(&self, id: &str, f: F) -> Result<T, FunctionError>
    where
        T: DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, FunctionError>>,
    {
        let hashed_id = self.next_hashed_id(id);

        if let Some(record) = self.memoized(&hashed_id) {
            debug!(step = id, "step replayed from memo");
            let value = memo_value(id, record)?;
            return serde_json::from_value(value).map_err(|err| {
                FunctionError::other(format!("failed to decode memoized step '{id}': {err}"))
            });
        }

        debug!(step = id, "executing step");
        let value = f().await?;
        self.push_plan(PlannedStep::new(hashed_id, StepOp::StepPlanned, id));
        Ok(value)
    }

    /// Defer a pause to the orchestrator, accepting seconds or `<int><unit>`
    /// text.
    pub fn sleep(
        &self,
        id: &str,
        duration: impl Into<SleepDuration>,
    ) -> Result<(), FunctionError> {
        let duration = duration.into().canonical()?;
        let hashed_id = self.next_hashed_id(id);

        if self.memoized(&hashed_id).is_some() {
            debug!(step = id, "sleep already elapsed");
            return Ok(());
        }

        let mut opts = JsonMap::new();
        opts.insert("duration".to_string(), json!(duration));
        self.push_plan(PlannedStep::new(hashed_id, StepOp::Sleep, id).opts(opts));
        Ok(())
    }

    /// Defer a wait for a matching event; `None` until an event arrives, and
    /// `None` again if the wait timed out.
    pub fn wait_for_event(
        &self,
        id: &str,
        event: &str,
        timeout: impl Into<SleepDuration>,
        expression: Option<&str>,
    ) -> Result<Option<Event>, FunctionError> {
        let timeout = timeout.into().canonical()?;
        let hashed_id = self.next_hashed_id(id);

        if let Some(record) = self.memoized(&hashed_id) {
            let value = memo_value(id, record)?;
            if value.is_null() {
                return Ok(None);
            }
            let matched = serde_json::from_value(value).map_err(|err| {
                FunctionError::other(format!(
                    "failed to decode event for step '{id}': {err}"
                ))
            })?;
            return Ok(Some(matched));
        }

        let mut opts = JsonMap::new();
        opts.insert("event".to_string(), json!(event));
        opts.insert("timeout".to_string(), json!(timeout));
        if let Some(expression) = expression {
            opts.insert("if".to_string(), json!(expression));
        }
        self.push_plan(PlannedStep::new(hashed_id, StepOp::WaitForEvent, id).opts(opts));
        Ok(None)
    }

    /// Defer an invocation of another function by composite id; `None` until
    /// the invoked run completes.
    pub fn invoke(
        &self,
        id: &str,
        function_id: &str,
        payload: Json,
    ) -> Result<Option<Json>, FunctionError> {
        let hashed_id = self.next_hashed_id(id);

        if let Some(record) = self.memoized(&hashed_id) {
            return memo_value(id, record).map(Some);
        }

        let mut opts = JsonMap::new();
        opts.insert("function_id".to_string(), json!(function_id));
        opts.insert("payload".to_string(), payload);
        self.push_plan(PlannedStep::new(hashed_id, StepOp::InvokeFunction, id).opts(opts));
        Ok(None)
    }

    /// The plan entries accumulated so far, in call order
    pub fn planned_steps(&self) -> Vec<PlannedStep> {
        self.state.lock().plan.clone()
    }

    /// Whether the plan contains work only the orchestrator can perform
    pub fn has_deferred(&self) -> bool {
        self.state.lock().plan.iter().any(|step| step.op.is_deferred())
    }
}

/// Interpret a memo record by shape: `{"data": v}` yields `v`, `{"error": e}`
/// re-raises, anything else passes through as the value itself.
fn memo_value(id: &str, record: Json) -> Result<Json, FunctionError> {
    let Json::Object(mut map) = record else {
        return Ok(record);
    };

    if let Some(error) = map.remove("error") {
        let record: StepErrorRecord =
            serde_json::from_value(error).unwrap_or_else(|_| StepErrorRecord {
                name: "Error".to_string(),
                message: "step failed".to_string(),
                stack: None,
            });
        return Err(FunctionError::step(
            record.name,
            if record.message.is_empty() {
                format!("step '{id}' failed")
            } else {
                record.message
            },
            record.stack,
        ));
    }

    if let Some(data) = map.remove("data") {
        return Ok(data);
    }

    Ok(Json::Object(map))
}
