//! # Inngest Core
//!
//! Foundational types for the Inngest Rust SDK: events, function
//! configuration, triggers, step plan records, and the error taxonomy the
//! serve handler maps onto orchestrator-visible responses.
//!
//! This crate holds value types only; everything that talks to the network
//! lives in `inngest-sdk`.

pub mod duration;
pub mod error;
pub mod event;
pub mod function;
pub mod step;

// Re-export commonly used types
pub use duration::{parse_duration, SleepDuration};
pub use error::{Error, FunctionError, Result};
pub use event::Event;
pub use function::{
    Concurrency, ConcurrencyScope, Debounce, FunctionConfig, Priority, Singleton, SingletonMode,
    Trigger,
};
pub use step::{PlannedStep, StepErrorRecord, StepOp};

/// Common type aliases for convenience
pub type DateTime = chrono::DateTime<chrono::Utc>;
pub type Json = serde_json::Value;
pub type JsonMap = serde_json::Map<String, serde_json::Value>;
