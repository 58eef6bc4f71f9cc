//! # Inngest SDK
//!
//! A Rust SDK for hosting durable functions driven by an Inngest-protocol
//! orchestrator. The host serves an HTTP endpoint; the orchestrator calls it
//! to discover functions, then drives each run forward one step at a time,
//! supplying a memo of completed steps with every attempt.
//!
//! ## Serving functions
//!
//! ```rust,no_run
//! use inngest_core::{FunctionConfig, Trigger};
//! use inngest_sdk::{Inngest, ServableFunction, ServeHandler};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Inngest::new("my-app")?;
//!
//! let welcome = ServableFunction::new(
//!     FunctionConfig::new("send-welcome").trigger(Trigger::event("user.created")),
//!     |ctx| async move {
//!         let greeting = ctx
//!             .step
//!             .run("greet", || async { Ok(json!("hello")) })
//!             .await?;
//!         ctx.step.sleep("pause", 60u64)?;
//!         Ok(greeting)
//!     },
//! )?;
//!
//! let handler = Arc::new(ServeHandler::new(client, vec![welcome])?);
//! let router = inngest_sdk::router::serve_router("/api/inngest", handler);
//! # let _ = router;
//! # Ok(())
//! # }
//! ```
//!
//! ## Sending events
//!
//! ```rust,no_run
//! use inngest_core::Event;
//! use inngest_sdk::Inngest;
//!
//! # async fn send() -> Result<(), inngest_sdk::SdkError> {
//! let client = Inngest::new("my-app")?;
//! client.send_event(&Event::new("user.created")).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod function;
pub mod registry;
pub mod router;
pub mod serve;
pub mod signature;
pub mod step;
mod sync;

// Re-export public API
pub use client::{Inngest, SendEventsResponse};
pub use config::{Config, ConfigBuilder, EnvSource, Mode, SystemEnv};
pub use error::{Result, SdkError};
pub use function::{FunctionContext, HandlerOutput, ServableFunction};
pub use registry::FunctionRegistry;
pub use serve::{HttpMethod, ServeHandler, ServeRequest, ServeResponse};
pub use signature::SignatureVerifier;
pub use step::Step;

// Re-export core types for convenience
pub use inngest_core::{Event, FunctionConfig, FunctionError, Json, JsonMap, Trigger};

/// Language tag reported in the SDK identifier
pub const SDK_LANGUAGE: &str = "rust";

/// SDK version reported in the SDK identifier
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// The `X-Inngest-Sdk` identifier, e.g. `rust:v0.1.0`
pub fn sdk_identifier() -> String {
    format!("{SDK_LANGUAGE}:v{SDK_VERSION}")
}

/// Header names exchanged with the orchestrator
pub mod headers {
    pub const SIGNATURE: &str = "x-inngest-signature";
    pub const SERVER_KIND: &str = "x-inngest-server-kind";
    pub const SDK: &str = "x-inngest-sdk";
    pub const REQ_VERSION: &str = "x-inngest-req-version";
    pub const NO_RETRY: &str = "x-inngest-no-retry";
    pub const RETRY_AFTER: &str = "retry-after";
    pub const ENV: &str = "x-inngest-env";
}
