//! Servable functions: a validated configuration paired with a handler.

use crate::step::Step;
use futures::future::BoxFuture;
use inngest_core::{Event, FunctionConfig, FunctionError, Json};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// What a handler resolves to: the run's final value, or a taxonomy error
pub type HandlerOutput = std::result::Result<Json, FunctionError>;

/// Boxed handler invoked once per attempt
pub type Handler = Arc<dyn Fn(FunctionContext) -> BoxFuture<'static, HandlerOutput> + Send + Sync>;

/// Per-invocation context handed to a handler
#[derive(Debug, Clone)]
pub struct FunctionContext {
    /// The triggering event
    pub event: Event,
    /// All events for batch triggers; contains `event` otherwise
    pub events: Vec<Event>,
    /// Identifier of the run this attempt belongs to
    pub run_id: String,
    /// Zero-indexed attempt number
    pub attempt: u32,
    /// The step engine for this attempt
    pub step: Step,
}

/// A user-defined function the serve handler can execute
#[derive(Clone)]
pub struct ServableFunction {
    config: FunctionConfig,
    handler: Handler,
}

impl ServableFunction {
    /// Pair a configuration with a handler, validating the configuration
    pub fn new<F, Fut>(config: FunctionConfig, handler: F) -> inngest_core::Result<Self>
    where
        F: Fn(FunctionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerOutput> + Send + 'static,
    {
        config.validate()?;
        Ok(Self {
            config,
            handler: Arc::new(move |ctx| Box::pin(handler(ctx))),
        })
    }

    /// The function id, unique within the app
    pub fn id(&self) -> &str {
        &self.config.id
    }

    /// The orchestrator-visible identifier
    pub fn composite_id(&self, app_id: &str) -> String {
        self.config.composite_id(app_id)
    }

    /// The function configuration
    pub fn config(&self) -> &FunctionConfig {
        &self.config
    }

    /// Invoke the handler for one attempt
    pub(crate) fn call(&self, ctx: FunctionContext) -> BoxFuture<'static, HandlerOutput> {
        (self.handler)(ctx)
    }
}

impl fmt::Debug for ServableFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServableFunction")
            .field("id", &self.config.id)
            .field("triggers", &self.config.triggers.len())
            .finish_non_exhaustive()
    }
}
