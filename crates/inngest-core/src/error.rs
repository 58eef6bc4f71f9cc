use thiserror::Error;

/// Core error types for the Inngest SDK
#[derive(Error, Debug)]
pub enum Error {
    #[error("Event error: {message}")]
    Event { message: String },

    #[error("Function error: {message}")]
    Function { message: String },

    #[error("Validation error: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },

    #[error("Generic error: {message}")]
    Generic { message: String },
}

impl Error {
    /// Create a new event error
    pub fn event(message: impl Into<String>) -> Self {
        Self::Event {
            message: message.into(),
        }
    }

    /// Create a new function error
    pub fn function(message: impl Into<String>) -> Self {
        Self::Function {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Error>;

/// Failures a function handler can surface to the serve handler.
///
/// Each variant carries distinct retry semantics: the serve handler inspects
/// the variant to pick the response status and the retry headers the
/// orchestrator acts on.
#[derive(Error, Debug)]
pub enum FunctionError {
    /// The input is invalid in a way a retry will not fix.
    #[error("{message}")]
    NonRetriable { message: String },

    /// A temporary block with a known duration; the orchestrator should
    /// retry after the given delay (seconds or an RFC 3339 timestamp).
    #[error("{message}")]
    RetryAfter { message: String, after: String },

    /// A previously-failed step re-raised from the memo on replay.
    #[error("step '{name}' failed: {message}")]
    Step {
        name: String,
        message: String,
        stack: Option<String>,
    },

    /// Any other failure; retried by the orchestrator.
    #[error("{message}")]
    Other { message: String },
}

impl FunctionError {
    /// Create a non-retriable error
    pub fn non_retriable(message: impl Into<String>) -> Self {
        Self::NonRetriable {
            message: message.into(),
        }
    }

    /// Create a retry-after error with a delay in seconds
    pub fn retry_after_secs(message: impl Into<String>, secs: u64) -> Self {
        Self::RetryAfter {
            message: message.into(),
            after: secs.to_string(),
        }
    }

    /// Create a retry-after error resuming at a fixed point in time
    pub fn retry_after_at(message: impl Into<String>, at: crate::DateTime) -> Self {
        Self::RetryAfter {
            message: message.into(),
            after: at.to_rfc3339(),
        }
    }

    /// Create a replayed step error
    pub fn step(
        name: impl Into<String>,
        message: impl Into<String>,
        stack: Option<String>,
    ) -> Self {
        Self::Step {
            name: name.into(),
            message: message.into(),
            stack,
        }
    }

    /// Create a generic handler error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// The error type name reported in response bodies
    pub fn name(&self) -> &'static str {
        match self {
            Self::NonRetriable { .. } => "NonRetriableError",
            Self::RetryAfter { .. } => "RetryAfterError",
            Self::Step { .. } => "StepError",
            Self::Other { .. } => "Error",
        }
    }

    /// The bare message, without the variant framing of `Display`
    pub fn message(&self) -> &str {
        match self {
            Self::NonRetriable { message }
            | Self::RetryAfter { message, .. }
            | Self::Step { message, .. }
            | Self::Other { message } => message,
        }
    }

    /// Whether the orchestrator may retry the attempt
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::NonRetriable { .. } | Self::Step { .. } => false,
            Self::RetryAfter { .. } | Self::Other { .. } => true,
        }
    }

    /// The `Retry-After` value, when the error carries one
    pub fn retry_after(&self) -> Option<&str> {
        match self {
            Self::RetryAfter { after, .. } => Some(after),
            _ => None,
        }
    }

    /// The recorded stack trace, when the error carries one
    pub fn stack(&self) -> Option<&str> {
        match self {
            Self::Step { stack, .. } => stack.as_deref(),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for FunctionError {
    fn from(err: serde_json::Error) -> Self {
        Self::Other {
            message: err.to_string(),
        }
    }
}

impl From<Error> for FunctionError {
    fn from(err: Error) -> Self {
        Self::Other {
            message: err.to_string(),
        }
    }
}
