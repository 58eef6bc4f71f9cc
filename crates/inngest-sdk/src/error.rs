//! Error types for the Inngest SDK

use thiserror::Error;

/// Result type alias for SDK operations
pub type Result<T> = std::result::Result<T, SdkError>;

/// Main error type for SDK operations
#[derive(Error, Debug)]
pub enum SdkError {
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// No signing key is configured but the mode requires one
    #[error("no signing key configured")]
    MissingSigningKey,

    /// The request carried no signature header
    #[error("request signature header missing")]
    MissingSignature,

    /// The signature did not verify against either configured key
    #[error("request signature invalid")]
    InvalidSignature,

    /// No event key is configured for event publishing
    #[error("no event key configured")]
    MissingEventKey,

    /// No function with the given id is registered
    #[error("function not found: {id}")]
    FunctionNotFound { id: String },

    /// HTTP client errors
    #[error("HTTP client error: {0}")]
    Http(String),

    /// API errors from the orchestrator
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// URL parsing errors
    #[error("URL parsing error: {0}")]
    UrlParsing(String),

    /// Core library errors
    #[error("Core error: {0}")]
    Core(String),
}

impl From<reqwest::Error> for SdkError {
    fn from(err: reqwest::Error) -> Self {
        SdkError::Http(err.to_string())
    }
}

impl From<serde_json::Error> for SdkError {
    fn from(err: serde_json::Error) -> Self {
        SdkError::Serialization(err.to_string())
    }
}

impl From<url::ParseError> for SdkError {
    fn from(err: url::ParseError) -> Self {
        SdkError::UrlParsing(err.to_string())
    }
}

impl From<inngest_core::Error> for SdkError {
    fn from(err: inngest_core::Error) -> Self {
        SdkError::Core(err.to_string())
    }
}

impl SdkError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an API error
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// The error type name reported in response bodies
    pub fn name(&self) -> &'static str {
        match self {
            Self::MissingSigningKey => "MissingSigningKeyError",
            Self::MissingSignature => "MissingSignatureError",
            Self::InvalidSignature => "InvalidSignatureError",
            Self::MissingEventKey => "MissingEventKeyError",
            Self::FunctionNotFound { .. } => "FunctionNotFoundError",
            _ => "InternalError",
        }
    }
}
