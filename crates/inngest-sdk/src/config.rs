//! SDK configuration: operational mode, endpoints, keys, environment label.
//!
//! Every field resolves as explicit builder argument > environment variable >
//! default. Environment reads go through [`EnvSource`] so tests can substitute
//! a fixed table; a [`Config`] is immutable once built.

use std::collections::HashMap;

use tracing::debug;

/// Production API origin
pub const DEFAULT_API_ORIGIN: &str = "https://api.inngest.com";

/// Production event-ingestion origin
pub const DEFAULT_EVENT_ORIGIN: &str = "https://inn.gs";

/// Local dev-server origin used for both APIs in dev mode
pub const DEV_SERVER_ORIGIN: &str = "http://localhost:8288";

const ENV_DEV: &str = "INNGEST_DEV";
const ENV_EVENT_KEY: &str = "INNGEST_EVENT_KEY";
const ENV_SIGNING_KEY: &str = "INNGEST_SIGNING_KEY";
const ENV_SIGNING_KEY_FALLBACK: &str = "INNGEST_SIGNING_KEY_FALLBACK";
const ENV_ENV: &str = "INNGEST_ENV";
const ENV_API_BASE_URL: &str = "INNGEST_API_BASE_URL";
const ENV_EVENT_API_BASE_URL: &str = "INNGEST_EVENT_API_BASE_URL";
const ENV_SERVE_ORIGIN: &str = "INNGEST_SERVE_ORIGIN";
const ENV_SERVE_PATH: &str = "INNGEST_SERVE_PATH";
const ENV_LOG_LEVEL: &str = "INNGEST_LOG_LEVEL";

/// Source of environment variables
pub trait EnvSource {
    /// Read a variable; `None` when unset
    fn var(&self, key: &str) -> Option<String>;
}

/// Reads from the process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl EnvSource for SystemEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Operational mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Local development: signature checks pass, endpoints default to the
    /// dev server
    Dev,
    /// Production: signatures are required and verified
    Cloud,
}

impl Mode {
    /// The wire label for this mode
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Cloud => "cloud",
        }
    }
}

/// Resolved SDK configuration
#[derive(Debug, Clone)]
pub struct Config {
    mode: Mode,
    api_base_url: String,
    event_api_base_url: String,
    event_key: Option<String>,
    signing_key: Option<String>,
    signing_key_fallback: Option<String>,
    env: Option<String>,
    serve_origin: Option<String>,
    serve_path: Option<String>,
    log_level: String,
}

impl Config {
    /// Start building a configuration
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// The resolved operational mode
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Whether the SDK is in dev mode
    pub fn is_dev(&self) -> bool {
        self.mode == Mode::Dev
    }

    /// Base URL of the orchestrator API
    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    /// Base URL of the event-ingestion API
    pub fn event_api_base_url(&self) -> &str {
        &self.event_api_base_url
    }

    /// Credential for event publishing
    pub fn event_key(&self) -> Option<&str> {
        self.event_key.as_deref()
    }

    /// Primary HMAC signing key
    pub fn signing_key(&self) -> Option<&str> {
        self.signing_key.as_deref()
    }

    /// Secondary signing key for rotation
    pub fn signing_key_fallback(&self) -> Option<&str> {
        self.signing_key_fallback.as_deref()
    }

    /// Environment label sent as the `X-Inngest-Env` header
    pub fn env(&self) -> Option<&str> {
        self.env.as_deref()
    }

    /// Externally-visible serve origin, when configured
    pub fn serve_origin(&self) -> Option<&str> {
        self.serve_origin.as_deref()
    }

    /// Externally-visible serve path, when configured
    pub fn serve_path(&self) -> Option<&str> {
        self.serve_path.as_deref()
    }

    /// Log verbosity requested for the host's subscriber
    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`Config`]; unset fields resolve from the environment, then
/// fall back to defaults
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    dev: Option<bool>,
    api_base_url: Option<String>,
    event_api_base_url: Option<String>,
    event_key: Option<String>,
    signing_key: Option<String>,
    signing_key_fallback: Option<String>,
    env: Option<String>,
    serve_origin: Option<String>,
    serve_path: Option<String>,
    log_level: Option<String>,
}

impl ConfigBuilder {
    /// Force dev or cloud mode regardless of `INNGEST_DEV`
    pub fn dev(mut self, dev: bool) -> Self {
        self.dev = Some(dev);
        self
    }

    /// Set the orchestrator API base URL
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    /// Set the event-ingestion API base URL
    pub fn event_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.event_api_base_url = Some(url.into());
        self
    }

    /// Set the event key
    pub fn event_key(mut self, key: impl Into<String>) -> Self {
        self.event_key = Some(key.into());
        self
    }

    /// Set the primary signing key
    pub fn signing_key(mut self, key: impl Into<String>) -> Self {
        self.signing_key = Some(key.into());
        self
    }

    /// Set the fallback signing key
    pub fn signing_key_fallback(mut self, key: impl Into<String>) -> Self {
        self.signing_key_fallback = Some(key.into());
        self
    }

    /// Set the environment label
    pub fn env(mut self, env: impl Into<String>) -> Self {
        self.env = Some(env.into());
        self
    }

    /// Set the externally-visible serve origin
    pub fn serve_origin(mut self, origin: impl Into<String>) -> Self {
        self.serve_origin = Some(origin.into());
        self
    }

    /// Set the externally-visible serve path
    pub fn serve_path(mut self, path: impl Into<String>) -> Self {
        self.serve_path = Some(path.into());
        self
    }

    /// Set the log level
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = Some(level.into());
        self
    }

    /// Build against the process environment
    pub fn build(self) -> Config {
        self.build_with(&SystemEnv)
    }

    /// Build against an explicit environment source
    pub fn build_with(self, env: &dyn EnvSource) -> Config {
        let read = |key: &str| env.var(key).filter(|value| !value.is_empty());

        let dev_var = read(ENV_DEV);
        let mode = match self.dev {
            Some(true) => Mode::Dev,
            Some(false) => Mode::Cloud,
            None if dev_var.is_some() => Mode::Dev,
            None => Mode::Cloud,
        };

        // A URL-valued INNGEST_DEV points both APIs at that server.
        let dev_url = dev_var
            .filter(|value| value.starts_with("http://") || value.starts_with("https://"))
            .map(|value| value.trim_end_matches('/').to_string());

        let default_origin = |cloud_default: &str| match (&mode, &dev_url) {
            (Mode::Dev, Some(url)) => url.clone(),
            (Mode::Dev, None) => DEV_SERVER_ORIGIN.to_string(),
            (Mode::Cloud, _) => cloud_default.to_string(),
        };

        let api_base_url = self
            .api_base_url
            .or_else(|| read(ENV_API_BASE_URL))
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| default_origin(DEFAULT_API_ORIGIN));

        let event_api_base_url = self
            .event_api_base_url
            .or_else(|| read(ENV_EVENT_API_BASE_URL))
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| default_origin(DEFAULT_EVENT_ORIGIN));

        let config = Config {
            mode,
            api_base_url,
            event_api_base_url,
            event_key: self.event_key.or_else(|| read(ENV_EVENT_KEY)),
            signing_key: self.signing_key.or_else(|| read(ENV_SIGNING_KEY)),
            signing_key_fallback: self
                .signing_key_fallback
                .or_else(|| read(ENV_SIGNING_KEY_FALLBACK)),
            env: self.env.or_else(|| read(ENV_ENV)),
            serve_origin: self.serve_origin.or_else(|| read(ENV_SERVE_ORIGIN)),
            serve_path: self.serve_path.or_else(|| read(ENV_SERVE_PATH)),
            log_level: self
                .log_level
                .or_else(|| read(ENV_LOG_LEVEL))
                .unwrap_or_else(|| "info".to_string()),
        };

        debug!(
            mode = config.mode.as_str(),
            api = %config.api_base_url,
            events = %config.event_api_base_url,
            "resolved configuration"
        );

        config
    }
}
