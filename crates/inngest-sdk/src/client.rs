//! The Inngest client: identity, configuration, and event publishing.

use crate::config::Config;
use crate::error::{Result, SdkError};
use crate::{headers, sdk_identifier};
use inngest_core::Event;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

/// Client for an Inngest app: holds the app id, the resolved configuration,
/// and the HTTP client used for outbound calls
#[derive(Debug, Clone)]
pub struct Inngest {
    app_id: String,
    config: Config,
    http: reqwest::Client,
}

impl Inngest {
    /// Create a client with configuration resolved from the environment
    pub fn new(app_id: impl Into<String>) -> Result<Self> {
        Self::with_config(app_id, Config::builder().build())
    }

    /// Create a client with an explicit configuration
    pub fn with_config(app_id: impl Into<String>, config: Config) -> Result<Self> {
        let app_id = app_id.into();
        if app_id.is_empty() {
            return Err(SdkError::config("app id cannot be empty"));
        }

        let http = reqwest::Client::builder()
            .user_agent(sdk_identifier())
            .build()?;

        Ok(Self {
            app_id,
            config,
            http,
        })
    }

    /// The app identifier, the prefix of every composite function id
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// The resolved configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Publish a single event
    #[instrument(skip(self, event), fields(event_name = %event.name))]
    pub async fn send_event(&self, event: &Event) -> Result<SendEventsResponse> {
        self.send_events(std::slice::from_ref(event)).await
    }

    /// Publish a batch of events
    #[instrument(skip(self, events), fields(count = events.len()))]
    pub async fn send_events(&self, events: &[Event]) -> Result<SendEventsResponse> {
        for event in events {
            event.validate()?;
        }

        let key = self.config.event_key().ok_or(SdkError::MissingEventKey)?;
        let url = format!("{}/e/{key}", self.config.event_api_base_url());

        debug!(count = events.len(), "publishing events");

        let mut request = self
            .http
            .post(&url)
            .header(headers::SDK, sdk_identifier())
            .json(&events);
        if let Some(env) = self.config.env() {
            request = request.header(headers::ENV, env);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "event publish failed");
            return Err(SdkError::api(status.as_u16(), text));
        }

        let parsed: SendEventsResponse = serde_json::from_str(&text)?;
        info!(ids = parsed.ids.len(), "published events");
        Ok(parsed)
    }
}

/// Response of the event-ingestion API
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SendEventsResponse {
    /// Ids assigned to the accepted events
    #[serde(default)]
    pub ids: Vec<String>,
    #[serde(default)]
    pub status: u16,
}
