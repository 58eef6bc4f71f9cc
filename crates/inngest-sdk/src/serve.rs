//! The serve handler: the HTTP state machine the orchestrator talks to.
//!
//! Framework-agnostic by design — requests and responses are primitives
//! (method, path, headers, query, body), and adapters such as
//! [`crate::router`] translate to a concrete server library.

use crate::client::Inngest;
use crate::function::{FunctionContext, ServableFunction};
use crate::registry::FunctionRegistry;
use crate::signature::{self, SignatureVerifier};
use crate::step::Step;
use crate::{headers, sdk_identifier, SDK_LANGUAGE, SDK_VERSION};
use inngest_core::{Event, FunctionError, Json};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use tracing::{debug, instrument, warn};

/// Protocol revision reported on call responses
pub const REQUEST_VERSION: &str = "1";

/// Introspection schema revision
pub const SCHEMA_VERSION: &str = "2024-05-24";

/// HTTP method of an inbound request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Other,
}

impl From<&str> for HttpMethod {
    fn from(method: &str) -> Self {
        if method.eq_ignore_ascii_case("GET") {
            Self::Get
        } else if method.eq_ignore_ascii_case("POST") {
            Self::Post
        } else if method.eq_ignore_ascii_case("PUT") {
            Self::Put
        } else {
            Self::Other
        }
    }
}

/// An inbound request, reduced to primitives
#[derive(Debug, Clone)]
pub struct ServeRequest {
    pub method: HttpMethod,
    /// Request path as mounted by the host
    pub path: String,
    /// Header names are matched case-insensitively
    pub headers: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl ServeRequest {
    /// Create a request with no headers, query, or body
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HashMap::new(),
            query: HashMap::new(),
            body: Vec::new(),
        }
    }

    /// Add a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Add a query parameter
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    /// Set the body
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Look up a header, case-insensitively
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// An outbound response, reduced to primitives
#[derive(Debug, Clone)]
pub struct ServeResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl ServeResponse {
    fn json(status: u16, body: &Json) -> Self {
        Self {
            status,
            headers: vec![
                ("content-type".to_string(), "application/json".to_string()),
                (headers::SDK.to_string(), sdk_identifier()),
            ],
            body: body.to_string(),
        }
    }

    fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    /// Look up a response header, case-insensitively
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Envelope of a POST call request
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct CallRequest {
    pub event: Option<Event>,
    pub events: Vec<Event>,
    pub ctx: CallContext,
    pub steps: HashMap<String, Json>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct CallContext {
    pub run_id: String,
    pub attempt: u32,
    pub disable_immediate_execution: bool,
    pub use_api: bool,
    pub stack: Json,
}

/// Serves introspection, sync, and call requests for a set of functions
#[derive(Debug)]
pub struct ServeHandler {
    client: Inngest,
    registry: FunctionRegistry,
    framework: String,
    verifier: SignatureVerifier,
}

impl ServeHandler {
    /// Create a handler serving the given functions
    pub fn new(client: Inngest, functions: Vec<ServableFunction>) -> crate::Result<Self> {
        let mut registry = FunctionRegistry::new();
        for function in functions {
            registry.register(function)?;
        }
        let verifier = SignatureVerifier::new(client.config());
        Ok(Self {
            client,
            registry,
            framework: "rust".to_string(),
            verifier,
        })
    }

    /// Override the framework label reported to the orchestrator
    pub fn framework(mut self, framework: impl Into<String>) -> Self {
        self.framework = framework.into();
        self
    }

    pub(crate) fn client(&self) -> &Inngest {
        &self.client
    }

    pub(crate) fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    pub(crate) fn framework_label(&self) -> &str {
        &self.framework
    }

    /// Dispatch one request
    #[instrument(skip(self, request), fields(method = ?request.method, path = %request.path))]
    pub async fn handle(&self, request: ServeRequest) -> ServeResponse {
        match request.method {
            HttpMethod::Get => self.introspect(&request),
            HttpMethod::Put => self.sync(&request).await,
            HttpMethod::Post => self.call(&request).await,
            HttpMethod::Other => {
                ServeResponse::json(405, &json!({"error": "Method not allowed"}))
            }
        }
    }

    /// GET: report capabilities, and configuration when the caller proves
    /// knowledge of the signing key by signing the empty body
    fn introspect(&self, request: &ServeRequest) -> ServeResponse {
        let config = self.client.config();
        let authed = self
            .verifier
            .verify(
                &[],
                request.header_value(headers::SIGNATURE),
                request.header_value(headers::SERVER_KIND),
            )
            .is_ok();

        let mut body = json!({
            "authentication_succeeded": authed,
            "function_count": self.registry.len(),
            "has_event_key": config.event_key().is_some(),
            "has_signing_key": config.signing_key().is_some(),
            "has_signing_key_fallback": config.signing_key_fallback().is_some(),
            "mode": config.mode().as_str(),
            "schema_version": SCHEMA_VERSION,
        });

        if authed {
            let hashed = |key: Option<&str>| -> Json {
                key.and_then(|k| signature::hashed_signing_key(k).ok())
                    .map(Json::String)
                    .unwrap_or(Json::Null)
            };
            let extended = json!({
                "api_origin": config.api_base_url(),
                "app_id": self.client.app_id(),
                "env": config.env(),
                "event_api_origin": config.event_api_base_url(),
                "event_key_hash": config.event_key().map(signature::sha256_hex),
                "framework": self.framework,
                "sdk_language": SDK_LANGUAGE,
                "sdk_version": SDK_VERSION,
                "serve_origin": config.serve_origin(),
                "serve_path": config.serve_path(),
                "signing_key_hash": hashed(config.signing_key()),
                "signing_key_fallback_hash": hashed(config.signing_key_fallback()),
            });
            if let (Some(base), Some(extra)) = (body.as_object_mut(), extended.as_object()) {
                base.extend(extra.clone());
            }
        }

        ServeResponse::json(200, &body)
    }

    /// POST: authenticate, replay, and advance one function attempt
    async fn call(&self, request: &ServeRequest) -> ServeResponse {
        if let Err(err) = self.verifier.verify(
            &request.body,
            request.header_value(headers::SIGNATURE),
            request.header_value(headers::SERVER_KIND),
        ) {
            warn!(error = %err, "rejecting call: signature verification failed");
            return ServeResponse::json(
                500,
                &json!({"name": err.name(), "message": err.to_string(), "stack": ""}),
            )
            .with_header(headers::NO_RETRY, "false")
            .with_header(headers::REQ_VERSION, REQUEST_VERSION);
        }

        let Some(fn_id) = request.query.get("fnId") else {
            return ServeResponse::json(400, &json!({"error": "Missing fnId query parameter"}))
                .with_header(headers::REQ_VERSION, REQUEST_VERSION);
        };

        let Some(function) = self.registry.resolve(fn_id, self.client.app_id()) else {
            warn!(fn_id = %fn_id, "rejecting call: unknown function");
            return ServeResponse::json(500, &json!({"error": "Function not found"}))
                .with_header(headers::REQ_VERSION, REQUEST_VERSION);
        };

        let envelope: CallRequest = if request.body.is_empty() {
            CallRequest::default()
        } else {
            match serde_json::from_slice(&request.body) {
                Ok(envelope) => envelope,
                Err(err) => {
                    return ServeResponse::json(
                        400,
                        &json!({"error": format!("Malformed request body: {err}")}),
                    )
                    .with_header(headers::REQ_VERSION, REQUEST_VERSION);
                }
            }
        };

        let event = envelope.event.unwrap_or_else(|| Event::new(""));
        let events = if envelope.events.is_empty() {
            vec![event.clone()]
        } else {
            envelope.events
        };

        debug!(
            run_id = %envelope.ctx.run_id,
            attempt = envelope.ctx.attempt,
            memo_len = envelope.steps.len(),
            disable_immediate_execution = envelope.ctx.disable_immediate_execution,
            use_api = envelope.ctx.use_api,
            stack = ?envelope.ctx.stack,
            "invoking function"
        );

        let step = Step::new(envelope.steps);
        let ctx = FunctionContext {
            event,
            events,
            run_id: envelope.ctx.run_id,
            attempt: envelope.ctx.attempt,
            step: step.clone(),
        };

        match function.call(ctx).await {
            Err(err) => function_error_response(&err),
            Ok(value) => {
                if step.has_deferred() {
                    let plan = step.planned_steps();
                    debug!(steps = plan.len(), "attempt planned deferred work");
                    ServeResponse::json(206, &json!(plan))
                        .with_header(headers::REQ_VERSION, REQUEST_VERSION)
                } else {
                    debug!("attempt completed");
                    ServeResponse::json(200, &value)
                        .with_header(headers::REQ_VERSION, REQUEST_VERSION)
                }
            }
        }
    }
}

fn function_error_response(err: &FunctionError) -> ServeResponse {
    let status = if err.is_retriable() { 500 } else { 400 };
    let body = json!({
        "name": err.name(),
        "message": err.message(),
        "stack": err.stack().unwrap_or(""),
    });

    let mut response = ServeResponse::json(status, &body)
        .with_header(headers::NO_RETRY, (!err.is_retriable()).to_string())
        .with_header(headers::REQ_VERSION, REQUEST_VERSION);
    if let Some(after) = err.retry_after() {
        response = response.with_header(headers::RETRY_AFTER, after);
    }
    response
}

/// Diagnostic used by sync when the serve URL cannot be determined
pub(crate) fn sync_error_response(message: impl Into<String>) -> ServeResponse {
    ServeResponse::json(500, &json!({"error": message.into()}))
}

pub(crate) fn sync_ok_response(modified: bool) -> ServeResponse {
    ServeResponse::json(
        200,
        &json!({"message": "Successfully synced", "modified": modified}),
    )
}
