//! Sync (PUT): register the served functions with the orchestrator.

use crate::serve::{sync_error_response, sync_ok_response, ServeHandler, ServeRequest, ServeResponse};
use crate::signature::hashed_signing_key;
use crate::{headers, sdk_identifier};
use inngest_core::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RegisterResponse {
    modified: bool,
    error: Option<String>,
}

impl ServeHandler {
    /// PUT: push the function catalogue to the orchestrator's register
    /// endpoint
    pub(crate) async fn sync(&self, request: &ServeRequest) -> ServeResponse {
        let serve_url = match self.serve_url(request) {
            Some(url) => url,
            None => {
                return sync_error_response(
                    "Unable to determine serve URL; configure a serve origin or \
                     forward the request Host header",
                );
            }
        };

        let payload = json!({
            "url": serve_url,
            "deployType": "ping",
            "appName": self.client().app_id(),
            "sdk": sdk_identifier(),
            "v": "0.1",
            "framework": self.framework_label(),
            "functions": self.function_records(&serve_url),
        });

        let config = self.client().config();
        let mut register_url = format!("{}/fn/register", config.api_base_url());
        if let Some(deploy_id) = request.query.get("deployId") {
            register_url.push_str(&format!("?deployId={deploy_id}"));
        }

        debug!(url = %register_url, functions = self.registry().len(), "syncing functions");

        let mut outbound = self
            .client()
            .http()
            .post(&register_url)
            .header(headers::SDK, sdk_identifier())
            .json(&payload);
        if let Some(key) = config.signing_key() {
            match hashed_signing_key(key) {
                Ok(bearer) => {
                    outbound = outbound.header("authorization", format!("Bearer {bearer}"));
                }
                Err(err) => return sync_error_response(err.to_string()),
            }
        }

        let response = match outbound.send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "sync request failed");
                return sync_error_response(err.to_string());
            }
        };

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if status.is_success() {
            let parsed: RegisterResponse = serde_json::from_str(&text).unwrap_or_default();
            info!(modified = parsed.modified, "synced functions");
            sync_ok_response(parsed.modified)
        } else {
            let parsed: RegisterResponse = serde_json::from_str(&text).unwrap_or_default();
            let message = parsed.error.unwrap_or(text);
            warn!(status = status.as_u16(), error = %message, "sync rejected");
            sync_error_response(message)
        }
    }

    /// The externally-visible URL of this endpoint: configured origin and
    /// path first, then the request's own host and scheme
    pub(crate) fn serve_url(&self, request: &ServeRequest) -> Option<String> {
        let config = self.client().config();

        let origin = config
            .serve_origin()
            .map(|origin| origin.trim_end_matches('/').to_string())
            .or_else(|| {
                let host = request.header_value("host")?;
                let scheme = request
                    .header_value("x-forwarded-proto")
                    .unwrap_or(if config.is_dev() { "http" } else { "https" });
                Some(format!("{scheme}://{host}"))
            })?;

        let path = config.serve_path().unwrap_or(&request.path);
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };

        Some(format!("{origin}{path}"))
    }

    /// The wire records sent to `fn/register`
    pub(crate) fn function_records(&self, serve_url: &str) -> Vec<Json> {
        let app_id = self.client().app_id();
        self.registry()
            .iter()
            .map(|function| {
                let config = function.config();
                let composite_id = function.composite_id(app_id);
                let step_url = format!("{serve_url}?fnId={composite_id}&stepId=step");

                let mut record = json!({
                    "id": composite_id,
                    "name": config.name.clone().unwrap_or_else(|| config.id.clone()),
                    "triggers": config.triggers,
                    "steps": {
                        "step": {
                            "id": "step",
                            "name": "step",
                            "runtime": {"type": "http", "url": step_url},
                            "retries": {"attempts": config.retries + 1},
                        }
                    },
                });

                if let Some(fields) = record.as_object_mut() {
                    if let Some(description) = &config.description {
                        fields.insert("description".to_string(), json!(description));
                    }
                    if !config.concurrency.is_empty() {
                        fields.insert("concurrency".to_string(), json!(config.concurrency));
                    }
                    if let Some(debounce) = &config.debounce {
                        fields.insert("debounce".to_string(), json!(debounce));
                    }
                    if let Some(priority) = &config.priority {
                        fields.insert("priority".to_string(), json!(priority));
                    }
                    if let Some(singleton) = &config.singleton {
                        fields.insert("singleton".to_string(), json!(singleton));
                    }
                }

                record
            })
            .collect()
    }
}
