//! Axum mount for the serve handler.
//!
//! The serve handler itself is framework-agnostic; this module adapts axum
//! requests to its primitives for hosts that serve with axum. Other
//! frameworks can write the same translation against
//! [`ServeRequest`](crate::ServeRequest) /
//! [`ServeResponse`](crate::ServeResponse).

use crate::serve::{HttpMethod, ServeHandler, ServeRequest};
use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::any;
use axum::Router;
use std::collections::HashMap;
use std::sync::Arc;

/// Build a router serving the handler at the given path
pub fn serve_router(path: &str, handler: Arc<ServeHandler>) -> Router {
    Router::new().route(path, any(serve)).with_state(handler)
}

async fn serve(State(handler): State<Arc<ServeHandler>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    let query: HashMap<String, String> = parts
        .uri
        .query()
        .map(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect()
        })
        .unwrap_or_default();

    let mut headers = HashMap::new();
    for (name, value) in &parts.headers {
        if let Ok(value) = value.to_str() {
            headers.insert(name.as_str().to_string(), value.to_string());
        }
    }

    let body = to_bytes(body, usize::MAX).await.unwrap_or_default();

    let serve_request = ServeRequest {
        method: HttpMethod::from(parts.method.as_str()),
        path: parts.uri.path().to_string(),
        headers,
        query,
        body: body.to_vec(),
    };

    let serve_response = handler.handle(serve_request).await;

    let mut builder = Response::builder().status(serve_response.status);
    for (name, value) in &serve_response.headers {
        builder = builder.header(name, value);
    }
    match builder.body(Body::from(serve_response.body)) {
        Ok(response) => response,
        Err(_) => Response::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .body(Body::empty())
            .unwrap_or_default(),
    }
}
