//! Per-request correlation id and the response envelopes.
//!
//! Every response body has the shape
//! `{"data" | "error": ..., "metadata": {request_id, status, timestamp}}`
//! and carries the same id in the `X-Request-Id` header.

use std::convert::Infallible;

use async_trait::async_trait;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::Instrument;

use crate::error::{sanitized_message, ApiError};
use crate::state::AppState;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Correlation data for one request, placed in extensions by
/// [`assign_request_id`].
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    /// Replace error messages with their sanitized text.
    pub production: bool,
}

impl RequestContext {
    pub fn new(request_id: impl Into<String>, production: bool) -> Self {
        Self {
            request_id: request_id.into(),
            production,
        }
    }

    pub fn metadata(&self, status: &str) -> Map<String, Value> {
        let mut meta = Map::new();
        meta.insert("request_id".into(), Value::from(self.request_id.clone()));
        meta.insert("status".into(), Value::from(status));
        meta.insert(
            "timestamp".into(),
            Value::from(chrono::Utc::now().to_rfc3339()),
        );
        meta
    }

    pub fn success<T: Serialize>(&self, data: T) -> Response {
        self.success_with(data, Map::new())
    }

    /// Success envelope with extra metadata fields (e.g. `warnings`).
    pub fn success_with<T: Serialize>(&self, data: T, extra: Map<String, Value>) -> Response {
        let mut meta = self.metadata("success");
        meta.extend(extra);
        Json(json!({ "data": data, "metadata": meta })).into_response()
    }

    pub fn failure(&self, err: ApiError) -> Response {
        let status = err.status();
        if status.is_server_error() {
            tracing::error!(code = %err.code, error = %err.message, "request failed");
        } else {
            tracing::info!(code = %err.code, error = %err.message, "request rejected");
        }
        (status, Json(self.error_body(&err))).into_response()
    }

    /// The error envelope without a status line. Also used as the last
    /// line of a stream that fails part-way.
    pub fn error_body(&self, err: &ApiError) -> Value {
        let message = if self.production {
            sanitized_message(err.code.as_str())
        } else {
            err.message.as_str()
        };
        json!({
            "error": { "code": err.code.as_str(), "message": message },
            "metadata": self.metadata("error"),
        })
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .unwrap_or_else(|| RequestContext::new(uuid::Uuid::new_v4().to_string(), false)))
    }
}

/// Outermost middleware: honour an inbound `X-Request-Id` or mint one,
/// open the request span, and echo the id on the response.
pub async fn assign_request_id(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let request_id = req
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|id| is_acceptable_id(id))
        .map(str::to_owned)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let ctx = RequestContext::new(request_id.clone(), state.config.server.mode.is_production());
    req.extensions_mut().insert(ctx);

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %req.method(),
        path = %req.uri().path(),
    );
    let mut resp = next.run(req).instrument(span).await;
    if let Ok(v) = HeaderValue::from_str(&request_id) {
        resp.headers_mut()
            .insert(HeaderName::from_static(X_REQUEST_ID), v);
    }
    resp
}

fn is_acceptable_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= 128 && id.bytes().all(|b| b.is_ascii_graphic())
}
