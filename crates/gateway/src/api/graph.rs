//! Graph endpoints.
//!
//! - `POST /v1/graph/invoke`: run to completion, one JSON envelope
//! - `POST /v1/graph/stream`: newline-delimited JSON, one chunk per line
//! - `POST /v1/graph/stop`: stop a running thread
//! - `GET  /v1/graph`: describe the graph
//! - `GET  /v1/graph/state-schema`: JSON schema of the graph state
//!
//! `invoke` and `stream` accept either a JSON [`GraphInput`] or a
//! multipart body carrying attachments (see [`MultipartUploads`]).

use std::convert::Infallible;

use ag_domain::identity::Identity;
use ag_ingest::IngestWarning;
use axum::body::{Body, Bytes};
use axum::extract::rejection::BytesRejection;
use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use futures_util::StreamExt;
use serde_json::{json, Map, Value};

use crate::api::context::RequestContext;
use crate::api::multipart::MultipartUploads;
use crate::error::ApiError;
use crate::runtime::executor::ChunkStream;
use crate::runtime::input::{GraphInput, StopRequest};
use crate::runtime::orchestrator;
use crate::runtime::uploads::{NoUploads, UploadSource};
use crate::state::AppState;

pub const NDJSON: &str = "application/x-ndjson";

pub async fn invoke(
    State(state): State<AppState>,
    ctx: RequestContext,
    Extension(identity): Extension<Identity>,
    req: Request,
) -> Response {
    let (input, mut uploads) = match read_graph_request(&state, req).await {
        Ok(parts) => parts,
        Err(e) => return ctx.failure(e),
    };

    match orchestrator::invoke(&state, &identity, input, uploads.as_mut()).await {
        Ok(outcome) => ctx.success_with(outcome.result, warnings_meta(&outcome.warnings)),
        Err(e) => ctx.failure(e),
    }
}

pub async fn stream(
    State(state): State<AppState>,
    ctx: RequestContext,
    Extension(identity): Extension<Identity>,
    req: Request,
) -> Response {
    let (input, mut uploads) = match read_graph_request(&state, req).await {
        Ok(parts) => parts,
        Err(e) => return ctx.failure(e),
    };

    match orchestrator::stream(&state, &identity, input, uploads.as_mut()).await {
        Ok(outcome) => {
            let body = Body::from_stream(ndjson_lines(ctx, outcome.chunks, outcome.warnings));
            let mut resp = (StatusCode::OK, body).into_response();
            resp.headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static(NDJSON));
            resp
        }
        Err(e) => ctx.failure(e),
    }
}

pub async fn stop(
    State(state): State<AppState>,
    ctx: RequestContext,
    Extension(identity): Extension<Identity>,
    body: Bytes,
) -> Response {
    let request: StopRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => return ctx.failure(ApiError::validation(format!("invalid stop request: {e}"))),
    };

    match orchestrator::stop(&state, &identity, request).await {
        Ok(result) => ctx.success(result),
        Err(e) => ctx.failure(e),
    }
}

pub async fn info(
    State(state): State<AppState>,
    ctx: RequestContext,
    Extension(identity): Extension<Identity>,
) -> Response {
    match orchestrator::graph_info(&state, &identity).await {
        Ok(info) => ctx.success(info),
        Err(e) => ctx.failure(e),
    }
}

pub async fn state_schema(
    State(state): State<AppState>,
    ctx: RequestContext,
    Extension(identity): Extension<Identity>,
) -> Response {
    match orchestrator::state_schema(&state, &identity).await {
        Ok(schema) => ctx.success(schema),
        Err(e) => ctx.failure(e),
    }
}

/// Split a request into its graph input and the source of its attachments.
/// Only the JSON part is read here; file bodies are left on the wire.
async fn read_graph_request(
    state: &AppState,
    req: Request,
) -> Result<(GraphInput, Box<dyn UploadSource>), ApiError> {
    let is_multipart = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    if is_multipart {
        let multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| ApiError::validation(e.body_text()))?;
        let (input, uploads) = MultipartUploads::open(multipart).await?;
        return Ok((input, Box::new(uploads)));
    }

    // The body limit comes from the `DefaultBodyLimit` layer.
    let raw = Bytes::from_request(req, state).await.map_err(body_error)?;
    let input = GraphInput::from_json(&raw)?;
    Ok((input, Box::new(NoUploads)))
}

/// Only a breached length limit is a 413; any other failure to read the
/// body is an unreadable stream.
fn body_error(rejection: BytesRejection) -> ApiError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large(rejection.body_text())
    } else {
        ApiError::unreadable(rejection.body_text())
    }
}

fn warnings_meta(warnings: &[IngestWarning]) -> Map<String, Value> {
    let mut meta = Map::new();
    if !warnings.is_empty() {
        meta.insert(
            "warnings".into(),
            serde_json::to_value(warnings).unwrap_or(Value::Null),
        );
    }
    meta
}

/// Header line (request metadata and ingestion warnings), then one line
/// per chunk in arrival order. A runtime failure part-way ends the body
/// with an error envelope line.
fn ndjson_lines(
    ctx: RequestContext,
    mut chunks: ChunkStream,
    warnings: Vec<IngestWarning>,
) -> impl futures_core::Stream<Item = Result<Bytes, Infallible>> {
    async_stream::stream! {
        let mut meta = ctx.metadata("streaming");
        meta.extend(warnings_meta(&warnings));
        yield Ok(line(&json!({ "metadata": meta })));

        let mut forwarded = 0usize;
        while let Some(next) = chunks.next().await {
            match next {
                Ok(chunk) => {
                    forwarded += 1;
                    let value = serde_json::to_value(&chunk).unwrap_or(Value::Null);
                    yield Ok(line(&value));
                }
                Err(e) => {
                    tracing::warn!(error = %e, forwarded, "graph stream failed");
                    yield Ok(line(&ctx.error_body(&ApiError::from(e))));
                    break;
                }
            }
        }
        tracing::debug!(forwarded, "graph stream finished");
    }
}

fn line(value: &Value) -> Bytes {
    let mut buf = serde_json::to_vec(value).unwrap_or_default();
    buf.push(b'\n');
    Bytes::from(buf)
}
