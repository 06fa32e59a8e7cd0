//! Whole-request size pre-check.
//!
//! Runs before authentication and authorization: it only looks at the
//! declared `Content-Length`, which reveals nothing protected. Bodies
//! without one are still bounded by the per-file limit while streaming.

use axum::extract::{Request, State};
use axum::http::header::CONTENT_LENGTH;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::context::RequestContext;
use crate::error::ApiError;
use crate::state::AppState;

pub async fn reject_oversized(
    State(state): State<AppState>,
    ctx: RequestContext,
    req: Request,
    next: Next,
) -> Response {
    let limit = state.config.server.max_request_bytes;
    let declared = req
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    if let Some(len) = declared.filter(|len| *len > limit) {
        return ctx.failure(ApiError::payload_too_large(format!(
            "request body of {len} bytes exceeds the {limit}-byte limit"
        )));
    }
    next.run(req).await
}
