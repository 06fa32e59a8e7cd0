use axum::response::Response;
use serde_json::json;

use crate::api::context::RequestContext;

/// `GET /v1/health`: liveness only; does not contact collaborators.
pub async fn health(ctx: RequestContext) -> Response {
    ctx.success(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
