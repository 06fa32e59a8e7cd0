//! Memory-store endpoints. Bodies are forwarded to the store unchanged.
//!
//! | route                                  | operation | permission     |
//! |----------------------------------------|-----------|----------------|
//! | `POST   /v1/store/memories`            | create    | `store:write`  |
//! | `POST   /v1/store/search`              | search    | `store:read`   |
//! | `POST   /v1/store/memories/list`       | list      | `store:read`   |
//! | `POST   /v1/store/memories/forget`     | forget    | `store:forget` |
//! | `POST   /v1/store/memories/:memory_id` | get       | `store:read`   |
//! | `PUT    /v1/store/memories/:memory_id` | update    | `store:write`  |
//! | `DELETE /v1/store/memories/:memory_id` | delete    | `store:delete` |

use ag_domain::identity::Identity;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::response::Response;
use axum::Extension;
use serde_json::{Map, Value};

use crate::api::context::RequestContext;
use crate::error::ApiError;
use crate::runtime::orchestrator;
use crate::runtime::store::MemoryOp;
use crate::state::AppState;

async fn forward(
    state: AppState,
    ctx: RequestContext,
    identity: Identity,
    op: MemoryOp,
    body: Bytes,
    body_required: bool,
) -> Response {
    let body = match read_body(&body, body_required) {
        Ok(b) => b,
        Err(e) => return ctx.failure(e),
    };
    match orchestrator::store_call(&state, &identity, op, body).await {
        Ok(result) => ctx.success(result),
        Err(e) => ctx.failure(e),
    }
}

/// A JSON object, or `{}` for an empty body where one is optional.
fn read_body(raw: &[u8], required: bool) -> Result<Value, ApiError> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        if required {
            return Err(ApiError::validation("request body is required"));
        }
        return Ok(Value::Object(Map::new()));
    }
    match serde_json::from_slice(raw) {
        Ok(Value::Object(map)) => Ok(Value::Object(map)),
        Ok(_) => Err(ApiError::validation("request body must be a JSON object")),
        Err(e) => Err(ApiError::validation(format!("invalid JSON body: {e}"))),
    }
}

pub async fn create(
    State(state): State<AppState>,
    ctx: RequestContext,
    Extension(identity): Extension<Identity>,
    body: Bytes,
) -> Response {
    forward(state, ctx, identity, MemoryOp::Create, body, true).await
}

pub async fn search(
    State(state): State<AppState>,
    ctx: RequestContext,
    Extension(identity): Extension<Identity>,
    body: Bytes,
) -> Response {
    forward(state, ctx, identity, MemoryOp::Search, body, true).await
}

pub async fn list(
    State(state): State<AppState>,
    ctx: RequestContext,
    Extension(identity): Extension<Identity>,
    body: Bytes,
) -> Response {
    forward(state, ctx, identity, MemoryOp::List, body, false).await
}

pub async fn forget(
    State(state): State<AppState>,
    ctx: RequestContext,
    Extension(identity): Extension<Identity>,
    body: Bytes,
) -> Response {
    forward(state, ctx, identity, MemoryOp::Forget, body, true).await
}

pub async fn get(
    State(state): State<AppState>,
    ctx: RequestContext,
    Extension(identity): Extension<Identity>,
    Path(memory_id): Path<String>,
    body: Bytes,
) -> Response {
    forward(state, ctx, identity, MemoryOp::Get(memory_id), body, false).await
}

pub async fn update(
    State(state): State<AppState>,
    ctx: RequestContext,
    Extension(identity): Extension<Identity>,
    Path(memory_id): Path<String>,
    body: Bytes,
) -> Response {
    forward(state, ctx, identity, MemoryOp::Update(memory_id), body, true).await
}

pub async fn delete(
    State(state): State<AppState>,
    ctx: RequestContext,
    Extension(identity): Extension<Identity>,
    Path(memory_id): Path<String>,
    body: Bytes,
) -> Response {
    forward(state, ctx, identity, MemoryOp::Delete(memory_id), body, false).await
}
