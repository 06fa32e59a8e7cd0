pub mod auth;
pub mod context;
pub mod graph;
pub mod health;
pub mod limits;
pub mod multipart;
pub mod store;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the API router.
///
/// Routes are split into **public** (no auth required) and **protected**
/// (behind the bearer-token middleware). Every graph and store route
/// additionally passes the authorization gate inside its handler.
pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new().route("/v1/health", get(health::health));

    let protected = Router::new()
        .route("/v1/graph/invoke", post(graph::invoke))
        .route("/v1/graph/stream", post(graph::stream))
        .route("/v1/graph/stop", post(graph::stop))
        .route("/v1/graph", get(graph::info))
        .route("/v1/graph/state-schema", get(graph::state_schema))
        .route("/v1/store/memories", post(store::create))
        .route("/v1/store/search", post(store::search))
        .route("/v1/store/memories/list", post(store::list))
        .route("/v1/store/memories/forget", post(store::forget))
        .route(
            "/v1/store/memories/:memory_id",
            post(store::get).put(store::update).delete(store::delete),
        )
        .route_layer(middleware::from_fn_with_state(
            state,
            auth::require_identity,
        ));

    public.merge(protected)
}

/// The router with its request-scoped layers applied, ready to serve.
///
/// Layer order, outermost first: request id, size pre-check, body limit.
/// Transport layers (CORS, tracing, concurrency) are added by the binary.
pub fn app(state: AppState) -> Router {
    let max_body = usize::try_from(state.config.server.max_request_bytes).unwrap_or(usize::MAX);
    router(state.clone())
        .layer(DefaultBodyLimit::max(max_body))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            limits::reject_oversized,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            context::assign_request_id,
        ))
        .with_state(state)
}
