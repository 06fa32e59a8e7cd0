use std::sync::Arc;

use ag_authz::AuthorizationGate;
use ag_domain::config::Config;
use ag_ingest::FileIngestor;

use crate::api::auth::Authenticator;
use crate::runtime::executor::GraphExecutor;
use crate::runtime::store::MemoryStore;

/// Shared application state passed to all API handlers.
///
/// Everything here is read-only after startup; requests share no
/// mutable state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Resolves the caller from request headers.
    pub authenticator: Arc<dyn Authenticator>,
    /// Consulted once per graph or store operation, before any attachment is read.
    pub gate: AuthorizationGate,
    pub ingestor: Arc<FileIngestor>,
    /// The graph runtime.
    pub executor: Arc<dyn GraphExecutor>,
    /// Backs the `/v1/store` endpoints.
    pub store: Arc<dyn MemoryStore>,
}
