//! AppState construction, shared by `serve` and the integration tests.

use std::sync::Arc;

use anyhow::Context;

use ag_authz::{AuthorizationGate, BackendRegistry};
use ag_domain::config::{Config, ConfigSeverity};
use ag_ingest::{create_extractor, FileIngestor};

use crate::api::auth::StaticTokenAuthenticator;
use crate::runtime::executor::HttpGraphExecutor;
use crate::runtime::store::HttpMemoryStore;
use crate::state::AppState;

/// Validate config, build every collaborator and return a fully-wired
/// [`AppState`]. Integrators pass a `registry` with their own
/// authorization backends registered.
pub fn build_app_state(
    config: Arc<Config>,
    registry: &BackendRegistry,
) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── Authentication ───────────────────────────────────────────────
    let authenticator = Arc::new(StaticTokenAuthenticator::from_config(&config.auth));

    // ── Authorization ────────────────────────────────────────────────
    let backend = registry
        .build(&config.authz)
        .context("selecting authorization backend")?;
    let gate = AuthorizationGate::new(backend);
    tracing::info!(backend = %gate.backend_name(), "authorization gate ready");

    // ── Ingestion ────────────────────────────────────────────────────
    let extractor = create_extractor(&config.extractor).context("creating text extractor")?;
    let ingestor = Arc::new(FileIngestor::new(config.ingest.clone(), extractor));
    tracing::info!(
        max_file_bytes = config.ingest.max_file_bytes,
        max_files = config.ingest.max_files,
        extractor = config.extractor.base_url.as_deref().unwrap_or("none"),
        "file ingestion ready"
    );

    // ── Graph runtime ────────────────────────────────────────────────
    let executor = Arc::new(
        HttpGraphExecutor::new(&config.executor).context("creating graph runtime client")?,
    );
    tracing::info!(url = %config.executor.base_url, "graph runtime client ready");

    // ── Memory store ─────────────────────────────────────────────────
    let store = Arc::new(
        HttpMemoryStore::new(&config.store).context("creating memory store client")?,
    );
    tracing::info!(url = %config.store.base_url, "memory store client ready");

    Ok(AppState {
        config,
        authenticator,
        gate,
        ingestor,
        executor,
        store,
    })
}
