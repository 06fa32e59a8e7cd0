//! Authorization backends by name.
//!
//! `[authz] backend = "<name>"` selects one at startup. Integrators add
//! their own with [`BackendRegistry::register`] before building state.

use std::collections::BTreeMap;
use std::sync::Arc;

use ag_domain::config::AuthzConfig;
use ag_domain::error::{Error, Result};

use crate::backend::{AuthorizationBackend, DefaultBackend};
use crate::rbac::RbacBackend;

pub type BackendFactory =
    Box<dyn Fn(&AuthzConfig) -> Result<Arc<dyn AuthorizationBackend>> + Send + Sync>;

pub struct BackendRegistry {
    factories: BTreeMap<String, BackendFactory>,
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl BackendRegistry {
    /// No backends at all.
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// `default` and `rbac`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("default", |_| Ok(Arc::new(DefaultBackend)));
        registry.register("rbac", |cfg| Ok(Arc::new(RbacBackend::from_config(cfg))));
        registry
    }

    /// Add or replace the factory for `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&AuthzConfig) -> Result<Arc<dyn AuthorizationBackend>> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    /// Register an already-built backend under `name`.
    pub fn register_instance(
        &mut self,
        name: impl Into<String>,
        backend: Arc<dyn AuthorizationBackend>,
    ) {
        self.register(name, move |_| Ok(backend.clone()));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Build the backend the config names. Unknown names are an error.
    pub fn build(&self, cfg: &AuthzConfig) -> Result<Arc<dyn AuthorizationBackend>> {
        let factory = self.factories.get(&cfg.backend).ok_or_else(|| {
            Error::Config(format!(
                "unknown authorization backend '{}' (available: {})",
                cfg.backend,
                self.names().join(", ")
            ))
        })?;
        let backend = factory(cfg)?;
        tracing::info!(backend = %cfg.backend, "authorization backend selected");
        Ok(backend)
    }
}
