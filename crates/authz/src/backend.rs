use ag_domain::error::Result;
use ag_domain::identity::Identity;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// One authorization question: may the caller perform `action` on
/// `resource` (optionally the specific entity `resource_id`)?
#[derive(Debug, Clone, PartialEq)]
pub struct AuthzRequest {
    pub resource: String,
    pub action: String,
    pub resource_id: Option<String>,
    /// Free-form extra facts for backends (request path, tenant, ...).
    pub context: Map<String, Value>,
}

impl AuthzRequest {
    pub fn new(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            action: action.into(),
            resource_id: None,
            context: Map::new(),
        }
    }

    pub fn with_resource_id(mut self, resource_id: Option<String>) -> Self {
        self.resource_id = resource_id;
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }
}

/// A pluggable authorization decision.
///
/// `Ok(false)` is a refusal. `Err` means the backend could not decide;
/// the gate treats that as a refusal too and reports it as internal.
/// Each call must decide fresh; any caching is the backend's own business.
#[async_trait]
pub trait AuthorizationBackend: Send + Sync {
    /// Registry name, used in logs.
    fn name(&self) -> &str;

    async fn authorize(&self, identity: &Identity, request: &AuthzRequest) -> Result<bool>;
}

/// Allows any caller with a non-empty principal id.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultBackend;

#[async_trait]
impl AuthorizationBackend for DefaultBackend {
    fn name(&self) -> &str {
        "default"
    }

    async fn authorize(&self, identity: &Identity, _request: &AuthzRequest) -> Result<bool> {
        Ok(identity.has_principal())
    }
}
