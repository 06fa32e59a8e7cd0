//! Role-based backend: role → resource → actions.

use std::collections::BTreeMap;

use ag_domain::config::{AuthzConfig, PermissionMatrix};
use ag_domain::error::Result;
use ag_domain::identity::Identity;
use async_trait::async_trait;

use crate::backend::{AuthorizationBackend, AuthzRequest};

/// Grants an action when any of the caller's roles grants it. Callers
/// without roles get nothing.
#[derive(Debug, Clone)]
pub struct RbacBackend {
    matrix: PermissionMatrix,
}

impl RbacBackend {
    pub fn new(matrix: PermissionMatrix) -> Self {
        Self { matrix }
    }

    /// Use the configured matrix, or the built-in one when none is given.
    pub fn from_config(cfg: &AuthzConfig) -> Self {
        if cfg.roles.is_empty() {
            Self::new(default_matrix())
        } else {
            Self::new(cfg.roles.clone())
        }
    }

    pub fn allows(&self, roles: &[String], resource: &str, action: &str) -> bool {
        roles.iter().any(|role| {
            self.matrix
                .get(role)
                .and_then(|resources| resources.get(resource))
                .is_some_and(|actions| actions.iter().any(|a| a == action))
        })
    }
}

#[async_trait]
impl AuthorizationBackend for RbacBackend {
    fn name(&self) -> &str {
        "rbac"
    }

    async fn authorize(&self, identity: &Identity, request: &AuthzRequest) -> Result<bool> {
        let roles = identity.roles();
        let allowed = self.allows(&roles, &request.resource, &request.action);
        tracing::debug!(
            user_id = %identity.user_id,
            ?roles,
            resource = %request.resource,
            action = %request.action,
            allowed,
            "rbac decision"
        );
        Ok(allowed)
    }
}

fn role(grants: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
    grants
        .iter()
        .map(|(resource, actions)| {
            (
                (*resource).to_owned(),
                actions.iter().map(|a| (*a).to_owned()).collect(),
            )
        })
        .collect()
}

/// admin / developer / viewer.
pub fn default_matrix() -> PermissionMatrix {
    let mut matrix = PermissionMatrix::new();
    matrix.insert(
        "admin".into(),
        role(&[
            ("graph", &["invoke", "stream", "read", "stop", "setup", "fix"]),
            ("checkpointer", &["read", "write", "delete"]),
            ("store", &["read", "write", "delete", "forget"]),
        ]),
    );
    matrix.insert(
        "developer".into(),
        role(&[
            ("graph", &["invoke", "stream", "read", "setup"]),
            ("checkpointer", &["read", "write"]),
            ("store", &["read", "write"]),
        ]),
    );
    matrix.insert(
        "viewer".into(),
        role(&[
            ("graph", &["read"]),
            ("checkpointer", &["read"]),
            ("store", &["read"]),
        ]),
    );
    matrix
}
