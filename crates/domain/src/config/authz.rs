use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Authorization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// role → resource → allowed actions.
pub type PermissionMatrix = BTreeMap<String, BTreeMap<String, Vec<String>>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthzConfig {
    /// Registry name of the backend to use (`default`, `rbac`, or one
    /// registered by the integrator at startup).
    #[serde(default = "d_backend")]
    pub backend: String,
    /// Permission matrix for the `rbac` backend. Empty = built-in matrix.
    #[serde(default)]
    pub roles: PermissionMatrix,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            backend: d_backend(),
            roles: PermissionMatrix::new(),
        }
    }
}

fn d_backend() -> String {
    "default".into()
}
