use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Authentication
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Static bearer-token principals.
///
/// When `principals` is empty the gateway runs in dev mode: every request
/// is treated as the `anonymous` principal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub principals: Vec<PrincipalConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrincipalConfig {
    /// Environment variable holding this principal's bearer token. Read
    /// once at startup; only its SHA-256 digest is kept.
    pub token_env: String,
    pub user_id: String,
    /// Extra claims copied into the identity (e.g. `roles = ["admin"]`).
    #[serde(default)]
    pub claims: Map<String, Value>,
}
