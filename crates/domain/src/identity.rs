use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An already-authenticated caller.
///
/// `user_id` is the only field this service inspects directly; anything
/// else the authentication step knows about the caller (roles, tenant,
/// scopes) rides along in `claims` for authorization backends to read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    #[serde(flatten)]
    pub claims: Map<String, Value>,
}

impl Identity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            claims: Map::new(),
        }
    }

    /// Principal used when no authentication is configured (dev mode).
    pub fn anonymous() -> Self {
        Self::new("anonymous")
    }

    pub fn with_claim(mut self, key: impl Into<String>, value: Value) -> Self {
        self.claims.insert(key.into(), value);
        self
    }

    pub fn has_principal(&self) -> bool {
        !self.user_id.trim().is_empty()
    }

    /// Roles from `claims.roles` (array) or, failing that, `claims.role`.
    pub fn roles(&self) -> Vec<String> {
        let from_array: Vec<String> = self
            .claims
            .get("roles")
            .and_then(Value::as_array)
            .map(|roles| {
                roles
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();
        if !from_array.is_empty() {
            return from_array;
        }
        self.claims
            .get("role")
            .and_then(Value::as_str)
            .map(|r| vec![r.to_owned()])
            .unwrap_or_default()
    }
}
