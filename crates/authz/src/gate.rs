use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use ag_domain::identity::Identity;
use futures_util::FutureExt;

use crate::backend::{AuthorizationBackend, AuthzRequest};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    #[error("'{user_id}' may not {action} {resource}")]
    Forbidden {
        user_id: String,
        resource: String,
        action: String,
    },

    /// The backend could not reach a decision. Never an allow.
    #[error("authorization backend failed: {0}")]
    Internal(String),
}

/// Single decision point in front of every protected operation.
#[derive(Clone)]
pub struct AuthorizationGate {
    backend: Arc<dyn AuthorizationBackend>,
}

impl AuthorizationGate {
    pub fn new(backend: Arc<dyn AuthorizationBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// `Ok(())` only when the backend explicitly said yes.
    pub async fn authorize(
        &self,
        identity: &Identity,
        request: &AuthzRequest,
    ) -> Result<(), GateError> {
        let outcome = AssertUnwindSafe(self.backend.authorize(identity, request))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(true)) => {
                tracing::debug!(
                    user_id = %identity.user_id,
                    resource = %request.resource,
                    action = %request.action,
                    resource_id = ?request.resource_id,
                    "authorized"
                );
                Ok(())
            }
            Ok(Ok(false)) => {
                tracing::info!(
                    user_id = %identity.user_id,
                    resource = %request.resource,
                    action = %request.action,
                    resource_id = ?request.resource_id,
                    backend = self.backend.name(),
                    "authorization denied"
                );
                Err(GateError::Forbidden {
                    user_id: identity.user_id.clone(),
                    resource: request.resource.clone(),
                    action: request.action.clone(),
                })
            }
            Ok(Err(e)) => {
                tracing::error!(
                    backend = self.backend.name(),
                    error = %e,
                    "authorization backend error, denying"
                );
                Err(GateError::Internal(e.to_string()))
            }
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_owned())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "panic".to_owned());
                tracing::error!(
                    backend = self.backend.name(),
                    reason = %reason,
                    "authorization backend panicked, denying"
                );
                Err(GateError::Internal(format!("backend panicked: {reason}")))
            }
        }
    }
}
