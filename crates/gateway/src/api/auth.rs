//! API authentication.
//!
//! An [`Authenticator`] turns request headers into an [`Identity`]. The
//! shipped one maps static bearer tokens to configured principals:
//! - tokens are read from the env vars named in `[[auth.principals]]`
//!   **once at startup**, and only their SHA-256 digests are kept;
//! - with no principals configured the server is in dev mode and every
//!   request runs as `anonymous`.
//!
//! The resolved identity is stored in request extensions for handlers.

use ag_domain::config::AuthConfig;
use ag_domain::error::{Error, Result};
use ag_domain::identity::Identity;
use async_trait::async_trait;
use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::api::context::RequestContext;
use crate::error::ApiError;
use crate::state::AppState;

#[async_trait]
pub trait Authenticator: Send + Sync {
    /// `Err(Error::Auth)` for a missing or unknown credential.
    async fn authenticate(&self, headers: &HeaderMap) -> Result<Identity>;
}

struct Principal {
    token_hash: Vec<u8>,
    identity: Identity,
}

/// Static bearer tokens → principals.
pub struct StaticTokenAuthenticator {
    principals: Vec<Principal>,
    dev_mode: bool,
}

impl StaticTokenAuthenticator {
    /// Every request is `anonymous`.
    pub fn dev_mode() -> Self {
        Self {
            principals: Vec::new(),
            dev_mode: true,
        }
    }

    /// Map raw tokens to identities directly.
    pub fn from_tokens(tokens: impl IntoIterator<Item = (String, Identity)>) -> Self {
        let principals = tokens
            .into_iter()
            .map(|(token, identity)| Principal {
                token_hash: Sha256::digest(token.as_bytes()).to_vec(),
                identity,
            })
            .collect();
        Self {
            principals,
            dev_mode: false,
        }
    }

    /// Read each principal's token from its env var. A principal whose
    /// variable is unset is skipped (and can never authenticate).
    pub fn from_config(cfg: &AuthConfig) -> Self {
        if cfg.principals.is_empty() {
            tracing::warn!("no principals configured; running in dev mode as 'anonymous'");
            return Self::dev_mode();
        }

        let mut tokens = Vec::with_capacity(cfg.principals.len());
        for p in &cfg.principals {
            match std::env::var(&p.token_env) {
                Ok(token) if !token.is_empty() => {
                    let identity = Identity {
                        user_id: p.user_id.clone(),
                        claims: p.claims.clone(),
                    };
                    tokens.push((token, identity));
                }
                _ => tracing::warn!(
                    user_id = %p.user_id,
                    env = %p.token_env,
                    "token env var unset; principal disabled"
                ),
            }
        }
        tracing::info!(principals = tokens.len(), "bearer-token authentication enabled");
        Self::from_tokens(tokens)
    }

    pub fn is_dev_mode(&self) -> bool {
        self.dev_mode
    }
}

#[async_trait]
impl Authenticator for StaticTokenAuthenticator {
    async fn authenticate(&self, headers: &HeaderMap) -> Result<Identity> {
        if self.dev_mode {
            return Ok(Identity::anonymous());
        }

        let provided = headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| Error::Auth("missing bearer token".into()))?;

        // Hash the provided token to a fixed-length digest, then compare
        // in constant time against every principal.
        let provided_hash = Sha256::digest(provided.as_bytes());
        let mut matched: Option<&Principal> = None;
        for p in &self.principals {
            if bool::from(provided_hash.as_slice().ct_eq(p.token_hash.as_slice())) {
                matched = Some(p);
            }
        }

        matched
            .map(|p| p.identity.clone())
            .ok_or_else(|| Error::Auth("invalid bearer token".into()))
    }
}

/// Axum middleware that resolves the caller and stores the [`Identity`]
/// in request extensions. Attach via `axum::middleware::from_fn_with_state`.
pub async fn require_identity(
    State(state): State<AppState>,
    ctx: RequestContext,
    mut req: Request,
    next: Next,
) -> Response {
    match state.authenticator.authenticate(req.headers()).await {
        Ok(identity) => {
            tracing::debug!(user_id = %identity.user_id, "authenticated");
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        Err(e) => ctx.failure(ApiError::unauthorized(e.to_string())),
    }
}
