//! Client for the memory store behind the `/v1/store` endpoints.
//!
//! The gateway does not interpret memories. Each operation forwards its
//! JSON body to the store and relays the store's JSON answer.

use std::time::Duration;

use ag_authz::vocabulary::action;
use ag_domain::config::StoreConfig;
use ag_domain::error::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::Value;

use crate::runtime::executor::{clip, MAX_ERROR_BODY};

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("memory store unreachable: {0}")]
    Unreachable(String),

    #[error("memory store returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid memory store output: {0}")]
    Decode(String),
}

/// One memory-store operation. Operations on a single memory carry its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryOp {
    Create,
    Search,
    List,
    Get(String),
    Update(String),
    Delete(String),
    Forget,
}

impl MemoryOp {
    /// The `store:<action>` permission this operation needs.
    pub fn action(&self) -> &'static str {
        match self {
            MemoryOp::Create | MemoryOp::Update(_) => action::WRITE,
            MemoryOp::Search | MemoryOp::List | MemoryOp::Get(_) => action::READ,
            MemoryOp::Delete(_) => action::DELETE,
            MemoryOp::Forget => action::FORGET,
        }
    }

    pub fn memory_id(&self) -> Option<&str> {
        match self {
            MemoryOp::Get(id) | MemoryOp::Update(id) | MemoryOp::Delete(id) => Some(id),
            _ => None,
        }
    }

    fn method(&self) -> Method {
        match self {
            MemoryOp::Update(_) => Method::PUT,
            MemoryOp::Delete(_) => Method::DELETE,
            _ => Method::POST,
        }
    }

    fn path(&self) -> String {
        match self {
            MemoryOp::Create => "/memories".into(),
            MemoryOp::Search => "/search".into(),
            MemoryOp::List => "/memories/list".into(),
            MemoryOp::Forget => "/memories/forget".into(),
            MemoryOp::Get(id) | MemoryOp::Update(id) | MemoryOp::Delete(id) => {
                format!("/memories/{}", encode_segment(id))
            }
        }
    }
}

/// The memory-store collaborator.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn call(&self, op: &MemoryOp, body: Value) -> std::result::Result<Value, StoreError>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// HTTP implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
pub struct HttpMemoryStore {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpMemoryStore {
    pub fn new(cfg: &StoreConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        let api_key = cfg
            .api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|k| !k.is_empty());

        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_owned(),
            api_key,
        })
    }

    fn url(&self, op: &MemoryOp) -> String {
        format!("{}{}", self.base_url, op.path())
    }
}

#[async_trait]
impl MemoryStore for HttpMemoryStore {
    async fn call(&self, op: &MemoryOp, body: Value) -> std::result::Result<Value, StoreError> {
        let mut rb = self.http.request(op.method(), self.url(op)).json(&body);
        if let Some(ref key) = self.api_key {
            rb = rb.bearer_auth(key);
        }
        let resp = rb
            .send()
            .await
            .map_err(|e| StoreError::Unreachable(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(StoreError::Status {
                status: status.as_u16(),
                body: clip(resp.text().await.unwrap_or_default(), MAX_ERROR_BODY),
            });
        }
        resp.json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }
}

/// Percent-encode everything outside the unreserved set so an id always
/// stays a single path segment.
fn encode_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for b in raw.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~') {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}
