//! Text-extraction collaborator.
//!
//! Extraction is optional. With no extractor configured, document uploads
//! still ingest; they just stay raw document blocks.

use std::sync::Arc;

use ag_domain::config::ExtractorConfig;
use ag_domain::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::Deserialize;

use crate::error::ExtractError;

/// Turns document bytes into plain text.
///
/// The pipeline bounds each call with its own timeout, so implementations
/// need not enforce one.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// `false` means every extraction attempt should be skipped up front.
    fn is_available(&self) -> bool {
        true
    }

    async fn extract(
        &self,
        bytes: Bytes,
        mime_type: &str,
        filename: &str,
    ) -> std::result::Result<String, ExtractError>;
}

/// Stand-in when no collaborator is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableExtractor;

#[async_trait]
impl TextExtractor for UnavailableExtractor {
    fn is_available(&self) -> bool {
        false
    }

    async fn extract(
        &self,
        _bytes: Bytes,
        _mime_type: &str,
        _filename: &str,
    ) -> std::result::Result<String, ExtractError> {
        Err(ExtractError::Unavailable)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// HTTP collaborator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Posts the raw bytes to `{base_url}/extract` and expects
/// `{"text": "..."}` back.
#[derive(Debug, Clone)]
pub struct HttpTextExtractor {
    http: Client,
    endpoint: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct ExtractResponse {
    #[serde(default)]
    text: String,
}

impl HttpTextExtractor {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            http,
            endpoint: format!("{}/extract", base_url.trim_end_matches('/')),
            api_key,
        })
    }
}

#[async_trait]
impl TextExtractor for HttpTextExtractor {
    async fn extract(
        &self,
        bytes: Bytes,
        mime_type: &str,
        filename: &str,
    ) -> std::result::Result<String, ExtractError> {
        let mut rb = self
            .http
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, mime_type)
            .header("X-Filename", filename)
            .body(bytes);
        if let Some(ref key) = self.api_key {
            rb = rb.bearer_auth(key);
        }

        let resp = rb
            .send()
            .await
            .map_err(|e| ExtractError::Failed(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ExtractError::Failed(format!("extractor returned {status}")));
        }
        let body: ExtractResponse = resp
            .json()
            .await
            .map_err(|e| ExtractError::Failed(e.to_string()))?;
        Ok(body.text)
    }
}

/// Build the extractor named by config. No `base_url` means none.
pub fn create_extractor(cfg: &ExtractorConfig) -> Result<Arc<dyn TextExtractor>> {
    match cfg.base_url.as_deref().filter(|u| !u.trim().is_empty()) {
        Some(base_url) => {
            let api_key = cfg
                .api_key_env
                .as_deref()
                .and_then(|var| std::env::var(var).ok());
            tracing::info!(base_url, "text extraction enabled");
            Ok(Arc::new(HttpTextExtractor::new(base_url, api_key)?))
        }
        None => {
            tracing::info!("no text extractor configured; documents stay raw");
            Ok(Arc::new(UnavailableExtractor))
        }
    }
}
