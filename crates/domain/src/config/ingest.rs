use std::time::Duration;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// File ingestion
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Per-file size bound, enforced while the upload is being read.
    #[serde(default = "d_max_file_bytes")]
    pub max_file_bytes: u64,
    /// Maximum number of attachments per request.
    #[serde(default = "d_16")]
    pub max_files: usize,
    /// Budget for one call to the text-extraction collaborator. A timeout
    /// degrades to the raw document block.
    #[serde(default = "d_10000")]
    pub extract_timeout_ms: u64,
    /// Fall back to the client-declared content type when neither the
    /// byte signature nor the file extension identifies the file.
    #[serde(default = "d_true")]
    pub allow_declared_mime: bool,
}

impl IngestConfig {
    pub fn extract_timeout(&self) -> Duration {
        Duration::from_millis(self.extract_timeout_ms)
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: d_max_file_bytes(),
            max_files: 16,
            extract_timeout_ms: 10_000,
            allow_declared_mime: true,
        }
    }
}

/// Text-extraction collaborator. No `base_url` = extraction unavailable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractorConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
}

fn d_max_file_bytes() -> u64 {
    10 * 1024 * 1024
}
fn d_16() -> usize {
    16
}
fn d_10000() -> u64 {
    10_000
}
fn d_true() -> bool {
    true
}
