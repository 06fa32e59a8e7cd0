use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Agent-graph execution collaborator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Base URL of the graph runtime (`/invoke`, `/stream`, `/stop` are
    /// appended).
    #[serde(default = "d_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Timeout for single-shot invocations. Streams are bounded only by
    /// the connect timeout; they live as long as the client stays.
    #[serde(default = "d_120000")]
    pub timeout_ms: u64,
    #[serde(default = "d_5000")]
    pub connect_timeout_ms: u64,
    /// Longest single line accepted from a streaming response.
    #[serde(default = "d_max_line_bytes")]
    pub max_line_bytes: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            base_url: d_base_url(),
            api_key_env: None,
            timeout_ms: 120_000,
            connect_timeout_ms: 5_000,
            max_line_bytes: d_max_line_bytes(),
        }
    }
}

fn d_base_url() -> String {
    "http://127.0.0.1:8100".into()
}
fn d_120000() -> u64 {
    120_000
}
fn d_5000() -> u64 {
    5_000
}
fn d_max_line_bytes() -> usize {
    1 << 20
}
