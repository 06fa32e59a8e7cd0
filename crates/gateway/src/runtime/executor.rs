//! Client for the agent-graph runtime that actually executes requests.
//!
//! The runtime exposes these endpoints under `base_url`:
//! - `POST /invoke` returns one JSON result
//! - `POST /stream` returns newline-delimited JSON, one chunk per line
//! - `POST /stop`   asks a running thread to stop
//! - `GET  /graph`  describes the compiled graph
//! - `GET  /state_schema` returns the JSON schema of the graph state

use std::time::Duration;

use ag_domain::config::ExecutorConfig;
use ag_domain::error::{Error, Result};
use ag_domain::stream::{BoxStream, GraphChunk};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::{json, Map, Value};

use crate::runtime::input::GraphInput;

/// Upstream error bodies are kept to this many bytes.
pub(crate) const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ExecutorError {
    #[error("graph runtime unreachable: {0}")]
    Unreachable(String),

    #[error("graph runtime returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid graph output: {0}")]
    Decode(String),

    #[error("graph stream interrupted: {0}")]
    Interrupted(String),
}

pub type ChunkStream = BoxStream<'static, std::result::Result<GraphChunk, ExecutorError>>;

/// The execution collaborator.
///
/// `stream` returns as soon as the runtime has accepted the request;
/// chunks are pulled lazily. Dropping the stream abandons the run.
#[async_trait]
pub trait GraphExecutor: Send + Sync {
    async fn invoke(&self, input: &GraphInput) -> std::result::Result<Value, ExecutorError>;

    async fn stream(&self, input: &GraphInput) -> std::result::Result<ChunkStream, ExecutorError>;

    async fn stop(
        &self,
        thread_id: &str,
        config: Option<&Map<String, Value>>,
    ) -> std::result::Result<Value, ExecutorError>;

    /// Nodes, edges and other static facts about the graph.
    async fn graph_info(&self) -> std::result::Result<Value, ExecutorError>;

    async fn state_schema(&self) -> std::result::Result<Value, ExecutorError>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// HTTP implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
pub struct HttpGraphExecutor {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    max_line_bytes: usize,
}

impl HttpGraphExecutor {
    pub fn new(cfg: &ExecutorConfig) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_millis(cfg.connect_timeout_ms))
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
            timeout: Duration::from_millis(cfg.timeout_ms),
            max_line_bytes: cfg.max_line_bytes,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let rb = self.http.request(method, format!("{}{}", self.base_url, path));
        match self.api_key {
            Some(ref key) => rb.bearer_auth(key),
            None => rb,
        }
    }

    async fn send(rb: RequestBuilder) -> std::result::Result<Response, ExecutorError> {
        let resp = rb
            .send()
            .await
            .map_err(|e| ExecutorError::Unreachable(e.to_string()))?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = clip(resp.text().await.unwrap_or_default(), MAX_ERROR_BODY);
        Err(ExecutorError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn fetch_json(&self, rb: RequestBuilder) -> std::result::Result<Value, ExecutorError> {
        let resp = Self::send(rb.timeout(self.timeout)).await?;
        resp.json()
            .await
            .map_err(|e| ExecutorError::Decode(e.to_string()))
    }
}

#[async_trait]
impl GraphExecutor for HttpGraphExecutor {
    async fn invoke(&self, input: &GraphInput) -> std::result::Result<Value, ExecutorError> {
        self.fetch_json(self.request(Method::POST, "/invoke").json(input))
            .await
    }

    async fn stream(&self, input: &GraphInput) -> std::result::Result<ChunkStream, ExecutorError> {
        let resp = Self::send(self.request(Method::POST, "/stream").json(input)).await?;
        Ok(ndjson_stream(resp, self.max_line_bytes))
    }

    async fn stop(
        &self,
        thread_id: &str,
        config: Option<&Map<String, Value>>,
    ) -> std::result::Result<Value, ExecutorError> {
        let body = json!({ "thread_id": thread_id, "config": config });
        self.fetch_json(self.request(Method::POST, "/stop").json(&body))
            .await
    }

    async fn graph_info(&self) -> std::result::Result<Value, ExecutorError> {
        self.fetch_json(self.request(Method::GET, "/graph")).await
    }

    async fn state_schema(&self) -> std::result::Result<Value, ExecutorError> {
        self.fetch_json(self.request(Method::GET, "/state_schema"))
            .await
    }
}

/// Shorten `text` to at most `max` bytes without splitting a character.
pub(crate) fn clip(mut text: String, max: usize) -> String {
    if text.len() > max {
        let mut end = max;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
    }
    text
}

/// Yield one chunk per complete line as bytes arrive. A trailing line
/// without a newline is flushed when the body ends. A line longer than
/// `max_line_bytes` ends the stream with a decode error.
fn ndjson_stream(response: Response, max_line_bytes: usize) -> ChunkStream {
    let stream = async_stream::stream! {
        let mut response = response;
        let mut buffer: Vec<u8> = Vec::new();

        'read: loop {
            match response.chunk().await {
                Ok(Some(bytes)) => {
                    buffer.extend_from_slice(&bytes);
                    for line in drain_lines(&mut buffer) {
                        if line.len() > max_line_bytes {
                            yield Err(line_too_long(max_line_bytes));
                            break 'read;
                        }
                        if let Some(chunk) = parse_line(&line) {
                            yield chunk;
                        }
                    }
                    if buffer.len() > max_line_bytes {
                        yield Err(line_too_long(max_line_bytes));
                        break;
                    }
                }
                Ok(None) => {
                    if let Some(chunk) = parse_line(&buffer) {
                        yield chunk;
                    }
                    break;
                }
                Err(e) => {
                    yield Err(ExecutorError::Interrupted(e.to_string()));
                    break;
                }
            }
        }
    };
    Box::pin(stream)
}

fn line_too_long(max: usize) -> ExecutorError {
    ExecutorError::Decode(format!("stream line exceeds {max} bytes"))
}

/// Remove every complete line from `buffer`; a partial tail stays.
pub(crate) fn drain_lines(buffer: &mut Vec<u8>) -> Vec<Vec<u8>> {
    let mut lines = Vec::new();
    while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
        let mut line: Vec<u8> = buffer.drain(..=pos).collect();
        line.pop();
        lines.push(line);
    }
    lines
}

/// Blank lines are skipped. Objects with a `data` field are taken as
/// chunks; any other JSON value becomes the `data` of a bare chunk.
pub(crate) fn parse_line(line: &[u8]) -> Option<std::result::Result<GraphChunk, ExecutorError>> {
    let text = match std::str::from_utf8(line) {
        Ok(t) => t.trim(),
        Err(e) => return Some(Err(ExecutorError::Decode(format!("stream line is not UTF-8: {e}")))),
    };
    if text.is_empty() {
        return None;
    }
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => return Some(Err(ExecutorError::Decode(e.to_string()))),
    };
    if value.get("data").is_some() {
        return Some(
            serde_json::from_value(value).map_err(|e| ExecutorError::Decode(e.to_string())),
        );
    }
    Some(Ok(GraphChunk {
        data: value,
        metadata: None,
    }))
}
