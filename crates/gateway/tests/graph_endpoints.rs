use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ag_authz::{AuthorizationBackend, AuthorizationGate, AuthzRequest, DefaultBackend, RbacBackend};
use ag_domain::config::{AuthzConfig, Config, RunMode};
use ag_domain::content::ContentBlock;
use ag_domain::error::Result as DomainResult;
use ag_domain::identity::Identity;
use ag_domain::media::MediaKind;
use ag_domain::message::Role;
use ag_domain::stream::GraphChunk;
use ag_gateway::api;
use ag_gateway::api::auth::StaticTokenAuthenticator;
use ag_gateway::runtime::executor::{ChunkStream, ExecutorError, GraphExecutor};
use ag_gateway::runtime::input::GraphInput;
use ag_gateway::runtime::store::{MemoryOp, MemoryStore, StoreError};
use ag_gateway::state::AppState;
use ag_ingest::{ExtractError, FileIngestor, TextExtractor, UnavailableExtractor, INGEST_WARNING};
use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use futures_util::StreamExt;
use serde_json::{json, Map, Value};
use tower::ServiceExt;

// ── Collaborator doubles ──────────────────────────────────────────────

/// Records every input it receives and answers with a fixed result.
#[derive(Default)]
struct RecordingExecutor {
    inputs: Mutex<Vec<GraphInput>>,
    stops: Mutex<Vec<String>>,
    /// End the chunk stream with a runtime failure.
    fail_stream: bool,
    /// Send one chunk, then wait forever. The flag is set once the
    /// stream is dropped.
    hold_stream: Option<Arc<AtomicBool>>,
}

struct SetOnDrop(Arc<AtomicBool>);

impl Drop for SetOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl RecordingExecutor {
    fn calls(&self) -> usize {
        self.inputs.lock().unwrap().len()
    }

    fn last_input(&self) -> GraphInput {
        self.inputs.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl GraphExecutor for RecordingExecutor {
    async fn invoke(&self, input: &GraphInput) -> Result<Value, ExecutorError> {
        self.inputs.lock().unwrap().push(input.clone());
        Ok(json!({ "answer": 42, "messages_seen": input.messages.len() }))
    }

    async fn stream(&self, input: &GraphInput) -> Result<ChunkStream, ExecutorError> {
        self.inputs.lock().unwrap().push(input.clone());
        if let Some(flag) = &self.hold_stream {
            let guard = SetOnDrop(flag.clone());
            return Ok(Box::pin(async_stream::stream! {
                let _guard = guard;
                yield Ok::<_, ExecutorError>(GraphChunk {
                    data: json!({ "n": 1 }),
                    metadata: None,
                });
                futures_util::future::pending::<()>().await;
            }));
        }
        let mut chunks: Vec<Result<GraphChunk, ExecutorError>> = (1..=3)
            .map(|n| {
                Ok(GraphChunk {
                    data: json!({ "n": n }),
                    metadata: Some(json!({ "node": "agent" })),
                })
            })
            .collect();
        if self.fail_stream {
            chunks.push(Err(ExecutorError::Interrupted("connection reset".into())));
        }
        Ok(Box::pin(futures_util::stream::iter(chunks)))
    }

    async fn stop(
        &self,
        thread_id: &str,
        _config: Option<&Map<String, Value>>,
    ) -> Result<Value, ExecutorError> {
        self.stops.lock().unwrap().push(thread_id.to_owned());
        Ok(json!({ "stopped": thread_id }))
    }

    async fn graph_info(&self) -> Result<Value, ExecutorError> {
        Ok(json!({ "nodes": ["agent", "tools"] }))
    }

    async fn state_schema(&self) -> Result<Value, ExecutorError> {
        Ok(json!({ "type": "object", "properties": { "messages": { "type": "array" } } }))
    }
}

/// Records every store call and echoes its body back.
#[derive(Default)]
struct RecordingStore {
    calls: Mutex<Vec<(MemoryOp, Value)>>,
}

impl RecordingStore {
    fn ops(&self) -> Vec<MemoryOp> {
        self.calls.lock().unwrap().iter().map(|(op, _)| op.clone()).collect()
    }
}

#[async_trait]
impl MemoryStore for RecordingStore {
    async fn call(&self, op: &MemoryOp, body: Value) -> Result<Value, StoreError> {
        self.calls.lock().unwrap().push((op.clone(), body.clone()));
        Ok(json!({ "echo": body, "memory_id": op.memory_id() }))
    }
}

struct FixedExtractor {
    text: &'static str,
    calls: AtomicUsize,
}

#[async_trait]
impl TextExtractor for FixedExtractor {
    async fn extract(&self, _: Bytes, _: &str, _: &str) -> Result<String, ExtractError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.text.into())
    }
}

struct StuckExtractor;

#[async_trait]
impl TextExtractor for StuckExtractor {
    async fn extract(&self, _: Bytes, _: &str, _: &str) -> Result<String, ExtractError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok("never".into())
    }
}

struct DenyBackend;

#[async_trait]
impl AuthorizationBackend for DenyBackend {
    fn name(&self) -> &str {
        "deny"
    }

    async fn authorize(&self, _: &Identity, _: &AuthzRequest) -> DomainResult<bool> {
        Ok(false)
    }
}

/// Allows everything and remembers what it was asked.
#[derive(Default)]
struct RecordingBackend {
    seen: Mutex<Vec<AuthzRequest>>,
}

#[async_trait]
impl AuthorizationBackend for RecordingBackend {
    fn name(&self) -> &str {
        "recording"
    }

    async fn authorize(&self, _: &Identity, request: &AuthzRequest) -> DomainResult<bool> {
        self.seen.lock().unwrap().push(request.clone());
        Ok(true)
    }
}

struct PanickingBackend;

#[async_trait]
impl AuthorizationBackend for PanickingBackend {
    fn name(&self) -> &str {
        "panicking"
    }

    async fn authorize(&self, _: &Identity, _: &AuthzRequest) -> DomainResult<bool> {
        panic!("policy store exploded");
    }
}

// ── Harness ───────────────────────────────────────────────────────────

const TOKEN: &str = "t-alice";

struct Harness {
    state: AppState,
    executor: Arc<RecordingExecutor>,
    store: Arc<RecordingStore>,
}

impl Harness {
    fn new() -> Self {
        Self::with(
            Arc::new(DefaultBackend),
            Arc::new(UnavailableExtractor),
            RecordingExecutor::default(),
            |_| {},
        )
    }

    fn with(
        backend: Arc<dyn AuthorizationBackend>,
        extractor: Arc<dyn TextExtractor>,
        executor: RecordingExecutor,
        tweak: impl FnOnce(&mut Config),
    ) -> Self {
        let mut config = Config::default();
        tweak(&mut config);

        let alice = Identity::new("alice")
            .with_claim("roles", json!(["developer"]))
            .with_claim("session_token", json!("s3cr3t-session-value"));
        let executor = Arc::new(executor);
        let store = Arc::new(RecordingStore::default());
        let state = AppState {
            authenticator: Arc::new(StaticTokenAuthenticator::from_tokens([(
                TOKEN.to_owned(),
                alice,
            )])),
            gate: AuthorizationGate::new(backend),
            ingestor: Arc::new(FileIngestor::new(config.ingest.clone(), extractor)),
            executor: executor.clone(),
            store: store.clone(),
            config: Arc::new(config),
        };
        Self {
            state,
            executor,
            store,
        }
    }

    async fn send(&self, req: Request<Body>) -> Response {
        api::app(self.state.clone()).oneshot(req).await.unwrap()
    }
}

async fn body_json(resp: Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(AUTHORIZATION, format!("Bearer {TOKEN}"))
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn authed(method: &str, uri: &str, body: Body) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {TOKEN}"))
        .header(CONTENT_TYPE, "application/json")
        .body(body)
        .unwrap()
}

const BOUNDARY: &str = "agentgate-test-boundary";

enum Part<'a> {
    Field(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

fn multipart_request(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Field(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                        .as_bytes(),
                );
            }
            Part::File(filename, content_type, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"files\"; filename=\"{filename}\"\r\n\
                         Content-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::post(uri)
        .header(AUTHORIZATION, format!("Bearer {TOKEN}"))
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR\0\0\0\x01\0\0\0\x01";
const PDF: &[u8] = b"%PDF-1.4\n1 0 obj << >> endobj\n%%EOF";

// ── Attachments ───────────────────────────────────────────────────────

#[tokio::test]
async fn image_without_history_becomes_new_user_message() {
    let h = Harness::new();
    let resp = h
        .send(multipart_request(
            "/v1/graph/invoke",
            &[
                Part::Field("input", r#"{"messages": []}"#),
                Part::File("photo.png", "application/octet-stream", PNG),
            ],
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["data"]["answer"], 42);
    assert_eq!(body["metadata"]["status"], "success");
    assert!(body["metadata"].get("warnings").is_none());

    let input = h.executor.last_input();
    assert_eq!(input.messages.len(), 1);
    assert_eq!(input.messages[0].role, Role::User);
    match &input.messages[0].content[..] {
        [ContentBlock::Image(block)] => {
            assert_eq!(block.media.kind, MediaKind::Data);
            assert_eq!(block.media.mime_type, "image/png");
            assert_eq!(block.media.size_bytes, PNG.len() as u64);
            assert_eq!(block.media.filename.as_deref(), Some("photo.png"));
        }
        other => panic!("expected one image block, got {other:?}"),
    }
}

#[tokio::test]
async fn extracted_text_appends_to_last_user_message() {
    let extractor = Arc::new(FixedExtractor {
        text: "Hello",
        calls: AtomicUsize::new(0),
    });
    let h = Harness::with(
        Arc::new(DefaultBackend),
        extractor.clone(),
        RecordingExecutor::default(),
        |_| {},
    );
    let resp = h
        .send(multipart_request(
            "/v1/graph/invoke",
            &[
                Part::Field(
                    "input",
                    r#"{"messages": [{"role": "user", "content": "Summarize this"}]}"#,
                ),
                Part::Field("extract_text", "true"),
                Part::File("report.pdf", "application/pdf", PDF),
            ],
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);

    let input = h.executor.last_input();
    assert_eq!(input.messages.len(), 1);
    let content = &input.messages[0].content;
    assert_eq!(content.len(), 2);
    match &content[1] {
        ContentBlock::Text(t) => assert_eq!(t.text, "Hello"),
        other => panic!("expected trailing text block, got {other:?}"),
    }
}

#[tokio::test]
async fn extraction_timeout_keeps_document_and_warns() {
    let h = Harness::with(
        Arc::new(DefaultBackend),
        Arc::new(StuckExtractor),
        RecordingExecutor::default(),
        |c| c.ingest.extract_timeout_ms = 50,
    );
    let resp = h
        .send(multipart_request(
            "/v1/graph/invoke",
            &[
                Part::Field("extract_text", "true"),
                Part::Field(
                    "input",
                    r#"{"messages": [{"role": "user", "content": "Read this"}]}"#,
                ),
                Part::File("report.pdf", "application/pdf", PDF),
            ],
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["metadata"]["status"], "success");
    assert_eq!(
        body["metadata"]["warnings"][0]["code"],
        "EXTRACTION_UNAVAILABLE"
    );
    assert_eq!(body["metadata"]["warnings"][0]["filename"], "report.pdf");

    let input = h.executor.last_input();
    match input.messages[0].content.last() {
        Some(ContentBlock::Document(block)) => {
            assert_eq!(block.media.filename.as_deref(), Some("report.pdf"));
            assert_eq!(block.annotations[0].kind, INGEST_WARNING);
            assert_eq!(block.annotations[0].payload["code"], "EXTRACTION_UNAVAILABLE");
            assert_eq!(block.annotations[0].payload["filename"], "report.pdf");
        }
        other => panic!("expected a trailing document block, got {other:?}"),
    }
}

#[tokio::test]
async fn files_keep_submission_order() {
    let h = Harness::new();
    let resp = h
        .send(multipart_request(
            "/v1/graph/invoke",
            &[
                Part::Field("input", r#"{"messages": [{"role": "assistant", "content": "hi"}]}"#),
                Part::File("b.pdf", "application/pdf", PDF),
                Part::File("a.png", "image/png", PNG),
            ],
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let input = h.executor.last_input();
    assert_eq!(input.messages.len(), 2);
    assert_eq!(input.messages[1].role, Role::User);
    let tags: Vec<&str> = input.messages[1].content.iter().map(|b| b.type_tag()).collect();
    assert_eq!(tags, ["document", "image"]);
}

// ── Authorization ─────────────────────────────────────────────────────

#[tokio::test]
async fn denied_request_never_reaches_runtime_or_reads_files() {
    let h = Harness::with(
        Arc::new(DenyBackend),
        Arc::new(UnavailableExtractor),
        RecordingExecutor::default(),
        |c| c.ingest.max_file_bytes = 8,
    );
    // The attachment is over the per-file bound; refusal must win because
    // the gate runs before any file body is read.
    let resp = h
        .send(multipart_request(
            "/v1/graph/invoke",
            &[
                Part::Field("input", r#"{"messages": []}"#),
                Part::File("photo.png", "image/png", PNG),
            ],
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body = body_json(resp).await;
    assert_eq!(body["error"]["code"], "FORBIDDEN");
    assert_eq!(h.executor.calls(), 0);
}

#[tokio::test]
async fn panicking_backend_fails_closed() {
    let h = Harness::with(
        Arc::new(PanickingBackend),
        Arc::new(UnavailableExtractor),
        RecordingExecutor::default(),
        |_| {},
    );
    let resp = h
        .send(json_request("/v1/graph/invoke", json!({ "messages": [] })))
        .await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(resp).await["error"]["code"], "INTERNAL_ERROR");
    assert_eq!(h.executor.calls(), 0);
}

#[tokio::test]
async fn rbac_role_without_stop_is_refused() {
    let backend = Arc::new(RbacBackend::from_config(&AuthzConfig::default()));
    let h = Harness::with(
        backend,
        Arc::new(UnavailableExtractor),
        RecordingExecutor::default(),
        |_| {},
    );

    let resp = h
        .send(json_request("/v1/graph/invoke", json!({ "messages": [] })))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = h
        .send(json_request("/v1/graph/stop", json!({ "thread_id": "t-1" })))
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert!(h.executor.stops.lock().unwrap().is_empty());
}

#[tokio::test]
async fn missing_or_wrong_token_is_unauthorized() {
    let h = Harness::new();
    let req = Request::post("/v1/graph/invoke")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"messages": []}"#))
        .unwrap();
    let resp = h.send(req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(resp).await["error"]["code"], "UNAUTHORIZED");

    let req = Request::post("/v1/graph/invoke")
        .header(AUTHORIZATION, "Bearer wrong")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"messages": []}"#))
        .unwrap();
    assert_eq!(h.send(req).await.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(h.executor.calls(), 0);
}

// ── Limits and validation ─────────────────────────────────────────────

#[tokio::test]
async fn oversized_file_aborts_whole_request() {
    let h = Harness::with(
        Arc::new(DefaultBackend),
        Arc::new(UnavailableExtractor),
        RecordingExecutor::default(),
        |c| c.ingest.max_file_bytes = 8,
    );
    let resp = h
        .send(multipart_request(
            "/v1/graph/invoke",
            &[
                Part::Field("input", r#"{"messages": []}"#),
                Part::File("small.txt", "text/plain", b"ok"),
                Part::File("photo.png", "image/png", PNG),
            ],
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body_json(resp).await["error"]["code"], "PAYLOAD_TOO_LARGE");
    assert_eq!(h.executor.calls(), 0);
}

#[tokio::test]
async fn declared_length_over_request_bound_is_rejected_first() {
    let h = Harness::with(
        Arc::new(DefaultBackend),
        Arc::new(UnavailableExtractor),
        RecordingExecutor::default(),
        |c| c.server.max_request_bytes = 64,
    );
    let payload =
        json!({ "messages": [{ "role": "user", "content": "x".repeat(200) }] }).to_string();
    // No credentials: the size check runs before authentication.
    let req = Request::post("/v1/graph/invoke")
        .header(CONTENT_TYPE, "application/json")
        .header(CONTENT_LENGTH, payload.len())
        .body(Body::from(payload))
        .unwrap();
    let resp = h.send(req).await;
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(h.executor.calls(), 0);
}

#[tokio::test]
async fn too_many_files_is_a_validation_error() {
    let h = Harness::with(
        Arc::new(DefaultBackend),
        Arc::new(UnavailableExtractor),
        RecordingExecutor::default(),
        |c| c.ingest.max_files = 1,
    );
    let resp = h
        .send(multipart_request(
            "/v1/graph/invoke",
            &[
                Part::Field("input", r#"{"messages": []}"#),
                Part::File("a.png", "image/png", PNG),
                Part::File("b.png", "image/png", PNG),
            ],
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(h.executor.calls(), 0);
}

#[tokio::test]
async fn file_past_the_count_is_refused_before_it_is_read() {
    // The second file is also over the size bound. The count check must
    // fire first, so nothing of it is read and the answer is 422, not 413.
    let h = Harness::with(
        Arc::new(DefaultBackend),
        Arc::new(UnavailableExtractor),
        RecordingExecutor::default(),
        |c| {
            c.ingest.max_files = 1;
            c.ingest.max_file_bytes = 8;
        },
    );
    let resp = h
        .send(multipart_request(
            "/v1/graph/invoke",
            &[
                Part::Field("input", r#"{"messages": []}"#),
                Part::File("small.txt", "text/plain", b"ok"),
                Part::File("photo.png", "image/png", PNG),
            ],
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(resp).await;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("at most 1 files"));
    assert_eq!(h.executor.calls(), 0);
}

#[tokio::test]
async fn broken_json_body_is_unreadable_not_too_large() {
    let h = Harness::new();
    let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
        Ok(Bytes::from_static(b"{\"messages\": [")),
        Err(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "client went away",
        )),
    ];
    let req = authed(
        "POST",
        "/v1/graph/invoke",
        Body::from_stream(futures_util::stream::iter(chunks)),
    );
    let resp = h.send(req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["error"]["code"], "UNREADABLE_STREAM");
    assert_eq!(h.executor.calls(), 0);
}

#[tokio::test]
async fn undeclared_oversized_json_body_is_too_large() {
    let h = Harness::with(
        Arc::new(DefaultBackend),
        Arc::new(UnavailableExtractor),
        RecordingExecutor::default(),
        |c| c.server.max_request_bytes = 64,
    );
    // Streamed without a Content-Length, so only the body limit sees it.
    let payload =
        json!({ "messages": [{ "role": "user", "content": "x".repeat(200) }] }).to_string();
    let chunks: Vec<Result<Bytes, std::io::Error>> = vec![Ok(Bytes::from(payload))];
    let req = authed(
        "POST",
        "/v1/graph/invoke",
        Body::from_stream(futures_util::stream::iter(chunks)),
    );
    let resp = h.send(req).await;
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body_json(resp).await["error"]["code"], "PAYLOAD_TOO_LARGE");
}

#[tokio::test]
async fn files_before_input_are_rejected() {
    let h = Harness::new();
    let resp = h
        .send(multipart_request(
            "/v1/graph/invoke",
            &[
                Part::File("a.png", "image/png", PNG),
                Part::Field("input", r#"{"messages": []}"#),
            ],
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(resp).await["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn malformed_input_is_rejected_before_runtime() {
    let h = Harness::new();
    let resp = h
        .send(json_request("/v1/graph/invoke", json!({ "messages": "nope" })))
        .await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(h.executor.calls(), 0);
}

#[tokio::test]
async fn production_mode_sanitizes_messages() {
    let h = Harness::with(
        Arc::new(DenyBackend),
        Arc::new(UnavailableExtractor),
        RecordingExecutor::default(),
        |c| c.server.mode = RunMode::Production,
    );
    let resp = h
        .send(json_request("/v1/graph/invoke", json!({ "messages": [] })))
        .await;
    let body = body_json(resp).await;
    assert_eq!(
        body["error"]["message"],
        "You do not have permission to perform this action."
    );
    assert!(body["metadata"]["request_id"].is_string());
}

/// Captures formatted log output.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn debug_logs_show_redacted_identity() {
    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let h = Harness::new();
    let resp = h
        .send(json_request(
            "/v1/graph/invoke",
            json!({ "messages": [], "config": { "thread_id": "t-1" } }),
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let out = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
    assert!(out.contains("authorizing"));
    assert!(out.contains("alice"));
    assert!(out.contains("***REDACTED***"));
    assert!(!out.contains("s3cr3t-session-value"));
}

// ── Streaming, stop, health ───────────────────────────────────────────

fn ndjson(bytes: &[u8]) -> Vec<Value> {
    std::str::from_utf8(bytes)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[tokio::test]
async fn stream_forwards_chunks_in_order() {
    let h = Harness::new();
    let resp = h
        .send(json_request(
            "/v1/graph/stream",
            json!({ "messages": [{ "role": "user", "content": "go" }] }),
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[CONTENT_TYPE], "application/x-ndjson");

    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let lines = ndjson(&bytes);
    assert_eq!(lines.len(), 4);
    assert!(lines[0]["metadata"]["request_id"].is_string());
    let ns: Vec<i64> = lines[1..]
        .iter()
        .map(|l| l["data"]["n"].as_i64().unwrap())
        .collect();
    assert_eq!(ns, [1, 2, 3]);
    assert_eq!(lines[1]["metadata"]["node"], "agent");
}

#[tokio::test]
async fn stream_failure_ends_with_error_line() {
    let h = Harness::with(
        Arc::new(DefaultBackend),
        Arc::new(UnavailableExtractor),
        RecordingExecutor {
            fail_stream: true,
            ..RecordingExecutor::default()
        },
        |_| {},
    );
    let resp = h
        .send(json_request("/v1/graph/stream", json!({ "messages": [] })))
        .await;
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let lines = ndjson(&bytes);
    assert_eq!(lines.len(), 5);
    assert_eq!(lines[4]["error"]["code"], "GRAPH_ERROR");
}

#[tokio::test]
async fn client_disconnect_drops_runtime_stream() {
    let dropped = Arc::new(AtomicBool::new(false));
    let h = Harness::with(
        Arc::new(DefaultBackend),
        Arc::new(UnavailableExtractor),
        RecordingExecutor {
            hold_stream: Some(dropped.clone()),
            ..RecordingExecutor::default()
        },
        |_| {},
    );
    let resp = h
        .send(json_request("/v1/graph/stream", json!({ "messages": [] })))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let mut body = resp.into_body().into_data_stream();
    let header = body.next().await.unwrap().unwrap();
    assert!(ndjson(&header)[0]["metadata"]["request_id"].is_string());
    let first = body.next().await.unwrap().unwrap();
    assert_eq!(ndjson(&first)[0]["data"]["n"], 1);
    assert!(!dropped.load(Ordering::SeqCst));

    // The client goes away mid-stream.
    drop(body);
    assert!(dropped.load(Ordering::SeqCst));
}

#[tokio::test]
async fn stop_reaches_runtime() {
    let h = Harness::new();
    let resp = h
        .send(json_request("/v1/graph/stop", json!({ "thread_id": "t-9" })))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["data"]["stopped"], "t-9");
    assert_eq!(*h.executor.stops.lock().unwrap(), ["t-9"]);

    let resp = h
        .send(json_request("/v1/graph/stop", json!({ "thread_id": "  " })))
        .await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn health_is_public_and_echoes_request_id() {
    let h = Harness::new();
    let req = Request::get("/v1/health")
        .header("x-request-id", "lb-check-1")
        .body(Body::empty())
        .unwrap();
    let resp = h.send(req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["x-request-id"], "lb-check-1");
    let body = body_json(resp).await;
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["metadata"]["request_id"], "lb-check-1");
}

// ── Graph description and memory store ───────────────────────────────

#[tokio::test]
async fn graph_description_needs_graph_read() {
    let backend = Arc::new(RecordingBackend::default());
    let h = Harness::with(
        backend.clone(),
        Arc::new(UnavailableExtractor),
        RecordingExecutor::default(),
        |_| {},
    );

    let resp = h.send(authed("GET", "/v1/graph", Body::empty())).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["data"]["nodes"][0], "agent");

    let resp = h
        .send(authed("GET", "/v1/graph/state-schema", Body::empty()))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["data"]["type"], "object");

    let seen = backend.seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(seen
        .iter()
        .all(|r| r.resource == "graph" && r.action == "read" && r.resource_id.is_none()));
}

#[tokio::test]
async fn graph_description_refused_without_permission() {
    let h = Harness::with(
        Arc::new(DenyBackend),
        Arc::new(UnavailableExtractor),
        RecordingExecutor::default(),
        |_| {},
    );
    let resp = h.send(authed("GET", "/v1/graph", Body::empty())).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let req = Request::get("/v1/graph/state-schema").body(Body::empty()).unwrap();
    assert_eq!(h.send(req).await.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn store_calls_are_gated_per_memory() {
    let backend = Arc::new(RecordingBackend::default());
    let h = Harness::with(
        backend.clone(),
        Arc::new(UnavailableExtractor),
        RecordingExecutor::default(),
        |_| {},
    );

    let resp = h
        .send(json_request(
            "/v1/store/memories",
            json!({ "content": "likes green tea" }),
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["data"]["echo"]["content"], "likes green tea");

    let resp = h
        .send(authed(
            "PUT",
            "/v1/store/memories/mem-7",
            Body::from(r#"{"content": "prefers oolong"}"#),
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["data"]["memory_id"], "mem-7");

    let resp = h
        .send(authed("DELETE", "/v1/store/memories/mem-7", Body::empty()))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = h
        .send(json_request("/v1/store/memories/forget", json!({ "filters": {} })))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let seen: Vec<(String, String, Option<String>)> = backend
        .seen
        .lock()
        .unwrap()
        .iter()
        .map(|r| (r.resource.clone(), r.action.clone(), r.resource_id.clone()))
        .collect();
    let expected: Vec<(String, String, Option<String>)> = vec![
        ("store".into(), "write".into(), None),
        ("store".into(), "write".into(), Some("mem-7".into())),
        ("store".into(), "delete".into(), Some("mem-7".into())),
        ("store".into(), "forget".into(), None),
    ];
    assert_eq!(seen, expected);

    let ops = h.store.ops();
    assert_eq!(
        ops,
        [
            MemoryOp::Create,
            MemoryOp::Update("mem-7".into()),
            MemoryOp::Delete("mem-7".into()),
            MemoryOp::Forget,
        ]
    );
}

#[tokio::test]
async fn store_routes_prefer_fixed_paths_over_ids() {
    let h = Harness::new();
    let resp = h.send(authed("POST", "/v1/store/memories/list", Body::empty())).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = h
        .send(json_request("/v1/store/search", json!({ "query": "tea" })))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = h.send(authed("POST", "/v1/store/memories/mem-1", Body::empty())).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let ops = h.store.ops();
    assert_eq!(
        ops,
        [MemoryOp::List, MemoryOp::Search, MemoryOp::Get("mem-1".into())]
    );
}

#[tokio::test]
async fn rbac_developer_cannot_forget_memories() {
    let backend = Arc::new(RbacBackend::from_config(&AuthzConfig::default()));
    let h = Harness::with(
        backend,
        Arc::new(UnavailableExtractor),
        RecordingExecutor::default(),
        |_| {},
    );

    let resp = h
        .send(json_request("/v1/store/search", json!({ "query": "tea" })))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = h
        .send(json_request("/v1/store/memories/forget", json!({ "filters": {} })))
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let resp = h
        .send(authed("DELETE", "/v1/store/memories/mem-1", Body::empty()))
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(h.store.calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn store_body_must_be_a_json_object() {
    let h = Harness::new();
    let resp = h
        .send(json_request("/v1/store/memories", json!(["not", "an", "object"])))
        .await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(h.store.calls.lock().unwrap().is_empty());
}
