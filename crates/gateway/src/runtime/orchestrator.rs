//! Request orchestration for the graph and store endpoints.
//!
//! Graph runs follow a fixed order: authorize, read attachments, ingest,
//! assemble, execute.
//! A hard failure at any step returns before the graph runtime is called,
//! so the runtime never sees a partially assembled conversation.

use ag_authz::vocabulary::{action, resource};
use ag_authz::AuthzRequest;
use ag_domain::content::ContentBlock;
use ag_domain::identity::Identity;
use ag_ingest::{assemble, IngestWarning};
use serde_json::Value;

use crate::error::ApiError;
use crate::redact::sanitize_for_logging;
use crate::runtime::executor::ChunkStream;
use crate::runtime::input::{GraphInput, StopRequest};
use crate::runtime::store::MemoryOp;
use crate::runtime::uploads::UploadSource;
use crate::state::AppState;

/// A graph input ready for the runtime.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub input: GraphInput,
    pub warnings: Vec<IngestWarning>,
}

pub struct InvokeOutcome {
    pub result: Value,
    pub warnings: Vec<IngestWarning>,
}

pub struct StreamOutcome {
    pub chunks: ChunkStream,
    pub warnings: Vec<IngestWarning>,
}

/// Authorize `graph:<graph_action>`, then fold the attachments from
/// `uploads` into `input.messages`.
pub async fn prepare(
    state: &AppState,
    identity: &Identity,
    graph_action: &str,
    mut input: GraphInput,
    uploads: &mut dyn UploadSource,
) -> Result<Prepared, ApiError> {
    let request =
        AuthzRequest::new(resource::GRAPH, graph_action).with_resource_id(input.thread_id());
    authorize(state, identity, &request).await?;

    let mut raw = Vec::new();
    while let Some(upload) = uploads.next_upload(&state.ingestor).await? {
        raw.push(upload);
    }
    if raw.is_empty() {
        return Ok(Prepared {
            input,
            warnings: Vec::new(),
        });
    }

    let extract_text = uploads.extract_text();
    let ingested = state.ingestor.ingest_all(&raw, extract_text).await;

    let mut blocks: Vec<ContentBlock> = Vec::with_capacity(ingested.len());
    let mut warnings = Vec::new();
    for item in ingested {
        warnings.extend(item.warning);
        blocks.push(item.block);
    }
    tracing::info!(
        files = blocks.len(),
        warnings = warnings.len(),
        extract_text,
        "attachments ingested"
    );

    input.messages = assemble(std::mem::take(&mut input.messages), blocks);
    Ok(Prepared { input, warnings })
}

pub async fn invoke(
    state: &AppState,
    identity: &Identity,
    input: GraphInput,
    uploads: &mut dyn UploadSource,
) -> Result<InvokeOutcome, ApiError> {
    let prepared = prepare(state, identity, action::INVOKE, input, uploads).await?;
    let result = state.executor.invoke(&prepared.input).await?;
    Ok(InvokeOutcome {
        result,
        warnings: prepared.warnings,
    })
}

pub async fn stream(
    state: &AppState,
    identity: &Identity,
    input: GraphInput,
    uploads: &mut dyn UploadSource,
) -> Result<StreamOutcome, ApiError> {
    let prepared = prepare(state, identity, action::STREAM, input, uploads).await?;
    let chunks = state.executor.stream(&prepared.input).await?;
    Ok(StreamOutcome {
        chunks,
        warnings: prepared.warnings,
    })
}

pub async fn stop(
    state: &AppState,
    identity: &Identity,
    request: StopRequest,
) -> Result<Value, ApiError> {
    if request.thread_id.trim().is_empty() {
        return Err(ApiError::validation("thread_id must not be empty"));
    }
    let authz = AuthzRequest::new(resource::GRAPH, action::STOP)
        .with_resource_id(Some(request.thread_id.clone()));
    authorize(state, identity, &authz).await?;

    let result = state
        .executor
        .stop(&request.thread_id, request.config.as_ref())
        .await?;
    tracing::info!(thread_id = %request.thread_id, "graph stop requested");
    Ok(result)
}

/// `graph:read`, then the runtime's description of the graph.
pub async fn graph_info(state: &AppState, identity: &Identity) -> Result<Value, ApiError> {
    authorize(state, identity, &AuthzRequest::new(resource::GRAPH, action::READ)).await?;
    Ok(state.executor.graph_info().await?)
}

pub async fn state_schema(state: &AppState, identity: &Identity) -> Result<Value, ApiError> {
    authorize(state, identity, &AuthzRequest::new(resource::GRAPH, action::READ)).await?;
    Ok(state.executor.state_schema().await?)
}

/// `store:<action>` on the memory the operation targets, then forward.
pub async fn store_call(
    state: &AppState,
    identity: &Identity,
    op: MemoryOp,
    body: Value,
) -> Result<Value, ApiError> {
    if op.memory_id().is_some_and(|id| id.trim().is_empty()) {
        return Err(ApiError::validation("memory_id must not be empty"));
    }
    let request = AuthzRequest::new(resource::STORE, op.action())
        .with_resource_id(op.memory_id().map(str::to_owned));
    authorize(state, identity, &request).await?;

    let result = state.store.call(&op, body).await?;
    tracing::info!(op = ?op, "memory store call completed");
    Ok(result)
}

async fn authorize(
    state: &AppState,
    identity: &Identity,
    request: &AuthzRequest,
) -> Result<(), ApiError> {
    if tracing::enabled!(tracing::Level::DEBUG) {
        let who = serde_json::to_value(identity).unwrap_or(Value::Null);
        let context = Value::Object(request.context.clone());
        tracing::debug!(
            identity = %sanitize_for_logging(&who),
            context = %sanitize_for_logging(&context),
            resource = %request.resource,
            action = %request.action,
            resource_id = ?request.resource_id,
            "authorizing"
        );
    }
    state.gate.authorize(identity, request).await?;
    Ok(())
}
