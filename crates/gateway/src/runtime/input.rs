use ag_domain::message::Message;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ApiError;

/// How much of the graph state the runtime should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseGranularity {
    #[default]
    Low,
    Partial,
    Full,
}

/// Body of `/v1/graph/invoke` and `/v1/graph/stream`. After ingestion
/// the same structure, with attachments folded into `messages`, is what
/// the graph runtime receives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphInput {
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_state: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Map<String, Value>>,
    #[serde(default = "d_recursion_limit")]
    pub recursion_limit: u32,
    #[serde(default)]
    pub response_granularity: ResponseGranularity,
    #[serde(default)]
    pub include_raw: bool,
}

fn d_recursion_limit() -> u32 {
    25
}

impl GraphInput {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            initial_state: None,
            config: None,
            recursion_limit: d_recursion_limit(),
            response_granularity: ResponseGranularity::default(),
            include_raw: false,
        }
    }

    /// Parse and validate a JSON body.
    pub fn from_json(raw: &[u8]) -> Result<Self, ApiError> {
        let input: GraphInput = serde_json::from_slice(raw)
            .map_err(|e| ApiError::validation(format!("invalid graph input: {e}")))?;
        input.validate()?;
        Ok(input)
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        if self.recursion_limit == 0 {
            return Err(ApiError::validation("recursion_limit must be at least 1"));
        }
        Ok(())
    }

    /// `config.thread_id`, the entity that invoke/stream act on.
    pub fn thread_id(&self) -> Option<String> {
        match self.config.as_ref()?.get("thread_id")? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Body of `/v1/graph/stop`.
#[derive(Debug, Clone, Deserialize)]
pub struct StopRequest {
    pub thread_id: String,
    #[serde(default)]
    pub config: Option<Map<String, Value>>,
}
