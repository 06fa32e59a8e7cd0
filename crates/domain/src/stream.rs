use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// A boxed async stream, used for incremental graph output.
pub type BoxStream<'a, T> = Pin<Box<dyn futures_core::Stream<Item = T> + Send + 'a>>;

/// One incremental unit produced by the agent graph while streaming.
///
/// The payload is opaque to this service; it is forwarded to the caller
/// in the order the graph emitted it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphChunk {
    pub data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}
