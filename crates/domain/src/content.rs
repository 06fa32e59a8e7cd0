//! Content blocks: one typed unit of message content.
//!
//! On the wire every block is a JSON object with a `type` discriminant
//! (`text`, `image`, `tool_call`, ...). Decoding a `type` we don't know
//! never fails: the whole object is kept in [`ContentBlock::Unknown`] and
//! re-emitted verbatim on encode, so blocks survive a trip through this
//! service even when a newer producer added variants.
//!
//! Encoding goes through `serde_json::Value`, whose object map is ordered
//! by key, so a given block always serializes to the same bytes.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::ser::{self, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::media::MediaRef;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Variant payloads
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A note attached to a text or media block (citation, provenance, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
}

/// Payload shared by the image, audio, video and document variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaBlock {
    pub media: MediaRef,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
}

impl MediaBlock {
    pub fn new(media: MediaRef) -> Self {
        Self {
            media,
            annotations: Vec::new(),
        }
    }

    pub fn with_annotation(mut self, kind: impl Into<String>, payload: Value) -> Self {
        self.annotations.push(Annotation {
            kind: kind.into(),
            payload,
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataBlock {
    pub mime_type: String,
    #[serde(with = "b64")]
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallBlock {
    pub call_id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultBlock {
    pub call_id: String,
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub is_error: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningBlock {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationBlock {
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBlock {
    pub code: String,
    pub message: String,
}

/// A block whose `type` this build does not recognise. `raw` is the full
/// original object, `type` field included.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownBlock {
    pub type_tag: String,
    pub raw: Value,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ContentBlock
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    Text(TextBlock),
    Image(MediaBlock),
    Audio(MediaBlock),
    Video(MediaBlock),
    Document(MediaBlock),
    Data(DataBlock),
    ToolCall(ToolCallBlock),
    /// Same shape as `ToolCall`, executed outside the agent graph.
    RemoteToolCall(ToolCallBlock),
    ToolResult(ToolResultBlock),
    Reasoning(ReasoningBlock),
    Annotation(AnnotationBlock),
    Error(ErrorBlock),
    Unknown(UnknownBlock),
}

impl ContentBlock {
    /// Wire discriminant for this block.
    pub fn type_tag(&self) -> &str {
        match self {
            ContentBlock::Text(_) => "text",
            ContentBlock::Image(_) => "image",
            ContentBlock::Audio(_) => "audio",
            ContentBlock::Video(_) => "video",
            ContentBlock::Document(_) => "document",
            ContentBlock::Data(_) => "data",
            ContentBlock::ToolCall(_) => "tool_call",
            ContentBlock::RemoteToolCall(_) => "remote_tool_call",
            ContentBlock::ToolResult(_) => "tool_result",
            ContentBlock::Reasoning(_) => "reasoning",
            ContentBlock::Annotation(_) => "annotation",
            ContentBlock::Error(_) => "error",
            ContentBlock::Unknown(u) => &u.type_tag,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text(TextBlock {
            text: text.into(),
            annotations: Vec::new(),
        })
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        ContentBlock::Error(ErrorBlock {
            code: code.into(),
            message: message.into(),
        })
    }

    /// The media reference carried by image/audio/video/document blocks.
    pub fn media(&self) -> Option<&MediaRef> {
        match self {
            ContentBlock::Image(b)
            | ContentBlock::Audio(b)
            | ContentBlock::Video(b)
            | ContentBlock::Document(b) => Some(&b.media),
            _ => None,
        }
    }

    /// Stable encoding used for hashing and dedup downstream.
    pub fn canonical_bytes(&self) -> serde_json::Result<Vec<u8>> {
        let value = self.to_value()?;
        serde_json::to_vec(&value)
    }

    fn to_value(&self) -> Result<Value, serde_json::Error> {
        let body = match self {
            ContentBlock::Text(b) => serde_json::to_value(b)?,
            ContentBlock::Image(b)
            | ContentBlock::Audio(b)
            | ContentBlock::Video(b)
            | ContentBlock::Document(b) => serde_json::to_value(b)?,
            ContentBlock::Data(b) => serde_json::to_value(b)?,
            ContentBlock::ToolCall(b) | ContentBlock::RemoteToolCall(b) => {
                serde_json::to_value(b)?
            }
            ContentBlock::ToolResult(b) => serde_json::to_value(b)?,
            ContentBlock::Reasoning(b) => serde_json::to_value(b)?,
            ContentBlock::Annotation(b) => serde_json::to_value(b)?,
            ContentBlock::Error(b) => serde_json::to_value(b)?,
            ContentBlock::Unknown(u) => return Ok(u.raw.clone()),
        };

        let mut object = match body {
            Value::Object(map) => map,
            other => {
                return Err(ser::Error::custom(format!(
                    "block body must be an object, got {other}"
                )))
            }
        };
        object.insert("type".into(), Value::String(self.type_tag().to_owned()));
        Ok(Value::Object(sorted(object)))
    }
}

/// Rebuild a map in key order regardless of serde_json's map backend.
fn sorted(map: Map<String, Value>) -> Map<String, Value> {
    let mut entries: Vec<(String, Value)> = map.into_iter().collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    entries.into_iter().collect()
}

impl Serialize for ContentBlock {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value()
            .map_err(ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ContentBlock {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        let tag = raw
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| <D::Error as de::Error>::missing_field("type"))?
            .to_owned();

        fn body<T: DeserializeOwned, E: de::Error>(raw: Value) -> Result<T, E> {
            serde_json::from_value(raw).map_err(E::custom)
        }

        let block = match tag.as_str() {
            "text" => ContentBlock::Text(body::<_, D::Error>(raw)?),
            "image" => ContentBlock::Image(body::<_, D::Error>(raw)?),
            "audio" => ContentBlock::Audio(body::<_, D::Error>(raw)?),
            "video" => ContentBlock::Video(body::<_, D::Error>(raw)?),
            "document" => ContentBlock::Document(body::<_, D::Error>(raw)?),
            "data" => ContentBlock::Data(body::<_, D::Error>(raw)?),
            "tool_call" => ContentBlock::ToolCall(body::<_, D::Error>(raw)?),
            "remote_tool_call" => ContentBlock::RemoteToolCall(body::<_, D::Error>(raw)?),
            "tool_result" => ContentBlock::ToolResult(body::<_, D::Error>(raw)?),
            "reasoning" => ContentBlock::Reasoning(body::<_, D::Error>(raw)?),
            "annotation" => ContentBlock::Annotation(body::<_, D::Error>(raw)?),
            "error" => ContentBlock::Error(body::<_, D::Error>(raw)?),
            _ => {
                tracing::debug!(type_tag = %tag, "preserving unrecognised content block");
                ContentBlock::Unknown(UnknownBlock { type_tag: tag, raw })
            }
        };
        Ok(block)
    }
}

mod b64 {
    use super::*;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s.as_bytes()).map_err(de::Error::custom)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
