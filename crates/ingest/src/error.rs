use std::time::Duration;

use serde::Serialize;

/// Hard ingestion failures. Either one aborts the whole request.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    #[error("could not read upload '{filename}': {reason}")]
    UnreadableStream { filename: String, reason: String },

    #[error("upload '{filename}' exceeds the {limit}-byte limit")]
    PayloadTooLarge { filename: String, limit: u64 },
}

impl IngestError {
    pub fn filename(&self) -> &str {
        match self {
            IngestError::UnreadableStream { filename, .. }
            | IngestError::PayloadTooLarge { filename, .. } => filename,
        }
    }
}

/// Why text extraction did not produce text. Always soft: the pipeline
/// falls back to the raw document block.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("no text extractor is configured")]
    Unavailable,

    #[error("text extraction is not supported for {0}")]
    Unsupported(String),

    #[error("text extraction timed out after {0:?}")]
    Timeout(Duration),

    #[error("text extraction produced no text")]
    Empty,

    #[error("text extraction failed: {0}")]
    Failed(String),
}

/// Non-fatal signal surfaced to the caller next to the produced block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestWarning {
    pub filename: String,
    pub code: String,
    pub message: String,
}

impl IngestWarning {
    pub const EXTRACTION_UNAVAILABLE: &'static str = "EXTRACTION_UNAVAILABLE";

    pub fn extraction(filename: &str, err: &ExtractError) -> Self {
        Self {
            filename: filename.to_owned(),
            code: Self::EXTRACTION_UNAVAILABLE.to_owned(),
            message: err.to_string(),
        }
    }
}
