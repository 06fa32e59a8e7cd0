//! Upload → [`ContentBlock`].
//!
//! Every upload produces exactly one block. Hard failures (unreadable
//! stream, size bound exceeded) are errors; anything that goes wrong with
//! text extraction degrades to the raw document block plus a warning.

use std::sync::Arc;

use ag_domain::config::IngestConfig;
use ag_domain::content::{Annotation, ContentBlock, MediaBlock, TextBlock};
use ag_domain::media::MediaRef;
use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};

use crate::error::{ExtractError, IngestError, IngestWarning};
use crate::extract::TextExtractor;
use crate::mime::{self, MediaClass};

/// Annotation kind carried by a document whose text extraction failed.
/// The payload is the serialized [`IngestWarning`].
pub const INGEST_WARNING: &str = "ingest_warning";

/// A fully-read upload, before classification.
#[derive(Debug, Clone)]
pub struct RawUpload {
    pub filename: String,
    pub declared_content_type: Option<String>,
    pub bytes: Bytes,
}

impl RawUpload {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            declared_content_type: None,
            bytes: bytes.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.declared_content_type = Some(content_type.into());
        self
    }
}

/// Outcome of ingesting one upload.
#[derive(Debug, Clone, PartialEq)]
pub struct Ingested {
    pub block: ContentBlock,
    pub warning: Option<IngestWarning>,
}

/// Reads, classifies and (optionally) extracts uploads.
#[derive(Clone)]
pub struct FileIngestor {
    config: IngestConfig,
    extractor: Arc<dyn TextExtractor>,
}

impl FileIngestor {
    pub fn new(config: IngestConfig, extractor: Arc<dyn TextExtractor>) -> Self {
        Self { config, extractor }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Drain `body` into memory, failing as soon as the running total
    /// passes `max_file_bytes`. The rest of the stream is never read.
    pub async fn read_upload<S, B, E>(
        &self,
        filename: impl Into<String>,
        declared_content_type: Option<String>,
        body: S,
    ) -> Result<RawUpload, IngestError>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: std::fmt::Display,
    {
        let filename = filename.into();
        let limit = self.config.max_file_bytes;
        futures_util::pin_mut!(body);

        let mut buf = BytesMut::new();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| IngestError::UnreadableStream {
                filename: filename.clone(),
                reason: e.to_string(),
            })?;
            let chunk = chunk.as_ref();
            if buf.len() as u64 + chunk.len() as u64 > limit {
                tracing::warn!(filename = %filename, limit, "upload exceeds size limit");
                return Err(IngestError::PayloadTooLarge { filename, limit });
            }
            buf.extend_from_slice(chunk);
        }

        Ok(RawUpload {
            filename,
            declared_content_type,
            bytes: buf.freeze(),
        })
    }

    /// Read and ingest a single streamed upload.
    pub async fn ingest_stream<S, B, E>(
        &self,
        filename: impl Into<String>,
        declared_content_type: Option<String>,
        body: S,
        extract_text: bool,
    ) -> Result<Ingested, IngestError>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: std::fmt::Display,
    {
        let upload = self
            .read_upload(filename, declared_content_type, body)
            .await?;
        Ok(self.ingest(&upload, extract_text).await)
    }

    /// Ingest uploads concurrently. Results come back in input order.
    pub async fn ingest_all(&self, uploads: &[RawUpload], extract_text: bool) -> Vec<Ingested> {
        futures_util::future::join_all(uploads.iter().map(|u| self.ingest(u, extract_text))).await
    }

    /// Classify an already-read upload and build its block.
    pub async fn ingest(&self, upload: &RawUpload, extract_text: bool) -> Ingested {
        let declared = upload
            .declared_content_type
            .as_deref()
            .filter(|_| self.config.allow_declared_mime);
        let mime_type = mime::detect(&upload.filename, &upload.bytes, declared);
        let class = MediaClass::of(&mime_type);
        let media = MediaRef::inline(&upload.bytes, &mime_type, Some(upload.filename.clone()));

        tracing::debug!(
            filename = %upload.filename,
            mime_type = %mime_type,
            size_bytes = media.size_bytes,
            sha256 = %media.sha256,
            ?class,
            "ingesting upload"
        );

        if class == MediaClass::Document && extract_text {
            match self.extract(upload, &mime_type).await {
                Ok(text) => {
                    return Ingested {
                        block: text_with_source(text, &media),
                        warning: None,
                    };
                }
                Err(err) => {
                    tracing::warn!(
                        filename = %upload.filename,
                        error = %err,
                        "text extraction unavailable, keeping raw document"
                    );
                    let warning = IngestWarning::extraction(&upload.filename, &err);
                    let note = serde_json::to_value(&warning).unwrap_or(serde_json::Value::Null);
                    return Ingested {
                        block: ContentBlock::Document(
                            MediaBlock::new(media).with_annotation(INGEST_WARNING, note),
                        ),
                        warning: Some(warning),
                    };
                }
            }
        }

        let block = match class {
            MediaClass::Image => ContentBlock::Image(MediaBlock::new(media)),
            MediaClass::Audio => ContentBlock::Audio(MediaBlock::new(media)),
            MediaClass::Video => ContentBlock::Video(MediaBlock::new(media)),
            MediaClass::Document | MediaClass::Binary => {
                ContentBlock::Document(MediaBlock::new(media))
            }
        };
        Ingested {
            block,
            warning: None,
        }
    }

    async fn extract(&self, upload: &RawUpload, mime_type: &str) -> Result<String, ExtractError> {
        if !self.extractor.is_available() {
            return Err(ExtractError::Unavailable);
        }
        if !mime::is_extractable(&upload.filename, mime_type) {
            return Err(ExtractError::Unsupported(mime_type.to_owned()));
        }

        let budget = self.config.extract_timeout();
        let call = self
            .extractor
            .extract(upload.bytes.clone(), mime_type, &upload.filename);
        let text = tokio::time::timeout(budget, call)
            .await
            .map_err(|_| ExtractError::Timeout(budget))??;

        if text.trim().is_empty() {
            return Err(ExtractError::Empty);
        }
        Ok(text)
    }
}

/// Extracted text, with the original media kept as a `source_media`
/// annotation so the bytes are not lost.
fn text_with_source(text: String, media: &MediaRef) -> ContentBlock {
    let payload = serde_json::to_value(media).unwrap_or(serde_json::Value::Null);
    ContentBlock::Text(TextBlock {
        text,
        annotations: vec![Annotation {
            kind: "source_media".into(),
            payload,
        }],
    })
}
