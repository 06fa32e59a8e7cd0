//! Where attachments come from.
//!
//! The orchestrator pulls uploads one at a time, and only after the
//! authorization gate has passed, so a refused request never has its file
//! bodies read. Sources count what they hand out and refuse a file past
//! the ingestor's `max_files` before reading any of its bytes.

use std::collections::VecDeque;
use std::convert::Infallible;

use ag_ingest::{FileIngestor, RawUpload};
use async_trait::async_trait;

use crate::error::ApiError;

#[async_trait]
pub trait UploadSource: Send {
    /// Read the next attachment under the ingestor's size and count
    /// bounds. `Ok(None)` once there are no more.
    async fn next_upload(&mut self, ingestor: &FileIngestor) -> Result<Option<RawUpload>, ApiError>;

    /// Whether text extraction was requested. Only final once the source
    /// has been drained.
    fn extract_text(&self) -> bool;
}

/// Count one more attachment against `max_files`, failing before it is read.
pub(crate) fn admit_another(taken: &mut usize, ingestor: &FileIngestor) -> Result<(), ApiError> {
    let max_files = ingestor.config().max_files;
    if *taken >= max_files {
        return Err(ApiError::validation(format!(
            "at most {max_files} files may be attached to one request"
        )));
    }
    *taken += 1;
    Ok(())
}

/// No attachments (plain JSON requests).
#[derive(Debug, Default)]
pub struct NoUploads;

#[async_trait]
impl UploadSource for NoUploads {
    async fn next_upload(&mut self, _: &FileIngestor) -> Result<Option<RawUpload>, ApiError> {
        Ok(None)
    }

    fn extract_text(&self) -> bool {
        false
    }
}

/// Attachments already held in memory. They still go through the size
/// bound like streamed ones.
#[derive(Debug, Default)]
pub struct MemoryUploads {
    pending: VecDeque<RawUpload>,
    extract_text: bool,
    taken: usize,
}

impl MemoryUploads {
    pub fn new(uploads: Vec<RawUpload>, extract_text: bool) -> Self {
        Self {
            pending: uploads.into(),
            extract_text,
            taken: 0,
        }
    }
}

#[async_trait]
impl UploadSource for MemoryUploads {
    async fn next_upload(
        &mut self,
        ingestor: &FileIngestor,
    ) -> Result<Option<RawUpload>, ApiError> {
        let Some(upload) = self.pending.pop_front() else {
            return Ok(None);
        };
        admit_another(&mut self.taken, ingestor)?;
        let body = futures_util::stream::iter([Ok::<_, Infallible>(upload.bytes)]);
        let upload = ingestor
            .read_upload(upload.filename, upload.declared_content_type, body)
            .await?;
        Ok(Some(upload))
    }

    fn extract_text(&self) -> bool {
        self.extract_text
    }
}
