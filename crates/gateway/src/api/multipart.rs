//! `multipart/form-data` graph requests.
//!
//! Field order matters: `input` (the JSON [`GraphInput`]) must come before
//! any `files` field, so the request can be authorized before a single
//! attachment byte is read. `extract_text` may appear anywhere.

use ag_ingest::{FileIngestor, RawUpload};
use async_trait::async_trait;
use axum::extract::multipart::MultipartError;
use axum::extract::Multipart;
use axum::http::StatusCode;

use crate::error::ApiError;
use crate::runtime::input::GraphInput;
use crate::runtime::uploads::{admit_another, UploadSource};

pub const INPUT_FIELD: &str = "input";
pub const FILES_FIELD: &str = "files";
pub const EXTRACT_TEXT_FIELD: &str = "extract_text";

/// The `files` parts of a multipart body, read on demand.
pub struct MultipartUploads {
    multipart: Multipart,
    extract_text: bool,
    taken: usize,
}

impl MultipartUploads {
    /// Consume fields up to and including `input`. The returned source
    /// yields the remaining `files` parts.
    pub async fn open(mut multipart: Multipart) -> Result<(GraphInput, Self), ApiError> {
        let mut extract_text = false;
        loop {
            let Some(field) = multipart.next_field().await.map_err(multipart_error)? else {
                return Err(ApiError::validation("multipart body has no 'input' field"));
            };
            let name = field.name().unwrap_or_default().to_owned();
            match name.as_str() {
                INPUT_FIELD => {
                    let raw = field.bytes().await.map_err(multipart_error)?;
                    let input = GraphInput::from_json(&raw)?;
                    return Ok((
                        input,
                        Self {
                            multipart,
                            extract_text,
                            taken: 0,
                        },
                    ));
                }
                EXTRACT_TEXT_FIELD => {
                    extract_text = parse_flag(&field.text().await.map_err(multipart_error)?)?;
                }
                FILES_FIELD => {
                    return Err(ApiError::validation(
                        "the 'input' field must precede any 'files' field",
                    ));
                }
                other => tracing::debug!(field = %other, "ignoring multipart field"),
            }
        }
    }
}

#[async_trait]
impl UploadSource for MultipartUploads {
    async fn next_upload(
        &mut self,
        ingestor: &FileIngestor,
    ) -> Result<Option<RawUpload>, ApiError> {
        while let Some(field) = self.multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_owned();
            match name.as_str() {
                FILES_FIELD => {
                    admit_another(&mut self.taken, ingestor)?;
                    let filename = field.file_name().unwrap_or("upload").to_owned();
                    let content_type = field.content_type().map(str::to_owned);
                    let upload = ingestor.read_upload(filename, content_type, field).await?;
                    return Ok(Some(upload));
                }
                EXTRACT_TEXT_FIELD => {
                    self.extract_text =
                        parse_flag(&field.text().await.map_err(multipart_error)?)?;
                }
                INPUT_FIELD => {
                    return Err(ApiError::validation("duplicate 'input' field"));
                }
                other => tracing::debug!(field = %other, "ignoring multipart field"),
            }
        }
        Ok(None)
    }

    fn extract_text(&self) -> bool {
        self.extract_text
    }
}

fn parse_flag(raw: &str) -> Result<bool, ApiError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        other => Err(ApiError::validation(format!(
            "extract_text must be a boolean, got '{other}'"
        ))),
    }
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large(e.body_text())
    } else {
        ApiError::unreadable(e.body_text())
    }
}
