//! `ag-ingest`: turns uploaded files into content blocks and folds them
//! into a conversation.
//!
//! - [`mime`] resolves the effective MIME type from the bytes and the
//!   filename; the client-declared type is only a last resort.
//! - [`extract`] is the optional text-extraction collaborator.
//! - [`pipeline`] reads an upload under a size bound, hashes it, and
//!   produces exactly one [`ContentBlock`](ag_domain::content::ContentBlock).
//! - [`assemble`] places the produced blocks into the message history.

pub mod assemble;
pub mod error;
pub mod extract;
pub mod mime;
pub mod pipeline;

pub use assemble::assemble;
pub use error::{ExtractError, IngestError, IngestWarning};
pub use extract::{create_extractor, HttpTextExtractor, TextExtractor, UnavailableExtractor};
pub use mime::MediaClass;
pub use pipeline::{FileIngestor, Ingested, RawUpload, INGEST_WARNING};
