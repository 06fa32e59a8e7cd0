//! `ag-domain`: types shared by every agentgate crate: the content block
//! model, media references, messages, caller identity, configuration and
//! the common error type.

pub mod config;
pub mod content;
pub mod error;
pub mod identity;
pub mod media;
pub mod message;
pub mod stream;
