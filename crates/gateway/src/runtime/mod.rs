//! Request runtime: graph input model, attachment sources, the
//! orchestrator that sequences authorization, ingestion and execution,
//! the client for the graph runtime that executes the request, and the
//! memory-store client.

pub mod executor;
pub mod input;
pub mod orchestrator;
pub mod store;
pub mod uploads;
