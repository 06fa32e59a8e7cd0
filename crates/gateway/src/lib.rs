//! `ag-gateway`: HTTP surface of agentgate: authentication, the graph
//! endpoints, the request orchestrator and the execution collaborator client.

pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod error;
pub mod redact;
pub mod runtime;
pub mod state;
