//! `ag-authz`: who may do what.
//!
//! Backends implement [`AuthorizationBackend`]; one is picked by name from
//! the [`BackendRegistry`] at startup and wrapped in an
//! [`AuthorizationGate`], which is the only thing request handlers call.
//! The gate fails closed: a backend error or panic is a refusal.

pub mod backend;
pub mod gate;
pub mod rbac;
pub mod registry;
pub mod vocabulary;

pub use backend::{AuthorizationBackend, AuthzRequest, DefaultBackend};
pub use gate::{AuthorizationGate, GateError};
pub use rbac::RbacBackend;
pub use registry::BackendRegistry;
