//! Resource and action names understood by the built-in backends.
//! Integrator backends may accept others.

pub mod resource {
    pub const GRAPH: &str = "graph";
    pub const CHECKPOINTER: &str = "checkpointer";
    pub const STORE: &str = "store";
}

pub mod action {
    pub const INVOKE: &str = "invoke";
    pub const STREAM: &str = "stream";
    pub const READ: &str = "read";
    pub const WRITE: &str = "write";
    pub const DELETE: &str = "delete";
    pub const STOP: &str = "stop";
    pub const SETUP: &str = "setup";
    pub const FIX: &str = "fix";
    pub const FORGET: &str = "forget";
}
