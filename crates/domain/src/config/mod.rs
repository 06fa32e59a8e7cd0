mod auth;
mod authz;
mod executor;
mod ingest;
mod observability;
mod server;
mod store;

pub use auth::*;
pub use authz::*;
pub use executor::*;
pub use ingest::*;
pub use observability::*;
pub use server::*;
pub use store::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub authz: AuthzConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl ConfigError {
    fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Error,
            field: field.into(),
            message: message.into(),
        }
    }

    fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Warning,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError::error("server.port", "port must be greater than 0"));
        }
        if self.server.host.is_empty() {
            errors.push(ConfigError::error("server.host", "host must not be empty"));
        }
        if self.server.max_concurrent_requests == 0 {
            errors.push(ConfigError::error(
                "server.max_concurrent_requests",
                "must be greater than 0",
            ));
        }

        if self.ingest.max_file_bytes == 0 {
            errors.push(ConfigError::error("ingest.max_file_bytes", "must be greater than 0"));
        }
        if self.ingest.max_file_bytes > self.server.max_request_bytes {
            errors.push(ConfigError::warning(
                "ingest.max_file_bytes",
                "larger than server.max_request_bytes; the request bound wins",
            ));
        }
        if self.ingest.extract_timeout_ms == 0 {
            errors.push(ConfigError::error(
                "ingest.extract_timeout_ms",
                "extraction must run with a non-zero timeout",
            ));
        }

        if self.executor.base_url.is_empty() {
            errors.push(ConfigError::error("executor.base_url", "base_url must not be empty"));
        }
        if self.executor.max_line_bytes == 0 {
            errors.push(ConfigError::error("executor.max_line_bytes", "must be greater than 0"));
        }
        if self.store.base_url.is_empty() {
            errors.push(ConfigError::error("store.base_url", "base_url must not be empty"));
        }

        if self.authz.backend.is_empty() {
            errors.push(ConfigError::error("authz.backend", "backend name must not be empty"));
        }
        if !self.authz.roles.is_empty() && self.authz.backend != "rbac" {
            errors.push(ConfigError::warning(
                "authz.roles",
                "role matrix is only read by the rbac backend",
            ));
        }

        for (i, p) in self.auth.principals.iter().enumerate() {
            if p.user_id.trim().is_empty() {
                errors.push(ConfigError::error(
                    format!("auth.principals[{i}].user_id"),
                    "user_id must not be empty",
                ));
            }
            if p.token_env.is_empty() {
                errors.push(ConfigError::error(
                    format!("auth.principals[{i}].token_env"),
                    "token_env must not be empty",
                ));
            }
        }
        if self.auth.principals.is_empty() {
            errors.push(ConfigError::warning(
                "auth.principals",
                "no principals configured; every request runs as 'anonymous'",
            ));
        }

        let obs = &self.observability;
        if !(0.0..=1.0).contains(&obs.sample_rate) {
            errors.push(ConfigError::error(
                "observability.sample_rate",
                "must be between 0.0 and 1.0",
            ));
        }
        if obs.otlp_endpoint.is_some() && obs.otlp_endpoint().is_none() {
            errors.push(ConfigError::warning(
                "observability.otlp_endpoint",
                "blank endpoint; OpenTelemetry export stays off",
            ));
        }

        if self.server.cors.allowed_origins.len() == 1
            && self.server.cors.allowed_origins[0] == "*"
        {
            let msg = "wildcard \"*\" allows all origins (not recommended for production)";
            errors.push(ConfigError::warning("server.cors.allowed_origins", msg));
        }

        errors
    }
}
