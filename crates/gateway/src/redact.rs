//! Scrub credentials out of values before they reach the logs.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

pub const REDACTED: &str = "***REDACTED***";
const MAX_DEPTH: usize = 10;

/// Key fragments that mark a value as secret, matched case-insensitively.
const SENSITIVE_KEYS: &[&str] = &[
    "token",
    "password",
    "secret",
    "key",
    "credential",
    "authorization",
    "auth",
    "bearer",
    "jwt",
    "session",
    "cookie",
    "passphrase",
    "pin",
    "ssn",
    "credit_card",
];

static JWT_RE: OnceLock<Regex> = OnceLock::new();
static BEARER_RE: OnceLock<Regex> = OnceLock::new();

fn jwt_re() -> &'static Regex {
    JWT_RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9\-_=]+\.[A-Za-z0-9\-_=]+\.?[A-Za-z0-9\-_.+/=]*$")
            .expect("JWT pattern compiles")
    })
}

fn bearer_re() -> &'static Regex {
    BEARER_RE.get_or_init(|| {
        Regex::new(r"(?i)^Bearer\s+[A-Za-z0-9\-_.~+/]+=*$").expect("bearer pattern compiles")
    })
}

/// Copy of `value` with secrets replaced. Structures nested deeper than
/// ten levels are cut off.
pub fn sanitize_for_logging(value: &Value) -> Value {
    sanitize(value, 0)
}

fn sanitize(value: &Value, depth: usize) -> Value {
    if depth >= MAX_DEPTH {
        return Value::from("***MAX_DEPTH_REACHED***");
    }
    match value {
        Value::Object(map) => {
            let clean: Map<String, Value> = map
                .iter()
                .map(|(k, v)| {
                    let v = if is_sensitive_key(k) {
                        Value::from(REDACTED)
                    } else {
                        sanitize(v, depth + 1)
                    };
                    (k.clone(), v)
                })
                .collect();
            Value::Object(clean)
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| sanitize(v, depth + 1)).collect()),
        Value::String(s) => Value::String(sanitize_str(s)),
        other => other.clone(),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    SENSITIVE_KEYS.iter().any(|frag| lower.contains(frag))
}

fn sanitize_str(s: &str) -> String {
    if s.len() > 20 && jwt_re().is_match(s) {
        return "***JWT_TOKEN***".into();
    }
    if bearer_re().is_match(s) {
        return "***BEARER_TOKEN***".into();
    }
    let chars: Vec<char> = s.chars().collect();
    let opaque = chars
        .iter()
        .filter(|c| **c != '-' && **c != '_')
        .all(|c| c.is_alphanumeric());
    if chars.len() > 32 && opaque {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        return format!("{head}...{tail}");
    }
    s.to_owned()
}
