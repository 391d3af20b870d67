// Copyright 2024-2025 Aprio One AB, Sweden
// Author: Kenneth Pernyer, kenneth@aprio.one
// SPDX-License-Identifier: MIT
// See LICENSE file in the project root for full license information.

//! Redaction of secret-shaped fields before they reach a log line or error
//! chain.
//!
//! Plaintext client secrets and access tokens are PII-grade (spec §7): they
//! must never appear in logs, error messages, traces, or serialized error
//! chains. This module strips any JSON object key matching
//! `secret|password|token|key` (case-insensitive) from an upstream error
//! body before it is attached to an `Error` or logged.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

const REDACTED: &str = "***redacted***";

fn sensitive_key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)secret|password|token|key").expect("valid regex"))
}

/// Recursively redacts sensitive-looking keys in a JSON value, returning a
/// new value. Arrays and nested objects are walked; scalar leaves are left
/// untouched unless their parent key matched.
#[must_use]
pub fn redact_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, val) in map {
                if sensitive_key_pattern().is_match(key) {
                    out.insert(key.clone(), Value::String(REDACTED.to_string()));
                } else {
                    out.insert(key.clone(), redact_json(val));
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_json).collect()),
        other => other.clone(),
    }
}

/// Redacts a raw response body, falling back to a fixed-length placeholder
/// if it does not parse as JSON (so the caller never accidentally logs a raw
/// body that happens to be a bare secret string).
#[must_use]
pub fn redact_body(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => redact_json(&value).to_string(),
        Err(_) => format!("<non-json body, {} bytes>", body.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn redacts_nested_secret_fields() {
        let body = json!({
            "error": "unauthorized",
            "details": { "client_secret": "sk-abc123", "hint": "check config" }
        });
        let redacted = redact_json(&body);
        assert_eq!(redacted["details"]["client_secret"], REDACTED);
        assert_eq!(redacted["details"]["hint"], "check config");
        assert_eq!(redacted["error"], "unauthorized");
    }

    #[test]
    fn redacts_access_token_key() {
        let body = json!({ "access_token": "eyJhbGciOi..." });
        let redacted = redact_json(&body);
        assert_eq!(redacted["access_token"], REDACTED);
    }

    #[test]
    fn non_json_body_is_summarized_not_echoed() {
        let summary = redact_body("super-secret-plaintext");
        assert!(!summary.contains("super-secret-plaintext"));
    }
}
