// Copyright 2024-2025 Aprio One AB, Sweden
// Author: Kenneth Pernyer, kenneth@aprio.one
// SPDX-License-Identifier: MIT
// See LICENSE file in the project root for full license information.

//! The error taxonomy shared by every layer of the engine.
//!
//! Ingestion and domain crates define their own local error enums for
//! sub-operation detail (e.g. an HTTP-status-specific variant) and convert
//! into [`Error`] at their public boundary, the same layering the HTTP
//! runtime's `RuntimeError` applies one level up.

use std::time::Duration;
use thiserror::Error;

/// The canonical error taxonomy from the error-handling design (spec §7).
#[derive(Debug, Error)]
pub enum Error {
    /// Network error, 5xx after retries exhausted, or a database deadlock.
    #[error("transient failure: {0}")]
    Transient(String),

    /// HTTP 429 after retries exhausted.
    #[error("rate limited{}", retry_after.map(|d| format!(", retry after {}s", d.as_secs())).unwrap_or_default())]
    RateLimited { retry_after: Option<Duration> },

    /// Bad or expired credentials at the source; the caller should check
    /// that the token cache invalidated the entry and `TenantCredentials`
    /// had its validity flag flipped.
    #[error("unauthorized")]
    Unauthorized,

    /// Non-retryable 4xx other than 429/401/403.
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed or semantically invalid data (e.g. a CSV row that cannot be
    /// normalized).
    #[error("bad data: {0}")]
    BadData(String),

    /// A recommendation state-machine transition violated its invariants.
    #[error("invalid state transition")]
    InvalidTransition,

    /// A duplicate sync or analysis was rejected for an in-flight
    /// (tenant, operation) fingerprint.
    #[error("operation already running for this tenant")]
    AlreadyRunning,

    /// Any invariant violation that should never happen in a correct
    /// program (e.g. a decrypted secret coming back empty). Always fatal
    /// for the operation; never swallowed silently.
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),
}

impl Error {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transient(_) | Error::RateLimited { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_without_hint_is_retryable() {
        let err = Error::RateLimited { retry_after: None };
        assert!(err.is_retryable());
    }

    #[test]
    fn not_found_is_not_retryable() {
        assert!(!Error::NotFound("tenant".into()).is_retryable());
    }
}
