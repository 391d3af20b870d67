// Copyright 2024-2025 Aprio One AB, Sweden
// Author: Kenneth Pernyer, kenneth@aprio.one
// SPDX-License-Identifier: MIT
// See LICENSE file in the project root for full license information.

//! Error types for the license optimization service's HTTP surface.

use seatscope_core::error::Error as DomainError;
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Runtime-level errors: the domain error taxonomy (spec §7) plus the
/// transport-only failures that only make sense at the HTTP boundary.
#[derive(Debug, Error, ToSchema)]
#[schema(as = RuntimeErrorResponse)]
pub enum RuntimeError {
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] axum::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RuntimeErrorResponse {
    pub error: String,
    pub status: u16,
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;

impl axum::response::IntoResponse for RuntimeError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            RuntimeError::Domain(e) => (domain_status(e), e.to_string()),
            RuntimeError::Serialization(e) => (axum::http::StatusCode::BAD_REQUEST, format!("invalid JSON: {e}")),
            RuntimeError::Http(e) => (axum::http::StatusCode::INTERNAL_SERVER_ERROR, format!("HTTP error: {e}")),
            RuntimeError::Io(e) => (axum::http::StatusCode::INTERNAL_SERVER_ERROR, format!("I/O error: {e}")),
            RuntimeError::Config(msg) => {
                (axum::http::StatusCode::INTERNAL_SERVER_ERROR, format!("configuration error: {msg}"))
            }
        };

        let body = RuntimeErrorResponse { error: message, status: status.as_u16() };
        (status, axum::Json(body)).into_response()
    }
}

/// Maps the domain error taxonomy onto HTTP status codes (spec §7).
fn domain_status(error: &DomainError) -> axum::http::StatusCode {
    use axum::http::StatusCode;
    match error {
        DomainError::Transient(_) => StatusCode::BAD_GATEWAY,
        DomainError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        DomainError::Unauthorized => StatusCode::UNAUTHORIZED,
        DomainError::BadRequest(_) => StatusCode::BAD_REQUEST,
        DomainError::NotFound(_) => StatusCode::NOT_FOUND,
        DomainError::BadData(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DomainError::InvalidTransition => StatusCode::CONFLICT,
        DomainError::AlreadyRunning => StatusCode::CONFLICT,
        DomainError::InternalInvariant(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
