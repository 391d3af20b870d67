// Copyright 2024-2025 Aprio One AB, Sweden
// Author: Kenneth Pernyer, kenneth@aprio.one
// SPDX-License-Identifier: MIT
// See LICENSE file in the project root for full license information.

//! OpenAPI schema definitions for the license optimization service.

use utoipa::OpenApi;

use crate::error::RuntimeErrorResponse;
use crate::handlers::{RecommendationDecisionRequest, ValidateAddonRequest};

/// OpenAPI schema for the license optimization service API.
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health,
        crate::handlers::ready,
        crate::handlers::sync_users,
        crate::handlers::sync_licenses,
        crate::handlers::sync_usage,
        crate::handlers::run_analysis,
        crate::handlers::list_analyses,
        crate::handlers::get_analysis,
        crate::handlers::apply_recommendation,
        crate::handlers::validate_addon,
    ),
    components(schemas(
        RecommendationDecisionRequest,
        ValidateAddonRequest,
        RuntimeErrorResponse,
    )),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sync", description = "Directory and commerce sync endpoints"),
        (name = "analyses", description = "License optimization analysis endpoints"),
        (name = "recommendations", description = "Recommendation decision endpoints"),
        (name = "addons", description = "Add-on compatibility validation endpoints"),
    ),
    info(
        title = "Seatscope API",
        description = "HTTP API for the multi-tenant M365 license optimization service",
        version = "0.1.0",
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server"),
    ),
)]
pub struct ApiDoc;
