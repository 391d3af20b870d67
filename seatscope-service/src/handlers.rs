// Copyright 2024-2025 Aprio One AB, Sweden
// Author: Kenneth Pernyer, kenneth@aprio.one
// SPDX-License-Identifier: MIT
// See LICENSE file in the project root for full license information.

//! HTTP request handlers for the license optimization service.
//!
//! End-user authentication/authorization is out of scope: every handler
//! trusts the `tenant_id` path segment as already scoped by whatever sits
//! in front of this service (spec §1 non-goals).

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use seatscope_core::repository::{
    CommerceRepository, RecommendationRepository, TenantRepository, UserRepository,
};
use seatscope_core::{Analysis, Recommendation, RecommendationId, TenantId};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::RuntimeError;
use crate::fingerprint::SyncOperation;
use crate::state::AppState;

/// Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses((status = 200, description = "Server is healthy", body = String))
)]
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness check: confirms the relational store is reachable.
#[utoipa::path(
    get,
    path = "/ready",
    tag = "health",
    responses(
        (status = 200, description = "Server is ready", body = serde_json::Value),
        (status = 503, description = "Server is not ready", body = RuntimeError)
    )
)]
pub async fn ready(State(state): State<AppState>) -> Result<Json<serde_json::Value>, RuntimeError> {
    state.db.tenants().list().await.map_err(RuntimeError::Domain)?;
    Ok(Json(serde_json::json!({ "status": "ready" })))
}

/// Syncs the directory user roster for a tenant (spec §6.1).
#[utoipa::path(
    post,
    path = "/api/v1/tenants/{tenant_id}/sync/users",
    tag = "sync",
    params(("tenant_id" = Uuid, Path, description = "Tenant id")),
    responses(
        (status = 200, description = "Sync completed", body = serde_json::Value),
        (status = 409, description = "Already running for this tenant", body = RuntimeError),
        (status = 429, description = "Rate limited", body = RuntimeError)
    )
)]
pub async fn sync_users(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, RuntimeError> {
    let tenant_id = TenantId(tenant_id);
    state.rate_limiter.check(tenant_id, SyncOperation::SyncUsers)?;
    let _guard = state.fingerprints.acquire(tenant_id, SyncOperation::SyncUsers)?;

    let stats = state
        .directory
        .sync_users(&state.db.tenants(), &state.db.users(), tenant_id)
        .await
        .map_err(RuntimeError::Domain)?;

    info!(%tenant_id, fetched = stats.fetched, "synced directory users");
    Ok(Json(serde_json::to_value(stats)?))
}

/// Syncs license assignments for a tenant (spec §6.1).
#[utoipa::path(
    post,
    path = "/api/v1/tenants/{tenant_id}/sync/licenses",
    tag = "sync",
    params(("tenant_id" = Uuid, Path, description = "Tenant id")),
    responses(
        (status = 200, description = "Sync completed", body = serde_json::Value),
        (status = 409, description = "Already running for this tenant", body = RuntimeError),
        (status = 429, description = "Rate limited", body = RuntimeError)
    )
)]
pub async fn sync_licenses(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, RuntimeError> {
    let tenant_id = TenantId(tenant_id);
    state.rate_limiter.check(tenant_id, SyncOperation::SyncLicenses)?;
    let _guard = state.fingerprints.acquire(tenant_id, SyncOperation::SyncLicenses)?;

    let stats = state
        .directory
        .sync_licenses(&state.db.tenants(), &state.db.users(), &state.db.licenses(), tenant_id)
        .await
        .map_err(RuntimeError::Domain)?;

    info!(%tenant_id, upserted = stats.assignments_upserted, "synced license assignments");
    Ok(Json(serde_json::to_value(stats)?))
}

/// Syncs usage metrics for a tenant (spec §6.1).
#[utoipa::path(
    post,
    path = "/api/v1/tenants/{tenant_id}/sync/usage",
    tag = "sync",
    params(("tenant_id" = Uuid, Path, description = "Tenant id")),
    responses(
        (status = 200, description = "Sync completed", body = serde_json::Value),
        (status = 409, description = "Already running for this tenant", body = RuntimeError),
        (status = 429, description = "Rate limited", body = RuntimeError)
    )
)]
pub async fn sync_usage(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, RuntimeError> {
    let tenant_id = TenantId(tenant_id);
    state.rate_limiter.check(tenant_id, SyncOperation::SyncUsage)?;
    let _guard = state.fingerprints.acquire(tenant_id, SyncOperation::SyncUsage)?;

    let stats = state
        .directory
        .sync_usage(&state.db.tenants(), &state.db.users(), &state.db.usage(), tenant_id, "D28")
        .await
        .map_err(RuntimeError::Domain)?;

    info!(%tenant_id, upserted = stats.rows_upserted, "synced usage metrics");
    Ok(Json(serde_json::to_value(stats)?))
}

/// Runs a full license-optimization analysis for a tenant (spec §4.9, §6.4).
#[utoipa::path(
    post,
    path = "/api/v1/tenants/{tenant_id}/analyses",
    tag = "analyses",
    params(("tenant_id" = Uuid, Path, description = "Tenant id")),
    responses(
        (status = 200, description = "Analysis completed", body = serde_json::Value),
        (status = 409, description = "Already running for this tenant", body = RuntimeError),
        (status = 429, description = "Rate limited", body = RuntimeError)
    )
)]
#[axum::debug_handler]
pub async fn run_analysis(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<Analysis>, RuntimeError> {
    let tenant_id = TenantId(tenant_id);
    state.rate_limiter.check(tenant_id, SyncOperation::RunAnalysis)?;
    let _guard = state.fingerprints.acquire(tenant_id, SyncOperation::RunAnalysis)?;

    info!(%tenant_id, "starting analysis");
    let analysis = crate::orchestrator::run_analysis(&state, tenant_id, CancellationToken::new())
        .await
        .map_err(RuntimeError::Domain)?;

    Ok(Json(analysis))
}

/// Lists every analysis run for a tenant, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/tenants/{tenant_id}/analyses",
    tag = "analyses",
    params(("tenant_id" = Uuid, Path, description = "Tenant id")),
    responses((status = 200, description = "Analyses listed", body = serde_json::Value))
)]
pub async fn list_analyses(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<Vec<Analysis>>, RuntimeError> {
    use seatscope_core::repository::AnalysisRepository;
    let tenant_id = TenantId(tenant_id);
    let analyses = state.db.analyses().list_for_tenant(tenant_id).await.map_err(RuntimeError::Domain)?;
    Ok(Json(analyses))
}

/// Fetches one analysis by id, together with a hint of whether it belongs
/// to `tenant_id` enforced at the repository layer.
#[utoipa::path(
    get,
    path = "/api/v1/tenants/{tenant_id}/analyses/{analysis_id}",
    tag = "analyses",
    params(
        ("tenant_id" = Uuid, Path, description = "Tenant id"),
        ("analysis_id" = Uuid, Path, description = "Analysis id"),
    ),
    responses(
        (status = 200, description = "Analysis found", body = serde_json::Value),
        (status = 404, description = "No such analysis", body = RuntimeError)
    )
)]
pub async fn get_analysis(
    State(state): State<AppState>,
    Path((tenant_id, analysis_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Analysis>, RuntimeError> {
    use seatscope_core::repository::AnalysisRepository;
    let tenant_id = TenantId(tenant_id);
    let analysis_id = seatscope_core::AnalysisId(analysis_id);
    let analysis = state.db.analyses().get(tenant_id, analysis_id).await.map_err(RuntimeError::Domain)?;
    Ok(Json(analysis))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RecommendationDecisionRequest {
    pub accept: bool,
}

/// Accepts or rejects a recommendation (spec §4.10).
#[utoipa::path(
    post,
    path = "/api/v1/recommendations/{recommendation_id}/decision",
    tag = "recommendations",
    params(("recommendation_id" = Uuid, Path, description = "Recommendation id")),
    request_body = RecommendationDecisionRequest,
    responses(
        (status = 200, description = "Decision applied", body = serde_json::Value),
        (status = 409, description = "Recommendation already decided", body = RuntimeError)
    )
)]
pub async fn apply_recommendation(
    State(state): State<AppState>,
    Path(recommendation_id): Path<Uuid>,
    Json(request): Json<RecommendationDecisionRequest>,
) -> Result<Json<Recommendation>, RuntimeError> {
    let recommendation = state
        .db
        .recommendations()
        .apply_decision(RecommendationId(recommendation_id), request.accept)
        .await
        .map_err(RuntimeError::Domain)?;
    Ok(Json(recommendation))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ValidateAddonRequest {
    pub base_sku: String,
    pub addon_sku: String,
    pub quantity: u32,
    pub date: NaiveDate,
    #[serde(default)]
    pub present_addons: Vec<String>,
}

/// Validates one add-on/base-SKU/quantity combination against the registry
/// (spec §4.6).
#[utoipa::path(
    post,
    path = "/api/v1/tenants/{tenant_id}/addons/validate",
    tag = "addons",
    params(("tenant_id" = Uuid, Path, description = "Tenant id")),
    request_body = ValidateAddonRequest,
    responses((status = 200, description = "Validation report", body = serde_json::Value))
)]
pub async fn validate_addon(
    State(state): State<AppState>,
    Path(_tenant_id): Path<Uuid>,
    Json(request): Json<ValidateAddonRequest>,
) -> Result<Json<serde_json::Value>, RuntimeError> {
    let snapshot = state.registry.snapshot();
    let report = snapshot.validate_addon(
        &request.base_sku,
        &request.addon_sku,
        request.quantity,
        request.date,
        &request.present_addons,
    );
    Ok(Json(serde_json::to_value(report)?))
}

/// Builds the HTTP router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/api/v1/tenants/{tenant_id}/sync/users", post(sync_users))
        .route("/api/v1/tenants/{tenant_id}/sync/licenses", post(sync_licenses))
        .route("/api/v1/tenants/{tenant_id}/sync/usage", post(sync_usage))
        .route("/api/v1/tenants/{tenant_id}/analyses", post(run_analysis).get(list_analyses))
        .route("/api/v1/tenants/{tenant_id}/analyses/{analysis_id}", get(get_analysis))
        .route("/api/v1/recommendations/{recommendation_id}/decision", post(apply_recommendation))
        .route("/api/v1/tenants/{tenant_id}/addons/validate", post(validate_addon))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, DatabaseConfig, ExternalConfig, HttpConfig, PricingConfig, VaultConfig};
    use seatscope_core::recommendation::{Action, ReasonCode, RecommendationStatus};
    use seatscope_core::repository::AnalysisRepository;
    use seatscope_core::{money::Money, Analysis};

    const TEST_VAULT_KEY: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=";

    async fn test_state() -> AppState {
        let config = Config {
            http: HttpConfig::default(),
            database: DatabaseConfig { url: "file::memory:".into(), auth_token: None },
            vault: VaultConfig { key_base64: TEST_VAULT_KEY.into(), key_version: 1 },
            pricing: PricingConfig::default(),
            external: ExternalConfig::default(),
        };
        AppState::new(config).await.expect("in-memory app state builds")
    }

    #[tokio::test]
    async fn validate_addon_reports_a_known_compatible_pair() {
        let state = test_state().await;
        let request = ValidateAddonRequest {
            base_sku: "ENTERPRISEPACK".into(),
            addon_sku: "EMS".into(),
            quantity: 10,
            date: chrono::Utc::now().date_naive(),
            present_addons: Vec::new(),
        };

        let Json(report) = validate_addon(State(state), Path(Uuid::nil()), Json(request)).await.unwrap();
        assert_eq!(report["compatible"], serde_json::json!(true));
    }

    #[tokio::test]
    async fn validate_addon_reports_none_for_an_unknown_pair_as_a_compatible_empty_object() {
        let state = test_state().await;
        let request = ValidateAddonRequest {
            base_sku: "ENTERPRISEPACK".into(),
            addon_sku: "NOT_A_REAL_ADDON".into(),
            quantity: 1,
            date: chrono::Utc::now().date_naive(),
            present_addons: Vec::new(),
        };

        let Json(report) = validate_addon(State(state), Path(Uuid::nil()), Json(request)).await.unwrap();
        assert_eq!(report, serde_json::Value::Null);
    }

    #[tokio::test]
    async fn apply_recommendation_accepts_then_rejects_a_second_decision() {
        let state = test_state().await;
        let tenant_id = TenantId::new();
        let analysis = Analysis::new(tenant_id);
        let now = chrono::Utc::now();
        let recommendation = Recommendation {
            id: RecommendationId::new(),
            analysis_id: analysis.id,
            user_id: seatscope_core::UserId::new(),
            current_sku: Some("ENTERPRISEPACK".into()),
            recommended_sku: None,
            savings_monthly: Money::from_major(23.0),
            action: Action::Remove,
            reason_code: ReasonCode::RemoveInactive,
            reason_text: ReasonCode::RemoveInactive.fallback_text().to_string(),
            status: RecommendationStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        state.db.analyses().persist_completed(&analysis, std::slice::from_ref(&recommendation)).await.unwrap();

        let Json(accepted) = apply_recommendation(
            State(state.clone()),
            Path(recommendation.id.0),
            Json(RecommendationDecisionRequest { accept: true }),
        )
        .await
        .unwrap();
        assert_eq!(accepted.status, RecommendationStatus::Accepted);

        let second = apply_recommendation(
            State(state),
            Path(recommendation.id.0),
            Json(RecommendationDecisionRequest { accept: false }),
        )
        .await;
        assert!(matches!(second, Err(RuntimeError::Domain(seatscope_core::error::Error::InvalidTransition))));
    }

    #[tokio::test]
    async fn a_second_analysis_request_within_the_rate_limit_window_is_rejected() {
        let state = test_state().await;
        let tenant_id = TenantId::new();
        let now = chrono::Utc::now();
        state
            .db
            .tenants()
            .upsert(&seatscope_core::Tenant {
                id: tenant_id,
                external_tenant_id: "ext".into(),
                display_name: "Acme".into(),
                country_code: "US".into(),
                default_language: "en".into(),
                onboarding_state: seatscope_core::OnboardingState::Active,
                consented_at: Some(now),
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();

        run_analysis(State(state.clone()), Path(tenant_id.0)).await.unwrap();
        let second = run_analysis(State(state), Path(tenant_id.0)).await;
        assert!(matches!(second, Err(RuntimeError::Domain(seatscope_core::error::Error::RateLimited { .. }))));
    }
}
