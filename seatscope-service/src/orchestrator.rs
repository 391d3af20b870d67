// Copyright 2024-2025 Aprio One AB, Sweden
// Author: Kenneth Pernyer, kenneth@aprio.one
// SPDX-License-Identifier: MIT
// See LICENSE file in the project root for full license information.

//! Analysis Orchestrator (spec §4.9): snapshots a tenant's users, licenses,
//! and usage into memory, scores and recommends per user, then persists the
//! completed analysis and its recommendations in one transaction.

use crate::state::AppState;
use chrono::Utc;
use seatscope_core::error::{Error, Result};
use seatscope_core::recommendation::{Action, Recommendation};
use seatscope_core::repository::{
    AnalysisRepository, CommerceRepository, LicenseRepository, SkuRegistryRepository, TenantRepository, UsageRepository,
    UserRepository,
};
use seatscope_core::{Analysis, AnalysisSummary, TenantId};
use seatscope_engine::{recommend, EngineConfig, FallbackWarnings, PriceTable, UserContext};
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

/// Runs a full analysis for `tenant_id`, persisting the result before
/// returning. Cancellation is checked between per-user iterations and
/// before the final commit so a shutdown never leaves a half-scored
/// analysis observable (spec §4.9, §8).
#[instrument(skip(state, cancellation))]
pub async fn run_analysis(state: &AppState, tenant_id: TenantId, cancellation: CancellationToken) -> Result<Analysis> {
    let tenant = state.db.tenants().get(tenant_id).await?;

    let mut analysis = Analysis::new(tenant_id);
    state.db.analyses().upsert(&analysis).await?;

    match run_analysis_inner(state, tenant_id, &tenant.country_code, analysis.id, &cancellation).await {
        Ok((summary, recommendations)) => {
            analysis.complete(summary);
            state.db.analyses().persist_completed(&analysis, &recommendations).await?;
            info!(analysis_id = %analysis.id, %tenant_id, "analysis completed");
            Ok(analysis)
        }
        Err(err) => {
            analysis.fail(err.to_string());
            state.db.analyses().persist_completed(&analysis, &[]).await?;
            Err(err)
        }
    }
}

async fn run_analysis_inner(
    state: &AppState,
    tenant_id: TenantId,
    tenant_country_code: &str,
    analysis_id: seatscope_core::AnalysisId,
    cancellation: &CancellationToken,
) -> Result<(AnalysisSummary, Vec<Recommendation>)> {
    let users = state.db.users().list_by_tenant(tenant_id).await?;
    let licenses = state.db.licenses().list_for_tenant(tenant_id).await?;
    let usage_by_user = state.db.usage().list_latest_for_tenant(tenant_id).await?;

    let mut license_by_user: HashMap<_, String> = HashMap::new();
    for assignment in &licenses {
        if assignment.status == seatscope_core::AssignmentStatus::Active {
            license_by_user.entry(assignment.user_id).or_insert_with(|| assignment.sku_id.clone());
        }
    }

    let registry_rows = state.db.sku_registry().list_matrix().await?;
    let snapshot = state.registry.snapshot();
    // Keep the persisted mirror from drifting silently out of sync with the
    // in-memory registry this run actually scores against.
    if registry_rows.len() != snapshot.all().count() {
        tracing::warn!(
            persisted = registry_rows.len(),
            in_memory = snapshot.all().count(),
            "sku registry mirror disagrees with in-memory snapshot"
        );
    }

    let engine_config = EngineConfig {
        fallback_monthly_price: seatscope_core::money::Money::from_major(state.config.pricing.fallback_monthly_price),
        market_by_country: state.config.pricing.market_by_country.clone(),
        default_market: state.config.pricing.default_market.clone(),
    };

    let analysis_date = Utc::now().date_naive();
    let market = engine_config.market_for_country(tenant_country_code);
    let mut prices_by_sku = Vec::new();
    for matrix in snapshot.all() {
        if let Some(price) =
            state.db.commerce().find_price(&matrix.commerce_product_id, &matrix.commerce_sku_id, market, analysis_date).await?
        {
            prices_by_sku.push(price);
        }
    }
    let prices = PriceTable::from_prices(prices_by_sku);

    let mut warnings = FallbackWarnings::new();
    let mut summary = AnalysisSummary::empty();
    let mut recommendations = Vec::new();

    for user in &users {
        if cancellation.is_cancelled() {
            return Err(Error::Transient("analysis cancelled".into()));
        }

        let metrics = usage_by_user.get(&user.id);
        let scores = seatscope_engine::scorer::score(metrics);
        let current_sku_id = license_by_user.get(&user.id).map(String::as_str);

        let ctx = UserContext {
            user_id: user.id,
            account_enabled: user.account_enabled,
            current_sku_id,
            scores: &scores,
            tenant_country_code,
        };

        let outcome = recommend(&snapshot, &prices, &engine_config, analysis_id, analysis_date, &ctx, &mut warnings);

        summary.total_users_analyzed += 1;
        *summary.breakdown_by_action.entry(action_key(outcome.action).to_string()).or_insert(0) += 1;

        if let Some(current_sku) = current_sku_id.and_then(|sku| snapshot.get(sku)) {
            let price = prices
                .monthly_price(&current_sku.commerce_product_id, &current_sku.commerce_sku_id, market, analysis_date)
                .unwrap_or(engine_config.fallback_monthly_price);
            summary.total_current_monthly_cost = summary.total_current_monthly_cost + price;
        }

        if let Some(recommendation) = outcome.recommendation {
            summary.recommendation_count += 1;
            summary.potential_savings_monthly = summary.potential_savings_monthly + recommendation.savings_monthly;
            recommendations.push(recommendation);
        }
    }

    if cancellation.is_cancelled() {
        return Err(Error::Transient("analysis cancelled".into()));
    }

    summary.total_optimized_monthly_cost = summary.total_current_monthly_cost - summary.potential_savings_monthly;
    summary.potential_savings_annual = summary.potential_savings_monthly.annualized();

    Ok((summary, recommendations))
}

fn action_key(action: Action) -> &'static str {
    match action {
        Action::Remove => "remove",
        Action::Downgrade => "downgrade",
        Action::Upgrade => "upgrade",
        Action::NoChange => "no_change",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, DatabaseConfig, ExternalConfig, HttpConfig, PricingConfig, VaultConfig};
    use seatscope_core::money::Money;
    use seatscope_core::repository::RecommendationRepository;
    use seatscope_core::{
        AnalysisStatus, AssignmentSource, AssignmentStatus, BillingPlan, CommercePrice, LicenseAssignment,
        OnboardingState, Segment, Tenant, User, UserId,
    };
    use std::collections::HashMap as StdHashMap;

    // 32 zero bytes, base64-encoded. Never used to encrypt anything real;
    // these tests never touch the vault beyond `AppState::new` requiring it.
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

    async fn seed_tenant(state: &AppState, country_code: &str) -> TenantId {
        let tenant_id = TenantId::new();
        let now = Utc::now();
        state
            .db
            .tenants()
            .upsert(&Tenant {
                id: tenant_id,
                external_tenant_id: "ext-tenant".into(),
                display_name: "Acme".into(),
                country_code: country_code.into(),
                default_language: "en".into(),
                onboarding_state: OnboardingState::Active,
                consented_at: Some(now),
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        tenant_id
    }

    #[tokio::test]
    async fn inactive_user_is_recommended_for_removal() {
        let state = test_state().await;
        let tenant_id = seed_tenant(&state, "US").await;
        let now = Utc::now();

        let user = User {
            id: UserId::new(),
            tenant_id,
            external_user_id: "u1".into(),
            principal_name: "u1@acme.example".into(),
            display_name: "User One".into(),
            account_enabled: true,
            department: None,
            job_title: None,
            preferred_language: None,
            created_at: now,
            updated_at: now,
        };
        state.db.users().replace_tenant_users(tenant_id, &[user.clone()]).await.unwrap();

        let assignment = LicenseAssignment {
            user_id: user.id,
            tenant_id,
            sku_id: "ENTERPRISEPACK".into(),
            assigned_at: now,
            status: AssignmentStatus::Active,
            source: AssignmentSource::Auto,
        };
        state
            .db
            .licenses()
            .replace_user_licenses(tenant_id, &StdHashMap::from([(user.id, vec![assignment])]))
            .await
            .unwrap();

        state
            .db
            .commerce()
            .upsert_prices(&[CommercePrice {
                product_id: "CFQ7TTC0LFK6".into(),
                sku_id: "0001".into(),
                market: "US".into(),
                currency: "USD".into(),
                segment: Segment::Commercial,
                billing_plan: BillingPlan::Monthly,
                unit_price: Money::from_major(23.0),
                tier_min_quantity: None,
                tier_max_quantity: None,
                effective_start_date: now.date_naive(),
                effective_end_date: None,
            }])
            .await
            .unwrap();

        // No usage row at all, so the scorer treats every service as unused
        // and the engine classifies the user as inactive.
        let analysis = run_analysis(&state, tenant_id, CancellationToken::new()).await.unwrap();

        assert_eq!(analysis.status, AnalysisStatus::Completed);
        let summary = analysis.summary.unwrap();
        assert_eq!(summary.total_users_analyzed, 1);
        assert_eq!(summary.recommendation_count, 1);
        assert_eq!(summary.breakdown_by_action.get("remove").copied(), Some(1));
        assert_eq!(summary.potential_savings_monthly, Money::from_major(23.0));

        let recommendations = state.db.recommendations().list_for_analysis(analysis.id).await.unwrap();
        assert_eq!(recommendations.len(), 1);
        assert_eq!(recommendations[0].action, Action::Remove);
        assert_eq!(recommendations[0].status, seatscope_core::recommendation::RecommendationStatus::Pending);
    }

    #[tokio::test]
    async fn tenant_with_no_users_completes_with_an_empty_summary() {
        let state = test_state().await;
        let tenant_id = seed_tenant(&state, "SE").await;

        let analysis = run_analysis(&state, tenant_id, CancellationToken::new()).await.unwrap();

        assert_eq!(analysis.status, AnalysisStatus::Completed);
        let summary = analysis.summary.unwrap();
        assert_eq!(summary.total_users_analyzed, 0);
        assert_eq!(summary.recommendation_count, 0);
        assert_eq!(summary.potential_savings_monthly, Money::ZERO);
    }

    #[tokio::test]
    async fn cancellation_before_the_run_fails_the_analysis_without_panicking() {
        let state = test_state().await;
        let tenant_id = seed_tenant(&state, "US").await;
        let now = Utc::now();
        let user = User {
            id: UserId::new(),
            tenant_id,
            external_user_id: "u1".into(),
            principal_name: "u1@acme.example".into(),
            display_name: "User One".into(),
            account_enabled: true,
            department: None,
            job_title: None,
            preferred_language: None,
            created_at: now,
            updated_at: now,
        };
        state.db.users().replace_tenant_users(tenant_id, &[user]).await.unwrap();

        let cancellation = CancellationToken::new();
        cancellation.cancel();

        let err = run_analysis(&state, tenant_id, cancellation).await.unwrap_err();
        assert!(matches!(err, Error::Transient(_)));

        let analyses = state.db.analyses().list_for_tenant(tenant_id).await.unwrap();
        assert_eq!(analyses.len(), 1);
        assert_eq!(analyses[0].status, AnalysisStatus::Failed);
    }
}
