// Copyright 2024-2025 Aprio One AB, Sweden
// Author: Kenneth Pernyer, kenneth@aprio.one
// SPDX-License-Identifier: MIT
// See LICENSE file in the project root for full license information.

//! Recommendation Engine: per-user SKU matching, savings computation, and
//! reason-code selection (spec §4.8).

use crate::registry::SkuRegistrySnapshot;
use crate::scorer::{self, ServiceScores};
use chrono::{NaiveDate, Utc};
use seatscope_core::money::Money;
use seatscope_core::recommendation::{Action, ReasonCode, Recommendation};
use seatscope_core::sku::SkuServiceMatrix;
use seatscope_core::usage::Service;
use seatscope_core::{AnalysisId, CommercePrice, RecommendationId, UserId};
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// A materialized view of commerce prices for one analysis run, indexed so
/// monthly-unit-price lookups are O(1) amortized rather than re-scanning
/// every price row per user (spec §4.8 step 3, §4.9 "snapshot the required
/// tables into memory").
pub struct PriceTable {
    by_product_sku: HashMap<(String, String), Vec<CommercePrice>>,
}

impl PriceTable {
    #[must_use]
    pub fn from_prices(prices: Vec<CommercePrice>) -> Self {
        let mut by_product_sku: HashMap<(String, String), Vec<CommercePrice>> = HashMap::new();
        for price in prices {
            by_product_sku.entry((price.product_id.clone(), price.sku_id.clone())).or_default().push(price);
        }
        Self { by_product_sku }
    }

    /// Finds the monthly unit price for `(product_id, sku_id)` in `market`,
    /// commercial segment, effective on `date`. Billing-plan-agnostic: an
    /// annual row is normalized to its monthly equivalent.
    #[must_use]
    pub fn monthly_price(&self, product_id: &str, sku_id: &str, market: &str, date: NaiveDate) -> Option<Money> {
        self.by_product_sku
            .get(&(product_id.to_string(), sku_id.to_string()))?
            .iter()
            .find(|p| {
                p.market == market
                    && p.segment == seatscope_core::Segment::Commercial
                    && p.covers_date(date)
            })
            .map(CommercePrice::monthly_unit_price)
    }
}

/// Static configuration the engine needs but does not own: the pricing
/// fallback and the country→market mapping (spec §9 open questions 1, 2).
pub struct EngineConfig {
    /// Used when no matching price row exists for a SKU, so an analysis
    /// never aborts on a pricing gap (spec §4.8 "pricing lookup fallback").
    pub fallback_monthly_price: Money,
    pub market_by_country: HashMap<String, String>,
    pub default_market: String,
}

impl EngineConfig {
    #[must_use]
    pub fn market_for_country(&self, country_code: &str) -> &str {
        self.market_by_country.get(country_code).map_or(self.default_market.as_str(), String::as_str)
    }
}

/// Per-user input to [`recommend`].
pub struct UserContext<'a> {
    pub user_id: UserId,
    pub account_enabled: bool,
    pub current_sku_id: Option<&'a str>,
    pub scores: &'a ServiceScores,
    pub tenant_country_code: &'a str,
}

/// The outcome of scoring one user. `recommendation` is `Some` only when a
/// real change is proposed; `action` always reflects the classification so
/// callers can tally `summary.breakdown_by_action` even for no-change users
/// without persisting a no-op `Recommendation` row (spec §8 invariant 3:
/// "the engine never produces no-op recommendations").
pub struct RecommendOutcome {
    pub action: Action,
    pub recommendation: Option<Recommendation>,
}

/// Tracks which (sku) pricing fallbacks have already been warned about in
/// this analysis run, so the "log once per SKU per analysis" rule in spec
/// §4.8 doesn't flood the log for a large tenant.
#[derive(Default)]
pub struct FallbackWarnings(HashSet<String>);

impl FallbackWarnings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn warn_once(&mut self, sku_id: &str) {
        if self.0.insert(sku_id.to_string()) {
            warn!(sku_id, "no matching commerce price; using configured fallback");
        }
    }
}

fn price_or_fallback(
    prices: &PriceTable,
    config: &EngineConfig,
    matrix: &SkuServiceMatrix,
    market: &str,
    date: NaiveDate,
    warnings: &mut FallbackWarnings,
) -> Money {
    prices
        .monthly_price(&matrix.commerce_product_id, &matrix.commerce_sku_id, market, date)
        .unwrap_or_else(|| {
            warnings.warn_once(&matrix.directory_sku_id);
            config.fallback_monthly_price
        })
}

const ADVANCED_SERVICES: [Service; 4] =
    [Service::AdvancedSecurity, Service::AdvancedCompliance, Service::AudioConferencing, Service::PhoneSystem];

fn select_downgrade_reason(current: &SkuServiceMatrix, recommended: &SkuServiceMatrix) -> ReasonCode {
    if recommended.family == seatscope_core::sku::SkuFamily::Frontline {
        return ReasonCode::DowngradeToFrontline;
    }
    let dropped_advanced = ADVANCED_SERVICES
        .iter()
        .any(|svc| current.included_services.contains(svc) && !recommended.included_services.contains(svc));
    if dropped_advanced {
        return ReasonCode::DowngradeE5ToE3;
    }
    if current.included_services.contains(&Service::OfficeDesktop)
        && !recommended.included_services.contains(&Service::OfficeDesktop)
    {
        return ReasonCode::DowngradeE3ToE1;
    }
    ReasonCode::NoChange
}

/// Scores and prices one user, returning the engine's recommendation (or
/// lack of one) per spec §4.8.
#[must_use]
pub fn recommend(
    registry: &SkuRegistrySnapshot,
    prices: &PriceTable,
    config: &EngineConfig,
    analysis_id: AnalysisId,
    analysis_date: NaiveDate,
    ctx: &UserContext<'_>,
    warnings: &mut FallbackWarnings,
) -> RecommendOutcome {
    let no_change = || RecommendOutcome { action: Action::NoChange, recommendation: None };

    let Some(current_sku_id) = ctx.current_sku_id else {
        return no_change();
    };
    let Some(current_matrix) = registry.get(current_sku_id) else {
        return no_change();
    };

    let market = config.market_for_country(ctx.tenant_country_code);
    let current_price = price_or_fallback(prices, config, current_matrix, market, analysis_date, warnings);
    let inactive = scorer::is_inactive(ctx.account_enabled, ctx.scores);

    if inactive {
        let reason_code =
            if ctx.account_enabled { ReasonCode::RemoveInactive } else { ReasonCode::RemoveAccountDisabled };
        let now = Utc::now();
        let recommendation = Recommendation {
            id: RecommendationId::new(),
            analysis_id,
            user_id: ctx.user_id,
            current_sku: Some(current_sku_id.to_string()),
            recommended_sku: None,
            savings_monthly: current_price,
            action: Action::Remove,
            reason_code,
            reason_text: reason_code.fallback_text().to_string(),
            status: seatscope_core::recommendation::RecommendationStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        return RecommendOutcome { action: Action::Remove, recommendation: Some(recommendation) };
    }

    let required = scorer::required_services(ctx.scores);

    let mut candidates: Vec<&SkuServiceMatrix> =
        registry.all().filter(|sku| !sku.is_addon && sku.covers(&required)).collect();
    candidates.sort_by(|a, b| a.directory_sku_id.cmp(&b.directory_sku_id));

    let Some(cheapest) = candidates
        .into_iter()
        .map(|sku| (sku, price_or_fallback(prices, config, sku, market, analysis_date, warnings)))
        .min_by(|(sku_a, price_a), (sku_b, price_b)| {
            price_a.cmp(price_b).then_with(|| sku_a.directory_sku_id.cmp(&sku_b.directory_sku_id))
        })
    else {
        return no_change();
    };
    let (recommended_matrix, recommended_price) = cheapest;

    if recommended_matrix.directory_sku_id == current_matrix.directory_sku_id {
        return no_change();
    }

    let current_covers_required = current_matrix.covers(&required);

    let (action, reason_code) = if recommended_price < current_price {
        (Action::Downgrade, select_downgrade_reason(current_matrix, recommended_matrix))
    } else if recommended_price > current_price && !current_covers_required {
        (Action::Upgrade, ReasonCode::NoChange)
    } else {
        return no_change();
    };

    let now = Utc::now();
    let recommendation = Recommendation {
        id: RecommendationId::new(),
        analysis_id,
        user_id: ctx.user_id,
        current_sku: Some(current_sku_id.to_string()),
        recommended_sku: Some(recommended_matrix.directory_sku_id.clone()),
        savings_monthly: current_price - recommended_price,
        action,
        reason_code,
        reason_text: reason_code.fallback_text().to_string(),
        status: seatscope_core::recommendation::RecommendationStatus::Pending,
        created_at: now,
        updated_at: now,
    };
    RecommendOutcome { action, recommendation: Some(recommendation) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SkuRegistry;
    use std::collections::BTreeMap;

    fn config() -> EngineConfig {
        EngineConfig {
            fallback_monthly_price: Money::from_major(10.0),
            market_by_country: HashMap::from([("US".to_string(), "US".to_string())]),
            default_market: "US".to_string(),
        }
    }

    fn price(product: &str, sku: &str, amount: f64) -> CommercePrice {
        CommercePrice {
            product_id: product.to_string(),
            sku_id: sku.to_string(),
            market: "US".to_string(),
            currency: "USD".to_string(),
            segment: seatscope_core::Segment::Commercial,
            billing_plan: seatscope_core::BillingPlan::Monthly,
            unit_price: Money::from_major(amount),
            tier_min_quantity: None,
            tier_max_quantity: None,
            effective_start_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            effective_end_date: None,
        }
    }

    fn prices() -> PriceTable {
        PriceTable::from_prices(vec![
            price("CFQ7TTC0LFK7", "0001", 35.0),
            price("CFQ7TTC0LFK6", "0001", 23.0),
            price("CFQ7TTC0LFK5", "0001", 8.0),
        ])
    }

    #[test]
    fn inactive_account_disabled_user_is_recommended_for_removal() {
        let registry = SkuRegistry::seeded();
        let snapshot = registry.snapshot();
        let prices = prices();
        let cfg = config();
        let mut warnings = FallbackWarnings::new();
        let scores = BTreeMap::new();

        let ctx = UserContext {
            user_id: UserId::new(),
            account_enabled: false,
            current_sku_id: Some("ENTERPRISEPACK"),
            scores: &scores,
            tenant_country_code: "US",
        };

        let outcome = recommend(&snapshot, &prices, &cfg, AnalysisId::new(), Utc::now().date_naive(), &ctx, &mut warnings);
        assert_eq!(outcome.action, Action::Remove);
        let r = outcome.recommendation.unwrap();
        assert_eq!(r.reason_code, ReasonCode::RemoveAccountDisabled);
        assert_eq!(r.savings_monthly, Money::from_major(23.0));
        assert!(r.recommended_sku.is_none());
    }

    #[test]
    fn low_usage_e5_user_downgrades_to_cheaper_covering_sku() {
        let registry = SkuRegistry::seeded();
        let snapshot = registry.snapshot();
        let prices = prices();
        let cfg = config();
        let mut warnings = FallbackWarnings::new();
        let scores = BTreeMap::from([
            (Service::Exchange, 0.2),
            (Service::Teams, 0.15),
            (Service::OneDrive, 0.0),
            (Service::SharePoint, 0.0),
            (Service::OfficeDesktop, 0.0),
        ]);

        let ctx = UserContext {
            user_id: UserId::new(),
            account_enabled: true,
            current_sku_id: Some("ENTERPRISEPACK"),
            scores: &scores,
            tenant_country_code: "US",
        };

        let outcome = recommend(&snapshot, &prices, &cfg, AnalysisId::new(), Utc::now().date_naive(), &ctx, &mut warnings);
        assert_eq!(outcome.action, Action::Downgrade);
        let r = outcome.recommendation.unwrap();
        assert_eq!(r.recommended_sku.as_deref(), Some("STANDARDPACK"));
        assert_eq!(r.savings_monthly, Money::from_major(15.0));
    }

    #[test]
    fn no_current_license_yields_no_recommendation() {
        let registry = SkuRegistry::seeded();
        let snapshot = registry.snapshot();
        let prices = prices();
        let cfg = config();
        let mut warnings = FallbackWarnings::new();
        let scores = BTreeMap::new();

        let ctx = UserContext {
            user_id: UserId::new(),
            account_enabled: true,
            current_sku_id: None,
            scores: &scores,
            tenant_country_code: "US",
        };

        let outcome = recommend(&snapshot, &prices, &cfg, AnalysisId::new(), Utc::now().date_naive(), &ctx, &mut warnings);
        assert_eq!(outcome.action, Action::NoChange);
        assert!(outcome.recommendation.is_none());
    }

    #[test]
    fn cheapest_covering_sku_already_current_yields_no_change() {
        let registry = SkuRegistry::seeded();
        let snapshot = registry.snapshot();
        let prices = prices();
        let cfg = config();
        let mut warnings = FallbackWarnings::new();
        let scores = BTreeMap::from([(Service::Exchange, 0.5)]);

        let ctx = UserContext {
            user_id: UserId::new(),
            account_enabled: true,
            current_sku_id: Some("STANDARDPACK"),
            scores: &scores,
            tenant_country_code: "US",
        };

        let outcome = recommend(&snapshot, &prices, &cfg, AnalysisId::new(), Utc::now().date_naive(), &ctx, &mut warnings);
        assert_eq!(outcome.action, Action::NoChange);
        assert!(outcome.recommendation.is_none());
    }

    #[test]
    fn missing_price_row_falls_back_to_configured_default() {
        let registry = SkuRegistry::seeded();
        let snapshot = registry.snapshot();
        let prices = PriceTable::from_prices(vec![]);
        let cfg = config();
        let mut warnings = FallbackWarnings::new();
        let scores = BTreeMap::new();

        let ctx = UserContext {
            user_id: UserId::new(),
            account_enabled: false,
            current_sku_id: Some("ENTERPRISEPACK"),
            scores: &scores,
            tenant_country_code: "US",
        };

        let outcome = recommend(&snapshot, &prices, &cfg, AnalysisId::new(), Utc::now().date_naive(), &ctx, &mut warnings);
        let r = outcome.recommendation.unwrap();
        assert_eq!(r.savings_monthly, Money::from_major(10.0));
    }
}
