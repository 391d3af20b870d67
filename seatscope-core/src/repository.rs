// Copyright 2024-2025 Aprio One AB, Sweden
// Author: Kenneth Pernyer, kenneth@aprio.one
// SPDX-License-Identifier: MIT
// See LICENSE file in the project root for full license information.

//! Repository ports: the Data Store Adapter contracts (spec §6.3).
//!
//! Each sync or analysis operation owns exactly one repository call that
//! performs all of its writes; the concrete adapter (`seatscope-service`,
//! backed by libsql) is responsible for making that call atomic. Callers
//! outside this crate depend only on these traits, never on a storage
//! engine directly.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::analysis::Analysis;
use crate::commerce::{CommercePrice, CommerceProduct};
use crate::error::Result;
use crate::ids::{AnalysisId, TenantId, UserId};
use crate::license::LicenseAssignment;
use crate::recommendation::Recommendation;
use crate::stats::{LicenseSyncStats, PriceSyncStats, ProductSyncStats, UsageSyncStats, UserSyncStats};
use crate::tenant::{Tenant, TenantCredentials};
use crate::usage::UsageMetrics;
use crate::user::User;

#[async_trait]
pub trait TenantRepository: Send + Sync {
    async fn get(&self, id: TenantId) -> Result<Tenant>;
    async fn find_by_external_id(&self, external_tenant_id: &str) -> Result<Option<Tenant>>;
    async fn list(&self) -> Result<Vec<Tenant>>;
    async fn upsert(&self, tenant: &Tenant) -> Result<()>;
    async fn get_credentials(&self, tenant_id: TenantId) -> Result<TenantCredentials>;
    async fn put_credentials(&self, credentials: &TenantCredentials) -> Result<()>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn list_by_tenant(&self, tenant_id: TenantId) -> Result<Vec<User>>;
    async fn get(&self, tenant_id: TenantId, user_id: UserId) -> Result<User>;

    /// Replaces the full roster for a tenant: every fetched user is
    /// upserted, and the account-enabled flag and display fields are
    /// refreshed. No rows are deleted by this call (spec §4.2: users are
    /// soft-tracked via `account_enabled`, never removed by sync).
    async fn replace_tenant_users(&self, tenant_id: TenantId, users: &[User]) -> Result<UserSyncStats>;
}

#[async_trait]
pub trait LicenseRepository: Send + Sync {
    async fn list_for_user(&self, tenant_id: TenantId, user_id: UserId) -> Result<Vec<LicenseAssignment>>;
    async fn list_for_tenant(&self, tenant_id: TenantId) -> Result<Vec<LicenseAssignment>>;

    /// Replaces license assignments scoped to exactly the users present in
    /// `by_user`: rows for those users not present in the new set are
    /// hard-deleted, all others are upserted. Scoped rather than
    /// tenant-wide so a partial sync cannot wipe out the whole tenant
    /// (open question resolved in DESIGN.md).
    async fn replace_user_licenses(
        &self,
        tenant_id: TenantId,
        by_user: &HashMap<UserId, Vec<LicenseAssignment>>,
    ) -> Result<LicenseSyncStats>;
}

#[async_trait]
pub trait UsageRepository: Send + Sync {
    async fn get_latest(&self, tenant_id: TenantId, user_id: UserId) -> Result<Option<UsageMetrics>>;
    async fn list_latest_for_tenant(&self, tenant_id: TenantId) -> Result<HashMap<UserId, UsageMetrics>>;
    async fn upsert_reports(&self, tenant_id: TenantId, by_user: &HashMap<UserId, UsageMetrics>) -> Result<UsageSyncStats>;
}

#[async_trait]
pub trait CommerceRepository: Send + Sync {
    async fn upsert_products(&self, products: &[CommerceProduct]) -> Result<ProductSyncStats>;
    async fn upsert_prices(&self, prices: &[CommercePrice]) -> Result<PriceSyncStats>;
    async fn find_price(
        &self,
        product_id: &str,
        sku_id: &str,
        market: &str,
        date: chrono::NaiveDate,
    ) -> Result<Option<CommercePrice>>;
}

#[async_trait]
pub trait SkuRegistryRepository: Send + Sync {
    async fn matrix_for_directory_sku(&self, directory_sku_id: &str) -> Result<Option<crate::sku::SkuServiceMatrix>>;
    async fn list_matrix(&self) -> Result<Vec<crate::sku::SkuServiceMatrix>>;
    async fn list_addon_compatibility(&self, base_sku: &str) -> Result<Vec<crate::sku::AddonCompatibility>>;
}

#[async_trait]
pub trait AnalysisRepository: Send + Sync {
    async fn get(&self, tenant_id: TenantId, analysis_id: AnalysisId) -> Result<Analysis>;
    async fn list_for_tenant(&self, tenant_id: TenantId) -> Result<Vec<Analysis>>;

    /// Persists a completed (or failed) analysis together with its
    /// recommendations in one transaction (spec §4.9, §8 invariant
    /// "an analysis and its recommendations are never observed partially
    /// written").
    async fn persist_completed(&self, analysis: &Analysis, recommendations: &[Recommendation]) -> Result<()>;
}

#[async_trait]
pub trait RecommendationRepository: Send + Sync {
    async fn list_for_analysis(&self, analysis_id: AnalysisId) -> Result<Vec<Recommendation>>;
    async fn get(&self, id: crate::ids::RecommendationId) -> Result<Recommendation>;
    async fn apply_decision(&self, id: crate::ids::RecommendationId, accept: bool) -> Result<Recommendation>;
}
