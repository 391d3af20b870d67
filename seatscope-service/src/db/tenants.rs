// Copyright 2024-2025 Aprio One AB, Sweden
// Author: Kenneth Pernyer, kenneth@aprio.one
// SPDX-License-Identifier: MIT
// See LICENSE file in the project root for full license information.

use super::{store_error, Database};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::params;
use seatscope_core::error::{Error, Result};
use seatscope_core::repository::TenantRepository;
use seatscope_core::{OnboardingState, Tenant, TenantCredentials, TenantId};

fn onboarding_state_to_str(state: OnboardingState) -> &'static str {
    match state {
        OnboardingState::Pending => "pending",
        OnboardingState::Configured => "configured",
        OnboardingState::Active => "active",
        OnboardingState::Error => "error",
    }
}

fn onboarding_state_from_str(raw: &str) -> Result<OnboardingState> {
    match raw {
        "pending" => Ok(OnboardingState::Pending),
        "configured" => Ok(OnboardingState::Configured),
        "active" => Ok(OnboardingState::Active),
        "error" => Ok(OnboardingState::Error),
        other => Err(Error::InternalInvariant(format!("unknown onboarding_state {other}"))),
    }
}

fn row_to_tenant(row: &libsql::Row) -> Result<Tenant> {
    let id: String = row.get(0).map_err(store_error)?;
    let consented_at: Option<String> = row.get(6).map_err(store_error)?;
    Ok(Tenant {
        id: TenantId::from(uuid::Uuid::parse_str(&id).map_err(|e| Error::InternalInvariant(e.to_string()))?),
        external_tenant_id: row.get(1).map_err(store_error)?,
        display_name: row.get(2).map_err(store_error)?,
        country_code: row.get(3).map_err(store_error)?,
        default_language: row.get(4).map_err(store_error)?,
        onboarding_state: onboarding_state_from_str(&row.get::<String>(5).map_err(store_error)?)?,
        consented_at: consented_at.map(|s| s.parse::<DateTime<Utc>>()).transpose().map_err(|e| Error::InternalInvariant(e.to_string()))?,
        created_at: row.get::<String>(7).map_err(store_error)?.parse().map_err(|e: chrono::ParseError| Error::InternalInvariant(e.to_string()))?,
        updated_at: row.get::<String>(8).map_err(store_error)?.parse().map_err(|e: chrono::ParseError| Error::InternalInvariant(e.to_string()))?,
    })
}

fn row_to_credentials(row: &libsql::Row) -> Result<TenantCredentials> {
    let tenant_id: String = row.get(0).map_err(store_error)?;
    let scopes_json: String = row.get(5).map_err(store_error)?;
    Ok(TenantCredentials {
        tenant_id: TenantId::from(uuid::Uuid::parse_str(&tenant_id).map_err(|e| Error::InternalInvariant(e.to_string()))?),
        client_id: row.get(1).map_err(store_error)?,
        encrypted_secret: row.get(2).map_err(store_error)?,
        certificate_thumbprint: row.get(3).map_err(store_error)?,
        authority_url: row.get(4).map_err(store_error)?,
        scopes: super::decode_json(&scopes_json)?,
        is_valid: row.get::<i64>(6).map_err(store_error)? != 0,
        created_at: row.get::<String>(7).map_err(store_error)?.parse().map_err(|e: chrono::ParseError| Error::InternalInvariant(e.to_string()))?,
        updated_at: row.get::<String>(8).map_err(store_error)?.parse().map_err(|e: chrono::ParseError| Error::InternalInvariant(e.to_string()))?,
    })
}

pub struct LibsqlTenantRepository {
    db: Database,
}

impl LibsqlTenantRepository {
    pub(crate) fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TenantRepository for LibsqlTenantRepository {
    async fn get(&self, id: TenantId) -> Result<Tenant> {
        let mut rows = self
            .db
            .conn()
            .query(
                "SELECT id, external_tenant_id, display_name, country_code, default_language, \
                 onboarding_state, consented_at, created_at, updated_at FROM tenants WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(store_error)?;
        match rows.next().await.map_err(store_error)? {
            Some(row) => row_to_tenant(&row),
            None => Err(Error::NotFound(format!("tenant {id}"))),
        }
    }

    async fn find_by_external_id(&self, external_tenant_id: &str) -> Result<Option<Tenant>> {
        let mut rows = self
            .db
            .conn()
            .query(
                "SELECT id, external_tenant_id, display_name, country_code, default_language, \
                 onboarding_state, consented_at, created_at, updated_at FROM tenants WHERE external_tenant_id = ?1",
                params![external_tenant_id.to_string()],
            )
            .await
            .map_err(store_error)?;
        match rows.next().await.map_err(store_error)? {
            Some(row) => Ok(Some(row_to_tenant(&row)?)),
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<Tenant>> {
        let mut rows = self
            .db
            .conn()
            .query(
                "SELECT id, external_tenant_id, display_name, country_code, default_language, \
                 onboarding_state, consented_at, created_at, updated_at FROM tenants ORDER BY created_at",
                (),
            )
            .await
            .map_err(store_error)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(store_error)? {
            out.push(row_to_tenant(&row)?);
        }
        Ok(out)
    }

    async fn upsert(&self, tenant: &Tenant) -> Result<()> {
        self.db
            .conn()
            .execute(
                "INSERT INTO tenants (id, external_tenant_id, display_name, country_code, default_language, \
                 onboarding_state, consented_at, created_at, updated_at) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9) \
                 ON CONFLICT(id) DO UPDATE SET external_tenant_id=excluded.external_tenant_id, \
                 display_name=excluded.display_name, country_code=excluded.country_code, \
                 default_language=excluded.default_language, onboarding_state=excluded.onboarding_state, \
                 consented_at=excluded.consented_at, updated_at=excluded.updated_at",
                params![
                    tenant.id.to_string(),
                    tenant.external_tenant_id.clone(),
                    tenant.display_name.clone(),
                    tenant.country_code.clone(),
                    tenant.default_language.clone(),
                    onboarding_state_to_str(tenant.onboarding_state).to_string(),
                    tenant.consented_at.map(|d| d.to_rfc3339()),
                    tenant.created_at.to_rfc3339(),
                    tenant.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn get_credentials(&self, tenant_id: TenantId) -> Result<TenantCredentials> {
        let mut rows = self
            .db
            .conn()
            .query(
                "SELECT tenant_id, client_id, encrypted_secret, certificate_thumbprint, authority_url, \
                 scopes, is_valid, created_at, updated_at FROM tenant_credentials WHERE tenant_id = ?1",
                params![tenant_id.to_string()],
            )
            .await
            .map_err(store_error)?;
        match rows.next().await.map_err(store_error)? {
            Some(row) => row_to_credentials(&row),
            None => Err(Error::NotFound(format!("credentials for tenant {tenant_id}"))),
        }
    }

    async fn put_credentials(&self, credentials: &TenantCredentials) -> Result<()> {
        self.db
            .conn()
            .execute(
                "INSERT INTO tenant_credentials (tenant_id, client_id, encrypted_secret, \
                 certificate_thumbprint, authority_url, scopes, is_valid, created_at, updated_at) \
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9) \
                 ON CONFLICT(tenant_id) DO UPDATE SET client_id=excluded.client_id, \
                 encrypted_secret=excluded.encrypted_secret, certificate_thumbprint=excluded.certificate_thumbprint, \
                 authority_url=excluded.authority_url, scopes=excluded.scopes, is_valid=excluded.is_valid, \
                 updated_at=excluded.updated_at",
                params![
                    credentials.tenant_id.to_string(),
                    credentials.client_id.clone(),
                    credentials.encrypted_secret.clone(),
                    credentials.certificate_thumbprint.clone(),
                    credentials.authority_url.clone(),
                    super::encode_json(&credentials.scopes),
                    i64::from(credentials.is_valid),
                    credentials.created_at.to_rfc3339(),
                    credentials.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(store_error)?;
        Ok(())
    }
}
