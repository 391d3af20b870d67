// Copyright 2024-2025 Aprio One AB, Sweden
// Author: Kenneth Pernyer, kenneth@aprio.one
// SPDX-License-Identifier: MIT
// See LICENSE file in the project root for full license information.

//! Tenant and tenant-credential entities.

use crate::ids::TenantId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A managed customer tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    /// Opaque, unique identifier assigned by the external directory.
    pub external_tenant_id: String,
    pub display_name: String,
    /// ISO-3166 alpha-2 country code.
    pub country_code: String,
    /// Default language code (BCP-47), used for reason-code rendering.
    pub default_language: String,
    pub onboarding_state: OnboardingState,
    pub consented_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingState {
    Pending,
    Configured,
    Active,
    Error,
}

/// Per-tenant OAuth client credentials for the external directory API.
///
/// Invariant: `encrypted_secret` never holds plaintext; callers must decrypt
/// through the Secret Vault at the point of use and must never log, store,
/// or propagate the decrypted value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantCredentials {
    pub tenant_id: TenantId,
    pub client_id: String,
    /// Self-describing ciphertext produced by the Secret Vault.
    pub encrypted_secret: Vec<u8>,
    pub certificate_thumbprint: Option<String>,
    pub authority_url: String,
    pub scopes: Vec<String>,
    pub is_valid: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
