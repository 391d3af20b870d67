// Copyright 2024-2025 Aprio One AB, Sweden
// Author: Kenneth Pernyer, kenneth@aprio.one
// SPDX-License-Identifier: MIT
// See LICENSE file in the project root for full license information.

//! Configuration management for the license optimization service.
//!
//! Every setting is environment-driven with a documented default, layered
//! through the `config` crate so an operator can override any key without
//! touching code.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;

/// Runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub vault: VaultConfig,
    pub pricing: PricingConfig,
    pub external: ExternalConfig,
}

/// Base URLs and static credentials for the external directory/commerce
/// APIs (spec §4.3, §4.5). Per-tenant directory credentials live in
/// `tenant_credentials`, not here. Commerce Sync has exactly one OAuth
/// client-credentials application, distinct from any tenant's directory
/// credentials (spec §6.2), so its secret lives in process configuration
/// rather than the per-tenant encrypted store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalConfig {
    pub directory_base_url: String,
    pub commerce_base_url: String,
    pub commerce_authority_url: String,
    pub commerce_client_id: String,
    pub commerce_client_secret: String,
    pub commerce_scope: String,
}

impl Default for ExternalConfig {
    fn default() -> Self {
        Self {
            directory_base_url: "https://graph.microsoft.com/v1.0".to_string(),
            commerce_base_url: "https://api.partnercenter.microsoft.com/v1".to_string(),
            commerce_authority_url: "https://login.microsoftonline.com/organizations".to_string(),
            commerce_client_id: String::new(),
            commerce_client_secret: String::new(),
            commerce_scope: "https://api.partnercenter.microsoft.com/.default".to_string(),
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Bind address for the HTTP server.
    pub bind: SocketAddr,
    /// Maximum request body size (bytes).
    pub max_body_size: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".parse().expect("valid default address"),
            max_body_size: 10 * 1024 * 1024,
        }
    }
}

/// Relational store configuration (spec §6.3: libsql, embedded by default).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// A libsql connection string: `file:path/to/db.sqlite` for an embedded
    /// local file, or a `libsql://` remote URL when paired with `auth_token`.
    pub url: String,
    pub auth_token: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { url: "file:seatscope.db".to_string(), auth_token: None }
    }
}

/// Secret Vault key material (spec §4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Base64-encoded 32-byte key for the current key version.
    pub key_base64: String,
    pub key_version: u8,
}

/// Pricing fallback and market-mapping configuration (spec §9 open
/// questions 1, 2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Flat monthly unit price (major units) used when no commerce price
    /// row matches a SKU during an analysis.
    pub fallback_monthly_price: f64,
    /// Country code (ISO-3166 alpha-2) → commerce "market" column mapping.
    pub market_by_country: HashMap<String, String>,
    pub default_market: String,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            fallback_monthly_price: 10.0,
            market_by_country: HashMap::from([
                ("US".to_string(), "US".to_string()),
                ("CA".to_string(), "CA".to_string()),
                ("GB".to_string(), "GB".to_string()),
                ("SE".to_string(), "SE".to_string()),
                ("DE".to_string(), "DE".to_string()),
                ("FR".to_string(), "FR".to_string()),
            ]),
            default_market: "US".to_string(),
        }
    }
}

impl Config {
    /// Loads configuration from environment variables prefixed `SEATSCOPE_`,
    /// layered over documented defaults. `SEATSCOPE_VAULT_KEY_BASE64` has no
    /// default: an operator must supply key material, or startup fails.
    pub fn load() -> anyhow::Result<Self> {
        let key_base64 = std::env::var("SEATSCOPE_VAULT_KEY_BASE64")
            .map_err(|_| anyhow::anyhow!("SEATSCOPE_VAULT_KEY_BASE64 must be set"))?;

        let builder = config::Config::builder()
            .set_default("http.bind", HttpConfig::default().bind.to_string())?
            .set_default("http.max_body_size", HttpConfig::default().max_body_size as i64)?
            .set_default("database.url", DatabaseConfig::default().url)?
            .set_default("pricing.fallback_monthly_price", PricingConfig::default().fallback_monthly_price)?
            .set_default("pricing.default_market", PricingConfig::default().default_market)?
            .set_default("external.directory_base_url", ExternalConfig::default().directory_base_url)?
            .set_default("external.commerce_base_url", ExternalConfig::default().commerce_base_url)?
            .set_default("external.commerce_authority_url", ExternalConfig::default().commerce_authority_url)?
            .set_default("external.commerce_client_id", ExternalConfig::default().commerce_client_id)?
            .set_default("external.commerce_client_secret", ExternalConfig::default().commerce_client_secret)?
            .set_default("external.commerce_scope", ExternalConfig::default().commerce_scope)?
            .set_override("vault.key_base64", key_base64)?
            .set_override("vault.key_version", 1)?
            .add_source(config::Environment::with_prefix("SEATSCOPE").separator("__"));

        let raw = builder.build()?;

        Ok(Self {
            http: HttpConfig {
                bind: raw.get_string("http.bind")?.parse()?,
                max_body_size: raw.get_int("http.max_body_size")? as usize,
            },
            database: DatabaseConfig {
                url: raw.get_string("database.url")?,
                auth_token: raw.get_string("database.auth_token").ok(),
            },
            vault: VaultConfig {
                key_base64: raw.get_string("vault.key_base64")?,
                key_version: raw.get_int("vault.key_version")? as u8,
            },
            pricing: PricingConfig {
                fallback_monthly_price: raw.get_float("pricing.fallback_monthly_price")?,
                market_by_country: PricingConfig::default().market_by_country,
                default_market: raw.get_string("pricing.default_market")?,
            },
            external: ExternalConfig {
                directory_base_url: raw.get_string("external.directory_base_url")?,
                commerce_base_url: raw.get_string("external.commerce_base_url")?,
                commerce_authority_url: raw.get_string("external.commerce_authority_url")?,
                commerce_client_id: raw.get_string("external.commerce_client_id")?,
                commerce_client_secret: raw.get_string("external.commerce_client_secret")?,
                commerce_scope: raw.get_string("external.commerce_scope")?,
            },
        })
    }
}
