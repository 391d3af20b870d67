// Copyright 2024-2025 Aprio One AB, Sweden
// Author: Kenneth Pernyer, kenneth@aprio.one
// SPDX-License-Identifier: MIT
// See LICENSE file in the project root for full license information.

//! The libsql-backed Data Store Adapter (spec §6.3).
//!
//! [`Database`] owns the connection and applies the embedded migration on
//! connect; each entity gets its own repository struct implementing the
//! corresponding `seatscope-core` port, one struct per entity rather than
//! one catch-all repository.

mod analyses;
mod commerce;
mod licenses;
mod recommendations;
mod schema;
mod sku;
mod tenants;
mod usage;
mod users;

pub use analyses::LibsqlAnalysisRepository;
pub use commerce::LibsqlCommerceRepository;
pub use licenses::LibsqlLicenseRepository;
pub use recommendations::LibsqlRecommendationRepository;
pub use sku::LibsqlSkuRegistryRepository;
pub use tenants::LibsqlTenantRepository;
pub use usage::LibsqlUsageRepository;
pub use users::LibsqlUserRepository;

use seatscope_core::error::{Error, Result};
use std::sync::Arc;

/// Maps a libsql driver error onto the domain error taxonomy. The relational
/// store has no notion of rate limiting or auth, so every failure it can
/// report is treated as transient: the caller's retry policy (spec §7)
/// covers reconnects the same way it covers a flaky upstream API.
pub(crate) fn store_error(err: libsql::Error) -> Error {
    Error::Transient(err.to_string())
}

/// Shared connection handle, cheap to clone and hand to each repository.
#[derive(Clone)]
pub struct Database {
    conn: Arc<libsql::Connection>,
}

impl Database {
    /// Opens (creating if absent) the relational store at `url` and applies
    /// the schema migration. `file:`-prefixed URLs open an embedded local
    /// database file; anything else is treated as a `libsql://` remote
    /// replica URL paired with `auth_token`.
    pub async fn connect(url: &str, auth_token: Option<&str>) -> Result<Self> {
        let db = if let Some(path) = url.strip_prefix("file:") {
            libsql::Builder::new_local(path).build().await.map_err(store_error)?
        } else {
            libsql::Builder::new_remote(url.to_string(), auth_token.unwrap_or_default().to_string())
                .build()
                .await
                .map_err(store_error)?
        };
        let conn = db.connect().map_err(store_error)?;
        conn.execute_batch(schema::MIGRATION).await.map_err(store_error)?;
        Ok(Self { conn: Arc::new(conn) })
    }

    /// Opens an in-memory database, used by integration tests.
    pub async fn connect_in_memory() -> Result<Self> {
        let db = libsql::Builder::new_local(":memory:").build().await.map_err(store_error)?;
        let conn = db.connect().map_err(store_error)?;
        conn.execute_batch(schema::MIGRATION).await.map_err(store_error)?;
        Ok(Self { conn: Arc::new(conn) })
    }

    pub(crate) fn conn(&self) -> &libsql::Connection {
        &self.conn
    }

    #[must_use]
    pub fn tenants(&self) -> LibsqlTenantRepository {
        LibsqlTenantRepository::new(self.clone())
    }

    #[must_use]
    pub fn users(&self) -> LibsqlUserRepository {
        LibsqlUserRepository::new(self.clone())
    }

    #[must_use]
    pub fn licenses(&self) -> LibsqlLicenseRepository {
        LibsqlLicenseRepository::new(self.clone())
    }

    #[must_use]
    pub fn usage(&self) -> LibsqlUsageRepository {
        LibsqlUsageRepository::new(self.clone())
    }

    #[must_use]
    pub fn commerce(&self) -> LibsqlCommerceRepository {
        LibsqlCommerceRepository::new(self.clone())
    }

    #[must_use]
    pub fn sku_registry(&self) -> LibsqlSkuRegistryRepository {
        LibsqlSkuRegistryRepository::new(self.clone())
    }

    #[must_use]
    pub fn analyses(&self) -> LibsqlAnalysisRepository {
        LibsqlAnalysisRepository::new(self.clone())
    }

    #[must_use]
    pub fn recommendations(&self) -> LibsqlRecommendationRepository {
        LibsqlRecommendationRepository::new(self.clone())
    }
}

/// Encodes a list of strings as a JSON array for storage in a `TEXT` column.
pub(crate) fn encode_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).expect("domain values always serialize")
}

/// Decodes a JSON column previously written by [`encode_json`].
pub(crate) fn decode_json<T: for<'de> serde::Deserialize<'de>>(raw: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(|e| Error::InternalInvariant(format!("corrupt json column: {e}")))
}
