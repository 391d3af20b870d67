// Copyright 2024-2025 Aprio One AB, Sweden
// Author: Kenneth Pernyer, kenneth@aprio.one
// SPDX-License-Identifier: MIT
// See LICENSE file in the project root for full license information.

//! Per-(tenant, operation) in-flight registry (spec §5).
//!
//! A second sync or analysis request for a tenant/operation pair already in
//! flight is rejected outright with [`seatscope_core::error::Error::AlreadyRunning`]
//! rather than coalesced onto the running one, mirroring the token cache's
//! `DashMap`-per-key concurrency model in `seatscope-ingest`.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use seatscope_core::error::{Error, Result};
use seatscope_core::TenantId;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncOperation {
    SyncUsers,
    SyncLicenses,
    SyncUsage,
    RunAnalysis,
}

impl fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncOperation::SyncUsers => "sync_users",
            SyncOperation::SyncLicenses => "sync_licenses",
            SyncOperation::SyncUsage => "sync_usage",
            SyncOperation::RunAnalysis => "run_analysis",
        };
        f.write_str(name)
    }
}

/// A held fingerprint slot; releases automatically when dropped so a panic
/// or early return during the operation can never leave a tenant wedged.
pub struct FingerprintGuard {
    registry: Arc<DashMap<(TenantId, SyncOperation), ()>>,
    key: (TenantId, SyncOperation),
}

impl Drop for FingerprintGuard {
    fn drop(&mut self) {
        self.registry.remove(&self.key);
    }
}

#[derive(Clone, Default)]
pub struct FingerprintRegistry {
    inflight: Arc<DashMap<(TenantId, SyncOperation), ()>>,
}

impl FingerprintRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the (tenant, operation) fingerprint, failing fast if another
    /// call already holds it.
    pub fn acquire(&self, tenant_id: TenantId, operation: SyncOperation) -> Result<FingerprintGuard> {
        let key = (tenant_id, operation);
        match self.inflight.entry(key) {
            Entry::Occupied(_) => Err(Error::AlreadyRunning),
            Entry::Vacant(slot) => {
                slot.insert(());
                Ok(FingerprintGuard { registry: Arc::clone(&self.inflight), key })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_for_same_key_is_rejected() {
        let registry = FingerprintRegistry::new();
        let tenant = TenantId::new();
        let _guard = registry.acquire(tenant, SyncOperation::RunAnalysis).unwrap();
        let second = registry.acquire(tenant, SyncOperation::RunAnalysis);
        assert!(matches!(second, Err(Error::AlreadyRunning)));
    }

    #[test]
    fn releasing_the_guard_allows_a_fresh_acquire() {
        let registry = FingerprintRegistry::new();
        let tenant = TenantId::new();
        {
            let _guard = registry.acquire(tenant, SyncOperation::RunAnalysis).unwrap();
        }
        assert!(registry.acquire(tenant, SyncOperation::RunAnalysis).is_ok());
    }

    #[test]
    fn distinct_operations_for_the_same_tenant_do_not_conflict() {
        let registry = FingerprintRegistry::new();
        let tenant = TenantId::new();
        let _a = registry.acquire(tenant, SyncOperation::SyncUsers).unwrap();
        assert!(registry.acquire(tenant, SyncOperation::SyncLicenses).is_ok());
    }
}
