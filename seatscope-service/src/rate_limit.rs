// Copyright 2024-2025 Aprio One AB, Sweden
// Author: Kenneth Pernyer, kenneth@aprio.one
// SPDX-License-Identifier: MIT
// See LICENSE file in the project root for full license information.

//! Per-(tenant, operation) token-bucket rate limiter (spec §5): one sync or
//! analysis request per minute per key. Lazily refilled on access rather
//! than on a background timer, the same on-demand-refresh shape as the
//! ingest crate's token cache.

use crate::fingerprint::SyncOperation;
use dashmap::DashMap;
use seatscope_core::error::{Error, Result};
use seatscope_core::TenantId;
use std::time::{Duration, Instant};

pub const WINDOW: Duration = Duration::from_secs(60);

#[derive(Clone, Default)]
pub struct RateLimiter {
    last_request: DashMap<(TenantId, SyncOperation), Instant>,
}

impl RateLimiter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks and records a request for `(tenant_id, operation)`, rejecting
    /// with [`Error::RateLimited`] if the window has not elapsed since the
    /// last accepted request for the same key.
    pub fn check(&self, tenant_id: TenantId, operation: SyncOperation) -> Result<()> {
        let key = (tenant_id, operation);
        let now = Instant::now();

        if let Some(last) = self.last_request.get(&key) {
            let elapsed = now.duration_since(*last);
            if elapsed < WINDOW {
                return Err(Error::RateLimited { retry_after: Some(WINDOW - elapsed) });
            }
        }

        self.last_request.insert(key, now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_request_within_the_window_is_rejected() {
        let limiter = RateLimiter::new();
        let tenant = TenantId::new();
        limiter.check(tenant, SyncOperation::SyncUsers).unwrap();
        let second = limiter.check(tenant, SyncOperation::SyncUsers);
        assert!(matches!(second, Err(Error::RateLimited { .. })));
    }

    #[test]
    fn distinct_operations_have_independent_windows() {
        let limiter = RateLimiter::new();
        let tenant = TenantId::new();
        limiter.check(tenant, SyncOperation::SyncUsers).unwrap();
        assert!(limiter.check(tenant, SyncOperation::SyncLicenses).is_ok());
    }
}
