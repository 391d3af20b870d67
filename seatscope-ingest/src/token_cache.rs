// Copyright 2024-2025 Aprio One AB, Sweden
// Author: Kenneth Pernyer, kenneth@aprio.one
// SPDX-License-Identifier: MIT
// See LICENSE file in the project root for full license information.

//! Token Cache: per-tenant OAuth access token caching with single-flight
//! refresh.
//!
//! A `DashMap` gives lock-free access across tenants; within a tenant, a
//! `tokio::sync::Mutex` serializes refreshes so that N concurrent callers
//! for the same tenant trigger exactly one token request.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use seatscope_core::TenantId;
use seatscope_core::error::Result;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

/// An access token and the instant it stops being usable.
#[derive(Debug, Clone)]
pub struct CachedToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl CachedToken {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>, skew: chrono::Duration) -> bool {
        now + skew >= self.expires_at
    }
}

/// Default safety margin subtracted from a token's real expiry so a request
/// in flight never races against the token expiring mid-call.
pub const EXPIRY_SKEW: chrono::Duration = chrono::Duration::seconds(300);

#[derive(Default)]
pub struct TokenCache {
    slots: DashMap<TenantId, Arc<Mutex<Option<CachedToken>>>>,
}

impl TokenCache {
    #[must_use]
    pub fn new() -> Self {
        Self { slots: DashMap::new() }
    }

    fn slot(&self, tenant_id: TenantId) -> Arc<Mutex<Option<CachedToken>>> {
        self.slots
            .entry(tenant_id)
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }

    /// Returns a cached, unexpired token for `tenant_id`, or calls
    /// `refresh` to mint a new one. Concurrent callers for the same tenant
    /// block on the same mutex rather than each issuing their own token
    /// request.
    pub async fn get_or_refresh<F, Fut>(&self, tenant_id: TenantId, refresh: F) -> Result<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CachedToken>>,
    {
        let slot = self.slot(tenant_id);
        let mut guard = slot.lock().await;

        if let Some(token) = guard.as_ref() {
            if !token.is_expired(Utc::now(), EXPIRY_SKEW) {
                return Ok(token.access_token.clone());
            }
        }

        let fresh = refresh().await?;
        let access_token = fresh.access_token.clone();
        *guard = Some(fresh);
        Ok(access_token)
    }

    /// Drops a tenant's cached token, forcing the next call to refresh.
    /// Used after the directory/commerce client observes an `Unauthorized`
    /// response, which usually means the cached token was revoked upstream.
    /// Waits for any in-flight refresh to finish rather than skipping the
    /// drop, so the entry is gone by the time this returns.
    pub async fn invalidate(&self, tenant_id: TenantId) {
        if let Some(slot) = self.slots.get(&tenant_id) {
            let mut guard = slot.lock().await;
            *guard = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn token(minutes_valid: i64) -> CachedToken {
        CachedToken {
            access_token: "tok".into(),
            expires_at: Utc::now() + chrono::Duration::minutes(minutes_valid),
        }
    }

    #[tokio::test]
    async fn refresh_is_called_once_when_cache_is_empty() {
        let cache = TokenCache::new();
        let calls = AtomicU32::new(0);
        let tenant = TenantId::new();

        let result = cache
            .get_or_refresh(tenant, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(token(60))
            })
            .await
            .unwrap();

        assert_eq!(result, "tok");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cached_unexpired_token_skips_refresh() {
        let cache = TokenCache::new();
        let tenant = TenantId::new();
        let calls = AtomicU32::new(0);

        for _ in 0..3 {
            cache
                .get_or_refresh(tenant, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(token(60))
                })
                .await
                .unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_token_triggers_refresh() {
        let cache = TokenCache::new();
        let tenant = TenantId::new();

        cache.get_or_refresh(tenant, || async { Ok(token(-1)) }).await.unwrap();
        let calls = AtomicU32::new(0);
        cache
            .get_or_refresh(tenant, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(token(60))
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidate_forces_next_call_to_refresh() {
        let cache = TokenCache::new();
        let tenant = TenantId::new();

        cache.get_or_refresh(tenant, || async { Ok(token(60)) }).await.unwrap();
        cache.invalidate(tenant).await;

        let calls = AtomicU32::new(0);
        cache
            .get_or_refresh(tenant, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(token(60))
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn separate_tenants_do_not_share_a_slot() {
        let cache = TokenCache::new();
        let a = TenantId::new();
        let b = TenantId::new();

        cache.get_or_refresh(a, || async { Ok(token(60)) }).await.unwrap();
        let calls = AtomicU32::new(0);
        cache
            .get_or_refresh(b, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(token(60))
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
