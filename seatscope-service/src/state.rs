// Copyright 2024-2025 Aprio One AB, Sweden
// Author: Kenneth Pernyer, kenneth@aprio.one
// SPDX-License-Identifier: MIT
// See LICENSE file in the project root for full license information.

//! Application state shared across every HTTP handler.

use crate::config::Config;
use crate::db::Database;
use crate::fingerprint::FingerprintRegistry;
use crate::rate_limit::RateLimiter;
use seatscope_core::error::{Error, Result};
use seatscope_engine::SkuRegistry;
use seatscope_ingest::{CommerceClient, DirectoryClient, HttpClientCore, SecretVault};
use std::sync::Arc;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub directory: Arc<DirectoryClient>,
    pub commerce: Arc<CommerceClient>,
    pub registry: Arc<SkuRegistry>,
    pub fingerprints: FingerprintRegistry,
    pub rate_limiter: RateLimiter,
    pub config: Arc<Config>,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self> {
        let db = Database::connect(&config.database.url, config.database.auth_token.as_deref()).await?;

        let key_bytes = base64_decode(&config.vault.key_base64)?;
        let vault = Arc::new(SecretVault::new(&key_bytes)?);

        let http = HttpClientCore::new(reqwest::Client::new());
        let directory = Arc::new(DirectoryClient::new(http.clone(), vault, config.external.directory_base_url.clone()));
        let commerce = Arc::new(CommerceClient::new(
            http,
            config.external.commerce_base_url.clone(),
            config.external.commerce_authority_url.clone(),
            config.external.commerce_client_id.clone(),
            config.external.commerce_client_secret.clone(),
            config.external.commerce_scope.clone(),
        ));

        let registry = Arc::new(SkuRegistry::seeded());
        let snapshot = registry.snapshot();
        db.sku_registry().replace_matrix(&snapshot.all().cloned().collect::<Vec<_>>()).await?;
        db.sku_registry().replace_addon_compatibility(&snapshot.all_addon_compatibility().cloned().collect::<Vec<_>>()).await?;

        Ok(Self {
            db,
            directory,
            commerce,
            registry,
            fingerprints: FingerprintRegistry::new(),
            rate_limiter: RateLimiter::new(),
            config: Arc::new(config),
        })
    }
}

/// Minimal base64 decoder for the vault key, avoiding a dedicated `base64`
/// dependency for a single startup-time decode.
fn base64_decode(input: &str) -> Result<Vec<u8>> {
    const TABLE: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let mut reverse = [255u8; 256];
    for (i, &c) in TABLE.iter().enumerate() {
        reverse[c as usize] = i as u8;
    }

    let cleaned: Vec<u8> = input.bytes().filter(|&b| b != b'=' && !b.is_ascii_whitespace()).collect();
    let mut out = Vec::with_capacity(cleaned.len() * 3 / 4);
    for chunk in cleaned.chunks(4) {
        let mut buf = [0u8; 4];
        for (i, &c) in chunk.iter().enumerate() {
            let v = reverse[c as usize];
            if v == 255 {
                return Err(Error::InternalInvariant("vault key is not valid base64".into()));
            }
            buf[i] = v;
        }
        let n = chunk.len();
        out.push((buf[0] << 2) | (buf[1] >> 4));
        if n > 2 {
            out.push((buf[1] << 4) | (buf[2] >> 2));
        }
        if n > 3 {
            out.push((buf[2] << 6) | buf[3]);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_a_known_base64_value() {
        assert_eq!(base64_decode("aGVsbG8=").unwrap(), b"hello");
    }

    #[test]
    fn rejects_invalid_characters() {
        assert!(base64_decode("not valid base64!!").is_err());
    }
}
