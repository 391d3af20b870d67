// Copyright 2024-2025 Aprio One AB, Sweden
// Author: Kenneth Pernyer, kenneth@aprio.one
// SPDX-License-Identifier: MIT
// See LICENSE file in the project root for full license information.

//! Secret Vault: at-rest encryption for per-tenant client secrets.
//!
//! Ciphertext layout is self-describing so a stored key can be rotated
//! without a data migration: `[key_version: u8][nonce: 24 bytes][AEAD
//! ciphertext + tag]`. Decryption looks the referenced key up by version;
//! encryption always uses the vault's current key.

use chacha20poly1305::{
    aead::Aead, AeadCore, KeyInit, XChaCha20Poly1305, XNonce,
};
use seatscope_core::error::{Error, Result};
use std::collections::HashMap;

const NONCE_SIZE: usize = 24;
const HEADER_SIZE: usize = 1 + NONCE_SIZE;

/// Holds every key version the vault can decrypt with, plus the version
/// used for new encryptions. Old versions are retained only long enough to
/// decrypt secrets written before a rotation; callers are expected to
/// re-encrypt on next write.
pub struct SecretVault {
    current_version: u8,
    ciphers: HashMap<u8, XChaCha20Poly1305>,
}

impl SecretVault {
    /// Builds a vault from a single 32-byte key, used as key version 1.
    ///
    /// # Errors
    /// Returns [`Error::InternalInvariant`] if the key is not 32 bytes.
    pub fn new(key: &[u8]) -> Result<Self> {
        Self::with_versions(1, HashMap::from([(1u8, key.to_vec())]))
    }

    /// Builds a vault with an explicit current version and a map of every
    /// decryptable key version, used during key rotation.
    pub fn with_versions(current_version: u8, keys: HashMap<u8, Vec<u8>>) -> Result<Self> {
        let mut ciphers = HashMap::with_capacity(keys.len());
        for (version, key) in keys {
            let cipher = XChaCha20Poly1305::new_from_slice(&key)
                .map_err(|_| Error::InternalInvariant("secret vault key must be 32 bytes".into()))?;
            ciphers.insert(version, cipher);
        }
        if !ciphers.contains_key(&current_version) {
            return Err(Error::InternalInvariant(
                "secret vault current_version has no matching key".into(),
            ));
        }
        Ok(Self { current_version, ciphers })
    }

    /// Encrypts `plaintext`, prefixing the result with the current key
    /// version and a freshly generated random nonce.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let cipher = self
            .ciphers
            .get(&self.current_version)
            .expect("current_version validated in constructor");
        let nonce = XChaCha20Poly1305::generate_nonce(&mut rand::thread_rng());

        let ciphertext = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| Error::InternalInvariant("secret encryption failed".into()))?;

        let mut out = Vec::with_capacity(HEADER_SIZE + ciphertext.len());
        out.push(self.current_version);
        out.extend_from_slice(nonce.as_slice());
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Decrypts a value produced by [`Self::encrypt`], selecting the cipher
    /// by the version byte embedded in the ciphertext.
    pub fn decrypt(&self, encrypted: &[u8]) -> Result<Vec<u8>> {
        if encrypted.len() < HEADER_SIZE {
            return Err(Error::BadData("encrypted secret shorter than header".into()));
        }

        let version = encrypted[0];
        let nonce = XNonce::from_slice(&encrypted[1..HEADER_SIZE]);
        let cipher = self
            .ciphers
            .get(&version)
            .ok_or_else(|| Error::InternalInvariant(format!("no key for version {version}")))?;

        let plaintext = cipher
            .decrypt(nonce, &encrypted[HEADER_SIZE..])
            .map_err(|_| Error::InternalInvariant("secret decryption failed".into()))?;

        if plaintext.is_empty() {
            return Err(Error::InternalInvariant("decrypted secret was empty".into()));
        }
        Ok(plaintext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vault() -> SecretVault {
        SecretVault::new(&[7u8; 32]).unwrap()
    }

    #[test]
    fn round_trips_through_encrypt_decrypt() {
        let vault = vault();
        let ciphertext = vault.encrypt(b"super-secret-client-secret").unwrap();
        let plaintext = vault.decrypt(&ciphertext).unwrap();
        assert_eq!(plaintext, b"super-secret-client-secret");
    }

    #[test]
    fn ciphertext_embeds_current_key_version() {
        let vault = vault();
        let ciphertext = vault.encrypt(b"value").unwrap();
        assert_eq!(ciphertext[0], 1);
    }

    #[test]
    fn two_encryptions_of_the_same_value_differ() {
        let vault = vault();
        let a = vault.encrypt(b"value").unwrap();
        let b = vault.encrypt(b"value").unwrap();
        assert_ne!(a, b, "nonce must be freshly generated per call");
    }

    #[test]
    fn decrypt_rejects_short_input() {
        let vault = vault();
        assert!(vault.decrypt(&[1, 2, 3]).is_err());
    }

    #[test]
    fn decrypting_with_unknown_key_version_fails() {
        let vault = vault();
        let mut ciphertext = vault.encrypt(b"value").unwrap();
        ciphertext[0] = 99;
        assert!(vault.decrypt(&ciphertext).is_err());
    }

    #[test]
    fn rotated_vault_still_decrypts_old_version() {
        let old = SecretVault::new(&[7u8; 32]).unwrap();
        let old_ciphertext = old.encrypt(b"value").unwrap();

        let rotated = SecretVault::with_versions(
            2,
            HashMap::from([(1u8, vec![7u8; 32]), (2u8, vec![9u8; 32])]),
        )
        .unwrap();

        assert_eq!(rotated.decrypt(&old_ciphertext).unwrap(), b"value");
        let new_ciphertext = rotated.encrypt(b"value").unwrap();
        assert_eq!(new_ciphertext[0], 2);
    }
}
