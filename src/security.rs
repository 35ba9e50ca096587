//! Credential material: interactive password hashes, the protocol hash BOINC
//! clients send, refresh-token digests and at-rest encryption of project
//! account keys.

use std::sync::OnceLock;

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit, generic_array::GenericArray},
};
use anyhow::Result;
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use md5::Md5;
use rand::Rng;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::warn;

use crate::config::SecurityConfig;

pub const KEY_SIZE: usize = 32;
pub const NONCE_SIZE: usize = 12;
pub const TAG_SIZE: usize = 16;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Ciphertext is not valid base64")]
    InvalidEncoding,

    #[error("Ciphertext is too short")]
    Truncated,

    #[error("Decryption failed (wrong key or corrupted data)")]
    DecryptionFailed,

    #[error("Decrypted account key is not valid UTF-8")]
    InvalidUtf8,
}

/// Hash a password using Argon2id with optional custom params.
/// If config is None, uses the library default params.
pub fn hash_password(password: &str, config: Option<&SecurityConfig>) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let argon2 = if let Some(cfg) = config {
        let params = Params::new(
            cfg.argon2_memory_cost_kib,
            cfg.argon2_time_cost,
            cfg.argon2_parallelism,
            None,
        )
        .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
    } else {
        Argon2::default()
    };

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}

/// Checks an interactive password against a stored Argon2 hash. The hash
/// carries its own parameters. Malformed hashes never verify.
#[must_use]
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

/// The hash BOINC clients compute and send as `<password_hash>`:
/// `md5(password + lowercase(username))`, hex encoded.
#[must_use]
pub fn hash_protocol_password(username: &str, password: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(password.as_bytes());
    hasher.update(username.to_lowercase().as_bytes());
    hex::encode(hasher.finalize())
}

/// Compares a stored protocol hash with the one a client presented.
/// Case-insensitive, and runs in time independent of where they differ.
#[must_use]
pub fn protocol_hash_matches(stored: &str, presented: &str) -> bool {
    let stored = stored.trim().as_bytes();
    let presented = presented.trim().as_bytes();

    if stored.len() != presented.len() {
        return false;
    }

    stored
        .iter()
        .zip(presented)
        .fold(0u8, |acc, (a, b)| {
            acc | (a.to_ascii_lowercase() ^ b.to_ascii_lowercase())
        })
        == 0
}

/// One-way digest stored in place of refresh tokens.
#[must_use]
pub fn hash_refresh_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Encrypts project account keys at rest with AES-256-GCM.
///
/// The key is derived from the master secret with PBKDF2-HMAC-SHA256 on first
/// use and cached for the lifetime of the cipher. Ciphertexts are URL-safe
/// base64 of `nonce (12 bytes) || ciphertext || tag (16 bytes)`.
pub struct AccountKeyCipher {
    master_key: String,
    salt: String,
    iterations: u32,
    cipher: OnceLock<Aes256Gcm>,
}

impl AccountKeyCipher {
    #[must_use]
    pub fn new(master_key: impl Into<String>, salt: impl Into<String>, iterations: u32) -> Self {
        Self {
            master_key: master_key.into(),
            salt: salt.into(),
            iterations,
            cipher: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn from_config(config: &SecurityConfig) -> Self {
        Self::new(
            config.master_encryption_key.clone(),
            config.encryption_salt.clone(),
            config.kdf_iterations,
        )
    }

    fn cipher(&self) -> &Aes256Gcm {
        self.cipher.get_or_init(|| {
            let mut key = [0u8; KEY_SIZE];
            pbkdf2::pbkdf2_hmac::<Sha256>(
                self.master_key.as_bytes(),
                self.salt.as_bytes(),
                self.iterations,
                &mut key,
            );
            Aes256Gcm::new(GenericArray::from_slice(&key))
        })
    }

    /// Derives the key now instead of on the first request.
    pub fn warm_up(&self) {
        let _ = self.cipher();
    }

    /// Encrypts an account key. The empty string maps to itself.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }

        let nonce_bytes: [u8; NONCE_SIZE] = rand::rng().random();
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher()
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| CryptoError::EncryptionFailed)?;

        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);

        Ok(URL_SAFE.encode(out))
    }

    /// Decrypts an account key, reporting why it failed.
    pub fn try_decrypt(&self, ciphertext: &str) -> Result<String, CryptoError> {
        if ciphertext.is_empty() {
            return Ok(String::new());
        }

        let raw = URL_SAFE
            .decode(ciphertext.trim())
            .map_err(|_| CryptoError::InvalidEncoding)?;

        if raw.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::Truncated);
        }

        let (nonce_bytes, sealed) = raw.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher()
            .decrypt(Nonce::from_slice(nonce_bytes), sealed)
            .map_err(|_| CryptoError::DecryptionFailed)?;

        String::from_utf8(plaintext).map_err(|_| CryptoError::InvalidUtf8)
    }

    /// Decrypts an account key, yielding the empty string on any failure so
    /// an undecryptable key is treated as missing.
    #[must_use]
    pub fn decrypt(&self, ciphertext: &str) -> String {
        match self.try_decrypt(ciphertext) {
            Ok(plaintext) => plaintext,
            Err(e) => {
                warn!(error = %e, "Failed to decrypt account key");
                String::new()
            }
        }
    }
}

impl std::fmt::Debug for AccountKeyCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountKeyCipher")
            .field("master_key", &"[REDACTED]")
            .field("salt", &self.salt)
            .field("iterations", &self.iterations)
            .field("derived", &self.cipher.get().is_some())
            .finish()
    }
}
