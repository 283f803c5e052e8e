//! Credential primitives
//!
//! - [`PasswordHasher`]: Argon2id hashing for local passwords
//! - [`TokenCipher`]: AES-256-GCM for GitHub access tokens at rest
//!
//! Ciphertext layout is `base64(nonce (12 bytes) || ciphertext || tag)`.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::password_hash::{
    PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString,
};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::{
    Engine as _,
    engine::general_purpose::{STANDARD as BASE64_STANDARD, URL_SAFE as BASE64_URL_SAFE},
};
use rand::RngCore;
use rand::rngs::OsRng;

use crate::config::PasswordHashConfig;
use crate::error::AppError;

const AES_256_KEY_BYTES: usize = 32;
const AES_GCM_NONCE_BYTES: usize = 12;

// =============================================================================
// Password hashing
// =============================================================================

/// Argon2id password hasher with fixed cost parameters
#[derive(Clone)]
pub struct PasswordHasher {
    params: Params,
    /// Hash of a random password, verified against when no account matched
    dummy_hash: String,
}

impl PasswordHasher {
    /// # Errors
    /// Returns a config error if the cost parameters are out of range
    pub fn new(config: &PasswordHashConfig) -> Result<Self, AppError> {
        let params = Params::new(
            config.memory_kib,
            config.iterations,
            config.parallelism,
            None,
        )
        .map_err(|e| AppError::Config(format!("invalid argon2 parameters: {e}")))?;

        let mut hasher = Self {
            params,
            dummy_hash: String::new(),
        };
        let mut filler = [0_u8; 16];
        OsRng.fill_bytes(&mut filler);
        hasher.dummy_hash = hasher.hash(&BASE64_STANDARD.encode(filler))?;
        Ok(hasher)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a password into a self-describing PHC string
    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to hash password: {e}")))
    }

    /// Check a password against a stored hash
    ///
    /// The stored hash's own parameters are used, so hashes written under
    /// older cost settings still verify. A malformed hash never matches.
    pub fn verify(&self, password: &str, stored: &str) -> bool {
        let parsed = match PasswordHash::new(stored) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Stored password hash is malformed: {}", e);
                return false;
            }
        };

        self.argon2()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }

    /// Burn one verification so unknown accounts cost the same as wrong passwords
    pub fn verify_dummy(&self, password: &str) {
        let _ = self.verify(password, &self.dummy_hash);
    }
}

// =============================================================================
// Token encryption
// =============================================================================

/// Symmetric cipher for third-party access tokens
#[derive(Clone)]
pub struct TokenCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCipher").finish_non_exhaustive()
    }
}

impl TokenCipher {
    /// Build from a base64 key (standard or URL-safe alphabet)
    ///
    /// # Errors
    /// Returns an encryption error unless the key decodes to exactly 32 bytes
    pub fn from_base64_key(encoded: &str) -> Result<Self, AppError> {
        let encoded = encoded.trim();
        let key = BASE64_STANDARD
            .decode(encoded)
            .or_else(|_| BASE64_URL_SAFE.decode(encoded))
            .map_err(|_| AppError::Encryption("encryption key is not valid base64".to_string()))?;

        if key.len() != AES_256_KEY_BYTES {
            return Err(AppError::Encryption(format!(
                "encryption key must decode to {} bytes, got {}",
                AES_256_KEY_BYTES,
                key.len()
            )));
        }

        let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| {
            AppError::Encryption(format!(
                "invalid encryption key length (expected {} bytes)",
                AES_256_KEY_BYTES
            ))
        })?;
        Ok(Self { cipher })
    }

    /// Encrypt a plaintext token; every call uses a fresh nonce
    pub fn encrypt(&self, plaintext: &str) -> Result<String, AppError> {
        let mut nonce = [0_u8; AES_GCM_NONCE_BYTES];
        OsRng.fill_bytes(&mut nonce);
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|_| AppError::Encryption("token encryption failed".to_string()))?;

        let mut out = Vec::with_capacity(AES_GCM_NONCE_BYTES + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(BASE64_STANDARD.encode(out))
    }

    /// Decrypt a value produced by [`TokenCipher::encrypt`]
    ///
    /// # Errors
    /// Fails on bad base64, truncated input, a wrong key or any tampering
    pub fn decrypt(&self, encoded: &str) -> Result<String, AppError> {
        let data = BASE64_STANDARD
            .decode(encoded)
            .map_err(|_| AppError::Encryption("encrypted token is not valid base64".to_string()))?;

        if data.len() <= AES_GCM_NONCE_BYTES {
            return Err(AppError::Encryption(
                "encrypted token payload is too short".to_string(),
            ));
        }

        let (nonce, ciphertext) = data.split_at(AES_GCM_NONCE_BYTES);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| AppError::Encryption("token decryption failed".to_string()))?;

        String::from_utf8(plaintext)
            .map_err(|_| AppError::Encryption("decrypted token is not UTF-8".to_string()))
    }
}
