/// Opaque Token Generation
///
/// Access and refresh tokens are both opaque random strings:
/// - Drawn from the operating system CSPRNG
/// - URL-safe base64 without padding, so they survive headers and JSON untouched
/// - Never logged in clear; use `fingerprint` when a token must be traced

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::AppError;

/// Source of fresh access and refresh tokens.
///
/// Kept behind a trait so the rotation handler can be driven with a
/// deterministic or failing generator in tests.
pub trait TokenGenerator: Send + Sync {
    fn generate(&self) -> Result<String, AppError>;
}

/// Default generator backed by `OsRng`
#[derive(Debug, Clone)]
pub struct SecureTokenGenerator {
    byte_len: usize,
}

impl SecureTokenGenerator {
    pub fn new(byte_len: usize) -> Self {
        Self { byte_len }
    }
}

impl Default for SecureTokenGenerator {
    fn default() -> Self {
        Self::new(32)
    }
}

impl TokenGenerator for SecureTokenGenerator {
    fn generate(&self) -> Result<String, AppError> {
        let mut bytes = vec![0u8; self.byte_len];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| AppError::Internal(format!("failed to read from OS RNG: {}", e)))?;
        Ok(URL_SAFE_NO_PAD.encode(bytes))
    }
}

/// Short SHA-256 prefix of a token, safe to put in logs
pub fn fingerprint(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..12].to_string()
}
