//! Cipher contract for encrypted settings
//!
//! The codec only needs `encrypt`/`decrypt` on strings. Key management stays
//! outside this crate: callers hand over a key (or point at an environment
//! variable) when constructing [`AesGcmCipher`].

use crate::error::CipherError;
use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use std::fmt;
use zeroize::Zeroizing;

/// Environment variable holding a base64-encoded 32-byte key.
pub const CIPHER_KEY_ENV: &str = "SETWISE_CIPHER_KEY";

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// String-in, string-out symmetric cipher.
pub trait Cipher: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<String, CipherError>;
    fn decrypt(&self, ciphertext: &str) -> Result<String, CipherError>;
}

/// Placeholder used when no key is configured. Every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCipher;

impl Cipher for NoCipher {
    fn encrypt(&self, _plaintext: &str) -> Result<String, CipherError> {
        Err(CipherError::NotConfigured)
    }

    fn decrypt(&self, _ciphertext: &str) -> Result<String, CipherError> {
        Err(CipherError::NotConfigured)
    }
}

// ============================================================================
// AES-256-GCM
// ============================================================================

/// AES-256-GCM cipher. Output is base64(nonce || ciphertext) with a fresh
/// random nonce per call.
#[derive(Clone)]
pub struct AesGcmCipher {
    key: Zeroizing<[u8; KEY_LEN]>,
}

impl AesGcmCipher {
    pub fn new(key: [u8; KEY_LEN]) -> Self {
        Self {
            key: Zeroizing::new(key),
        }
    }

    /// Build from a base64-encoded 32-byte key.
    pub fn from_base64_key(encoded: &str) -> Result<Self, CipherError> {
        let bytes = Zeroizing::new(
            B64.decode(encoded.trim())
                .map_err(|e| CipherError::InvalidKey(e.to_string()))?,
        );
        if bytes.len() != KEY_LEN {
            return Err(CipherError::InvalidKey(format!(
                "key has wrong length: {} (expected {})",
                bytes.len(),
                KEY_LEN
            )));
        }
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&bytes);
        Ok(Self::new(key))
    }

    /// Build from `SETWISE_CIPHER_KEY`. A missing variable is `NotConfigured`.
    pub fn from_env() -> Result<Self, CipherError> {
        let encoded = std::env::var(CIPHER_KEY_ENV).map_err(|_| CipherError::NotConfigured)?;
        Self::from_base64_key(&encoded)
    }

    /// Generate a random key, returned base64-encoded.
    pub fn generate_key() -> String {
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        OsRng.fill_bytes(&mut key[..]);
        B64.encode(&key[..])
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key[..]))
    }
}

impl Cipher for AesGcmCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher()
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| CipherError::Encrypt(e.to_string()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(B64.encode(out))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String, CipherError> {
        let bytes = B64
            .decode(ciphertext.trim())
            .map_err(|e| CipherError::Encoding(e.to_string()))?;
        if bytes.len() <= NONCE_LEN {
            return Err(CipherError::Encoding(format!(
                "ciphertext too short: {} bytes",
                bytes.len()
            )));
        }

        let (nonce_bytes, body) = bytes.split_at(NONCE_LEN);
        let plaintext = self
            .cipher()
            .decrypt(Nonce::from_slice(nonce_bytes), body)
            .map_err(|e| CipherError::Decrypt(e.to_string()))?;

        String::from_utf8(plaintext).map_err(|e| CipherError::Decrypt(e.to_string()))
    }
}

impl fmt::Debug for AesGcmCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AesGcmCipher")
            .field("key", &"<redacted>")
            .finish()
    }
}
