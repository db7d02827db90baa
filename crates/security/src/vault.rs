//! Vault - authenticated encryption for sensitive fields
//!
//! Token format: `base64(nonce[12] || ciphertext+tag)`.
//! Every call to [`Vault::encrypt`] uses a fresh random nonce, so encrypting
//! the same value twice yields different tokens.

use std::fmt;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};

use crate::error::{SecurityError, SecurityResult};

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

#[derive(Clone)]
pub struct Vault {
    key: [u8; KEY_LEN],
    cipher: ChaCha20Poly1305,
}

impl Vault {
    /// Generate a vault with a fresh random key
    pub fn generate() -> Self {
        let key = ChaCha20Poly1305::generate_key(&mut OsRng);
        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(key.as_slice());
        Self::from_key_bytes(bytes)
    }

    pub fn from_key_bytes(key: [u8; KEY_LEN]) -> Self {
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
        Self { key, cipher }
    }

    /// Create from a hex-encoded 32-byte key
    pub fn from_hex(hex_key: &str) -> SecurityResult<Self> {
        let bytes = hex::decode(hex_key.trim())
            .map_err(|e| SecurityError::InvalidKey(format!("Invalid key hex: {}", e)))?;
        let key: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| SecurityError::InvalidKey("Key must be 32 bytes".to_string()))?;
        Ok(Self::from_key_bytes(key))
    }

    /// Load the key from `path`, or create and persist a new one (mode 0600)
    pub fn load_or_create(path: impl AsRef<Path>) -> SecurityResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            return Self::from_hex(&content);
        }

        let vault = Self::generate();
        crate::keys::write_secret(path, &vault.key_hex())?;
        tracing::info!(path = %path.display(), "Generated new encryption key");
        Ok(vault)
    }

    /// Export the key as hex (for storage)
    pub fn key_hex(&self) -> String {
        hex::encode(self.key)
    }

    pub fn encrypt(&self, plaintext: &str) -> SecurityResult<String> {
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| SecurityError::EncryptionFailed)?;

        let mut token = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        token.extend_from_slice(nonce.as_slice());
        token.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(token))
    }

    pub fn decrypt(&self, token: &str) -> SecurityResult<String> {
        let bytes = STANDARD
            .decode(token.trim())
            .map_err(|e| SecurityError::DecryptionFailed(format!("Invalid token encoding: {}", e)))?;

        if bytes.len() <= NONCE_LEN {
            return Err(SecurityError::DecryptionFailed("Token too short".to_string()));
        }

        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| SecurityError::DecryptionFailed("Authentication failed".to_string()))?;

        String::from_utf8(plaintext)
            .map_err(|e| SecurityError::DecryptionFailed(format!("Invalid UTF-8: {}", e)))
    }
}

impl fmt::Debug for Vault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vault").field("key", &"<redacted>").finish()
    }
}
