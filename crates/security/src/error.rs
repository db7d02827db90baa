//! Security errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Invalid signature from {signer}: {reason}")]
    InvalidSignature { signer: String, reason: String },

    #[error("Signature verification failed: {0}")]
    SignatureVerificationFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type SecurityResult<T> = Result<T, SecurityError>;
