//! Audit errors

use thiserror::Error;

use crate::hash::ChainError;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Security error: {0}")]
    Security(#[from] billpay_security::SecurityError),

    #[error("Audit chain corrupted: {0}")]
    Chain(#[from] ChainError),

    #[error("Audit log lock poisoned")]
    LockPoisoned,
}

pub type AuditResult<T> = Result<T, AuditError>;
