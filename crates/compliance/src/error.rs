//! Compliance errors

use thiserror::Error;

/// Errors from the Compliance Engine
#[derive(Debug, Error)]
pub enum ComplianceError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid document type: {0}")]
    InvalidDocumentType(String),

    #[error("KYC session not found: {0}")]
    SessionNotFound(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Compliance history lock poisoned")]
    LockPoisoned,

    #[error("Security error: {0}")]
    Security(#[from] billpay_security::SecurityError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

/// Result type for compliance operations
pub type ComplianceResult<T> = Result<T, ComplianceError>;
