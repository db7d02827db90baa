//! Payment errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Email already registered")]
    EmailTaken,

    #[error("Incorrect email or password")]
    InvalidCredentials,

    #[error("Payment blocked by compliance: {reason}")]
    ComplianceBlocked { reason: String, flags: Vec<String> },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Store error: {0}")]
    Store(#[from] billpay_store::StoreError),
}

pub type PaymentResult<T> = Result<T, PaymentError>;
