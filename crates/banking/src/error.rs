//! Banking errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BankingError {
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Security error: {0}")]
    Security(#[from] billpay_security::SecurityError),
}

pub type BankingResult<T> = Result<T, BankingError>;
