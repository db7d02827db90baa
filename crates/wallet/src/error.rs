//! Wallet errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("Invalid wallet policy: {0}")]
    InvalidPolicy(String),

    #[error("Not found or access denied: {0}")]
    NotFound(String),

    #[error("Invalid Bitcoin address: {0}")]
    InvalidAddress(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Transfer is {0}")]
    NotPending(String),

    #[error("Transfer has expired: {0}")]
    Expired(String),

    #[error("Duplicate signature from signer: {0}")]
    DuplicateSignature(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(#[from] billpay_security::SecurityError),

    #[error("Invoice not found: {0}")]
    InvoiceNotFound(String),

    #[error("Store error: {0}")]
    Store(#[from] billpay_store::StoreError),
}

pub type WalletResult<T> = Result<T, WalletError>;
