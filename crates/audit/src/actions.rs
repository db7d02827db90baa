//! Audit action names

pub const USER_REGISTRATION: &str = "user_registration";
pub const LOGIN_SUCCESSFUL: &str = "login_successful";
pub const LOGIN_FAILED: &str = "login_failed";
pub const PAYMENT_COMPLETED: &str = "payment_completed";
pub const BANK_ACCOUNT_LINKED: &str = "bank_account_linked";
pub const DIRECT_DEPOSIT_SETUP: &str = "direct_deposit_setup";
pub const WITHDRAWAL_PROCESSED: &str = "withdrawal_processed";
pub const WITHDRAWAL_BLOCKED: &str = "withdrawal_blocked";
pub const MULTISIG_WALLET_CREATED: &str = "multisig_wallet_created";
pub const BITCOIN_TRANSFER_INITIATED: &str = "bitcoin_transfer_initiated";
pub const BITCOIN_TRANSFER_SIGNED: &str = "bitcoin_transfer_signed";
pub const BITCOIN_TRANSFER_REJECTED: &str = "bitcoin_transfer_rejected";
pub const LIGHTNING_INVOICE_CREATED: &str = "lightning_invoice_created";
pub const KYC_DOCUMENT_UPLOADED: &str = "kyc_document_uploaded";
pub const COMPLIANCE_REPORT_GENERATED: &str = "compliance_report_generated";
