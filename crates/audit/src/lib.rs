//! BillPay Audit - Tamper-evident audit trail
//!
//! Every financial action is recorded as an [`AuditRecord`]:
//! - Sensitive values are encrypted with the [`Vault`](billpay_security::Vault)
//! - Each record carries a SHA-256 `integrity_hash` and the previous record's hash
//! - Records are appended to a JSONL file and never rewritten

pub mod actions;
pub mod error;
pub mod hash;
pub mod logger;
pub mod record;

pub use error::{AuditError, AuditResult};
pub use hash::{calculate_record_hash, verify_chain, ChainError, GENESIS};
pub use logger::AuditLogger;
pub use record::AuditRecord;
