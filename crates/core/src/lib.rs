//! BillPay Core - Domain types
//!
//! Shared by every BillPay crate:
//! - `Amount`: Non-negative decimal wrapper for money
//! - `Currency`: Type-safe currency codes
//! - Status enums for transactions, KYC and risk
//! - Id and token helpers

pub mod amount;
pub mod currency;
pub mod ids;
pub mod status;

pub use amount::{Amount, AmountError};
pub use currency::{Currency, CurrencyError};
pub use ids::{confirmation_number, new_id, random_hex};
pub use status::{KycStatus, RiskLevel, TransactionStatus, TransactionType};
