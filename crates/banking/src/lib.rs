//! BillPay Banking
//!
//! - [`BankLinkProvider`] - Plaid-style account linking ([`SandboxPlaid`] stands in for the API)
//! - [`LinkedBankAccount`] - stored link with encrypted access token
//! - [`AchProcessor`] - direct deposit setup and AML-gated withdrawals

pub mod account;
pub mod ach;
pub mod error;
pub mod plaid;

pub use account::{LinkedBankAccount, VerificationStatus};
pub use ach::{
    AchDirection, AchProcessor, AchStatus, AchTransaction, BlockedWithdrawal, DirectDeposit,
    DirectDepositSetup, WithdrawalOutcome,
};
pub use error::{BankingError, BankingResult};
pub use plaid::{
    AccountBalances, BankAccount, BankLinkProvider, LinkToken, MicroDeposit, PlaidEnvironment,
    SandboxPlaid, TokenExchange,
};
