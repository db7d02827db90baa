//! BillPay Store - JSON documents in SQLite
//!
//! Every domain record (users, bills, payment methods, transactions, linked
//! accounts, KYC documents, wallets) is a [`Document`] kept as a JSON body
//! in a single `documents` table, keyed by collection and id.

pub mod document;
pub mod error;
pub mod store;

pub use document::Document;
pub use error::{StoreError, StoreResult};
pub use store::DocumentStore;
