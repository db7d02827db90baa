//! BillPay Security
//!
//! Cryptographic building blocks for the financial services:
//! - [`Vault`] - authenticated encryption of sensitive fields
//!   (account numbers, access tokens, document URLs)
//! - [`ReportSigner`] - Ed25519 signatures for reports and audit integrity
//! - [`PasswordHasher`] - PBKDF2-HMAC-SHA256 password storage
//! - [`KeyMaterial`] - load-or-create of the on-disk keys

pub mod error;
pub mod keys;
pub mod password;
pub mod signer;
pub mod vault;

pub use error::{SecurityError, SecurityResult};
pub use keys::KeyMaterial;
pub use password::PasswordHasher;
pub use signer::{verify_ed25519, DataSignature, ReportSigner, SignatureAlgorithm};
pub use vault::Vault;
