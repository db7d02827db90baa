//! BillPay Wallets
//!
//! - [`MultisigManager`] - N-of-M wallets whose transfers need N Ed25519 signatures
//! - [`LightningNode`] - simulated Lightning invoices priced from USD
//! - [`is_valid_bitcoin_address`] - address format check shared with payment methods

pub mod address;
pub mod error;
pub mod lightning;
pub mod multisig;

pub use address::is_valid_bitcoin_address;
pub use error::{WalletError, WalletResult};
pub use lightning::{default_btc_usd_rate, LightningInvoice, LightningNode, PaymentVerification};
pub use multisig::{
    CollectedSignature, MultisigManager, MultisigTransfer, MultisigWallet, TransferStatus,
    WalletSigner,
};
