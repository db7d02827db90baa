//! Multisignature wallets
//!
//! A wallet has M signers (Ed25519 public keys) and a threshold N. A transfer
//! out of the wallet waits in `pending_signatures` until N distinct signers
//! have signed its [`MultisigTransfer::signing_payload`].

use std::collections::HashSet;

use billpay_core::{new_id, Amount};
use billpay_security::verify_ed25519;
use billpay_store::{Document, DocumentStore};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum::{Display, EnumString};

use crate::address::is_valid_bitcoin_address;
use crate::error::{WalletError, WalletResult};

const ADDRESS_LEN: usize = 58;
const DEFAULT_EXPIRY_HOURS: i64 = 24;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSigner {
    pub signer_id: String,
    /// Ed25519 public key (hex-encoded)
    pub public_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultisigWallet {
    pub wallet_id: String,
    pub wallet_address: String,
    pub required_signatures: usize,
    pub total_signers: usize,
    pub signers: Vec<WalletSigner>,
    pub purpose: String,
    pub created_by: String,
    pub creation_date: DateTime<Utc>,
    pub balance: Decimal,
    pub is_active: bool,
}

impl MultisigWallet {
    pub fn signer(&self, signer_id: &str) -> Option<&WalletSigner> {
        self.signers.iter().find(|s| s.signer_id == signer_id)
    }

    pub fn has_signer(&self, signer_id: &str) -> bool {
        self.signer(signer_id).is_some()
    }
}

impl Document for MultisigWallet {
    const COLLECTION: &'static str = "multisig_wallets";

    fn id(&self) -> &str {
        &self.wallet_id
    }

    fn owner_id(&self) -> Option<&str> {
        Some(&self.created_by)
    }
}

/// Status of a multisig transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransferStatus {
    /// Awaiting required signatures
    PendingSignatures,
    /// Threshold reached
    ReadyForBroadcast,
    Rejected,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectedSignature {
    pub signer_id: String,
    pub signature: String,
    pub signed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultisigTransfer {
    pub transaction_id: String,
    pub wallet_id: String,
    /// Amount in BTC
    pub amount: Amount,
    pub destination_address: String,
    pub initiator: String,
    pub signatures_required: usize,
    pub signatures_collected: Vec<CollectedSignature>,
    pub status: TransferStatus,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl MultisigTransfer {
    /// Bytes each signer signs
    pub fn signing_payload(&self) -> Vec<u8> {
        format!(
            "billpay-multisig-v1|{}|{}|{}|{}",
            self.transaction_id, self.wallet_id, self.amount, self.destination_address
        )
        .into_bytes()
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    pub fn has_enough_signatures(&self) -> bool {
        self.signatures_collected.len() >= self.signatures_required
    }

    pub fn signatures_remaining(&self) -> usize {
        self.signatures_required
            .saturating_sub(self.signatures_collected.len())
    }

    pub fn ready_for_broadcast(&self) -> bool {
        self.status == TransferStatus::ReadyForBroadcast
    }
}

impl Document for MultisigTransfer {
    const COLLECTION: &'static str = "multisig_transfers";

    fn id(&self) -> &str {
        &self.transaction_id
    }

    fn owner_id(&self) -> Option<&str> {
        Some(&self.initiator)
    }
}

/// Deterministic pseudo-address committing to the policy
fn policy_address(required: usize, signers: &[WalletSigner]) -> String {
    let mut keys: Vec<&str> = signers.iter().map(|s| s.public_key.as_str()).collect();
    keys.sort_unstable();

    let policy = format!("{}-of-{}:{}", required, signers.len(), keys.join(","));
    let digest = hex::encode(Sha256::digest(policy.as_bytes()));

    let mut address = format!("bc1q{}", digest);
    address.truncate(ADDRESS_LEN);
    address
}

/// Multi-signature wallet workflow
pub struct MultisigManager {
    store: DocumentStore,
    expiry_hours: i64,
}

impl MultisigManager {
    pub fn new(store: DocumentStore) -> Self {
        Self {
            store,
            expiry_hours: DEFAULT_EXPIRY_HOURS,
        }
    }

    pub fn with_expiry_hours(mut self, hours: i64) -> Self {
        self.expiry_hours = hours;
        self
    }

    pub fn create_multisig_wallet(
        &self,
        signers: Vec<WalletSigner>,
        required_signatures: usize,
        purpose: &str,
        creator: &str,
    ) -> WalletResult<MultisigWallet> {
        if signers.len() < 2 {
            return Err(WalletError::InvalidPolicy(
                "At least 2 signers are required".to_string(),
            ));
        }

        if required_signatures < 2 {
            return Err(WalletError::InvalidPolicy(
                "At least 2 signatures must be required".to_string(),
            ));
        }

        if required_signatures > signers.len() {
            return Err(WalletError::InvalidPolicy(
                "Required signatures cannot exceed number of signers".to_string(),
            ));
        }

        let unique: HashSet<&str> = signers.iter().map(|s| s.signer_id.as_str()).collect();
        if unique.len() != signers.len() {
            return Err(WalletError::InvalidPolicy(
                "Signer ids must be unique".to_string(),
            ));
        }

        if !unique.contains(creator) {
            return Err(WalletError::InvalidPolicy(
                "Creator must be one of the signers".to_string(),
            ));
        }

        for signer in &signers {
            let valid_key = hex::decode(&signer.public_key).is_ok_and(|b| b.len() == 32);
            if !valid_key {
                return Err(WalletError::InvalidPolicy(format!(
                    "Invalid public key for signer {}",
                    signer.signer_id
                )));
            }
        }

        let wallet = MultisigWallet {
            wallet_id: new_id(),
            wallet_address: policy_address(required_signatures, &signers),
            required_signatures,
            total_signers: signers.len(),
            signers,
            purpose: purpose.to_string(),
            created_by: creator.to_string(),
            creation_date: Utc::now(),
            balance: Decimal::ZERO,
            is_active: true,
        };

        self.store.insert(&wallet)?;

        tracing::info!(
            wallet_id = %wallet.wallet_id,
            policy = %format!("{}-of-{}", wallet.required_signatures, wallet.total_signers),
            "Multisig wallet created"
        );

        Ok(wallet)
    }

    /// Wallets where `user_id` is a signer
    pub fn wallets_for(&self, user_id: &str) -> WalletResult<Vec<MultisigWallet>> {
        Ok(self
            .store
            .find_where(|w: &MultisigWallet| w.has_signer(user_id))?)
    }

    fn wallet_for_signer(&self, wallet_id: &str, signer_id: &str) -> WalletResult<MultisigWallet> {
        self.store
            .get::<MultisigWallet>(wallet_id)?
            .filter(|w| w.is_active && w.has_signer(signer_id))
            .ok_or_else(|| WalletError::NotFound(format!("wallet {}", wallet_id)))
    }

    pub fn initiate_transaction(
        &self,
        wallet_id: &str,
        amount_btc: Decimal,
        destination_address: &str,
        initiator: &str,
    ) -> WalletResult<MultisigTransfer> {
        let wallet = self.wallet_for_signer(wallet_id, initiator)?;

        if !is_valid_bitcoin_address(destination_address) {
            return Err(WalletError::InvalidAddress(destination_address.to_string()));
        }

        let amount =
            Amount::positive(amount_btc).map_err(|e| WalletError::InvalidAmount(e.to_string()))?;

        let now = Utc::now();
        let transfer = MultisigTransfer {
            transaction_id: new_id(),
            wallet_id: wallet.wallet_id.clone(),
            amount,
            destination_address: destination_address.to_string(),
            initiator: initiator.to_string(),
            signatures_required: wallet.required_signatures,
            signatures_collected: Vec::new(),
            status: TransferStatus::PendingSignatures,
            rejection_reason: None,
            created_at: now,
            expires_at: now + Duration::hours(self.expiry_hours),
        };

        self.store.insert(&transfer)?;

        tracing::info!(
            transaction_id = %transfer.transaction_id,
            wallet_id,
            %amount,
            "Multisig transaction initiated"
        );

        Ok(transfer)
    }

    /// Get a transfer, marking it expired if its deadline has passed
    pub fn get_transfer(&self, transaction_id: &str) -> WalletResult<MultisigTransfer> {
        let transfer = self
            .store
            .get::<MultisigTransfer>(transaction_id)?
            .ok_or_else(|| WalletError::NotFound(format!("transfer {}", transaction_id)))?;

        if transfer.status == TransferStatus::PendingSignatures && transfer.is_expired() {
            return self.modify(transaction_id, |transfer| {
                if transfer.status == TransferStatus::PendingSignatures {
                    transfer.status = TransferStatus::Expired;
                }
                Ok(())
            });
        }

        Ok(transfer)
    }

    /// Apply a change to a stored transfer atomically
    fn modify<F>(&self, transaction_id: &str, apply: F) -> WalletResult<MultisigTransfer>
    where
        F: FnOnce(&mut MultisigTransfer) -> WalletResult<()>,
    {
        self.store
            .update(transaction_id, apply)?
            .ok_or_else(|| WalletError::NotFound(format!("transfer {}", transaction_id)))
    }

    /// Add a signer's signature. The transfer becomes ready for broadcast once
    /// the wallet threshold is met.
    pub fn sign_transaction(
        &self,
        transaction_id: &str,
        signer_id: &str,
        signature_hex: &str,
    ) -> WalletResult<MultisigTransfer> {
        let current = self.get_transfer(transaction_id)?;
        let wallet = self.wallet_for_signer(&current.wallet_id, signer_id)?;
        let signer = wallet
            .signer(signer_id)
            .ok_or_else(|| WalletError::NotFound(format!("signer {}", signer_id)))?;

        let transfer = self.modify(transaction_id, |transfer| {
            ensure_pending(transfer)?;

            if transfer
                .signatures_collected
                .iter()
                .any(|s| s.signer_id == signer_id)
            {
                return Err(WalletError::DuplicateSignature(signer_id.to_string()));
            }

            verify_ed25519(
                signer_id,
                &signer.public_key,
                &transfer.signing_payload(),
                signature_hex,
            )?;

            transfer.signatures_collected.push(CollectedSignature {
                signer_id: signer_id.to_string(),
                signature: signature_hex.to_string(),
                signed_at: Utc::now(),
            });

            if transfer.has_enough_signatures() {
                transfer.status = TransferStatus::ReadyForBroadcast;
            }
            Ok(())
        })?;

        tracing::info!(
            transaction_id,
            signer = signer_id,
            collected = transfer.signatures_collected.len(),
            required = transfer.signatures_required,
            "Transaction signed"
        );

        Ok(transfer)
    }

    pub fn reject_transaction(
        &self,
        transaction_id: &str,
        signer_id: &str,
        reason: Option<&str>,
    ) -> WalletResult<MultisigTransfer> {
        let current = self.get_transfer(transaction_id)?;
        self.wallet_for_signer(&current.wallet_id, signer_id)?;

        let transfer = self.modify(transaction_id, |transfer| {
            ensure_pending(transfer)?;
            transfer.status = TransferStatus::Rejected;
            transfer.rejection_reason = reason.map(|s| s.to_string());
            Ok(())
        })?;

        tracing::info!(transaction_id, signer = signer_id, "Transaction rejected");

        Ok(transfer)
    }
}

fn ensure_pending(transfer: &MultisigTransfer) -> WalletResult<()> {
    match transfer.status {
        TransferStatus::PendingSignatures if transfer.is_expired() => {
            Err(WalletError::Expired(transfer.transaction_id.clone()))
        }
        TransferStatus::PendingSignatures => Ok(()),
        TransferStatus::Expired => Err(WalletError::Expired(transfer.transaction_id.clone())),
        other => Err(WalletError::NotPending(other.to_string())),
    }
}
