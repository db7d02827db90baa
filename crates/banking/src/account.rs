//! Linked bank account record

use billpay_core::new_id;
use billpay_store::Document;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::plaid::{BankAccount, MicroDeposit};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum VerificationStatus {
    #[default]
    Pending,
    MicroDepositsSent,
    Verified,
    Failed,
}

/// A user's bank account linked through the aggregation provider.
///
/// `access_token` and `mask` hold vault tokens, never clear values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedBankAccount {
    pub id: String,
    pub user_id: String,
    pub provider_account_id: String,
    pub item_id: String,
    pub access_token: String,
    pub mask: String,
    pub name: String,
    pub account_type: String,
    pub account_subtype: String,
    pub verification_status: VerificationStatus,
    pub micro_deposits_sent: bool,
    pub micro_deposit_id: Option<String>,
    pub verification_attempts: u32,
    pub linked_at: DateTime<Utc>,
}

impl LinkedBankAccount {
    /// Build from a provider account; token and mask must already be encrypted
    pub fn new(
        user_id: &str,
        item_id: &str,
        account: &BankAccount,
        encrypted_access_token: String,
        encrypted_mask: String,
    ) -> Self {
        Self {
            id: new_id(),
            user_id: user_id.to_string(),
            provider_account_id: account.account_id.clone(),
            item_id: item_id.to_string(),
            access_token: encrypted_access_token,
            mask: encrypted_mask,
            name: account.name.clone(),
            account_type: account.account_type.clone(),
            account_subtype: account.subtype.clone(),
            verification_status: VerificationStatus::Pending,
            micro_deposits_sent: false,
            micro_deposit_id: None,
            verification_attempts: 0,
            linked_at: Utc::now(),
        }
    }

    pub fn record_micro_deposits(&mut self, deposit: &MicroDeposit) {
        self.micro_deposits_sent = true;
        self.micro_deposit_id = Some(deposit.micro_deposit_id.clone());
        self.verification_status = VerificationStatus::MicroDepositsSent;
    }
}

impl Document for LinkedBankAccount {
    const COLLECTION: &'static str = "bank_accounts";

    fn id(&self) -> &str {
        &self.id
    }

    fn owner_id(&self) -> Option<&str> {
        Some(&self.user_id)
    }
}
