//! ACH processing for direct deposits and withdrawals

use billpay_compliance::AmlScreener;
use billpay_core::{new_id, Amount, TransactionType};
use billpay_security::Vault;
use billpay_store::Document;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{BankingError, BankingResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AchDirection {
    /// Money into the user's account
    AchCredit,
    /// Money out to an external account
    AchDebit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AchStatus {
    Pending,
    Processing,
    Settled,
    Returned,
}

/// Direct deposit instructions as entered by the user (clear values)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectDepositSetup {
    pub user_id: String,
    pub employer_name: String,
    pub routing_number: String,
    pub account_number: String,
    /// Share of each paycheck, 0 - 100
    pub deposit_percentage: Option<Decimal>,
    /// Fixed amount per paycheck
    pub deposit_amount: Option<Decimal>,
    pub effective_date: DateTime<Utc>,
}

impl DirectDepositSetup {
    pub fn validate(&self) -> BankingResult<()> {
        if self.routing_number.len() != 9 || !self.routing_number.chars().all(|c| c.is_ascii_digit())
        {
            return Err(BankingError::Validation(
                "Routing number must be 9 digits".to_string(),
            ));
        }

        if self.account_number.trim().len() < 4 {
            return Err(BankingError::Validation(
                "Account number must be at least 4 characters".to_string(),
            ));
        }

        if self.deposit_percentage.is_none() && self.deposit_amount.is_none() {
            return Err(BankingError::Validation(
                "Either deposit percentage or deposit amount is required".to_string(),
            ));
        }

        if let Some(pct) = self.deposit_percentage {
            if pct < Decimal::ZERO || pct > Decimal::ONE_HUNDRED {
                return Err(BankingError::Validation(
                    "Deposit percentage must be between 0 and 100".to_string(),
                ));
            }
        }

        if let Some(amount) = self.deposit_amount {
            if amount < Decimal::ZERO {
                return Err(BankingError::Validation(
                    "Deposit amount cannot be negative".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// ACH entry. `account_number` is a vault token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AchTransaction {
    pub transaction_id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub direction: AchDirection,
    pub amount: Amount,
    pub deposit_percentage: Option<Decimal>,
    pub employer_name: Option<String>,
    pub routing_number: Option<String>,
    pub account_number: String,
    pub effective_date: Option<DateTime<Utc>>,
    pub status: AchStatus,
    pub risk_score: Option<u32>,
    #[serde(default)]
    pub aml_flags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Document for AchTransaction {
    const COLLECTION: &'static str = "ach_transactions";

    fn id(&self) -> &str {
        &self.transaction_id
    }

    fn owner_id(&self) -> Option<&str> {
        Some(&self.user_id)
    }
}

/// Stored direct deposit instructions. `account_number` is a vault token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectDeposit {
    pub deposit_id: String,
    pub user_id: String,
    pub employer_name: String,
    pub routing_number: String,
    pub account_number: String,
    pub deposit_percentage: Option<Decimal>,
    pub deposit_amount: Option<Decimal>,
    pub effective_date: DateTime<Utc>,
    pub status: String,
    pub ach_transaction_id: String,
    pub created_at: DateTime<Utc>,
}

impl DirectDeposit {
    /// Record for a setup whose ACH credit has been initiated
    pub fn from_setup(setup: &DirectDepositSetup, credit: &AchTransaction) -> Self {
        Self {
            deposit_id: new_id(),
            user_id: setup.user_id.clone(),
            employer_name: setup.employer_name.clone(),
            routing_number: setup.routing_number.clone(),
            account_number: credit.account_number.clone(),
            deposit_percentage: setup.deposit_percentage,
            deposit_amount: setup.deposit_amount,
            effective_date: setup.effective_date,
            status: "pending_setup".to_string(),
            ach_transaction_id: credit.transaction_id.clone(),
            created_at: Utc::now(),
        }
    }
}

impl Document for DirectDeposit {
    const COLLECTION: &'static str = "direct_deposits";

    fn id(&self) -> &str {
        &self.deposit_id
    }

    fn owner_id(&self) -> Option<&str> {
        Some(&self.user_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedWithdrawal {
    pub transaction_id: String,
    pub user_id: String,
    pub reason: String,
    pub aml_flags: Vec<String>,
    pub risk_score: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalOutcome {
    Processed(AchTransaction),
    Blocked(BlockedWithdrawal),
}

impl WithdrawalOutcome {
    pub fn is_blocked(&self) -> bool {
        matches!(self, WithdrawalOutcome::Blocked(_))
    }

    pub fn transaction_id(&self) -> &str {
        match self {
            WithdrawalOutcome::Processed(tx) => &tx.transaction_id,
            WithdrawalOutcome::Blocked(b) => &b.transaction_id,
        }
    }
}

pub struct AchProcessor {
    vault: Vault,
    aml: AmlScreener,
}

impl AchProcessor {
    pub fn new(vault: Vault, aml: AmlScreener) -> Self {
        Self { vault, aml }
    }

    pub fn initiate_direct_deposit(&self, setup: &DirectDepositSetup) -> BankingResult<AchTransaction> {
        setup.validate()?;

        let amount = Amount::new(setup.deposit_amount.unwrap_or(Decimal::ZERO))
            .map_err(|e| BankingError::Validation(e.to_string()))?;

        let transaction = AchTransaction {
            transaction_id: new_id(),
            user_id: setup.user_id.clone(),
            direction: AchDirection::AchCredit,
            amount,
            deposit_percentage: setup.deposit_percentage,
            employer_name: Some(setup.employer_name.clone()),
            routing_number: Some(setup.routing_number.clone()),
            account_number: self.vault.encrypt(&setup.account_number)?,
            effective_date: Some(setup.effective_date),
            status: AchStatus::Pending,
            risk_score: None,
            aml_flags: Vec::new(),
            created_at: Utc::now(),
        };

        tracing::info!(
            transaction_id = %transaction.transaction_id,
            user = %transaction.user_id,
            "Direct deposit initiated"
        );

        Ok(transaction)
    }

    pub fn process_withdrawal(
        &self,
        user_id: &str,
        amount: Amount,
        destination_account: &str,
    ) -> BankingResult<WithdrawalOutcome> {
        if amount.is_zero() {
            return Err(BankingError::Validation(
                "Withdrawal amount must be greater than zero".to_string(),
            ));
        }

        let transaction_id = new_id();
        let assessment = self.aml.assess(amount, TransactionType::Withdrawal);

        if assessment.is_blocking() {
            tracing::warn!(%transaction_id, user = user_id, flags = ?assessment.flags, "Withdrawal blocked for AML");
            return Ok(WithdrawalOutcome::Blocked(BlockedWithdrawal {
                transaction_id,
                user_id: user_id.to_string(),
                reason: "AML compliance check failed".to_string(),
                aml_flags: assessment.flags,
                risk_score: assessment.risk_score,
            }));
        }

        let transaction = AchTransaction {
            transaction_id,
            user_id: user_id.to_string(),
            direction: AchDirection::AchDebit,
            amount,
            deposit_percentage: None,
            employer_name: None,
            routing_number: None,
            account_number: self.vault.encrypt(destination_account)?,
            effective_date: None,
            status: AchStatus::Processing,
            risk_score: Some(assessment.risk_score),
            aml_flags: assessment.flags,
            created_at: Utc::now(),
        };

        tracing::info!(
            transaction_id = %transaction.transaction_id,
            user = user_id,
            %amount,
            "Withdrawal processed"
        );

        Ok(WithdrawalOutcome::Processed(transaction))
    }
}
