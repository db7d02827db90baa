//! Bank account linking (Plaid)
//!
//! [`SandboxPlaid`] mirrors the Plaid API shapes without network calls.
//! Its accounts are derived from the access token, so the same token always
//! yields the same account ids.

use async_trait::async_trait;
use billpay_core::{new_id, random_hex};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum::Display;

use crate::error::{BankingError, BankingResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, Default)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PlaidEnvironment {
    #[default]
    Sandbox,
    Development,
    Production,
}

impl PlaidEnvironment {
    pub fn base_url(&self) -> &'static str {
        match self {
            PlaidEnvironment::Sandbox => "https://sandbox.api.plaid.com",
            PlaidEnvironment::Development => "https://development.api.plaid.com",
            PlaidEnvironment::Production => "https://api.plaid.com",
        }
    }
}

impl From<&str> for PlaidEnvironment {
    /// Unknown names fall back to sandbox
    fn from(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "development" => PlaidEnvironment::Development,
            "production" => PlaidEnvironment::Production,
            _ => PlaidEnvironment::Sandbox,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkToken {
    pub link_token: String,
    pub expiration: DateTime<Utc>,
    pub request_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenExchange {
    pub access_token: String,
    pub item_id: String,
    pub request_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountBalances {
    pub available: Option<Decimal>,
    pub current: Decimal,
    pub iso_currency_code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankAccount {
    pub account_id: String,
    pub name: String,
    pub official_name: Option<String>,
    #[serde(rename = "type")]
    pub account_type: String,
    pub subtype: String,
    pub mask: String,
    pub balances: AccountBalances,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MicroDeposit {
    pub micro_deposit_id: String,
    pub account_id: String,
    pub status: String,
    pub expected_completion: DateTime<Utc>,
}

/// Bank account aggregation provider
#[async_trait]
pub trait BankLinkProvider: Send + Sync {
    fn environment(&self) -> PlaidEnvironment;

    /// Token for the client-side Link flow
    async fn create_link_token(&self, user_id: &str) -> BankingResult<LinkToken>;

    /// Exchange the public token returned by Link for a long-lived access token
    async fn exchange_public_token(&self, public_token: &str) -> BankingResult<TokenExchange>;

    async fn get_accounts(&self, access_token: &str) -> BankingResult<Vec<BankAccount>>;

    async fn initiate_micro_deposits(
        &self,
        access_token: &str,
        account_id: &str,
    ) -> BankingResult<MicroDeposit>;
}

pub struct SandboxPlaid {
    client_id: String,
    environment: PlaidEnvironment,
}

impl SandboxPlaid {
    pub fn new(client_id: impl Into<String>, environment: PlaidEnvironment) -> Self {
        Self {
            client_id: client_id.into(),
            environment,
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn base_url(&self) -> &'static str {
        self.environment.base_url()
    }

    fn derived_account_id(access_token: &str) -> String {
        let digest = Sha256::digest(access_token.as_bytes());
        format!("account_{}", &hex::encode(digest)[..32])
    }
}

fn require_token(kind: &str, token: &str) -> BankingResult<()> {
    if token.trim().is_empty() {
        return Err(BankingError::InvalidToken(format!("{} is empty", kind)));
    }
    Ok(())
}

#[async_trait]
impl BankLinkProvider for SandboxPlaid {
    fn environment(&self) -> PlaidEnvironment {
        self.environment
    }

    async fn create_link_token(&self, user_id: &str) -> BankingResult<LinkToken> {
        require_token("user id", user_id)?;

        Ok(LinkToken {
            link_token: format!("link_token_{}", random_hex(16)),
            expiration: Utc::now() + Duration::hours(1),
            request_id: new_id(),
        })
    }

    async fn exchange_public_token(&self, public_token: &str) -> BankingResult<TokenExchange> {
        require_token("public token", public_token)?;

        Ok(TokenExchange {
            access_token: format!("access_token_{}", random_hex(32)),
            item_id: format!("item_{}", random_hex(16)),
            request_id: new_id(),
        })
    }

    async fn get_accounts(&self, access_token: &str) -> BankingResult<Vec<BankAccount>> {
        require_token("access token", access_token)?;

        let balance = Decimal::new(125_050, 2);
        Ok(vec![BankAccount {
            account_id: Self::derived_account_id(access_token),
            name: "Demo Checking Account".to_string(),
            official_name: Some("Demo Bank Checking Account".to_string()),
            account_type: "depository".to_string(),
            subtype: "checking".to_string(),
            mask: "1234".to_string(),
            balances: AccountBalances {
                available: Some(balance),
                current: balance,
                iso_currency_code: "USD".to_string(),
            },
        }])
    }

    async fn initiate_micro_deposits(
        &self,
        access_token: &str,
        account_id: &str,
    ) -> BankingResult<MicroDeposit> {
        require_token("access token", access_token)?;

        if account_id != Self::derived_account_id(access_token) {
            return Err(BankingError::AccountNotFound(account_id.to_string()));
        }

        let deposit = MicroDeposit {
            micro_deposit_id: format!("md_{}", random_hex(16)),
            account_id: account_id.to_string(),
            status: "initiated".to_string(),
            expected_completion: Utc::now() + Duration::days(1),
        };

        tracing::info!(
            micro_deposit_id = %deposit.micro_deposit_id,
            account_id,
            "Micro-deposits initiated"
        );

        Ok(deposit)
    }
}
