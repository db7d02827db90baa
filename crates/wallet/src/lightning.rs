//! Simulated Lightning Network invoices
//!
//! Invoices are priced in USD and converted to satoshis at a fixed rate.
//! Payment is simulated: a known invoice settles instantly until it expires.

use billpay_core::random_hex;
use billpay_store::{Document, DocumentStore};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{WalletError, WalletResult};

const SATS_PER_BTC: i64 = 100_000_000;
const INVOICE_EXPIRY_SECS: i64 = 3600;

/// Default BTC/USD conversion rate
pub fn default_btc_usd_rate() -> Decimal {
    Decimal::new(45_000, 0)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightningInvoice {
    pub payment_hash: String,
    pub payment_request: String,
    pub amount_sat: u64,
    pub amount_usd: Decimal,
    pub memo: String,
    pub user_id: String,
    /// Hex preimage; revealed on settlement
    pub preimage: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl LightningInvoice {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

impl Document for LightningInvoice {
    const COLLECTION: &'static str = "lightning_invoices";

    fn id(&self) -> &str {
        &self.payment_hash
    }

    fn owner_id(&self) -> Option<&str> {
        Some(&self.user_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentVerification {
    pub payment_hash: String,
    pub settled: bool,
    pub amount_paid_sat: u64,
    pub settle_date: Option<DateTime<Utc>>,
    pub memo: String,
}

pub struct LightningNode {
    store: DocumentStore,
    btc_usd_rate: Decimal,
}

impl LightningNode {
    pub fn new(store: DocumentStore) -> Self {
        Self {
            store,
            btc_usd_rate: default_btc_usd_rate(),
        }
    }

    pub fn with_rate(mut self, btc_usd_rate: Decimal) -> Self {
        self.btc_usd_rate = btc_usd_rate;
        self
    }

    pub fn btc_usd_rate(&self) -> Decimal {
        self.btc_usd_rate
    }

    /// USD to satoshis, rounded down
    pub fn usd_to_sats(&self, amount_usd: Decimal) -> WalletResult<u64> {
        if self.btc_usd_rate <= Decimal::ZERO {
            return Err(WalletError::InvalidAmount(format!(
                "BTC/USD rate must be positive, got {}",
                self.btc_usd_rate
            )));
        }

        amount_usd
            .checked_mul(Decimal::from(SATS_PER_BTC))
            .and_then(|sats| sats.checked_div(self.btc_usd_rate))
            .and_then(|sats| sats.floor().to_u64())
            .ok_or_else(|| {
                WalletError::InvalidAmount(format!("{} USD is out of range", amount_usd))
            })
    }

    pub fn create_invoice(
        &self,
        user_id: &str,
        amount_usd: Decimal,
        memo: &str,
    ) -> WalletResult<LightningInvoice> {
        if amount_usd <= Decimal::ZERO {
            return Err(WalletError::InvalidAmount(
                "Invoice amount must be greater than zero".to_string(),
            ));
        }

        let amount_sat = self.usd_to_sats(amount_usd)?;
        let preimage = random_hex(32);
        let payment_hash = hex::encode(Sha256::digest(preimage.as_bytes()));

        let now = Utc::now();
        let invoice = LightningInvoice {
            payment_request: format!("lnbc{}u1p{}", amount_sat, random_hex(25)),
            payment_hash,
            amount_sat,
            amount_usd,
            memo: memo.to_string(),
            user_id: user_id.to_string(),
            preimage,
            created_at: now,
            expires_at: now + Duration::seconds(INVOICE_EXPIRY_SECS),
        };

        self.store.insert(&invoice)?;

        tracing::info!(
            payment_hash = %invoice.payment_hash,
            amount_sat,
            user = user_id,
            "Lightning invoice created"
        );

        Ok(invoice)
    }

    pub fn verify_payment(&self, payment_hash: &str) -> WalletResult<PaymentVerification> {
        self.verify_payment_at(payment_hash, Utc::now())
    }

    pub fn verify_payment_at(
        &self,
        payment_hash: &str,
        now: DateTime<Utc>,
    ) -> WalletResult<PaymentVerification> {
        let invoice = self
            .store
            .get::<LightningInvoice>(payment_hash)?
            .ok_or_else(|| WalletError::InvoiceNotFound(payment_hash.to_string()))?;

        let settled = !invoice.is_expired_at(now);

        Ok(PaymentVerification {
            payment_hash: invoice.payment_hash,
            settled,
            amount_paid_sat: if settled { invoice.amount_sat } else { 0 },
            settle_date: settled.then_some(now),
            memo: invoice.memo,
        })
    }
}
