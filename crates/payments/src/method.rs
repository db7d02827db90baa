//! Payment methods
//!
//! Card numbers and CVVs are never stored; a card keeps only its last four
//! digits and brand.

use std::str::FromStr;

use billpay_core::new_id;
use billpay_store::{Document, DocumentStore};
use billpay_wallet::is_valid_bitcoin_address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{PaymentError, PaymentResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MethodType {
    CreditCard,
    BankAccount,
    Bitcoin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub method_type: MethodType,
    pub last4: Option<String>,
    pub brand: Option<String>,
    pub expiry_month: Option<u32>,
    pub expiry_year: Option<u32>,
    pub bank_name: Option<String>,
    pub account_type: Option<String>,
    pub bitcoin_address: Option<String>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

impl Document for PaymentMethod {
    const COLLECTION: &'static str = "payment_methods";

    fn id(&self) -> &str {
        &self.id
    }

    fn owner_id(&self) -> Option<&str> {
        Some(&self.user_id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewPaymentMethod {
    #[serde(rename = "type")]
    pub method_type: String,
    pub card_number: Option<String>,
    pub expiry_month: Option<u32>,
    pub expiry_year: Option<u32>,
    pub cvv: Option<String>,
    pub bank_name: Option<String>,
    pub account_type: Option<String>,
    pub bitcoin_address: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

fn card_brand(card_number: &str) -> &'static str {
    if card_number.starts_with('4') {
        "Visa"
    } else {
        "Mastercard"
    }
}

fn card_digits(card_number: Option<&str>) -> PaymentResult<String> {
    let digits: String = card_number
        .unwrap_or_default()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-'))
        .collect();

    if !(12..=19).contains(&digits.len()) || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(PaymentError::Validation(
            "Card number must be 12 to 19 digits".to_string(),
        ));
    }

    Ok(digits)
}

pub struct PaymentMethodService {
    store: DocumentStore,
}

impl PaymentMethodService {
    pub fn new(store: DocumentStore) -> Self {
        Self { store }
    }

    pub fn create(&self, user_id: &str, new_method: NewPaymentMethod) -> PaymentResult<PaymentMethod> {
        let method_type = MethodType::from_str(&new_method.method_type).map_err(|_| {
            PaymentError::Validation(format!(
                "Payment method type must be one of credit_card, bank_account, bitcoin; got {}",
                new_method.method_type
            ))
        })?;

        let (last4, brand) = match method_type {
            MethodType::CreditCard => {
                let digits = card_digits(new_method.card_number.as_deref())?;
                let last4 = digits[digits.len() - 4..].to_string();
                (Some(last4), Some(card_brand(&digits).to_string()))
            }
            _ => (None, None),
        };

        if method_type == MethodType::Bitcoin {
            let address = new_method.bitcoin_address.as_deref().unwrap_or_default();
            if !is_valid_bitcoin_address(address) {
                return Err(PaymentError::Validation(format!(
                    "Invalid Bitcoin address: {}",
                    address
                )));
            }
        }

        if new_method.is_default {
            for mut other in self.list(user_id)?.into_iter().filter(|m| m.is_default) {
                other.is_default = false;
                self.store.save(&other)?;
            }
        }

        let method = PaymentMethod {
            id: new_id(),
            user_id: user_id.to_string(),
            method_type,
            last4,
            brand,
            expiry_month: new_method.expiry_month,
            expiry_year: new_method.expiry_year,
            bank_name: new_method.bank_name,
            account_type: new_method.account_type,
            bitcoin_address: new_method.bitcoin_address,
            is_default: new_method.is_default,
            created_at: Utc::now(),
        };

        self.store.insert(&method)?;
        tracing::info!(method = %method.id, user = user_id, kind = %method_type, "Payment method added");

        Ok(method)
    }

    pub fn list(&self, user_id: &str) -> PaymentResult<Vec<PaymentMethod>> {
        Ok(self.store.find_by_owner(user_id)?)
    }

    pub fn get(&self, user_id: &str, method_id: &str) -> PaymentResult<PaymentMethod> {
        self.store
            .get::<PaymentMethod>(method_id)?
            .filter(|m| m.user_id == user_id)
            .ok_or_else(|| PaymentError::NotFound("Payment method".to_string()))
    }

    pub fn delete(&self, user_id: &str, method_id: &str) -> PaymentResult<()> {
        let method = self.get(user_id, method_id)?;
        self.store.delete::<PaymentMethod>(&method.id)?;
        Ok(())
    }

    pub fn count(&self, user_id: &str) -> PaymentResult<usize> {
        Ok(self.store.count_by_owner::<PaymentMethod>(user_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> PaymentMethodService {
        PaymentMethodService::new(DocumentStore::in_memory().unwrap())
    }

    fn card(number: &str, is_default: bool) -> NewPaymentMethod {
        NewPaymentMethod {
            method_type: "credit_card".to_string(),
            card_number: Some(number.to_string()),
            expiry_month: Some(12),
            expiry_year: Some(2030),
            cvv: Some("123".to_string()),
            is_default,
            ..Default::default()
        }
    }

    #[test]
    fn test_card_keeps_last4_only() {
        let method = service().create("alice", card("4111 1111 1111 1111", false)).unwrap();

        assert_eq!(method.last4.as_deref(), Some("1111"));
        assert_eq!(method.brand.as_deref(), Some("Visa"));

        let json = serde_json::to_string(&method).unwrap();
        assert!(!json.contains("4111111111111111"));
        assert!(!json.contains("cvv"));
    }

    #[test]
    fn test_brand_only_for_cards() {
        let methods = service();
        let mc = methods.create("alice", card("5500000000000004", false)).unwrap();
        assert_eq!(mc.brand.as_deref(), Some("Mastercard"));

        let bank = methods
            .create(
                "alice",
                NewPaymentMethod {
                    method_type: "bank_account".to_string(),
                    bank_name: Some("Demo Bank".to_string()),
                    account_type: Some("checking".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(bank.brand.is_none());
        assert!(bank.last4.is_none());
    }

    #[test]
    fn test_card_validation() {
        let methods = service();
        assert!(methods.create("alice", card("4111", false)).is_err());
        assert!(methods.create("alice", card("4111abcd11111111", false)).is_err());

        let mut missing = card("", false);
        missing.card_number = None;
        assert!(matches!(methods.create("alice", missing), Err(PaymentError::Validation(_))));

        let mut paypal = card("4111111111111111", false);
        paypal.method_type = "paypal".to_string();
        assert!(methods.create("alice", paypal).is_err());
    }

    #[test]
    fn test_bitcoin_address_checked() {
        let methods = service();
        let btc = |addr: &str| NewPaymentMethod {
            method_type: "bitcoin".to_string(),
            bitcoin_address: Some(addr.to_string()),
            ..Default::default()
        };

        assert!(methods.create("alice", btc("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa")).is_ok());
        assert!(methods.create("alice", btc("not-an-address")).is_err());
    }

    #[test]
    fn test_single_default() {
        let methods = service();
        let first = methods.create("alice", card("4111111111111111", true)).unwrap();
        let second = methods.create("alice", card("5500000000000004", true)).unwrap();
        methods.create("bob", card("4111111111111111", true)).unwrap();

        assert!(!methods.get("alice", &first.id).unwrap().is_default);
        assert!(methods.get("alice", &second.id).unwrap().is_default);
        assert_eq!(methods.count("alice").unwrap(), 2);
        assert!(methods.list("bob").unwrap()[0].is_default);
    }

    #[test]
    fn test_delete_owner_scoped() {
        let methods = service();
        let method = methods.create("alice", card("4111111111111111", false)).unwrap();

        assert!(matches!(methods.delete("bob", &method.id), Err(PaymentError::NotFound(_))));
        methods.delete("alice", &method.id).unwrap();
        assert_eq!(methods.count("alice").unwrap(), 0);
    }
}
