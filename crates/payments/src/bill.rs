//! Bills

use std::str::FromStr;

use billpay_core::{new_id, Amount};
use billpay_store::{Document, DocumentStore};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{PaymentError, PaymentResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BillType {
    Utility,
    Telecom,
    Insurance,
    Government,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BillStatus {
    Pending,
    Paid,
    Overdue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bill {
    pub id: String,
    pub user_id: String,
    pub biller_name: String,
    pub account_number: String,
    pub amount: Amount,
    pub due_date: DateTime<Utc>,
    pub status: BillStatus,
    pub bill_type: BillType,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Bill {
    /// Pending or overdue
    pub fn is_unpaid(&self) -> bool {
        self.status != BillStatus::Paid
    }
}

impl Document for Bill {
    const COLLECTION: &'static str = "bills";

    fn id(&self) -> &str {
        &self.id
    }

    fn owner_id(&self) -> Option<&str> {
        Some(&self.user_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBill {
    pub biller_name: String,
    pub account_number: String,
    pub amount: Decimal,
    pub due_date: DateTime<Utc>,
    pub bill_type: String,
    pub description: Option<String>,
}

/// Partial update; `None` fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BillUpdate {
    pub biller_name: Option<String>,
    pub account_number: Option<String>,
    pub amount: Option<Decimal>,
    pub due_date: Option<DateTime<Utc>>,
    pub status: Option<BillStatus>,
    pub description: Option<String>,
}

fn bill_amount(value: Decimal) -> PaymentResult<Amount> {
    Amount::positive(value).map_err(|_| {
        PaymentError::Validation("Bill amount must be greater than zero".to_string())
    })
}

fn biller_name(name: &str) -> PaymentResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(PaymentError::Validation("Biller name is required".to_string()));
    }
    Ok(name.to_string())
}

pub struct BillService {
    store: DocumentStore,
}

impl BillService {
    pub fn new(store: DocumentStore) -> Self {
        Self { store }
    }

    pub fn create(&self, user_id: &str, new_bill: NewBill) -> PaymentResult<Bill> {
        let bill_type = BillType::from_str(&new_bill.bill_type).map_err(|_| {
            PaymentError::Validation(format!(
                "Bill type must be one of utility, telecom, insurance, government; got {}",
                new_bill.bill_type
            ))
        })?;

        let bill = Bill {
            id: new_id(),
            user_id: user_id.to_string(),
            biller_name: biller_name(&new_bill.biller_name)?,
            account_number: new_bill.account_number,
            amount: bill_amount(new_bill.amount)?,
            due_date: new_bill.due_date,
            status: BillStatus::Pending,
            bill_type,
            description: new_bill.description,
            created_at: Utc::now(),
        };

        self.store.insert(&bill)?;
        tracing::info!(bill = %bill.id, user = user_id, amount = %bill.amount, "Bill created");

        Ok(bill)
    }

    pub fn list(&self, user_id: &str) -> PaymentResult<Vec<Bill>> {
        Ok(self.store.find_by_owner(user_id)?)
    }

    /// A bill owned by `user_id`
    pub fn get(&self, user_id: &str, bill_id: &str) -> PaymentResult<Bill> {
        self.store
            .get::<Bill>(bill_id)?
            .filter(|b| b.user_id == user_id)
            .ok_or_else(|| PaymentError::NotFound("Bill".to_string()))
    }

    pub fn update(&self, user_id: &str, bill_id: &str, update: BillUpdate) -> PaymentResult<Bill> {
        let mut bill = self.get(user_id, bill_id)?;

        if let Some(name) = update.biller_name {
            bill.biller_name = biller_name(&name)?;
        }
        if let Some(account_number) = update.account_number {
            bill.account_number = account_number;
        }
        if let Some(amount) = update.amount {
            bill.amount = bill_amount(amount)?;
        }
        if let Some(due_date) = update.due_date {
            bill.due_date = due_date;
        }
        if let Some(status) = update.status {
            bill.status = status;
        }
        if let Some(description) = update.description {
            bill.description = Some(description);
        }

        self.store.save(&bill)?;
        Ok(bill)
    }

    pub fn delete(&self, user_id: &str, bill_id: &str) -> PaymentResult<()> {
        let bill = self.get(user_id, bill_id)?;
        self.store.delete::<Bill>(&bill.id)?;
        Ok(())
    }

    /// Pending or overdue to paid, in one store transaction
    pub(crate) fn mark_paid(&self, user_id: &str, bill_id: &str) -> PaymentResult<Bill> {
        self.store
            .update(bill_id, |bill: &mut Bill| {
                if bill.user_id != user_id {
                    return Err(PaymentError::NotFound("Bill".to_string()));
                }
                if bill.status == BillStatus::Paid {
                    return Err(PaymentError::InvalidState(format!(
                        "Bill {} is already paid",
                        bill.id
                    )));
                }
                bill.status = BillStatus::Paid;
                Ok(())
            })?
            .ok_or_else(|| PaymentError::NotFound("Bill".to_string()))
    }

    /// Move pending bills past their due date to overdue. Returns how many changed.
    pub fn mark_overdue(&self, now: DateTime<Utc>) -> PaymentResult<usize> {
        let late = self
            .store
            .find_where(|b: &Bill| b.status == BillStatus::Pending && b.due_date < now)?;

        let mut changed = 0;
        for bill in &late {
            let mut moved = false;
            self.store.update(&bill.id, |bill: &mut Bill| {
                // Skip bills paid since the scan
                if bill.status == BillStatus::Pending && bill.due_date < now {
                    bill.status = BillStatus::Overdue;
                    moved = true;
                }
                Ok::<_, PaymentError>(())
            })?;
            if moved {
                changed += 1;
            }
        }

        if changed > 0 {
            tracing::info!(count = changed, "Bills marked overdue");
        }

        Ok(changed)
    }
}
