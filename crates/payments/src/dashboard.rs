//! Dashboard metrics

use billpay_core::Amount;
use billpay_store::DocumentStore;
use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::bill::Bill;
use crate::error::{PaymentError, PaymentResult};
use crate::method::PaymentMethod;
use crate::payment::{PaymentService, Transaction};

const RECENT_TRANSACTIONS: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardMetrics {
    /// Pending plus overdue bills
    pub total_due: Decimal,
    pub next_due_date: Option<DateTime<Utc>>,
    /// Payments made in the current UTC calendar month
    pub monthly_total: Decimal,
    pub method_count: usize,
    pub recent_transactions: Vec<Transaction>,
}

fn same_month(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.year() == b.year() && a.month() == b.month()
}

fn total<I: IntoIterator<Item = Amount>>(amounts: I, what: &str) -> PaymentResult<Decimal> {
    Amount::checked_sum(amounts)
        .map(|sum| sum.value())
        .ok_or_else(|| PaymentError::Validation(format!("Dashboard {} overflows", what)))
}

pub fn dashboard_metrics(
    store: &DocumentStore,
    payments: &PaymentService,
    user_id: &str,
    now: DateTime<Utc>,
) -> PaymentResult<DashboardMetrics> {
    let unpaid: Vec<Bill> = store
        .find_by_owner::<Bill>(user_id)?
        .into_iter()
        .filter(Bill::is_unpaid)
        .collect();

    let total_due = total(unpaid.iter().map(|b| b.amount), "total due")?;
    let next_due_date = unpaid.iter().map(|b| b.due_date).min();

    let history = payments.history(user_id)?;
    let monthly_total = total(
        history
            .iter()
            .filter(|t| same_month(t.timestamp, now))
            .map(|t| t.amount),
        "monthly total",
    )?;

    Ok(DashboardMetrics {
        total_due,
        next_due_date,
        monthly_total,
        method_count: store.count_by_owner::<PaymentMethod>(user_id)?,
        recent_transactions: history.into_iter().take(RECENT_TRANSACTIONS).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bill::{BillService, NewBill};
    use crate::method::{NewPaymentMethod, PaymentMethodService};
    use crate::payment::PaymentRequest;
    use billpay_compliance::AmlScreener;
    use billpay_store::Document;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn bill(amount: Decimal, due_in_days: i64) -> NewBill {
        NewBill {
            biller_name: "Metro Telecom".to_string(),
            account_number: "T-9".to_string(),
            amount,
            due_date: Utc::now() + Duration::days(due_in_days),
            bill_type: "telecom".to_string(),
            description: None,
        }
    }

    #[test]
    fn test_empty_dashboard() {
        let store = DocumentStore::in_memory().unwrap();
        let payments = PaymentService::new(store.clone(), AmlScreener::default());
        let metrics = dashboard_metrics(&store, &payments, "alice", Utc::now()).unwrap();

        assert_eq!(metrics.total_due, Decimal::ZERO);
        assert!(metrics.next_due_date.is_none());
        assert_eq!(metrics.method_count, 0);
        assert!(metrics.recent_transactions.is_empty());
    }

    #[test]
    fn test_dashboard_metrics() {
        let store = DocumentStore::in_memory().unwrap();
        let bills = BillService::new(store.clone());
        let methods = PaymentMethodService::new(store.clone());
        let payments = PaymentService::new(store.clone(), AmlScreener::default());

        let overdue = bills.create("alice", bill(dec!(40), -3)).unwrap();
        let soon = bills.create("alice", bill(dec!(60), 2)).unwrap();
        let later = bills.create("alice", bill(dec!(100), 20)).unwrap();
        bills.mark_overdue(Utc::now()).unwrap();

        let method = methods
            .create(
                "alice",
                NewPaymentMethod {
                    method_type: "bank_account".to_string(),
                    ..Default::default()
                },
            )
            .unwrap();

        payments
            .process_payment(
                "alice",
                &PaymentRequest {
                    bill_id: later.id.clone(),
                    payment_method_id: method.id.clone(),
                    amount: dec!(100),
                },
            )
            .unwrap();

        let metrics = dashboard_metrics(&store, &payments, "alice", Utc::now()).unwrap();

        // Overdue 40 + pending 60
        assert_eq!(metrics.total_due, dec!(100));
        assert_eq!(metrics.next_due_date, Some(bills.get("alice", &overdue.id).unwrap().due_date));
        assert_ne!(metrics.next_due_date, Some(soon.due_date));
        assert_eq!(metrics.monthly_total, dec!(100));
        assert_eq!(metrics.method_count, 1);
        assert_eq!(metrics.recent_transactions.len(), 1);
    }

    #[test]
    fn test_overflowing_total_is_an_error() {
        let store = DocumentStore::in_memory().unwrap();
        let bills = BillService::new(store.clone());
        let payments = PaymentService::new(store.clone(), AmlScreener::default());

        let huge: Decimal = "50000000000000000000000000000".parse().unwrap();
        bills.create("alice", bill(huge, 5)).unwrap();
        bills.create("alice", bill(huge, 6)).unwrap();

        assert!(matches!(
            dashboard_metrics(&store, &payments, "alice", Utc::now()),
            Err(PaymentError::Validation(_))
        ));
    }

    #[test]
    fn test_monthly_total_uses_calendar_month() {
        let store = DocumentStore::in_memory().unwrap();
        let payments = PaymentService::new(store.clone(), AmlScreener::default());

        let tx = |id: &str, ts: DateTime<Utc>| Transaction {
            id: id.to_string(),
            user_id: "alice".to_string(),
            bill_id: "b".to_string(),
            amount: billpay_core::Amount::new(dec!(10)).unwrap(),
            payment_method_id: "m".to_string(),
            confirmation_number: "PAY00000000".to_string(),
            transaction_type: billpay_core::TransactionType::BillPayment,
            status: billpay_core::TransactionStatus::Completed,
            risk_score: 0,
            risk_level: billpay_core::RiskLevel::Low,
            compliance_flags: vec![],
            timestamp: ts,
        };

        let now = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        for (i, ts) in [
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 14, 9, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 59).unwrap(),
            Utc.with_ymd_and_hms(2023, 3, 10, 0, 0, 0).unwrap(),
        ]
        .into_iter()
        .enumerate()
        {
            store.insert(&tx(&format!("tx-{}", i), ts)).unwrap();
        }

        for i in 4..10 {
            store
                .insert(&tx(&format!("old-{}", i), now - Duration::days(400 + i)))
                .unwrap();
        }

        let metrics = dashboard_metrics(&store, &payments, "alice", now).unwrap();
        assert_eq!(metrics.monthly_total, dec!(20));
        assert_eq!(metrics.recent_transactions.len(), 5);
        assert_eq!(metrics.recent_transactions[0].id(), "tx-1");
    }
}
