//! Bill payment processing
//!
//! Flow: ownership checks -> AML assessment -> mark bill paid -> record transaction

use billpay_compliance::{AmlScreener, ComplianceFlagged};
use billpay_core::{confirmation_number, new_id, Amount, RiskLevel, TransactionStatus, TransactionType};
use billpay_store::{Document, DocumentStore};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::bill::{BillService, BillStatus};
use crate::error::{PaymentError, PaymentResult};
use crate::method::PaymentMethodService;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub bill_id: String,
    pub payment_method_id: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    pub bill_id: String,
    pub amount: Amount,
    pub payment_method_id: String,
    pub confirmation_number: String,
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub risk_score: u32,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub compliance_flags: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl Document for Transaction {
    const COLLECTION: &'static str = "transactions";

    fn id(&self) -> &str {
        &self.id
    }

    fn owner_id(&self) -> Option<&str> {
        Some(&self.user_id)
    }
}

impl ComplianceFlagged for Transaction {
    fn compliance_flags(&self) -> &[String] {
        &self.compliance_flags
    }
}

pub struct PaymentService {
    store: DocumentStore,
    bills: BillService,
    methods: PaymentMethodService,
    aml: AmlScreener,
}

impl PaymentService {
    pub fn new(store: DocumentStore, aml: AmlScreener) -> Self {
        Self {
            bills: BillService::new(store.clone()),
            methods: PaymentMethodService::new(store.clone()),
            store,
            aml,
        }
    }

    pub fn process_payment(&self, user_id: &str, request: &PaymentRequest) -> PaymentResult<Transaction> {
        let amount = Amount::positive(request.amount).map_err(|_| {
            PaymentError::Validation("Payment amount must be greater than zero".to_string())
        })?;

        let bill = self.bills.get(user_id, &request.bill_id)?;
        let method = self.methods.get(user_id, &request.payment_method_id)?;

        if bill.status == BillStatus::Paid {
            return Err(PaymentError::InvalidState(format!(
                "Bill {} is already paid",
                bill.id
            )));
        }

        let assessment = self.aml.assess(amount, TransactionType::BillPayment);
        if assessment.is_blocking() {
            tracing::warn!(
                user = user_id,
                bill = %bill.id,
                flags = ?assessment.flags,
                "Payment blocked for AML"
            );
            return Err(PaymentError::ComplianceBlocked {
                reason: "AML compliance check failed".to_string(),
                flags: assessment.flags,
            });
        }

        // Re-checked atomically; a concurrent payment may have won
        let bill = self.bills.mark_paid(user_id, &bill.id)?;

        let transaction = Transaction {
            id: new_id(),
            user_id: user_id.to_string(),
            bill_id: bill.id.clone(),
            amount,
            payment_method_id: method.id.clone(),
            confirmation_number: confirmation_number("PAY", 4),
            transaction_type: TransactionType::BillPayment,
            status: TransactionStatus::Completed,
            risk_score: assessment.risk_score,
            risk_level: assessment.risk_level,
            compliance_flags: assessment.flags,
            timestamp: Utc::now(),
        };

        self.store.insert(&transaction)?;

        tracing::info!(
            transaction = %transaction.id,
            confirmation = %transaction.confirmation_number,
            user = user_id,
            %amount,
            "Bill payment completed"
        );

        Ok(transaction)
    }

    /// Merge post-payment monitoring flags into a transaction. A held
    /// transaction moves to `compliance_hold`.
    pub fn record_compliance_review(
        &self,
        transaction: &mut Transaction,
        flags: &[String],
        hold: bool,
    ) -> PaymentResult<()> {
        for flag in flags {
            if !transaction.compliance_flags.contains(flag) {
                transaction.compliance_flags.push(flag.clone());
            }
        }

        if hold {
            transaction.status = TransactionStatus::ComplianceHold;
            tracing::warn!(transaction = %transaction.id, "Transaction placed on compliance hold");
        }

        self.store.save(transaction)?;
        Ok(())
    }

    /// The user's transactions, newest first
    pub fn history(&self, user_id: &str) -> PaymentResult<Vec<Transaction>> {
        let mut transactions: Vec<Transaction> = self.store.find_by_owner(user_id)?;
        transactions.reverse();
        transactions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(transactions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bill::NewBill;
    use crate::method::NewPaymentMethod;
    use billpay_compliance::ComplianceConfig;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    struct Fixture {
        payments: PaymentService,
        bills: BillService,
        bill_id: String,
        method_id: String,
    }

    fn fixture_with(aml: AmlScreener) -> Fixture {
        let store = DocumentStore::in_memory().unwrap();
        let bills = BillService::new(store.clone());
        let methods = PaymentMethodService::new(store.clone());

        let bill = bills
            .create(
                "alice",
                NewBill {
                    biller_name: "City Water".to_string(),
                    account_number: "W-42".to_string(),
                    amount: dec!(75),
                    due_date: Utc::now() + Duration::days(3),
                    bill_type: "utility".to_string(),
                    description: None,
                },
            )
            .unwrap();
        let method = methods
            .create(
                "alice",
                NewPaymentMethod {
                    method_type: "credit_card".to_string(),
                    card_number: Some("4111111111111111".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        Fixture {
            payments: PaymentService::new(store, aml),
            bills,
            bill_id: bill.id,
            method_id: method.id,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(AmlScreener::default())
    }

    fn request(f: &Fixture, amount: Decimal) -> PaymentRequest {
        PaymentRequest {
            bill_id: f.bill_id.clone(),
            payment_method_id: f.method_id.clone(),
            amount,
        }
    }

    #[test]
    fn test_process_payment() {
        let f = fixture();
        let tx = f.payments.process_payment("alice", &request(&f, dec!(75))).unwrap();

        assert_eq!(tx.status, TransactionStatus::Completed);
        assert!(tx.confirmation_number.starts_with("PAY"));
        assert_eq!(tx.confirmation_number.len(), 11);
        assert_eq!(tx.risk_score, 0);
        assert!(!tx.is_flagged());
        assert_eq!(f.bills.get("alice", &f.bill_id).unwrap().status, BillStatus::Paid);
        assert_eq!(f.payments.history("alice").unwrap().len(), 1);
    }

    #[test]
    fn test_bill_cannot_be_paid_twice() {
        let f = fixture();
        f.payments.process_payment("alice", &request(&f, dec!(75))).unwrap();

        assert!(matches!(
            f.payments.process_payment("alice", &request(&f, dec!(75))),
            Err(PaymentError::InvalidState(_))
        ));
        assert_eq!(f.payments.history("alice").unwrap().len(), 1);
    }

    #[test]
    fn test_concurrent_payments_settle_once() {
        for _ in 0..10 {
            let f = fixture();
            let req = request(&f, dec!(75));

            let outcomes: Vec<PaymentResult<Transaction>> = std::thread::scope(|scope| {
                let handles: Vec<_> = (0..2)
                    .map(|_| scope.spawn(|| f.payments.process_payment("alice", &req)))
                    .collect();
                handles.into_iter().map(|h| h.join().unwrap()).collect()
            });

            assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 1);
            assert!(outcomes
                .iter()
                .any(|o| matches!(o, Err(PaymentError::InvalidState(_)))));
            assert_eq!(f.payments.history("alice").unwrap().len(), 1);
        }
    }

    #[test]
    fn test_ownership_enforced() {
        let f = fixture();
        assert!(matches!(
            f.payments.process_payment("bob", &request(&f, dec!(75))),
            Err(PaymentError::NotFound(_))
        ));

        let mut bad_method = request(&f, dec!(75));
        bad_method.payment_method_id = "missing".to_string();
        assert!(matches!(
            f.payments.process_payment("alice", &bad_method),
            Err(PaymentError::NotFound(_))
        ));
    }

    #[test]
    fn test_zero_amount_rejected() {
        let f = fixture();
        assert!(matches!(
            f.payments.process_payment("alice", &request(&f, dec!(0))),
            Err(PaymentError::Validation(_))
        ));
    }

    #[test]
    fn test_elevated_payment_is_flagged() {
        let f = fixture();
        let tx = f.payments.process_payment("alice", &request(&f, dec!(5000))).unwrap();

        assert_eq!(tx.risk_score, 15);
        assert_eq!(tx.compliance_flags, vec!["ELEVATED_AMOUNT"]);
        assert!(tx.is_flagged());
    }

    #[test]
    fn test_record_compliance_review() {
        let f = fixture();
        let mut tx = f.payments.process_payment("alice", &request(&f, dec!(5000))).unwrap();

        f.payments
            .record_compliance_review(
                &mut tx,
                &["ELEVATED_AMOUNT".to_string(), "OFAC_MATCH".to_string()],
                true,
            )
            .unwrap();

        let stored = &f.payments.history("alice").unwrap()[0];
        assert_eq!(stored.status, TransactionStatus::ComplianceHold);
        assert_eq!(stored.compliance_flags, vec!["ELEVATED_AMOUNT", "OFAC_MATCH"]);
    }

    #[test]
    fn test_blocked_payment_leaves_bill_unpaid() {
        let config = ComplianceConfig {
            ctr_score: 60,
            ..Default::default()
        };
        let f = fixture_with(AmlScreener::new(config));

        let err = f
            .payments
            .process_payment("alice", &request(&f, dec!(20000)))
            .unwrap_err();
        assert!(matches!(err, PaymentError::ComplianceBlocked { .. }));
        assert_eq!(f.bills.get("alice", &f.bill_id).unwrap().status, BillStatus::Pending);
        assert!(f.payments.history("alice").unwrap().is_empty());
    }
}
