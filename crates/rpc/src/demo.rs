//! Demo data for local development
//!
//! Two users, the first with a spread of bills, payment methods and a short
//! payment history. Seeding again replaces the first user's data.

use billpay_core::{confirmation_number, new_id, Amount, TransactionStatus, TransactionType};
use billpay_payments::{NewBill, NewPaymentMethod, NewUser, PaymentError, Transaction, User};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::context::AppContext;

struct DemoUser {
    email: &'static str,
    password: &'static str,
    name: &'static str,
    phone: &'static str,
}

const DEMO_USERS: [DemoUser; 2] = [
    DemoUser {
        email: "demo@billpay.test",
        password: "demo123",
        name: "Demo User",
        phone: "+1-555-0123",
    },
    DemoUser {
        email: "test@billpay.test",
        password: "test123",
        name: "Test User",
        phone: "+1-555-0124",
    },
];

/// (biller, account, cents, due in days, type, description)
const DEMO_BILLS: [(&str, &str, i64, i64, &str, &str); 4] = [
    ("Spectrum Internet", "ACC-001234", 7999, 5, "telecom", "Monthly internet service"),
    ("ConEd Electric", "ELEC-567890", 15678, 12, "utility", "Monthly electricity bill"),
    ("State Farm Insurance", "INS-789012", 23450, 20, "insurance", "Auto insurance premium"),
    ("NYC Parking Authority", "PARK-345678", 4500, -2, "government", "Parking ticket fine"),
];

/// (cents, days ago) for settled payments on bills that are no longer listed
const DEMO_PAYMENTS: [(i64, i64); 2] = [(8999, 5), (12550, 12)];

#[derive(Debug, Clone, Serialize)]
pub struct SeedSummary {
    pub users: Vec<String>,
    pub bills: usize,
    pub payment_methods: usize,
    pub transactions: usize,
}

fn demo_user(ctx: &AppContext, demo: &DemoUser) -> Result<User, anyhow::Error> {
    let registered = ctx.users.register(NewUser {
        email: demo.email.to_string(),
        password: demo.password.to_string(),
        name: demo.name.to_string(),
        phone: Some(demo.phone.to_string()),
    });

    match registered {
        Ok(user) => Ok(user),
        Err(PaymentError::EmailTaken) => Ok(ctx.users.login(demo.email, demo.password)?),
        Err(e) => Err(e.into()),
    }
}

fn clear_user_data(ctx: &AppContext, user_id: &str) -> Result<(), anyhow::Error> {
    for bill in ctx.bills.list(user_id)? {
        ctx.bills.delete(user_id, &bill.id)?;
    }
    for method in ctx.methods.list(user_id)? {
        ctx.methods.delete(user_id, &method.id)?;
    }
    for transaction in ctx.store.find_by_owner::<Transaction>(user_id)? {
        ctx.store.delete::<Transaction>(&transaction.id)?;
    }
    Ok(())
}

pub fn seed(ctx: &AppContext) -> Result<SeedSummary, anyhow::Error> {
    let users = DEMO_USERS
        .iter()
        .map(|demo| demo_user(ctx, demo))
        .collect::<Result<Vec<_>, _>>()?;
    let owner = &users[0].id;

    clear_user_data(ctx, owner)?;

    let now = Utc::now();
    for (biller, account, cents, due_in, bill_type, description) in DEMO_BILLS {
        ctx.bills.create(
            owner,
            NewBill {
                biller_name: biller.to_string(),
                account_number: account.to_string(),
                amount: Decimal::new(cents, 2),
                due_date: now + Duration::days(due_in),
                bill_type: bill_type.to_string(),
                description: Some(description.to_string()),
            },
        )?;
    }
    ctx.bills.mark_overdue(now)?;

    let card = ctx.methods.create(
        owner,
        NewPaymentMethod {
            method_type: "credit_card".to_string(),
            card_number: Some("4000123412344567".to_string()),
            expiry_month: Some(12),
            expiry_year: Some(2030),
            is_default: true,
            ..Default::default()
        },
    )?;
    let bank = ctx.methods.create(
        owner,
        NewPaymentMethod {
            method_type: "bank_account".to_string(),
            bank_name: Some("Chase Bank".to_string()),
            account_type: Some("checking".to_string()),
            ..Default::default()
        },
    )?;
    ctx.methods.create(
        owner,
        NewPaymentMethod {
            method_type: "bitcoin".to_string(),
            bitcoin_address: Some("bc1q4y49r0x3v8kevysagjkjfesxgfnfqjd2rp0c90".to_string()),
            ..Default::default()
        },
    )?;

    for (i, ((cents, days_ago), method)) in DEMO_PAYMENTS.into_iter().zip([&card, &bank]).enumerate() {
        let amount = Amount::positive(Decimal::new(cents, 2))?;
        let assessment = ctx.infra.aml.assess(amount, TransactionType::BillPayment);

        ctx.store.insert(&Transaction {
            id: new_id(),
            user_id: owner.clone(),
            bill_id: format!("archived-bill-{}", i + 1),
            amount,
            payment_method_id: method.id.clone(),
            confirmation_number: confirmation_number("PAY", 4),
            transaction_type: TransactionType::BillPayment,
            status: TransactionStatus::Completed,
            risk_score: assessment.risk_score,
            risk_level: assessment.risk_level,
            compliance_flags: assessment.flags,
            timestamp: now - Duration::days(days_ago),
        })?;
    }

    let summary = SeedSummary {
        users: users.iter().map(|u| u.email.clone()).collect(),
        bills: ctx.bills.list(owner)?.len(),
        payment_methods: ctx.methods.count(owner)?,
        transactions: ctx.payments.history(owner)?.len(),
    };

    tracing::info!(
        user = %owner,
        bills = summary.bills,
        payment_methods = summary.payment_methods,
        transactions = summary.transactions,
        "Demo data seeded"
    );

    Ok(summary)
}
