//! Integration tests for BillPay
//!
//! These tests drive complete flows through the commands layer: users,
//! payments, compliance monitoring, banking, wallets and the audit trail.

use billpay_audit::{actions, AuditLogger};
use billpay_banking::{BankingError, DirectDeposit, DirectDepositSetup, WithdrawalOutcome};
use billpay_compliance::{ComplianceCheck, ComplianceConfig, ComplianceState};
use billpay_core::{KycStatus, RiskLevel, TransactionStatus};
use billpay_payments::{BillStatus, NewBill, NewPaymentMethod, NewUser, PaymentRequest};
use billpay_rpc::{commands, AppContext, PlatformConfig};
use billpay_security::{KeyMaterial, ReportSigner};
use billpay_wallet::{TransferStatus, WalletSigner};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tempfile::TempDir;

const BTC_ADDRESS: &str = "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa";

fn config() -> PlatformConfig {
    PlatformConfig {
        password_hash_iterations: 1_000,
        ..Default::default()
    }
}

fn new_user(email: &str) -> NewUser {
    NewUser {
        email: email.to_string(),
        password: "correct horse".to_string(),
        name: "Alice Example".to_string(),
        phone: None,
    }
}

fn water_bill(amount: Decimal, due_in_days: i64) -> NewBill {
    NewBill {
        biller_name: "City Water".to_string(),
        account_number: "W-1001".to_string(),
        amount,
        due_date: Utc::now() + Duration::days(due_in_days),
        bill_type: "utility".to_string(),
        description: None,
    }
}

fn card() -> NewPaymentMethod {
    NewPaymentMethod {
        method_type: "credit_card".to_string(),
        card_number: Some("4111111111111111".to_string()),
        expiry_month: Some(12),
        expiry_year: Some(2030),
        cvv: Some("123".to_string()),
        is_default: true,
        ..Default::default()
    }
}

async fn registered(ctx: &AppContext, email: &str) -> String {
    commands::register(ctx, new_user(email), Some(30))
        .await
        .unwrap()
        .user
        .id
}

/// Test: register -> login -> bill -> method -> pay -> dashboard
#[tokio::test]
async fn test_full_payment_workflow() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = AppContext::new(temp_dir.path(), config()).unwrap();

    let registration = commands::register(&ctx, new_user("Alice@Example.com"), Some(30))
        .await
        .unwrap();
    assert_eq!(registration.user.email, "alice@example.com");
    assert_eq!(registration.user.kyc_status, KycStatus::NotStarted);
    assert_eq!(registration.kyc_session.status, KycStatus::InProgress);
    let user_id = registration.user.id;

    let profile = commands::login(&ctx, "alice@example.com", "correct horse")
        .await
        .unwrap();
    assert_eq!(profile.id, user_id);
    assert!(commands::login(&ctx, "alice@example.com", "wrong").await.is_err());

    let bill = commands::add_bill(&ctx, &user_id, water_bill(dec!(120), 5))
        .await
        .unwrap();
    let overdue = commands::add_bill(&ctx, &user_id, water_bill(dec!(30), -2))
        .await
        .unwrap();
    let method = commands::add_payment_method(&ctx, &user_id, card()).await.unwrap();
    assert_eq!(method.last4.as_deref(), Some("1111"));

    let receipt = commands::pay_bill(
        &ctx,
        &user_id,
        &PaymentRequest {
            bill_id: bill.id.clone(),
            payment_method_id: method.id.clone(),
            amount: dec!(120),
        },
    )
    .await
    .unwrap();

    assert_eq!(receipt.transaction.status, TransactionStatus::Completed);
    assert!(receipt.transaction.confirmation_number.starts_with("PAY"));
    assert_eq!(receipt.compliance.compliance_status, ComplianceState::Cleared);

    // Paying again is refused
    let again = commands::pay_bill(
        &ctx,
        &user_id,
        &PaymentRequest {
            bill_id: bill.id.clone(),
            payment_method_id: method.id.clone(),
            amount: dec!(120),
        },
    )
    .await;
    assert!(again.is_err());

    let dashboard = commands::dashboard(&ctx, &user_id).await.unwrap();
    assert_eq!(dashboard.total_due, dec!(30));
    assert_eq!(dashboard.monthly_total, dec!(120));
    assert_eq!(dashboard.method_count, 1);
    assert_eq!(dashboard.recent_transactions.len(), 1);

    let bills = commands::list_bills(&ctx, &user_id).await.unwrap();
    let overdue = bills.iter().find(|b| b.id == overdue.id).unwrap();
    assert_eq!(overdue.status, BillStatus::Overdue);

    // Registration, two logins and the payment are on the audit trail
    let records = ctx.infra.audit.records().unwrap();
    let kinds: Vec<&str> = records.iter().map(|r| r.action_type.as_str()).collect();
    assert_eq!(
        kinds,
        vec![
            actions::USER_REGISTRATION,
            actions::LOGIN_SUCCESSFUL,
            actions::LOGIN_FAILED,
            actions::PAYMENT_COMPLETED,
        ]
    );
    assert_eq!(commands::verify_audit(&ctx).await.unwrap().records, 4);
}

/// Test: audit chain resumes across restarts and detects tampering
#[tokio::test]
async fn test_audit_chain_persists() {
    let temp_dir = TempDir::new().unwrap();

    {
        let ctx = AppContext::new(temp_dir.path(), config()).unwrap();
        registered(&ctx, "bob@example.com").await;
    }

    let ctx = AppContext::new(temp_dir.path(), config()).unwrap();
    commands::login(&ctx, "bob@example.com", "correct horse")
        .await
        .unwrap();

    let verification = commands::verify_audit(&ctx).await.unwrap();
    assert_eq!(verification.records, 2);
    assert_eq!(verification.retention_days, 2555);
    assert_eq!(verification.past_retention, 0);

    let records = ctx.infra.audit.records().unwrap();
    assert_eq!(records[1].prev_hash, records[0].integrity_hash);

    let audit_path = ctx.audit_path().unwrap().to_path_buf();
    drop(ctx);

    let content = std::fs::read_to_string(&audit_path).unwrap();
    std::fs::write(&audit_path, content.replace("bob@example.com", "eve@example.com")).unwrap();

    let keys = KeyMaterial::load_or_create(temp_dir.path().join("keys")).unwrap();
    assert!(AuditLogger::open(&audit_path, keys.vault).is_err());
    assert!(AppContext::new(temp_dir.path(), config()).is_err());
}

/// Test: records older than the retention window are reported, not dropped
#[tokio::test]
async fn test_audit_retention_window() {
    let ctx = AppContext::ephemeral(PlatformConfig {
        audit_retention_days: 0,
        ..config()
    })
    .unwrap();
    registered(&ctx, "dora@example.com").await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;

    let verification = commands::verify_audit(&ctx).await.unwrap();
    assert_eq!(verification.status, "verified");
    assert_eq!(verification.records, 1);
    assert_eq!(verification.past_retention, 1);
    assert!(verification.path.is_none());
}

/// Test: a sanctioned user's payment is recorded but held
#[tokio::test]
async fn test_sanctioned_payment_is_held() {
    let ctx = AppContext::ephemeral(config()).unwrap();
    let user_id = registered(&ctx, "carol@example.com").await;
    ctx.infra.sanctions.add(&user_id).unwrap();

    let bill = commands::add_bill(&ctx, &user_id, water_bill(dec!(15000), 10))
        .await
        .unwrap();
    let method = commands::add_payment_method(&ctx, &user_id, card()).await.unwrap();

    let receipt = commands::pay_bill(
        &ctx,
        &user_id,
        &PaymentRequest {
            bill_id: bill.id,
            payment_method_id: method.id,
            amount: dec!(15000),
        },
    )
    .await
    .unwrap();

    assert!(receipt.compliance.is_blocked());
    assert_eq!(
        receipt.compliance.flags,
        vec!["CTR_REQUIRED".to_string(), "OFAC_MATCH".to_string()]
    );
    assert_eq!(receipt.transaction.status, TransactionStatus::ComplianceHold);
    assert!(receipt
        .transaction
        .compliance_flags
        .contains(&"OFAC_MATCH".to_string()));

    let history = commands::payment_history(&ctx, &user_id).await.unwrap();
    assert_eq!(history[0].status, TransactionStatus::ComplianceHold);

    let status = commands::compliance_status(&ctx, &user_id).await.unwrap();
    assert_eq!(status.flagged_transactions, 1);
    assert!(status.compliance_score < 100);
}

/// Test: KYC documents drive the session and user status to approved
#[tokio::test]
async fn test_kyc_approval() {
    let ctx = AppContext::ephemeral(config()).unwrap();
    let user_id = registered(&ctx, "dave@example.com").await;

    let first =
        commands::upload_kyc_document(&ctx, &user_id, "drivers_license", "https://docs/dl.png")
            .await
            .unwrap();
    assert_eq!(first.kyc_status, KycStatus::InProgress);
    assert_eq!(first.outstanding_requirements.len(), 2);
    assert_ne!(first.document.document_url, "https://docs/dl.png");

    commands::upload_kyc_document(&ctx, &user_id, "utility_bill", "https://docs/bill.png")
        .await
        .unwrap();
    let last = commands::upload_kyc_document(&ctx, &user_id, "ssn_card", "https://docs/ssn.png")
        .await
        .unwrap();
    assert_eq!(last.kyc_status, KycStatus::Approved);
    assert!(last.outstanding_requirements.is_empty());

    assert_eq!(ctx.users.get(&user_id).unwrap().kyc_status, KycStatus::Approved);

    let status = commands::compliance_status(&ctx, &user_id).await.unwrap();
    assert_eq!(status.compliance_score, 100);
    assert_eq!(status.verified_documents, 3);
    assert!(status.compliance_issues.is_empty());

    assert!(commands::upload_kyc_document(&ctx, &user_id, "selfie", "https://docs/x.png")
        .await
        .is_err());
}

/// Test: underage applicants are registered at elevated risk
#[tokio::test]
async fn test_underage_registration() {
    let ctx = AppContext::ephemeral(config()).unwrap();
    let registration = commands::register(&ctx, new_user("teen@example.com"), Some(16))
        .await
        .unwrap();

    assert_eq!(registration.kyc_session.risk_assessment.risk_score, 60);
    assert_eq!(registration.user.risk_level, RiskLevel::Medium);
    assert!(registration
        .kyc_session
        .risk_assessment
        .factors
        .contains(&"UNDERAGE".to_string()));
}

/// Test: 2-of-3 wallet transfer collects signatures to broadcast readiness
#[tokio::test]
async fn test_multisig_signing_flow() {
    let ctx = AppContext::ephemeral(config()).unwrap();

    let keys: Vec<ReportSigner> = ["alice", "bob", "carol"]
        .into_iter()
        .map(ReportSigner::generate_for)
        .collect();
    let signers = keys
        .iter()
        .map(|k| WalletSigner {
            signer_id: k.signer_id().to_string(),
            public_key: k.public_key_hex(),
        })
        .collect();

    let wallet = commands::create_multisig_wallet(&ctx, "alice", signers, None, "treasury")
        .await
        .unwrap();
    assert_eq!(wallet.required_signatures, 2);
    assert!(wallet.wallet_address.starts_with("bc1q"));
    assert_eq!(commands::list_wallets(&ctx, "alice").await.unwrap().len(), 1);

    let transfer = commands::initiate_bitcoin_transfer(
        &ctx,
        "alice",
        &wallet.wallet_id,
        dec!(0.5),
        BTC_ADDRESS,
    )
    .await
    .unwrap();
    let tx_id = transfer.transaction_id.as_str();
    assert_eq!(transfer.status, TransferStatus::PendingSignatures);

    let signature = commands::sign_transfer_payload(&ctx, tx_id, &keys[0].seed_hex()).unwrap();
    let after_first = commands::sign_bitcoin_transfer(&ctx, "alice", tx_id, &signature)
        .await
        .unwrap();
    assert_eq!(after_first.signatures_remaining(), 1);

    // A signature made with another signer's key is refused
    let forged = commands::sign_transfer_payload(&ctx, tx_id, &keys[0].seed_hex()).unwrap();
    assert!(commands::sign_bitcoin_transfer(&ctx, "bob", tx_id, &forged)
        .await
        .is_err());

    let signature = commands::sign_transfer_payload(&ctx, tx_id, &keys[2].seed_hex()).unwrap();
    let ready = commands::sign_bitcoin_transfer(&ctx, "carol", tx_id, &signature)
        .await
        .unwrap();
    assert!(ready.ready_for_broadcast());
    assert_eq!(ready.status, TransferStatus::ReadyForBroadcast);

    // A second transfer is turned down by a signer
    let second = commands::initiate_bitcoin_transfer(
        &ctx,
        "bob",
        &wallet.wallet_id,
        dec!(2),
        BTC_ADDRESS,
    )
    .await
    .unwrap();
    let rejected = commands::reject_bitcoin_transfer(
        &ctx,
        "carol",
        &second.transaction_id,
        Some("amount too large"),
    )
    .await
    .unwrap();
    assert_eq!(rejected.status, TransferStatus::Rejected);
    assert!(commands::reject_bitcoin_transfer(&ctx, "alice", &second.transaction_id, None)
        .await
        .is_err());

    let kinds: Vec<String> = ctx
        .infra
        .audit
        .records()
        .unwrap()
        .into_iter()
        .map(|r| r.action_type)
        .collect();
    assert_eq!(
        kinds,
        vec![
            actions::MULTISIG_WALLET_CREATED,
            actions::BITCOIN_TRANSFER_INITIATED,
            actions::BITCOIN_TRANSFER_SIGNED,
            actions::BITCOIN_TRANSFER_SIGNED,
            actions::BITCOIN_TRANSFER_INITIATED,
            actions::BITCOIN_TRANSFER_REJECTED,
        ]
    );

    let rejection = ctx.infra.audit.records().unwrap().pop().unwrap();
    assert_eq!(rejection.user_id, "carol");
    assert_eq!(rejection.details["reason"], "amount too large");
}

/// Test: link an account, set up direct deposit, withdraw
#[tokio::test]
async fn test_banking_flows() {
    let ctx = AppContext::ephemeral(config()).unwrap();
    let user_id = registered(&ctx, "erin@example.com").await;

    let token = commands::create_link_token(&ctx, &user_id).await.unwrap();
    assert!(token.link_token.starts_with("link_token_"));

    let link = commands::link_bank_account(&ctx, &user_id, "public-sandbox-token", None)
        .await
        .unwrap();
    assert!(link.account.micro_deposits_sent);
    assert_ne!(link.account.mask, "1234");
    assert_eq!(ctx.infra.vault.decrypt(&link.account.mask).unwrap(), "1234");

    let missing =
        commands::link_bank_account(&ctx, &user_id, "public-sandbox-token", Some("acct_missing"))
            .await;
    let missing = missing.unwrap_err();
    assert!(matches!(
        missing.downcast_ref::<BankingError>(),
        Some(BankingError::AccountNotFound(id)) if id == "acct_missing"
    ));

    let deposit = commands::setup_direct_deposit(
        &ctx,
        &DirectDepositSetup {
            user_id: user_id.clone(),
            employer_name: "Acme Corp".to_string(),
            routing_number: "021000021".to_string(),
            account_number: "123456789".to_string(),
            deposit_percentage: Some(dec!(100)),
            deposit_amount: None,
            effective_date: Utc::now(),
        },
    )
    .await
    .unwrap();
    assert_eq!(deposit.status, "pending_setup");
    assert_eq!(ctx.store.find_by_owner::<DirectDeposit>(&user_id).unwrap().len(), 1);

    let outcome = commands::withdraw(&ctx, &user_id, dec!(250), "987654321")
        .await
        .unwrap();
    assert!(!outcome.is_blocked());

    // Sensitive values are only readable through the vault
    let records = ctx.infra.audit.records_for_user(&user_id).unwrap();
    let setup_record = records
        .iter()
        .find(|r| r.action_type == actions::DIRECT_DEPOSIT_SETUP)
        .unwrap();
    let sensitive = ctx.infra.audit.decrypt_sensitive(setup_record).unwrap();
    assert_eq!(sensitive["account_number"], "123456789");
}

/// Test: a critical-risk withdrawal is blocked and audited, not stored
#[tokio::test]
async fn test_withdrawal_blocked() {
    let strict = PlatformConfig {
        compliance: ComplianceConfig {
            ctr_score: 60,
            ..Default::default()
        },
        ..config()
    };
    let ctx = AppContext::ephemeral(strict).unwrap();
    let user_id = registered(&ctx, "frank@example.com").await;

    let outcome = commands::withdraw(&ctx, &user_id, dec!(25000), "987654321")
        .await
        .unwrap();

    let WithdrawalOutcome::Blocked(blocked) = outcome else {
        panic!("withdrawal should be blocked");
    };
    assert_eq!(blocked.risk_score, 75);
    assert_eq!(blocked.aml_flags, vec!["HIGH_AMOUNT_CTR", "ELEVATED_AMOUNT"]);

    let last = ctx.infra.audit.records().unwrap().pop().unwrap();
    assert_eq!(last.action_type, actions::WITHDRAWAL_BLOCKED);
    assert!(ctx
        .store
        .find_by_owner::<billpay_banking::AchTransaction>(&user_id)
        .unwrap()
        .is_empty());
}

/// Test: compliance history is restored on restart and reported
#[tokio::test]
async fn test_compliance_history_survives_restart() {
    let temp_dir = TempDir::new().unwrap();
    let user_id;

    {
        let ctx = AppContext::new(temp_dir.path(), config()).unwrap();
        user_id = registered(&ctx, "grace@example.com").await;
        let method = commands::add_payment_method(&ctx, &user_id, card()).await.unwrap();

        for amount in [dec!(50), dec!(12000)] {
            let bill = commands::add_bill(&ctx, &user_id, water_bill(amount, 3))
                .await
                .unwrap();
            commands::pay_bill(
                &ctx,
                &user_id,
                &PaymentRequest {
                    bill_id: bill.id,
                    payment_method_id: method.id.clone(),
                    amount,
                },
            )
            .await
            .unwrap();
        }
        assert_eq!(ctx.infra.monitor.history().unwrap().len(), 2);
    }

    let ctx = AppContext::new(temp_dir.path(), config()).unwrap();
    assert_eq!(ctx.infra.monitor.history().unwrap().len(), 2);
    assert_eq!(ctx.store.find_by_owner::<ComplianceCheck>(&user_id).unwrap().len(), 2);

    let end = Utc::now();
    let report = commands::compliance_report(&ctx, end - Duration::days(1), end)
        .await
        .unwrap();
    assert_eq!(report.total_transactions, 2);
    assert_eq!(report.flagged_transactions, 1);
    assert_eq!(report.ctr_reports_filed, 1);
    assert_eq!(report.compliance_score, dec!(50.0));
    billpay_compliance::verify_report(&report).unwrap();

    let last = ctx.infra.audit.records().unwrap().pop().unwrap();
    assert_eq!(last.action_type, actions::COMPLIANCE_REPORT_GENERATED);
}

/// Test: Lightning invoices are priced from USD and verified by hash
#[tokio::test]
async fn test_lightning_invoice() {
    let ctx = AppContext::ephemeral(config()).unwrap();

    let invoice = commands::create_lightning_invoice(&ctx, "alice", dec!(45), "coffee")
        .await
        .unwrap();
    assert_eq!(invoice.amount_sat, 100_000);

    let created = ctx.infra.audit.records().unwrap().pop().unwrap();
    assert_eq!(created.action_type, actions::LIGHTNING_INVOICE_CREATED);
    assert_eq!(created.user_id, "alice");
    assert_eq!(created.details["payment_hash"], invoice.payment_hash.as_str());
    assert_eq!(created.details["amount_sat"], 100_000);

    // Out-of-range amounts are refused without a record
    let huge: Decimal = "1000000000000000000000".parse().unwrap();
    assert!(commands::create_lightning_invoice(&ctx, "alice", huge, "too much")
        .await
        .is_err());
    assert_eq!(ctx.infra.audit.records().unwrap().len(), 1);

    let verification = commands::verify_lightning_payment(&ctx, &invoice.payment_hash)
        .await
        .unwrap();
    assert!(verification.settled);
    assert_eq!(verification.amount_paid_sat, 100_000);

    assert!(commands::verify_lightning_payment(&ctx, "deadbeef").await.is_err());
}

/// Test: init and health on a fresh data directory
#[tokio::test]
async fn test_init_and_health() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = AppContext::new(temp_dir.path(), config()).unwrap();

    let report = commands::init(&ctx).await.unwrap();
    assert_eq!(report.status, "initialized");

    let health = commands::health(&ctx).await.unwrap();
    assert!(health.is_healthy());
    assert_eq!(health.services["audit"]["records"], 0);
}

/// Test: seeded demo data drives the dashboard and survives a restart
#[tokio::test]
async fn test_seed_demo_data() {
    let temp_dir = TempDir::new().unwrap();

    {
        let ctx = AppContext::new(temp_dir.path(), config()).unwrap();
        let summary = commands::seed_demo_data(&ctx).await.unwrap();
        assert_eq!(summary.bills, 4);
        assert_eq!(summary.transactions, 2);
    }

    let ctx = AppContext::new(temp_dir.path(), config()).unwrap();
    let demo = commands::login(&ctx, "demo@billpay.test", "demo123").await.unwrap();

    let dashboard = commands::dashboard(&ctx, &demo.id).await.unwrap();
    assert_eq!(dashboard.total_due, dec!(516.27));
    assert_eq!(dashboard.method_count, 3);
    assert_eq!(dashboard.recent_transactions.len(), 2);
    assert_eq!(dashboard.recent_transactions[0].amount.value(), dec!(89.99));
}
