//! BillPay CLI - Main entry point

use std::path::PathBuf;

use billpay_banking::DirectDepositSetup;
use billpay_payments::{BillStatus, BillUpdate, NewBill, NewPaymentMethod, NewUser, PaymentRequest};
use billpay_rpc::{commands, AppContext, PlatformConfig};
use billpay_security::ReportSigner;
use billpay_wallet::WalletSigner;
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "billpay")]
#[command(about = "BillPay - bill payments with compliance, banking and Bitcoin rails", long_about = None)]
struct Cli {
    /// Data directory path (falls back to BILLPAY_DATA_DIR, then ./data)
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// JSON file overlaid on the environment configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate configuration and initialize the infrastructure
    Init,

    /// Probe every financial service
    Health,

    /// Generate an Ed25519 signer key
    Keygen {
        /// Signer id recorded alongside the key
        #[arg(long, default_value = "SYSTEM")]
        signer_id: String,
        /// Output file for the hex seed
        #[arg(long, default_value = "signer.key")]
        output: PathBuf,
    },

    /// Verify the audit hash chain
    Audit,

    /// Load demo users, bills, payment methods and payments
    Seed,

    /// Register a user and open their KYC session
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        age: Option<u32>,
    },

    /// Authenticate a user
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },

    /// Manage bills
    Bill {
        #[command(subcommand)]
        action: BillAction,
    },

    /// Manage payment methods
    Method {
        #[command(subcommand)]
        action: MethodAction,
    },

    /// Pay a bill
    Pay {
        user: String,
        #[arg(long)]
        bill: String,
        #[arg(long)]
        method: String,
        #[arg(long)]
        amount: Decimal,
    },

    /// Payment history, newest first
    History { user: String },

    /// Dashboard metrics
    Dashboard { user: String },

    /// Bank linking and ACH
    Bank {
        #[command(subcommand)]
        action: BankAction,
    },

    /// Multisig wallets
    Wallet {
        #[command(subcommand)]
        action: WalletAction,
    },

    /// Lightning invoices
    Lightning {
        #[command(subcommand)]
        action: LightningAction,
    },

    /// KYC and compliance
    Kyc {
        #[command(subcommand)]
        action: KycAction,
    },

    /// Generate a signed compliance report
    Report {
        /// Period start (RFC 3339); defaults to 30 days ago
        #[arg(long)]
        start: Option<DateTime<Utc>>,
        /// Period end (RFC 3339); defaults to now
        #[arg(long)]
        end: Option<DateTime<Utc>>,
    },
}

#[derive(Subcommand)]
enum BillAction {
    Add {
        user: String,
        #[arg(long)]
        biller: String,
        #[arg(long)]
        account_number: String,
        #[arg(long)]
        amount: Decimal,
        /// Due date (RFC 3339)
        #[arg(long)]
        due: DateTime<Utc>,
        /// utility, telecom, insurance or government
        #[arg(long)]
        bill_type: String,
        #[arg(long)]
        description: Option<String>,
    },
    List {
        user: String,
    },
    Update {
        user: String,
        bill: String,
        #[arg(long)]
        amount: Option<Decimal>,
        #[arg(long)]
        due: Option<DateTime<Utc>>,
        #[arg(long)]
        status: Option<BillStatus>,
        #[arg(long)]
        description: Option<String>,
    },
    Delete {
        user: String,
        bill: String,
    },
}

#[derive(Subcommand)]
enum MethodAction {
    Add {
        user: String,
        /// credit_card, bank_account or bitcoin
        #[arg(long = "type")]
        method_type: String,
        #[arg(long)]
        card_number: Option<String>,
        #[arg(long)]
        expiry_month: Option<u32>,
        #[arg(long)]
        expiry_year: Option<u32>,
        #[arg(long)]
        bank_name: Option<String>,
        #[arg(long)]
        account_type: Option<String>,
        #[arg(long)]
        bitcoin_address: Option<String>,
        #[arg(long)]
        default: bool,
    },
    List {
        user: String,
    },
    Delete {
        user: String,
        method: String,
    },
}

#[derive(Subcommand)]
enum BankAction {
    /// Create a Link token for the client flow
    LinkToken { user: String },
    /// Exchange a public token and link an account
    Link {
        user: String,
        #[arg(long)]
        public_token: String,
        /// Provider account id; the first account when omitted
        #[arg(long)]
        account_id: Option<String>,
    },
    /// Set up payroll direct deposit
    DirectDeposit {
        user: String,
        #[arg(long)]
        employer: String,
        #[arg(long)]
        routing_number: String,
        #[arg(long)]
        account_number: String,
        #[arg(long)]
        percentage: Option<Decimal>,
        #[arg(long)]
        amount: Option<Decimal>,
        /// Effective date (RFC 3339); defaults to now
        #[arg(long)]
        effective: Option<DateTime<Utc>>,
    },
    /// ACH withdrawal
    Withdraw {
        user: String,
        #[arg(long)]
        amount: Decimal,
        #[arg(long)]
        destination: String,
    },
}

#[derive(Subcommand)]
enum WalletAction {
    Create {
        creator: String,
        /// Signer as `id:public_key_hex`, repeatable
        #[arg(long = "signer", value_parser = parse_signer, required = true)]
        signers: Vec<WalletSigner>,
        /// Defaults to the configured threshold
        #[arg(long)]
        required: Option<usize>,
        #[arg(long, default_value = "general")]
        purpose: String,
    },
    List {
        user: String,
    },
    /// Start a transfer awaiting signatures
    Transfer {
        initiator: String,
        #[arg(long)]
        wallet: String,
        #[arg(long)]
        amount_btc: Decimal,
        #[arg(long)]
        destination: String,
    },
    /// Sign a transfer with a signature or a key file
    Sign {
        signer: String,
        #[arg(long)]
        transfer: String,
        #[arg(long, conflicts_with = "key_file", required_unless_present = "key_file")]
        signature: Option<String>,
        #[arg(long)]
        key_file: Option<PathBuf>,
    },
    Reject {
        signer: String,
        #[arg(long)]
        transfer: String,
        #[arg(long)]
        reason: Option<String>,
    },
}

#[derive(Subcommand)]
enum LightningAction {
    Invoice {
        user: String,
        #[arg(long)]
        amount_usd: Decimal,
        #[arg(long, default_value = "")]
        memo: String,
    },
    Verify {
        payment_hash: String,
    },
}

#[derive(Subcommand)]
enum KycAction {
    /// Submit a KYC document
    Upload {
        user: String,
        /// drivers_license, passport, ssn_card, utility_bill or bank_statement
        #[arg(long)]
        document_type: String,
        #[arg(long)]
        url: String,
    },
    /// Compliance score and open issues
    Status { user: String },
}

fn parse_signer(value: &str) -> Result<WalletSigner, String> {
    let (id, key) = value
        .split_once(':')
        .ok_or_else(|| format!("expected id:public_key, got {}", value))?;
    Ok(WalletSigner {
        signer_id: id.to_string(),
        public_key: key.to_string(),
    })
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries JSON results
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Keygen { signer_id, output } = &cli.command {
        let signer = ReportSigner::generate_for(signer_id.clone());
        std::fs::write(output, signer.seed_hex())?;
        return print_json(&serde_json::json!({
            "signer_id": signer.signer_id(),
            "public_key": signer.public_key_hex(),
            "key_file": output.display().to_string(),
        }));
    }

    let config = PlatformConfig::load(cli.config.as_deref())?;
    let data_dir = cli
        .data
        .clone()
        .or_else(|| config.data_dir.clone())
        .unwrap_or_else(|| PathBuf::from("./data"));

    let ctx = AppContext::new(&data_dir, config)?;

    match cli.command {
        Commands::Keygen { .. } => {}

        Commands::Init => print_json(&commands::init(&ctx).await?)?,

        Commands::Health => print_json(&commands::health(&ctx).await?)?,

        Commands::Audit => print_json(&commands::verify_audit(&ctx).await?)?,

        Commands::Seed => print_json(&commands::seed_demo_data(&ctx).await?)?,

        Commands::Register {
            email,
            password,
            name,
            phone,
            age,
        } => {
            let new_user = NewUser {
                email,
                password,
                name,
                phone,
            };
            print_json(&commands::register(&ctx, new_user, age).await?)?;
        }

        Commands::Login { email, password } => {
            print_json(&commands::login(&ctx, &email, &password).await?)?;
        }

        Commands::Bill { action } => match action {
            BillAction::Add {
                user,
                biller,
                account_number,
                amount,
                due,
                bill_type,
                description,
            } => {
                let bill = NewBill {
                    biller_name: biller,
                    account_number,
                    amount,
                    due_date: due,
                    bill_type,
                    description,
                };
                print_json(&commands::add_bill(&ctx, &user, bill).await?)?;
            }
            BillAction::List { user } => print_json(&commands::list_bills(&ctx, &user).await?)?,
            BillAction::Update {
                user,
                bill,
                amount,
                due,
                status,
                description,
            } => {
                let update = BillUpdate {
                    amount,
                    due_date: due,
                    status,
                    description,
                    ..Default::default()
                };
                print_json(&commands::update_bill(&ctx, &user, &bill, update).await?)?;
            }
            BillAction::Delete { user, bill } => {
                commands::delete_bill(&ctx, &user, &bill).await?;
                print_json(&serde_json::json!({ "deleted": bill }))?;
            }
        },

        Commands::Method { action } => match action {
            MethodAction::Add {
                user,
                method_type,
                card_number,
                expiry_month,
                expiry_year,
                bank_name,
                account_type,
                bitcoin_address,
                default,
            } => {
                let method = NewPaymentMethod {
                    method_type,
                    card_number,
                    expiry_month,
                    expiry_year,
                    cvv: None,
                    bank_name,
                    account_type,
                    bitcoin_address,
                    is_default: default,
                };
                print_json(&commands::add_payment_method(&ctx, &user, method).await?)?;
            }
            MethodAction::List { user } => {
                print_json(&commands::list_payment_methods(&ctx, &user).await?)?;
            }
            MethodAction::Delete { user, method } => {
                commands::delete_payment_method(&ctx, &user, &method).await?;
                print_json(&serde_json::json!({ "deleted": method }))?;
            }
        },

        Commands::Pay {
            user,
            bill,
            method,
            amount,
        } => {
            let request = PaymentRequest {
                bill_id: bill,
                payment_method_id: method,
                amount,
            };
            print_json(&commands::pay_bill(&ctx, &user, &request).await?)?;
        }

        Commands::History { user } => print_json(&commands::payment_history(&ctx, &user).await?)?,

        Commands::Dashboard { user } => print_json(&commands::dashboard(&ctx, &user).await?)?,

        Commands::Bank { action } => match action {
            BankAction::LinkToken { user } => {
                print_json(&commands::create_link_token(&ctx, &user).await?)?;
            }
            BankAction::Link {
                user,
                public_token,
                account_id,
            } => {
                let link =
                    commands::link_bank_account(&ctx, &user, &public_token, account_id.as_deref())
                        .await?;
                print_json(&link)?;
            }
            BankAction::DirectDeposit {
                user,
                employer,
                routing_number,
                account_number,
                percentage,
                amount,
                effective,
            } => {
                let setup = DirectDepositSetup {
                    user_id: user,
                    employer_name: employer,
                    routing_number,
                    account_number,
                    deposit_percentage: percentage,
                    deposit_amount: amount,
                    effective_date: effective.unwrap_or_else(Utc::now),
                };
                print_json(&commands::setup_direct_deposit(&ctx, &setup).await?)?;
            }
            BankAction::Withdraw {
                user,
                amount,
                destination,
            } => {
                print_json(&commands::withdraw(&ctx, &user, amount, &destination).await?)?;
            }
        },

        Commands::Wallet { action } => match action {
            WalletAction::Create {
                creator,
                signers,
                required,
                purpose,
            } => {
                let wallet =
                    commands::create_multisig_wallet(&ctx, &creator, signers, required, &purpose)
                        .await?;
                print_json(&wallet)?;
            }
            WalletAction::List { user } => print_json(&commands::list_wallets(&ctx, &user).await?)?,
            WalletAction::Transfer {
                initiator,
                wallet,
                amount_btc,
                destination,
            } => {
                let transfer = commands::initiate_bitcoin_transfer(
                    &ctx,
                    &initiator,
                    &wallet,
                    amount_btc,
                    &destination,
                )
                .await?;
                print_json(&transfer)?;
            }
            WalletAction::Sign {
                signer,
                transfer,
                signature,
                key_file,
            } => {
                let signature = match (signature, key_file) {
                    (Some(signature), _) => signature,
                    (None, Some(path)) => {
                        let seed = std::fs::read_to_string(path)?;
                        commands::sign_transfer_payload(&ctx, &transfer, &seed)?
                    }
                    (None, None) => anyhow::bail!("Provide --signature or --key-file"),
                };
                let transfer =
                    commands::sign_bitcoin_transfer(&ctx, &signer, &transfer, &signature).await?;
                print_json(&transfer)?;
            }
            WalletAction::Reject {
                signer,
                transfer,
                reason,
            } => {
                let transfer =
                    commands::reject_bitcoin_transfer(&ctx, &signer, &transfer, reason.as_deref())
                        .await?;
                print_json(&transfer)?;
            }
        },

        Commands::Lightning { action } => match action {
            LightningAction::Invoice {
                user,
                amount_usd,
                memo,
            } => {
                print_json(&commands::create_lightning_invoice(&ctx, &user, amount_usd, &memo).await?)?;
            }
            LightningAction::Verify { payment_hash } => {
                print_json(&commands::verify_lightning_payment(&ctx, &payment_hash).await?)?;
            }
        },

        Commands::Kyc { action } => match action {
            KycAction::Upload {
                user,
                document_type,
                url,
            } => {
                let upload = commands::upload_kyc_document(&ctx, &user, &document_type, &url).await?;
                print_json(&upload)?;
            }
            KycAction::Status { user } => {
                print_json(&commands::compliance_status(&ctx, &user).await?)?;
            }
        },

        Commands::Report { start, end } => {
            let end = end.unwrap_or_else(Utc::now);
            let start = start.unwrap_or_else(|| end - Duration::days(30));
            print_json(&commands::compliance_report(&ctx, start, end).await?)?;
        }
    }

    Ok(())
}
