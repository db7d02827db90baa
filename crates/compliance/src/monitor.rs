//! Transaction monitoring and regulatory reporting

use std::sync::{Arc, Mutex};

use billpay_core::{new_id, Amount, Currency, RiskLevel, TransactionType};
use billpay_security::{DataSignature, ReportSigner};
use billpay_store::Document;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::config::ComplianceConfig;
use crate::error::{ComplianceError, ComplianceResult};
use crate::flags;
use crate::sanctions::SanctionsScreener;

/// Transaction submitted for compliance monitoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoredTransaction {
    pub transaction_id: String,
    pub user_id: String,
    pub transaction_type: TransactionType,
    pub amount: Amount,
    #[serde(default)]
    pub currency: Currency,
    pub source_account: Option<String>,
    pub destination_account: Option<String>,
    pub risk_score: u32,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub aml_flags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ComplianceState {
    Cleared,
    Flagged,
    /// Sanctions hit - the transaction must not proceed
    Blocked,
}

/// Outcome of monitoring one transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceCheck {
    pub transaction_id: String,
    pub user_id: String,
    pub compliance_status: ComplianceState,
    pub flags: Vec<String>,
    pub requires_review: bool,
    pub auto_approved: bool,
    pub reviewed_at: DateTime<Utc>,
    /// Deadline for a manual review; set when one is required
    #[serde(default)]
    pub review_due: Option<DateTime<Utc>>,
}

impl ComplianceCheck {
    pub fn is_blocked(&self) -> bool {
        self.compliance_status == ComplianceState::Blocked
    }

    /// Review required and its deadline has passed
    pub fn review_overdue(&self, now: DateTime<Utc>) -> bool {
        self.review_due.is_some_and(|due| due < now)
    }

    fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f == flag)
    }
}

impl Document for ComplianceCheck {
    const COLLECTION: &'static str = "compliance_checks";

    fn id(&self) -> &str {
        &self.transaction_id
    }

    fn owner_id(&self) -> Option<&str> {
        Some(&self.user_id)
    }
}

/// Signed compliance report for a period
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub report_id: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub total_transactions: u64,
    pub flagged_transactions: u64,
    pub ctr_reports_filed: u64,
    pub sar_reports_filed: u64,
    pub ofac_matches: u64,
    /// Reviews whose deadline passed before the report was generated
    pub overdue_reviews: u64,
    /// Percentage of cleared transactions, one decimal place
    pub compliance_score: Decimal,
    pub generated_at: DateTime<Utc>,
    pub signed_by: String,
    pub digital_signature: Option<DataSignature>,
}

impl ComplianceReport {
    /// Canonical bytes covered by the signature (sorted keys, no signature field)
    pub fn signing_payload(&self) -> ComplianceResult<Vec<u8>> {
        let mut value = serde_json::to_value(self)?;
        if let Some(obj) = value.as_object_mut() {
            obj.remove("digital_signature");
        }
        Ok(serde_json::to_vec(&value)?)
    }
}

pub struct ComplianceMonitor {
    config: ComplianceConfig,
    screener: Arc<dyn SanctionsScreener>,
    signer: Arc<ReportSigner>,
    history: Mutex<Vec<ComplianceCheck>>,
}

impl ComplianceMonitor {
    pub fn new(
        config: ComplianceConfig,
        screener: Arc<dyn SanctionsScreener>,
        signer: Arc<ReportSigner>,
    ) -> Self {
        Self {
            config,
            screener,
            signer,
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &ComplianceConfig {
        &self.config
    }

    pub fn screener_name(&self) -> &str {
        self.screener.name()
    }

    /// Check a transaction for CTR, SAR and OFAC obligations
    pub async fn monitor_transaction(
        &self,
        transaction: &MonitoredTransaction,
    ) -> ComplianceResult<ComplianceCheck> {
        let mut check_flags = Vec::new();

        if transaction.amount.value() >= self.config.ctr_threshold {
            check_flags.push(flags::CTR_REQUIRED.to_string());
        }

        if transaction.risk_score >= self.config.sar_risk_threshold {
            check_flags.push(flags::SAR_THRESHOLD.to_string());
        }

        let sanctions = self.screener.screen(&transaction.user_id).await?;
        if sanctions.is_sanctioned {
            check_flags.push(flags::OFAC_MATCH.to_string());
        }

        let compliance_status = if sanctions.is_sanctioned {
            ComplianceState::Blocked
        } else if !check_flags.is_empty() {
            ComplianceState::Flagged
        } else {
            ComplianceState::Cleared
        };

        let requires_review = !check_flags.is_empty();
        let reviewed_at = Utc::now();
        let check = ComplianceCheck {
            transaction_id: transaction.transaction_id.clone(),
            user_id: transaction.user_id.clone(),
            compliance_status,
            flags: check_flags,
            requires_review,
            auto_approved: !requires_review,
            reviewed_at,
            review_due: requires_review.then(|| reviewed_at + self.config.review_expiry()),
        };

        self.history
            .lock()
            .map_err(|_| ComplianceError::LockPoisoned)?
            .push(check.clone());

        tracing::info!(
            transaction_id = %check.transaction_id,
            status = %check.compliance_status,
            flags = ?check.flags,
            "Compliance check completed"
        );

        Ok(check)
    }

    /// Rebuild history from previously persisted checks
    pub fn replay<I>(&self, checks: I) -> ComplianceResult<usize>
    where
        I: IntoIterator<Item = ComplianceCheck>,
    {
        let mut history = self
            .history
            .lock()
            .map_err(|_| ComplianceError::LockPoisoned)?;
        let before = history.len();
        history.extend(checks);
        Ok(history.len() - before)
    }

    /// Checks recorded so far, oldest first
    pub fn history(&self) -> ComplianceResult<Vec<ComplianceCheck>> {
        Ok(self
            .history
            .lock()
            .map_err(|_| ComplianceError::LockPoisoned)?
            .clone())
    }

    /// Checks still awaiting review past their deadline, oldest first
    pub fn overdue_reviews(&self, now: DateTime<Utc>) -> ComplianceResult<Vec<ComplianceCheck>> {
        Ok(self
            .history()?
            .into_iter()
            .filter(|c| c.review_overdue(now))
            .collect())
    }

    /// Aggregate checks within `[start, end]` into a signed report
    pub fn generate_report(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> ComplianceResult<ComplianceReport> {
        if end < start {
            return Err(ComplianceError::ConfigError(
                "Report period end precedes start".to_string(),
            ));
        }

        let history = self.history()?;
        let in_period: Vec<&ComplianceCheck> = history
            .iter()
            .filter(|c| c.reviewed_at >= start && c.reviewed_at <= end)
            .collect();

        let count = |pred: fn(&ComplianceCheck) -> bool| {
            in_period.iter().filter(|c| pred(c)).count() as u64
        };

        let total = in_period.len() as u64;
        let cleared = count(|c| c.compliance_status == ComplianceState::Cleared);
        let compliance_score = if total == 0 {
            Decimal::ONE_HUNDRED
        } else {
            (Decimal::from(cleared) * Decimal::ONE_HUNDRED / Decimal::from(total)).round_dp(1)
        };

        let generated_at = Utc::now();
        let overdue_reviews = in_period
            .iter()
            .filter(|c| c.review_overdue(generated_at))
            .count() as u64;

        let mut report = ComplianceReport {
            report_id: new_id(),
            period_start: start,
            period_end: end,
            total_transactions: total,
            flagged_transactions: total - cleared,
            ctr_reports_filed: count(|c| c.has_flag(flags::CTR_REQUIRED)),
            sar_reports_filed: count(|c| c.has_flag(flags::SAR_THRESHOLD)),
            ofac_matches: count(|c| c.has_flag(flags::OFAC_MATCH)),
            overdue_reviews,
            compliance_score,
            generated_at,
            signed_by: self.signer.signer_id().to_string(),
            digital_signature: None,
        };

        let payload = report.signing_payload()?;
        report.digital_signature = Some(self.signer.sign(&payload));

        tracing::info!(
            report_id = %report.report_id,
            total = report.total_transactions,
            score = %report.compliance_score,
            "Compliance report generated"
        );

        Ok(report)
    }
}

/// Verify a report's signature against its current contents
pub fn verify_report(report: &ComplianceReport) -> ComplianceResult<()> {
    let signature = report.digital_signature.as_ref().ok_or_else(|| {
        billpay_security::SecurityError::SignatureVerificationFailed(format!(
            "Report {} is unsigned",
            report.report_id
        ))
    })?;

    signature.verify(&report.signing_payload()?)?;
    Ok(())
}
