//! Per-user compliance score

use std::collections::BTreeSet;

use billpay_core::{KycStatus, RiskLevel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ComplianceConfig;
use crate::kyc::KycDocument;

/// A record that may carry compliance flags
pub trait ComplianceFlagged {
    fn compliance_flags(&self) -> &[String];

    fn is_flagged(&self) -> bool {
        !self.compliance_flags().is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserComplianceStatus {
    pub user_id: String,
    pub kyc_status: KycStatus,
    pub risk_level: RiskLevel,
    pub compliance_score: u32,
    pub compliance_issues: Vec<String>,
    pub kyc_documents: usize,
    pub verified_documents: usize,
    pub recent_transactions: usize,
    pub flagged_transactions: usize,
    pub last_updated: DateTime<Utc>,
}

/// Score a user's compliance.
///
/// `recent_transactions` must be ordered newest first; only the configured
/// window is inspected.
pub fn compliance_status<T: ComplianceFlagged>(
    user_id: &str,
    kyc_status: KycStatus,
    risk_level: RiskLevel,
    documents: &[KycDocument],
    recent_transactions: &[T],
    config: &ComplianceConfig,
) -> UserComplianceStatus {
    let mut score: i64 = 100;
    let mut issues = Vec::new();

    let verified: BTreeSet<String> = documents
        .iter()
        .filter(|d| d.is_verified())
        .map(|d| d.document_type.to_string())
        .collect();
    let verified_documents = documents.iter().filter(|d| d.is_verified()).count();

    for required in &config.required_kyc_documents {
        if !verified.contains(required) {
            score -= config.missing_document_penalty as i64;
            issues.push(format!("Missing {}", required));
        }
    }

    let window = &recent_transactions[..recent_transactions
        .len()
        .min(config.recent_transaction_window)];
    let flagged = window.iter().filter(|t| t.is_flagged()).count();
    if flagged > 0 {
        score -= (flagged as i64) * config.flagged_transaction_penalty as i64;
        issues.push(format!("{} flagged transactions", flagged));
    }

    UserComplianceStatus {
        user_id: user_id.to_string(),
        kyc_status,
        risk_level,
        compliance_score: score.max(0) as u32,
        compliance_issues: issues,
        kyc_documents: documents.len(),
        verified_documents,
        recent_transactions: window.len(),
        flagged_transactions: flagged,
        last_updated: Utc::now(),
    }
}
