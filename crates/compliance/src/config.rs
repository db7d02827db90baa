//! Compliance configuration with configurable thresholds
//!
//! All thresholds are configurable via file, not hardcoded.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Configuration for the Compliance Engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceConfig {
    // === AML scoring ===
    /// Currency Transaction Report threshold (regulatory requirement)
    #[serde(default = "default_ctr_threshold")]
    pub ctr_threshold: Decimal,

    /// Amount above which a transaction is considered elevated
    #[serde(default = "default_elevated_threshold")]
    pub elevated_threshold: Decimal,

    #[serde(default = "default_ctr_score")]
    pub ctr_score: u32,

    #[serde(default = "default_elevated_score")]
    pub elevated_score: u32,

    /// Risk score at which a Suspicious Activity Report is due
    #[serde(default = "default_sar_risk_threshold")]
    pub sar_risk_threshold: u32,

    // === KYC ===
    #[serde(default = "default_kyc_base_risk")]
    pub kyc_base_risk: u32,

    #[serde(default = "default_underage_penalty")]
    pub underage_penalty: u32,

    #[serde(default = "default_minimum_age")]
    pub minimum_age: u32,

    // === User compliance score ===
    /// Document types a user must have verified
    #[serde(default = "default_required_kyc_documents")]
    pub required_kyc_documents: Vec<String>,

    #[serde(default = "default_missing_document_penalty")]
    pub missing_document_penalty: u32,

    #[serde(default = "default_flagged_transaction_penalty")]
    pub flagged_transaction_penalty: u32,

    /// Number of most recent transactions inspected for flags
    #[serde(default = "default_recent_transaction_window")]
    pub recent_transaction_window: usize,

    // === Review Settings ===
    /// Hours until a flagged transaction review expires
    #[serde(default = "default_review_expiry_hours")]
    pub review_expiry_hours: u64,
}

fn default_ctr_threshold() -> Decimal {
    Decimal::new(10_000, 0)
}

fn default_elevated_threshold() -> Decimal {
    Decimal::new(3_000, 0)
}

fn default_ctr_score() -> u32 {
    30
}

fn default_elevated_score() -> u32 {
    15
}

fn default_sar_risk_threshold() -> u32 {
    75
}

fn default_kyc_base_risk() -> u32 {
    10
}

fn default_underage_penalty() -> u32 {
    50
}

fn default_minimum_age() -> u32 {
    18
}

fn default_required_kyc_documents() -> Vec<String> {
    vec!["drivers_license".to_string(), "utility_bill".to_string()]
}

fn default_missing_document_penalty() -> u32 {
    20
}

fn default_flagged_transaction_penalty() -> u32 {
    5
}

fn default_recent_transaction_window() -> usize {
    10
}

fn default_review_expiry_hours() -> u64 {
    72 // 3 days
}

impl Default for ComplianceConfig {
    fn default() -> Self {
        Self {
            ctr_threshold: default_ctr_threshold(),
            elevated_threshold: default_elevated_threshold(),
            ctr_score: default_ctr_score(),
            elevated_score: default_elevated_score(),
            sar_risk_threshold: default_sar_risk_threshold(),
            kyc_base_risk: default_kyc_base_risk(),
            underage_penalty: default_underage_penalty(),
            minimum_age: default_minimum_age(),
            required_kyc_documents: default_required_kyc_documents(),
            missing_document_penalty: default_missing_document_penalty(),
            flagged_transaction_penalty: default_flagged_transaction_penalty(),
            recent_transaction_window: default_recent_transaction_window(),
            review_expiry_hours: default_review_expiry_hours(),
        }
    }
}

impl ComplianceConfig {
    /// Load configuration from JSON file
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Get review expiry as chrono Duration
    pub fn review_expiry(&self) -> chrono::Duration {
        chrono::Duration::hours(self.review_expiry_hours as i64)
    }
}
