//! BillPay Compliance Engine
//!
//! Regulatory checks around every money movement:
//! - [`AmlScreener`] - amount-based AML risk scoring
//! - [`SanctionsScreener`] - OFAC screening (in-memory [`SanctionsList`])
//! - [`ComplianceMonitor`] - CTR/SAR/OFAC flags and signed period reports
//! - [`KycProcessor`] - identity verification sessions and documents
//! - [`compliance_status`] - per-user compliance score

pub mod aml;
pub mod config;
pub mod error;
pub mod kyc;
pub mod monitor;
pub mod sanctions;
pub mod status;

pub use aml::{risk_level_for, AmlAssessment, AmlScreener};
pub use config::ComplianceConfig;
pub use error::{ComplianceError, ComplianceResult};
pub use kyc::{
    DocumentCheck, DocumentType, DocumentVerification, DocumentVerifier, KycDocument, KycProcessor,
    KycProfile, KycRiskAssessment, KycSession, SandboxVerifier, VerifierOutcome,
};
pub use monitor::{
    verify_report, ComplianceCheck, ComplianceMonitor, ComplianceReport, ComplianceState,
    MonitoredTransaction,
};
pub use sanctions::{SanctionsList, SanctionsResult, SanctionsScreener};
pub use status::{compliance_status, ComplianceFlagged, UserComplianceStatus};

/// AML / compliance flag codes
pub mod flags {
    pub const HIGH_AMOUNT_CTR: &str = "HIGH_AMOUNT_CTR";
    pub const ELEVATED_AMOUNT: &str = "ELEVATED_AMOUNT";
    pub const CTR_REQUIRED: &str = "CTR_REQUIRED";
    pub const SAR_THRESHOLD: &str = "SAR_THRESHOLD";
    pub const OFAC_MATCH: &str = "OFAC_MATCH";
    pub const UNDERAGE: &str = "UNDERAGE";
}
