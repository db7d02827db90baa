//! KYC (Know Your Customer) processing
//!
//! A session tracks which requirement categories (government id, proof of
//! address, SSN) a user has satisfied. Each submitted document is verified
//! through a [`DocumentVerifier`] and counts towards one category.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use billpay_core::{new_id, KycStatus, RiskLevel};
use billpay_security::Vault;
use billpay_store::Document;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::config::ComplianceConfig;
use crate::error::{ComplianceError, ComplianceResult};
use crate::flags;

pub const GOVERNMENT_ID: &str = "government_id";
pub const PROOF_OF_ADDRESS: &str = "proof_of_address";
pub const SSN_VERIFICATION: &str = "ssn_verification";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DocumentType {
    DriversLicense,
    Passport,
    SsnCard,
    UtilityBill,
    BankStatement,
}

impl DocumentType {
    /// Requirement category this document satisfies
    pub fn requirement(&self) -> &'static str {
        match self {
            DocumentType::DriversLicense | DocumentType::Passport => GOVERNMENT_ID,
            DocumentType::UtilityBill | DocumentType::BankStatement => PROOF_OF_ADDRESS,
            DocumentType::SsnCard => SSN_VERIFICATION,
        }
    }

    pub fn parse(value: &str) -> ComplianceResult<Self> {
        value
            .parse()
            .map_err(|_| ComplianceError::InvalidDocumentType(value.to_string()))
    }
}

/// Data supplied when a KYC process starts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KycProfile {
    pub name: Option<String>,
    pub email: Option<String>,
    /// Unknown age is not treated as underage
    pub age: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KycRiskAssessment {
    pub risk_score: u32,
    pub risk_level: RiskLevel,
    pub factors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KycSession {
    pub session_id: String,
    pub user_id: String,
    pub status: KycStatus,
    pub required_documents: Vec<String>,
    pub submitted_documents: Vec<String>,
    pub risk_assessment: KycRiskAssessment,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl KycSession {
    /// Requirement categories not yet satisfied
    pub fn outstanding(&self) -> Vec<String> {
        let satisfied: BTreeSet<&str> = self
            .submitted_documents
            .iter()
            .filter_map(|d| DocumentType::parse(d).ok())
            .map(|d| d.requirement())
            .collect();

        self.required_documents
            .iter()
            .filter(|r| !satisfied.contains(r.as_str()))
            .cloned()
            .collect()
    }

    /// Count a verified document towards the session.
    ///
    /// Returns the session status afterwards.
    pub fn record_verification(&mut self, verification: &DocumentVerification) -> KycStatus {
        if verification.verification_status != DocumentCheck::Verified {
            return self.status;
        }

        let doc_type = verification.document_type.to_string();
        if !self.submitted_documents.contains(&doc_type) {
            self.submitted_documents.push(doc_type);
        }
        self.updated_at = Utc::now();

        if self.outstanding().is_empty() {
            self.status = KycStatus::Approved;
            tracing::info!(session_id = %self.session_id, user = %self.user_id, "KYC approved");
        }

        self.status
    }
}

impl Document for KycSession {
    const COLLECTION: &'static str = "kyc_sessions";

    fn id(&self) -> &str {
        &self.session_id
    }

    fn owner_id(&self) -> Option<&str> {
        Some(&self.user_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DocumentCheck {
    Pending,
    Verified,
    Rejected,
}

/// Stored KYC document. The URL is held encrypted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KycDocument {
    pub document_id: String,
    pub user_id: String,
    pub document_type: DocumentType,
    pub document_url: String,
    pub upload_date: DateTime<Utc>,
    pub verification_status: DocumentCheck,
    pub extracted_data: Option<serde_json::Value>,
    pub confidence_score: Option<f64>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl KycDocument {
    /// New pending document; `document_url` must already be encrypted
    pub fn new(user_id: &str, document_type: DocumentType, encrypted_url: String) -> Self {
        Self {
            document_id: new_id(),
            user_id: user_id.to_string(),
            document_type,
            document_url: encrypted_url,
            upload_date: Utc::now(),
            verification_status: DocumentCheck::Pending,
            extracted_data: None,
            confidence_score: None,
            processed_at: None,
        }
    }

    pub fn apply(&mut self, verification: &DocumentVerification) {
        self.verification_status = verification.verification_status;
        self.confidence_score = Some(verification.confidence_score);
        self.extracted_data = Some(verification.extracted_data.clone());
        self.processed_at = Some(verification.processed_at);
    }

    pub fn is_verified(&self) -> bool {
        self.verification_status == DocumentCheck::Verified
    }
}

impl Document for KycDocument {
    const COLLECTION: &'static str = "kyc_documents";

    fn id(&self) -> &str {
        &self.document_id
    }

    fn owner_id(&self) -> Option<&str> {
        Some(&self.user_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentVerification {
    pub document_id: String,
    pub session_id: String,
    pub document_type: DocumentType,
    pub verification_status: DocumentCheck,
    pub confidence_score: f64,
    pub extracted_data: serde_json::Value,
    pub processed_at: DateTime<Utc>,
}

/// Result from a document verification backend
#[derive(Debug, Clone)]
pub struct VerifierOutcome {
    pub status: DocumentCheck,
    pub confidence: f64,
    pub data: serde_json::Value,
}

/// Document verification backend (OCR / identity provider)
#[async_trait]
pub trait DocumentVerifier: Send + Sync {
    fn name(&self) -> &str;

    async fn verify(
        &self,
        document_type: DocumentType,
        document_url: &str,
    ) -> ComplianceResult<VerifierOutcome>;
}

/// Verifier that accepts every document with fixed demo data
#[derive(Debug, Default)]
pub struct SandboxVerifier;

#[async_trait]
impl DocumentVerifier for SandboxVerifier {
    fn name(&self) -> &str {
        "sandbox_verifier"
    }

    async fn verify(
        &self,
        _document_type: DocumentType,
        _document_url: &str,
    ) -> ComplianceResult<VerifierOutcome> {
        Ok(VerifierOutcome {
            status: DocumentCheck::Verified,
            confidence: 95.5,
            data: serde_json::json!({
                "document_number": "DEMO123456789",
                "full_name": "Demo User",
                "date_of_birth": "1990-01-01",
                "address": "123 Demo Street, Demo City, DC 12345"
            }),
        })
    }
}

pub struct KycProcessor {
    config: ComplianceConfig,
    vault: Vault,
    verifier: Arc<dyn DocumentVerifier>,
}

impl KycProcessor {
    pub fn new(config: ComplianceConfig, vault: Vault, verifier: Arc<dyn DocumentVerifier>) -> Self {
        Self {
            config,
            vault,
            verifier,
        }
    }

    pub fn verifier_name(&self) -> &str {
        self.verifier.name()
    }

    pub fn initiate_kyc_process(&self, user_id: &str, profile: &KycProfile) -> KycSession {
        let now = Utc::now();
        let session = KycSession {
            session_id: new_id(),
            user_id: user_id.to_string(),
            status: KycStatus::InProgress,
            required_documents: vec![
                GOVERNMENT_ID.to_string(),
                PROOF_OF_ADDRESS.to_string(),
                SSN_VERIFICATION.to_string(),
            ],
            submitted_documents: Vec::new(),
            risk_assessment: self.assess_initial_risk(profile),
            created_at: now,
            updated_at: now,
        };

        tracing::info!(
            session_id = %session.session_id,
            user = user_id,
            risk_score = session.risk_assessment.risk_score,
            "KYC process initiated"
        );

        session
    }

    /// Encrypt the document URL and run verification.
    ///
    /// Returns the stored-form document (URL encrypted, results applied)
    /// and the verification summary.
    pub async fn submit_kyc_document(
        &self,
        session: &KycSession,
        document_type: &str,
        document_url: &str,
    ) -> ComplianceResult<(KycDocument, DocumentVerification)> {
        let document_type = DocumentType::parse(document_type)?;
        let encrypted_url = self.vault.encrypt(document_url)?;
        let mut document = KycDocument::new(&session.user_id, document_type, encrypted_url);

        let outcome = self.verifier.verify(document_type, document_url).await?;

        let verification = DocumentVerification {
            document_id: document.document_id.clone(),
            session_id: session.session_id.clone(),
            document_type,
            verification_status: outcome.status,
            confidence_score: outcome.confidence,
            extracted_data: outcome.data,
            processed_at: Utc::now(),
        };
        document.apply(&verification);

        tracing::info!(
            document_id = %document.document_id,
            %document_type,
            status = %verification.verification_status,
            "KYC document processed"
        );

        Ok((document, verification))
    }

    fn assess_initial_risk(&self, profile: &KycProfile) -> KycRiskAssessment {
        let mut risk_score = self.config.kyc_base_risk;
        let mut factors = Vec::new();

        if profile.age.is_some_and(|age| age < self.config.minimum_age) {
            factors.push(flags::UNDERAGE.to_string());
            risk_score += self.config.underage_penalty;
        }

        let risk_level = match risk_score {
            s if s >= 75 => RiskLevel::High,
            s if s >= 50 => RiskLevel::Medium,
            _ => RiskLevel::Low,
        };

        KycRiskAssessment {
            risk_score,
            risk_level,
            factors,
        }
    }
}
