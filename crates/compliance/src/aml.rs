//! Amount-based AML risk scoring

use billpay_core::{Amount, RiskLevel, TransactionType};
use serde::{Deserialize, Serialize};

use crate::config::ComplianceConfig;
use crate::flags;

/// Result of an AML risk assessment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmlAssessment {
    pub risk_score: u32,
    pub risk_level: RiskLevel,
    pub flags: Vec<String>,
}

impl AmlAssessment {
    /// Critical-risk transactions must not proceed
    pub fn is_blocking(&self) -> bool {
        self.risk_level == RiskLevel::Critical
    }

    pub fn is_flagged(&self) -> bool {
        !self.flags.is_empty()
    }
}

/// Map a 0-100 risk score to a level
pub fn risk_level_for(score: u32) -> RiskLevel {
    match score {
        s if s >= 75 => RiskLevel::Critical,
        s if s >= 50 => RiskLevel::High,
        s if s >= 25 => RiskLevel::Medium,
        _ => RiskLevel::Low,
    }
}

#[derive(Debug, Clone, Default)]
pub struct AmlScreener {
    config: ComplianceConfig,
}

impl AmlScreener {
    pub fn new(config: ComplianceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ComplianceConfig {
        &self.config
    }

    pub fn assess(&self, amount: Amount, transaction_type: TransactionType) -> AmlAssessment {
        let mut risk_score = 0u32;
        let mut aml_flags = Vec::new();

        if amount.value() > self.config.ctr_threshold {
            aml_flags.push(flags::HIGH_AMOUNT_CTR.to_string());
            risk_score += self.config.ctr_score;
        }

        if amount.value() > self.config.elevated_threshold {
            aml_flags.push(flags::ELEVATED_AMOUNT.to_string());
            risk_score += self.config.elevated_score;
        }

        let risk_level = risk_level_for(risk_score);

        tracing::debug!(
            %amount,
            %transaction_type,
            risk_score,
            %risk_level,
            "AML assessment"
        );

        AmlAssessment {
            risk_score,
            risk_level,
            flags: aml_flags,
        }
    }
}
