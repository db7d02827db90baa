//! Status enums shared across the financial services
//!
//! All serialize as snake_case strings, matching what is persisted in the
//! document store and written to the audit trail.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    BillPayment,
    Transfer,
    Fee,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Reversed,
    ComplianceHold,
}

/// Know-Your-Customer verification state of a user
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum KycStatus {
    #[default]
    NotStarted,
    InProgress,
    PendingReview,
    Approved,
    Rejected,
    RequiresUpdate,
}

/// Risk level, ordered from lowest to highest
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    Default,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_risk_level_ordering() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::High < RiskLevel::Critical);
        assert_eq!(
            [RiskLevel::Medium, RiskLevel::Critical, RiskLevel::Low]
                .into_iter()
                .max(),
            Some(RiskLevel::Critical)
        );
    }

    #[test]
    fn test_snake_case_strings() {
        assert_eq!(TransactionType::BillPayment.to_string(), "bill_payment");
        assert_eq!(TransactionStatus::ComplianceHold.to_string(), "compliance_hold");
        assert_eq!(KycStatus::from_str("pending_review").unwrap(), KycStatus::PendingReview);
        assert_eq!(
            serde_json::to_string(&KycStatus::NotStarted).unwrap(),
            "\"not_started\""
        );
    }
}
