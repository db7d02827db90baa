//! Audit record

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single entry in the audit trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub audit_id: String,

    /// Position in the chain, starting at 1
    pub sequence: u64,

    pub action_type: String,

    /// User id, or the attempted email for failed logins
    pub user_id: String,

    pub timestamp: DateTime<Utc>,

    /// Non-sensitive details, stored in clear
    pub details: serde_json::Value,

    /// Sensitive values, each encrypted with the vault
    pub encrypted_data: Option<BTreeMap<String, String>>,

    pub ip_address: String,
    pub user_agent: String,
    pub session_id: String,

    /// Hash of the previous record (`GENESIS` for the first)
    pub prev_hash: String,

    /// SHA-256 over every other field
    pub integrity_hash: String,
}

impl AuditRecord {
    pub fn has_sensitive_data(&self) -> bool {
        self.encrypted_data
            .as_ref()
            .is_some_and(|data| !data.is_empty())
    }
}
