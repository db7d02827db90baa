//! OFAC sanctions screening

use std::collections::HashSet;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ComplianceError, ComplianceResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SanctionsResult {
    pub is_sanctioned: bool,
    /// Match confidence, 0.0 - 100.0
    pub match_confidence: f64,
    pub matched_entry: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl SanctionsResult {
    pub fn clear() -> Self {
        Self {
            is_sanctioned: false,
            match_confidence: 0.0,
            matched_entry: None,
            checked_at: Utc::now(),
        }
    }
}

/// Screens a subject (user id or name) against a sanctions list
#[async_trait]
pub trait SanctionsScreener: Send + Sync {
    fn name(&self) -> &str;

    async fn screen(&self, subject: &str) -> ComplianceResult<SanctionsResult>;
}

/// In-memory sanctions list
#[derive(Debug, Default)]
pub struct SanctionsList {
    entries: RwLock<HashSet<String>>,
}

fn normalize(subject: &str) -> String {
    subject
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

impl SanctionsList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            entries: RwLock::new(entries.into_iter().map(|e| normalize(e.as_ref())).collect()),
        }
    }

    pub fn add(&self, entry: &str) -> ComplianceResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| ComplianceError::LockPoisoned)?;
        entries.insert(normalize(entry));
        Ok(())
    }

    pub fn remove(&self, entry: &str) -> ComplianceResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| ComplianceError::LockPoisoned)?;
        entries.remove(&normalize(entry));
        Ok(())
    }

    pub fn contains(&self, subject: &str) -> ComplianceResult<bool> {
        let entries = self
            .entries
            .read()
            .map_err(|_| ComplianceError::LockPoisoned)?;
        Ok(entries.contains(&normalize(subject)))
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SanctionsScreener for SanctionsList {
    fn name(&self) -> &str {
        "in_memory_sanctions_list"
    }

    async fn screen(&self, subject: &str) -> ComplianceResult<SanctionsResult> {
        if self.contains(subject)? {
            tracing::warn!(subject, "Sanctions list match");
            return Ok(SanctionsResult {
                is_sanctioned: true,
                match_confidence: 100.0,
                matched_entry: Some(normalize(subject)),
                checked_at: Utc::now(),
            });
        }

        Ok(SanctionsResult::clear())
    }
}
