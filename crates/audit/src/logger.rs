//! Audit logger - append-only JSONL storage
//!
//! Each line is one JSON-serialized [`AuditRecord`]. The file is only ever
//! appended to. On open, the existing chain is verified and resumed.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use billpay_core::new_id;
use billpay_security::Vault;
use chrono::Utc;

use crate::error::{AuditError, AuditResult};
use crate::hash::{calculate_record_hash, verify_chain, GENESIS};
use crate::record::AuditRecord;

const DEFAULT_IP: &str = "0.0.0.0";
const DEFAULT_USER_AGENT: &str = "system";

struct ChainState {
    file: Option<File>,
    last_hash: String,
    last_sequence: u64,
    /// Records kept in memory when there is no backing file
    memory: Vec<AuditRecord>,
}

pub struct AuditLogger {
    path: PathBuf,
    vault: Vault,
    state: Mutex<ChainState>,
}

impl AuditLogger {
    /// Open the audit log at `path`, verifying and resuming its chain
    pub fn open(path: impl AsRef<Path>, vault: Vault) -> AuditResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let existing = if path.exists() {
            read_records(&path)?
        } else {
            Vec::new()
        };
        verify_chain(&existing)?;

        let (last_hash, last_sequence) = existing
            .last()
            .map(|r| (r.integrity_hash.clone(), r.sequence))
            .unwrap_or_else(|| (GENESIS.to_string(), 0));

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        tracing::info!(
            path = %path.display(),
            records = existing.len(),
            "Audit log opened"
        );

        Ok(Self {
            path,
            vault,
            state: Mutex::new(ChainState {
                file: Some(file),
                last_hash,
                last_sequence,
                memory: Vec::new(),
            }),
        })
    }

    /// Create an in-memory audit log (for testing)
    pub fn in_memory(vault: Vault) -> Self {
        Self {
            path: PathBuf::new(),
            vault,
            state: Mutex::new(ChainState {
                file: None,
                last_hash: GENESIS.to_string(),
                last_sequence: 0,
                memory: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> AuditResult<MutexGuard<'_, ChainState>> {
        self.state.lock().map_err(|_| AuditError::LockPoisoned)
    }

    /// Record a financial action and return its audit id.
    ///
    /// `sensitive` values are encrypted before they are written.
    pub fn log_financial_action(
        &self,
        action_type: &str,
        user_id: &str,
        details: serde_json::Value,
        sensitive: &[(&str, &str)],
    ) -> AuditResult<String> {
        let encrypted_data = if sensitive.is_empty() {
            None
        } else {
            let mut map = BTreeMap::new();
            for (key, value) in sensitive {
                map.insert(key.to_string(), self.vault.encrypt(value)?);
            }
            Some(map)
        };

        let mut state = self.lock()?;

        let mut record = AuditRecord {
            audit_id: new_id(),
            sequence: state.last_sequence + 1,
            action_type: action_type.to_string(),
            user_id: user_id.to_string(),
            timestamp: Utc::now(),
            details,
            encrypted_data,
            ip_address: DEFAULT_IP.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            session_id: new_id(),
            prev_hash: state.last_hash.clone(),
            integrity_hash: String::new(),
        };
        record.integrity_hash = calculate_record_hash(&record)?;

        if let Some(ref mut file) = state.file {
            let json = serde_json::to_string(&record)?;
            writeln!(file, "{}", json)?;
            file.flush()?;
        } else {
            state.memory.push(record.clone());
        }

        state.last_hash = record.integrity_hash.clone();
        state.last_sequence = record.sequence;

        tracing::info!(
            audit_id = %record.audit_id,
            sequence = record.sequence,
            action = action_type,
            user = user_id,
            "Audit record appended"
        );

        Ok(record.audit_id)
    }

    /// Read all records in chain order
    pub fn records(&self) -> AuditResult<Vec<AuditRecord>> {
        let state = self.lock()?;
        if state.file.is_none() {
            return Ok(state.memory.clone());
        }
        drop(state);
        read_records(&self.path)
    }

    pub fn records_for_user(&self, user_id: &str) -> AuditResult<Vec<AuditRecord>> {
        Ok(self
            .records()?
            .into_iter()
            .filter(|r| r.user_id == user_id)
            .collect())
    }

    /// Verify the whole chain. Returns the number of records checked.
    pub fn verify(&self) -> AuditResult<usize> {
        let records = self.records()?;
        verify_chain(&records)?;
        Ok(records.len())
    }

    /// Decrypt the sensitive values of a record
    pub fn decrypt_sensitive(&self, record: &AuditRecord) -> AuditResult<BTreeMap<String, String>> {
        let mut out = BTreeMap::new();
        if let Some(ref data) = record.encrypted_data {
            for (key, token) in data {
                out.insert(key.clone(), self.vault.decrypt(token)?);
            }
        }
        Ok(out)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str().is_empty()
    }
}

fn read_records(path: &Path) -> AuditResult<Vec<AuditRecord>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str(&line)?);
    }

    Ok(records)
}
