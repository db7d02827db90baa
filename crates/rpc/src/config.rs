//! Platform configuration
//!
//! Built from environment variables, then optionally overlaid by a JSON file.
//! Keys present in the file replace the environment values.

use std::path::{Path, PathBuf};

use billpay_banking::PlaidEnvironment;
use billpay_compliance::ComplianceConfig;
use billpay_wallet::default_btc_usd_rate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const BTC_NETWORKS: [&str; 4] = ["mainnet", "testnet", "signet", "regtest"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Configuration errors: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// development, staging or production
    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default)]
    pub plaid_client_id: String,

    #[serde(default)]
    pub plaid_secret: String,

    #[serde(default)]
    pub plaid_env: PlaidEnvironment,

    #[serde(default)]
    pub ofac_api_key: String,

    #[serde(default = "default_btc_network")]
    pub btc_network: String,

    #[serde(default = "default_btc_usd_rate")]
    pub btc_usd_rate: Decimal,

    #[serde(default = "default_multisig_threshold")]
    pub multisig_default_threshold: usize,

    /// 7 years
    #[serde(default = "default_audit_retention_days")]
    pub audit_retention_days: u32,

    /// Key directory; defaults to `<data_dir>/keys`
    #[serde(default)]
    pub key_dir: Option<PathBuf>,

    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// PBKDF2 rounds for user passwords
    #[serde(default = "default_password_hash_iterations")]
    pub password_hash_iterations: u32,

    /// Names and user ids screened as sanctioned
    #[serde(default)]
    pub sanctions_list: Vec<String>,

    #[serde(default)]
    pub compliance: ComplianceConfig,
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_btc_network() -> String {
    "testnet".to_string()
}

fn default_multisig_threshold() -> usize {
    2
}

fn default_audit_retention_days() -> u32 {
    2555
}

fn default_password_hash_iterations() -> u32 {
    100_000
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            plaid_client_id: String::new(),
            plaid_secret: String::new(),
            plaid_env: PlaidEnvironment::default(),
            ofac_api_key: String::new(),
            btc_network: default_btc_network(),
            btc_usd_rate: default_btc_usd_rate(),
            multisig_default_threshold: default_multisig_threshold(),
            audit_retention_days: default_audit_retention_days(),
            key_dir: None,
            data_dir: None,
            password_hash_iterations: default_password_hash_iterations(),
            sanctions_list: Vec::new(),
            compliance: ComplianceConfig::default(),
        }
    }
}

impl PlatformConfig {
    /// Read from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any variable source; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(env) = var("ENVIRONMENT") {
            config.environment = env.trim().to_lowercase();
        }
        if let Some(id) = var("PLAID_CLIENT_ID") {
            config.plaid_client_id = id;
        }
        if let Some(secret) = var("PLAID_SECRET") {
            config.plaid_secret = secret;
        }
        if let Some(env) = var("PLAID_ENV") {
            config.plaid_env = PlaidEnvironment::from(env.as_str());
        }
        if let Some(key) = var("OFAC_API_KEY") {
            config.ofac_api_key = key;
        }
        if let Some(network) = var("BTC_NETWORK") {
            config.btc_network = network.trim().to_lowercase();
        }
        config.data_dir = var("BILLPAY_DATA_DIR").map(PathBuf::from);
        config.key_dir = var("BILLPAY_KEY_DIR").map(PathBuf::from);

        config
    }

    /// Overlay the keys of a JSON object file onto this config
    pub fn overlay_file(self, path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let overlay: serde_json::Value = serde_json::from_str(&content)?;
        self.overlay(overlay)
    }

    pub fn overlay(self, overlay: serde_json::Value) -> Result<Self, ConfigError> {
        let mut base = serde_json::to_value(&self)?;

        if let (Some(base_obj), serde_json::Value::Object(overlay_obj)) =
            (base.as_object_mut(), overlay)
        {
            for (key, value) in overlay_obj {
                base_obj.insert(key, value);
            }
        }

        Ok(serde_json::from_value(base)?)
    }

    /// Environment, then the optional JSON file
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let config = Self::from_env();
        match file {
            Some(path) => config.overlay_file(path),
            None => Ok(config),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn key_dir_for(&self, data_dir: &Path) -> PathBuf {
        self.key_dir
            .clone()
            .unwrap_or_else(|| data_dir.join("keys"))
    }

    /// All configuration problems; empty when valid
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.is_production() {
            if self.plaid_client_id.is_empty() {
                errors.push("PLAID_CLIENT_ID is required for production".to_string());
            }
            if self.plaid_secret.is_empty() {
                errors.push("PLAID_SECRET is required for production".to_string());
            }
            if self.ofac_api_key.is_empty() {
                errors.push("OFAC_API_KEY is required for production".to_string());
            }
        }

        if !BTC_NETWORKS.contains(&self.btc_network.as_str()) {
            errors.push(format!("Unknown BTC_NETWORK: {}", self.btc_network));
        }

        if self.btc_usd_rate <= Decimal::ZERO {
            errors.push("btc_usd_rate must be positive".to_string());
        }

        if self.password_hash_iterations == 0 {
            errors.push("password_hash_iterations must be positive".to_string());
        }

        if self.multisig_default_threshold < 2 {
            errors.push("multisig_default_threshold must be at least 2".to_string());
        }

        errors
    }

    pub fn ensure_valid(&self) -> Result<(), ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }
}
