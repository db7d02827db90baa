//! Financial infrastructure - the services behind every money movement

use std::collections::BTreeMap;
use std::sync::Arc;

use billpay_audit::AuditLogger;
use billpay_banking::{AchProcessor, BankLinkProvider, SandboxPlaid};
use billpay_compliance::{
    AmlScreener, ComplianceMonitor, KycProcessor, SandboxVerifier, SanctionsList,
    SanctionsScreener,
};
use billpay_core::Amount;
use billpay_security::{KeyMaterial, ReportSigner, Vault};
use billpay_store::DocumentStore;
use billpay_wallet::{LightningNode, MultisigManager};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::PlatformConfig;

const HEALTH_PROBE: &str = "health_check";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializationReport {
    pub status: String,
    pub environment: String,
    pub components: BTreeMap<String, String>,
    pub initialized_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub overall_status: String,
    pub services: BTreeMap<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.overall_status == "healthy"
    }
}

pub struct FinancialInfrastructure {
    pub config: PlatformConfig,
    pub vault: Vault,
    pub signer: Arc<ReportSigner>,
    pub plaid: Arc<dyn BankLinkProvider>,
    pub aml: AmlScreener,
    pub ach: AchProcessor,
    pub kyc: KycProcessor,
    pub sanctions: Arc<SanctionsList>,
    pub monitor: ComplianceMonitor,
    pub multisig: MultisigManager,
    pub lightning: LightningNode,
    pub audit: AuditLogger,
}

impl FinancialInfrastructure {
    pub fn new(
        config: PlatformConfig,
        keys: KeyMaterial,
        store: DocumentStore,
        audit: AuditLogger,
    ) -> Self {
        let KeyMaterial { vault, signer, .. } = keys;
        let signer = Arc::new(signer);
        let compliance = config.compliance.clone();

        let sanctions = Arc::new(SanctionsList::with_entries(config.sanctions_list.iter()));
        let aml = AmlScreener::new(compliance.clone());

        Self {
            plaid: Arc::new(SandboxPlaid::new(
                config.plaid_client_id.clone(),
                config.plaid_env,
            )),
            ach: AchProcessor::new(vault.clone(), aml.clone()),
            kyc: KycProcessor::new(compliance.clone(), vault.clone(), Arc::new(SandboxVerifier)),
            monitor: ComplianceMonitor::new(
                compliance,
                sanctions.clone() as Arc<dyn SanctionsScreener>,
                signer.clone(),
            ),
            multisig: MultisigManager::new(store.clone()),
            lightning: LightningNode::new(store).with_rate(config.btc_usd_rate),
            aml,
            sanctions,
            signer,
            vault,
            audit,
            config,
        }
    }

    /// Validate configuration and report the wired components
    pub fn initialize(&self) -> anyhow::Result<InitializationReport> {
        self.config.ensure_valid()?;

        let components = [
            "security",
            "plaid_integration",
            "ach_processor",
            "kyc_processor",
            "multisig_wallet",
            "lightning_node",
            "compliance_monitor",
            "audit_logger",
        ]
        .into_iter()
        .map(|c| (c.to_string(), "initialized".to_string()))
        .collect();

        tracing::info!(environment = %self.config.environment, "Financial infrastructure initialized");

        Ok(InitializationReport {
            status: "initialized".to_string(),
            environment: self.config.environment.clone(),
            components,
            initialized_at: Utc::now(),
        })
    }

    /// Probe each service; any failure degrades the overall status
    pub async fn health_check(&self) -> HealthReport {
        let mut services = BTreeMap::new();
        let mut overall = "healthy";

        let results = [
            ("security", self.check_security()),
            ("plaid", self.check_plaid().await),
            ("ach", self.check_ach()),
            ("compliance", self.check_compliance().await),
            ("audit", self.check_audit()),
        ];

        for (name, result) in results {
            let status = match result {
                Ok(detail) => detail,
                Err(e) => {
                    tracing::warn!(service = name, error = %e, "Health check failed");
                    overall = "degraded";
                    json!({ "status": "unhealthy", "error": e.to_string() })
                }
            };
            services.insert(name.to_string(), status);
        }

        HealthReport {
            overall_status: overall.to_string(),
            services,
            timestamp: Utc::now(),
        }
    }

    fn check_security(&self) -> anyhow::Result<Value> {
        let token = self.vault.encrypt(HEALTH_PROBE)?;
        anyhow::ensure!(
            self.vault.decrypt(&token)? == HEALTH_PROBE,
            "vault round-trip mismatch"
        );

        self.signer.sign(HEALTH_PROBE.as_bytes()).verify(HEALTH_PROBE.as_bytes())?;

        Ok(json!({
            "status": "healthy",
            "encryption": "active",
            "signing": "active",
            "public_key": self.signer.public_key_hex(),
        }))
    }

    async fn check_plaid(&self) -> anyhow::Result<Value> {
        self.plaid.create_link_token(HEALTH_PROBE).await?;
        Ok(json!({
            "status": "healthy",
            "environment": self.plaid.environment().to_string(),
        }))
    }

    fn check_ach(&self) -> anyhow::Result<Value> {
        let outcome = self
            .ach
            .process_withdrawal(HEALTH_PROBE, Amount::new(rust_decimal::Decimal::ONE)?, "000000000")?;
        anyhow::ensure!(!outcome.is_blocked(), "nominal withdrawal was blocked");

        Ok(json!({ "status": "healthy", "processing": "active" }))
    }

    async fn check_compliance(&self) -> anyhow::Result<Value> {
        let result = self.sanctions.screen(HEALTH_PROBE).await?;
        anyhow::ensure!(!result.is_sanctioned, "sanctions probe matched");

        Ok(json!({
            "status": "healthy",
            "monitoring": "active",
            "ofac": self.monitor.screener_name(),
            "sanctions_entries": self.sanctions.len(),
            "overdue_reviews": self.monitor.overdue_reviews(Utc::now())?.len(),
        }))
    }

    fn check_audit(&self) -> anyhow::Result<Value> {
        let records = self.audit.verify()?;
        Ok(json!({
            "status": "healthy",
            "records": records,
            "retention_days": self.config.audit_retention_days,
        }))
    }
}
