//! Application context - wires everything together

use std::path::{Path, PathBuf};

use billpay_audit::AuditLogger;
use billpay_compliance::ComplianceCheck;
use billpay_payments::{BillService, PaymentMethodService, PaymentService, UserService};
use billpay_security::{KeyMaterial, PasswordHasher};
use billpay_store::DocumentStore;

use crate::config::PlatformConfig;
use crate::infrastructure::FinancialInfrastructure;

const DATABASE_FILE: &str = "billpay.db";
const AUDIT_LOG: &str = "audit/audit.jsonl";

/// Application context - the store, the financial infrastructure and the
/// user-facing services built on them
pub struct AppContext {
    pub store: DocumentStore,
    pub infra: FinancialInfrastructure,
    pub users: UserService,
    pub bills: BillService,
    pub methods: PaymentMethodService,
    pub payments: PaymentService,
    data_dir: Option<PathBuf>,
}

impl AppContext {
    /// Open (or create) the data directory and restore monitoring state
    pub fn new(data_dir: impl AsRef<Path>, config: PlatformConfig) -> Result<Self, anyhow::Error> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir)?;

        let store = DocumentStore::open(data_dir.join(DATABASE_FILE))?;
        let keys = KeyMaterial::load_or_create(config.key_dir_for(data_dir))?;
        let audit = AuditLogger::open(data_dir.join(AUDIT_LOG), keys.vault.clone())?;

        let ctx = Self::assemble(store, keys, audit, config, Some(data_dir.to_path_buf()));

        // Rebuild the monitor's history from persisted checks
        let restored = ctx
            .infra
            .monitor
            .replay(ctx.store.find_all::<ComplianceCheck>()?)?;

        tracing::info!(
            data_dir = %data_dir.display(),
            compliance_checks = restored,
            audit_records = ctx.infra.audit.verify()?,
            "Application context ready"
        );

        Ok(ctx)
    }

    /// Context with in-memory storage and throwaway keys
    pub fn ephemeral(config: PlatformConfig) -> Result<Self, anyhow::Error> {
        let keys = KeyMaterial::ephemeral();
        let audit = AuditLogger::in_memory(keys.vault.clone());
        Ok(Self::assemble(DocumentStore::in_memory()?, keys, audit, config, None))
    }

    fn assemble(
        store: DocumentStore,
        keys: KeyMaterial,
        audit: AuditLogger,
        config: PlatformConfig,
        data_dir: Option<PathBuf>,
    ) -> Self {
        let hasher = PasswordHasher::with_iterations(config.password_hash_iterations);
        let infra = FinancialInfrastructure::new(config, keys, store.clone(), audit);

        Self {
            users: UserService::new(store.clone()).with_hasher(hasher),
            bills: BillService::new(store.clone()),
            methods: PaymentMethodService::new(store.clone()),
            payments: PaymentService::new(store.clone(), infra.aml.clone()),
            infra,
            store,
            data_dir,
        }
    }

    pub fn config(&self) -> &PlatformConfig {
        &self.infra.config
    }

    /// None for an ephemeral context
    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    pub fn audit_path(&self) -> Option<&Path> {
        if self.infra.audit.is_in_memory() {
            None
        } else {
            Some(self.infra.audit.path())
        }
    }
}
