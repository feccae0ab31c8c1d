//! Component assembly: wires the store, policy, catalog, engine, and audit
//! log together for an embedding process.

use std::sync::Arc;

use crate::config::SecretsConfig;
use crate::error::AppError;
use crate::services::access::AccessPolicy;
use crate::services::audit::AuditLog;
use crate::services::catalog::SecretCatalog;
use crate::services::database::Database;
use crate::services::metrics::init_metrics;
use crate::services::reconcile::ReconciliationEngine;
use crate::services::store::SecretStore;

pub struct SecretsCore {
    pub store: Arc<dyn SecretStore>,
    pub policy: AccessPolicy,
    pub catalog: SecretCatalog,
    pub engine: ReconciliationEngine,
    pub audit: AuditLog,
}

impl SecretsCore {
    /// Builds every component on top of an already-constructed store. Used
    /// directly by tests with [`crate::services::memory::MemoryStore`].
    pub fn with_store(store: Arc<dyn SecretStore>) -> Self {
        let policy = AccessPolicy::new(store.clone());
        let audit = AuditLog::new(store.clone());
        let catalog = SecretCatalog::new(store.clone(), policy.clone(), audit.clone());
        let engine = ReconciliationEngine::new(store.clone(), policy.clone(), audit.clone());
        Self {
            store,
            policy,
            catalog,
            engine,
            audit,
        }
    }

    /// Connects to Postgres, verifies liveness, registers metrics, and
    /// assembles the components.
    pub async fn connect(config: &SecretsConfig) -> Result<Self, AppError> {
        init_metrics();
        let database = Database::connect(&config.database).await?;
        database.health_check().await?;
        Ok(Self::with_store(Arc::new(database)))
    }
}
