//! Services layer: access policy, catalog, import pipeline, audit, and the
//! storage backends behind them.

pub mod access;
pub mod audit;
pub mod catalog;
pub mod database;
pub mod import;
pub mod masking;
pub mod memory;
pub mod metrics;
pub mod reconcile;
pub mod store;

pub use access::AccessPolicy;
pub use audit::AuditLog;
pub use catalog::SecretCatalog;
pub use database::Database;
pub use import::parse;
pub use masking::mask;
pub use memory::MemoryStore;
pub use metrics::{
    get_metrics, init_metrics, record_catalog_operation, record_error, record_import_pair,
    record_import_run,
};
pub use reconcile::{derive_secret_name, ReconciliationEngine};
pub use store::SecretStore;
