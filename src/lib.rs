//! Secrets service core: a multi-tenant catalog of API keys and
//! credentials with environment-scoped access control, masked display,
//! versioned overwrites, text imports with conflict reconciliation, and an
//! append-only audit trail.
//!
//! The crate is storage-agnostic at its seams: components talk to an
//! [`services::store::SecretStore`], implemented over Postgres by
//! [`services::database::Database`] and over process-local state by
//! [`services::memory::MemoryStore`]. [`startup::SecretsCore`] assembles
//! the pieces for an embedding process.

pub mod config;
pub mod error;
pub mod models;
pub mod observability;
pub mod services;
pub mod startup;

pub use error::AppError;
