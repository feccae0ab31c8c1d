//! Domain models for secrets-service.

pub mod audit;
pub mod environment;
pub mod import;
pub mod project;
pub mod secret;
pub mod user;
pub mod version;

pub use audit::{AuditAction, AuditEvent, AuditEventView, AuditFilter, AUDIT_QUERY_LIMIT};
pub use environment::{EnvName, Environment, EnvironmentAccessGrant};
pub use import::{ConflictStrategy, ImportDefaults, ImportOutcome, ImportPair, ParsedImport};
pub use project::{Project, ProjectSummary};
pub use secret::{
    DeletedSecret, ExportFormat, NewSecret, SecretChanges, SecretFilter, SecretRecord,
    SecretResponse, SecretType,
};
pub use user::{Role, User};
pub use version::SecretVersion;
