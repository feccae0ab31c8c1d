//! Persistence seam: the substrate contract behind every component.
//!
//! Components receive an `Arc<dyn SecretStore>` at construction; nothing in
//! this crate touches a pool or a map directly. [`super::database::Database`]
//! implements the contract over Postgres, [`super::memory::MemoryStore`]
//! over process-local state for tests and lightweight embedding.
//!
//! Mutating operations are atomic per call: a secret row and its tags/note
//! move together, and a version snapshot commits in the same transaction as
//! the value it precedes. Dropping an in-flight call rolls the transaction
//! back; a cancelled read has no side effects.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    AuditEvent, AuditEventView, AuditFilter, DeletedSecret, EnvName, Environment,
    EnvironmentAccessGrant, NewSecret, Project, ProjectSummary, SecretChanges, SecretFilter,
    SecretRecord, SecretType, SecretVersion, User,
};

#[async_trait]
pub trait SecretStore: Send + Sync {
    // ---- Identity and tenancy lookups ----

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, AppError>;

    async fn find_project(&self, project_id: Uuid) -> Result<Option<Project>, AppError>;

    async fn find_environment(
        &self,
        project_id: Uuid,
        env: EnvName,
    ) -> Result<Option<Environment>, AppError>;

    async fn has_membership(&self, user_id: Uuid, project_id: Uuid) -> Result<bool, AppError>;

    async fn find_grant(
        &self,
        user_id: Uuid,
        environment_id: Uuid,
    ) -> Result<Option<EnvironmentAccessGrant>, AppError>;

    async fn list_projects_for_user(&self, user_id: Uuid)
        -> Result<Vec<ProjectSummary>, AppError>;

    // ---- Secrets ----

    /// Secrets across every project the user belongs to, already narrowed by
    /// membership and the prod read gate, newest update first. The filter's
    /// predicates apply on top.
    async fn list_secrets_for_user(
        &self,
        user_id: Uuid,
        filter: &SecretFilter,
    ) -> Result<Vec<SecretRecord>, AppError>;

    async fn get_secret(&self, secret_id: Uuid) -> Result<Option<SecretRecord>, AppError>;

    /// Most recently updated secret with this key name in the environment,
    /// if any. Key names are not unique at the storage layer.
    async fn find_secret_by_key(
        &self,
        environment_id: Uuid,
        key_name: &str,
    ) -> Result<Option<SecretRecord>, AppError>;

    /// Insert the secret row together with its tag set and note in one
    /// transaction.
    async fn insert_secret(
        &self,
        environment_id: Uuid,
        fields: &NewSecret,
        editor: Uuid,
    ) -> Result<SecretRecord, AppError>;

    /// Apply a partial update; unset fields keep their stored values. Tags
    /// are wholesale-replaced and the note upserted when present, in the
    /// same transaction as the row. `Ok(None)` if the secret is gone.
    async fn update_secret(
        &self,
        secret_id: Uuid,
        changes: &SecretChanges,
        editor: Uuid,
    ) -> Result<Option<SecretRecord>, AppError>;

    /// Delete the secret with its tags and note. Version history stays.
    async fn delete_secret(&self, secret_id: Uuid) -> Result<Option<DeletedSecret>, AppError>;

    /// (key_name, plaintext) pairs for one environment, alphabetical by key.
    async fn export_pairs(&self, environment_id: Uuid) -> Result<Vec<(String, String)>, AppError>;

    // ---- Version history ----

    /// Snapshot the secret's current value as the next version number
    /// (`MAX(version) + 1`, starting at 1), then overwrite value, provider,
    /// and type - one transaction, so the version number is computed against
    /// the latest committed history even under concurrent imports.
    async fn snapshot_and_update(
        &self,
        secret_id: Uuid,
        value: &str,
        provider: &str,
        secret_type: SecretType,
        editor: Uuid,
    ) -> Result<(), AppError>;

    async fn list_versions(&self, secret_id: Uuid) -> Result<Vec<SecretVersion>, AppError>;

    // ---- Audit ----

    async fn append_audit_event(&self, event: &AuditEvent) -> Result<(), AppError>;

    /// Filtered audit events, newest first, capped at
    /// [`crate::models::AUDIT_QUERY_LIMIT`]. Actors and projects that no
    /// longer resolve render as "unknown".
    async fn find_audit_events(
        &self,
        filter: &AuditFilter,
    ) -> Result<Vec<AuditEventView>, AppError>;

    // ---- Liveness ----

    async fn health_check(&self) -> Result<(), AppError>;
}
