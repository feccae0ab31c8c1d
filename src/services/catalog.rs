//! Secret catalog - the tenant-scoped CRUD, export, and lookup surface.
//!
//! Every operation takes the acting user's id and runs the access policy
//! before touching a record. Read paths conflate "denied" with "missing"
//! (`Ok(None)` / empty list) so callers cannot probe for prod secrets;
//! write paths distinguish `NotFound` from `AccessDenied` because the
//! caller already proved the target exists. Each completed mutation
//! appends exactly one audit event.

use std::sync::Arc;

use anyhow::anyhow;
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    AuditAction, DeletedSecret, EnvName, ExportFormat, NewSecret, ProjectSummary, SecretChanges,
    SecretFilter, SecretRecord, SecretResponse, SecretVersion, User,
};
use crate::services::access::AccessPolicy;
use crate::services::audit::AuditLog;
use crate::services::metrics::{record_catalog_operation, record_error};
use crate::services::store::SecretStore;

#[derive(Clone)]
pub struct SecretCatalog {
    store: Arc<dyn SecretStore>,
    policy: AccessPolicy,
    audit: AuditLog,
}

/// Per-operation outcome counter; substrate errors are labelled by kind.
fn track<T>(operation: &str, result: &Result<T, AppError>) {
    match result {
        Ok(_) => record_catalog_operation(operation, "ok"),
        Err(e) => {
            record_catalog_operation(operation, "error");
            record_error(e.kind());
        }
    }
}

impl SecretCatalog {
    pub fn new(store: Arc<dyn SecretStore>, policy: AccessPolicy, audit: AuditLog) -> Self {
        Self {
            store,
            policy,
            audit,
        }
    }

    async fn require_user(&self, user_id: Uuid) -> Result<User, AppError> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow!("User not found")))
    }

    /// Loads a secret and runs the environment gate against it. `Ok(None)`
    /// covers both an unknown id and an id the user may not see.
    async fn accessible_secret(
        &self,
        user_id: Uuid,
        secret_id: Uuid,
    ) -> Result<Option<SecretRecord>, AppError> {
        let Some(record) = self.store.get_secret(secret_id).await? else {
            return Ok(None);
        };
        let Some(env) = EnvName::parse(&record.environment) else {
            return Ok(None);
        };
        if !self
            .policy
            .has_environment_access(user_id, record.project_id, env)
            .await?
        {
            return Ok(None);
        }
        Ok(Some(record))
    }

    // ---- Read surface ----

    /// Masked secrets across the user's projects, newest update first.
    /// Membership and the prod read gate narrow the result before the
    /// filter applies; an unknown user simply sees nothing.
    pub async fn list_secrets(
        &self,
        user_id: Uuid,
        filter: &SecretFilter,
    ) -> Result<Vec<SecretResponse>, AppError> {
        let records = self.store.list_secrets_for_user(user_id, filter).await?;
        Ok(records.into_iter().map(SecretResponse::from).collect())
    }

    /// Project summaries for the user's memberships: tags, visible key
    /// count, and whether prod is readable.
    pub async fn list_projects(&self, user_id: Uuid) -> Result<Vec<ProjectSummary>, AppError> {
        self.store.list_projects_for_user(user_id).await
    }

    /// One masked secret, or `None` when it does not exist or is out of
    /// reach.
    pub async fn get_secret_detail(
        &self,
        user_id: Uuid,
        secret_id: Uuid,
    ) -> Result<Option<SecretResponse>, AppError> {
        Ok(self
            .accessible_secret(user_id, secret_id)
            .await?
            .map(SecretResponse::from))
    }

    /// The plaintext value for an accessible secret. Deliberately not
    /// audited: reveal backs the clipboard flow, which reports itself
    /// through [`Self::record_copy`].
    pub async fn reveal_secret(
        &self,
        user_id: Uuid,
        secret_id: Uuid,
    ) -> Result<Option<String>, AppError> {
        Ok(self
            .accessible_secret(user_id, secret_id)
            .await?
            .map(|record| record.value))
    }

    /// Version history for an accessible secret, oldest first.
    pub async fn list_versions(
        &self,
        user_id: Uuid,
        secret_id: Uuid,
    ) -> Result<Option<Vec<SecretVersion>>, AppError> {
        if self.accessible_secret(user_id, secret_id).await?.is_none() {
            return Ok(None);
        }
        Ok(Some(self.store.list_versions(secret_id).await?))
    }

    /// Most recently updated secret with this key name in the environment.
    /// The same conflation as the other reads: no membership or no such
    /// environment both come back as `None`.
    pub async fn find_secret_by_key(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        env: EnvName,
        key_name: &str,
    ) -> Result<Option<SecretRecord>, AppError> {
        let Some(environment) = self.store.find_environment(project_id, env).await? else {
            return Ok(None);
        };
        if !self
            .policy
            .has_environment_access(user_id, project_id, env)
            .await?
        {
            return Ok(None);
        }
        self.store
            .find_secret_by_key(environment.id, key_name)
            .await
    }

    // ---- Write surface ----

    #[instrument(skip(self, fields), fields(user_id = %user_id, project_id = %project_id, env = %env.as_str()))]
    pub async fn create_secret(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        env: EnvName,
        fields: NewSecret,
    ) -> Result<SecretResponse, AppError> {
        let result = self
            .do_create_secret(user_id, project_id, env, fields)
            .await;
        track("create_secret", &result);
        result
    }

    async fn do_create_secret(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        env: EnvName,
        fields: NewSecret,
    ) -> Result<SecretResponse, AppError> {
        let user = self.require_user(user_id).await?;
        if user.is_viewer() {
            return Err(AppError::AccessDenied(anyhow!("Viewer role is read-only")));
        }
        let Some(environment) = self.store.find_environment(project_id, env).await? else {
            return Err(AppError::NotFound(anyhow!(
                "Project or environment not found"
            )));
        };
        if !self
            .policy
            .has_environment_access(user_id, project_id, env)
            .await?
        {
            return Err(AppError::AccessDenied(anyhow!(
                "No access to this environment"
            )));
        }

        let record = self
            .store
            .insert_secret(environment.id, &fields, user_id)
            .await?;
        self.audit
            .record(
                user_id,
                Some(project_id),
                AuditAction::SecretCreated,
                "secret",
                Some(record.id.to_string()),
                json!({ "secretName": record.name }),
            )
            .await;
        info!(secret_id = %record.id, name = %record.name, "Secret created");
        Ok(SecretResponse::from(record))
    }

    #[instrument(skip(self, changes), fields(user_id = %user_id, secret_id = %secret_id))]
    pub async fn update_secret(
        &self,
        user_id: Uuid,
        secret_id: Uuid,
        changes: SecretChanges,
    ) -> Result<Option<SecretResponse>, AppError> {
        let result = self.do_update_secret(user_id, secret_id, changes).await;
        track("update_secret", &result);
        result
    }

    async fn do_update_secret(
        &self,
        user_id: Uuid,
        secret_id: Uuid,
        changes: SecretChanges,
    ) -> Result<Option<SecretResponse>, AppError> {
        let user = self.require_user(user_id).await?;
        if user.is_viewer() {
            return Err(AppError::AccessDenied(anyhow!("Viewer role is read-only")));
        }
        if self.accessible_secret(user_id, secret_id).await?.is_none() {
            return Ok(None);
        }

        let Some(updated) = self.store.update_secret(secret_id, &changes, user_id).await? else {
            // Deleted between the access check and the write.
            return Ok(None);
        };
        self.audit
            .record(
                user_id,
                Some(updated.project_id),
                AuditAction::SecretUpdated,
                "secret",
                Some(updated.id.to_string()),
                json!({ "secretName": updated.name }),
            )
            .await;
        info!(name = %updated.name, "Secret updated");
        Ok(Some(SecretResponse::from(updated)))
    }

    /// Admin-only. Version history survives the delete.
    #[instrument(skip(self), fields(user_id = %user_id, secret_id = %secret_id))]
    pub async fn delete_secret(
        &self,
        user_id: Uuid,
        secret_id: Uuid,
    ) -> Result<Option<DeletedSecret>, AppError> {
        let result = self.do_delete_secret(user_id, secret_id).await;
        track("delete_secret", &result);
        result
    }

    async fn do_delete_secret(
        &self,
        user_id: Uuid,
        secret_id: Uuid,
    ) -> Result<Option<DeletedSecret>, AppError> {
        let user = self.require_user(user_id).await?;
        if !user.is_admin() {
            return Err(AppError::AccessDenied(anyhow!(
                "Admin role required to delete secrets"
            )));
        }
        if self.accessible_secret(user_id, secret_id).await?.is_none() {
            return Ok(None);
        }

        let Some(deleted) = self.store.delete_secret(secret_id).await? else {
            return Ok(None);
        };
        self.audit
            .record(
                user_id,
                Some(deleted.project_id),
                AuditAction::SecretDeleted,
                "secret",
                Some(secret_id.to_string()),
                json!({ "secretName": deleted.name, "event": "deleted" }),
            )
            .await;
        info!(name = %deleted.name, "Secret deleted");
        Ok(Some(deleted))
    }

    // ---- Export ----

    /// Renders every secret in one environment as env lines or a JSON
    /// object, keys alphabetical. Denial is reported as `NotFound` with the
    /// same message as a genuinely missing environment.
    #[instrument(skip(self), fields(user_id = %user_id, project_id = %project_id, env = %env.as_str(), format = %format.as_str()))]
    pub async fn export_secrets(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        env: EnvName,
        format: ExportFormat,
    ) -> Result<String, AppError> {
        let result = self.do_export_secrets(user_id, project_id, env, format).await;
        track("export_secrets", &result);
        result
    }

    async fn do_export_secrets(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        env: EnvName,
        format: ExportFormat,
    ) -> Result<String, AppError> {
        let Some(project) = self.store.find_project(project_id).await? else {
            return Err(AppError::NotFound(anyhow!(
                "Project or environment not found"
            )));
        };
        let Some(environment) = self.store.find_environment(project_id, env).await? else {
            return Err(AppError::NotFound(anyhow!(
                "Project or environment not found"
            )));
        };
        if !self
            .policy
            .has_environment_access(user_id, project_id, env)
            .await?
        {
            // Same message as the unresolved case, so a denied caller learns
            // nothing about what exists. Read access suffices here; outer
            // surfaces layer the export grant and prod confirmation via
            // [`AccessPolicy::has_export_access`].
            return Err(AppError::NotFound(anyhow!(
                "Project or environment not found"
            )));
        }

        let pairs = self.store.export_pairs(environment.id).await?;
        self.audit
            .record(
                user_id,
                Some(project_id),
                AuditAction::SecretExported,
                "project",
                Some(project_id.to_string()),
                json!({
                    "secretName": format!("{}:{}", project.name, env.as_str()),
                    "format": format.as_str(),
                    "count": pairs.len(),
                }),
            )
            .await;
        info!(count = pairs.len(), "Environment exported");
        render_pairs(&pairs, format)
    }

    // ---- Copy tracking ----

    /// Append-only record of a clipboard copy. `secret_id` is taken as the
    /// caller reported it; when a project is named the caller must belong
    /// to it.
    pub async fn record_copy(
        &self,
        user_id: Uuid,
        secret_id: &str,
        project_id: Option<Uuid>,
    ) -> Result<(), AppError> {
        let result = self.do_record_copy(user_id, secret_id, project_id).await;
        track("record_copy", &result);
        result
    }

    async fn do_record_copy(
        &self,
        user_id: Uuid,
        secret_id: &str,
        project_id: Option<Uuid>,
    ) -> Result<(), AppError> {
        self.require_user(user_id).await?;
        if let Some(project_id) = project_id {
            if !self.policy.has_project_access(user_id, project_id).await? {
                return Err(AppError::AccessDenied(anyhow!(
                    "Not a member of the target project"
                )));
            }
        }
        self.audit
            .record(
                user_id,
                project_id,
                AuditAction::SecretCopied,
                "secret",
                Some(secret_id.to_string()),
                json!({ "secretName": secret_id, "projectId": project_id }),
            )
            .await;
        Ok(())
    }
}

/// One `KEY=value` line per pair for env format; a flat JSON object with
/// sorted keys for json format.
fn render_pairs(pairs: &[(String, String)], format: ExportFormat) -> Result<String, AppError> {
    match format {
        ExportFormat::Env => Ok(pairs
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect::<Vec<_>>()
            .join("\n")),
        ExportFormat::Json => {
            let map: serde_json::Map<String, serde_json::Value> = pairs
                .iter()
                .map(|(key, value)| (key.clone(), serde_json::Value::String(value.clone())))
                .collect();
            serde_json::to_string_pretty(&map)
                .map_err(|e| AppError::InternalError(anyhow::Error::new(e)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_env_joins_lines_without_trailing_newline() {
        let pairs = vec![
            ("API_KEY".to_string(), "abc".to_string()),
            ("DB_URL".to_string(), "postgres://x".to_string()),
        ];
        let out = render_pairs(&pairs, ExportFormat::Env).unwrap();
        assert_eq!(out, "API_KEY=abc\nDB_URL=postgres://x");
    }

    #[test]
    fn render_json_sorts_keys_alphabetically() {
        let pairs = vec![
            ("ZETA".to_string(), "1".to_string()),
            ("ALPHA".to_string(), "2".to_string()),
        ];
        let out = render_pairs(&pairs, ExportFormat::Json).unwrap();
        let alpha = out.find("ALPHA").unwrap();
        let zeta = out.find("ZETA").unwrap();
        assert!(alpha < zeta);
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["ZETA"], "1");
        assert_eq!(parsed["ALPHA"], "2");
    }

    #[test]
    fn render_env_handles_empty_environment() {
        let out = render_pairs(&[], ExportFormat::Env).unwrap();
        assert_eq!(out, "");
    }
}
