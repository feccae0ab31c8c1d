//! In-memory secret store.
//!
//! Same contract as [`super::database::Database`], backed by process-local
//! state behind an async RwLock. Used by the test suite and by embedders
//! that want the catalog without a database. Seeding of users, projects,
//! environments, memberships, and grants goes through the `add_*` methods;
//! everything else arrives via the [`SecretStore`] trait.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    AuditEvent, AuditEventView, AuditFilter, DeletedSecret, EnvName, Environment,
    EnvironmentAccessGrant, NewSecret, Project, ProjectSummary, SecretChanges, SecretFilter,
    SecretRecord, SecretType, SecretVersion, User, AUDIT_QUERY_LIMIT,
};
use crate::services::store::SecretStore;

#[derive(Debug, Clone)]
struct StoredSecret {
    id: Uuid,
    environment_id: Uuid,
    name: String,
    provider: String,
    secret_type: String,
    key_name: String,
    value: String,
    tags: Vec<String>,
    note: Option<String>,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
    updated_by: Option<Uuid>,
}

#[derive(Debug, Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    projects: HashMap<Uuid, Project>,
    project_tags: HashMap<Uuid, Vec<String>>,
    environments: HashMap<Uuid, Environment>,
    memberships: Vec<(Uuid, Uuid)>,
    grants: HashMap<(Uuid, Uuid), EnvironmentAccessGrant>,
    secrets: HashMap<Uuid, StoredSecret>,
    versions: HashMap<Uuid, Vec<SecretVersion>>,
    audit_events: Vec<AuditEvent>,
}

impl MemoryState {
    fn record(&self, secret: &StoredSecret) -> Option<SecretRecord> {
        let environment = self.environments.get(&secret.environment_id)?;
        let project = self.projects.get(&environment.project_id)?;
        Some(SecretRecord {
            id: secret.id,
            project_id: project.id,
            project_name: project.name.clone(),
            environment_id: environment.id,
            environment: environment.name.clone(),
            name: secret.name.clone(),
            provider: secret.provider.clone(),
            secret_type: secret.secret_type.clone(),
            key_name: secret.key_name.clone(),
            value: secret.value.clone(),
            tags: secret.tags.clone(),
            note: secret.note.clone(),
            created_at: secret.created_at,
            updated_at: secret.updated_at,
            updated_by: secret.updated_by,
        })
    }

    fn is_member(&self, user_id: Uuid, project_id: Uuid) -> bool {
        self.memberships
            .iter()
            .any(|(u, p)| *u == user_id && *p == project_id)
    }

    fn can_read_env(&self, user_id: Uuid, environment: &Environment) -> bool {
        if !self.is_member(user_id, environment.project_id) {
            return false;
        }
        if environment.name != EnvName::Prod.as_str() {
            return true;
        }
        self.grants
            .get(&(user_id, environment.id))
            .map(|g| g.can_read)
            .unwrap_or(false)
    }
}

/// Process-local [`SecretStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, user: User) {
        self.state.write().await.users.insert(user.id, user);
    }

    pub async fn add_project(&self, project: Project, tags: Vec<String>) {
        let mut state = self.state.write().await;
        state.project_tags.insert(project.id, tags);
        state.projects.insert(project.id, project);
    }

    pub async fn add_environment(&self, project_id: Uuid, name: EnvName) -> Uuid {
        let id = Uuid::new_v4();
        self.state.write().await.environments.insert(
            id,
            Environment {
                id,
                project_id,
                name: name.as_str().to_string(),
            },
        );
        id
    }

    pub async fn add_membership(&self, user_id: Uuid, project_id: Uuid) {
        self.state
            .write()
            .await
            .memberships
            .push((user_id, project_id));
    }

    pub async fn add_grant(
        &self,
        user_id: Uuid,
        environment_id: Uuid,
        can_read: bool,
        can_export: bool,
    ) {
        self.state.write().await.grants.insert(
            (user_id, environment_id),
            EnvironmentAccessGrant {
                user_id,
                environment_id,
                can_read,
                can_export,
            },
        );
    }
}

#[async_trait]
impl SecretStore for MemoryStore {
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.state.read().await.users.get(&user_id).cloned())
    }

    async fn find_project(&self, project_id: Uuid) -> Result<Option<Project>, AppError> {
        Ok(self.state.read().await.projects.get(&project_id).cloned())
    }

    async fn find_environment(
        &self,
        project_id: Uuid,
        env: EnvName,
    ) -> Result<Option<Environment>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .environments
            .values()
            .find(|e| e.project_id == project_id && e.name == env.as_str())
            .cloned())
    }

    async fn has_membership(&self, user_id: Uuid, project_id: Uuid) -> Result<bool, AppError> {
        Ok(self.state.read().await.is_member(user_id, project_id))
    }

    async fn find_grant(
        &self,
        user_id: Uuid,
        environment_id: Uuid,
    ) -> Result<Option<EnvironmentAccessGrant>, AppError> {
        Ok(self
            .state
            .read()
            .await
            .grants
            .get(&(user_id, environment_id))
            .cloned())
    }

    async fn list_projects_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<ProjectSummary>, AppError> {
        let state = self.state.read().await;
        let mut summaries: Vec<ProjectSummary> = state
            .projects
            .values()
            .filter(|p| state.is_member(user_id, p.id))
            .map(|p| {
                let mut tags = state.project_tags.get(&p.id).cloned().unwrap_or_default();
                tags.sort();
                let key_count = state
                    .secrets
                    .values()
                    .filter(|s| {
                        state
                            .environments
                            .get(&s.environment_id)
                            .map(|e| e.project_id == p.id && state.can_read_env(user_id, e))
                            .unwrap_or(false)
                    })
                    .count() as i64;
                let prod_access = state
                    .environments
                    .values()
                    .filter(|e| e.project_id == p.id && e.name == EnvName::Prod.as_str())
                    .any(|e| {
                        state
                            .grants
                            .get(&(user_id, e.id))
                            .map(|g| g.can_read)
                            .unwrap_or(false)
                    });
                ProjectSummary {
                    id: p.id,
                    name: p.name.clone(),
                    tags,
                    key_count,
                    prod_access,
                }
            })
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(summaries)
    }

    async fn list_secrets_for_user(
        &self,
        user_id: Uuid,
        filter: &SecretFilter,
    ) -> Result<Vec<SecretRecord>, AppError> {
        let state = self.state.read().await;
        let mut records: Vec<SecretRecord> = state
            .secrets
            .values()
            .filter(|s| {
                state
                    .environments
                    .get(&s.environment_id)
                    .map(|e| state.can_read_env(user_id, e))
                    .unwrap_or(false)
            })
            .filter_map(|s| state.record(s))
            .filter(|r| filter.matches(r))
            .collect();
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(records)
    }

    async fn get_secret(&self, secret_id: Uuid) -> Result<Option<SecretRecord>, AppError> {
        let state = self.state.read().await;
        Ok(state.secrets.get(&secret_id).and_then(|s| state.record(s)))
    }

    async fn find_secret_by_key(
        &self,
        environment_id: Uuid,
        key_name: &str,
    ) -> Result<Option<SecretRecord>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .secrets
            .values()
            .filter(|s| s.environment_id == environment_id && s.key_name == key_name)
            .max_by_key(|s| s.updated_at)
            .and_then(|s| state.record(s)))
    }

    async fn insert_secret(
        &self,
        environment_id: Uuid,
        fields: &NewSecret,
        editor: Uuid,
    ) -> Result<SecretRecord, AppError> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let secret = StoredSecret {
            id: Uuid::new_v4(),
            environment_id,
            name: fields.name.clone(),
            provider: fields.provider.clone(),
            secret_type: fields.secret_type.as_str().to_string(),
            key_name: fields.key_name.clone(),
            value: fields.value.clone(),
            tags: fields.tags.clone(),
            note: fields.note.clone(),
            created_at: now,
            updated_at: now,
            updated_by: Some(editor),
        };
        let record = state.record(&secret).ok_or_else(|| {
            AppError::DatabaseError(anyhow::anyhow!(
                "Environment {} not found for insert",
                environment_id
            ))
        })?;
        state.secrets.insert(secret.id, secret);
        Ok(record)
    }

    async fn update_secret(
        &self,
        secret_id: Uuid,
        changes: &SecretChanges,
        editor: Uuid,
    ) -> Result<Option<SecretRecord>, AppError> {
        let mut state = self.state.write().await;
        let Some(secret) = state.secrets.get_mut(&secret_id) else {
            return Ok(None);
        };
        if let Some(name) = &changes.name {
            secret.name = name.clone();
        }
        if let Some(provider) = &changes.provider {
            secret.provider = provider.clone();
        }
        if let Some(secret_type) = changes.secret_type {
            secret.secret_type = secret_type.as_str().to_string();
        }
        if let Some(key_name) = &changes.key_name {
            secret.key_name = key_name.clone();
        }
        if let Some(value) = &changes.value {
            secret.value = value.clone();
        }
        if let Some(tags) = &changes.tags {
            secret.tags = tags.clone();
        }
        if let Some(note) = &changes.note {
            secret.note = Some(note.clone());
        }
        secret.updated_at = Utc::now();
        secret.updated_by = Some(editor);
        let secret = secret.clone();
        Ok(state.record(&secret))
    }

    async fn delete_secret(&self, secret_id: Uuid) -> Result<Option<DeletedSecret>, AppError> {
        let mut state = self.state.write().await;
        let Some(secret) = state.secrets.remove(&secret_id) else {
            return Ok(None);
        };
        // Versions stay behind for audit.
        let project_id = state
            .environments
            .get(&secret.environment_id)
            .map(|e| e.project_id)
            .unwrap_or(Uuid::nil());
        Ok(Some(DeletedSecret {
            project_id,
            name: secret.name,
        }))
    }

    async fn export_pairs(&self, environment_id: Uuid) -> Result<Vec<(String, String)>, AppError> {
        let state = self.state.read().await;
        let mut pairs: Vec<(String, String)> = state
            .secrets
            .values()
            .filter(|s| s.environment_id == environment_id)
            .map(|s| (s.key_name.clone(), s.value.clone()))
            .collect();
        pairs.sort();
        Ok(pairs)
    }

    async fn snapshot_and_update(
        &self,
        secret_id: Uuid,
        value: &str,
        provider: &str,
        secret_type: SecretType,
        editor: Uuid,
    ) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        let Some(secret) = state.secrets.get(&secret_id) else {
            return Ok(());
        };
        let current_value = secret.value.clone();
        let versions = state.versions.entry(secret_id).or_default();
        let next = versions.iter().map(|v| v.version).max().unwrap_or(0) + 1;
        versions.push(SecretVersion {
            id: Uuid::new_v4(),
            secret_id,
            version: next,
            value: current_value,
            created_by: Some(editor),
            created_at: Utc::now(),
        });
        // Both halves apply under one write lock, mirroring the SQL
        // transaction boundary.
        if let Some(secret) = state.secrets.get_mut(&secret_id) {
            secret.value = value.to_string();
            secret.provider = provider.to_string();
            secret.secret_type = secret_type.as_str().to_string();
            secret.updated_at = Utc::now();
            secret.updated_by = Some(editor);
        }
        Ok(())
    }

    async fn list_versions(&self, secret_id: Uuid) -> Result<Vec<SecretVersion>, AppError> {
        let state = self.state.read().await;
        let mut versions = state.versions.get(&secret_id).cloned().unwrap_or_default();
        versions.sort_by_key(|v| v.version);
        Ok(versions)
    }

    async fn append_audit_event(&self, event: &AuditEvent) -> Result<(), AppError> {
        self.state.write().await.audit_events.push(event.clone());
        Ok(())
    }

    async fn find_audit_events(
        &self,
        filter: &AuditFilter,
    ) -> Result<Vec<AuditEventView>, AppError> {
        let state = self.state.read().await;
        let mut events: Vec<&AuditEvent> = state
            .audit_events
            .iter()
            .filter(|e| {
                if let Some(action) = &filter.action {
                    if &e.action != action {
                        return false;
                    }
                }
                if let Some(project_id) = filter.project_id {
                    if e.project_id != Some(project_id) {
                        return false;
                    }
                }
                if let Some(email) = &filter.actor_email {
                    let matches = e
                        .user_id
                        .and_then(|id| state.users.get(&id))
                        .map(|u| &u.email == email)
                        .unwrap_or(false);
                    if !matches {
                        return false;
                    }
                }
                if let Some(from) = filter.from {
                    if e.created_at < from {
                        return false;
                    }
                }
                if let Some(to) = filter.to {
                    if e.created_at > to {
                        return false;
                    }
                }
                true
            })
            .collect();
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        events.truncate(AUDIT_QUERY_LIMIT);

        Ok(events
            .into_iter()
            .map(|e| AuditEventView {
                id: e.id,
                action: e.action.clone(),
                target_type: e.target_type.clone(),
                target_id: e.target_id.clone(),
                actor: e
                    .user_id
                    .and_then(|id| state.users.get(&id))
                    .map(|u| u.email.clone())
                    .unwrap_or_else(|| "unknown".to_string()),
                project: e
                    .project_id
                    .and_then(|id| state.projects.get(&id))
                    .map(|p| p.name.clone())
                    .unwrap_or_else(|| "unknown".to_string()),
                project_id: e.project_id,
                secret_name: e
                    .metadata
                    .get("secretName")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string()),
                metadata: e.metadata.clone(),
                created_at: e.created_at,
            })
            .collect())
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}
