//! Access policy - membership and grant evaluation.
//!
//! Pure predicates over membership and grant data. Any missing linkage
//! (unknown project, unknown environment, no grant) evaluates to false
//! rather than an error, so a caller cannot tell "denied" apart from
//! "does not exist" - prod secrets never leak their existence. `Err` is
//! reserved for substrate failure.

use std::sync::Arc;

use uuid::Uuid;

use crate::error::AppError;
use crate::models::EnvName;
use crate::services::store::SecretStore;

#[derive(Clone)]
pub struct AccessPolicy {
    store: Arc<dyn SecretStore>,
}

impl AccessPolicy {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self { store }
    }

    /// True iff a membership row links the user to the project.
    pub async fn has_project_access(
        &self,
        user_id: Uuid,
        project_id: Uuid,
    ) -> Result<bool, AppError> {
        self.store.has_membership(user_id, project_id).await
    }

    /// True iff the user is a member and, for prod, holds a read grant on
    /// the environment.
    pub async fn has_environment_access(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        env: EnvName,
    ) -> Result<bool, AppError> {
        let Some(environment) = self.store.find_environment(project_id, env).await? else {
            return Ok(false);
        };
        if !self.store.has_membership(user_id, project_id).await? {
            return Ok(false);
        }
        if !env.is_prod() {
            return Ok(true);
        }
        Ok(self
            .store
            .find_grant(user_id, environment.id)
            .await?
            .map(|g| g.can_read)
            .unwrap_or(false))
    }

    /// As [`Self::has_environment_access`], but prod requires an export
    /// grant.
    pub async fn has_export_access(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        env: EnvName,
    ) -> Result<bool, AppError> {
        let Some(environment) = self.store.find_environment(project_id, env).await? else {
            return Ok(false);
        };
        if !self.store.has_membership(user_id, project_id).await? {
            return Ok(false);
        }
        if !env.is_prod() {
            return Ok(true);
        }
        Ok(self
            .store
            .find_grant(user_id, environment.id)
            .await?
            .map(|g| g.can_export)
            .unwrap_or(false))
    }
}
