//! Audit log - append-only mutation trail and its filtered reader.

use std::sync::Arc;

use anyhow::anyhow;
use serde_json::Value;
use tracing::{error, instrument};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{AuditAction, AuditEvent, AuditEventView, AuditFilter};
use crate::services::metrics::record_error;
use crate::services::store::SecretStore;

#[derive(Clone)]
pub struct AuditLog {
    store: Arc<dyn SecretStore>,
}

impl AuditLog {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self { store }
    }

    /// Appends one event for a completed mutation. A write failure is
    /// logged and counted but never propagated: the mutation already
    /// happened and must not be reported as failed.
    pub async fn record(
        &self,
        actor: Uuid,
        project_id: Option<Uuid>,
        action: AuditAction,
        target_type: &str,
        target_id: Option<String>,
        metadata: Value,
    ) {
        let event = AuditEvent::new(actor, project_id, action, target_type, target_id, metadata);
        if let Err(e) = self.store.append_audit_event(&event).await {
            record_error("audit_write");
            error!(
                error = %e,
                action = action.as_str(),
                "Failed to append audit event"
            );
        }
    }

    /// Returns the newest matching events, capped at the query limit.
    /// Restricted to admins.
    #[instrument(skip(self, filter), fields(user_id = %user_id))]
    pub async fn query(
        &self,
        user_id: Uuid,
        filter: &AuditFilter,
    ) -> Result<Vec<AuditEventView>, AppError> {
        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow!("User not found")))?;
        if !user.is_admin() {
            return Err(AppError::AccessDenied(anyhow!(
                "Admin role required to query audit events"
            )));
        }
        self.store.find_audit_events(filter).await
    }
}
