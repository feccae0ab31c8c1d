//! Audit event model - append-only trail of access-relevant mutations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Most-recent-first cap on audit query results.
pub const AUDIT_QUERY_LIMIT: usize = 200;

/// Audit action kinds. An import commit records `SecretUpdated` with
/// target type `import` and a summarizing metadata payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    SecretCreated,
    SecretUpdated,
    SecretDeleted,
    SecretCopied,
    SecretExported,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::SecretCreated => "secret_created",
            AuditAction::SecretUpdated => "secret_updated",
            AuditAction::SecretDeleted => "secret_deleted",
            AuditAction::SecretCopied => "secret_copied",
            AuditAction::SecretExported => "secret_exported",
        }
    }
}

/// Audit event entity as appended to the store. Never mutated after insert.
#[derive(Debug, Clone, FromRow)]
pub struct AuditEvent {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub action: String,
    pub target_type: String,
    pub target_id: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        actor_user_id: Uuid,
        project_id: Option<Uuid>,
        action: AuditAction,
        target_type: &str,
        target_id: Option<String>,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: Some(actor_user_id),
            project_id,
            action: action.as_str().to_string(),
            target_type: target_type.to_string(),
            target_id,
            metadata,
            created_at: Utc::now(),
        }
    }
}

/// Optional audit query filters; unset fields match everything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditFilter {
    pub action: Option<String>,
    pub project_id: Option<Uuid>,
    pub actor_email: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Audit event as rendered for the reader: actor and project resolved to
/// labels ("unknown" when the row no longer resolves), with the secret name
/// lifted out of the metadata when present.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AuditEventView {
    pub id: Uuid,
    pub action: String,
    pub target_type: String,
    pub target_id: Option<String>,
    pub actor: String,
    pub project: String,
    pub project_id: Option<Uuid>,
    pub secret_name: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
