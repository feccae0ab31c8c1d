//! Secret model - catalog records, write payloads, and the list filter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::environment::EnvName;
use crate::services::masking::mask;

/// Secret type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretType {
    Key,
    Token,
    Endpoint,
}

impl SecretType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecretType::Key => "key",
            SecretType::Token => "token",
            SecretType::Endpoint => "endpoint",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "key" => Some(SecretType::Key),
            "token" => Some(SecretType::Token),
            "endpoint" => Some(SecretType::Endpoint),
            _ => None,
        }
    }
}

/// Export rendering formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Env,
    Json,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Env => "env",
            ExportFormat::Json => "json",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "env" => Some(ExportFormat::Env),
            "json" => Some(ExportFormat::Json),
            _ => None,
        }
    }
}

/// Full secret record as loaded from the store, joined with its project,
/// environment, tags, and note. Holds the plaintext value; deliberately not
/// serializable - display goes through [`SecretResponse`].
#[derive(Debug, Clone, FromRow)]
pub struct SecretRecord {
    pub id: Uuid,
    pub project_id: Uuid,
    pub project_name: String,
    pub environment_id: Uuid,
    pub environment: String,
    pub name: String,
    pub provider: String,
    pub secret_type: String,
    pub key_name: String,
    pub value: String,
    pub tags: Vec<String>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Option<Uuid>,
}

/// Fields for a new secret.
#[derive(Debug, Clone, Deserialize)]
pub struct NewSecret {
    pub name: String,
    pub provider: String,
    pub secret_type: SecretType,
    pub key_name: String,
    pub value: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub note: Option<String>,
}

/// Partial update. Unset fields keep their prior values; `tags` replaces the
/// whole tag set when present; `note` upserts the note when present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecretChanges {
    pub name: Option<String>,
    pub provider: Option<String>,
    pub secret_type: Option<SecretType>,
    pub key_name: Option<String>,
    pub value: Option<String>,
    pub tags: Option<Vec<String>>,
    pub note: Option<String>,
}

/// List filter: a conjunction over optional fields. Each set field
/// contributes one predicate; the free-text `query` lowercases and
/// substring-matches name, provider, key name, and any tag.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecretFilter {
    pub project_id: Option<Uuid>,
    pub environment: Option<EnvName>,
    pub provider: Option<String>,
    pub secret_type: Option<SecretType>,
    pub tag: Option<String>,
    pub query: Option<String>,
}

impl SecretFilter {
    /// Evaluate the conjunction against one record. The in-memory store runs
    /// the same predicates the SQL store binds as WHERE clauses.
    pub fn matches(&self, secret: &SecretRecord) -> bool {
        if let Some(project_id) = self.project_id {
            if secret.project_id != project_id {
                return false;
            }
        }
        if let Some(env) = self.environment {
            if secret.environment != env.as_str() {
                return false;
            }
        }
        if let Some(provider) = &self.provider {
            if &secret.provider != provider {
                return false;
            }
        }
        if let Some(secret_type) = self.secret_type {
            if secret.secret_type != secret_type.as_str() {
                return false;
            }
        }
        if let Some(tag) = &self.tag {
            if !secret.tags.iter().any(|t| t == tag) {
                return false;
            }
        }
        if let Some(query) = &self.query {
            let q = query.to_lowercase();
            let hit = secret.name.to_lowercase().contains(&q)
                || secret.provider.to_lowercase().contains(&q)
                || secret.key_name.to_lowercase().contains(&q)
                || secret.tags.iter().any(|t| t.to_lowercase().contains(&q));
            if !hit {
                return false;
            }
        }
        true
    }
}

/// What a delete reports back: enough to audit the removal.
#[derive(Debug, Clone, FromRow)]
pub struct DeletedSecret {
    pub project_id: Uuid,
    pub name: String,
}

/// Display-safe secret: the plaintext is replaced with its masked form.
#[derive(Debug, Clone, Serialize)]
pub struct SecretResponse {
    pub id: Uuid,
    pub project_id: Uuid,
    pub project: String,
    pub environment: String,
    pub name: String,
    pub provider: String,
    pub secret_type: String,
    pub key_name: String,
    pub masked_value: String,
    pub tags: Vec<String>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Option<Uuid>,
}

impl From<SecretRecord> for SecretResponse {
    fn from(s: SecretRecord) -> Self {
        Self {
            id: s.id,
            project_id: s.project_id,
            project: s.project_name,
            environment: s.environment,
            name: s.name,
            provider: s.provider,
            secret_type: s.secret_type,
            key_name: s.key_name,
            masked_value: mask(&s.value),
            tags: s.tags,
            note: s.note,
            created_at: s.created_at,
            updated_at: s.updated_at,
            updated_by: s.updated_by,
        }
    }
}
