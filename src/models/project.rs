//! Project model - the tenancy boundary for secrets.

use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Project entity. Created and deleted by project management outside this
/// crate; the catalog only reads it.
#[derive(Debug, Clone, FromRow)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
}

/// Per-user project summary: what the workspace switcher renders.
/// `key_count` counts only the secrets the user can actually see (prod
/// excluded without a read grant); `prod_access` mirrors that grant.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProjectSummary {
    pub id: Uuid,
    pub name: String,
    pub tags: Vec<String>,
    pub key_count: i64,
    pub prod_access: bool,
}
