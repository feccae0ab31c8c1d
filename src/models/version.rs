//! Secret version model - append-only value history.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// One snapshot of a secret's prior value. Version numbers start at 1 and
/// increase monotonically per secret; rows are never deleted, so history
/// survives the secret itself.
#[derive(Debug, Clone, FromRow)]
pub struct SecretVersion {
    pub id: Uuid,
    pub secret_id: Uuid,
    pub version: i32,
    pub value: String,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}
