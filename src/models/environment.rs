//! Environment model - deployment tiers scoping a project's secrets.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Deployment tier names. `local` and `dev` are open to any project member;
/// `prod` requires an explicit read grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvName {
    Local,
    Dev,
    Prod,
}

impl EnvName {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvName::Local => "local",
            EnvName::Dev => "dev",
            EnvName::Prod => "prod",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "local" => Some(EnvName::Local),
            "dev" => Some(EnvName::Dev),
            "prod" => Some(EnvName::Prod),
            _ => None,
        }
    }

    pub fn is_prod(&self) -> bool {
        matches!(self, EnvName::Prod)
    }
}

/// Environment entity, always scoped to exactly one project.
#[derive(Debug, Clone, FromRow)]
pub struct Environment {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
}

/// Per-user, per-environment permission row. Only meaningful for prod;
/// a missing row reads as `can_read = false`.
#[derive(Debug, Clone, FromRow)]
pub struct EnvironmentAccessGrant {
    pub user_id: Uuid,
    pub environment_id: Uuid,
    pub can_read: bool,
    pub can_export: bool,
}
