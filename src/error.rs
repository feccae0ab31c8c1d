//! Error taxonomy for the secret catalog and reconciliation engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// The caller lacks the required project or environment grant. At the read
    /// boundary this is conflated with missing records (see catalog ops that
    /// return `Ok(None)`), so restricted secrets never leak their existence.
    #[error("Access denied: {0}")]
    AccessDenied(anyhow::Error),

    #[error("Not found: {0}")]
    NotFound(anyhow::Error),

    #[error("Database error: {0}")]
    DatabaseError(anyhow::Error),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    /// Stable label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::AccessDenied(_) => "access_denied",
            AppError::NotFound(_) => "not_found",
            AppError::DatabaseError(_) => "database_error",
            AppError::ConfigError(_) => "config_error",
            AppError::InternalError(_) => "internal_error",
        }
    }
}
