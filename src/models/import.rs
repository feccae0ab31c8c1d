//! Import model - parsed bulk text and reconciliation outcomes.

use serde::{Deserialize, Serialize};

use crate::models::secret::SecretType;

/// One `KEY=value` line, trimmed. Duplicate keys are kept in input order;
/// reconciliation applies them in order so the last one wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportPair {
    pub key: String,
    pub value: String,
}

/// Parser output: optional `[heading]`, ordered pairs, and the count of
/// malformed lines that were dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedImport {
    pub heading: Option<String>,
    pub pairs: Vec<ImportPair>,
    pub skipped: u32,
}

/// What to do when an imported key already exists in the target environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStrategy {
    Skip,
    Overwrite,
    NewVersion,
}

impl ConflictStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictStrategy::Skip => "skip",
            ConflictStrategy::Overwrite => "overwrite",
            ConflictStrategy::NewVersion => "new_version",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "skip" => Some(ConflictStrategy::Skip),
            "overwrite" => Some(ConflictStrategy::Overwrite),
            "new_version" => Some(ConflictStrategy::NewVersion),
            _ => None,
        }
    }
}

/// Defaults applied to secrets created by an import run.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportDefaults {
    pub provider: String,
    pub secret_type: SecretType,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Per-run counters. `skipped` folds parser skips together with
/// conflict-policy skips; `total` is the number of parsed pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportOutcome {
    pub inserted: u32,
    pub updated: u32,
    pub skipped: u32,
    pub total: u32,
}
