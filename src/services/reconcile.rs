//! Reconciliation engine - applies a parsed import against one environment.
//!
//! Each pair resolves independently by key name: unseen keys insert, known
//! keys follow the conflict strategy (skip, overwrite, or snapshot the old
//! value as a new version first). A substrate failure aborts the remainder
//! of the batch but keeps what already committed, and the run still writes
//! its single summarizing audit event with the partial counts.

use std::sync::Arc;

use anyhow::anyhow;
use serde_json::json;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    AuditAction, ConflictStrategy, EnvName, Environment, ImportDefaults, ImportOutcome,
    ImportPair, NewSecret, ParsedImport, SecretChanges,
};
use crate::services::access::AccessPolicy;
use crate::services::audit::AuditLog;
use crate::services::metrics::{record_error, record_import_pair, record_import_run};
use crate::services::store::SecretStore;

#[derive(Clone)]
pub struct ReconciliationEngine {
    store: Arc<dyn SecretStore>,
    policy: AccessPolicy,
    audit: AuditLog,
}

enum PairApplied {
    Inserted,
    Updated,
    Skipped,
}

impl ReconciliationEngine {
    pub fn new(store: Arc<dyn SecretStore>, policy: AccessPolicy, audit: AuditLog) -> Self {
        Self {
            store,
            policy,
            audit,
        }
    }

    /// Commits a parsed import into `(project, env)`. Admin-only. Returns
    /// the final counts; `skipped` folds the parser's skipped lines in with
    /// pairs passed over by the conflict strategy.
    #[instrument(
        skip(self, parsed, defaults),
        fields(
            user_id = %user_id,
            project_id = %project_id,
            env = %env.as_str(),
            strategy = %strategy.as_str(),
            pairs = parsed.pairs.len(),
        )
    )]
    pub async fn commit(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        env: EnvName,
        parsed: &ParsedImport,
        defaults: &ImportDefaults,
        strategy: ConflictStrategy,
    ) -> Result<ImportOutcome, AppError> {
        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow!("User not found")))?;
        if !user.is_admin() {
            return Err(AppError::AccessDenied(anyhow!(
                "Admin role required to import secrets"
            )));
        }
        let Some(environment) = self.store.find_environment(project_id, env).await? else {
            return Err(AppError::NotFound(anyhow!(
                "Project or environment not found"
            )));
        };
        if !self
            .policy
            .has_environment_access(user_id, project_id, env)
            .await?
        {
            return Err(AppError::AccessDenied(anyhow!(
                "No access to this environment"
            )));
        }

        let mut inserted = 0u32;
        let mut updated = 0u32;
        let mut skipped = parsed.skipped;
        let mut failure: Option<AppError> = None;

        for pair in &parsed.pairs {
            match self
                .apply_pair(&environment, pair, defaults, strategy, user_id)
                .await
            {
                Ok(PairApplied::Inserted) => {
                    inserted += 1;
                    record_import_pair("inserted");
                }
                Ok(PairApplied::Updated) => {
                    updated += 1;
                    record_import_pair("updated");
                }
                Ok(PairApplied::Skipped) => {
                    skipped += 1;
                    record_import_pair("skipped");
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        // One summarizing event per run, partial counts included when the
        // batch aborted partway.
        self.audit
            .record(
                user_id,
                Some(project_id),
                AuditAction::SecretUpdated,
                "import",
                None,
                json!({
                    "secretName": format!("Import {}", env.as_str().to_uppercase()),
                    "inserted": inserted,
                    "updated": updated,
                    "skipped": skipped,
                    "conflictStrategy": strategy.as_str(),
                }),
            )
            .await;

        if let Some(e) = failure {
            record_import_run("error");
            record_error(e.kind());
            error!(error = %e, inserted, updated, skipped, "Import aborted by storage failure");
            return Err(e);
        }

        record_import_run("ok");
        info!(inserted, updated, skipped, "Import committed");
        Ok(ImportOutcome {
            inserted,
            updated,
            skipped,
            total: parsed.pairs.len() as u32,
        })
    }

    async fn apply_pair(
        &self,
        environment: &Environment,
        pair: &ImportPair,
        defaults: &ImportDefaults,
        strategy: ConflictStrategy,
        editor: Uuid,
    ) -> Result<PairApplied, AppError> {
        let existing = self
            .store
            .find_secret_by_key(environment.id, &pair.key)
            .await?;
        let Some(existing) = existing else {
            let fields = NewSecret {
                name: derive_secret_name(&pair.key),
                provider: defaults.provider.clone(),
                secret_type: defaults.secret_type,
                key_name: pair.key.clone(),
                value: pair.value.clone(),
                tags: defaults.tags.clone(),
                note: Some("Imported from TXT".to_string()),
            };
            self.store
                .insert_secret(environment.id, &fields, editor)
                .await?;
            return Ok(PairApplied::Inserted);
        };

        match strategy {
            ConflictStrategy::Skip => Ok(PairApplied::Skipped),
            ConflictStrategy::Overwrite => {
                let changes = SecretChanges {
                    provider: Some(defaults.provider.clone()),
                    secret_type: Some(defaults.secret_type),
                    value: Some(pair.value.clone()),
                    ..Default::default()
                };
                self.store
                    .update_secret(existing.id, &changes, editor)
                    .await?;
                Ok(PairApplied::Updated)
            }
            ConflictStrategy::NewVersion => {
                self.store
                    .snapshot_and_update(
                        existing.id,
                        &pair.value,
                        &defaults.provider,
                        defaults.secret_type,
                        editor,
                    )
                    .await?;
                Ok(PairApplied::Updated)
            }
        }
    }
}

/// Display name derived from a key: underscore segments lowercased, then
/// each capitalized and joined with spaces. `STRIPE_API_KEY` becomes
/// `Stripe Api Key`.
pub fn derive_secret_name(key: &str) -> String {
    key.to_lowercase()
        .split('_')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
