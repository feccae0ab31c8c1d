//! Postgres-backed secret store.
//!
//! Implements [`SecretStore`] over sqlx. Row writes that span tables
//! (secret + tags + note, snapshot + value update) run inside one
//! transaction; an error on any statement drops the transaction and rolls
//! everything back.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::error::AppError;
use crate::models::{
    AuditEvent, AuditEventView, AuditFilter, DeletedSecret, EnvName, Environment,
    EnvironmentAccessGrant, NewSecret, Project, ProjectSummary, SecretChanges, SecretFilter,
    SecretRecord, SecretType, SecretVersion, User, AUDIT_QUERY_LIMIT,
};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::store::SecretStore;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(config), fields(service = "secrets-service"))]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AppError> {
        info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(&config.url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl SecretStore for Database {
    // =========================================================================
    // Identity and Tenancy Operations
    // =========================================================================

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_user"])
            .start_timer();

        let user = sqlx::query_as::<_, User>("SELECT id, email, name, role FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to load user: {}", e)))?;

        timer.observe_duration();
        Ok(user)
    }

    #[instrument(skip(self), fields(project_id = %project_id))]
    async fn find_project(&self, project_id: Uuid) -> Result<Option<Project>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_project"])
            .start_timer();

        let project = sqlx::query_as::<_, Project>("SELECT id, name FROM projects WHERE id = $1")
            .bind(project_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to load project: {}", e))
            })?;

        timer.observe_duration();
        Ok(project)
    }

    #[instrument(skip(self), fields(project_id = %project_id, env = env.as_str()))]
    async fn find_environment(
        &self,
        project_id: Uuid,
        env: EnvName,
    ) -> Result<Option<Environment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_environment"])
            .start_timer();

        let environment = sqlx::query_as::<_, Environment>(
            "SELECT id, project_id, name FROM environments WHERE project_id = $1 AND name = $2",
        )
        .bind(project_id)
        .bind(env.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to load environment: {}", e))
        })?;

        timer.observe_duration();
        Ok(environment)
    }

    #[instrument(skip(self), fields(user_id = %user_id, project_id = %project_id))]
    async fn has_membership(&self, user_id: Uuid, project_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["has_membership"])
            .start_timer();

        let (exists,) = sqlx::query_as::<_, (bool,)>(
            "SELECT EXISTS(SELECT 1 FROM project_memberships WHERE user_id = $1 AND project_id = $2)",
        )
        .bind(user_id)
        .bind(project_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to check membership: {}", e))
        })?;

        timer.observe_duration();
        Ok(exists)
    }

    #[instrument(skip(self), fields(user_id = %user_id, environment_id = %environment_id))]
    async fn find_grant(
        &self,
        user_id: Uuid,
        environment_id: Uuid,
    ) -> Result<Option<EnvironmentAccessGrant>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_grant"])
            .start_timer();

        let grant = sqlx::query_as::<_, EnvironmentAccessGrant>(
            r#"
            SELECT user_id, environment_id, can_read, can_export
            FROM environment_access_grants
            WHERE user_id = $1 AND environment_id = $2
            "#,
        )
        .bind(user_id)
        .bind(environment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to load grant: {}", e)))?;

        timer.observe_duration();
        Ok(grant)
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn list_projects_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<ProjectSummary>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_projects_for_user"])
            .start_timer();

        let summaries = sqlx::query_as::<_, ProjectSummary>(
            r#"
            SELECT
                p.id,
                p.name,
                COALESCE(tags.tags, '{}'::text[]) AS tags,
                COALESCE(stats.key_count, 0)::bigint AS key_count,
                COALESCE(prod.prod_access, FALSE) AS prod_access
            FROM project_memberships m
            JOIN projects p ON p.id = m.project_id
            LEFT JOIN LATERAL (
                SELECT ARRAY_AGG(pt.tag ORDER BY pt.tag) AS tags
                FROM project_tags pt
                WHERE pt.project_id = p.id
            ) tags ON TRUE
            LEFT JOIN LATERAL (
                SELECT COUNT(*) AS key_count
                FROM secrets s
                JOIN environments e ON e.id = s.environment_id
                LEFT JOIN environment_access_grants g
                    ON g.environment_id = e.id AND g.user_id = m.user_id
                WHERE e.project_id = p.id
                  AND (e.name <> 'prod' OR COALESCE(g.can_read, FALSE))
            ) stats ON TRUE
            LEFT JOIN LATERAL (
                SELECT COALESCE(g.can_read, FALSE) AS prod_access
                FROM environments e
                LEFT JOIN environment_access_grants g
                    ON g.environment_id = e.id AND g.user_id = m.user_id
                WHERE e.project_id = p.id AND e.name = 'prod'
                LIMIT 1
            ) prod ON TRUE
            WHERE m.user_id = $1
            ORDER BY p.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list projects: {}", e))
        })?;

        timer.observe_duration();
        Ok(summaries)
    }

    // =========================================================================
    // Secret Operations
    // =========================================================================

    #[instrument(skip(self, filter), fields(user_id = %user_id))]
    async fn list_secrets_for_user(
        &self,
        user_id: Uuid,
        filter: &SecretFilter,
    ) -> Result<Vec<SecretRecord>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_secrets"])
            .start_timer();

        // Build dynamic WHERE clause. $1 is always the caller; the prod gate
        // is structural, not optional.
        let mut conditions = vec!["(e.name <> 'prod' OR COALESCE(g.can_read, FALSE))".to_string()];
        let mut param_idx = 2;

        if filter.project_id.is_some() {
            conditions.push(format!("p.id = ${}", param_idx));
            param_idx += 1;
        }
        if filter.environment.is_some() {
            conditions.push(format!("e.name = ${}", param_idx));
            param_idx += 1;
        }
        if filter.provider.is_some() {
            conditions.push(format!("s.provider = ${}", param_idx));
            param_idx += 1;
        }
        if filter.secret_type.is_some() {
            conditions.push(format!("s.secret_type = ${}", param_idx));
            param_idx += 1;
        }
        if filter.tag.is_some() {
            conditions.push(format!(
                "EXISTS (SELECT 1 FROM secret_tags ft WHERE ft.secret_id = s.id AND ft.tag = ${})",
                param_idx
            ));
            param_idx += 1;
        }
        if filter.query.is_some() {
            conditions.push(format!(
                "(LOWER(s.name) LIKE ${p} OR LOWER(s.provider) LIKE ${p} OR LOWER(s.key_name) LIKE ${p} \
                 OR EXISTS (SELECT 1 FROM secret_tags qt WHERE qt.secret_id = s.id AND LOWER(qt.tag) LIKE ${p}))",
                p = param_idx
            ));
        }

        let sql = format!(
            r#"
            SELECT s.id, e.project_id, p.name AS project_name, s.environment_id,
                   e.name AS environment, s.name, s.provider, s.secret_type, s.key_name,
                   s.value_encrypted AS value,
                   ARRAY_REMOVE(ARRAY_AGG(DISTINCT st.tag), NULL) AS tags,
                   n.body AS note, s.created_at, s.updated_at, s.updated_by
            FROM secrets s
            JOIN environments e ON e.id = s.environment_id
            JOIN projects p ON p.id = e.project_id
            JOIN project_memberships m ON m.project_id = p.id AND m.user_id = $1
            LEFT JOIN environment_access_grants g ON g.environment_id = e.id AND g.user_id = $1
            LEFT JOIN secret_tags st ON st.secret_id = s.id
            LEFT JOIN secret_notes n ON n.secret_id = s.id
            WHERE {}
            GROUP BY s.id, e.id, p.id, n.secret_id, n.body
            ORDER BY s.updated_at DESC
            "#,
            conditions.join(" AND ")
        );

        let mut query = sqlx::query_as::<_, SecretRecord>(&sql).bind(user_id);
        if let Some(project_id) = filter.project_id {
            query = query.bind(project_id);
        }
        if let Some(env) = filter.environment {
            query = query.bind(env.as_str());
        }
        if let Some(provider) = &filter.provider {
            query = query.bind(provider.as_str());
        }
        if let Some(secret_type) = filter.secret_type {
            query = query.bind(secret_type.as_str());
        }
        if let Some(tag) = &filter.tag {
            query = query.bind(tag.as_str());
        }
        if let Some(q) = &filter.query {
            query = query.bind(format!("%{}%", q.to_lowercase()));
        }

        let secrets = query.fetch_all(&self.pool).await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list secrets: {}", e))
        })?;

        timer.observe_duration();
        Ok(secrets)
    }

    #[instrument(skip(self), fields(secret_id = %secret_id))]
    async fn get_secret(&self, secret_id: Uuid) -> Result<Option<SecretRecord>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_secret"])
            .start_timer();

        let secret = sqlx::query_as::<_, SecretRecord>(
            r#"
            SELECT s.id, e.project_id, p.name AS project_name, s.environment_id,
                   e.name AS environment, s.name, s.provider, s.secret_type, s.key_name,
                   s.value_encrypted AS value,
                   ARRAY_REMOVE(ARRAY_AGG(DISTINCT st.tag), NULL) AS tags,
                   n.body AS note, s.created_at, s.updated_at, s.updated_by
            FROM secrets s
            JOIN environments e ON e.id = s.environment_id
            JOIN projects p ON p.id = e.project_id
            LEFT JOIN secret_tags st ON st.secret_id = s.id
            LEFT JOIN secret_notes n ON n.secret_id = s.id
            WHERE s.id = $1
            GROUP BY s.id, e.id, p.id, n.secret_id, n.body
            "#,
        )
        .bind(secret_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to load secret: {}", e)))?;

        timer.observe_duration();
        Ok(secret)
    }

    #[instrument(skip(self), fields(environment_id = %environment_id, key_name = key_name))]
    async fn find_secret_by_key(
        &self,
        environment_id: Uuid,
        key_name: &str,
    ) -> Result<Option<SecretRecord>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_secret_by_key"])
            .start_timer();

        // Key names are not unique at the storage layer; take the most
        // recently updated match.
        let secret = sqlx::query_as::<_, SecretRecord>(
            r#"
            SELECT s.id, e.project_id, p.name AS project_name, s.environment_id,
                   e.name AS environment, s.name, s.provider, s.secret_type, s.key_name,
                   s.value_encrypted AS value,
                   ARRAY_REMOVE(ARRAY_AGG(DISTINCT st.tag), NULL) AS tags,
                   n.body AS note, s.created_at, s.updated_at, s.updated_by
            FROM secrets s
            JOIN environments e ON e.id = s.environment_id
            JOIN projects p ON p.id = e.project_id
            LEFT JOIN secret_tags st ON st.secret_id = s.id
            LEFT JOIN secret_notes n ON n.secret_id = s.id
            WHERE s.environment_id = $1 AND s.key_name = $2
            GROUP BY s.id, e.id, p.id, n.secret_id, n.body
            ORDER BY s.updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(environment_id)
        .bind(key_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to find secret by key: {}", e))
        })?;

        timer.observe_duration();
        Ok(secret)
    }

    #[instrument(skip(self, fields), fields(environment_id = %environment_id))]
    async fn insert_secret(
        &self,
        environment_id: Uuid,
        fields: &NewSecret,
        editor: Uuid,
    ) -> Result<SecretRecord, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_secret"])
            .start_timer();

        let secret_id = Uuid::new_v4();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        sqlx::query(
            r#"
            INSERT INTO secrets (id, environment_id, name, provider, secret_type, key_name,
                                 value_encrypted, updated_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW())
            "#,
        )
        .bind(secret_id)
        .bind(environment_id)
        .bind(fields.name.as_str())
        .bind(fields.provider.as_str())
        .bind(fields.secret_type.as_str())
        .bind(fields.key_name.as_str())
        .bind(fields.value.as_str())
        .bind(editor)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to insert secret: {}", e)))?;

        for tag in &fields.tags {
            sqlx::query("INSERT INTO secret_tags (secret_id, tag) VALUES ($1, $2)")
                .bind(secret_id)
                .bind(tag.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to insert tag: {}", e))
                })?;
        }

        if let Some(note) = &fields.note {
            sqlx::query(
                r#"
                INSERT INTO secret_notes (secret_id, body, updated_at)
                VALUES ($1, $2, NOW())
                ON CONFLICT (secret_id) DO UPDATE SET body = EXCLUDED.body, updated_at = NOW()
                "#,
            )
            .bind(secret_id)
            .bind(note.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to upsert note: {}", e))
            })?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        info!(secret_id = %secret_id, "Secret created");

        self.get_secret(secret_id).await?.ok_or_else(|| {
            AppError::DatabaseError(anyhow::anyhow!("Secret {} missing after insert", secret_id))
        })
    }

    #[instrument(skip(self, changes), fields(secret_id = %secret_id))]
    async fn update_secret(
        &self,
        secret_id: Uuid,
        changes: &SecretChanges,
        editor: Uuid,
    ) -> Result<Option<SecretRecord>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_secret"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        // Unset fields fall through to the stored value via COALESCE.
        let updated = sqlx::query(
            r#"
            UPDATE secrets SET
                name = COALESCE($2, name),
                provider = COALESCE($3, provider),
                secret_type = COALESCE($4, secret_type),
                key_name = COALESCE($5, key_name),
                value_encrypted = COALESCE($6, value_encrypted),
                updated_by = $7,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(secret_id)
        .bind(changes.name.as_deref())
        .bind(changes.provider.as_deref())
        .bind(changes.secret_type.map(|t| t.as_str()))
        .bind(changes.key_name.as_deref())
        .bind(changes.value.as_deref())
        .bind(editor)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update secret: {}", e)))?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }

        if let Some(tags) = &changes.tags {
            sqlx::query("DELETE FROM secret_tags WHERE secret_id = $1")
                .bind(secret_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to clear tags: {}", e))
                })?;

            for tag in tags {
                sqlx::query("INSERT INTO secret_tags (secret_id, tag) VALUES ($1, $2)")
                    .bind(secret_id)
                    .bind(tag.as_str())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| {
                        AppError::DatabaseError(anyhow::anyhow!("Failed to insert tag: {}", e))
                    })?;
            }
        }

        if let Some(note) = &changes.note {
            sqlx::query(
                r#"
                INSERT INTO secret_notes (secret_id, body, updated_at)
                VALUES ($1, $2, NOW())
                ON CONFLICT (secret_id) DO UPDATE SET body = EXCLUDED.body, updated_at = NOW()
                "#,
            )
            .bind(secret_id)
            .bind(note.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to upsert note: {}", e))
            })?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        info!(secret_id = %secret_id, "Secret updated");

        self.get_secret(secret_id).await
    }

    #[instrument(skip(self), fields(secret_id = %secret_id))]
    async fn delete_secret(&self, secret_id: Uuid) -> Result<Option<DeletedSecret>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_secret"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        sqlx::query("DELETE FROM secret_tags WHERE secret_id = $1")
            .bind(secret_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to delete tags: {}", e)))?;

        sqlx::query("DELETE FROM secret_notes WHERE secret_id = $1")
            .bind(secret_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to delete note: {}", e)))?;

        // Version history is deliberately left in place for audit.
        let deleted = sqlx::query_as::<_, DeletedSecret>(
            r#"
            DELETE FROM secrets s
            USING environments e
            WHERE s.id = $1 AND e.id = s.environment_id
            RETURNING e.project_id AS project_id, s.name AS name
            "#,
        )
        .bind(secret_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to delete secret: {}", e)))?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        if deleted.is_some() {
            info!(secret_id = %secret_id, "Secret deleted");
        }

        Ok(deleted)
    }

    #[instrument(skip(self), fields(environment_id = %environment_id))]
    async fn export_pairs(&self, environment_id: Uuid) -> Result<Vec<(String, String)>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["export_pairs"])
            .start_timer();

        let pairs = sqlx::query_as::<_, (String, String)>(
            "SELECT key_name, value_encrypted FROM secrets WHERE environment_id = $1 ORDER BY key_name",
        )
        .bind(environment_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to export secrets: {}", e)))?;

        timer.observe_duration();
        Ok(pairs)
    }

    // =========================================================================
    // Version Operations
    // =========================================================================

    #[instrument(skip(self, value), fields(secret_id = %secret_id))]
    async fn snapshot_and_update(
        &self,
        secret_id: Uuid,
        value: &str,
        provider: &str,
        secret_type: SecretType,
        editor: Uuid,
    ) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["snapshot_and_update"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        // Lock the row first so concurrent imports serialize here and the
        // MAX(version) below always sees the latest committed history.
        let current = sqlx::query_as::<_, (String,)>(
            "SELECT value_encrypted FROM secrets WHERE id = $1 FOR UPDATE",
        )
        .bind(secret_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to lock secret: {}", e)))?;

        if current.is_none() {
            // Deleted from under the import; nothing to snapshot or update.
            return Ok(());
        }

        sqlx::query(
            r#"
            INSERT INTO secret_versions (id, secret_id, version, value_encrypted, created_by, created_at)
            SELECT $2, s.id, COALESCE(MAX(sv.version), 0) + 1, s.value_encrypted, $3, NOW()
            FROM secrets s
            LEFT JOIN secret_versions sv ON sv.secret_id = s.id
            WHERE s.id = $1
            GROUP BY s.id, s.value_encrypted
            "#,
        )
        .bind(secret_id)
        .bind(Uuid::new_v4())
        .bind(editor)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to snapshot version: {}", e))
        })?;

        sqlx::query(
            r#"
            UPDATE secrets SET value_encrypted = $2, provider = $3, secret_type = $4,
                               updated_by = $5, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(secret_id)
        .bind(value)
        .bind(provider)
        .bind(secret_type.as_str())
        .bind(editor)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update secret: {}", e)))?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        info!(secret_id = %secret_id, "Secret version snapshotted and value updated");
        Ok(())
    }

    #[instrument(skip(self), fields(secret_id = %secret_id))]
    async fn list_versions(&self, secret_id: Uuid) -> Result<Vec<SecretVersion>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_versions"])
            .start_timer();

        let versions = sqlx::query_as::<_, SecretVersion>(
            r#"
            SELECT id, secret_id, version, value_encrypted AS value, created_by, created_at
            FROM secret_versions
            WHERE secret_id = $1
            ORDER BY version
            "#,
        )
        .bind(secret_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list versions: {}", e)))?;

        timer.observe_duration();
        Ok(versions)
    }

    // =========================================================================
    // Audit Operations
    // =========================================================================

    #[instrument(skip(self, event), fields(action = event.action.as_str()))]
    async fn append_audit_event(&self, event: &AuditEvent) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["append_audit_event"])
            .start_timer();

        sqlx::query(
            r#"
            INSERT INTO audit_events (id, user_id, project_id, action, target_type, target_id,
                                      metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(event.id)
        .bind(event.user_id)
        .bind(event.project_id)
        .bind(event.action.as_str())
        .bind(event.target_type.as_str())
        .bind(event.target_id.as_deref())
        .bind(&event.metadata)
        .bind(event.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to append audit event: {}", e))
        })?;

        timer.observe_duration();
        Ok(())
    }

    #[instrument(skip(self, filter))]
    async fn find_audit_events(
        &self,
        filter: &AuditFilter,
    ) -> Result<Vec<AuditEventView>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_audit_events"])
            .start_timer();

        // Build dynamic WHERE clause
        let mut conditions: Vec<String> = Vec::new();
        let mut param_idx = 1;

        if filter.action.is_some() {
            conditions.push(format!("a.action = ${}", param_idx));
            param_idx += 1;
        }
        if filter.project_id.is_some() {
            conditions.push(format!("a.project_id = ${}", param_idx));
            param_idx += 1;
        }
        if filter.actor_email.is_some() {
            conditions.push(format!("u.email = ${}", param_idx));
            param_idx += 1;
        }
        if filter.from.is_some() {
            conditions.push(format!("a.created_at >= ${}", param_idx));
            param_idx += 1;
        }
        if filter.to.is_some() {
            conditions.push(format!("a.created_at <= ${}", param_idx));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let sql = format!(
            r#"
            SELECT a.id, a.action, a.target_type, a.target_id,
                   COALESCE(u.email, 'unknown') AS actor,
                   COALESCE(p.name, 'unknown') AS project,
                   a.project_id,
                   a.metadata->>'secretName' AS secret_name,
                   a.metadata, a.created_at
            FROM audit_events a
            LEFT JOIN users u ON u.id = a.user_id
            LEFT JOIN projects p ON p.id = a.project_id
            {}
            ORDER BY a.created_at DESC
            LIMIT {}
            "#,
            where_clause, AUDIT_QUERY_LIMIT
        );

        let mut query = sqlx::query_as::<_, AuditEventView>(&sql);
        if let Some(action) = &filter.action {
            query = query.bind(action.as_str());
        }
        if let Some(project_id) = filter.project_id {
            query = query.bind(project_id);
        }
        if let Some(email) = &filter.actor_email {
            query = query.bind(email.as_str());
        }
        if let Some(from) = filter.from {
            query = query.bind(from);
        }
        if let Some(to) = filter.to {
            query = query.bind(to);
        }

        let events = query.fetch_all(&self.pool).await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to query audit events: {}", e))
        })?;

        timer.observe_duration();
        Ok(events)
    }

    // =========================================================================
    // Liveness
    // =========================================================================

    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["health_check"])
            .start_timer();

        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;

        timer.observe_duration();
        Ok(())
    }
}
