//! PostgreSQL-backed group permission grant repository.

use async_trait::async_trait;
use sqlx::PgPool;

use gateward_application::{GroupPermissionRepository, SyncSummary};
use gateward_core::{AppError, AppResult};
use gateward_domain::{GroupId, Permission, Permissions};

/// PostgreSQL implementation of the group permission repository port.
#[derive(Clone)]
pub struct PostgresGroupPermissionRepository {
    pool: PgPool,
}

impl PostgresGroupPermissionRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct GrantRow {
    permission_subsystem: String,
    permission_module: String,
    permission_action: String,
}

impl GrantRow {
    fn matches(&self, permission: &Permission) -> bool {
        permission.split()
            == (
                self.permission_subsystem.as_str(),
                self.permission_module.as_str(),
                self.permission_action.as_str(),
            )
    }
}

#[async_trait]
impl GroupPermissionRepository for PostgresGroupPermissionRepository {
    async fn set(&self, group_id: GroupId, permissions: &Permissions) -> AppResult<SyncSummary> {
        let mut tx = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to begin grant transaction: {error}"))
        })?;

        let owner = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT id
            FROM groups
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(group_id.as_i64())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|error| AppError::Internal(format!("failed to lock group row: {error}")))?;

        if owner.is_none() {
            return Err(AppError::NotFound("group does not exists".to_owned()));
        }

        let existing = sqlx::query_as::<_, GrantRow>(
            r#"
            SELECT permission_subsystem, permission_module, permission_action
            FROM group_permissions
            WHERE group_id = $1
            "#,
        )
        .bind(group_id.as_i64())
        .fetch_all(&mut *tx)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load group grants: {error}")))?;

        let mut created = 0_i64;
        for permission in permissions {
            let result = sqlx::query(
                r#"
                INSERT INTO group_permissions (group_id, permission_subsystem,
                                               permission_module, permission_action)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (group_id, permission_subsystem, permission_module,
                             permission_action) DO NOTHING
                "#,
            )
            .bind(group_id.as_i64())
            .bind(permission.subsystem())
            .bind(permission.module())
            .bind(permission.action())
            .execute(&mut *tx)
            .await
            .map_err(|error| unknown_permission_or_internal(error, "grant permission to group"))?;

            created += result.rows_affected() as i64;
        }

        let mut removed = 0_i64;
        for row in &existing {
            if permissions.iter().any(|permission| row.matches(permission)) {
                continue;
            }

            let result = sqlx::query(
                r#"
                DELETE FROM group_permissions
                WHERE group_id = $1 AND permission_subsystem = $2
                  AND permission_module = $3 AND permission_action = $4
                "#,
            )
            .bind(group_id.as_i64())
            .bind(row.permission_subsystem.as_str())
            .bind(row.permission_module.as_str())
            .bind(row.permission_action.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to revoke group grant: {error}"))
            })?;

            removed += result.rows_affected() as i64;
        }

        tx.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit grant transaction: {error}"))
        })?;

        Ok(SyncSummary { created, removed })
    }
}

fn unknown_permission_or_internal(error: sqlx::Error, operation: &str) -> AppError {
    if let sqlx::Error::Database(ref database_error) = error
        && database_error.code().as_deref() == Some("23503")
    {
        return AppError::NotFound("permission does not exists".to_owned());
    }

    AppError::Internal(format!("failed to {operation}: {error}"))
}
