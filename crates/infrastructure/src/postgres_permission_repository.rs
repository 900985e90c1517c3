//! PostgreSQL-backed permission catalog repository.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;

use gateward_application::{
    PermissionFilter, PermissionRecord, PermissionRepository, RegistryDiff, untouched,
};
use gateward_core::{AppError, AppResult};
use gateward_domain::{GroupId, Permission, PermissionId, Permissions, UserId};

/// PostgreSQL implementation of the permission repository port.
#[derive(Clone)]
pub struct PostgresPermissionRepository {
    pool: PgPool,
}

impl PostgresPermissionRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PermissionRow {
    id: i64,
    subsystem: String,
    module: String,
    action: String,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl PermissionRow {
    fn matches(&self, permission: &Permission) -> bool {
        permission.split()
            == (
                self.subsystem.as_str(),
                self.module.as_str(),
                self.action.as_str(),
            )
    }
}

impl From<PermissionRow> for PermissionRecord {
    fn from(row: PermissionRow) -> Self {
        Self {
            id: PermissionId::from_i64(row.id),
            subsystem: row.subsystem,
            module: row.module,
            action: row.action,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct GrantRow {
    permission_subsystem: String,
    permission_module: String,
    permission_action: String,
}

impl GrantRow {
    fn into_permission(self) -> Permission {
        Permission::new(format!(
            "{}:{}:{}",
            self.permission_subsystem, self.permission_module, self.permission_action
        ))
    }
}

#[async_trait]
impl PermissionRepository for PostgresPermissionRepository {
    async fn find_by_id(&self, id: PermissionId) -> AppResult<Option<PermissionRecord>> {
        let row = sqlx::query_as::<_, PermissionRow>(
            r#"
            SELECT id, subsystem, module, action, created_at, updated_at
            FROM permissions
            WHERE id = $1
            LIMIT 1
            "#,
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find permission by id: {error}")))?;

        Ok(row.map(PermissionRecord::from))
    }

    async fn find(&self, filter: &PermissionFilter) -> AppResult<Vec<PermissionRecord>> {
        let rows = sqlx::query_as::<_, PermissionRow>(
            r#"
            SELECT id, subsystem, module, action, created_at, updated_at
            FROM permissions
            WHERE ($1::TEXT IS NULL OR subsystem = $1)
              AND ($2::TEXT IS NULL OR module = $2)
              AND ($3::TEXT IS NULL OR action = $3)
            ORDER BY id
            OFFSET $4
            LIMIT $5
            "#,
        )
        .bind(filter.subsystem.as_deref())
        .bind(filter.module.as_deref())
        .bind(filter.action.as_deref())
        .bind(filter.offset)
        .bind(filter.limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list permissions: {error}")))?;

        Ok(rows.into_iter().map(PermissionRecord::from).collect())
    }

    async fn find_by_user_id(&self, user_id: UserId) -> AppResult<Permissions> {
        let rows = sqlx::query_as::<_, GrantRow>(
            r#"
            SELECT permission_subsystem, permission_module, permission_action
            FROM user_permissions
            WHERE user_id = $1
            UNION
            SELECT gp.permission_subsystem, gp.permission_module, gp.permission_action
            FROM user_groups AS ug
            JOIN group_permissions AS gp ON gp.group_id = ug.group_id
            WHERE ug.user_id = $1
            "#,
        )
        .bind(user_id.as_i64())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to collect permissions of user: {error}"))
        })?;

        Ok(rows.into_iter().map(GrantRow::into_permission).collect())
    }

    async fn find_by_group_id(&self, group_id: GroupId) -> AppResult<Permissions> {
        let rows = sqlx::query_as::<_, GrantRow>(
            r#"
            SELECT permission_subsystem, permission_module, permission_action
            FROM group_permissions
            WHERE group_id = $1
            "#,
        )
        .bind(group_id.as_i64())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to collect permissions of group: {error}"))
        })?;

        Ok(rows.into_iter().map(GrantRow::into_permission).collect())
    }

    async fn register(
        &self,
        subsystem: &str,
        permissions: &Permissions,
    ) -> AppResult<RegistryDiff> {
        let mut tx = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to begin catalog transaction: {error}"))
        })?;

        let existing = sqlx::query_as::<_, PermissionRow>(
            r#"
            SELECT id, subsystem, module, action, created_at, updated_at
            FROM permissions
            WHERE subsystem = $1
            "#,
        )
        .bind(subsystem)
        .fetch_all(&mut *tx)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load catalog rows: {error}")))?;

        let mut created = 0_i64;
        for permission in permissions {
            if existing.iter().any(|row| row.matches(permission)) {
                continue;
            }

            let result = sqlx::query(
                r#"
                INSERT INTO permissions (subsystem, module, action)
                VALUES ($1, $2, $3)
                ON CONFLICT (subsystem, module, action) DO NOTHING
                "#,
            )
            .bind(permission.subsystem())
            .bind(permission.module())
            .bind(permission.action())
            .execute(&mut *tx)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to insert catalog row: {error}"))
            })?;

            created += result.rows_affected() as i64;
        }

        let mut removed = 0_i64;
        for row in &existing {
            if permissions.iter().any(|permission| row.matches(permission)) {
                continue;
            }

            let result = sqlx::query(
                r#"
                DELETE FROM permissions
                WHERE id = $1
                "#,
            )
            .bind(row.id)
            .execute(&mut *tx)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to delete catalog row: {error}"))
            })?;

            removed += result.rows_affected() as i64;
        }

        tx.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit catalog transaction: {error}"))
        })?;

        info!(
            subsystem = subsystem,
            created = created,
            removed = removed,
            "synchronized permission catalog"
        );

        Ok(RegistryDiff {
            created,
            untouched: untouched(permissions.len() as i64, created),
            removed,
        })
    }

    async fn insert_missing(&self, permissions: &Permissions) -> AppResult<i64> {
        let mut inserted = 0_i64;
        for permission in permissions {
            let result = sqlx::query(
                r#"
                INSERT INTO permissions (subsystem, module, action)
                VALUES ($1, $2, $3)
                ON CONFLICT (subsystem, module, action) DO NOTHING
                "#,
            )
            .bind(permission.subsystem())
            .bind(permission.module())
            .bind(permission.action())
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to insert catalog row: {error}"))
            })?;

            inserted += result.rows_affected() as i64;
        }

        Ok(inserted)
    }
}
