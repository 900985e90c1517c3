//! PostgreSQL-backed user group membership repository.

use async_trait::async_trait;
use sqlx::PgPool;

use gateward_application::{SyncSummary, UserGroupRepository};
use gateward_core::{AppError, AppResult};
use gateward_domain::{GroupId, UserId};

/// PostgreSQL implementation of the user group repository port.
#[derive(Clone)]
pub struct PostgresUserGroupRepository {
    pool: PgPool,
}

impl PostgresUserGroupRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserGroupRepository for PostgresUserGroupRepository {
    async fn set(&self, user_id: UserId, group_ids: &[GroupId]) -> AppResult<SyncSummary> {
        let mut tx = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to begin membership transaction: {error}"))
        })?;

        let owner = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT id
            FROM users
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(user_id.as_i64())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|error| AppError::Internal(format!("failed to lock user row: {error}")))?;

        if owner.is_none() {
            return Err(AppError::NotFound("user does not exists".to_owned()));
        }

        let mut created = 0_i64;
        for group_id in group_ids {
            let result = sqlx::query(
                r#"
                INSERT INTO user_groups (user_id, group_id)
                VALUES ($1, $2)
                ON CONFLICT (user_id, group_id) DO NOTHING
                "#,
            )
            .bind(user_id.as_i64())
            .bind(group_id.as_i64())
            .execute(&mut *tx)
            .await
            .map_err(|error| missing_group_or_internal(error, "assign group to user"))?;

            created += result.rows_affected() as i64;
        }

        let keep: Vec<i64> = group_ids.iter().map(|group_id| group_id.as_i64()).collect();
        let result = sqlx::query(
            r#"
            DELETE FROM user_groups
            WHERE user_id = $1 AND group_id <> ALL($2)
            "#,
        )
        .bind(user_id.as_i64())
        .bind(keep)
        .execute(&mut *tx)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to remove stale memberships: {error}"))
        })?;
        let removed = result.rows_affected() as i64;

        tx.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit membership transaction: {error}"))
        })?;

        Ok(SyncSummary { created, removed })
    }

    async fn exists(&self, user_id: UserId, group_id: GroupId) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM user_groups
                WHERE user_id = $1 AND group_id = $2
            )
            "#,
        )
        .bind(user_id.as_i64())
        .bind(group_id.as_i64())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to check group membership: {error}")))
    }
}

fn missing_group_or_internal(error: sqlx::Error, operation: &str) -> AppError {
    if let sqlx::Error::Database(ref database_error) = error
        && database_error.code().as_deref() == Some("23503")
    {
        return AppError::NotFound("group does not exists".to_owned());
    }

    AppError::Internal(format!("failed to {operation}: {error}"))
}
