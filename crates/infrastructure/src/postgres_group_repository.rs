//! PostgreSQL-backed group repository.

use async_trait::async_trait;
use sqlx::PgPool;

use gateward_application::{Group, GroupPatch, GroupRepository, NewGroup};
use gateward_core::{AppError, AppResult};
use gateward_domain::{GroupId, UserId};

/// PostgreSQL implementation of the group repository port.
#[derive(Clone)]
pub struct PostgresGroupRepository {
    pool: PgPool,
}

impl PostgresGroupRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct GroupRow {
    id: i64,
    name: String,
    description: Option<String>,
    created_by: Option<i64>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_by: Option<i64>,
    updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<GroupRow> for Group {
    fn from(row: GroupRow) -> Self {
        Self {
            id: GroupId::from_i64(row.id),
            name: row.name,
            description: row.description,
            created_by: row.created_by.map(UserId::from_i64),
            created_at: row.created_at,
            updated_by: row.updated_by.map(UserId::from_i64),
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl GroupRepository for PostgresGroupRepository {
    async fn create(&self, input: NewGroup) -> AppResult<Group> {
        let row = sqlx::query_as::<_, GroupRow>(
            r#"
            INSERT INTO groups (name, description, created_by)
            VALUES ($1, $2, $3)
            RETURNING id, name, description, created_by, created_at, updated_by, updated_at
            "#,
        )
        .bind(input.name)
        .bind(input.description)
        .bind(input.created_by.map(|created_by| created_by.as_i64()))
        .fetch_one(&self.pool)
        .await
        .map_err(|error| name_conflict_or_internal(error, "create group"))?;

        Ok(Group::from(row))
    }

    async fn find_by_id(&self, id: GroupId) -> AppResult<Option<Group>> {
        let row = sqlx::query_as::<_, GroupRow>(
            r#"
            SELECT id, name, description, created_by, created_at, updated_by, updated_at
            FROM groups
            WHERE id = $1
            LIMIT 1
            "#,
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find group by id: {error}")))?;

        Ok(row.map(Group::from))
    }

    async fn update(&self, id: GroupId, patch: GroupPatch) -> AppResult<Group> {
        let row = sqlx::query_as::<_, GroupRow>(
            r#"
            UPDATE groups
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                updated_by = COALESCE($4, updated_by),
                updated_at = now()
            WHERE id = $1
            RETURNING id, name, description, created_by, created_at, updated_by, updated_at
            "#,
        )
        .bind(id.as_i64())
        .bind(patch.name)
        .bind(patch.description)
        .bind(patch.updated_by.map(|updated_by| updated_by.as_i64()))
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| name_conflict_or_internal(error, "update group"))?;

        let Some(row) = row else {
            return Err(AppError::NotFound("group does not exists".to_owned()));
        };

        Ok(Group::from(row))
    }

    async fn delete(&self, id: GroupId) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM groups
            WHERE id = $1
            "#,
        )
        .bind(id.as_i64())
        .execute(&self.pool)
        .await
        .map_err(|error| membership_conflict_or_internal(error, "delete group"))?;

        Ok(result.rows_affected())
    }

    async fn list(&self, offset: i64, limit: i64) -> AppResult<Vec<Group>> {
        let rows = sqlx::query_as::<_, GroupRow>(
            r#"
            SELECT id, name, description, created_by, created_at, updated_by, updated_at
            FROM groups
            ORDER BY id
            OFFSET $1
            LIMIT $2
            "#,
        )
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list groups: {error}")))?;

        Ok(rows.into_iter().map(Group::from).collect())
    }

    async fn find_by_user_id(&self, user_id: UserId) -> AppResult<Vec<Group>> {
        let rows = sqlx::query_as::<_, GroupRow>(
            r#"
            SELECT g.id, g.name, g.description, g.created_by, g.created_at,
                   g.updated_by, g.updated_at
            FROM groups AS g
            JOIN user_groups AS ug ON ug.group_id = g.id
            WHERE ug.user_id = $1
            ORDER BY g.id
            "#,
        )
        .bind(user_id.as_i64())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list groups of user: {error}")))?;

        Ok(rows.into_iter().map(Group::from).collect())
    }
}

fn name_conflict_or_internal(error: sqlx::Error, operation: &str) -> AppError {
    if let sqlx::Error::Database(ref database_error) = error
        && database_error.code().as_deref() == Some("23505")
    {
        return AppError::Conflict("group with given name already exists".to_owned());
    }

    AppError::Internal(format!("failed to {operation}: {error}"))
}

fn membership_conflict_or_internal(error: sqlx::Error, operation: &str) -> AppError {
    if let sqlx::Error::Database(ref database_error) = error
        && database_error.code().as_deref() == Some("23503")
    {
        return AppError::Conflict(
            "group cannot be removed, users or permissions are still assigned".to_owned(),
        );
    }

    AppError::Internal(format!("failed to {operation}: {error}"))
}
