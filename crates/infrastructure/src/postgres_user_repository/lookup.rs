use super::*;

impl PostgresUserRepository {
    pub(super) async fn find_by_id_impl(&self, id: UserId) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, password_hash, first_name, last_name,
                   is_superuser, is_staff, is_active, is_confirmed,
                   confirmation_token, created_by, created_at,
                   updated_by, updated_at, last_login_at
            FROM users
            WHERE id = $1
            LIMIT 1
            "#,
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find user by id: {error}")))?;

        Ok(row.map(User::from))
    }

    pub(super) async fn find_by_username_impl(&self, username: &str) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, password_hash, first_name, last_name,
                   is_superuser, is_staff, is_active, is_confirmed,
                   confirmation_token, created_by, created_at,
                   updated_by, updated_at, last_login_at
            FROM users
            WHERE username = $1
            LIMIT 1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find user by username: {error}")))?;

        Ok(row.map(User::from))
    }

    pub(super) async fn list_impl(&self, filter: &UserFilter) -> AppResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, password_hash, first_name, last_name,
                   is_superuser, is_staff, is_active, is_confirmed,
                   confirmation_token, created_by, created_at,
                   updated_by, updated_at, last_login_at
            FROM users
            WHERE ($1::BOOL IS NULL OR is_superuser = $1)
              AND ($2::BOOL IS NULL OR is_staff = $2)
              AND ($3::BIGINT IS NULL OR created_by = $3)
            ORDER BY id
            OFFSET $4
            LIMIT $5
            "#,
        )
        .bind(filter.is_superuser)
        .bind(filter.is_staff)
        .bind(filter.created_by.map(|created_by| created_by.as_i64()))
        .bind(filter.offset)
        .bind(filter.limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list users: {error}")))?;

        Ok(rows.into_iter().map(User::from).collect())
    }

    pub(super) async fn count_impl(&self) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM users
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to count users: {error}")))
    }

    pub(super) async fn exists_impl(&self, id: UserId) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM users
                WHERE id = $1
            )
            "#,
        )
        .bind(id.as_i64())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to check user existence: {error}")))
    }
}
