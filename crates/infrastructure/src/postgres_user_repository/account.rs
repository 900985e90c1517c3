use super::*;

impl PostgresUserRepository {
    pub(super) async fn create_impl(&self, input: NewUser) -> AppResult<User> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (username, password_hash, first_name, last_name,
                               is_superuser, is_staff, is_active, is_confirmed,
                               confirmation_token, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, username, password_hash, first_name, last_name,
                      is_superuser, is_staff, is_active, is_confirmed,
                      confirmation_token, created_by, created_at,
                      updated_by, updated_at, last_login_at
            "#,
        )
        .bind(input.username)
        .bind(input.password_hash)
        .bind(input.first_name)
        .bind(input.last_name)
        .bind(input.is_superuser)
        .bind(input.is_staff)
        .bind(input.is_active)
        .bind(input.is_confirmed)
        .bind(input.confirmation_token)
        .bind(input.created_by.map(|created_by| created_by.as_i64()))
        .fetch_one(&self.pool)
        .await
        .map_err(|error| username_conflict_or_internal(error, "create user"))?;

        Ok(User::from(row))
    }

    pub(super) async fn update_impl(&self, id: UserId, patch: UserPatch) -> AppResult<User> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users
            SET username = COALESCE($2, username),
                password_hash = COALESCE($3, password_hash),
                first_name = COALESCE($4, first_name),
                last_name = COALESCE($5, last_name),
                is_superuser = COALESCE($6, is_superuser),
                is_staff = COALESCE($7, is_staff),
                is_active = COALESCE($8, is_active),
                is_confirmed = COALESCE($9, is_confirmed),
                updated_by = COALESCE($10, updated_by),
                updated_at = now()
            WHERE id = $1
            RETURNING id, username, password_hash, first_name, last_name,
                      is_superuser, is_staff, is_active, is_confirmed,
                      confirmation_token, created_by, created_at,
                      updated_by, updated_at, last_login_at
            "#,
        )
        .bind(id.as_i64())
        .bind(patch.username)
        .bind(patch.password_hash)
        .bind(patch.first_name)
        .bind(patch.last_name)
        .bind(patch.is_superuser)
        .bind(patch.is_staff)
        .bind(patch.is_active)
        .bind(patch.is_confirmed)
        .bind(patch.updated_by.map(|updated_by| updated_by.as_i64()))
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| username_conflict_or_internal(error, "update user"))?;

        let Some(row) = row else {
            return Err(AppError::NotFound("user does not exists".to_owned()));
        };

        Ok(User::from(row))
    }

    pub(super) async fn delete_impl(&self, id: UserId) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM users
            WHERE id = $1
            "#,
        )
        .bind(id.as_i64())
        .execute(&self.pool)
        .await
        .map_err(|error| referenced_conflict_or_internal(error, "delete user"))?;

        Ok(result.rows_affected())
    }

    pub(super) async fn record_login_impl(&self, id: UserId) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET last_login_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id.as_i64())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to record login: {error}")))?;

        Ok(())
    }
}
