//! PostgreSQL-backed user account repository.

use async_trait::async_trait;
use sqlx::PgPool;

use gateward_application::{NewUser, User, UserFilter, UserPatch, UserRepository};
use gateward_core::{AppError, AppResult};
use gateward_domain::UserId;

/// PostgreSQL implementation of the user repository port.
#[derive(Clone)]
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    password_hash: String,
    first_name: String,
    last_name: String,
    is_superuser: bool,
    is_staff: bool,
    is_active: bool,
    is_confirmed: bool,
    confirmation_token: Option<String>,
    created_by: Option<i64>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_by: Option<i64>,
    updated_at: Option<chrono::DateTime<chrono::Utc>>,
    last_login_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: UserId::from_i64(row.id),
            username: row.username,
            password_hash: row.password_hash,
            first_name: row.first_name,
            last_name: row.last_name,
            is_superuser: row.is_superuser,
            is_staff: row.is_staff,
            is_active: row.is_active,
            is_confirmed: row.is_confirmed,
            confirmation_token: row.confirmation_token,
            created_by: row.created_by.map(UserId::from_i64),
            created_at: row.created_at,
            updated_by: row.updated_by.map(UserId::from_i64),
            updated_at: row.updated_at,
            last_login_at: row.last_login_at,
        }
    }
}

mod account;
mod lookup;

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn create(&self, input: NewUser) -> AppResult<User> {
        self.create_impl(input).await
    }

    async fn find_by_id(&self, id: UserId) -> AppResult<Option<User>> {
        self.find_by_id_impl(id).await
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        self.find_by_username_impl(username).await
    }

    async fn update(&self, id: UserId, patch: UserPatch) -> AppResult<User> {
        self.update_impl(id, patch).await
    }

    async fn delete(&self, id: UserId) -> AppResult<u64> {
        self.delete_impl(id).await
    }

    async fn list(&self, filter: &UserFilter) -> AppResult<Vec<User>> {
        self.list_impl(filter).await
    }

    async fn count(&self) -> AppResult<i64> {
        self.count_impl().await
    }

    async fn exists(&self, id: UserId) -> AppResult<bool> {
        self.exists_impl(id).await
    }

    async fn record_login(&self, id: UserId) -> AppResult<()> {
        self.record_login_impl(id).await
    }
}

fn username_conflict_or_internal(error: sqlx::Error, operation: &str) -> AppError {
    if let sqlx::Error::Database(ref database_error) = error
        && database_error.code().as_deref() == Some("23505")
    {
        return AppError::Conflict("user with such username already exists".to_owned());
    }

    AppError::Internal(format!("failed to {operation}: {error}"))
}

fn referenced_conflict_or_internal(error: sqlx::Error, operation: &str) -> AppError {
    if let sqlx::Error::Database(ref database_error) = error
        && database_error.code().as_deref() == Some("23503")
    {
        return AppError::Conflict(
            "user cannot be removed, it is still assigned to groups or permissions".to_owned(),
        );
    }

    AppError::Internal(format!("failed to {operation}: {error}"))
}
