//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod argon2_password_hasher;
mod in_memory_session_store;
mod postgres_group_permission_repository;
mod postgres_group_repository;
mod postgres_permission_repository;
mod postgres_user_group_repository;
mod postgres_user_permission_repository;
mod postgres_user_repository;
mod redis_session_store;

pub use argon2_password_hasher::Argon2PasswordHasher;
pub use in_memory_session_store::InMemorySessionStore;
pub use postgres_group_permission_repository::PostgresGroupPermissionRepository;
pub use postgres_group_repository::PostgresGroupRepository;
pub use postgres_permission_repository::PostgresPermissionRepository;
pub use postgres_user_group_repository::PostgresUserGroupRepository;
pub use postgres_user_permission_repository::PostgresUserPermissionRepository;
pub use postgres_user_repository::PostgresUserRepository;
pub use redis_session_store::RedisSessionStore;
