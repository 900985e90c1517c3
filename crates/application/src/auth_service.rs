//! Session-backed authentication and point permission checks.
//!
//! Owns the login and logout flows plus the checks other services ask for
//! at request time: whether a token still maps to a live account, whether a
//! permission is granted to a user, and whether a user belongs to a group.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use gateward_core::{AppError, AppResult, SubjectId};
use gateward_domain::{GroupId, Permission, UserId};

use crate::actor_resolver::{Actor, ActorResolver, decode_subject};
use crate::firewall;
use crate::user_service::{UserGroupRepository, UserPermissionRepository, UserRepository};

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

/// Session payload stored by a [`SessionStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Opaque token identifying the session.
    pub access_token: String,
    /// Rendered subject identifier of the session owner.
    pub subject: String,
    /// Free-form metadata captured when the session started.
    pub bag: HashMap<String, String>,
}

/// Per-call metadata carried from the transport.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    /// Access token attached to the call, when the caller presented one.
    pub access_token: Option<String>,
}

impl CallContext {
    /// Context carrying the given access token.
    #[must_use]
    pub fn with_token(access_token: impl Into<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
        }
    }
}

/// Store for short-lived sessions keyed by opaque access tokens.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns the session stored under the token, when one exists.
    async fn get(&self, access_token: &str) -> AppResult<Option<SessionRecord>>;

    /// Starts a session for the subject and returns the stored record.
    async fn start(&self, subject: &str, bag: HashMap<String, String>)
    -> AppResult<SessionRecord>;

    /// Drops the session stored under the token. Returns `false` when absent.
    async fn abandon(&self, access_token: &str) -> AppResult<bool>;
}

/// Port for password hashing operations. Keeps the application layer free of
/// direct cryptographic library coupling.
#[async_trait]
pub trait PasswordHasher: Send + Sync {
    /// Hashes a plaintext password using Argon2id.
    fn hash_password(&self, password: &str) -> AppResult<String>;

    /// Verifies a plaintext password against a stored hash.
    fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool>;
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Application service for authentication and per-user permission checks.
#[derive(Clone)]
pub struct AuthService {
    session_store: Arc<dyn SessionStore>,
    password_hasher: Arc<dyn PasswordHasher>,
    user_repository: Arc<dyn UserRepository>,
    user_group_repository: Arc<dyn UserGroupRepository>,
    user_permission_repository: Arc<dyn UserPermissionRepository>,
    actor_resolver: ActorResolver,
}

impl AuthService {
    /// Creates a new auth service.
    #[must_use]
    pub fn new(
        session_store: Arc<dyn SessionStore>,
        password_hasher: Arc<dyn PasswordHasher>,
        user_repository: Arc<dyn UserRepository>,
        user_group_repository: Arc<dyn UserGroupRepository>,
        user_permission_repository: Arc<dyn UserPermissionRepository>,
        actor_resolver: ActorResolver,
    ) -> Self {
        Self {
            session_store,
            password_hasher,
            user_repository,
            user_group_repository,
            user_permission_repository,
            actor_resolver,
        }
    }

    /// Authenticates a user by username and password and starts a session.
    ///
    /// Returns the access token of the new session. Unconfirmed and inactive
    /// accounts are rejected even when the password matches.
    pub async fn login(&self, username: &str, password: &str) -> AppResult<String> {
        if username.is_empty() {
            return Err(AppError::Validation("empty username".to_owned()));
        }
        if password.is_empty() {
            return Err(AppError::Validation("empty password".to_owned()));
        }

        let user = self
            .user_repository
            .find_by_username(username)
            .await?
            .ok_or_else(|| AppError::Unauthorized("user does not exists".to_owned()))?;

        if !self
            .password_hasher
            .verify_password(password, &user.password_hash)?
        {
            return Err(AppError::Unauthorized(
                "the username and password do not match".to_owned(),
            ));
        }
        if !user.is_confirmed {
            return Err(AppError::Unauthorized("user is not confirmed".to_owned()));
        }
        if !user.is_active {
            return Err(AppError::Unauthorized("user is not active".to_owned()));
        }

        let subject = SubjectId::from_user_id(user.id.as_i64()).to_string();
        let bag = HashMap::from([
            ("username".to_owned(), user.username),
            ("first_name".to_owned(), user.first_name),
            ("last_name".to_owned(), user.last_name),
        ]);
        let session = self
            .session_store
            .start(&subject, bag)
            .await
            .map_err(|error| {
                AppError::Internal(format!("session start on login failure: {error}"))
            })?;

        self.user_repository
            .record_login(user.id)
            .await
            .map_err(|error| AppError::Internal(format!("last login update failure: {error}")))?;

        Ok(session.access_token)
    }

    /// Abandons the session stored under the access token.
    pub async fn logout(&self, access_token: &str) -> AppResult<()> {
        if access_token.is_empty() {
            return Err(AppError::Validation(
                "empty session id, logout aborted".to_owned(),
            ));
        }
        if !self.session_store.abandon(access_token).await? {
            return Err(AppError::NotFound("session does not exists".to_owned()));
        }
        Ok(())
    }

    /// Tells whether the token still maps to a live session of an existing user.
    pub async fn is_authenticated(&self, access_token: &str) -> AppResult<bool> {
        if access_token.is_empty() {
            return Err(AppError::Validation(
                "authentication status cannot be checked, missing access token".to_owned(),
            ));
        }
        let session = self
            .session_store
            .get(access_token)
            .await
            .map_err(|error| AppError::Internal(format!("session cannot be fetched: {error}")))?;
        let Some(session) = session else {
            return Ok(false);
        };
        let user_id = decode_subject(&session.subject)?;
        self.user_repository.exists(user_id).await
    }

    /// Tells whether the permission is granted to the user directly.
    ///
    /// Group-derived permissions are deliberately not consulted here; the
    /// answer covers explicit per-user grants only.
    pub async fn is_granted(
        &self,
        ctx: &CallContext,
        user_id: UserId,
        permission: &Permission,
    ) -> AppResult<bool> {
        if permission.as_str().is_empty() {
            return Err(AppError::Validation("permission cannot be empty".to_owned()));
        }
        if user_id.as_i64() < 1 {
            return Err(AppError::Validation(
                "user id needs to be greater than zero".to_owned(),
            ));
        }

        let actor = self.actor_resolver.resolve(ctx).await?;
        firewall::can_check_granting(&actor, user_id)?;

        self.user_permission_repository
            .is_granted(user_id, permission)
            .await
    }

    /// Tells whether the user belongs to the group.
    pub async fn belongs_to(
        &self,
        ctx: &CallContext,
        user_id: UserId,
        group_id: GroupId,
    ) -> AppResult<bool> {
        if group_id.as_i64() < 1 {
            return Err(AppError::Validation(
                "group id needs to be greater than zero".to_owned(),
            ));
        }
        if user_id.as_i64() < 1 {
            return Err(AppError::Validation(
                "user id needs to be greater than zero".to_owned(),
            ));
        }

        let actor = self.actor_resolver.resolve(ctx).await?;
        firewall::can_check_belonging(&actor, user_id)?;

        self.user_group_repository.exists(user_id, group_id).await
    }

    /// Resolves the calling actor, as seen by the permission firewalls.
    pub async fn resolve_actor(&self, ctx: &CallContext) -> AppResult<Actor> {
        self.actor_resolver.resolve(ctx).await
    }
}
