//! Resolution of the calling actor from session state.

use std::sync::Arc;

use gateward_core::{AppError, AppResult, SubjectId};
use gateward_domain::{Permissions, UserId};

use crate::auth_service::{CallContext, SessionStore};
use crate::permission_service::PermissionRepository;
use crate::user_service::{User, UserRepository};

/// Caller identity with the permissions effective for the request.
///
/// The permission set is the union of grants assigned to the user directly
/// and grants inherited through group membership.
#[derive(Debug, Clone)]
pub struct Actor {
    /// Account the session belongs to.
    pub user: User,
    /// Effective permissions of the account.
    pub permissions: Permissions,
    /// Marks calls that originate inside the process, before any session exists.
    pub is_local: bool,
}

impl Actor {
    /// Actor standing in for in-process calls that bypass session resolution.
    #[must_use]
    pub fn local() -> Self {
        Self {
            user: User::default(),
            permissions: Permissions::default(),
            is_local: true,
        }
    }
}

/// Resolves the calling [`Actor`] from the access token attached to a call.
#[derive(Clone)]
pub struct ActorResolver {
    session_store: Arc<dyn SessionStore>,
    user_repository: Arc<dyn UserRepository>,
    permission_repository: Arc<dyn PermissionRepository>,
}

impl ActorResolver {
    /// Creates a new resolver.
    #[must_use]
    pub fn new(
        session_store: Arc<dyn SessionStore>,
        user_repository: Arc<dyn UserRepository>,
        permission_repository: Arc<dyn PermissionRepository>,
    ) -> Self {
        Self {
            session_store,
            user_repository,
            permission_repository,
        }
    }

    /// Resolves the actor behind the call context.
    ///
    /// A missing or unknown token is an authentication failure. A session
    /// whose subject no longer decodes or no longer matches an account is a
    /// server-side inconsistency and reported as internal.
    pub async fn resolve(&self, ctx: &CallContext) -> AppResult<Actor> {
        let Some(access_token) = ctx.access_token.as_deref() else {
            return Err(AppError::Unauthorized("session not found".to_owned()));
        };
        let session = self
            .session_store
            .get(access_token)
            .await
            .map_err(|error| AppError::Internal(format!("session fetch failure: {error}")))?
            .ok_or_else(|| AppError::Unauthorized("session not found".to_owned()))?;

        let user_id = decode_subject(&session.subject)?;
        let user = self
            .user_repository
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| {
                AppError::Internal("session subject does not match any user".to_owned())
            })?;
        let permissions = self.permission_repository.find_by_user_id(user_id).await?;

        Ok(Actor {
            user,
            permissions,
            is_local: false,
        })
    }
}

/// Decodes a session subject into a user identifier.
///
/// Subjects are written by the login flow, so a malformed one is an internal
/// inconsistency rather than a caller mistake.
pub(crate) fn decode_subject(subject: &str) -> AppResult<UserId> {
    match SubjectId::parse(subject) {
        Ok(subject_id) => Ok(UserId::from_i64(subject_id.user_id())),
        Err(AppError::Validation(message)) => Err(AppError::Internal(message)),
        Err(error) => Err(error),
    }
}
