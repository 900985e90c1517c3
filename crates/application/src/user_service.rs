//! User account ports and application service.
//!
//! Owns the account lifecycle: creation including the bootstrap of the very
//! first superuser, retrieval, modification, deletion, listing, and the
//! reconciliation of group memberships and direct permission grants.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use gateward_core::{AppError, AppResult};
use gateward_domain::{
    GroupId, Permission, Permissions, UserId, validate_plain_password, validate_username,
};

use crate::actor_resolver::{Actor, ActorResolver};
use crate::auth_service::{CallContext, PasswordHasher};
use crate::firewall;
use crate::group_service::{Group, GroupRepository};
use crate::permission_service::PermissionRepository;
use crate::reconciliation::{SetOutcome, SyncSummary, untouched};

const DEFAULT_LIST_LIMIT: i64 = 10;

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

/// A stored user account.
#[derive(Debug, Clone, Default)]
pub struct User {
    /// Unique account identifier.
    pub id: UserId,
    /// Login name, unique across the service.
    pub username: String,
    /// Hash of the account password.
    pub password_hash: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Superusers pass every access rule and are hidden from regular actors.
    pub is_superuser: bool,
    /// Staff accounts fall under the stricter staff access rules.
    pub is_staff: bool,
    /// Inactive accounts cannot log in.
    pub is_active: bool,
    /// Unconfirmed accounts cannot log in.
    pub is_confirmed: bool,
    /// Token expected back from the account confirmation flow.
    pub confirmation_token: Option<String>,
    /// Account that created this one, absent for bootstrap accounts.
    pub created_by: Option<UserId>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Account that last modified this one.
    pub updated_by: Option<UserId>,
    /// Last modification time.
    pub updated_at: Option<DateTime<Utc>>,
    /// Time of the most recent successful login.
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Column values for a new account row.
#[derive(Debug)]
pub struct NewUser {
    /// Login name.
    pub username: String,
    /// Already hashed password.
    pub password_hash: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Token for the confirmation flow.
    pub confirmation_token: String,
    /// Superuser flag.
    pub is_superuser: bool,
    /// Staff flag.
    pub is_staff: bool,
    /// Active flag.
    pub is_active: bool,
    /// Confirmed flag.
    pub is_confirmed: bool,
    /// Creating account, absent for bootstrap accounts.
    pub created_by: Option<UserId>,
}

/// Column updates for an account row. `None` keeps the stored value.
#[derive(Debug, Default)]
pub struct UserPatch {
    /// Replacement login name.
    pub username: Option<String>,
    /// Replacement password hash.
    pub password_hash: Option<String>,
    /// Replacement given name.
    pub first_name: Option<String>,
    /// Replacement family name.
    pub last_name: Option<String>,
    /// Replacement superuser flag.
    pub is_superuser: Option<bool>,
    /// Replacement staff flag.
    pub is_staff: Option<bool>,
    /// Replacement active flag.
    pub is_active: Option<bool>,
    /// Replacement confirmed flag.
    pub is_confirmed: Option<bool>,
    /// Editing account, absent when the editor is the local actor.
    pub updated_by: Option<UserId>,
}

/// Listing constraints for account queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilter {
    /// Restricts rows by the superuser flag.
    pub is_superuser: Option<bool>,
    /// Restricts rows by the staff flag.
    pub is_staff: Option<bool>,
    /// Restricts rows to accounts created by the given account.
    pub created_by: Option<UserId>,
    /// Number of rows to skip.
    pub offset: i64,
    /// Maximum number of rows to return.
    pub limit: i64,
}

/// Repository port for account persistence.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Inserts a new account row and returns it.
    async fn create(&self, input: NewUser) -> AppResult<User>;

    /// Finds an account by its identifier.
    async fn find_by_id(&self, id: UserId) -> AppResult<Option<User>>;

    /// Finds an account by its login name.
    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>>;

    /// Applies the patch to an account row and returns the updated row.
    async fn update(&self, id: UserId, patch: UserPatch) -> AppResult<User>;

    /// Deletes an account row. Returns the number of rows removed.
    async fn delete(&self, id: UserId) -> AppResult<u64>;

    /// Lists accounts matching the filter.
    async fn list(&self, filter: &UserFilter) -> AppResult<Vec<User>>;

    /// Counts all stored accounts.
    async fn count(&self) -> AppResult<i64>;

    /// Returns true when an account with the identifier exists.
    async fn exists(&self, id: UserId) -> AppResult<bool>;

    /// Stamps the account with the current time as its last login.
    async fn record_login(&self, id: UserId) -> AppResult<()>;
}

/// Repository port for the groups a user belongs to.
#[async_trait]
pub trait UserGroupRepository: Send + Sync {
    /// Replaces the user's memberships with exactly the given groups.
    async fn set(&self, user_id: UserId, group_ids: &[GroupId]) -> AppResult<SyncSummary>;

    /// Returns true when the user belongs to the group.
    async fn exists(&self, user_id: UserId, group_id: GroupId) -> AppResult<bool>;
}

/// Repository port for the permissions granted directly to a user.
#[async_trait]
pub trait UserPermissionRepository: Send + Sync {
    /// Replaces the user's direct grants with exactly the given permissions.
    async fn set(&self, user_id: UserId, permissions: &Permissions) -> AppResult<SyncSummary>;

    /// Returns true when the permission is granted directly to the user.
    async fn is_granted(&self, user_id: UserId, permission: &Permission) -> AppResult<bool>;
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Parameters for account creation.
#[derive(Debug, Clone, Default)]
pub struct CreateUserInput {
    /// Login name for the new account.
    pub username: String,
    /// Password to be hashed before storage.
    pub plain_password: String,
    /// Already hashed password, accepted from superusers only.
    pub secure_password: Option<String>,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Requests a superuser account.
    pub is_superuser: bool,
    /// Requests a staff account.
    pub is_staff: bool,
    /// Initial active flag.
    pub is_active: bool,
    /// Initial confirmed flag.
    pub is_confirmed: bool,
}

/// Requested account changes. `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct ModifyUserInput {
    /// Replacement login name.
    pub username: Option<String>,
    /// Replacement password hash.
    pub secure_password: Option<String>,
    /// Replacement given name.
    pub first_name: Option<String>,
    /// Replacement family name.
    pub last_name: Option<String>,
    /// Replacement superuser flag.
    pub is_superuser: Option<bool>,
    /// Replacement staff flag.
    pub is_staff: Option<bool>,
    /// Replacement active flag.
    pub is_active: Option<bool>,
    /// Replacement confirmed flag.
    pub is_confirmed: Option<bool>,
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Application service for the user account lifecycle.
#[derive(Clone)]
pub struct UserService {
    user_repository: Arc<dyn UserRepository>,
    group_repository: Arc<dyn GroupRepository>,
    permission_repository: Arc<dyn PermissionRepository>,
    user_group_repository: Arc<dyn UserGroupRepository>,
    user_permission_repository: Arc<dyn UserPermissionRepository>,
    password_hasher: Arc<dyn PasswordHasher>,
    actor_resolver: ActorResolver,
}

impl UserService {
    /// Creates a new user service.
    #[must_use]
    pub fn new(
        user_repository: Arc<dyn UserRepository>,
        group_repository: Arc<dyn GroupRepository>,
        permission_repository: Arc<dyn PermissionRepository>,
        user_group_repository: Arc<dyn UserGroupRepository>,
        user_permission_repository: Arc<dyn UserPermissionRepository>,
        password_hasher: Arc<dyn PasswordHasher>,
        actor_resolver: ActorResolver,
    ) -> Self {
        Self {
            user_repository,
            group_repository,
            permission_repository,
            user_group_repository,
            user_permission_repository,
            password_hasher,
            actor_resolver,
        }
    }

    /// Creates a user account.
    ///
    /// When no actor can be resolved and the request asks for a superuser,
    /// the call is treated as the bootstrap of the very first account. It
    /// succeeds only while the store holds no accounts at all. Superuser
    /// accounts are normalized on the way in: never staff, always active
    /// and confirmed.
    pub async fn create(&self, ctx: &CallContext, input: CreateUserInput) -> AppResult<User> {
        let actor = match self.actor_resolver.resolve(ctx).await {
            Ok(actor) => actor,
            Err(error) => {
                if !input.is_superuser {
                    return Err(error);
                }
                let existing = self.user_repository.count().await?;
                if existing > 0 {
                    return Err(AppError::Conflict(
                        "initial superuser account already exists".to_owned(),
                    ));
                }
                Actor::local()
            }
        };

        firewall::can_create_user(&actor, &input)?;
        validate_username(&input.username)?;

        let password_hash = match input.secure_password {
            Some(secure_password) => {
                if !actor.is_local && !actor.user.is_superuser {
                    return Err(AppError::Forbidden(
                        "only superuser can create an user with manually defined secure password"
                            .to_owned(),
                    ));
                }
                secure_password
            }
            None => {
                validate_plain_password(&input.plain_password)?;
                self.password_hasher.hash_password(&input.plain_password)?
            }
        };

        let (is_staff, is_active, is_confirmed) = if input.is_superuser {
            (false, true, true)
        } else {
            (input.is_staff, input.is_active, input.is_confirmed)
        };

        self.user_repository
            .create(NewUser {
                username: input.username,
                password_hash,
                first_name: input.first_name,
                last_name: input.last_name,
                confirmation_token: Uuid::new_v4().to_string(),
                is_superuser: input.is_superuser,
                is_staff,
                is_active,
                is_confirmed,
                created_by: (!actor.is_local).then_some(actor.user.id),
            })
            .await
    }

    /// Retrieves a single account.
    pub async fn get(&self, ctx: &CallContext, user_id: i64) -> AppResult<User> {
        if user_id <= 0 {
            return Err(AppError::Validation("user id is missing".to_owned()));
        }

        let actor = self.actor_resolver.resolve(ctx).await?;
        let entity = self
            .user_repository
            .find_by_id(UserId::from_i64(user_id))
            .await?
            .ok_or_else(|| AppError::NotFound("user does not exists".to_owned()))?;

        firewall::can_retrieve_user(&actor, &entity)?;

        Ok(entity)
    }

    /// Applies the requested changes to an account.
    ///
    /// The access rules run twice: a coarse capability check before the
    /// account is fetched, then the full check against the fetched row and
    /// the requested changes.
    pub async fn modify(
        &self,
        ctx: &CallContext,
        user_id: i64,
        input: ModifyUserInput,
    ) -> AppResult<User> {
        if user_id <= 0 {
            return Err(AppError::Validation(
                "user cannot be modified, invalid id".to_owned(),
            ));
        }

        let actor = self.actor_resolver.resolve(ctx).await?;
        firewall::can_modify_user(&actor)?;

        let id = UserId::from_i64(user_id);
        let entity = self
            .user_repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("user does not exists".to_owned()))?;

        firewall::can_modify_user_entity(&actor, &input, &entity)?;

        self.user_repository
            .update(
                id,
                UserPatch {
                    username: input.username,
                    password_hash: input.secure_password,
                    first_name: input.first_name,
                    last_name: input.last_name,
                    is_superuser: input.is_superuser,
                    is_staff: input.is_staff,
                    is_active: input.is_active,
                    is_confirmed: input.is_confirmed,
                    updated_by: (actor.user.id.as_i64() != 0).then_some(actor.user.id),
                },
            )
            .await
    }

    /// Deletes an account. Returns true when a row was removed.
    pub async fn delete(&self, ctx: &CallContext, user_id: i64) -> AppResult<bool> {
        if user_id <= 0 {
            return Err(AppError::Validation(
                "user cannot be deleted, invalid id".to_owned(),
            ));
        }

        let actor = self.actor_resolver.resolve(ctx).await?;
        let id = UserId::from_i64(user_id);
        let entity = self
            .user_repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("user does not exists".to_owned()))?;

        firewall::can_delete_user(&actor, &entity)?;

        let affected = self.user_repository.delete(id).await?;
        Ok(affected > 0)
    }

    /// Lists accounts visible to the actor.
    ///
    /// The filter is first checked against the actor, then narrowed to the
    /// rows the actor is entitled to see before the query runs.
    pub async fn list(&self, ctx: &CallContext, filter: UserFilter) -> AppResult<Vec<User>> {
        let actor = self.actor_resolver.resolve(ctx).await?;
        firewall::can_list_users(&actor, &filter)?;

        let mut filter = firewall::narrow_user_filter(&actor, filter);
        if filter.limit == 0 {
            filter.limit = DEFAULT_LIST_LIMIT;
        }

        self.user_repository.list(&filter).await
    }

    /// Replaces the user's group memberships with exactly the given set.
    pub async fn set_groups(
        &self,
        ctx: &CallContext,
        user_id: i64,
        group_ids: &[GroupId],
    ) -> AppResult<SetOutcome> {
        let actor = self.actor_resolver.resolve(ctx).await?;
        firewall::can_set_user_groups(&actor)?;

        let summary = self
            .user_group_repository
            .set(UserId::from_i64(user_id), group_ids)
            .await?;

        Ok(SetOutcome {
            created: summary.created,
            removed: summary.removed,
            untouched: untouched(group_ids.len() as i64, summary.created),
        })
    }

    /// Replaces the user's direct grants with exactly the given set.
    ///
    /// With `force` set, permissions missing from the catalog are registered
    /// first instead of failing the grant.
    pub async fn set_permissions(
        &self,
        ctx: &CallContext,
        user_id: i64,
        permissions: &Permissions,
        force: bool,
    ) -> AppResult<SetOutcome> {
        let actor = self.actor_resolver.resolve(ctx).await?;
        firewall::can_set_user_permissions(&actor)?;

        if force {
            self.permission_repository.insert_missing(permissions).await?;
        }

        let summary = self
            .user_permission_repository
            .set(UserId::from_i64(user_id), permissions)
            .await?;

        Ok(SetOutcome {
            created: summary.created,
            removed: summary.removed,
            untouched: untouched(permissions.len() as i64, summary.created),
        })
    }

    /// Lists the groups the user belongs to.
    pub async fn list_groups(&self, ctx: &CallContext, user_id: i64) -> AppResult<Vec<Group>> {
        if user_id <= 0 {
            return Err(AppError::Validation("missing user id".to_owned()));
        }

        let actor = self.actor_resolver.resolve(ctx).await?;
        let id = UserId::from_i64(user_id);
        firewall::can_list_user_groups(&actor, id)?;

        self.group_repository.find_by_user_id(id).await
    }

    /// Lists the permissions granted to the user, directly or via groups.
    pub async fn list_permissions(
        &self,
        ctx: &CallContext,
        user_id: i64,
    ) -> AppResult<Permissions> {
        if user_id <= 0 {
            return Err(AppError::Validation("missing user id".to_owned()));
        }

        let actor = self.actor_resolver.resolve(ctx).await?;
        let id = UserId::from_i64(user_id);
        firewall::can_list_user_permissions(&actor, id)?;

        self.permission_repository.find_by_user_id(id).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use gateward_core::{AppError, AppResult, SubjectId};
    use gateward_domain::{Capability, GroupId, Permission, Permissions, UserId};
    use tokio::sync::Mutex;

    use crate::actor_resolver::ActorResolver;
    use crate::auth_service::{CallContext, PasswordHasher, SessionRecord, SessionStore};
    use crate::group_service::{Group, GroupPatch, GroupRepository, NewGroup};
    use crate::permission_service::{PermissionFilter, PermissionRecord, PermissionRepository};
    use crate::reconciliation::{RegistryDiff, SetOutcome, SyncSummary};

    use super::{
        CreateUserInput, ModifyUserInput, NewUser, User, UserFilter, UserGroupRepository,
        UserPatch, UserPermissionRepository, UserRepository, UserService,
    };

    #[derive(Default)]
    struct FakeSessionStore {
        sessions: Mutex<HashMap<String, SessionRecord>>,
        counter: Mutex<u64>,
    }

    #[async_trait]
    impl SessionStore for FakeSessionStore {
        async fn get(&self, access_token: &str) -> AppResult<Option<SessionRecord>> {
            Ok(self.sessions.lock().await.get(access_token).cloned())
        }

        async fn start(
            &self,
            subject: &str,
            bag: HashMap<String, String>,
        ) -> AppResult<SessionRecord> {
            let mut counter = self.counter.lock().await;
            *counter += 1;
            let record = SessionRecord {
                access_token: format!("token-{counter}"),
                subject: subject.to_owned(),
                bag,
            };
            self.sessions
                .lock()
                .await
                .insert(record.access_token.clone(), record.clone());
            Ok(record)
        }

        async fn abandon(&self, access_token: &str) -> AppResult<bool> {
            Ok(self.sessions.lock().await.remove(access_token).is_some())
        }
    }

    struct FakePasswordHasher;

    #[async_trait]
    impl PasswordHasher for FakePasswordHasher {
        fn hash_password(&self, password: &str) -> AppResult<String> {
            Ok(format!("hashed:{password}"))
        }

        fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool> {
            Ok(hash == format!("hashed:{password}"))
        }
    }

    #[derive(Default)]
    struct FakeUserRepository {
        users: Mutex<HashMap<i64, User>>,
        filters: Mutex<Vec<UserFilter>>,
    }

    impl FakeUserRepository {
        async fn insert(&self, user: User) {
            self.users.lock().await.insert(user.id.as_i64(), user);
        }
    }

    #[async_trait]
    impl UserRepository for FakeUserRepository {
        async fn create(&self, input: NewUser) -> AppResult<User> {
            let mut users = self.users.lock().await;
            let id = users.keys().max().copied().unwrap_or_default() + 1;
            let user = User {
                id: UserId::from_i64(id),
                username: input.username,
                password_hash: input.password_hash,
                first_name: input.first_name,
                last_name: input.last_name,
                is_superuser: input.is_superuser,
                is_staff: input.is_staff,
                is_active: input.is_active,
                is_confirmed: input.is_confirmed,
                confirmation_token: Some(input.confirmation_token),
                created_by: input.created_by,
                ..User::default()
            };
            users.insert(id, user.clone());
            Ok(user)
        }

        async fn find_by_id(&self, id: UserId) -> AppResult<Option<User>> {
            Ok(self.users.lock().await.get(&id.as_i64()).cloned())
        }

        async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
            Ok(self
                .users
                .lock()
                .await
                .values()
                .find(|user| user.username == username)
                .cloned())
        }

        async fn update(&self, id: UserId, patch: UserPatch) -> AppResult<User> {
            let mut users = self.users.lock().await;
            let user = users
                .get_mut(&id.as_i64())
                .ok_or_else(|| AppError::NotFound("user does not exists".to_owned()))?;
            if let Some(username) = patch.username {
                user.username = username;
            }
            if let Some(password_hash) = patch.password_hash {
                user.password_hash = password_hash;
            }
            if let Some(first_name) = patch.first_name {
                user.first_name = first_name;
            }
            if let Some(last_name) = patch.last_name {
                user.last_name = last_name;
            }
            if let Some(is_superuser) = patch.is_superuser {
                user.is_superuser = is_superuser;
            }
            if let Some(is_staff) = patch.is_staff {
                user.is_staff = is_staff;
            }
            if let Some(is_active) = patch.is_active {
                user.is_active = is_active;
            }
            if let Some(is_confirmed) = patch.is_confirmed {
                user.is_confirmed = is_confirmed;
            }
            if patch.updated_by.is_some() {
                user.updated_by = patch.updated_by;
            }
            Ok(user.clone())
        }

        async fn delete(&self, id: UserId) -> AppResult<u64> {
            Ok(u64::from(
                self.users.lock().await.remove(&id.as_i64()).is_some(),
            ))
        }

        async fn list(&self, filter: &UserFilter) -> AppResult<Vec<User>> {
            self.filters.lock().await.push(filter.clone());
            Ok(self.users.lock().await.values().cloned().collect())
        }

        async fn count(&self) -> AppResult<i64> {
            Ok(self.users.lock().await.len() as i64)
        }

        async fn exists(&self, id: UserId) -> AppResult<bool> {
            Ok(self.users.lock().await.contains_key(&id.as_i64()))
        }

        async fn record_login(&self, _id: UserId) -> AppResult<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeGroupRepository {
        by_user: Mutex<HashMap<i64, Vec<Group>>>,
    }

    #[async_trait]
    impl GroupRepository for FakeGroupRepository {
        async fn create(&self, _input: NewGroup) -> AppResult<Group> {
            Ok(Group::default())
        }

        async fn find_by_id(&self, _id: GroupId) -> AppResult<Option<Group>> {
            Ok(None)
        }

        async fn update(&self, _id: GroupId, _patch: GroupPatch) -> AppResult<Group> {
            Ok(Group::default())
        }

        async fn delete(&self, _id: GroupId) -> AppResult<u64> {
            Ok(0)
        }

        async fn list(&self, _offset: i64, _limit: i64) -> AppResult<Vec<Group>> {
            Ok(Vec::new())
        }

        async fn find_by_user_id(&self, user_id: UserId) -> AppResult<Vec<Group>> {
            Ok(self
                .by_user
                .lock()
                .await
                .get(&user_id.as_i64())
                .cloned()
                .unwrap_or_default())
        }
    }

    #[derive(Default)]
    struct FakePermissionRepository {
        by_user: Mutex<HashMap<i64, Permissions>>,
        inserted_missing: Mutex<Vec<i64>>,
    }

    #[async_trait]
    impl PermissionRepository for FakePermissionRepository {
        async fn find_by_id(
            &self,
            _id: gateward_domain::PermissionId,
        ) -> AppResult<Option<PermissionRecord>> {
            Ok(None)
        }

        async fn find(&self, _filter: &PermissionFilter) -> AppResult<Vec<PermissionRecord>> {
            Ok(Vec::new())
        }

        async fn find_by_user_id(&self, user_id: UserId) -> AppResult<Permissions> {
            Ok(self
                .by_user
                .lock()
                .await
                .get(&user_id.as_i64())
                .cloned()
                .unwrap_or_default())
        }

        async fn find_by_group_id(&self, _group_id: GroupId) -> AppResult<Permissions> {
            Ok(Permissions::default())
        }

        async fn register(
            &self,
            _subsystem: &str,
            _permissions: &Permissions,
        ) -> AppResult<RegistryDiff> {
            Ok(RegistryDiff::default())
        }

        async fn insert_missing(&self, permissions: &Permissions) -> AppResult<i64> {
            let count = permissions.len() as i64;
            self.inserted_missing.lock().await.push(count);
            Ok(count)
        }
    }

    #[derive(Default)]
    struct FakeUserGroupRepository {
        memberships: Mutex<Vec<(UserId, GroupId)>>,
    }

    #[async_trait]
    impl UserGroupRepository for FakeUserGroupRepository {
        async fn set(&self, user_id: UserId, group_ids: &[GroupId]) -> AppResult<SyncSummary> {
            let mut memberships = self.memberships.lock().await;
            let current: Vec<GroupId> = memberships
                .iter()
                .filter(|(member, _)| *member == user_id)
                .map(|(_, group)| *group)
                .collect();
            let created = group_ids
                .iter()
                .filter(|group| !current.contains(group))
                .count() as i64;
            let removed = current
                .iter()
                .filter(|group| !group_ids.contains(group))
                .count() as i64;
            memberships.retain(|(member, _)| *member != user_id);
            for group_id in group_ids {
                memberships.push((user_id, *group_id));
            }
            Ok(SyncSummary { created, removed })
        }

        async fn exists(&self, user_id: UserId, group_id: GroupId) -> AppResult<bool> {
            Ok(self
                .memberships
                .lock()
                .await
                .contains(&(user_id, group_id)))
        }
    }

    #[derive(Default)]
    struct FakeUserPermissionRepository {
        grants: Mutex<Vec<(UserId, Permission)>>,
    }

    #[async_trait]
    impl UserPermissionRepository for FakeUserPermissionRepository {
        async fn set(&self, user_id: UserId, permissions: &Permissions) -> AppResult<SyncSummary> {
            let mut grants = self.grants.lock().await;
            let current: Vec<Permission> = grants
                .iter()
                .filter(|(grantee, _)| *grantee == user_id)
                .map(|(_, permission)| permission.clone())
                .collect();
            let created = permissions
                .iter()
                .filter(|permission| !current.contains(permission))
                .count() as i64;
            let removed = current
                .iter()
                .filter(|permission| {
                    !permissions
                        .iter()
                        .any(|requested| requested == *permission)
                })
                .count() as i64;
            grants.retain(|(grantee, _)| *grantee != user_id);
            for permission in permissions.iter() {
                grants.push((user_id, permission.clone()));
            }
            Ok(SyncSummary { created, removed })
        }

        async fn is_granted(&self, user_id: UserId, permission: &Permission) -> AppResult<bool> {
            Ok(self
                .grants
                .lock()
                .await
                .contains(&(user_id, permission.clone())))
        }
    }

    struct Harness {
        service: UserService,
        session_store: Arc<FakeSessionStore>,
        user_repository: Arc<FakeUserRepository>,
        group_repository: Arc<FakeGroupRepository>,
        permission_repository: Arc<FakePermissionRepository>,
        user_group_repository: Arc<FakeUserGroupRepository>,
    }

    fn harness() -> Harness {
        let session_store = Arc::new(FakeSessionStore::default());
        let user_repository = Arc::new(FakeUserRepository::default());
        let group_repository = Arc::new(FakeGroupRepository::default());
        let permission_repository = Arc::new(FakePermissionRepository::default());
        let user_group_repository = Arc::new(FakeUserGroupRepository::default());
        let user_permission_repository = Arc::new(FakeUserPermissionRepository::default());
        let actor_resolver = ActorResolver::new(
            session_store.clone(),
            user_repository.clone(),
            permission_repository.clone(),
        );
        let service = UserService::new(
            user_repository.clone(),
            group_repository.clone(),
            permission_repository.clone(),
            user_group_repository.clone(),
            user_permission_repository,
            Arc::new(FakePasswordHasher),
            actor_resolver,
        );
        Harness {
            service,
            session_store,
            user_repository,
            group_repository,
            permission_repository,
            user_group_repository,
        }
    }

    fn account(id: i64, username: &str) -> User {
        User {
            id: UserId::from_i64(id),
            username: username.to_owned(),
            password_hash: format!("hashed:{username}-secret"),
            is_active: true,
            is_confirmed: true,
            ..User::default()
        }
    }

    fn root_account(id: i64) -> User {
        User {
            is_superuser: true,
            ..account(id, "root")
        }
    }

    async fn session_for(harness: &Harness, user_id: i64) -> CallContext {
        let subject = SubjectId::from_user_id(user_id).to_string();
        let record = harness.session_store.start(&subject, HashMap::new()).await;
        match record {
            Ok(record) => CallContext::with_token(record.access_token),
            Err(error) => panic!("session could not be started: {error}"),
        }
    }

    async fn grant(harness: &Harness, user_id: i64, capabilities: &[Capability]) {
        harness.permission_repository.by_user.lock().await.insert(
            user_id,
            Permissions::from_strings(
                capabilities.iter().map(|capability| capability.as_str()),
            ),
        );
    }

    #[tokio::test]
    async fn first_superuser_bootstraps_without_a_session() {
        let harness = harness();
        let input = CreateUserInput {
            username: "root-admin".to_owned(),
            plain_password: "long enough".to_owned(),
            is_superuser: true,
            is_staff: true,
            ..CreateUserInput::default()
        };

        let created = harness.service.create(&CallContext::default(), input).await;

        match created {
            Ok(user) => {
                assert!(user.is_superuser);
                assert!(!user.is_staff);
                assert!(user.is_active);
                assert!(user.is_confirmed);
                assert_eq!(user.created_by, None);
                assert!(user.confirmation_token.is_some());
            }
            Err(error) => panic!("bootstrap failed: {error}"),
        }
    }

    #[tokio::test]
    async fn bootstrap_is_refused_once_accounts_exist() {
        let harness = harness();
        harness.user_repository.insert(account(1, "earlier")).await;
        let input = CreateUserInput {
            username: "root-admin".to_owned(),
            plain_password: "long enough".to_owned(),
            is_superuser: true,
            ..CreateUserInput::default()
        };

        let result = harness.service.create(&CallContext::default(), input).await;

        match result {
            Err(AppError::Conflict(message)) => {
                assert_eq!(message, "initial superuser account already exists");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn regular_creation_without_a_session_is_unauthorized() {
        let harness = harness();
        let input = CreateUserInput {
            username: "somebody".to_owned(),
            plain_password: "long enough".to_owned(),
            ..CreateUserInput::default()
        };

        let result = harness.service.create(&CallContext::default(), input).await;

        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn plain_passwords_are_hashed_before_storage() {
        let harness = harness();
        harness.user_repository.insert(root_account(1)).await;
        let ctx = session_for(&harness, 1).await;
        let input = CreateUserInput {
            username: "johnsnow".to_owned(),
            plain_password: "winter is coming".to_owned(),
            ..CreateUserInput::default()
        };

        let created = harness.service.create(&ctx, input).await;

        match created {
            Ok(user) => {
                assert_eq!(user.password_hash, "hashed:winter is coming");
                assert_eq!(user.created_by, Some(UserId::from_i64(1)));
            }
            Err(error) => panic!("creation failed: {error}"),
        }
    }

    #[tokio::test]
    async fn short_plain_passwords_are_rejected() {
        let harness = harness();
        harness.user_repository.insert(root_account(1)).await;
        let ctx = session_for(&harness, 1).await;
        let input = CreateUserInput {
            username: "johnsnow".to_owned(),
            plain_password: "seven77".to_owned(),
            ..CreateUserInput::default()
        };

        let result = harness.service.create(&ctx, input).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn short_usernames_are_rejected() {
        let harness = harness();
        harness.user_repository.insert(root_account(1)).await;
        let ctx = session_for(&harness, 1).await;
        let input = CreateUserInput {
            username: "jo".to_owned(),
            plain_password: "long enough".to_owned(),
            ..CreateUserInput::default()
        };

        let result = harness.service.create(&ctx, input).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn secure_passwords_are_reserved_for_superusers() {
        let harness = harness();
        harness.user_repository.insert(account(2, "creator")).await;
        grant(&harness, 2, &[Capability::UserCanCreate]).await;
        let ctx = session_for(&harness, 2).await;
        let input = CreateUserInput {
            username: "johnsnow".to_owned(),
            secure_password: Some("$argon2id$pre-hashed".to_owned()),
            ..CreateUserInput::default()
        };

        let result = harness.service.create(&ctx, input).await;

        match result {
            Err(AppError::Forbidden(message)) => {
                assert_eq!(
                    message,
                    "only superuser can create an user with manually defined secure password"
                );
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn superusers_may_supply_a_secure_password() {
        let harness = harness();
        harness.user_repository.insert(root_account(1)).await;
        let ctx = session_for(&harness, 1).await;
        let input = CreateUserInput {
            username: "johnsnow".to_owned(),
            secure_password: Some("$argon2id$pre-hashed".to_owned()),
            ..CreateUserInput::default()
        };

        let created = harness.service.create(&ctx, input).await;

        match created {
            Ok(user) => assert_eq!(user.password_hash, "$argon2id$pre-hashed"),
            Err(error) => panic!("creation failed: {error}"),
        }
    }

    #[tokio::test]
    async fn retrieval_validates_the_id_first() {
        let harness = harness();

        let result = harness.service.get(&CallContext::default(), 0).await;

        match result {
            Err(AppError::Validation(message)) => assert_eq!(message, "user id is missing"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_accounts_cannot_be_retrieved() {
        let harness = harness();
        harness.user_repository.insert(root_account(1)).await;
        let ctx = session_for(&harness, 1).await;

        let result = harness.service.get(&ctx, 99).await;

        match result {
            Err(AppError::NotFound(message)) => assert_eq!(message, "user does not exists"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn modification_stamps_the_editing_account() {
        let harness = harness();
        harness.user_repository.insert(root_account(1)).await;
        harness.user_repository.insert(account(2, "johnsnow")).await;
        let ctx = session_for(&harness, 1).await;
        let input = ModifyUserInput {
            first_name: Some("John".to_owned()),
            ..ModifyUserInput::default()
        };

        let updated = harness.service.modify(&ctx, 2, input).await;

        match updated {
            Ok(user) => {
                assert_eq!(user.first_name, "John");
                assert_eq!(user.updated_by, Some(UserId::from_i64(1)));
            }
            Err(error) => panic!("modification failed: {error}"),
        }
    }

    #[tokio::test]
    async fn modification_validates_the_id_first() {
        let harness = harness();

        let result = harness
            .service
            .modify(&CallContext::default(), -3, ModifyUserInput::default())
            .await;

        match result {
            Err(AppError::Validation(message)) => {
                assert_eq!(message, "user cannot be modified, invalid id");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn modification_needs_a_modify_capability_up_front() {
        let harness = harness();
        harness.user_repository.insert(account(2, "caller")).await;
        harness.user_repository.insert(account(3, "target")).await;
        let ctx = session_for(&harness, 2).await;

        let result = harness
            .service
            .modify(&ctx, 3, ModifyUserInput::default())
            .await;

        match result {
            Err(AppError::Forbidden(message)) => {
                assert_eq!(message, "user cannot be modified, missing permissions");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn self_removal_is_refused_before_capabilities_matter() {
        let harness = harness();
        harness.user_repository.insert(root_account(1)).await;
        let ctx = session_for(&harness, 1).await;

        let result = harness.service.delete(&ctx, 1).await;

        match result {
            Err(AppError::Forbidden(message)) => {
                assert_eq!(message, "user is not permitted to remove himself");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn deletion_reports_whether_a_row_went_away() {
        let harness = harness();
        harness.user_repository.insert(root_account(1)).await;
        harness.user_repository.insert(account(2, "johnsnow")).await;
        let ctx = session_for(&harness, 1).await;

        let removed = harness.service.delete(&ctx, 2).await;

        assert!(matches!(removed, Ok(true)));
        assert!(!harness
            .user_repository
            .users
            .lock()
            .await
            .contains_key(&2));
    }

    #[tokio::test]
    async fn deletion_validates_the_id_first() {
        let harness = harness();

        let result = harness.service.delete(&CallContext::default(), 0).await;

        match result {
            Err(AppError::Validation(message)) => {
                assert_eq!(message, "user cannot be deleted, invalid id");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn listing_narrows_the_filter_for_regular_actors() {
        let harness = harness();
        harness.user_repository.insert(account(2, "reader")).await;
        grant(&harness, 2, &[Capability::UserCanRetrieveAsStranger]).await;
        let ctx = session_for(&harness, 2).await;

        let listed = harness.service.list(&ctx, UserFilter::default()).await;
        assert!(listed.is_ok());

        let filters = harness.user_repository.filters.lock().await;
        assert_eq!(
            filters.as_slice(),
            &[UserFilter {
                is_superuser: Some(false),
                is_staff: Some(false),
                created_by: None,
                offset: 0,
                limit: 10,
            }]
        );
    }

    #[tokio::test]
    async fn listing_without_the_capability_is_forbidden() {
        let harness = harness();
        harness.user_repository.insert(account(2, "reader")).await;
        let ctx = session_for(&harness, 2).await;

        let result = harness.service.list(&ctx, UserFilter::default()).await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn group_memberships_are_reconciled_not_appended() {
        let harness = harness();
        harness.user_repository.insert(root_account(1)).await;
        let ctx = session_for(&harness, 1).await;
        let member = UserId::from_i64(5);
        {
            let mut memberships = harness.user_group_repository.memberships.lock().await;
            memberships.push((member, GroupId::from_i64(1)));
            memberships.push((member, GroupId::from_i64(2)));
        }

        let outcome = harness
            .service
            .set_groups(&ctx, 5, &[GroupId::from_i64(2), GroupId::from_i64(3)])
            .await;

        match outcome {
            Ok(outcome) => {
                assert_eq!(
                    outcome,
                    SetOutcome {
                        created: 1,
                        removed: 1,
                        untouched: 1,
                    }
                );
            }
            Err(error) => panic!("reconciliation failed: {error}"),
        }

        let memberships = harness.user_group_repository.memberships.lock().await;
        assert_eq!(
            memberships.as_slice(),
            &[
                (member, GroupId::from_i64(2)),
                (member, GroupId::from_i64(3)),
            ]
        );
    }

    #[tokio::test]
    async fn repeating_the_same_membership_set_changes_nothing() {
        let harness = harness();
        harness.user_repository.insert(root_account(1)).await;
        let ctx = session_for(&harness, 1).await;
        let desired = [GroupId::from_i64(2), GroupId::from_i64(3)];

        let seeded = harness.service.set_groups(&ctx, 5, &desired).await;
        assert!(matches!(
            seeded,
            Ok(SetOutcome {
                created: 2,
                removed: 0,
                untouched: 0,
            })
        ));

        let repeated = harness.service.set_groups(&ctx, 5, &desired).await;
        match repeated {
            Ok(outcome) => {
                assert_eq!(
                    outcome,
                    SetOutcome {
                        created: 0,
                        removed: 0,
                        untouched: 2,
                    }
                );
            }
            Err(error) => panic!("reconciliation failed: {error}"),
        }
    }

    #[tokio::test]
    async fn an_empty_membership_set_clears_the_association() {
        let harness = harness();
        harness.user_repository.insert(root_account(1)).await;
        let ctx = session_for(&harness, 1).await;
        let member = UserId::from_i64(5);
        {
            let mut memberships = harness.user_group_repository.memberships.lock().await;
            memberships.push((member, GroupId::from_i64(1)));
            memberships.push((member, GroupId::from_i64(2)));
        }

        let outcome = harness.service.set_groups(&ctx, 5, &[]).await;

        match outcome {
            Ok(outcome) => {
                assert_eq!(
                    outcome,
                    SetOutcome {
                        created: 0,
                        removed: 2,
                        untouched: -2,
                    }
                );
            }
            Err(error) => panic!("reconciliation failed: {error}"),
        }
        let memberships = harness.user_group_repository.memberships.lock().await;
        assert!(memberships.is_empty());
    }

    #[tokio::test]
    async fn setting_groups_needs_both_capability_halves() {
        let harness = harness();
        harness.user_repository.insert(account(2, "caller")).await;
        grant(&harness, 2, &[Capability::UserGroupCanCreate]).await;
        let ctx = session_for(&harness, 2).await;

        let result = harness.service.set_groups(&ctx, 5, &[]).await;

        match result {
            Err(AppError::Forbidden(message)) => {
                assert_eq!(message, "user groups cannot be set, missing permission");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn forced_grants_register_unknown_permissions_first() {
        let harness = harness();
        harness.user_repository.insert(root_account(1)).await;
        let ctx = session_for(&harness, 1).await;
        let permissions =
            Permissions::from_strings(["books:novel:can read", "books:novel:can borrow"]);

        let outcome = harness
            .service
            .set_permissions(&ctx, 5, &permissions, true)
            .await;

        match outcome {
            Ok(outcome) => {
                assert_eq!(
                    outcome,
                    SetOutcome {
                        created: 2,
                        removed: 0,
                        untouched: 0,
                    }
                );
            }
            Err(error) => panic!("reconciliation failed: {error}"),
        }
        assert_eq!(
            *harness.permission_repository.inserted_missing.lock().await,
            vec![2]
        );
    }

    #[tokio::test]
    async fn unforced_grants_leave_the_catalog_alone() {
        let harness = harness();
        harness.user_repository.insert(root_account(1)).await;
        let ctx = session_for(&harness, 1).await;
        let permissions = Permissions::from_strings(["books:novel:can read"]);

        let outcome = harness
            .service
            .set_permissions(&ctx, 5, &permissions, false)
            .await;

        assert!(outcome.is_ok());
        assert!(harness
            .permission_repository
            .inserted_missing
            .lock()
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn own_group_memberships_are_listable_without_capabilities() {
        let harness = harness();
        harness.user_repository.insert(account(2, "member")).await;
        harness.group_repository.by_user.lock().await.insert(
            2,
            vec![Group {
                id: GroupId::from_i64(7),
                name: "editors".to_owned(),
                ..Group::default()
            }],
        );
        let ctx = session_for(&harness, 2).await;

        let groups = harness.service.list_groups(&ctx, 2).await;

        match groups {
            Ok(groups) => {
                assert_eq!(groups.len(), 1);
                assert_eq!(groups[0].name, "editors");
            }
            Err(error) => panic!("listing failed: {error}"),
        }

        let foreign = harness.service.list_groups(&ctx, 3).await;
        assert!(matches!(foreign, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn listing_group_memberships_requires_a_user_id() {
        let harness = harness();

        let result = harness.service.list_groups(&CallContext::default(), 0).await;

        match result {
            Err(AppError::Validation(message)) => assert_eq!(message, "missing user id"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn own_permissions_are_listable_without_capabilities() {
        let harness = harness();
        harness.user_repository.insert(account(2, "member")).await;
        harness
            .permission_repository
            .by_user
            .lock()
            .await
            .insert(2, Permissions::from_strings(["books:novel:can read"]));
        let ctx = session_for(&harness, 2).await;

        let permissions = harness.service.list_permissions(&ctx, 2).await;

        match permissions {
            Ok(permissions) => assert!(permissions.contains_any(&["books:novel:can read"])),
            Err(error) => panic!("listing failed: {error}"),
        }
    }
}
