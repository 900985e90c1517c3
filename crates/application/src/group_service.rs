//! Group ports and application service.
//!
//! Groups bundle permissions for the users that belong to them. The service
//! owns the group lifecycle and the reconciliation of the permissions
//! granted to a group.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use gateward_core::{AppError, AppResult};
use gateward_domain::{GroupId, Permissions, UserId, validate_group_name};

use crate::actor_resolver::ActorResolver;
use crate::auth_service::CallContext;
use crate::firewall;
use crate::permission_service::PermissionRepository;
use crate::reconciliation::{SetOutcome, SyncSummary, untouched};

const DEFAULT_LIST_LIMIT: i64 = 10;

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

/// A stored group.
#[derive(Debug, Clone, Default)]
pub struct Group {
    /// Unique group identifier.
    pub id: GroupId,
    /// Group name, unique across the service.
    pub name: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Account that created the group.
    pub created_by: Option<UserId>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Account that last modified the group.
    pub updated_by: Option<UserId>,
    /// Last modification time.
    pub updated_at: Option<DateTime<Utc>>,
}

/// Column values for a new group row.
#[derive(Debug)]
pub struct NewGroup {
    /// Group name.
    pub name: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Creating account.
    pub created_by: Option<UserId>,
}

/// Column updates for a group row. `None` keeps the stored value.
#[derive(Debug, Default)]
pub struct GroupPatch {
    /// Replacement name.
    pub name: Option<String>,
    /// Replacement description.
    pub description: Option<String>,
    /// Editing account.
    pub updated_by: Option<UserId>,
}

/// Repository port for group persistence.
#[async_trait]
pub trait GroupRepository: Send + Sync {
    /// Inserts a new group row and returns it.
    async fn create(&self, input: NewGroup) -> AppResult<Group>;

    /// Finds a group by its identifier.
    async fn find_by_id(&self, id: GroupId) -> AppResult<Option<Group>>;

    /// Applies the patch to a group row and returns the updated row.
    async fn update(&self, id: GroupId, patch: GroupPatch) -> AppResult<Group>;

    /// Deletes a group row. Returns the number of rows removed.
    async fn delete(&self, id: GroupId) -> AppResult<u64>;

    /// Lists groups in identifier order.
    async fn list(&self, offset: i64, limit: i64) -> AppResult<Vec<Group>>;

    /// Lists the groups a user belongs to.
    async fn find_by_user_id(&self, user_id: UserId) -> AppResult<Vec<Group>>;
}

/// Repository port for the permissions granted to a group.
#[async_trait]
pub trait GroupPermissionRepository: Send + Sync {
    /// Replaces the group's grants with exactly the given permissions.
    async fn set(&self, group_id: GroupId, permissions: &Permissions) -> AppResult<SyncSummary>;
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Parameters for group creation.
#[derive(Debug, Clone, Default)]
pub struct CreateGroupInput {
    /// Name for the new group.
    pub name: String,
    /// Free-form description.
    pub description: Option<String>,
}

/// Requested group changes.
#[derive(Debug, Clone, Default)]
pub struct ModifyGroupInput {
    /// Replacement name.
    pub name: Option<String>,
    /// Replacement description.
    pub description: Option<String>,
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Application service for the group lifecycle.
#[derive(Clone)]
pub struct GroupService {
    group_repository: Arc<dyn GroupRepository>,
    group_permission_repository: Arc<dyn GroupPermissionRepository>,
    permission_repository: Arc<dyn PermissionRepository>,
    actor_resolver: ActorResolver,
}

impl GroupService {
    /// Creates a new group service.
    #[must_use]
    pub fn new(
        group_repository: Arc<dyn GroupRepository>,
        group_permission_repository: Arc<dyn GroupPermissionRepository>,
        permission_repository: Arc<dyn PermissionRepository>,
        actor_resolver: ActorResolver,
    ) -> Self {
        Self {
            group_repository,
            group_permission_repository,
            permission_repository,
            actor_resolver,
        }
    }

    /// Creates a group.
    pub async fn create(&self, ctx: &CallContext, input: CreateGroupInput) -> AppResult<Group> {
        validate_group_name(&input.name)?;

        let actor = self.actor_resolver.resolve(ctx).await?;
        firewall::can_create_group(&actor)?;

        self.group_repository
            .create(NewGroup {
                name: input.name,
                description: input.description,
                created_by: (actor.user.id.as_i64() != 0).then_some(actor.user.id),
            })
            .await
    }

    /// Retrieves a single group.
    pub async fn get(&self, ctx: &CallContext, group_id: i64) -> AppResult<Group> {
        if group_id <= 0 {
            return Err(AppError::Validation("group id is missing".to_owned()));
        }

        let actor = self.actor_resolver.resolve(ctx).await?;
        firewall::can_retrieve_group(&actor)?;

        self.group_repository
            .find_by_id(GroupId::from_i64(group_id))
            .await?
            .ok_or_else(|| AppError::NotFound("group does not exists".to_owned()))
    }

    /// Applies the requested changes to a group.
    pub async fn modify(
        &self,
        ctx: &CallContext,
        group_id: i64,
        input: ModifyGroupInput,
    ) -> AppResult<Group> {
        if group_id <= 0 {
            return Err(AppError::Validation("group id is missing".to_owned()));
        }
        if input.name.is_none() && input.description.is_none() {
            return Err(AppError::Validation("nothing to be modified".to_owned()));
        }

        let actor = self.actor_resolver.resolve(ctx).await?;
        firewall::can_modify_group(&actor)?;

        self.group_repository
            .update(
                GroupId::from_i64(group_id),
                GroupPatch {
                    name: input.name,
                    description: input.description,
                    updated_by: (actor.user.id.as_i64() != 0).then_some(actor.user.id),
                },
            )
            .await
    }

    /// Deletes a group. Returns true when a row was removed.
    pub async fn delete(&self, ctx: &CallContext, group_id: i64) -> AppResult<bool> {
        if group_id <= 0 {
            return Err(AppError::Validation(
                "group cannot be deleted, invalid id".to_owned(),
            ));
        }

        let actor = self.actor_resolver.resolve(ctx).await?;
        firewall::can_delete_group(&actor)?;

        let affected = self
            .group_repository
            .delete(GroupId::from_i64(group_id))
            .await?;
        if affected == 0 {
            return Err(AppError::NotFound(
                "group cannot be removed, does not exists".to_owned(),
            ));
        }

        Ok(affected > 0)
    }

    /// Lists groups.
    pub async fn list(&self, ctx: &CallContext, offset: i64, limit: i64) -> AppResult<Vec<Group>> {
        let actor = self.actor_resolver.resolve(ctx).await?;
        firewall::can_list_groups(&actor)?;

        let limit = if limit == 0 { DEFAULT_LIST_LIMIT } else { limit };
        self.group_repository.list(offset, limit).await
    }

    /// Replaces the group's grants with exactly the given set.
    ///
    /// With `force` set, permissions missing from the catalog are registered
    /// first instead of failing the grant.
    pub async fn set_permissions(
        &self,
        ctx: &CallContext,
        group_id: i64,
        permissions: &Permissions,
        force: bool,
    ) -> AppResult<SetOutcome> {
        let actor = self.actor_resolver.resolve(ctx).await?;
        firewall::can_set_group_permissions(&actor)?;

        if force {
            self.permission_repository.insert_missing(permissions).await?;
        }

        let summary = self
            .group_permission_repository
            .set(GroupId::from_i64(group_id), permissions)
            .await?;

        Ok(SetOutcome {
            created: summary.created,
            removed: summary.removed,
            untouched: untouched(permissions.len() as i64, summary.created),
        })
    }

    /// Lists the permissions granted to the group.
    pub async fn list_permissions(
        &self,
        ctx: &CallContext,
        group_id: i64,
    ) -> AppResult<Permissions> {
        if group_id <= 0 {
            return Err(AppError::Validation("missing group id".to_owned()));
        }

        let actor = self.actor_resolver.resolve(ctx).await?;
        firewall::can_list_group_permissions(&actor)?;

        self.permission_repository
            .find_by_group_id(GroupId::from_i64(group_id))
            .await
    }
}
