//! Per-operation access rules evaluated against the calling actor.
//!
//! Each rule either allows the call or names the missing capability in a
//! `Forbidden` error. Superusers pass every rule except self-deletion, which
//! is rejected before the superuser shortcut applies. "Owner" always means
//! the actor created the account in question, not the account itself.

use gateward_core::{AppError, AppResult};
use gateward_domain::{Capability, UserId};

use crate::actor_resolver::Actor;
use crate::user_service::{CreateUserInput, ModifyUserInput, User, UserFilter};

fn is_owned_by(entity: &User, actor: &Actor) -> bool {
    entity.created_by == Some(actor.user.id)
}

fn allow_with(actor: &Actor, capability: Capability, denial: &str) -> AppResult<()> {
    if actor.user.is_superuser {
        return Ok(());
    }
    if actor.permissions.contains_any(&[capability]) {
        return Ok(());
    }
    Err(AppError::Forbidden(denial.to_owned()))
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// Decides whether the actor may create the requested account.
pub fn can_create_user(actor: &Actor, input: &CreateUserInput) -> AppResult<()> {
    if actor.is_local || actor.user.is_superuser {
        return Ok(());
    }
    if input.is_superuser {
        return Err(AppError::Forbidden(
            "user is not allowed to create superuser".to_owned(),
        ));
    }
    if input.is_staff
        && !actor
            .permissions
            .contains_any(&[Capability::UserCanCreateStaff])
    {
        return Err(AppError::Forbidden(
            "user is not allowed to create staff user".to_owned(),
        ));
    }
    if !actor
        .permissions
        .contains_any(&[Capability::UserCanCreate, Capability::UserCanCreateStaff])
    {
        return Err(AppError::Forbidden(
            "user is not allowed to create another user".to_owned(),
        ));
    }
    Ok(())
}

/// Decides whether the actor may retrieve the account.
pub fn can_retrieve_user(actor: &Actor, entity: &User) -> AppResult<()> {
    if actor.user.is_superuser {
        return Ok(());
    }
    if entity.is_superuser {
        return Err(AppError::Forbidden(
            "only superuser is permitted to retrieve other superuser".to_owned(),
        ));
    }
    if entity.is_staff {
        if is_owned_by(entity, actor) {
            if !actor
                .permissions
                .contains_any(&[Capability::UserCanRetrieveStaffAsOwner])
            {
                return Err(AppError::Forbidden(
                    "staff user cannot be retrieved as an owner, missing permission".to_owned(),
                ));
            }
            return Ok(());
        }
        if !actor
            .permissions
            .contains_any(&[Capability::UserCanRetrieveStaffAsStranger])
        {
            return Err(AppError::Forbidden(
                "staff user cannot be retrieved as a stranger, missing permission".to_owned(),
            ));
        }
        return Ok(());
    }
    if is_owned_by(entity, actor) {
        if !actor
            .permissions
            .contains_any(&[Capability::UserCanRetrieveAsOwner])
        {
            return Err(AppError::Forbidden(
                "user cannot be retrieved as an owner, missing permission".to_owned(),
            ));
        }
        return Ok(());
    }
    if !actor
        .permissions
        .contains_any(&[Capability::UserCanRetrieveAsStranger])
    {
        return Err(AppError::Forbidden(
            "user cannot be retrieved as a stranger, missing permission".to_owned(),
        ));
    }
    Ok(())
}

/// Coarse check applied before the target account is even fetched.
pub fn can_modify_user(actor: &Actor) -> AppResult<()> {
    if actor.user.is_superuser
        || actor.permissions.contains_any(&[
            Capability::UserCanModifyAsStranger,
            Capability::UserCanModifyAsOwner,
            Capability::UserCanModifyStaffAsStranger,
            Capability::UserCanModifyStaffAsOwner,
        ])
    {
        return Ok(());
    }
    Err(AppError::Forbidden(
        "user cannot be modified, missing permissions".to_owned(),
    ))
}

/// Decides whether the actor may apply the patch to the fetched account.
pub fn can_modify_user_entity(
    actor: &Actor,
    input: &ModifyUserInput,
    entity: &User,
) -> AppResult<()> {
    if actor.user.is_superuser {
        return Ok(());
    }
    if entity.is_superuser {
        return Err(AppError::Forbidden(
            "only superuser can modify another superuser".to_owned(),
        ));
    }
    if input.is_superuser.unwrap_or(false) {
        return Err(AppError::Forbidden(
            "only superuser can promote another user to become superuser".to_owned(),
        ));
    }
    if entity.is_staff {
        if is_owned_by(entity, actor) {
            if !actor.permissions.contains_any(&[
                Capability::UserCanModifyStaffAsStranger,
                Capability::UserCanModifyStaffAsOwner,
            ]) {
                return Err(AppError::Forbidden(
                    "staff user cannot be modified as an owner, missing permission".to_owned(),
                ));
            }
            return Ok(());
        }
        if !actor
            .permissions
            .contains_any(&[Capability::UserCanModifyStaffAsStranger])
        {
            return Err(AppError::Forbidden(
                "staff user cannot be modified as a stranger, missing permission".to_owned(),
            ));
        }
        return Ok(());
    }
    if input.is_staff.unwrap_or(false)
        && !actor
            .permissions
            .contains_any(&[Capability::UserCanCreateStaff])
    {
        return Err(AppError::Forbidden(
            "regular user cannot be promoted to staff, missing permission".to_owned(),
        ));
    }
    if is_owned_by(entity, actor) {
        if !actor.permissions.contains_any(&[
            Capability::UserCanModifyAsStranger,
            Capability::UserCanModifyAsOwner,
        ]) {
            return Err(AppError::Forbidden(
                "user cannot be modified as an owner, missing permission".to_owned(),
            ));
        }
        return Ok(());
    }
    if !actor
        .permissions
        .contains_any(&[Capability::UserCanModifyAsStranger])
    {
        return Err(AppError::Forbidden(
            "user cannot be modified as a stranger, missing permission".to_owned(),
        ));
    }
    Ok(())
}

/// Decides whether the actor may delete the account.
///
/// Self-deletion is rejected before anything else, so even superusers
/// cannot remove their own account.
pub fn can_delete_user(actor: &Actor, entity: &User) -> AppResult<()> {
    if actor.user.id == entity.id {
        return Err(AppError::Forbidden(
            "user is not permitted to remove himself".to_owned(),
        ));
    }
    if actor.user.is_superuser {
        return Ok(());
    }
    if entity.is_superuser {
        return Err(AppError::Forbidden(
            "only superuser can remove other superuser".to_owned(),
        ));
    }
    if entity.is_staff {
        if is_owned_by(entity, actor) {
            if !actor
                .permissions
                .contains_any(&[Capability::UserCanDeleteStaffAsOwner])
            {
                return Err(AppError::Forbidden(
                    "staff user cannot be removed by owner, missing permission".to_owned(),
                ));
            }
            return Ok(());
        }
        if !actor
            .permissions
            .contains_any(&[Capability::UserCanDeleteStaffAsStranger])
        {
            return Err(AppError::Forbidden(
                "staff user cannot be removed by stranger, missing permission".to_owned(),
            ));
        }
        return Ok(());
    }
    if is_owned_by(entity, actor) {
        if !actor
            .permissions
            .contains_any(&[Capability::UserCanDeleteAsOwner])
        {
            return Err(AppError::Forbidden(
                "user cannot be removed by owner, missing permission".to_owned(),
            ));
        }
        return Ok(());
    }
    if !actor
        .permissions
        .contains_any(&[Capability::UserCanDeleteAsStranger])
    {
        return Err(AppError::Forbidden(
            "user cannot be removed by stranger, missing permission".to_owned(),
        ));
    }
    Ok(())
}

/// Decides whether the actor may run the listing described by the filter.
pub fn can_list_users(actor: &Actor, filter: &UserFilter) -> AppResult<()> {
    if actor.user.is_superuser {
        return Ok(());
    }
    if filter.is_superuser.unwrap_or(false) {
        return Err(AppError::Forbidden(
            "only superuser is permitted to retrieve other superusers".to_owned(),
        ));
    }
    let Some(created_by) = filter.created_by else {
        if !actor
            .permissions
            .contains_any(&[Capability::UserCanRetrieveAsStranger])
        {
            return Err(AppError::Forbidden(
                "list of users cannot be retrieved as a stranger, missing permission".to_owned(),
            ));
        }
        return Ok(());
    };
    if filter.is_staff.unwrap_or(false) {
        if created_by == actor.user.id {
            if !actor
                .permissions
                .contains_any(&[Capability::UserCanRetrieveStaffAsOwner])
            {
                return Err(AppError::Forbidden(
                    "list of staff users cannot be retrieved as an owner, missing permission"
                        .to_owned(),
                ));
            }
            return Ok(());
        }
        if !actor
            .permissions
            .contains_any(&[Capability::UserCanRetrieveStaffAsStranger])
        {
            return Err(AppError::Forbidden(
                "list of staff users cannot be retrieved as a stranger, missing permission"
                    .to_owned(),
            ));
        }
        return Ok(());
    }
    if created_by == actor.user.id
        && !actor.permissions.contains_any(&[
            Capability::UserCanRetrieveAsStranger,
            Capability::UserCanRetrieveAsOwner,
        ])
    {
        return Err(AppError::Forbidden(
            "list of users cannot be retrieved as an owner, missing permission".to_owned(),
        ));
    }
    Ok(())
}

/// Tightens a listing filter to what the actor is entitled to see.
///
/// Non-superusers never see superuser rows, staff rows require the stranger
/// retrieval capability, and owner-scoped actors are pinned to accounts they
/// created.
#[must_use]
pub fn narrow_user_filter(actor: &Actor, mut filter: UserFilter) -> UserFilter {
    if !actor.user.is_superuser {
        filter.is_superuser = Some(false);
    }
    if !actor
        .permissions
        .contains_any(&[Capability::UserCanRetrieveStaffAsStranger])
    {
        filter.is_staff = Some(false);
    }
    if actor.permissions.contains_any(&[
        Capability::UserCanRetrieveAsOwner,
        Capability::UserCanRetrieveStaffAsOwner,
    ]) {
        filter.created_by = Some(actor.user.id);
    }
    filter
}

// ---------------------------------------------------------------------------
// Associations
// ---------------------------------------------------------------------------

/// Requires both sides of the user-group reconciliation capability pair.
pub fn can_set_user_groups(actor: &Actor) -> AppResult<()> {
    if actor.user.is_superuser {
        return Ok(());
    }
    if actor
        .permissions
        .contains_any(&[Capability::UserGroupCanCreate])
        && actor
            .permissions
            .contains_any(&[Capability::UserGroupCanDelete])
    {
        return Ok(());
    }
    Err(AppError::Forbidden(
        "user groups cannot be set, missing permission".to_owned(),
    ))
}

/// Requires both sides of the user-permission reconciliation capability pair.
pub fn can_set_user_permissions(actor: &Actor) -> AppResult<()> {
    if actor.user.is_superuser {
        return Ok(());
    }
    if actor
        .permissions
        .contains_any(&[Capability::UserPermissionCanCreate])
        && actor
            .permissions
            .contains_any(&[Capability::UserPermissionCanDelete])
    {
        return Ok(());
    }
    Err(AppError::Forbidden(
        "user permissions cannot be set, missing permission".to_owned(),
    ))
}

/// Requires both sides of the group-permission reconciliation capability pair.
pub fn can_set_group_permissions(actor: &Actor) -> AppResult<()> {
    if actor.user.is_superuser {
        return Ok(());
    }
    if actor
        .permissions
        .contains_any(&[Capability::GroupPermissionCanCreate])
        && actor
            .permissions
            .contains_any(&[Capability::GroupPermissionCanDelete])
    {
        return Ok(());
    }
    Err(AppError::Forbidden(
        "group permissions cannot be set, missing permission".to_owned(),
    ))
}

/// Allows users to inspect their own group memberships without a capability.
pub fn can_list_user_groups(actor: &Actor, user_id: UserId) -> AppResult<()> {
    if actor.user.is_superuser || actor.user.id == user_id {
        return Ok(());
    }
    if actor
        .permissions
        .contains_any(&[Capability::UserGroupCanRetrieve])
    {
        return Ok(());
    }
    Err(AppError::Forbidden(
        "list of user groups cannot be retrieved, missing permission".to_owned(),
    ))
}

/// Allows users to inspect their own permissions without a capability.
pub fn can_list_user_permissions(actor: &Actor, user_id: UserId) -> AppResult<()> {
    if actor.user.is_superuser || actor.user.id == user_id {
        return Ok(());
    }
    if actor
        .permissions
        .contains_any(&[Capability::UserPermissionCanRetrieve])
    {
        return Ok(());
    }
    Err(AppError::Forbidden(
        "list of user permissions cannot be retrieved, missing permission".to_owned(),
    ))
}

/// Allows users to check their own grants without a capability.
pub fn can_check_granting(actor: &Actor, user_id: UserId) -> AppResult<()> {
    if actor.user.id == user_id || actor.user.is_superuser {
        return Ok(());
    }
    if actor
        .permissions
        .contains_any(&[Capability::UserPermissionCanCheckGrantingAsStranger])
    {
        return Ok(());
    }
    Err(AppError::Forbidden(
        "permission granting cannot be checked, missing permission".to_owned(),
    ))
}

/// Allows users to check their own memberships without a capability.
pub fn can_check_belonging(actor: &Actor, user_id: UserId) -> AppResult<()> {
    if actor.user.id == user_id || actor.user.is_superuser {
        return Ok(());
    }
    if actor
        .permissions
        .contains_any(&[Capability::UserGroupCanCheckBelongingAsStranger])
    {
        return Ok(());
    }
    Err(AppError::Forbidden(
        "group belonging cannot be checked, missing permission".to_owned(),
    ))
}

// ---------------------------------------------------------------------------
// Groups and permissions
// ---------------------------------------------------------------------------

/// Decides whether the actor may create a group.
pub fn can_create_group(actor: &Actor) -> AppResult<()> {
    allow_with(
        actor,
        Capability::GroupCanCreate,
        "group cannot be created, missing permission",
    )
}

/// Decides whether the actor may retrieve a group.
pub fn can_retrieve_group(actor: &Actor) -> AppResult<()> {
    allow_with(
        actor,
        Capability::GroupCanRetrieve,
        "group cannot be retrieved, missing permission",
    )
}

/// Decides whether the actor may modify a group.
pub fn can_modify_group(actor: &Actor) -> AppResult<()> {
    allow_with(
        actor,
        Capability::GroupCanModify,
        "group cannot be modified, missing permission",
    )
}

/// Decides whether the actor may delete a group.
pub fn can_delete_group(actor: &Actor) -> AppResult<()> {
    allow_with(
        actor,
        Capability::GroupCanDelete,
        "group cannot be removed, missing permission",
    )
}

/// Decides whether the actor may list groups.
pub fn can_list_groups(actor: &Actor) -> AppResult<()> {
    allow_with(
        actor,
        Capability::GroupCanRetrieve,
        "list of groups cannot be retrieved, missing permission",
    )
}

/// Decides whether the actor may list the permissions granted to a group.
pub fn can_list_group_permissions(actor: &Actor) -> AppResult<()> {
    allow_with(
        actor,
        Capability::GroupPermissionCanRetrieve,
        "list of group permissions cannot be retrieved, missing permission",
    )
}

/// Decides whether the actor may retrieve a catalog permission.
pub fn can_retrieve_permission(actor: &Actor) -> AppResult<()> {
    allow_with(
        actor,
        Capability::PermissionCanRetrieve,
        "permission cannot be retrieved, missing permission",
    )
}

/// Decides whether the actor may list the permission catalog.
pub fn can_list_permissions(actor: &Actor) -> AppResult<()> {
    allow_with(
        actor,
        Capability::PermissionCanRetrieve,
        "list of permissions cannot be retrieved, missing permission",
    )
}
