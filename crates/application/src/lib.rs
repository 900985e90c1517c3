//! Application services and ports for the Gateward authorization daemon.

#![forbid(unsafe_code)]

mod actor_resolver;
mod auth_service;
mod firewall;
mod group_service;
mod permission_service;
mod reconciliation;
mod user_service;

pub use actor_resolver::{Actor, ActorResolver};
pub use auth_service::{AuthService, CallContext, PasswordHasher, SessionRecord, SessionStore};
pub use firewall::{
    can_check_belonging, can_check_granting, can_create_group, can_create_user, can_delete_group,
    can_delete_user, can_list_group_permissions, can_list_groups, can_list_permissions,
    can_list_user_groups, can_list_user_permissions, can_list_users, can_modify_group,
    can_modify_user, can_modify_user_entity, can_retrieve_group, can_retrieve_permission,
    can_retrieve_user, can_set_group_permissions, can_set_user_groups, can_set_user_permissions,
    narrow_user_filter,
};
pub use group_service::{
    CreateGroupInput, Group, GroupPatch, GroupPermissionRepository, GroupRepository, GroupService,
    ModifyGroupInput, NewGroup,
};
pub use permission_service::{
    PermissionFilter, PermissionRecord, PermissionRegistry, PermissionRepository,
    PermissionService,
};
pub use reconciliation::{RegistryDiff, SetOutcome, SyncSummary, untouched};
pub use user_service::{
    CreateUserInput, ModifyUserInput, NewUser, User, UserFilter, UserGroupRepository, UserPatch,
    UserPermissionRepository, UserRepository, UserService,
};
