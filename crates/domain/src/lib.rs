//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod capability;
mod group;
mod permission;
mod user;

pub use capability::Capability;
pub use group::{GROUP_NAME_MIN_LENGTH, GroupId, validate_group_name};
pub use permission::{Permission, PermissionId, Permissions};
pub use user::{
    PASSWORD_MIN_LENGTH, USERNAME_MIN_LENGTH, UserId, validate_plain_password, validate_username,
};
