use serde::{Deserialize, Serialize};

use crate::permission::Permission;

/// Capabilities the service enforces over its own resources.
///
/// Every variant renders to a permission triple under the `gateward`
/// subsystem. The registry seeds these rows at startup; the firewall matches
/// actors against them by exact string identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Allows creating plain user accounts.
    UserCanCreate,
    /// Allows creating staff user accounts.
    UserCanCreateStaff,
    /// Allows deleting user accounts created by someone else.
    UserCanDeleteAsStranger,
    /// Allows deleting user accounts the actor created.
    UserCanDeleteAsOwner,
    /// Allows deleting staff accounts created by someone else.
    UserCanDeleteStaffAsStranger,
    /// Allows deleting staff accounts the actor created.
    UserCanDeleteStaffAsOwner,
    /// Allows modifying user accounts created by someone else.
    UserCanModifyAsStranger,
    /// Allows modifying user accounts the actor created.
    UserCanModifyAsOwner,
    /// Allows modifying staff accounts created by someone else.
    UserCanModifyStaffAsStranger,
    /// Allows modifying staff accounts the actor created.
    UserCanModifyStaffAsOwner,
    /// Allows retrieving user accounts the actor created.
    UserCanRetrieveAsOwner,
    /// Allows retrieving user accounts created by someone else.
    UserCanRetrieveAsStranger,
    /// Allows retrieving staff accounts the actor created.
    UserCanRetrieveStaffAsOwner,
    /// Allows retrieving staff accounts created by someone else.
    UserCanRetrieveStaffAsStranger,
    /// Allows granting permissions to users.
    UserPermissionCanCreate,
    /// Allows revoking permissions from users.
    UserPermissionCanDelete,
    /// Allows replacing the permissions granted to a user.
    UserPermissionCanModify,
    /// Allows listing the permissions granted to a user.
    UserPermissionCanRetrieve,
    /// Allows checking whether another user holds a permission.
    UserPermissionCanCheckGrantingAsStranger,
    /// Allows adding users to groups.
    UserGroupCanCreate,
    /// Allows removing users from groups.
    UserGroupCanDelete,
    /// Allows replacing the groups a user belongs to.
    UserGroupCanModify,
    /// Allows listing the groups a user belongs to.
    UserGroupCanRetrieve,
    /// Allows checking whether another user belongs to a group.
    UserGroupCanCheckBelongingAsStranger,
    /// Allows registering permission rows.
    PermissionCanCreate,
    /// Allows removing permission rows.
    PermissionCanDelete,
    /// Allows modifying permission rows.
    PermissionCanModify,
    /// Allows retrieving permission rows.
    PermissionCanRetrieve,
    /// Allows creating groups.
    GroupCanCreate,
    /// Allows deleting groups.
    GroupCanDelete,
    /// Allows modifying groups.
    GroupCanModify,
    /// Allows retrieving groups.
    GroupCanRetrieve,
    /// Allows granting permissions to groups.
    GroupPermissionCanCreate,
    /// Allows revoking permissions from groups.
    GroupPermissionCanDelete,
    /// Allows replacing the permissions granted to a group.
    GroupPermissionCanModify,
    /// Allows listing the permissions granted to a group.
    GroupPermissionCanRetrieve,
}

impl Capability {
    /// Returns the stable rendered triple for this capability.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserCanCreate => "gateward:user:can create",
            Self::UserCanCreateStaff => "gateward:user:can create staff",
            Self::UserCanDeleteAsStranger => "gateward:user:can delete as stranger",
            Self::UserCanDeleteAsOwner => "gateward:user:can delete as owner",
            Self::UserCanDeleteStaffAsStranger => "gateward:user:can delete staff as stranger",
            Self::UserCanDeleteStaffAsOwner => "gateward:user:can delete staff as owner",
            Self::UserCanModifyAsStranger => "gateward:user:can modify as stranger",
            Self::UserCanModifyAsOwner => "gateward:user:can modify as owner",
            Self::UserCanModifyStaffAsStranger => "gateward:user:can modify staff as stranger",
            Self::UserCanModifyStaffAsOwner => "gateward:user:can modify staff as owner",
            Self::UserCanRetrieveAsOwner => "gateward:user:can retrieve as owner",
            Self::UserCanRetrieveAsStranger => "gateward:user:can retrieve as stranger",
            Self::UserCanRetrieveStaffAsOwner => "gateward:user:can retrieve staff as owner",
            Self::UserCanRetrieveStaffAsStranger => "gateward:user:can retrieve staff as stranger",
            Self::UserPermissionCanCreate => "gateward:user_permission:can create",
            Self::UserPermissionCanDelete => "gateward:user_permission:can delete",
            Self::UserPermissionCanModify => "gateward:user_permission:can modify",
            Self::UserPermissionCanRetrieve => "gateward:user_permission:can retrieve",
            Self::UserPermissionCanCheckGrantingAsStranger => {
                "gateward:user_permission:can check granting as a stranger"
            }
            Self::UserGroupCanCreate => "gateward:user_group:can create",
            Self::UserGroupCanDelete => "gateward:user_group:can delete",
            Self::UserGroupCanModify => "gateward:user_group:can modify",
            Self::UserGroupCanRetrieve => "gateward:user_group:can retrieve",
            Self::UserGroupCanCheckBelongingAsStranger => {
                "gateward:user_group:can check belonging as a stranger"
            }
            Self::PermissionCanCreate => "gateward:permission:can create",
            Self::PermissionCanDelete => "gateward:permission:can delete",
            Self::PermissionCanModify => "gateward:permission:can modify",
            Self::PermissionCanRetrieve => "gateward:permission:can retrieve",
            Self::GroupCanCreate => "gateward:group:can create",
            Self::GroupCanDelete => "gateward:group:can delete",
            Self::GroupCanModify => "gateward:group:can modify",
            Self::GroupCanRetrieve => "gateward:group:can retrieve",
            Self::GroupPermissionCanCreate => "gateward:group_permission:can create",
            Self::GroupPermissionCanDelete => "gateward:group_permission:can delete",
            Self::GroupPermissionCanModify => "gateward:group_permission:can modify",
            Self::GroupPermissionCanRetrieve => "gateward:group_permission:can retrieve",
        }
    }

    /// Returns the capability as an owned permission value.
    #[must_use]
    pub fn permission(&self) -> Permission {
        Permission::new(self.as_str())
    }

    /// Returns every capability the service declares.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[Capability] = &[
            Capability::UserCanCreate,
            Capability::UserCanCreateStaff,
            Capability::UserCanDeleteAsStranger,
            Capability::UserCanDeleteAsOwner,
            Capability::UserCanDeleteStaffAsStranger,
            Capability::UserCanDeleteStaffAsOwner,
            Capability::UserCanModifyAsStranger,
            Capability::UserCanModifyAsOwner,
            Capability::UserCanModifyStaffAsStranger,
            Capability::UserCanModifyStaffAsOwner,
            Capability::UserCanRetrieveAsOwner,
            Capability::UserCanRetrieveAsStranger,
            Capability::UserCanRetrieveStaffAsOwner,
            Capability::UserCanRetrieveStaffAsStranger,
            Capability::UserPermissionCanCreate,
            Capability::UserPermissionCanDelete,
            Capability::UserPermissionCanModify,
            Capability::UserPermissionCanRetrieve,
            Capability::UserPermissionCanCheckGrantingAsStranger,
            Capability::UserGroupCanCreate,
            Capability::UserGroupCanDelete,
            Capability::UserGroupCanModify,
            Capability::UserGroupCanRetrieve,
            Capability::UserGroupCanCheckBelongingAsStranger,
            Capability::PermissionCanCreate,
            Capability::PermissionCanDelete,
            Capability::PermissionCanModify,
            Capability::PermissionCanRetrieve,
            Capability::GroupCanCreate,
            Capability::GroupCanDelete,
            Capability::GroupCanModify,
            Capability::GroupCanRetrieve,
            Capability::GroupPermissionCanCreate,
            Capability::GroupPermissionCanDelete,
            Capability::GroupPermissionCanModify,
            Capability::GroupPermissionCanRetrieve,
        ];

        ALL
    }
}

impl AsRef<str> for Capability {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::Capability;

    #[test]
    fn every_capability_lives_under_the_service_subsystem() {
        for capability in Capability::all() {
            assert_eq!(capability.permission().subsystem(), "gateward");
        }
    }

    #[test]
    fn rendered_triples_are_unique() {
        let mut seen = HashSet::new();
        for capability in Capability::all() {
            assert!(seen.insert(capability.as_str()), "duplicate {capability:?}");
        }
    }

    #[test]
    fn catalog_covers_every_declared_capability() {
        assert_eq!(Capability::all().len(), 36);
    }
}
