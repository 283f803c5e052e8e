//! Role → permission table
//!
//! Permissions are never stored per account; they are derived from the role
//! every time a check runs.

use serde::Serialize;
use std::fmt;

use crate::data::Role;

/// Named capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Permission {
    ManageUsers,
    ManageScans,
}

impl Permission {
    pub fn name(&self) -> &'static str {
        match self {
            Permission::ManageUsers => "manage-users",
            Permission::ManageScans => "manage-scans",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

const ADMIN_PERMISSIONS: &[Permission] = &[Permission::ManageUsers, Permission::ManageScans];
const CLIENT_PERMISSIONS: &[Permission] = &[];

/// Permissions granted to a role
pub const fn permissions_for(role: Role) -> &'static [Permission] {
    match role {
        Role::Admin => ADMIN_PERMISSIONS,
        Role::Client => CLIENT_PERMISSIONS,
    }
}

pub fn role_has_permission(role: Role, permission: Permission) -> bool {
    permissions_for(role).contains(&permission)
}
