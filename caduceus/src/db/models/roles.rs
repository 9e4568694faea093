//! Database models for roles and the fixed application-permission registry.

use crate::types::{PermissionId, RoleId};

/// Database response for a role
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct RoleDBResponse {
    pub id: RoleId,
    pub name: String,
    pub level: i32,
    pub is_default: bool,
}

/// Database response for an application permission
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct AppPermissionDBResponse {
    pub id: PermissionId,
    pub name: String,
}

/// Capability identifiers, created once at system initialization and never
/// mutated per-request.
pub const APP_PERMISSIONS: &[&str] = &[
    "user:create",
    "user:read",
    "user:update",
    "user:delete",
    "user:activate",
    "role:assign",
    "patient:read",
    "patient:write",
    "organization:read",
    "organization:write",
    "codesystem:read",
    "valueset:read",
];

/// A role catalog entry: name, privilege level, default flag, and the
/// permissions the role grants.
#[derive(Debug, Clone, Copy)]
pub struct RoleDef {
    pub name: &'static str,
    pub level: i32,
    pub is_default: bool,
    pub permissions: &'static [&'static str],
}

/// The role catalog seeded at startup. Exactly one entry carries the
/// default flag.
pub const ROLE_CATALOG: &[RoleDef] = &[
    RoleDef {
        name: "User",
        level: 0,
        is_default: true,
        permissions: &[],
    },
    RoleDef {
        name: "Admin",
        level: 10,
        is_default: false,
        permissions: &[
            "user:create",
            "user:read",
            "user:update",
            "user:activate",
            "role:assign",
            "patient:read",
            "patient:write",
            "organization:read",
            "organization:write",
            "codesystem:read",
            "valueset:read",
        ],
    },
    RoleDef {
        name: "Super Admin",
        level: 100,
        is_default: false,
        permissions: APP_PERMISSIONS,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_has_exactly_one_default() {
        let defaults: Vec<_> = ROLE_CATALOG.iter().filter(|r| r.is_default).collect();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].name, "User");
    }

    #[test]
    fn test_catalog_permissions_exist_in_registry() {
        for role in ROLE_CATALOG {
            for permission in role.permissions {
                assert!(
                    APP_PERMISSIONS.contains(permission),
                    "role {} grants unregistered permission {}",
                    role.name,
                    permission
                );
            }
        }
    }
}
