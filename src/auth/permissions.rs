use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    DocumentsRead,
    DocumentsWrite,
    DocumentsArchive,
    RoutesStart,
    RoutesOverride,
    TemplatesManage,
    RegistrationManage,
    DirectoryManage,
}

impl Permission {
    pub fn as_str(self) -> &'static str {
        match self {
            Permission::DocumentsRead => "documents_read",
            Permission::DocumentsWrite => "documents_write",
            Permission::DocumentsArchive => "documents_archive",
            Permission::RoutesStart => "routes_start",
            Permission::RoutesOverride => "routes_override",
            Permission::TemplatesManage => "templates_manage",
            Permission::RegistrationManage => "registration_manage",
            Permission::DirectoryManage => "directory_manage",
        }
    }
}

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_CLERK: &str = "clerk";
pub const ROLE_USER: &str = "user";
pub const SYSTEM_ROLES: &[&str] = &[ROLE_ADMIN, ROLE_CLERK, ROLE_USER];

const ADMIN_PERMISSIONS: &[Permission] = &[
    Permission::DocumentsRead,
    Permission::DocumentsWrite,
    Permission::DocumentsArchive,
    Permission::RoutesStart,
    Permission::RoutesOverride,
    Permission::TemplatesManage,
    Permission::RegistrationManage,
    Permission::DirectoryManage,
];

const CLERK_PERMISSIONS: &[Permission] = &[
    Permission::DocumentsRead,
    Permission::DocumentsWrite,
    Permission::DocumentsArchive,
    Permission::RoutesStart,
    Permission::RegistrationManage,
];

const USER_PERMISSIONS: &[Permission] = &[
    Permission::DocumentsRead,
    Permission::DocumentsWrite,
    Permission::RoutesStart,
];

/// Permission set granted to a system role. Unknown roles get nothing.
pub fn permissions_for_role(role: &str) -> &'static [Permission] {
    match role {
        ROLE_ADMIN => ADMIN_PERMISSIONS,
        ROLE_CLERK => CLERK_PERMISSIONS,
        ROLE_USER => USER_PERMISSIONS,
        _ => &[],
    }
}

pub fn authorize(actor_permissions: &[Permission], required: Permission) -> bool {
    actor_permissions.contains(&required)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_holds_every_permission() {
        for permission in ADMIN_PERMISSIONS {
            assert!(authorize(permissions_for_role(ROLE_ADMIN), *permission));
        }
    }

    #[test]
    fn plain_users_cannot_override_or_register() {
        let perms = permissions_for_role(ROLE_USER);
        assert!(authorize(perms, Permission::RoutesStart));
        assert!(!authorize(perms, Permission::RoutesOverride));
        assert!(!authorize(perms, Permission::RegistrationManage));
    }

    #[test]
    fn unknown_role_is_denied() {
        assert!(!authorize(
            permissions_for_role("guest"),
            Permission::DocumentsRead
        ));
    }
}
