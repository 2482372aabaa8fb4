//! API-side authorization guard for commands.
//!
//! Enforces authorization at the command boundary (before dispatch),
//! keeping domain aggregates and infra auth-agnostic.

use merchstore_auth::{AuthzError, CommandAuthorization, Permission, Principal, authorize};

use crate::context::PrincipalContext;

/// Check authorization for a command in the current request context.
///
/// Intended to be called **before** dispatching a command.
pub fn authorize_command<C: CommandAuthorization>(
    principal: &PrincipalContext,
    command: &C,
) -> Result<(), AuthzError> {
    let principal = Principal {
        principal_id: principal.principal_id(),
        roles: principal.roles().to_vec(),
        permissions: permissions_from_roles(principal.roles()),
    };

    for perm in command.required_permissions() {
        authorize(&principal, perm)?;
    }

    Ok(())
}

/// Role→permission mapping.
///
/// Convention: "admin" grants all permissions. The store has exactly one
/// privileged role today; a finer policy source can replace this.
fn permissions_from_roles(roles: &[merchstore_auth::Role]) -> Vec<Permission> {
    if roles.iter().any(|r| r.as_str() == "admin") {
        return vec![Permission::new("*")];
    }

    Vec::new()
}

#[cfg(test)]
mod tests {
    use merchstore_auth::{PrincipalId, Role};

    use super::*;
    use crate::app::routes::common::CmdAuth;

    #[test]
    fn admin_role_passes_any_required_permission() {
        let principal = PrincipalContext::new(PrincipalId::new(), vec![Role::ADMIN]);
        let cmd = CmdAuth {
            inner: (),
            required: vec![Permission::new("catalog.manage")],
        };
        assert!(authorize_command(&principal, &cmd).is_ok());
    }

    #[test]
    fn unknown_role_is_forbidden() {
        let principal = PrincipalContext::new(PrincipalId::new(), vec![Role::new("viewer")]);
        let cmd = CmdAuth {
            inner: (),
            required: vec![Permission::new("catalog.manage")],
        };
        assert!(authorize_command(&principal, &cmd).is_err());
    }
}
