#![forbid(unsafe_code)]

use crate::model::Role;
use std::collections::BTreeSet;

/// Per-call capability token. Not persisted; derived by the caller from
/// upstream authentication and used to authorize exactly one operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserContext {
    user_id: String,
    name: String,
    roles: BTreeSet<Role>,
}

impl UserContext {
    pub fn new(
        user_id: impl Into<String>,
        name: impl Into<String>,
        roles: impl IntoIterator<Item = Role>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            name: name.into(),
            roles: roles.into_iter().collect(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn roles(&self) -> &BTreeSet<Role> {
        &self.roles
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        roles.iter().any(|role| self.roles.contains(role))
    }

    pub fn require_role(&self, role: Role) -> Result<(), PermissionError> {
        self.require_any(&[role])
    }

    /// Pure set-intersection check: at least one of `required` must be held.
    pub fn require_any(&self, required: &[Role]) -> Result<(), PermissionError> {
        if self.has_any_role(required) {
            return Ok(());
        }
        Err(PermissionError {
            user_id: self.user_id.clone(),
            required: required.to_vec(),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PermissionError {
    pub user_id: String,
    pub required: Vec<Role>,
}

impl std::fmt::Display for PermissionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let required = self
            .required
            .iter()
            .map(|role| role.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        write!(
            f,
            "user {} requires one of: {required}",
            self.user_id
        )
    }
}

impl std::error::Error for PermissionError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyst() -> UserContext {
        UserContext::new("u_analyst", "Ana List", [Role::Analyst, Role::Viewer])
    }

    #[test]
    fn roles_are_additive() {
        let user = analyst();
        assert!(user.has_role(Role::Analyst));
        assert!(user.has_role(Role::Viewer));
        assert!(!user.has_role(Role::Admin));
    }

    #[test]
    fn require_any_matches_at_least_one() {
        let user = analyst();
        user.require_any(&[Role::Analyst, Role::Operator, Role::Admin])
            .expect("analyst satisfies write set");

        let err = user
            .require_any(&[Role::Admin])
            .expect_err("analyst is not admin");
        assert_eq!(err.user_id, "u_analyst");
        assert_eq!(err.required, vec![Role::Admin]);
    }

    #[test]
    fn empty_role_set_fails_everything() {
        let user = UserContext::new("u_none", "Nobody", []);
        assert!(user.require_any(&[Role::Viewer]).is_err());
    }

    #[test]
    fn permission_error_names_required_roles() {
        let err = PermissionError {
            user_id: "u1".to_string(),
            required: vec![Role::Analyst, Role::Admin],
        };
        assert_eq!(err.to_string(), "user u1 requires one of: analyst, admin");
    }
}
