//! Claims of the user signed in through the authentication service.

use serde::{Deserialize, Serialize};

/// JWT claims carried by the identity cookie.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// Subject identifier issued by the authentication service.
    pub sub: String,
    pub email: String,
    pub name: String,
    pub roles: Vec<String>,
    /// Expiration as a unix timestamp.
    pub exp: usize,
}

impl AuthenticatedUser {
    pub fn has_role(&self, role: &str) -> bool {
        check_role(role, &self.roles)
    }
}

/// Returns `true` when `role` is listed in `roles`.
pub fn check_role(role: &str, roles: &[String]) -> bool {
    roles.iter().any(|r| r == role)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_are_matched_exactly() {
        let user = AuthenticatedUser {
            roles: vec!["crm".into()],
            ..Default::default()
        };
        assert!(user.has_role("crm"));
        assert!(!user.has_role("crm_admin"));
    }
}
