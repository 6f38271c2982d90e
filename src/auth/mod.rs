//! Identity surface consumed by the workflow engines.
//!
//! Token issuance, credential storage, and session handling live in the
//! identity provider outside this crate; the engines only ever see an
//! already-authenticated user id plus its resolved role set, and re-validate
//! both against the transition policy before mutating anything.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod policy;

/// Closed set of roles recognized by the workflow engines.
///
/// Transitions are gated on these variants through the policy table in
/// [`policy`]; an unknown role string from the identity provider fails to
/// parse instead of silently matching nothing.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
pub enum Role {
    Salesman,
    SalesSupport,
    Manager,
    SuperAdmin,
    Admin,
    Engineer,
    SparePartsCoordinator,
    MaintenanceManager,
    Customer,
    WarehouseKeeper,
    InventoryManager,
}

/// An authenticated user as seen by the workflow engines: an id and the
/// roles the identity provider resolved for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub roles: HashSet<Role>,
}

impl AuthenticatedUser {
    pub fn new(user_id: Uuid, roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            user_id,
            roles: roles.into_iter().collect(),
        }
    }

    /// Convenience constructor for the common single-role case.
    pub fn with_role(user_id: Uuid, role: Role) -> Self {
        Self::new(user_id, [role])
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        roles.iter().any(|role| self.roles.contains(role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn role_round_trips_through_strings() {
        assert_eq!(Role::from_str("SuperAdmin").unwrap(), Role::SuperAdmin);
        assert_eq!(Role::SparePartsCoordinator.to_string(), "SparePartsCoordinator");
        assert!(Role::from_str("Wizard").is_err());
    }

    #[test]
    fn role_membership_checks() {
        let user = AuthenticatedUser::new(Uuid::new_v4(), [Role::Salesman, Role::Manager]);
        assert!(user.has_role(Role::Manager));
        assert!(!user.has_role(Role::SuperAdmin));
        assert!(user.has_any_role(&[Role::SuperAdmin, Role::Salesman]));
        assert!(!user.has_any_role(&[Role::Engineer]));
    }
}
