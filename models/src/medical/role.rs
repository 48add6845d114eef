// models/src/medical/role.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::ValidationError;

/// The four account kinds of the portal. There is no hierarchy between them:
/// what a role may do is decided solely by the policy table in `security`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Admin,
    FacilityAdmin,
    Provider,
    Pharmacy,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::FacilityAdmin, Role::Provider, Role::Pharmacy];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::FacilityAdmin => "facilityAdmin",
            Role::Provider => "provider",
            Role::Pharmacy => "pharmacy",
        }
    }

    /// Every role except the global admin belongs to exactly one facility.
    pub fn requires_facility(&self) -> bool {
        !matches!(self, Role::Admin)
    }

    /// Roles a facility admin may hand out when registering staff.
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Provider | Role::Pharmacy)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::InvalidRole(s.to_string()))
    }
}
