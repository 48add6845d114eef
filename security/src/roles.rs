// security/src/roles.rs
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use models::medical::Role;

use crate::{AuthError, Claims};

/// Every guarded operation of the API. Each route names exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Permission {
    RegisterFacility,
    ListFacilities,
    DeleteFacility,
    ListUsers,
    ViewFacility,
    ListStaff,
    RegisterStaff,
    DeleteStaff,
    RegisterPatient,
    SearchPatients,
    ViewPatient,
    UpdatePatient,
    DispenseMedication,
}

impl Permission {
    pub const ALL: [Permission; 13] = [
        Permission::RegisterFacility,
        Permission::ListFacilities,
        Permission::DeleteFacility,
        Permission::ListUsers,
        Permission::ViewFacility,
        Permission::ListStaff,
        Permission::RegisterStaff,
        Permission::DeleteStaff,
        Permission::RegisterPatient,
        Permission::SearchPatients,
        Permission::ViewPatient,
        Permission::UpdatePatient,
        Permission::DispenseMedication,
    ];
}

/// The single role-to-permission table consulted by every route.
///
/// Roles are flat: holding one permission implies nothing about another,
/// and the global admin gets only what is listed for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolesConfig {
    permissions: HashMap<Permission, BTreeSet<Role>>,
}

impl Default for RolesConfig {
    fn default() -> Self {
        use Permission::*;
        use Role::*;

        let table: [(Permission, &[Role]); 13] = [
            (RegisterFacility, &[Admin]),
            (ListFacilities, &[Admin]),
            (DeleteFacility, &[Admin]),
            (ListUsers, &[Admin]),
            (ViewFacility, &[FacilityAdmin, Admin]),
            (ListStaff, &[FacilityAdmin, Admin]),
            (RegisterStaff, &[FacilityAdmin]),
            (DeleteStaff, &[FacilityAdmin]),
            (RegisterPatient, &[FacilityAdmin]),
            (SearchPatients, &[Provider, Pharmacy, FacilityAdmin]),
            (ViewPatient, &[Provider, Pharmacy, FacilityAdmin]),
            (UpdatePatient, &[Provider]),
            (DispenseMedication, &[Pharmacy]),
        ];

        RolesConfig {
            permissions: table
                .into_iter()
                .map(|(permission, roles)| (permission, roles.iter().copied().collect()))
                .collect(),
        }
    }
}

impl RolesConfig {
    /// Loads a table from YAML. Permissions missing from the file are granted
    /// to nobody.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read roles file {}", path.display()))?;
        Self::from_yaml_str(&content).with_context(|| format!("Failed to parse roles file {}", path.display()))
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: RolesConfig = serde_yaml::from_str(content)?;
        Ok(config)
    }

    pub fn roles_for(&self, permission: Permission) -> impl Iterator<Item = Role> + '_ {
        self.permissions.get(&permission).into_iter().flat_map(|roles| roles.iter().copied())
    }

    pub fn has_permission(&self, role: Role, permission: Permission) -> bool {
        self.permissions
            .get(&permission)
            .map_or(false, |roles| roles.contains(&role))
    }

    /// Fails with `Forbidden` when the caller's role does not hold `permission`.
    pub fn authorize(&self, claims: &Claims, permission: Permission) -> Result<(), AuthError> {
        if self.has_permission(claims.role, permission) {
            Ok(())
        } else {
            tracing::warn!(user = %claims.sub, role = %claims.role, ?permission, "role not permitted");
            Err(AuthError::Forbidden("Insufficient role".to_string()))
        }
    }
}
