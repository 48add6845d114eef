// models/src/medical/facility.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::{ValidationError, ValidationResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacilityType {
    Hospital,
    Pharmacy,
}

impl FacilityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FacilityType::Hospital => "hospital",
            FacilityType::Pharmacy => "pharmacy",
        }
    }
}

impl fmt::Display for FacilityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FacilityType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hospital" => Ok(FacilityType::Hospital),
            "pharmacy" => Ok(FacilityType::Pharmacy),
            _ => Err(ValidationError::InvalidFacilityType(s.to_string())),
        }
    }
}

/// A hospital or pharmacy tenant. Owns exactly one facility admin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Facility {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub facility_type: FacilityType,
    pub location: String,
    pub admin_user: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Facility {
    pub fn new(id: Uuid, name: &str, facility_type: FacilityType, location: &str, admin_user: Uuid) -> Self {
        let now = Utc::now();
        Facility {
            id,
            name: name.trim().to_string(),
            facility_type,
            location: location.trim().to_string(),
            admin_user,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_hospital(&self) -> bool {
        self.facility_type == FacilityType::Hospital
    }
}

/// Facility registration payload as accepted from the admin console.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFacility {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub facility_type: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub admin: Option<NewFacilityAdmin>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NewFacilityAdmin {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl NewFacility {
    /// Returns the parsed facility type and the admin block once every
    /// required field is present.
    pub fn validate(&self) -> ValidationResult<(FacilityType, &NewFacilityAdmin)> {
        let admin = self.admin.as_ref().filter(|a| {
            !a.username.trim().is_empty() && !a.email.trim().is_empty() && !a.password.is_empty()
        });
        let admin = match admin {
            Some(admin) if !self.name.trim().is_empty() && !self.facility_type.trim().is_empty() => admin,
            _ => return Err(ValidationError::MissingFields("Facility and admin info are required".to_string())),
        };
        if self.location.trim().is_empty() {
            return Err(ValidationError::MissingField("location"));
        }
        let facility_type = self.facility_type.parse::<FacilityType>()?;
        Ok((facility_type, admin))
    }
}

/// A facility as listed on the admin dashboard: the record plus its admin's
/// contact details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilitySummary {
    #[serde(flatten)]
    pub facility: Facility,
    pub admin_username: Option<String>,
    pub admin_email: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration() -> NewFacility {
        NewFacility {
            name: "St. Mary".to_string(),
            facility_type: "Hospital".to_string(),
            location: "Lagos".to_string(),
            admin: Some(NewFacilityAdmin {
                username: "mary_admin".to_string(),
                email: "admin@stmary.org".to_string(),
                password: "s3cret".to_string(),
            }),
        }
    }

    #[test]
    fn should_accept_complete_registration() {
        let reg = registration();
        let (kind, admin) = reg.validate().unwrap();
        assert_eq!(kind, FacilityType::Hospital);
        assert_eq!(admin.username, "mary_admin");
    }

    #[test]
    fn should_require_admin_block() {
        let mut reg = registration();
        reg.admin = None;
        assert_eq!(
            reg.validate().unwrap_err(),
            ValidationError::MissingFields("Facility and admin info are required".to_string())
        );
    }

    #[test]
    fn should_reject_unknown_type() {
        let mut reg = registration();
        reg.facility_type = "clinic".to_string();
        assert!(matches!(reg.validate(), Err(ValidationError::InvalidFacilityType(_))));
    }

    #[test]
    fn should_serialize_type_field() {
        let facility = Facility::new(Uuid::new_v4(), "Green Cross", FacilityType::Pharmacy, "Abuja", Uuid::new_v4());
        let json = serde_json::to_value(&facility).unwrap();
        assert_eq!(json["type"], "pharmacy");
        assert!(json.get("adminUser").is_some());
    }
}
