// models/src/medical/user.rs
// Stored users carry only a bcrypt hash; the plaintext lives in `NewUser`
// long enough to be hashed.

use bcrypt::{hash, verify, BcryptError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{ValidationError, ValidationResult};
use crate::medical::Role;

/// bcrypt work factor used for portal accounts.
pub const PASSWORD_HASH_COST: u32 = 10;

// --- DTO for New User Registration ---
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String, // Plaintext password for input
    pub role: Role,
    pub facility_id: Option<Uuid>,
}

impl NewUser {
    /// Checks required fields and the role/facility pairing: the global admin
    /// has no facility, every other role has exactly one.
    pub fn validate(&self) -> ValidationResult<()> {
        if self.username.trim().is_empty() {
            return Err(ValidationError::MissingField("username"));
        }
        if self.email.trim().is_empty() {
            return Err(ValidationError::MissingField("email"));
        }
        if !looks_like_email(&self.email) {
            return Err(ValidationError::InvalidValue(format!("'{}' is not a valid email address", self.email.trim())));
        }
        if self.password.is_empty() {
            return Err(ValidationError::MissingField("password"));
        }
        match (self.role.requires_facility(), self.facility_id.is_some()) {
            (true, false) => Err(ValidationError::InvalidValue(format!("role {} requires a facility", self.role))),
            (false, true) => {
                Err(ValidationError::InvalidValue("the global admin cannot belong to a facility".to_string()))
            }
            _ => Ok(()),
        }
    }
}

// --- DTO for staff registration by a facility admin ---
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NewStaff {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    /// Kept as text so an unknown role reads as a staff-role error rather
    /// than a body parse failure.
    #[serde(default)]
    pub role: String,
}

impl NewStaff {
    /// Staff are providers or pharmacists attached to `facility_id`.
    pub fn into_new_user(self, facility_id: Uuid) -> ValidationResult<NewUser> {
        if [&self.username, &self.email, &self.password, &self.role]
            .iter()
            .any(|field| field.trim().is_empty())
        {
            return Err(ValidationError::MissingFields("Missing required fields".to_string()));
        }
        let role = match self.role.parse::<Role>() {
            Ok(role) if role.is_staff() => role,
            _ => return Err(ValidationError::InvalidStaffRole),
        };
        let new_user = NewUser {
            username: self.username,
            email: self.email,
            password: self.password,
            role,
            facility_id: Some(facility_id),
        };
        new_user.validate()?;
        Ok(new_user)
    }
}

// --- Stored User Struct ---
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    /// Lower-cased on the way in; uniqueness is case-insensitive.
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub facility_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Hashes a plaintext password.
    pub fn hash_password(password: &str, cost: u32) -> Result<String, BcryptError> {
        hash(password, cost)
    }

    /// Verifies a plaintext password against a stored hash.
    pub fn verify_password(password: &str, hash: &str) -> Result<bool, BcryptError> {
        verify(password, hash)
    }

    /// Creates a new `User` from a `NewUser` DTO, hashing the password.
    pub fn from_new_user(new_user: NewUser) -> Result<Self, BcryptError> {
        Self::from_new_user_with_cost(new_user, PASSWORD_HASH_COST)
    }

    pub fn from_new_user_with_cost(new_user: NewUser, cost: u32) -> Result<Self, BcryptError> {
        let now = Utc::now();
        let password_hash = Self::hash_password(&new_user.password, cost)?;

        Ok(User {
            id: Uuid::new_v4(),
            username: new_user.username.trim().to_string(),
            email: normalize_email(&new_user.email),
            password_hash,
            role: new_user.role,
            facility_id: new_user.facility_id,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn check_password(&self, password: &str) -> Result<bool, BcryptError> {
        Self::verify_password(password, &self.password_hash)
    }

    /// The shape returned to clients; never contains the hash.
    pub fn view(&self) -> UserView {
        UserView {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            role: self.role,
            facility_id: self.facility_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub facility_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Login {
    pub email: String,
    pub password: String, // Plaintext password for login attempt
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn looks_like_email(email: &str) -> bool {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !email.contains(char::is_whitespace),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(role: Role, facility_id: Option<Uuid>) -> NewUser {
        NewUser {
            username: "ada".to_string(),
            email: " Ada@Example.com ".to_string(),
            password: "correct horse".to_string(),
            role,
            facility_id,
        }
    }

    #[test]
    fn should_hash_and_verify_password() {
        let user = User::from_new_user_with_cost(new_user(Role::Admin, None), 4).unwrap();
        assert_ne!(user.password_hash, "correct horse");
        assert!(user.check_password("correct horse").unwrap());
        assert!(!user.check_password("wrong").unwrap());
    }

    #[test]
    fn should_normalize_email() {
        let user = User::from_new_user_with_cost(new_user(Role::Admin, None), 4).unwrap();
        assert_eq!(user.email, "ada@example.com");
    }

    #[test]
    fn should_require_facility_for_staff() {
        assert!(new_user(Role::Provider, None).validate().is_err());
        assert!(new_user(Role::Provider, Some(Uuid::new_v4())).validate().is_ok());
    }

    #[test]
    fn should_refuse_facility_for_global_admin() {
        assert!(new_user(Role::Admin, Some(Uuid::new_v4())).validate().is_err());
        assert!(new_user(Role::Admin, None).validate().is_ok());
    }

    #[test]
    fn should_reject_malformed_email() {
        let mut user = new_user(Role::Admin, None);
        user.email = "not-an-email".to_string();
        assert!(matches!(user.validate(), Err(ValidationError::InvalidValue(_))));
    }

    #[test]
    fn should_not_expose_hash_in_view() {
        let user = User::from_new_user_with_cost(new_user(Role::Admin, None), 4).unwrap();
        let json = serde_json::to_value(user.view()).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["role"], "admin");
    }

    #[test]
    fn should_attach_staff_to_callers_facility() {
        let facility_id = Uuid::new_v4();
        let staff = NewStaff {
            username: "pharm".to_string(),
            email: "pharm@greencross.ng".to_string(),
            password: "secret".to_string(),
            role: "Pharmacy".to_string(),
        };
        let new_user = staff.into_new_user(facility_id).unwrap();
        assert_eq!(new_user.role, Role::Pharmacy);
        assert_eq!(new_user.facility_id, Some(facility_id));
    }

    #[test]
    fn should_reject_non_staff_roles() {
        for role in ["admin", "facilityAdmin", "nurse"] {
            let staff = NewStaff {
                username: "x".to_string(),
                email: "x@y.z".to_string(),
                password: "p".to_string(),
                role: role.to_string(),
            };
            assert_eq!(staff.into_new_user(Uuid::new_v4()).unwrap_err(), ValidationError::InvalidStaffRole);
        }
    }

    #[test]
    fn should_report_missing_staff_fields() {
        let staff = NewStaff { username: "x".to_string(), role: "provider".to_string(), ..Default::default() };
        assert_eq!(
            staff.into_new_user(Uuid::new_v4()).unwrap_err(),
            ValidationError::MissingFields("Missing required fields".to_string())
        );
    }
}
