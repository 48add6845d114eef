// lib/src/database.rs
// Service layer of the portal: every multi-step operation the API exposes,
// expressed over a `PortalStorage` engine.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use models::medical::{
    Facility, FacilitySummary, Login, Medication, NewFacility, NewPatient, NewStaff, NewUser, Patient,
    PatientUpdate, PublicPatient, Role, User, UserView, PASSWORD_HASH_COST,
};
use models::{PatientId, PortalError, PortalResult, ValidationError};

use crate::storage_engine::{create_storage, PortalStorage, StorageConfig};

/// Attempts at a compare-and-swap of a patient record before giving up.
pub const PATIENT_WRITE_ATTEMPTS: usize = 8;

/// Fresh patient ids drawn before registration gives up.
pub const PATIENT_ID_ATTEMPTS: usize = 16;

pub const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Identity of the account performing an operation, as carried by its token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Uuid,
    pub role: Role,
    pub facility_id: Option<Uuid>,
}

impl Caller {
    /// A facility admin is confined to its own facility; the global admin is not.
    fn check_facility_scope(&self, facility_id: Uuid) -> PortalResult<()> {
        match self.role {
            Role::Admin => Ok(()),
            _ if self.facility_id == Some(facility_id) => Ok(()),
            _ => Err(PortalError::forbidden("Access to another facility is not allowed")),
        }
    }

    fn own_facility(&self) -> PortalResult<Uuid> {
        self.facility_id.ok_or_else(|| PortalError::forbidden("Caller is not attached to a facility"))
    }
}

/// Handle shared by every request. Cheap to clone.
#[derive(Clone)]
pub struct Database {
    storage: Arc<dyn PortalStorage>,
    hash_cost: u32,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("engine", &self.storage.engine_type())
            .field("hash_cost", &self.hash_cost)
            .finish()
    }
}

impl Database {
    pub fn new(storage: Arc<dyn PortalStorage>) -> Self {
        Database { storage, hash_cost: PASSWORD_HASH_COST }
    }

    /// Opens the engine described by `config`.
    pub fn open(config: &StorageConfig) -> PortalResult<Self> {
        Ok(Self::new(create_storage(config)?))
    }

    /// Overrides the bcrypt work factor. Tests use the minimum.
    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    pub fn storage(&self) -> &Arc<dyn PortalStorage> {
        &self.storage
    }

    pub async fn flush(&self) -> PortalResult<()> {
        self.storage.flush().await
    }

    async fn hash_user(&self, new_user: NewUser) -> PortalResult<User> {
        new_user.validate()?;
        let cost = self.hash_cost;
        let user = tokio::task::spawn_blocking(move || User::from_new_user_with_cost(new_user, cost))
            .await
            .map_err(|e| PortalError::Internal(format!("password hashing task failed: {}", e)))??;
        Ok(user)
    }

    // --- accounts ---

    /// Checks an email/password pair. Unknown email and wrong password fail
    /// the same way.
    pub async fn authenticate(&self, login: Login) -> PortalResult<User> {
        if login.email.trim().is_empty() || login.password.is_empty() {
            return Err(ValidationError::MissingFields("Email and password are required".to_string()).into());
        }
        let invalid = || PortalError::from(ValidationError::InvalidValue(INVALID_CREDENTIALS.to_string()));

        let Some(user) = self.storage.get_user_by_email(&login.email).await? else {
            debug!("login for unknown email");
            return Err(invalid());
        };
        let hash = user.password_hash.clone();
        let matches = tokio::task::spawn_blocking(move || User::verify_password(&login.password, &hash))
            .await
            .map_err(|e| PortalError::Internal(format!("password check task failed: {}", e)))??;
        if !matches {
            debug!(user = %user.id, "login with wrong password");
            return Err(invalid());
        }
        info!(user = %user.id, role = %user.role, "user logged in");
        Ok(user)
    }

    /// Creates the global admin unless one already exists. Returns `None`
    /// when nothing was created.
    pub async fn create_global_admin(&self, username: &str, email: &str, password: &str) -> PortalResult<Option<User>> {
        let existing = self.storage.list_users().await?;
        if let Some(admin) = existing.iter().find(|u| u.role == Role::Admin) {
            info!(admin = %admin.email, "global admin already exists");
            return Ok(None);
        }
        let admin = self
            .hash_user(NewUser {
                username: username.to_string(),
                email: email.to_string(),
                password: password.to_string(),
                role: Role::Admin,
                facility_id: None,
            })
            .await?;
        self.storage.create_user(&admin).await?;
        info!(admin = %admin.email, "global admin created");
        Ok(Some(admin))
    }

    pub async fn list_users(&self) -> PortalResult<Vec<UserView>> {
        let mut users = self.storage.list_users().await?;
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(users.iter().map(User::view).collect())
    }

    // --- facilities ---

    /// Creates a facility together with its admin account in one write.
    pub async fn register_facility(&self, form: NewFacility) -> PortalResult<(Facility, User)> {
        let (facility_type, admin_form) = form.validate()?;
        if self.storage.get_user_by_email(&admin_form.email).await?.is_some() {
            return Err(PortalError::conflict("Admin email already in use"));
        }

        let facility_id = Uuid::new_v4();
        let admin = self
            .hash_user(NewUser {
                username: admin_form.username.clone(),
                email: admin_form.email.clone(),
                password: admin_form.password.clone(),
                role: Role::FacilityAdmin,
                facility_id: Some(facility_id),
            })
            .await?;
        let facility = Facility::new(facility_id, &form.name, facility_type, &form.location, admin.id);

        self.storage.create_facility_with_admin(&facility, &admin).await?;
        info!(facility = %facility.id, kind = %facility.facility_type, admin = %admin.email, "facility registered");
        Ok((facility, admin))
    }

    pub async fn list_facilities(&self) -> PortalResult<Vec<FacilitySummary>> {
        let admins: HashMap<Uuid, User> = self
            .storage
            .list_users()
            .await?
            .into_iter()
            .filter(|u| u.role == Role::FacilityAdmin)
            .map(|u| (u.id, u))
            .collect();
        let mut facilities = self.storage.list_facilities().await?;
        facilities.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(facilities
            .into_iter()
            .map(|facility| {
                let admin = admins.get(&facility.admin_user);
                FacilitySummary {
                    admin_username: admin.map(|a| a.username.clone()),
                    admin_email: admin.map(|a| a.email.clone()),
                    facility,
                }
            })
            .collect())
    }

    pub async fn get_facility(&self, caller: &Caller, id: Uuid) -> PortalResult<Facility> {
        caller.check_facility_scope(id)?;
        self.storage.get_facility(&id).await?.ok_or_else(|| PortalError::not_found("Facility"))
    }

    /// Deletes the facility, its admin and its staff. Patients stay.
    pub async fn delete_facility(&self, id: Uuid) -> PortalResult<Vec<Uuid>> {
        let removed = self.storage.delete_facility_cascade(&id).await?;
        info!(facility = %id, users = removed.len(), "facility deleted");
        Ok(removed)
    }

    // --- staff ---

    pub async fn register_staff(&self, caller: &Caller, form: NewStaff) -> PortalResult<User> {
        let facility_id = caller.own_facility()?;
        if self.storage.get_facility(&facility_id).await?.is_none() {
            return Err(PortalError::not_found("Facility"));
        }
        let staff = self.hash_user(form.into_new_user(facility_id)?).await?;
        self.storage.create_user(&staff).await?;
        info!(facility = %facility_id, staff = %staff.id, role = %staff.role, "staff registered");
        Ok(staff)
    }

    pub async fn list_staff(&self, caller: &Caller, facility_id: Uuid) -> PortalResult<Vec<UserView>> {
        caller.check_facility_scope(facility_id)?;
        if self.storage.get_facility(&facility_id).await?.is_none() {
            return Err(PortalError::not_found("Facility"));
        }
        let mut staff: Vec<User> = self
            .storage
            .list_users()
            .await?
            .into_iter()
            .filter(|u| u.facility_id == Some(facility_id) && u.role.is_staff())
            .collect();
        staff.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(staff.iter().map(User::view).collect())
    }

    /// Removes a provider or pharmacist of the caller's own facility.
    pub async fn delete_staff(&self, caller: &Caller, user_id: Uuid) -> PortalResult<User> {
        let facility_id = caller.own_facility()?;
        let user = self.storage.get_user(&user_id).await?.ok_or_else(|| PortalError::not_found("Staff member"))?;
        if !user.role.is_staff() || user.facility_id != Some(facility_id) {
            warn!(caller = %caller.user_id, target = %user_id, "refused staff deletion outside own facility");
            return Err(PortalError::forbidden("Staff member belongs to another facility"));
        }
        let removed = self
            .storage
            .delete_user(&user_id)
            .await?
            .ok_or_else(|| PortalError::not_found("Staff member"))?;
        info!(facility = %facility_id, staff = %user_id, "staff deleted");
        Ok(removed)
    }

    // --- patients ---

    /// Registers a patient on behalf of a hospital's facility admin, drawing
    /// patient ids until one is free.
    pub async fn register_patient(&self, caller: &Caller, form: NewPatient) -> PortalResult<Patient> {
        let facility_id = caller.own_facility()?;
        let facility = self
            .storage
            .get_facility(&facility_id)
            .await?
            .ok_or_else(|| PortalError::not_found("Facility"))?;
        if !facility.is_hospital() {
            return Err(PortalError::forbidden("Only hospitals can register patients"));
        }
        form.validate()?;

        for _ in 0..PATIENT_ID_ATTEMPTS {
            let patient = form.clone().into_patient(PatientId::generate(), Some(facility.id))?;
            if self.storage.insert_patient(&patient).await? {
                info!(patient = %patient.patient_id, facility = %facility.id, "patient registered");
                return Ok(patient);
            }
            debug!(patient = %patient.patient_id, "patient id collision, drawing again");
        }
        Err(PortalError::Internal("could not allocate a unique patient id".to_string()))
    }

    /// Patients whose name or patient id contains `term`, ignoring case.
    pub async fn search_patients(&self, term: &str) -> PortalResult<Vec<Patient>> {
        let mut patients: Vec<Patient> = self
            .storage
            .list_patients()
            .await?
            .into_iter()
            .filter(|p| p.matches_search(term))
            .collect();
        patients.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(patients)
    }

    pub async fn get_patient(&self, patient_id: &PatientId) -> PortalResult<Patient> {
        self.storage.get_patient(patient_id).await?.ok_or_else(|| PortalError::not_found("Patient"))
    }

    pub async fn public_patient(&self, patient_id: &PatientId) -> PortalResult<PublicPatient> {
        Ok(self.get_patient(patient_id).await?.public_view())
    }

    /// Overwrites the fields present in `update`.
    pub async fn update_patient(&self, patient_id: &PatientId, update: PatientUpdate) -> PortalResult<Patient> {
        if update.is_empty() {
            return self.get_patient(patient_id).await;
        }
        self.modify_patient(patient_id, |patient| {
            update.clone().apply(patient)?;
            Ok(patient.clone())
        })
        .await
    }

    /// Dispenses `medication_name` from the patient's current medications and
    /// returns the medication as stored afterwards.
    pub async fn dispense_medication(&self, patient_id: &PatientId, medication_name: &str) -> PortalResult<Medication> {
        let medication = self
            .modify_patient(patient_id, |patient| {
                let now = Utc::now();
                let medication = patient
                    .medication_mut(medication_name)
                    .ok_or_else(|| PortalError::not_found("Medication"))?;
                medication.dispense(now)?;
                let dispensed = medication.clone();
                patient.updated_at = now;
                Ok(dispensed)
            })
            .await?;
        info!(
            patient = %patient_id,
            medication = %medication.name,
            refills_left = medication.refills_left,
            "medication dispensed"
        );
        Ok(medication)
    }

    /// Read, change, compare-and-swap. A lost race re-reads and runs `change`
    /// again on the fresh record, so its checks always see the stored state.
    async fn modify_patient<T, F>(&self, patient_id: &PatientId, mut change: F) -> PortalResult<T>
    where
        T: Send,
        F: FnMut(&mut Patient) -> PortalResult<T> + Send,
    {
        for attempt in 1..=PATIENT_WRITE_ATTEMPTS {
            let current = self.get_patient(patient_id).await?;
            let mut next = current.clone();
            let outcome = change(&mut next)?;
            if self.storage.compare_and_swap_patient(&current, &next).await? {
                return Ok(outcome);
            }
            debug!(patient = %patient_id, attempt, "patient record changed underneath, retrying");
        }
        warn!(patient = %patient_id, "gave up updating patient after {} attempts", PATIENT_WRITE_ATTEMPTS);
        Err(PortalError::conflict("Patient record is being modified concurrently, please retry"))
    }
}
