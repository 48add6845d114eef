// lib/src/storage_engine/storage_engine.rs
use async_trait::async_trait;
use uuid::Uuid;

use models::medical::{Facility, Patient, User};
use models::{PatientId, PortalResult};

use super::StorageEngineType;

/// Persistence contract of the portal.
///
/// Engines enforce the uniqueness of user emails and usernames
/// (case-insensitive) and of patient ids, and provide the atomic writes the
/// service layer relies on: facility registration, cascading facility
/// deletion and compare-and-swap of patient records.
#[async_trait]
pub trait PortalStorage: Send + Sync + 'static {
    fn engine_type(&self) -> StorageEngineType;

    /// Inserts a user; `Conflict` if the email or username is taken.
    async fn create_user(&self, user: &User) -> PortalResult<()>;
    async fn get_user(&self, id: &Uuid) -> PortalResult<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> PortalResult<Option<User>>;
    async fn list_users(&self) -> PortalResult<Vec<User>>;
    /// Returns the removed user, if there was one.
    async fn delete_user(&self, id: &Uuid) -> PortalResult<Option<User>>;

    /// Writes the facility and its admin in one atomic step. Nothing is
    /// written when the admin's email or username is taken.
    async fn create_facility_with_admin(&self, facility: &Facility, admin: &User) -> PortalResult<()>;
    async fn get_facility(&self, id: &Uuid) -> PortalResult<Option<Facility>>;
    async fn list_facilities(&self) -> PortalResult<Vec<Facility>>;
    /// Removes the facility, its admin and every user attached to it in one
    /// atomic step. Returns the ids of the removed users; `NotFound` if the
    /// facility does not exist.
    async fn delete_facility_cascade(&self, id: &Uuid) -> PortalResult<Vec<Uuid>>;

    /// Inserts a patient unless its patient id is taken. Returns `false` on
    /// collision so the caller can draw another id.
    async fn insert_patient(&self, patient: &Patient) -> PortalResult<bool>;
    async fn get_patient(&self, patient_id: &PatientId) -> PortalResult<Option<Patient>>;
    async fn list_patients(&self) -> PortalResult<Vec<Patient>>;
    /// Replaces `expected` with `new` only if the stored record still equals
    /// `expected`. Returns `false` when another writer got there first.
    async fn compare_and_swap_patient(&self, expected: &Patient, new: &Patient) -> PortalResult<bool>;

    async fn flush(&self) -> PortalResult<()>;
}
