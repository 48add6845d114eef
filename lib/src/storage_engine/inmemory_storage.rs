// lib/src/storage_engine/inmemory_storage.rs
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

use models::medical::{Facility, Patient, User};
use models::{PatientId, PortalError, PortalResult};

use super::storage_utils::{email_key, user_index_keys};
use super::{PortalStorage, StorageEngineType};

#[derive(Debug, Default)]
struct State {
    users: HashMap<Uuid, User>,
    user_keys: HashMap<Vec<u8>, Uuid>,
    facilities: HashMap<Uuid, Facility>,
    patients: BTreeMap<PatientId, Patient>,
}

impl State {
    fn check_user_keys(&self, user: &User) -> PortalResult<()> {
        let [email, username] = user_index_keys(user);
        if self.user_keys.contains_key(&email) {
            return Err(PortalError::conflict("Email already in use"));
        }
        if self.user_keys.contains_key(&username) {
            return Err(PortalError::conflict("Username already in use"));
        }
        Ok(())
    }

    fn put_user(&mut self, user: &User) {
        for key in user_index_keys(user) {
            self.user_keys.insert(key, user.id);
        }
        self.users.insert(user.id, user.clone());
    }

    fn take_user(&mut self, id: &Uuid) -> Option<User> {
        let user = self.users.remove(id)?;
        for key in user_index_keys(&user) {
            self.user_keys.remove(&key);
        }
        Some(user)
    }
}

/// Volatile engine for tests and throwaway runs. Every mutation happens under
/// one write lock, so multi-record writes are atomic.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    state: RwLock<State>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PortalStorage for InMemoryStorage {
    fn engine_type(&self) -> StorageEngineType {
        StorageEngineType::InMemory
    }

    async fn create_user(&self, user: &User) -> PortalResult<()> {
        let mut state = self.state.write().await;
        state.check_user_keys(user)?;
        state.put_user(user);
        Ok(())
    }

    async fn get_user(&self, id: &Uuid) -> PortalResult<Option<User>> {
        Ok(self.state.read().await.users.get(id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> PortalResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state.user_keys.get(&email_key(email)).and_then(|id| state.users.get(id)).cloned())
    }

    async fn list_users(&self) -> PortalResult<Vec<User>> {
        Ok(self.state.read().await.users.values().cloned().collect())
    }

    async fn delete_user(&self, id: &Uuid) -> PortalResult<Option<User>> {
        Ok(self.state.write().await.take_user(id))
    }

    async fn create_facility_with_admin(&self, facility: &Facility, admin: &User) -> PortalResult<()> {
        let mut state = self.state.write().await;
        state.check_user_keys(admin)?;
        state.put_user(admin);
        state.facilities.insert(facility.id, facility.clone());
        Ok(())
    }

    async fn get_facility(&self, id: &Uuid) -> PortalResult<Option<Facility>> {
        Ok(self.state.read().await.facilities.get(id).cloned())
    }

    async fn list_facilities(&self) -> PortalResult<Vec<Facility>> {
        Ok(self.state.read().await.facilities.values().cloned().collect())
    }

    async fn delete_facility_cascade(&self, id: &Uuid) -> PortalResult<Vec<Uuid>> {
        let mut state = self.state.write().await;
        let facility = state.facilities.remove(id).ok_or_else(|| PortalError::not_found("Facility"))?;
        let members: Vec<Uuid> = state
            .users
            .values()
            .filter(|u| u.id == facility.admin_user || u.facility_id == Some(facility.id))
            .map(|u| u.id)
            .collect();
        for member in &members {
            state.take_user(member);
        }
        Ok(members)
    }

    async fn insert_patient(&self, patient: &Patient) -> PortalResult<bool> {
        let mut state = self.state.write().await;
        if state.patients.contains_key(&patient.patient_id) {
            return Ok(false);
        }
        state.patients.insert(patient.patient_id.clone(), patient.clone());
        Ok(true)
    }

    async fn get_patient(&self, patient_id: &PatientId) -> PortalResult<Option<Patient>> {
        Ok(self.state.read().await.patients.get(patient_id).cloned())
    }

    async fn list_patients(&self) -> PortalResult<Vec<Patient>> {
        Ok(self.state.read().await.patients.values().cloned().collect())
    }

    async fn compare_and_swap_patient(&self, expected: &Patient, new: &Patient) -> PortalResult<bool> {
        if expected.patient_id != new.patient_id {
            return Err(PortalError::Internal("patient id cannot change during an update".to_string()));
        }
        let mut state = self.state.write().await;
        match state.patients.get_mut(&expected.patient_id) {
            Some(current) if current == expected => {
                *current = new.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn flush(&self) -> PortalResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use models::medical::{FacilityType, Role};

    fn user(username: &str, email: &str, role: Role, facility_id: Option<Uuid>) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            role,
            facility_id,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn should_reject_duplicate_username_case_insensitively() {
        let storage = InMemoryStorage::new();
        storage.create_user(&user("Nurse", "a@x.org", Role::Provider, Some(Uuid::new_v4()))).await.unwrap();
        let err = storage
            .create_user(&user("nurse", "b@x.org", Role::Provider, Some(Uuid::new_v4())))
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::Conflict(_)));
    }

    #[tokio::test]
    async fn should_keep_facility_absent_when_admin_conflicts() {
        let storage = InMemoryStorage::new();
        storage.create_user(&user("root", "root@x.org", Role::Admin, None)).await.unwrap();

        let facility_id = Uuid::new_v4();
        let admin = user("pharm-admin", "ROOT@x.org", Role::FacilityAdmin, Some(facility_id));
        let facility = Facility::new(facility_id, "Green Cross", FacilityType::Pharmacy, "Lagos", admin.id);
        assert!(storage.create_facility_with_admin(&facility, &admin).await.is_err());
        assert!(storage.list_facilities().await.unwrap().is_empty());
        assert_eq!(storage.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn should_cascade_and_free_emails() {
        let storage = InMemoryStorage::new();
        let facility_id = Uuid::new_v4();
        let admin = user("fa", "fa@x.org", Role::FacilityAdmin, Some(facility_id));
        let facility = Facility::new(facility_id, "General", FacilityType::Hospital, "Kano", admin.id);
        storage.create_facility_with_admin(&facility, &admin).await.unwrap();
        storage.create_user(&user("doc", "doc@x.org", Role::Provider, Some(facility_id))).await.unwrap();

        assert_eq!(storage.delete_facility_cascade(&facility_id).await.unwrap().len(), 2);
        assert!(storage.list_users().await.unwrap().is_empty());
        assert!(storage.get_user_by_email("fa@x.org").await.unwrap().is_none());
    }
}
