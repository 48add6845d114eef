// lib/src/storage_engine/sled_storage.rs
//
// Tree layout:
//   users       user id (16 bytes)   -> bincode(User)
//   user_keys   "email:<lower>" / "username:<lower>" -> user id
//   facilities  facility id          -> bincode(Facility)
//   patients    patient id (utf-8)   -> bincode(Patient)

use async_trait::async_trait;
use sled::transaction::{ConflictableTransactionError, TransactionError, TransactionResult, Transactional};
use sled::{Db, Tree};
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

use models::medical::{Facility, Patient, User};
use models::{PatientId, PortalError, PortalResult};

use super::storage_utils::{decode_record, email_key, encode_record, user_index_keys};
use super::{PortalStorage, StorageEngineType};

/// Opens (or creates) the sled database under `path`.
pub fn open_sled_db(path: &Path) -> PortalResult<Db> {
    std::fs::create_dir_all(path)
        .map_err(|e| PortalError::Storage(format!("Failed to create data directory {}: {}", path.display(), e)))?;
    let db = sled::open(path)?;
    info!("Opened sled database at {}", path.display());
    Ok(db)
}

/// Reasons a multi-tree transaction gives up without writing.
#[derive(Debug, Clone, Copy)]
enum Abort {
    EmailTaken,
    UsernameTaken,
    FacilityMissing,
}

impl From<Abort> for PortalError {
    fn from(abort: Abort) -> Self {
        match abort {
            Abort::EmailTaken => PortalError::conflict("Email already in use"),
            Abort::UsernameTaken => PortalError::conflict("Username already in use"),
            Abort::FacilityMissing => PortalError::not_found("Facility"),
        }
    }
}

fn finish<T>(result: TransactionResult<T, Abort>) -> PortalResult<T> {
    match result {
        Ok(value) => Ok(value),
        Err(TransactionError::Abort(abort)) => Err(abort.into()),
        Err(TransactionError::Storage(e)) => Err(e.into()),
    }
}

pub struct SledStorage {
    db: Db,
    users: Tree,
    user_keys: Tree,
    facilities: Tree,
    patients: Tree,
}

impl SledStorage {
    pub fn new(db: Db) -> PortalResult<Self> {
        Ok(SledStorage {
            users: db.open_tree("users")?,
            user_keys: db.open_tree("user_keys")?,
            facilities: db.open_tree("facilities")?,
            patients: db.open_tree("patients")?,
            db,
        })
    }

    pub fn open(path: &Path) -> PortalResult<Self> {
        Self::new(open_sled_db(path)?)
    }

    fn decode_all<T: serde::de::DeserializeOwned>(tree: &Tree) -> PortalResult<Vec<T>> {
        tree.iter()
            .values()
            .map(|value| decode_record(&value?))
            .collect()
    }
}

#[async_trait]
impl PortalStorage for SledStorage {
    fn engine_type(&self) -> StorageEngineType {
        StorageEngineType::Sled
    }

    async fn create_user(&self, user: &User) -> PortalResult<()> {
        let bytes = encode_record(user)?;
        let [email, username] = user_index_keys(user);
        let id = *user.id.as_bytes();

        let result = (&self.users, &self.user_keys).transaction(|(users, keys)| {
            if keys.get(&email)?.is_some() {
                return Err(ConflictableTransactionError::Abort(Abort::EmailTaken));
            }
            if keys.get(&username)?.is_some() {
                return Err(ConflictableTransactionError::Abort(Abort::UsernameTaken));
            }
            keys.insert(email.as_slice(), &id[..])?;
            keys.insert(username.as_slice(), &id[..])?;
            users.insert(&id[..], bytes.as_slice())?;
            Ok(())
        });
        finish(result)?;
        debug!(user = %user.id, role = %user.role, "stored user");
        Ok(())
    }

    async fn get_user(&self, id: &Uuid) -> PortalResult<Option<User>> {
        self.users.get(id.as_bytes())?.map(|v| decode_record(&v)).transpose()
    }

    async fn get_user_by_email(&self, email: &str) -> PortalResult<Option<User>> {
        match self.user_keys.get(email_key(email))? {
            Some(id) => self.users.get(id)?.map(|v| decode_record(&v)).transpose(),
            None => Ok(None),
        }
    }

    async fn list_users(&self) -> PortalResult<Vec<User>> {
        Self::decode_all(&self.users)
    }

    async fn delete_user(&self, id: &Uuid) -> PortalResult<Option<User>> {
        let Some(user) = self.get_user(id).await? else {
            return Ok(None);
        };
        let [email, username] = user_index_keys(&user);
        let key = *id.as_bytes();

        let result = (&self.users, &self.user_keys).transaction(|(users, keys)| {
            users.remove(&key[..])?;
            keys.remove(email.as_slice())?;
            keys.remove(username.as_slice())?;
            Ok(())
        });
        finish(result)?;
        Ok(Some(user))
    }

    async fn create_facility_with_admin(&self, facility: &Facility, admin: &User) -> PortalResult<()> {
        let facility_bytes = encode_record(facility)?;
        let admin_bytes = encode_record(admin)?;
        let [email, username] = user_index_keys(admin);
        let admin_id = *admin.id.as_bytes();
        let facility_id = *facility.id.as_bytes();

        let result = (&self.users, &self.user_keys, &self.facilities).transaction(|(users, keys, facilities)| {
            if keys.get(&email)?.is_some() {
                return Err(ConflictableTransactionError::Abort(Abort::EmailTaken));
            }
            if keys.get(&username)?.is_some() {
                return Err(ConflictableTransactionError::Abort(Abort::UsernameTaken));
            }
            keys.insert(email.as_slice(), &admin_id[..])?;
            keys.insert(username.as_slice(), &admin_id[..])?;
            users.insert(&admin_id[..], admin_bytes.as_slice())?;
            facilities.insert(&facility_id[..], facility_bytes.as_slice())?;
            Ok(())
        });
        finish(result)
    }

    async fn get_facility(&self, id: &Uuid) -> PortalResult<Option<Facility>> {
        self.facilities.get(id.as_bytes())?.map(|v| decode_record(&v)).transpose()
    }

    async fn list_facilities(&self) -> PortalResult<Vec<Facility>> {
        Self::decode_all(&self.facilities)
    }

    async fn delete_facility_cascade(&self, id: &Uuid) -> PortalResult<Vec<Uuid>> {
        let facility = self.get_facility(id).await?.ok_or_else(|| PortalError::not_found("Facility"))?;

        // Transactions cannot iterate, so members are collected up front.
        let members: Vec<User> = self
            .list_users()
            .await?
            .into_iter()
            .filter(|u| u.id == facility.admin_user || u.facility_id == Some(facility.id))
            .collect();
        let removals: Vec<([u8; 16], [Vec<u8>; 2])> =
            members.iter().map(|u| (*u.id.as_bytes(), user_index_keys(u))).collect();
        let facility_key = *id.as_bytes();

        let result = (&self.users, &self.user_keys, &self.facilities).transaction(|(users, keys, facilities)| {
            if facilities.remove(&facility_key[..])?.is_none() {
                return Err(ConflictableTransactionError::Abort(Abort::FacilityMissing));
            }
            for (user_key, [email, username]) in &removals {
                users.remove(&user_key[..])?;
                keys.remove(email.as_slice())?;
                keys.remove(username.as_slice())?;
            }
            Ok(())
        });
        finish(result)?;
        Ok(members.into_iter().map(|u| u.id).collect())
    }

    async fn insert_patient(&self, patient: &Patient) -> PortalResult<bool> {
        let bytes = encode_record(patient)?;
        let swapped = self
            .patients
            .compare_and_swap(patient.patient_id.as_bytes(), None as Option<&[u8]>, Some(bytes))?;
        Ok(swapped.is_ok())
    }

    async fn get_patient(&self, patient_id: &PatientId) -> PortalResult<Option<Patient>> {
        self.patients.get(patient_id.as_bytes())?.map(|v| decode_record(&v)).transpose()
    }

    async fn list_patients(&self) -> PortalResult<Vec<Patient>> {
        Self::decode_all(&self.patients)
    }

    async fn compare_and_swap_patient(&self, expected: &Patient, new: &Patient) -> PortalResult<bool> {
        if expected.patient_id != new.patient_id {
            return Err(PortalError::Internal("patient id cannot change during an update".to_string()));
        }
        let old_bytes = encode_record(expected)?;
        let new_bytes = encode_record(new)?;
        let swapped = self
            .patients
            .compare_and_swap(expected.patient_id.as_bytes(), Some(old_bytes), Some(new_bytes))?;
        Ok(swapped.is_ok())
    }

    async fn flush(&self) -> PortalResult<()> {
        let bytes = self.db.flush_async().await?;
        debug!("flushed {} bytes to disk", bytes);
        Ok(())
    }
}
