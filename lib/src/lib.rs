// lib/src/lib.rs
//! Storage engines and the service layer of the records portal.

pub mod database;
pub mod storage_engine;

pub use crate::database::{Caller, Database, INVALID_CREDENTIALS};
pub use crate::storage_engine::{
    create_storage, open_sled_db, InMemoryStorage, PortalStorage, SledStorage, StorageConfig, StorageEngineType,
};
pub use models::medical::{Login, User};
