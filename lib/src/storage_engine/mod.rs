// lib/src/storage_engine/mod.rs

pub mod config;
pub mod inmemory_storage;
pub mod sled_storage;
pub mod storage_engine;
pub mod storage_utils;

pub use config::{StorageConfig, StorageEngineType};
pub use inmemory_storage::InMemoryStorage;
pub use sled_storage::{open_sled_db, SledStorage};
pub use storage_engine::PortalStorage;

use std::sync::Arc;
use tracing::info;

use models::PortalResult;

/// Opens the engine selected by `config`.
pub fn create_storage(config: &StorageConfig) -> PortalResult<Arc<dyn PortalStorage>> {
    info!("Opening {} storage engine", config.engine_type);
    match config.engine_type {
        StorageEngineType::Sled => {
            let db = open_sled_db(&config.data_directory)?;
            Ok(Arc::new(SledStorage::new(db)?))
        }
        StorageEngineType::InMemory => Ok(Arc::new(InMemoryStorage::new())),
    }
}
