// lib/src/storage_engine/config.rs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use models::{PortalError, ValidationError};

/// Backend holding users, facilities and patients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageEngineType {
    Sled,
    InMemory,
}

impl FromStr for StorageEngineType {
    type Err = PortalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sled" => Ok(StorageEngineType::Sled),
            "inmemory" | "in-memory" | "memory" => Ok(StorageEngineType::InMemory),
            _ => Err(ValidationError::InvalidValue(format!("Unknown storage engine type: {}", s)).into()),
        }
    }
}

impl fmt::Display for StorageEngineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageEngineType::Sled => f.write_str("sled"),
            StorageEngineType::InMemory => f.write_str("inmemory"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub engine_type: StorageEngineType,
    /// Only read by the sled engine.
    pub data_directory: PathBuf,
}

impl StorageConfig {
    pub fn sled(data_directory: impl Into<PathBuf>) -> Self {
        StorageConfig { engine_type: StorageEngineType::Sled, data_directory: data_directory.into() }
    }

    pub fn in_memory() -> Self {
        StorageConfig { engine_type: StorageEngineType::InMemory, data_directory: PathBuf::new() }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::sled("./portal_data")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_engine_names() {
        assert_eq!("Sled".parse::<StorageEngineType>().unwrap(), StorageEngineType::Sled);
        assert_eq!("in-memory".parse::<StorageEngineType>().unwrap(), StorageEngineType::InMemory);
        assert!("rocksdb".parse::<StorageEngineType>().is_err());
    }

    #[test]
    fn should_display_parseable_names() {
        for engine in [StorageEngineType::Sled, StorageEngineType::InMemory] {
            assert_eq!(engine.to_string().parse::<StorageEngineType>().unwrap(), engine);
        }
    }
}
