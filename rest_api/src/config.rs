// rest_api/src/config.rs

use anyhow::{anyhow, Context, Result};
use config::{Config, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use lib::{StorageConfig, StorageEngineType};
use security::{JwtKeys, RolesConfig};

pub const DEFAULT_CONFIG_FILE: &str = "portal.toml";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_DATA_DIRECTORY: &str = "./portal_data";
pub const DEFAULT_TOKEN_TTL_HOURS: u64 = 24;

/// Settings of the portal server.
///
/// Sources, later ones winning: built-in defaults, the config file
/// (`portal.toml` unless a path is given), `PORTAL_*` environment variables,
/// and finally a bare `JWT_SECRET`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortalConfig {
    pub host: String,
    pub port: u16,
    pub data_directory: PathBuf,
    pub storage_engine_type: StorageEngineType,
    #[serde(default)]
    pub jwt_secret: Option<String>,
    pub token_ttl_hours: u64,
    #[serde(default)]
    pub roles_file: Option<PathBuf>,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for PortalConfig {
    fn default() -> Self {
        PortalConfig {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            data_directory: PathBuf::from(DEFAULT_DATA_DIRECTORY),
            storage_engine_type: StorageEngineType::Sled,
            jwt_secret: None,
            token_ttl_hours: DEFAULT_TOKEN_TTL_HOURS,
            roles_file: None,
            cors_origins: Vec::new(),
        }
    }
}

impl PortalConfig {
    /// Loads the configuration. An explicitly given file must exist; the
    /// default `portal.toml` is optional.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config_builder = Config::builder()
            .set_default("host", DEFAULT_HOST)?
            .set_default("port", i64::from(DEFAULT_PORT))?
            .set_default("data_directory", DEFAULT_DATA_DIRECTORY)?
            .set_default("storage_engine_type", "sled")?
            .set_default("token_ttl_hours", DEFAULT_TOKEN_TTL_HOURS)?
            .set_default("cors_origins", Vec::<String>::new())?;

        config_builder = match config_path {
            Some(path) => {
                if !path.exists() {
                    return Err(anyhow!("Config file {} does not exist", path.display()));
                }
                config_builder.add_source(ConfigFile::from(path))
            }
            None => config_builder.add_source(ConfigFile::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        let config = config_builder
            .add_source(
                Environment::with_prefix("PORTAL")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("cors_origins"),
            )
            .set_override_option("jwt_secret", std::env::var("JWT_SECRET").ok())?
            .build()
            .context("Failed to assemble portal configuration")?;

        config.try_deserialize().context("Invalid portal configuration")
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self.host.parse().with_context(|| format!("Invalid host address '{}'", self.host))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    pub fn storage_config(&self) -> StorageConfig {
        StorageConfig { engine_type: self.storage_engine_type, data_directory: self.data_directory.clone() }
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_hours * 60 * 60)
    }

    /// Signing keys. Refuses to run without a secret.
    pub fn jwt_keys(&self) -> Result<JwtKeys> {
        let secret = self
            .jwt_secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow!("JWT_SECRET is not set; refusing to start without a signing secret"))?;
        Ok(JwtKeys::new(secret.as_bytes(), self.token_ttl())?)
    }

    /// The policy table, from `roles_file` when one is configured.
    pub fn roles(&self) -> Result<RolesConfig> {
        match &self.roles_file {
            Some(path) => RolesConfig::from_yaml_file(path),
            None => Ok(RolesConfig::default()),
        }
    }
}
