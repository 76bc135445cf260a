//! Layered configuration: a TOML file on disk, overridable by `FEDCORE_*`
//! environment variables — a flat struct + serde, no configuration
//! framework, matching the rest of the node this core plugs into.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid environment override {key}: {source}")]
    BadEnvOverride {
        key: &'static str,
        #[source]
        source: std::num::ParseIntError,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FederationConfig {
    /// Directory holding `polls.log`, `federation.json`, `last_active.json`
    /// and `whitelist.json`.
    pub data_dir: PathBuf,
    /// Chain-wide reorg protection depth; also the activation delay between
    /// majority and poll execution.
    pub max_reorg_length: u64,
    /// Idle threshold the kicker schedules a kick vote beyond, in seconds.
    pub max_idle_seconds: u64,
    /// Address the admin JSON-RPC server binds to.
    pub rpc_addr: String,
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/federation"),
            max_reorg_length: 6,
            max_idle_seconds: 60 * 60 * 24, // 24h, hours-scale per spec §4.3
            rpc_addr: "127.0.0.1:9933".to_string(),
        }
    }
}

impl FederationConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(v) = std::env::var("FEDCORE_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("FEDCORE_MAX_REORG_LENGTH") {
            self.max_reorg_length = v.parse().map_err(|source| ConfigError::BadEnvOverride {
                key: "FEDCORE_MAX_REORG_LENGTH",
                source,
            })?;
        }
        if let Ok(v) = std::env::var("FEDCORE_MAX_IDLE_SECONDS") {
            self.max_idle_seconds = v.parse().map_err(|source| ConfigError::BadEnvOverride {
                key: "FEDCORE_MAX_IDLE_SECONDS",
                source,
            })?;
        }
        if let Ok(v) = std::env::var("FEDCORE_RPC_ADDR") {
            self.rpc_addr = v;
        }
        Ok(())
    }
}
