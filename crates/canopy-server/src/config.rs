use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use canopy_forest::ForestConfig;
use canopy_store::{InMemoryRecordStore, RecordStore, SyncMode, WalRecordStore};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ServerError, ServerResult};

/// File name of the record log inside `data_dir`.
pub const RECORD_LOG: &str = "records.wal";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Directory holding the record log. Unset keeps records in memory.
    pub data_dir: Option<PathBuf>,
    /// fsync the record log after every write.
    pub sync_every_write: bool,
    pub forest: ForestConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8470)),
            data_dir: None,
            sync_every_write: false,
            forest: ForestConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load from a TOML file; absent keys take their defaults.
    pub fn load(path: &Path) -> ServerResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ServerError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(input: &str) -> ServerResult<Self> {
        let config: Self = toml::from_str(input).map_err(|e| ServerError::Config(e.to_string()))?;
        config
            .forest
            .validate()
            .map_err(|e| ServerError::Config(e.to_string()))?;
        Ok(config)
    }

    pub fn sync_mode(&self) -> SyncMode {
        if self.sync_every_write {
            SyncMode::EveryWrite
        } else {
            SyncMode::OsDefault
        }
    }

    /// Open the record store this configuration describes.
    pub fn open_store(&self) -> ServerResult<Arc<dyn RecordStore>> {
        match &self.data_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                let path = dir.join(RECORD_LOG);
                let store = WalRecordStore::open(&path, self.sync_mode())?;
                Ok(Arc::new(store))
            }
            None => {
                info!("no data_dir configured; records are kept in memory");
                Ok(Arc::new(InMemoryRecordStore::new()))
            }
        }
    }
}
