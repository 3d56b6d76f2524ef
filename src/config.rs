//! Library configuration.
//!
//! Explicit values win; an optional TOML file fills the gaps. The local
//! system id defaults to a fresh random id, which suits single-machine
//! deployments where no cross-restart identity is required.

use anyhow::{bail, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// TOML-file shape; every field optional so partial files work.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    pub db_path: Option<String>,
    pub local_system_id: Option<String>,
    pub local_system_name: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<FileConfig> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }
}

#[derive(Debug, Clone)]
pub struct LibraryConfig {
    /// SQLite database file; its parent directory must already exist.
    pub db_path: PathBuf,
    pub local_system_id: String,
    pub local_system_name: String,
}

impl LibraryConfig {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        LibraryConfig {
            db_path: db_path.into(),
            local_system_id: Uuid::new_v4().to_string(),
            local_system_name: "local".to_string(),
        }
    }

    /// Resolve from explicit values plus an optional TOML file; file values
    /// override where present.
    pub fn resolve(db_path: Option<PathBuf>, file: Option<FileConfig>) -> Result<Self> {
        let file = file.unwrap_or_default();
        let db_path = file
            .db_path
            .map(PathBuf::from)
            .or(db_path)
            .ok_or_else(|| anyhow::anyhow!("db_path must be given explicitly or in the config file"))?;
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                bail!("database directory does not exist: {:?}", parent);
            }
        }
        let mut config = LibraryConfig::new(db_path);
        if let Some(system_id) = file.local_system_id {
            config.local_system_id = system_id;
        }
        if let Some(system_name) = file.local_system_name {
            config.local_system_name = system_name;
        }
        Ok(config)
    }
}
