use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::db::BackendType;

/// Data file used when nothing else is configured
pub const DEFAULT_DATA_FILE: &str = "genea.yaml";

/// Owner id used when nothing else is configured
pub const DEFAULT_OWNER: &str = "local";

/// User configuration, stored as YAML in the home directory
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Path to the data file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_path: Option<PathBuf>,

    /// Backend override; inferred from the data file extension when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<BackendType>,

    /// Owner id used when none is given on the command line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_owner: Option<String>,
}

impl Config {
    /// Loads the config from the provided path
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))
    }

    /// Loads the config, or the defaults when the file does not exist
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save the config to the specified path
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(&self)?;

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&path, content)
            .with_context(|| format!("Failed to write config to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Data file to open. Priority: explicit option, `GENEA_DATA`,
    /// config file, then `genea.yaml` in the current directory.
    pub fn resolve_data_path(&self, explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        if let Ok(path) = env::var("GENEA_DATA") {
            if !path.is_empty() {
                return PathBuf::from(path);
            }
        }
        self.data_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_FILE))
    }

    /// Owner to act as. Priority: explicit option, `GENEA_OWNER`, config file,
    /// then [`DEFAULT_OWNER`].
    pub fn resolve_owner(&self, explicit: Option<&str>) -> String {
        if let Some(owner) = explicit {
            return owner.to_string();
        }
        if let Ok(owner) = env::var("GENEA_OWNER") {
            if !owner.trim().is_empty() {
                return owner;
            }
        }
        self.default_owner
            .clone()
            .unwrap_or_else(|| DEFAULT_OWNER.to_string())
    }
}

/// Gets the path to the config file
pub fn get_config_path() -> Result<PathBuf> {
    if let Ok(path) = env::var("GENEA_CONFIG_PATH") {
        return Ok(PathBuf::from(path));
    }

    // Default to ~/.genea.config
    let home_dir = dirs::home_dir().context("Failed to determine home directory")?;

    Ok(home_dir.join(".genea.config"))
}
