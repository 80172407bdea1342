//! Configuration management.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::issue::DEFAULT_LEAF_VALIDITY_DAYS;
use crate::key::DEFAULT_RSA_BITS;
use crate::root_ca::DEFAULT_ROOT_VALIDITY_DAYS;

/// Defaults offered when prompting for the root subject.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubjectDefaults {
    pub country: Option<String>,
    pub state: Option<String>,
    pub locality: Option<String>,
    pub organization: Option<String>,
    pub common_name: Option<String>,
}

/// Settings read from `config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Store location; defaults to the platform data directory.
    pub base_dir: Option<PathBuf>,

    /// RSA key size for roots and leaves.
    pub key_bits: usize,

    pub root_validity_days: u32,

    pub leaf_validity_days: u32,

    pub subject: SubjectDefaults,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_dir: None,
            key_bits: DEFAULT_RSA_BITS,
            root_validity_days: DEFAULT_ROOT_VALIDITY_DAYS,
            leaf_validity_days: DEFAULT_LEAF_VALIDITY_DAYS,
            subject: SubjectDefaults::default(),
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "localca")
}

impl Config {
    /// Get the config file path.
    pub fn path() -> Result<PathBuf> {
        let dirs = project_dirs()
            .ok_or_else(|| Error::Config("could not determine config directory".to_string()))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Load configuration from the default location; a missing file yields defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("invalid {}: {e}", path.display())))?;

        Ok(config)
    }

    /// The configured store location, or `<data dir>/pki`, or `./localca`
    /// when the platform has no home directory.
    pub fn resolve_base_dir(&self) -> PathBuf {
        if let Some(base) = &self.base_dir {
            return base.clone();
        }
        match project_dirs() {
            Some(dirs) => dirs.data_dir().join("pki"),
            None => PathBuf::from("localca"),
        }
    }
}
