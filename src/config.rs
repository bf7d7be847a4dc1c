//! Driver configuration with builder pattern

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::conf_file::DEFAULT_CONF_DIRS;
use crate::registry::RefreshPolicy;

/// Default location of the runtime listing tool
pub const DEFAULT_VZLIST: &str = "/usr/sbin/vzlist";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Candidate config directories, first existing one wins
    pub conf_dirs: Vec<PathBuf>,
    pub vzlist_path: PathBuf,
    pub refresh_policy: RefreshPolicy,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            conf_dirs: DEFAULT_CONF_DIRS.iter().map(PathBuf::from).collect(),
            vzlist_path: PathBuf::from(DEFAULT_VZLIST),
            refresh_policy: RefreshPolicy::default(),
        }
    }
}

impl DriverConfig {
    pub fn builder() -> DriverConfigBuilder {
        DriverConfigBuilder::default()
    }

    /// Load a JSON config file; missing keys take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: DriverConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.conf_dirs.is_empty() {
            return Err(crate::Error::Config("conf_dirs cannot be empty".into()));
        }
        if self.vzlist_path.as_os_str().is_empty() {
            return Err(crate::Error::Config("vzlist_path cannot be empty".into()));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct DriverConfigBuilder {
    config: DriverConfig,
    custom_dirs: bool,
}

impl DriverConfigBuilder {
    /// Add a candidate config directory. The first call replaces the defaults.
    pub fn conf_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        if !self.custom_dirs {
            self.config.conf_dirs.clear();
            self.custom_dirs = true;
        }
        self.config.conf_dirs.push(dir.into());
        self
    }

    pub fn vzlist_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.vzlist_path = path.into();
        self
    }

    pub fn refresh_policy(mut self, policy: RefreshPolicy) -> Self {
        self.config.refresh_policy = policy;
        self
    }

    pub fn build(self) -> DriverConfig {
        self.config
    }

    pub fn build_validated(self) -> crate::Result<DriverConfig> {
        let config = self.build();
        config.validate()?;
        Ok(config)
    }
}
