//! Configuration sources.
//!
//! - [`JsonConfigFile`] — a JSON document on a filesystem (host simulator;
//!   on target, any mounted VFS).  A missing file yields defaults.
//! - [`DefaultConfig`] — compiled-in defaults.
//!
//! Every loaded config is range-checked with [`SystemConfig::validate`]
//! before it is handed to the control loop.

use std::io::ErrorKind;
use std::path::PathBuf;

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::SystemConfig;
use crate::error::{self, Error};

/// Environment variable naming the host config file.
pub const CONFIG_ENV: &str = "FANBRIDGE_CONFIG";

/// Compiled-in defaults.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultConfig;

impl ConfigPort for DefaultConfig {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        Ok(SystemConfig::default())
    }
}

/// JSON file on disk.
#[derive(Debug, Clone)]
pub struct JsonConfigFile {
    path: PathBuf,
}

impl JsonConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// File named by `FANBRIDGE_CONFIG`, if set.
    pub fn from_env() -> Option<Self> {
        std::env::var_os(CONFIG_ENV).map(Self::new)
    }

    /// Parse and validate a JSON document.  Missing fields take defaults.
    pub fn parse(text: &str) -> Result<SystemConfig, ConfigError> {
        let cfg: SystemConfig = serde_json::from_str(text).map_err(|e| {
            warn!("config: parse error: {}", e);
            ConfigError::Corrupted
        })?;
        cfg.validate().map_err(ConfigError::ValidationFailed)?;
        Ok(cfg)
    }
}

impl ConfigPort for JsonConfigFile {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => {
                let cfg = Self::parse(&text)?;
                info!("config: loaded {}", self.path.display());
                Ok(cfg)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("config: {} not found, using defaults", self.path.display());
                Ok(SystemConfig::default())
            }
            Err(e) => {
                warn!("config: cannot read {}: {}", self.path.display(), e);
                Err(ConfigError::IoError)
            }
        }
    }
}

/// Load through `port`, falling back to defaults on any failure.
pub fn load_or_default(port: &dyn ConfigPort) -> SystemConfig {
    match load_validated(port) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("{}, using defaults", e);
            SystemConfig::default()
        }
    }
}

/// Load from `port` and reject anything [`SystemConfig::validate`] refuses.
pub fn load_validated(port: &dyn ConfigPort) -> error::Result<SystemConfig> {
    let cfg = port.load()?;
    cfg.validate().map_err(Error::Config)?;
    Ok(cfg)
}
