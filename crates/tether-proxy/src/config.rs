//! Proxy configuration (tether.toml)
//!
//! ```toml
//! [proxy]
//! lookup = "auto"            # auto | modern | legacy
//! check_argument_types = true
//! initial_cache_capacity = 16
//! ```

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tether_sdk::ResolutionError;
use thiserror::Error;

use crate::handle_table::PrivilegedHandleTable;
use crate::lookup::{LookupPreference, RuntimeCapabilities};

/// Largest accepted `initial_cache_capacity`
pub const MAX_INITIAL_CACHE_CAPACITY: usize = 1 << 16;

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Validation error
    #[error("Invalid config: {0}")]
    ValidationError(String),
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProxyConfig {
    /// Proxy settings
    #[serde(default)]
    pub proxy: ProxySettings,
}

/// `[proxy]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProxySettings {
    /// Which lookup mechanism the handle table must use
    #[serde(default)]
    pub lookup: LookupPreference,

    /// Check argument and return types on built-in body calls
    #[serde(default = "default_check_argument_types")]
    pub check_argument_types: bool,

    /// Initial method cache capacity per factory
    #[serde(default = "default_initial_cache_capacity")]
    pub initial_cache_capacity: usize,
}

fn default_check_argument_types() -> bool {
    true
}

fn default_initial_cache_capacity() -> usize {
    16
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            lookup: LookupPreference::default(),
            check_argument_types: default_check_argument_types(),
            initial_cache_capacity: default_initial_cache_capacity(),
        }
    }
}

impl ProxyConfig {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: ProxyConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.proxy.initial_cache_capacity > MAX_INITIAL_CACHE_CAPACITY {
            return Err(ConfigError::ValidationError(format!(
                "initial_cache_capacity {} exceeds {}",
                self.proxy.initial_cache_capacity, MAX_INITIAL_CACHE_CAPACITY
            )));
        }
        Ok(())
    }

    /// Initialize the process-wide handle table on this host with the
    /// configured lookup preference
    pub fn handle_table(&self) -> Result<Arc<PrivilegedHandleTable>, ResolutionError> {
        PrivilegedHandleTable::install(&RuntimeCapabilities::host(), self.proxy.lookup)
    }
}
