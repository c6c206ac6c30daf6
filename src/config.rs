//! Runtime configuration
//!
//! Tunables for the network client, the file loader and the macro expander.
//! Loaded from YAML; every field has a default so an empty document is valid.
//!
//! ```yaml
//! tcp:
//!   timeout_secs: 100
//!   max_tries: 10
//!   retry_delay_ms: 1000
//!   max_reply_bytes: 4096
//! loader:
//!   cool_down_pause_ms: 300
//! expand:
//!   max_depth: 100
//! default_flags: "fold_fix"
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

use crate::flags::DictFlags;

/// Environment variable naming a YAML config file
pub const CONFIG_ENV: &str = "DICT_CONFIG";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DictConfig {
    pub tcp: TcpSettings,
    pub loader: LoaderSettings,
    pub expand: ExpandSettings,
    /// Flag names OR-ed into every table opened through the registry
    pub default_flags: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TcpSettings {
    /// Connect, read and write timeout
    pub timeout_secs: u64,
    /// Attempts per lookup before reporting a retry error
    pub max_tries: u32,
    /// Pause between attempts
    pub retry_delay_ms: u64,
    /// Maximal reply size including the terminating newline
    pub max_reply_bytes: usize,
}

impl Default for TcpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 100,
            max_tries: 10,
            retry_delay_ms: 1000,
            max_reply_bytes: 4096,
        }
    }
}

impl TcpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoaderSettings {
    /// Pause before re-reading a file that was modified during the read
    pub cool_down_pause_ms: u64,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            cool_down_pause_ms: 300,
        }
    }
}

impl LoaderSettings {
    pub fn cool_down_pause(&self) -> Duration {
        Duration::from_millis(self.cool_down_pause_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExpandSettings {
    /// Maximal recursion depth for recursive macro expansion
    pub max_depth: usize,
}

impl Default for ExpandSettings {
    fn default() -> Self {
        Self { max_depth: 100 }
    }
}

impl DictConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: DictConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config
            .flags()
            .with_context(|| format!("Invalid default_flags in {}", path.display()))?;
        info!("Loaded table configuration from {}", path.display());
        Ok(config)
    }

    /// Load from the file named by `DICT_CONFIG`, or fall back to defaults
    pub fn from_env() -> Result<Self> {
        match std::env::var(CONFIG_ENV) {
            Ok(path) if !path.is_empty() => Self::from_file(path),
            _ => Ok(Self::default()),
        }
    }

    /// Parsed `default_flags`
    pub fn flags(&self) -> Result<DictFlags> {
        Ok(DictFlags::parse_names(&self.default_flags)?)
    }
}
