//! Tool configuration
//!
//! Loaded from an optional TOML file; every key has a default:
//!
//! ```toml
//! settle_delay_ms = 2000
//! write_timeout_secs = 120
//! coprocessor_write_timeout_secs = 600
//! catalog_dir = "/home/user/.modflash/binaries"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::module::ModuleType;

/// Runtime settings for flash operations
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FlashConfig {
    /// Wait after a normal-mode write before reopening the device
    pub settle_delay_ms: u64,
    /// Per-write timeout for ordinary modules
    pub write_timeout_secs: u64,
    /// Per-write timeout for coprocessor and radio firmware
    pub coprocessor_write_timeout_secs: u64,
    /// Root of the local base-firmware binary cache
    pub catalog_dir: Option<PathBuf>,
}

impl Default for FlashConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 2000,
            write_timeout_secs: 120,
            coprocessor_write_timeout_secs: 600,
            catalog_dir: None,
        }
    }
}

impl FlashConfig {
    /// Load a configuration from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Parse a configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Timeout for writing a step that came from a module of `module_type`
    ///
    /// Coprocessor writes legitimately take minutes.
    pub fn write_timeout(&self, module_type: Option<ModuleType>) -> Duration {
        match module_type {
            Some(ModuleType::NcpFirmware | ModuleType::RadioStack) => {
                Duration::from_secs(self.coprocessor_write_timeout_secs)
            }
            _ => Duration::from_secs(self.write_timeout_secs),
        }
    }

    /// Catalog directory, falling back to `~/.modflash/binaries`
    pub fn catalog_dir(&self) -> PathBuf {
        if let Some(dir) = &self.catalog_dir {
            return dir.clone();
        }
        match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home).join(".modflash").join("binaries"),
            None => PathBuf::from("binaries"),
        }
    }
}
