//! Error types for modflash-core
//!
//! `Error` is the taxonomy surfaced to the caller of a flash operation.
//! Collaborators (device handles, binary catalogs) report their own error
//! types, which are wrapped with the name of the step or module that failed.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::device::{DeviceError, DeviceMode};

/// Errors reported by a binary catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    /// No binaries or release mapping exist for the request
    #[error("no binaries for platform {platform_id} release {release}")]
    NotFound {
        /// Platform the binaries were requested for
        platform_id: u16,
        /// Release name (or module version) requested
        release: String,
    },

    /// The catalog could not be read
    #[error("catalog I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Catalog metadata is malformed
    #[error("catalog parse error: {0}")]
    Parse(String),
}

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// A module file or manifest could not be parsed
    #[error("failed to parse {}: {reason}", path.display())]
    Parse {
        /// File that failed to parse
        path: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// A module's stored checksum does not match its payload
    #[error("CRC check failed for module {module}")]
    CrcMismatch {
        /// Name of the offending module
        module: String,
    },

    /// A module's payload runs past the end of the address space
    #[error("module {module} does not fit at its start address")]
    OutOfRange {
        /// Name of the offending module
        module: String,
    },

    /// A module targets a different platform
    #[error("module {module} is built for platform {module_platform}, not {platform_name} ({platform_id})")]
    PlatformMismatch {
        /// Name of the offending module
        module: String,
        /// Platform id stored in the module
        module_platform: u16,
        /// Target platform id
        platform_id: u16,
        /// Target platform name
        platform_name: String,
    },

    /// No profile is known for the platform id
    #[error("unknown platform {0}")]
    UnknownPlatform(u16),

    /// A module that must be written in bulk mode has no start address
    #[error("module {module} has no start address for a bulk write")]
    MissingStartAddress {
        /// Name of the offending module
        module: String,
    },

    /// The device could not be reopened in the required mode
    #[error("failed to switch device to {mode} mode before {step}: {source}")]
    ModeSwitch {
        /// Mode that was requested
        mode: DeviceMode,
        /// Step that required the switch
        step: String,
        /// Underlying device failure
        #[source]
        source: DeviceError,
    },

    /// Writing a step failed
    #[error("failed to write {step}: {source}")]
    Write {
        /// Name of the step that failed
        step: String,
        /// Underlying device failure
        #[source]
        source: DeviceError,
    },

    /// Writing a step did not complete in time
    #[error("writing {step} timed out after {}s", timeout.as_secs())]
    WriteTimeout {
        /// Name of the step that timed out
        step: String,
        /// Timeout that elapsed
        timeout: Duration,
    },

    /// Binaries for an explicitly requested release could not be fetched
    #[error("failed to fetch base firmware {release}: {source}")]
    Catalog {
        /// Release that was requested
        release: String,
        /// Underlying catalog failure
        #[source]
        source: CatalogError,
    },

    /// Tool configuration could not be loaded
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Wrap a device failure that happened while writing `step`
    pub(crate) fn from_write(step: &str, timeout: Duration, source: DeviceError) -> Self {
        match source {
            DeviceError::Timeout => Error::WriteTimeout {
                step: step.to_string(),
                timeout,
            },
            source => Error::Write {
                step: step.to_string(),
                source,
            },
        }
    }
}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
