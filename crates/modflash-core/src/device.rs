//! Device handle abstraction
//!
//! A device accepts firmware through one of two mutually exclusive transfer
//! modes. The handle is the only shared mutable resource in a flash
//! operation; the executor owns it for the whole operation and closes it
//! exactly once.

use core::fmt;
use std::time::Duration;

use thiserror::Error;

/// Transfer mode a device is currently in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceMode {
    /// Application firmware is running and accepts the update protocol
    Normal,
    /// The boot-loader is active and accepts addressed block writes (DFU)
    Bulk,
}

impl DeviceMode {
    /// Name used in progress events and logs
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Bulk => "dfu",
        }
    }
}

impl fmt::Display for DeviceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors reported by a device handle
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// The operation did not complete in time
    #[error("operation timed out")]
    Timeout,

    /// The device went away
    #[error("device disconnected")]
    Disconnected,

    /// The device cannot perform the operation in its current state
    #[error("not supported: {0}")]
    Unsupported(&'static str),

    /// Transport-level failure
    #[error("I/O error: {0}")]
    Io(String),

    /// The device rejected a request
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Result type for device operations
pub type DeviceResult<T> = core::result::Result<T, DeviceError>;

/// Progress increment reported by a device while writing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEvent {
    /// Bytes erased since the previous event (bulk mode, sector granular)
    Erased(usize),
    /// Bytes written since the previous event (bulk mode)
    Written(usize),
    /// Bytes accepted by the update protocol since the previous event (normal mode)
    Downloaded(usize),
}

/// A connected device that firmware can be written to
///
/// Implementations wrap the real USB/serial transport. Every operation may
/// fail; callers decide which failures are tolerated.
pub trait DeviceHandle {
    /// Mode the device is currently in
    fn mode(&self) -> DeviceMode;

    /// Installed base-firmware version, if the device can report it
    fn system_version(&mut self) -> DeviceResult<Option<u32>>;

    /// Reset and reconnect the device in the given mode
    fn reopen(&mut self, mode: DeviceMode) -> DeviceResult<()>;

    /// Ask the running firmware to stop its cloud connection before an update
    fn enter_update_state(&mut self) -> DeviceResult<()>;

    /// Write a module through the update protocol
    fn write_normal(
        &mut self,
        data: &[u8],
        timeout: Duration,
        on_progress: &mut dyn FnMut(TransferEvent),
    ) -> DeviceResult<()>;

    /// Write a block image at an address through the boot-loader protocol
    fn write_bulk(
        &mut self,
        address: u32,
        data: &[u8],
        timeout: Duration,
        on_progress: &mut dyn FnMut(TransferEvent),
    ) -> DeviceResult<()>;

    /// Reset the device
    fn reset(&mut self) -> DeviceResult<()>;

    /// Release the connection
    fn close(&mut self);

    /// Wait for the given number of milliseconds
    fn delay_ms(&mut self, ms: u64);
}
