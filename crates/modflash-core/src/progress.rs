//! Progress reporting for flash operations
//!
//! The executor emits events through this trait and never renders anything
//! itself. The CLI implements it with progress bars; tests record the
//! events.

use crate::device::DeviceMode;

/// Progress callbacks for a flash operation
pub trait FlashProgress {
    /// The device is about to be reopened in another mode
    fn switch_mode(&mut self, mode: DeviceMode);

    /// A step is about to be written
    fn flash_file(&mut self, name: &str, bytes: usize, mode: DeviceMode);

    /// Bytes erased since the previous call, never more than the step's payload in total
    fn erased(&mut self, bytes: usize);

    /// Bytes written since the previous call
    fn downloaded(&mut self, bytes: usize);

    /// Every step has been written
    fn finish(&mut self);
}

/// A no-op progress reporter
pub struct NoProgress;

impl FlashProgress for NoProgress {
    fn switch_mode(&mut self, _mode: DeviceMode) {}
    fn flash_file(&mut self, _name: &str, _bytes: usize, _mode: DeviceMode) {}
    fn erased(&mut self, _bytes: usize) {}
    fn downloaded(&mut self, _bytes: usize) {}
    fn finish(&mut self) {}
}
