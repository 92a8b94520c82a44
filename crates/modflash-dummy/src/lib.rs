//! modflash-dummy - Simulated two-mode device for testing
//!
//! This crate provides a dummy device that behaves like a real target from
//! the flasher's point of view: it is either running firmware (normal mode,
//! accepting whole modules through the update protocol) or sitting in its
//! boot-loader (DFU mode, accepting addressed block writes into flash).
//! Flash is emulated in memory with sector-granular erase, and faults can
//! be injected at every step.

use std::collections::BTreeMap;
use std::time::Duration;

use modflash_core::device::{DeviceError, DeviceHandle, DeviceMode, DeviceResult, TransferEvent};

/// Value of erased flash
const ERASED: u8 = 0xFF;

/// Configuration for the dummy device
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Mode the device starts in
    pub mode: DeviceMode,
    /// Installed base-firmware version reported to the flasher
    pub system_version: Option<u32>,
    /// Smallest erase unit in DFU mode
    pub sector_size: usize,
    /// Transfer size used for progress increments
    pub chunk_size: usize,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            mode: DeviceMode::Normal,
            system_version: Some(3103),
            sector_size: 4096,
            chunk_size: 1024,
        }
    }
}

/// Failures the dummy device can be told to produce
#[derive(Debug, Clone, Default)]
pub struct Faults {
    /// Refuse to reopen into this mode
    pub reopen: Option<DeviceMode>,
    /// Fail the N-th write (1-based, counting both modes)
    pub write_failure: Option<usize>,
    /// Time out the N-th write (1-based, counting both modes)
    pub write_timeout: Option<usize>,
    /// Fail every reset
    pub reset: bool,
    /// Refuse to enter the pre-update state
    pub update_state: bool,
}

/// Dummy device
///
/// Flash is stored sparsely, one buffer per touched sector; untouched
/// memory reads back as erased.
pub struct DummyDevice {
    config: DummyConfig,
    faults: Faults,
    mode: DeviceMode,
    open: bool,
    sectors: BTreeMap<u32, Vec<u8>>,
    normal_writes: Vec<Vec<u8>>,
    writes: usize,
    mode_switches: Vec<DeviceMode>,
    resets: usize,
    closes: usize,
    delayed_ms: u64,
}

impl DummyDevice {
    /// Create a new dummy device with the given configuration
    pub fn new(config: DummyConfig) -> Self {
        Self {
            mode: config.mode,
            config,
            faults: Faults::default(),
            open: true,
            sectors: BTreeMap::new(),
            normal_writes: Vec::new(),
            writes: 0,
            mode_switches: Vec::new(),
            resets: 0,
            closes: 0,
            delayed_ms: 0,
        }
    }

    /// Create a new dummy device with default configuration
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Inject faults
    pub fn with_faults(mut self, faults: Faults) -> Self {
        self.faults = faults;
        self
    }

    /// Pre-fill flash at `address`, as if written by an earlier update
    pub fn with_memory(mut self, address: u32, data: &[u8]) -> Self {
        for (offset, &byte) in data.iter().enumerate() {
            *self.byte_mut(address + offset as u32) = byte;
        }
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// Read `len` bytes of flash at `address`
    pub fn read(&self, address: u32, len: usize) -> Vec<u8> {
        (0..len)
            .map(|offset| self.byte(address + offset as u32))
            .collect()
    }

    /// Modules received through the update protocol, in order
    pub fn normal_writes(&self) -> &[Vec<u8>] {
        &self.normal_writes
    }

    /// Modes the device was reopened into, in order
    pub fn mode_switches(&self) -> &[DeviceMode] {
        &self.mode_switches
    }

    /// Number of reset requests
    pub fn reset_count(&self) -> usize {
        self.resets
    }

    /// Number of `close()` calls
    pub fn close_count(&self) -> usize {
        self.closes
    }

    /// Total time spent in `delay_ms`
    pub fn delayed_ms(&self) -> u64 {
        self.delayed_ms
    }

    fn sector_base(&self, address: u32) -> u32 {
        address - address % self.config.sector_size as u32
    }

    fn byte(&self, address: u32) -> u8 {
        let base = self.sector_base(address);
        self.sectors
            .get(&base)
            .map_or(ERASED, |sector| sector[(address - base) as usize])
    }

    fn byte_mut(&mut self, address: u32) -> &mut u8 {
        let base = self.sector_base(address);
        let size = self.config.sector_size;
        let sector = self.sectors.entry(base).or_insert_with(|| vec![ERASED; size]);
        &mut sector[(address - base) as usize]
    }

    fn ensure_open(&self) -> DeviceResult<()> {
        if self.open {
            Ok(())
        } else {
            Err(DeviceError::Disconnected)
        }
    }

    /// Count a write and apply any injected write fault
    fn begin_write(&mut self, timeout: Duration) -> DeviceResult<()> {
        self.ensure_open()?;
        self.writes += 1;
        if self.faults.write_timeout == Some(self.writes) {
            log::debug!("dummy: write {} timing out after {:?}", self.writes, timeout);
            return Err(DeviceError::Timeout);
        }
        if self.faults.write_failure == Some(self.writes) {
            return Err(DeviceError::Io(format!("write {} failed", self.writes)));
        }
        Ok(())
    }
}

impl DeviceHandle for DummyDevice {
    fn mode(&self) -> DeviceMode {
        self.mode
    }

    fn system_version(&mut self) -> DeviceResult<Option<u32>> {
        self.ensure_open()?;
        Ok(self.config.system_version)
    }

    fn reopen(&mut self, mode: DeviceMode) -> DeviceResult<()> {
        self.ensure_open()?;
        self.mode_switches.push(mode);
        if self.faults.reopen == Some(mode) {
            return Err(DeviceError::Disconnected);
        }
        log::debug!("dummy: reopened in {} mode", mode);
        self.mode = mode;
        Ok(())
    }

    fn enter_update_state(&mut self) -> DeviceResult<()> {
        self.ensure_open()?;
        if self.mode != DeviceMode::Normal {
            return Err(DeviceError::Unsupported("pre-update state needs normal mode"));
        }
        if self.faults.update_state {
            return Err(DeviceError::Protocol("request rejected".into()));
        }
        Ok(())
    }

    fn write_normal(
        &mut self,
        data: &[u8],
        timeout: Duration,
        on_progress: &mut dyn FnMut(TransferEvent),
    ) -> DeviceResult<()> {
        if self.mode != DeviceMode::Normal {
            return Err(DeviceError::Unsupported("update protocol needs normal mode"));
        }
        self.begin_write(timeout)?;

        for chunk in data.chunks(self.config.chunk_size) {
            on_progress(TransferEvent::Downloaded(chunk.len()));
        }
        self.normal_writes.push(data.to_vec());
        Ok(())
    }

    fn write_bulk(
        &mut self,
        address: u32,
        data: &[u8],
        timeout: Duration,
        on_progress: &mut dyn FnMut(TransferEvent),
    ) -> DeviceResult<()> {
        if self.mode != DeviceMode::Bulk {
            return Err(DeviceError::Unsupported("block writes need DFU mode"));
        }
        if u32::try_from(data.len())
            .ok()
            .and_then(|len| address.checked_add(len))
            .is_none()
        {
            return Err(DeviceError::Protocol(format!(
                "write of {} bytes at 0x{:08X} is out of range",
                data.len(),
                address
            )));
        }
        self.begin_write(timeout)?;

        // Erase every sector the write touches, whole sectors at a time
        let sector_size = self.config.sector_size;
        let end = address as usize + data.len();
        let mut base = self.sector_base(address) as usize;
        while base < end {
            self.sectors.insert(base as u32, vec![ERASED; sector_size]);
            on_progress(TransferEvent::Erased(sector_size));
            base += sector_size;
        }

        // Programming can only clear bits
        for (i, chunk) in data.chunks(self.config.chunk_size).enumerate() {
            let chunk_address = address + (i * self.config.chunk_size) as u32;
            for (offset, &byte) in chunk.iter().enumerate() {
                *self.byte_mut(chunk_address + offset as u32) &= byte;
            }
            on_progress(TransferEvent::Written(chunk.len()));
        }

        log::trace!("dummy: wrote {} bytes at 0x{:08X}", data.len(), address);
        Ok(())
    }

    fn reset(&mut self) -> DeviceResult<()> {
        self.ensure_open()?;
        self.resets += 1;
        if self.faults.reset {
            return Err(DeviceError::Disconnected);
        }
        Ok(())
    }

    fn close(&mut self) {
        self.closes += 1;
        self.open = false;
    }

    fn delay_ms(&mut self, ms: u64) {
        self.delayed_ms += ms;
    }
}
