//! In-memory collaborators shared by the unit tests

use std::time::Duration;

use crate::device::{DeviceError, DeviceHandle, DeviceMode, DeviceResult, TransferEvent};
use crate::progress::FlashProgress;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Reopen(DeviceMode),
    EnterUpdateState,
    WriteNormal(usize),
    WriteBulk(u32, usize),
    Reset,
    Close,
    Delay(u64),
}

/// Device that records every call and can be told to fail
pub(crate) struct RecordingDevice {
    pub mode: DeviceMode,
    pub version: Option<u32>,
    pub calls: Vec<Call>,
    pub erase_sector: usize,
    pub fail_reopen: Option<DeviceMode>,
    pub fail_write: Option<DeviceError>,
    pub fail_reset: bool,
    pub fail_update_state: bool,
}

impl RecordingDevice {
    pub fn new(mode: DeviceMode) -> Self {
        Self {
            mode,
            version: None,
            calls: Vec::new(),
            erase_sector: 4096,
            fail_reopen: None,
            fail_write: None,
            fail_reset: false,
            fail_update_state: false,
        }
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls.iter().filter(|c| *c == call).count()
    }

    pub fn writes(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::WriteNormal(_) | Call::WriteBulk(..)))
            .count()
    }
}

impl DeviceHandle for RecordingDevice {
    fn mode(&self) -> DeviceMode {
        self.mode
    }

    fn system_version(&mut self) -> DeviceResult<Option<u32>> {
        Ok(self.version)
    }

    fn reopen(&mut self, mode: DeviceMode) -> DeviceResult<()> {
        self.calls.push(Call::Reopen(mode));
        if self.fail_reopen == Some(mode) {
            return Err(DeviceError::Disconnected);
        }
        self.mode = mode;
        Ok(())
    }

    fn enter_update_state(&mut self) -> DeviceResult<()> {
        self.calls.push(Call::EnterUpdateState);
        if self.fail_update_state {
            return Err(DeviceError::Protocol("already listening".into()));
        }
        Ok(())
    }

    fn write_normal(
        &mut self,
        data: &[u8],
        _timeout: Duration,
        on_progress: &mut dyn FnMut(TransferEvent),
    ) -> DeviceResult<()> {
        self.calls.push(Call::WriteNormal(data.len()));
        if let Some(e) = self.fail_write.take() {
            return Err(e);
        }
        on_progress(TransferEvent::Downloaded(data.len()));
        Ok(())
    }

    fn write_bulk(
        &mut self,
        address: u32,
        data: &[u8],
        _timeout: Duration,
        on_progress: &mut dyn FnMut(TransferEvent),
    ) -> DeviceResult<()> {
        self.calls.push(Call::WriteBulk(address, data.len()));
        if let Some(e) = self.fail_write.take() {
            return Err(e);
        }
        for _ in 0..data.len().div_ceil(self.erase_sector) {
            on_progress(TransferEvent::Erased(self.erase_sector));
        }
        on_progress(TransferEvent::Written(data.len()));
        Ok(())
    }

    fn reset(&mut self) -> DeviceResult<()> {
        self.calls.push(Call::Reset);
        if self.fail_reset {
            return Err(DeviceError::Disconnected);
        }
        Ok(())
    }

    fn close(&mut self) {
        self.calls.push(Call::Close);
    }

    fn delay_ms(&mut self, ms: u64) {
        self.calls.push(Call::Delay(ms));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Event {
    SwitchMode(DeviceMode),
    FlashFile(String, usize, DeviceMode),
    Erased(usize),
    Downloaded(usize),
    Finish,
}

/// Progress sink that records every event
#[derive(Default)]
pub(crate) struct RecordingProgress {
    pub events: Vec<Event>,
}

impl FlashProgress for RecordingProgress {
    fn switch_mode(&mut self, mode: DeviceMode) {
        self.events.push(Event::SwitchMode(mode));
    }

    fn flash_file(&mut self, name: &str, bytes: usize, mode: DeviceMode) {
        self.events.push(Event::FlashFile(name.to_string(), bytes, mode));
    }

    fn erased(&mut self, bytes: usize) {
        self.events.push(Event::Erased(bytes));
    }

    fn downloaded(&mut self, bytes: usize) {
        self.events.push(Event::Downloaded(bytes));
    }

    fn finish(&mut self) {
        self.events.push(Event::Finish);
    }
}
