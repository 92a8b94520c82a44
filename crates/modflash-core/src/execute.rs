//! Step execution
//!
//! Walks the planned steps in order, switching the device between its two
//! transfer modes at step boundaries. Whatever happens, the device is reset
//! (unless suppressed) and closed exactly once before returning.

use crate::config::FlashConfig;
use crate::device::{DeviceHandle, DeviceMode, TransferEvent};
use crate::error::{Error, Result};
use crate::plan::FlashStep;
use crate::progress::FlashProgress;

/// Forwards device progress for one step, capping erase at the payload size
struct StepProgress<'a, P: ?Sized> {
    progress: &'a mut P,
    total: usize,
    erased: usize,
}

impl<'a, P: FlashProgress + ?Sized> StepProgress<'a, P> {
    fn new(progress: &'a mut P, total: usize) -> Self {
        Self {
            progress,
            total,
            erased: 0,
        }
    }

    fn on_event(&mut self, event: TransferEvent) {
        match event {
            TransferEvent::Erased(bytes) => {
                // Sector-granular erase can run past the payload
                let bytes = bytes.min(self.total - self.erased);
                if bytes > 0 {
                    self.erased += bytes;
                    self.progress.erased(bytes);
                }
            }
            TransferEvent::Written(bytes) | TransferEvent::Downloaded(bytes) => {
                self.progress.downloaded(bytes);
            }
        }
    }
}

/// Reopen the device in `mode` ahead of `step`
fn switch_mode<D, P>(device: &mut D, mode: DeviceMode, step: &str, progress: &mut P) -> Result<()>
where
    D: DeviceHandle + ?Sized,
    P: FlashProgress + ?Sized,
{
    log::info!("Switching device to {} mode", mode);
    progress.switch_mode(mode);
    device.reopen(mode).map_err(|source| Error::ModeSwitch {
        mode,
        step: step.to_string(),
        source,
    })?;

    if mode == DeviceMode::Normal {
        if let Err(e) = device.enter_update_state() {
            log::warn!("Could not enter pre-update state, continuing: {}", e);
        }
    }
    Ok(())
}

fn write_step<D, P>(
    device: &mut D,
    step: &FlashStep,
    config: &FlashConfig,
    progress: &mut P,
) -> Result<()>
where
    D: DeviceHandle + ?Sized,
    P: FlashProgress + ?Sized,
{
    let timeout = config.write_timeout(step.module_type);
    progress.flash_file(&step.name, step.payload.len(), step.mode);

    let mut tracker = StepProgress::new(progress, step.payload.len());
    match step.mode {
        DeviceMode::Normal => {
            log::info!("Writing {} ({} bytes)", step.name, step.payload.len());
            device
                .write_normal(&step.payload, timeout, &mut |event| tracker.on_event(event))
                .map_err(|e| Error::from_write(&step.name, timeout, e))?;

            log::trace!("Waiting {} ms for the firmware to apply", config.settle_delay_ms);
            device.delay_ms(config.settle_delay_ms);
            device
                .reopen(DeviceMode::Normal)
                .map_err(|source| Error::ModeSwitch {
                    mode: DeviceMode::Normal,
                    step: step.name.clone(),
                    source,
                })?;
        }
        DeviceMode::Bulk => {
            let address = step.address.ok_or_else(|| Error::MissingStartAddress {
                module: step.name.clone(),
            })?;
            log::info!(
                "Writing {} ({} bytes) at 0x{:08X}",
                step.name,
                step.payload.len(),
                address
            );
            device
                .write_bulk(address, &step.payload, timeout, &mut |event| {
                    tracker.on_event(event)
                })
                .map_err(|e| Error::from_write(&step.name, timeout, e))?;
        }
    }
    Ok(())
}

fn run_steps<D, P>(
    device: &mut D,
    steps: &[FlashStep],
    config: &FlashConfig,
    progress: &mut P,
) -> Result<()>
where
    D: DeviceHandle + ?Sized,
    P: FlashProgress + ?Sized,
{
    let mut mode = device.mode();
    for step in steps {
        if step.mode != mode {
            switch_mode(device, step.mode, &step.name, progress)?;
            mode = step.mode;
        }
        write_step(device, step, config, progress)?;
    }
    progress.finish();
    Ok(())
}

/// Write `steps` to `device` in order
///
/// The first failing step aborts the rest. Cleanup always runs afterwards:
/// the device is reset unless `no_reset` is set (a failed reset is only
/// logged) and then closed.
pub fn execute_steps<D, P>(
    device: &mut D,
    steps: &[FlashStep],
    config: &FlashConfig,
    no_reset: bool,
    progress: &mut P,
) -> Result<()>
where
    D: DeviceHandle + ?Sized,
    P: FlashProgress + ?Sized,
{
    let result = run_steps(device, steps, config, progress);
    if let Err(e) = &result {
        log::error!("Flashing aborted: {}", e);
    }

    if !no_reset {
        if let Err(e) = device.reset() {
            log::warn!("Device reset failed: {}", e);
        }
    }
    device.close();

    result
}
