//! Flash command implementation

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use modflash_core::{
    BinaryCatalog, DeviceHandle, DeviceMode, FirmwareModule, FlashProgress, Flasher,
};
use std::time::Duration;

/// Progress reporter using indicatif progress bars
///
/// One bar per step; erase progress shows as a message on a spinner until
/// the first written bytes arrive. Mode switches get their own spinner.
struct IndicatifProgress {
    multi: MultiProgress,
    current_bar: Option<ProgressBar>,
    /// Shown when the current bar finishes
    done_message: String,
    step: String,
    total: u64,
    erased: u64,
    written: u64,
    erasing: bool,
}

impl IndicatifProgress {
    fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            current_bar: None,
            done_message: String::new(),
            step: String::new(),
            total: 0,
            erased: 0,
            written: 0,
            erasing: false,
        }
    }

    fn create_bar(&mut self, total: u64, phase: &str, done: String) {
        let pb = self.multi.add(ProgressBar::new(total));
        pb.set_style(
            ProgressStyle::default_bar()
                .template(&format!(
                    "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} ({{bytes_per_sec}}, {{eta}}) {}",
                    phase
                ))
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        self.current_bar = Some(pb);
        self.done_message = done;
    }

    fn create_spinner(&mut self, message: String, done: String) {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(100));
        self.current_bar = Some(pb);
        self.done_message = done;
    }

    fn finish_bar(&mut self) {
        if let Some(pb) = self.current_bar.take() {
            pb.finish_with_message(std::mem::take(&mut self.done_message));
        }
    }
}

impl FlashProgress for IndicatifProgress {
    fn switch_mode(&mut self, mode: DeviceMode) {
        self.finish_bar();
        self.create_spinner(
            format!("Switching device to {} mode...", mode),
            format!("Device in {} mode", mode),
        );
    }

    fn flash_file(&mut self, name: &str, bytes: usize, mode: DeviceMode) {
        self.finish_bar();
        self.step = name.to_string();
        self.total = bytes as u64;
        self.erased = 0;
        self.written = 0;
        self.erasing = mode == DeviceMode::Bulk;
        match mode {
            DeviceMode::Bulk => self.create_spinner(
                format!("Erasing for {}...", name),
                format!("{} erased", name),
            ),
            DeviceMode::Normal => {
                self.create_bar(self.total, &format!("Flashing {}", name), format!("{} done", name))
            }
        }
    }

    fn erased(&mut self, bytes: usize) {
        self.erased += bytes as u64;
        if let Some(pb) = &self.current_bar {
            pb.set_message(format!(
                "Erasing for {}: {}/{} bytes",
                self.step, self.erased, self.total
            ));
        }
    }

    fn downloaded(&mut self, bytes: usize) {
        if self.erasing {
            // First written bytes of a bulk step replace the erase spinner
            self.erasing = false;
            self.done_message = format!("Erased {} bytes", self.erased);
            self.finish_bar();
            let phase = format!("Writing {}", self.step);
            let done = format!("{} done", self.step);
            self.create_bar(self.total, &phase, done);
        }
        self.written += bytes as u64;
        if let Some(pb) = &self.current_bar {
            pb.set_position(self.written);
        }
    }

    fn finish(&mut self) {
        self.finish_bar();
        println!("Flash success!");
    }
}

/// Run the flash command
pub fn run_flash<C, D>(
    flasher: &mut Flasher<C>,
    device: &mut D,
    modules: Vec<FirmwareModule>,
) -> Result<(), Box<dyn std::error::Error>>
where
    C: BinaryCatalog,
    D: DeviceHandle + ?Sized,
{
    println!(
        "Flashing {} module(s) to {} ({})",
        modules.len(),
        flasher.platform().name,
        flasher.platform().id
    );

    let mut progress = IndicatifProgress::new();
    flasher.flash(device, modules, &mut progress)?;
    Ok(())
}
