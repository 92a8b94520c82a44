//! Plan command implementation

use modflash_core::{BinaryCatalog, DeviceMode, FirmwareModule, Flasher};

/// Run the plan command: print the steps a flash would perform
pub fn run_plan<C: BinaryCatalog>(
    flasher: &mut Flasher<C>,
    modules: Vec<FirmwareModule>,
    mode: DeviceMode,
    installed: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let steps = flasher.prepare(modules, mode, installed)?;

    println!(
        "Plan for {} ({}), device in {} mode:",
        flasher.platform().name,
        flasher.platform().id,
        mode
    );
    println!();
    println!("{:>3}  {:<32} {:<6} {:>12} {:>10}", "#", "Step", "Mode", "Address", "Size");
    println!("{}", "-".repeat(68));

    for (i, step) in steps.iter().enumerate() {
        let address = step
            .address
            .map(|a| format!("0x{:08X}", a))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>3}  {:<32} {:<6} {:>12} {:>10}",
            i + 1,
            step.name,
            step.mode.as_str(),
            address,
            super::format_size(step.payload.len() as u64)
        );
    }

    if steps.is_empty() {
        println!("Nothing to flash");
    }
    Ok(())
}
