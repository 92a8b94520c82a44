//! Inspect command implementation

use modflash_core::{FirmwareModule, ModuleParser};
use std::path::PathBuf;

fn check(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "FAIL"
    }
}

fn print_module(module: &FirmwareModule) {
    println!("{}", module.name);
    println!("  Type:          {} {}", module.module_type, module.index);
    println!("  Version:       {}", module.version);
    println!("  Platform:      {}", module.platform_id);
    println!("  Size:          {}", super::format_size(module.payload.len() as u64));
    if let Some(address) = module.start_address {
        println!("  Address:       0x{:08X}", address);
    }
    for dep in &module.dependencies {
        println!(
            "  Depends on:    {} {} >= {}",
            dep.module_type, dep.index, dep.version
        );
    }
    println!(
        "  Checks:        integrity {}, range {}, platform {}, dependencies {}",
        check(module.integrity_ok()),
        check(module.range_ok()),
        check(module.platform_ok()),
        check(module.dependency_ok())
    );
}

/// Run the inspect command
pub fn run_inspect<P: ModuleParser>(
    parser: &P,
    manifests: &[PathBuf],
) -> Result<(), Box<dyn std::error::Error>> {
    for path in manifests {
        let modules = parser.parse(path)?;
        println!("{}: {} module(s)", path.display(), modules.len());
        println!();
        for module in &modules {
            print_module(module);
            println!();
        }
    }
    Ok(())
}
