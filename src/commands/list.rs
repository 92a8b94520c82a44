//! List commands implementation

use crate::devices;
use modflash_core::platform::StorageClass;
use modflash_core::PlatformDatabase;

/// List all available device backends
pub fn list_devices() {
    let devices = devices::available_devices();
    if devices.is_empty() {
        println!("No device backends available (recompile with device features enabled)");
        return;
    }

    println!("Supported devices:");
    println!();
    for d in &devices {
        let aliases = if d.aliases.is_empty() {
            String::new()
        } else {
            format!(" (aliases: {})", d.aliases.join(", "))
        };
        println!("  {:<10}- {}{}", d.name, d.description, aliases);
    }
}

/// List all known platforms
pub fn list_platforms(db: &PlatformDatabase) {
    if db.is_empty() {
        println!("No platforms loaded (see --platform-db)");
        return;
    }

    println!("Known platforms:");
    println!();
    println!(
        "{:>5}  {:<12} {:>8} {:>9}  {}",
        "ID", "Name", "External", "Encrypted", "Legacy region"
    );
    println!("{}", "-".repeat(64));

    for platform in db.platforms() {
        let external = platform
            .slots
            .values()
            .filter(|s| s.storage == StorageClass::ExternalNormal)
            .count();
        let encrypted = platform.slots.values().filter(|s| s.encrypted).count();
        let legacy = platform
            .legacy_user_part
            .map(|r| {
                format!(
                    "0x{:08X} ({})",
                    r.address,
                    super::format_size(u64::from(r.size))
                )
            })
            .unwrap_or_else(|| "-".to_string());

        println!(
            "{:>5}  {:<12} {:>8} {:>9}  {}",
            platform.id, platform.name, external, encrypted, legacy
        );
    }
}
