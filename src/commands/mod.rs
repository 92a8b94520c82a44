//! CLI command implementations
//!
//! `flash` and `plan` share the whole preparation pipeline through
//! `modflash_core::Flasher`; `plan` stops before touching a device.

mod flash;
mod inspect;
mod list;
mod plan;

pub use flash::run_flash;
pub use inspect::run_inspect;
pub use list::{list_devices, list_platforms};
pub use plan::run_plan;

fn format_size(bytes: u64) -> String {
    if bytes >= 1024 * 1024 {
        format!("{} MiB", bytes / (1024 * 1024))
    } else if bytes >= 1024 {
        format!("{} KiB", bytes / 1024)
    } else {
        format!("{} B", bytes)
    }
}
