//! modflash-core - Core library for multi-module firmware flashing
//!
//! This crate turns a set of firmware modules (boot-loader, base firmware,
//! application, coprocessor firmware, assets, ...) into an ordered sequence
//! of device writes and performs them, switching the device between its
//! normal update protocol and its boot-loader (DFU) block protocol as
//! needed.
//!
//! The device, the binary catalog and the dependency sorter are
//! collaborators behind traits, so the whole pipeline can run against
//! in-memory implementations.
//!
//! # Example
//!
//! ```ignore
//! use modflash_core::{DirectoryCatalog, Flasher, ManifestParser, ModuleParser, NoProgress};
//!
//! fn flash<D: modflash_core::DeviceHandle>(db: &modflash_core::PlatformDatabase, device: &mut D) {
//!     let modules = ManifestParser.parse("bundle/manifest.ron".as_ref()).unwrap();
//!     let mut flasher = Flasher::from_database(db, 12, DirectoryCatalog::new("binaries")).unwrap();
//!     match flasher.flash(device, modules, &mut NoProgress) {
//!         Ok(()) => println!("Flash complete"),
//!         Err(e) => println!("Flash failed: {}", e),
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod catalog;
pub mod config;
pub mod device;
pub mod error;
pub mod execute;
pub mod filter;
pub mod flasher;
pub mod module;
pub mod plan;
pub mod platform;
pub mod progress;
pub mod resolve;
pub mod sort;
pub mod validate;

#[cfg(test)]
mod test_support;

pub use catalog::{BinaryCatalog, DirectoryCatalog};
pub use config::FlashConfig;
pub use device::{DeviceError, DeviceHandle, DeviceMode, DeviceResult, TransferEvent};
pub use error::{CatalogError, Error, Result};
pub use flasher::{FlashOptions, Flasher};
pub use module::{FirmwareModule, ManifestParser, ModuleParser, ModuleType};
pub use plan::FlashStep;
pub use platform::{PlatformDatabase, PlatformProfile};
pub use progress::{FlashProgress, NoProgress};
