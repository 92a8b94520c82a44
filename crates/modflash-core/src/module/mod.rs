//! Firmware module descriptors and the parsers that produce them
//!
//! The binary container format is handled outside this crate; parsers
//! implement [`ModuleParser`] and hand back [`FirmwareModule`]s.

mod manifest;
mod types;

pub use manifest::{payload_crc32, ManifestParser, ModuleParser};
pub use types::*;
