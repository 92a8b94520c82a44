//! Flash step planning
//!
//! Turns a dependency-ordered, filtered and validated module list into the
//! ordered sequence of device writes, assigning each write a transfer mode
//! and, for bulk writes, a target address.
//!
//! # Algorithm
//! 1. Partition modules into three buckets: assets, modules written through
//!    the update protocol (boot-loaders and externally stored slots), and
//!    modules written as addressed blocks (everything else)
//! 2. On platforms that relocated the user-application region, wipe the old
//!    region right before writing an application that needs base firmware
//!    new enough to no longer read it
//! 3. Concatenate the buckets, starting with whichever group the device's
//!    current mode can write without a mode switch; assets always go last
//!
//! Planning has no side effects: identical inputs give identical steps.

use crate::device::DeviceMode;
use crate::error::{Error, Result};
use crate::module::{FirmwareModule, ModuleType};
use crate::platform::{PlatformProfile, StorageClass};

/// Base-firmware version from which the legacy user-part region is no longer read
pub const LEGACY_INVALIDATION_MIN_VERSION: u32 = 3103;

/// Name of the synthetic step that wipes the legacy user-part region
pub const LEGACY_INVALIDATION_STEP: &str = "invalidate-legacy-user-part";

/// The erased value for flash memory (all bits set)
const ERASED_VALUE: u8 = 0xFF;

/// One device write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashStep {
    /// File name of the module, or a synthetic step name
    pub name: String,
    /// Bytes to write
    pub payload: Vec<u8>,
    /// Transfer mode the write needs
    pub mode: DeviceMode,
    /// Target address; always `Some` for bulk steps and `None` otherwise
    pub address: Option<u32>,
    /// Type of the originating module; `None` for synthetic steps
    pub module_type: Option<ModuleType>,
}

impl FlashStep {
    fn normal(module: FirmwareModule) -> Self {
        Self {
            name: module.name,
            payload: module.payload,
            mode: DeviceMode::Normal,
            address: None,
            module_type: Some(module.module_type),
        }
    }

    fn bulk(module: FirmwareModule) -> Result<Self> {
        let address = module.start_address.ok_or_else(|| Error::MissingStartAddress {
            module: module.name.clone(),
        })?;
        Ok(Self {
            name: module.name,
            payload: module.payload,
            mode: DeviceMode::Bulk,
            address: Some(address),
            module_type: Some(module.module_type),
        })
    }
}

/// Whether a module is written through the update protocol
fn writes_in_normal_mode(module: &FirmwareModule, platform: &PlatformProfile) -> bool {
    module.module_type == ModuleType::Bootloader
        || platform.slot(module.module_type, module.index).storage == StorageClass::ExternalNormal
}

/// Synthetic step wiping the legacy user-part region, if `module` needs one
fn legacy_invalidation(module: &FirmwareModule, platform: &PlatformProfile) -> Option<FlashStep> {
    if module.module_type != ModuleType::UserPart {
        return None;
    }
    let region = platform.legacy_user_part?;
    let required = module.required_system_version()?;
    if required < LEGACY_INVALIDATION_MIN_VERSION {
        return None;
    }

    log::debug!(
        "{} requires base firmware {}, wiping legacy region 0x{:08X} ({} bytes)",
        module.name,
        required,
        region.address,
        region.size
    );

    Some(FlashStep {
        name: LEGACY_INVALIDATION_STEP.to_string(),
        payload: vec![ERASED_VALUE; region.size as usize],
        mode: DeviceMode::Bulk,
        address: Some(region.address),
        module_type: None,
    })
}

/// Plan the device writes for `modules`
///
/// `modules` must already be filtered, dependency-sorted and validated.
/// Within each bucket the input order is preserved.
pub fn plan_steps(
    modules: Vec<FirmwareModule>,
    platform: &PlatformProfile,
    device_mode: DeviceMode,
) -> Result<Vec<FlashStep>> {
    let mut asset_steps = Vec::new();
    let mut normal_steps = Vec::new();
    let mut bulk_steps = Vec::new();

    for module in modules {
        if module.module_type == ModuleType::Asset {
            asset_steps.push(FlashStep::normal(module));
        } else if writes_in_normal_mode(&module, platform) {
            normal_steps.push(FlashStep::normal(module));
        } else {
            if let Some(step) = legacy_invalidation(&module, platform) {
                bulk_steps.push(step);
            }
            bulk_steps.push(FlashStep::bulk(module)?);
        }
    }

    // A device already in DFU may not come back up in normal mode until
    // its bulk modules are written.
    let mut steps = match device_mode {
        DeviceMode::Bulk => {
            bulk_steps.append(&mut normal_steps);
            bulk_steps
        }
        DeviceMode::Normal => {
            normal_steps.append(&mut bulk_steps);
            normal_steps
        }
    };
    steps.append(&mut asset_steps);

    for (i, step) in steps.iter().enumerate() {
        log::debug!(
            "Step {}: {} ({} bytes, {} mode{})",
            i + 1,
            step.name,
            step.payload.len(),
            step.mode,
            step.address
                .map(|a| format!(" @ 0x{:08X}", a))
                .unwrap_or_default()
        );
    }

    Ok(steps)
}
