//! Module validation, run to completion before any device I/O

use crate::error::{Error, Result};
use crate::module::{FirmwareModule, ModuleType};
use crate::platform::PlatformProfile;

/// Check every module; returns the first failure in list order
///
/// Each module is checked for integrity, then range, then platform.
/// Assets are platform-agnostic and exempt from the platform check.
pub fn validate_modules(modules: &[FirmwareModule], platform: &PlatformProfile) -> Result<()> {
    for module in modules {
        if !module.integrity_ok() {
            log::error!("{}: CRC check failed", module.name);
            return Err(Error::CrcMismatch {
                module: module.name.clone(),
            });
        }

        if !module.range_ok() {
            log::error!("{}: payload does not fit its address range", module.name);
            return Err(Error::OutOfRange {
                module: module.name.clone(),
            });
        }

        if module.module_type != ModuleType::Asset && module.platform_id != platform.id {
            log::error!(
                "{}: built for platform {}, target is {} ({})",
                module.name,
                module.platform_id,
                platform.name,
                platform.id
            );
            return Err(Error::PlatformMismatch {
                module: module.name.clone(),
                module_platform: module.platform_id,
                platform_id: platform.id,
                platform_name: platform.name.clone(),
            });
        }
    }

    Ok(())
}
