//! Removal of modules that must never be written directly

use crate::module::{FirmwareModule, ModuleType};
use crate::platform::PlatformProfile;

/// Why a module was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The module's slot is encrypted on this platform
    EncryptedSlot,
    /// Radio stacks are only written when explicitly allowed
    RadioStack,
    /// Coprocessor firmware is only written when explicitly allowed
    NcpFirmware,
}

/// Decide whether a module must be dropped
pub fn drop_reason(
    module: &FirmwareModule,
    platform: &PlatformProfile,
    allow_all: bool,
) -> Option<DropReason> {
    if platform.slot(module.module_type, module.index).encrypted {
        return Some(DropReason::EncryptedSlot);
    }
    if allow_all {
        return None;
    }
    match module.module_type {
        ModuleType::RadioStack => Some(DropReason::RadioStack),
        ModuleType::NcpFirmware => Some(DropReason::NcpFirmware),
        _ => None,
    }
}

/// Keep only the modules that are safe to write
///
/// Encrypted slots are dropped even when `allow_all` is set.
pub fn filter_modules(
    modules: Vec<FirmwareModule>,
    platform: &PlatformProfile,
    allow_all: bool,
) -> Vec<FirmwareModule> {
    modules
        .into_iter()
        .filter(|module| match drop_reason(module, platform, allow_all) {
            Some(reason) => {
                log::debug!("Skipping {} ({}): {:?}", module.name, module.module_type, reason);
                false
            }
            None => true,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{SlotInfo, StorageClass};

    fn platform() -> PlatformProfile {
        PlatformProfile::new(12, "argon")
            .with_slot(
                ModuleType::SystemPart,
                1,
                SlotInfo {
                    storage: StorageClass::InternalBulk,
                    encrypted: false,
                },
            )
            .with_slot(
                ModuleType::Bootloader,
                2,
                SlotInfo {
                    storage: StorageClass::InternalBulk,
                    encrypted: true,
                },
            )
    }

    fn module(name: &str, module_type: ModuleType, index: u8) -> FirmwareModule {
        FirmwareModule::new(name, module_type, index, 1, 12, vec![0; 8])
    }

    fn names(modules: &[FirmwareModule]) -> Vec<&str> {
        modules.iter().map(|m| m.name.as_str()).collect()
    }

    #[test]
    fn test_drops_radio_and_ncp_by_default() {
        let modules = vec![
            module("system", ModuleType::SystemPart, 1),
            module("softdevice", ModuleType::RadioStack, 0),
            module("esp32", ModuleType::NcpFirmware, 0),
            module("app", ModuleType::UserPart, 1),
        ];
        let kept = filter_modules(modules, &platform(), false);
        assert_eq!(names(&kept), ["system", "app"]);
    }

    #[test]
    fn test_allow_all_keeps_radio_and_ncp() {
        let modules = vec![
            module("softdevice", ModuleType::RadioStack, 0),
            module("esp32", ModuleType::NcpFirmware, 0),
        ];
        let kept = filter_modules(modules, &platform(), true);
        assert_eq!(names(&kept), ["softdevice", "esp32"]);
    }

    #[test]
    fn test_encrypted_slot_always_dropped() {
        let modules = vec![
            module("prebootloader", ModuleType::Bootloader, 2),
            module("bootloader", ModuleType::Bootloader, 0),
        ];
        for allow_all in [false, true] {
            let kept = filter_modules(modules.clone(), &platform(), allow_all);
            assert_eq!(names(&kept), ["bootloader"]);
            assert!(kept
                .iter()
                .all(|m| !platform().slot(m.module_type, m.index).encrypted));
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(filter_modules(Vec::new(), &platform(), false).is_empty());
    }
}
