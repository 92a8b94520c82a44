//! Plan-and-execute entry point
//!
//! [`Flasher`] ties the pipeline together:
//!
//! ```text
//! resolve base firmware -> merge -> filter -> sort -> validate -> plan -> execute
//! ```
//!
//! Everything up to and including planning happens before the device is
//! written, so a rejected module set never leaves a device half-flashed.

use crate::catalog::BinaryCatalog;
use crate::config::FlashConfig;
use crate::device::{DeviceHandle, DeviceMode};
use crate::error::{Error, Result};
use crate::execute::execute_steps;
use crate::filter::filter_modules;
use crate::module::FirmwareModule;
use crate::plan::{plan_steps, FlashStep};
use crate::platform::{PlatformDatabase, PlatformProfile};
use crate::progress::FlashProgress;
use crate::resolve::{decide, fetch_base_firmware, merge_modules};
use crate::sort::{DependencySorter, TopologicalSorter};
use crate::validate::validate_modules;

/// Policy flags for a flash operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlashOptions {
    /// Also write radio stacks and coprocessor firmware
    pub allow_all: bool,
    /// Never fetch base firmware
    pub application_only: bool,
    /// Do not fetch base firmware for an outdated device
    pub skip_base_firmware: bool,
    /// Fetch and write this base-firmware release
    pub target_version: Option<String>,
    /// Leave the device as it is after flashing
    pub no_reset: bool,
}

/// Plans and writes module sets for one platform
pub struct Flasher<C, S = TopologicalSorter> {
    platform: PlatformProfile,
    catalog: C,
    sorter: S,
    options: FlashOptions,
    config: FlashConfig,
}

impl<C: BinaryCatalog> Flasher<C> {
    /// Create a flasher for `platform` using the default dependency sorter
    pub fn new(platform: PlatformProfile, catalog: C) -> Self {
        Self {
            platform,
            catalog,
            sorter: TopologicalSorter,
            options: FlashOptions::default(),
            config: FlashConfig::default(),
        }
    }

    /// Create a flasher for the platform with `platform_id` in `db`
    pub fn from_database(db: &PlatformDatabase, platform_id: u16, catalog: C) -> Result<Self> {
        let platform = db
            .find_by_id(platform_id)
            .ok_or(Error::UnknownPlatform(platform_id))?;
        Ok(Self::new(platform.clone(), catalog))
    }
}

impl<C: BinaryCatalog, S: DependencySorter> Flasher<C, S> {
    /// Replace the dependency sorter
    pub fn with_sorter<T: DependencySorter>(self, sorter: T) -> Flasher<C, T> {
        Flasher {
            platform: self.platform,
            catalog: self.catalog,
            sorter,
            options: self.options,
            config: self.config,
        }
    }

    /// Set the policy flags
    pub fn with_options(mut self, options: FlashOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the runtime configuration
    pub fn with_config(mut self, config: FlashConfig) -> Self {
        self.config = config;
        self
    }

    /// Target platform
    pub fn platform(&self) -> &PlatformProfile {
        &self.platform
    }

    /// Policy flags in effect
    pub fn options(&self) -> &FlashOptions {
        &self.options
    }

    /// Plan the writes for `modules` without touching a device
    ///
    /// `installed_version` is the device's base-firmware version, `None`
    /// when unknown.
    pub fn prepare(
        &mut self,
        modules: Vec<FirmwareModule>,
        device_mode: DeviceMode,
        installed_version: Option<u32>,
    ) -> Result<Vec<FlashStep>> {
        let decision = decide(&modules, &self.options, installed_version);
        log::debug!("Base firmware decision: {:?}", decision);
        let fetched = fetch_base_firmware(&decision, self.platform.id, &mut self.catalog)?;
        let modules = merge_modules(modules, fetched);

        let modules = filter_modules(modules, &self.platform, self.options.allow_all);
        let modules = self.sorter.sort(modules);
        validate_modules(&modules, &self.platform)?;

        let steps = plan_steps(modules, &self.platform, device_mode)?;
        log::info!(
            "Planned {} step(s) for {} ({})",
            steps.len(),
            self.platform.name,
            self.platform.id
        );
        Ok(steps)
    }

    /// Plan and write `modules` to `device`
    ///
    /// The device is closed exactly once on every path. It is reset after
    /// writing (successful or not) unless `no_reset` is set, but never when
    /// planning fails.
    pub fn flash<D, P>(
        &mut self,
        device: &mut D,
        modules: Vec<FirmwareModule>,
        progress: &mut P,
    ) -> Result<()>
    where
        D: DeviceHandle + ?Sized,
        P: FlashProgress + ?Sized,
    {
        let mode = device.mode();
        let installed = match device.system_version() {
            Ok(version) => version,
            Err(e) => {
                log::warn!("Could not read installed base firmware version: {}", e);
                None
            }
        };
        log::info!(
            "Device is in {} mode, base firmware {}",
            mode,
            installed.map_or_else(|| "unknown".to_string(), |v| v.to_string())
        );

        let steps = match self.prepare(modules, mode, installed) {
            Ok(steps) => steps,
            Err(e) => {
                device.close();
                return Err(e);
            }
        };

        execute_steps(device, &steps, &self.config, self.options.no_reset, progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatalogError;
    use crate::module::{ModuleType, ModuleValidity};
    use crate::platform::{SlotInfo, StorageClass};
    use crate::test_support::{Call, Event, RecordingDevice, RecordingProgress};

    /// Catalog serving a system part and boot-loader for version 20
    #[derive(Default)]
    struct StaticCatalog {
        fetched: Vec<String>,
    }

    impl BinaryCatalog for StaticCatalog {
        fn release_for_version(
            &mut self,
            platform_id: u16,
            version: u32,
        ) -> core::result::Result<String, CatalogError> {
            if version == 20 {
                Ok("2.0.0".into())
            } else {
                Err(CatalogError::NotFound {
                    platform_id,
                    release: version.to_string(),
                })
            }
        }

        fn fetch(
            &mut self,
            platform_id: u16,
            release: &str,
        ) -> core::result::Result<Vec<FirmwareModule>, CatalogError> {
            self.fetched.push(release.to_string());
            Ok(vec![
                FirmwareModule::new(
                    "system-20.bin",
                    ModuleType::SystemPart,
                    1,
                    20,
                    platform_id,
                    vec![1; 64],
                )
                .with_address(0x30000),
                FirmwareModule::new(
                    "bootloader-20.bin",
                    ModuleType::Bootloader,
                    0,
                    20,
                    platform_id,
                    vec![2; 16],
                ),
            ])
        }
    }

    fn platform() -> PlatformProfile {
        PlatformProfile::new(12, "argon").with_slot(
            ModuleType::NcpFirmware,
            0,
            SlotInfo {
                storage: StorageClass::ExternalNormal,
                encrypted: false,
            },
        )
    }

    fn app(required: u32) -> FirmwareModule {
        FirmwareModule::new("app.bin", ModuleType::UserPart, 1, 6, 12, vec![3; 32])
            .with_address(0xB4000)
            .with_dependency(ModuleType::SystemPart, 1, required)
    }

    fn names(steps: &[FlashStep]) -> Vec<&str> {
        steps.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn test_outdated_device_gets_base_firmware() {
        let mut flasher = Flasher::new(platform(), StaticCatalog::default());
        let steps = flasher.prepare(vec![app(20)], DeviceMode::Normal, Some(15)).unwrap();

        assert_eq!(names(&steps), ["bootloader-20.bin", "system-20.bin", "app.bin"]);
        assert_eq!(steps[0].mode, DeviceMode::Normal);
        assert!(steps[1..].iter().all(|s| s.mode == DeviceMode::Bulk));
        assert!(!names(&steps).contains(&crate::plan::LEGACY_INVALIDATION_STEP));
    }

    #[test]
    fn test_up_to_date_device_gets_app_only() {
        let mut flasher = Flasher::new(platform(), StaticCatalog::default());
        let steps = flasher.prepare(vec![app(20)], DeviceMode::Bulk, Some(20)).unwrap();
        assert_eq!(names(&steps), ["app.bin"]);
        assert!(flasher.catalog.fetched.is_empty());
    }

    #[test]
    fn test_plans_in_sorter_order() {
        struct ReverseSorter;
        impl DependencySorter for ReverseSorter {
            fn sort(&self, mut modules: Vec<FirmwareModule>) -> Vec<FirmwareModule> {
                modules.reverse();
                modules
            }
        }

        let system = || {
            FirmwareModule::new("system.bin", ModuleType::SystemPart, 1, 20, 12, vec![1; 64])
                .with_address(0x30000)
        };

        let mut flasher = Flasher::new(platform(), StaticCatalog::default());
        let steps = flasher.prepare(vec![app(20), system()], DeviceMode::Bulk, Some(20)).unwrap();
        assert_eq!(names(&steps), ["system.bin", "app.bin"]);

        let mut flasher =
            Flasher::new(platform(), StaticCatalog::default()).with_sorter(ReverseSorter);
        let steps = flasher.prepare(vec![system(), app(20)], DeviceMode::Bulk, Some(20)).unwrap();
        assert_eq!(names(&steps), ["app.bin", "system.bin"]);
    }

    #[test]
    fn test_unknown_platform() {
        let db = PlatformDatabase::new();
        assert!(matches!(
            Flasher::from_database(&db, 99, StaticCatalog::default()),
            Err(Error::UnknownPlatform(99))
        ));
    }

    #[test]
    fn test_filtered_before_validation() {
        // Coprocessor firmware for another platform is dropped, not rejected
        let ncp = FirmwareModule::new("esp32.bin", ModuleType::NcpFirmware, 0, 7, 6, vec![0; 8]);
        let mut flasher =
            Flasher::new(platform(), StaticCatalog::default()).with_options(FlashOptions {
                skip_base_firmware: true,
                ..FlashOptions::default()
            });
        let steps = flasher.prepare(vec![ncp, app(20)], DeviceMode::Bulk, Some(1)).unwrap();
        assert_eq!(names(&steps), ["app.bin"]);
    }

    #[test]
    fn test_crc_failure_touches_no_device() {
        let mut flasher = Flasher::new(platform(), StaticCatalog::default());
        let mut device = RecordingDevice::new(DeviceMode::Bulk);
        device.version = Some(20);
        let mut progress = RecordingProgress::default();
        let bad = app(20).with_validity(ModuleValidity::all() - ModuleValidity::INTEGRITY);

        let result = flasher.flash(&mut device, vec![bad], &mut progress);

        assert!(matches!(result, Err(Error::CrcMismatch { .. })));
        assert_eq!(device.calls, [Call::Close]);
        assert!(progress.events.is_empty());
    }

    #[test]
    fn test_flash_end_to_end() {
        let mut flasher =
            Flasher::new(platform(), StaticCatalog::default()).with_config(FlashConfig {
                settle_delay_ms: 10,
                ..FlashConfig::default()
            });
        let mut device = RecordingDevice::new(DeviceMode::Bulk);
        device.version = Some(15);
        let mut progress = RecordingProgress::default();

        flasher.flash(&mut device, vec![app(20)], &mut progress).unwrap();

        assert_eq!(
            device.calls,
            [
                Call::WriteBulk(0x30000, 64),
                Call::WriteBulk(0xB4000, 32),
                Call::Reopen(DeviceMode::Normal),
                Call::EnterUpdateState,
                Call::WriteNormal(16),
                Call::Delay(10),
                Call::Reopen(DeviceMode::Normal),
                Call::Reset,
                Call::Close,
            ]
        );
        assert_eq!(progress.events.last(), Some(&Event::Finish));
    }

    #[test]
    fn test_explicit_target_failure_closes_device() {
        struct EmptyCatalog;
        impl BinaryCatalog for EmptyCatalog {
            fn release_for_version(
                &mut self,
                platform_id: u16,
                v: u32,
            ) -> core::result::Result<String, CatalogError> {
                Err(CatalogError::NotFound {
                    platform_id,
                    release: v.to_string(),
                })
            }
            fn fetch(
                &mut self,
                platform_id: u16,
                release: &str,
            ) -> core::result::Result<Vec<FirmwareModule>, CatalogError> {
                Err(CatalogError::NotFound {
                    platform_id,
                    release: release.to_string(),
                })
            }
        }

        let mut flasher = Flasher::new(platform(), EmptyCatalog).with_options(FlashOptions {
            target_version: Some("5.0.0".into()),
            ..FlashOptions::default()
        });
        let mut device = RecordingDevice::new(DeviceMode::Normal);
        let result = flasher.flash(&mut device, vec![app(20)], &mut RecordingProgress::default());

        assert!(matches!(result, Err(Error::Catalog { .. })));
        assert_eq!(device.calls, [Call::Close]);
    }
}
