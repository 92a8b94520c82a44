//! Base-firmware resolution
//!
//! Decides whether base-firmware binaries must be fetched to go with the
//! user's modules, fetches them from a [`BinaryCatalog`] and merges them
//! into the module set. The decision is order-sensitive; the first rule
//! that applies wins:
//!
//! 1. a system part or boot-loader is already supplied: fetch nothing
//! 2. no application module: fetch nothing
//! 3. application-only mode: fetch nothing
//! 4. explicit target release: fetch it
//! 5. skip requested: fetch nothing
//! 6. installed base firmware older than the application needs: fetch the
//!    release providing the required version

use core::fmt;

use crate::catalog::BinaryCatalog;
use crate::error::{Error, Result};
use crate::flasher::FlashOptions;
use crate::module::{FirmwareModule, ModuleType};

/// Why no base firmware is fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The module set already carries a system part or boot-loader
    BaseFirmwareSupplied,
    /// No application module in the set
    NoApplication,
    /// Application-only mode was requested
    ApplicationOnly,
    /// Base-firmware fetching was explicitly skipped
    SkipRequested,
    /// The application does not declare a base-firmware requirement
    NoRequirement,
    /// The installed base firmware is new enough
    UpToDate,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::BaseFirmwareSupplied => "base firmware supplied",
            Self::NoApplication => "no application module",
            Self::ApplicationOnly => "application-only mode",
            Self::SkipRequested => "base firmware skipped",
            Self::NoRequirement => "application has no base-firmware requirement",
            Self::UpToDate => "installed base firmware is recent enough",
        })
    }
}

/// Outcome of the resolution rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Fetch nothing
    Skip(SkipReason),
    /// Fetch this release, whatever is installed
    FetchRelease(String),
    /// Fetch the release providing this base-firmware version
    FetchVersion(u32),
}

/// Apply the resolution rules to `modules`
///
/// An unknown installed version counts as older than any requirement.
pub fn decide(
    modules: &[FirmwareModule],
    options: &FlashOptions,
    installed: Option<u32>,
) -> Decision {
    if modules.iter().any(|m| m.module_type.is_base_firmware()) {
        return Decision::Skip(SkipReason::BaseFirmwareSupplied);
    }

    let Some(application) = modules.iter().find(|m| m.module_type == ModuleType::UserPart) else {
        return Decision::Skip(SkipReason::NoApplication);
    };

    if options.application_only {
        return Decision::Skip(SkipReason::ApplicationOnly);
    }

    if let Some(release) = &options.target_version {
        return Decision::FetchRelease(release.clone());
    }

    if options.skip_base_firmware {
        return Decision::Skip(SkipReason::SkipRequested);
    }

    match (application.required_system_version(), installed) {
        (None, _) => Decision::Skip(SkipReason::NoRequirement),
        (Some(required), Some(installed)) if installed >= required => {
            Decision::Skip(SkipReason::UpToDate)
        }
        (Some(required), _) => Decision::FetchVersion(required),
    }
}

/// Fetch the base firmware `decision` asks for
///
/// Only a failure to fetch an explicitly requested release is an error;
/// failures to look up or fetch a required version degrade to fetching
/// nothing.
pub fn fetch_base_firmware<C>(
    decision: &Decision,
    platform_id: u16,
    catalog: &mut C,
) -> Result<Vec<FirmwareModule>>
where
    C: BinaryCatalog + ?Sized,
{
    match decision {
        Decision::Skip(reason) => {
            log::info!("Not fetching base firmware: {}", reason);
            Ok(Vec::new())
        }
        Decision::FetchRelease(release) => {
            log::info!("Fetching requested base firmware {}", release);
            catalog
                .fetch(platform_id, release)
                .map_err(|source| Error::Catalog {
                    release: release.clone(),
                    source,
                })
        }
        Decision::FetchVersion(version) => {
            let release = match catalog.release_for_version(platform_id, *version) {
                Ok(release) => release,
                Err(e) => {
                    log::warn!("No base firmware release found for version {}: {}", version, e);
                    return Ok(Vec::new());
                }
            };
            log::info!("Application needs base firmware {}, fetching {}", version, release);
            match catalog.fetch(platform_id, &release) {
                Ok(modules) => Ok(modules),
                Err(e) => {
                    log::warn!("Could not fetch base firmware {}: {}", release, e);
                    Ok(Vec::new())
                }
            }
        }
    }
}

/// Add fetched modules to the user's set
///
/// A fetched module is dropped when the user already supplies a module for
/// the same slot. Fetched modules go first.
pub fn merge_modules(
    user: Vec<FirmwareModule>,
    fetched: Vec<FirmwareModule>,
) -> Vec<FirmwareModule> {
    let mut merged: Vec<FirmwareModule> = fetched
        .into_iter()
        .filter(|f| {
            let supplied = user
                .iter()
                .any(|u| u.module_type == f.module_type && u.index == f.index);
            if supplied {
                log::debug!("Keeping supplied {} {} over {}", f.module_type, f.index, f.name);
            }
            !supplied
        })
        .collect();
    merged.extend(user);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatalogError;

    fn app(required: u32) -> FirmwareModule {
        FirmwareModule::new("app.bin", ModuleType::UserPart, 1, 6, 12, vec![0; 8])
            .with_dependency(ModuleType::SystemPart, 1, required)
    }

    fn system(version: u32) -> FirmwareModule {
        FirmwareModule::new("system.bin", ModuleType::SystemPart, 1, version, 12, vec![0; 8])
    }

    /// Catalog with a single release "2.0.0" providing version 20
    #[derive(Default)]
    struct FakeCatalog {
        lookups: usize,
        fetches: Vec<String>,
        fail_lookup: bool,
        fail_fetch: bool,
    }

    impl BinaryCatalog for FakeCatalog {
        fn release_for_version(
            &mut self,
            platform_id: u16,
            version: u32,
        ) -> core::result::Result<String, CatalogError> {
            self.lookups += 1;
            if self.fail_lookup || version > 20 {
                return Err(CatalogError::NotFound {
                    platform_id,
                    release: version.to_string(),
                });
            }
            Ok("2.0.0".to_string())
        }

        fn fetch(
            &mut self,
            _platform_id: u16,
            release: &str,
        ) -> core::result::Result<Vec<FirmwareModule>, CatalogError> {
            self.fetches.push(release.to_string());
            if self.fail_fetch {
                return Err(CatalogError::Io(std::io::Error::other("connection refused")));
            }
            Ok(vec![
                system(20).with_address(0x30000),
                FirmwareModule::new("bootloader.bin", ModuleType::Bootloader, 0, 5, 12, vec![0; 4]),
            ])
        }
    }

    #[test]
    fn test_supplied_base_firmware_wins() {
        let options = FlashOptions {
            target_version: Some("3.0.0".into()),
            ..FlashOptions::default()
        };
        let decision = decide(&[app(3103), system(1000)], &options, Some(1));
        assert_eq!(decision, Decision::Skip(SkipReason::BaseFirmwareSupplied));

        let bootloader = FirmwareModule::new("bl.bin", ModuleType::Bootloader, 0, 1, 12, vec![]);
        let decision = decide(&[app(3103), bootloader], &FlashOptions::default(), Some(1));
        assert_eq!(decision, Decision::Skip(SkipReason::BaseFirmwareSupplied));
    }

    #[test]
    fn test_no_application() {
        let ncp = FirmwareModule::new("esp32.bin", ModuleType::NcpFirmware, 0, 7, 12, vec![]);
        let options = FlashOptions {
            target_version: Some("3.0.0".into()),
            ..FlashOptions::default()
        };
        assert_eq!(
            decide(&[ncp], &options, Some(1)),
            Decision::Skip(SkipReason::NoApplication)
        );
    }

    #[test]
    fn test_application_only_beats_target() {
        let options = FlashOptions {
            application_only: true,
            target_version: Some("3.0.0".into()),
            ..FlashOptions::default()
        };
        assert_eq!(
            decide(&[app(20)], &options, Some(15)),
            Decision::Skip(SkipReason::ApplicationOnly)
        );
    }

    #[test]
    fn test_target_beats_skip_and_installed() {
        let options = FlashOptions {
            skip_base_firmware: true,
            target_version: Some("3.0.0".into()),
            ..FlashOptions::default()
        };
        assert_eq!(
            decide(&[app(20)], &options, Some(9999)),
            Decision::FetchRelease("3.0.0".into())
        );
    }

    #[test]
    fn test_skip_requested() {
        let options = FlashOptions {
            skip_base_firmware: true,
            ..FlashOptions::default()
        };
        assert_eq!(
            decide(&[app(20)], &options, Some(15)),
            Decision::Skip(SkipReason::SkipRequested)
        );
    }

    #[test]
    fn test_version_comparison() {
        let options = FlashOptions::default();
        assert_eq!(decide(&[app(20)], &options, Some(15)), Decision::FetchVersion(20));
        assert_eq!(
            decide(&[app(20)], &options, Some(20)),
            Decision::Skip(SkipReason::UpToDate)
        );
        assert_eq!(decide(&[app(20)], &options, None), Decision::FetchVersion(20));

        let standalone = FirmwareModule::new("app.bin", ModuleType::UserPart, 1, 6, 12, vec![]);
        assert_eq!(
            decide(&[standalone], &options, Some(1)),
            Decision::Skip(SkipReason::NoRequirement)
        );
    }

    #[test]
    fn test_fetch_required_version() {
        let mut catalog = FakeCatalog::default();
        let fetched = fetch_base_firmware(&Decision::FetchVersion(20), 12, &mut catalog).unwrap();
        assert_eq!(fetched.len(), 2);
        assert_eq!(catalog.fetches, ["2.0.0"]);
    }

    #[test]
    fn test_lookup_failure_fetches_nothing() {
        let mut catalog = FakeCatalog {
            fail_lookup: true,
            ..FakeCatalog::default()
        };
        let fetched = fetch_base_firmware(&Decision::FetchVersion(20), 12, &mut catalog).unwrap();
        assert!(fetched.is_empty());
        assert!(catalog.fetches.is_empty());

        let mut catalog = FakeCatalog {
            fail_fetch: true,
            ..FakeCatalog::default()
        };
        let fetched = fetch_base_firmware(&Decision::FetchVersion(20), 12, &mut catalog).unwrap();
        assert!(fetched.is_empty());
    }

    #[test]
    fn test_explicit_release_failure_is_fatal() {
        let mut catalog = FakeCatalog {
            fail_fetch: true,
            ..FakeCatalog::default()
        };
        match fetch_base_firmware(&Decision::FetchRelease("9.9.9".into()), 12, &mut catalog) {
            Err(Error::Catalog { release, .. }) => assert_eq!(release, "9.9.9"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_skip_touches_no_catalog() {
        let mut catalog = FakeCatalog::default();
        let fetched = fetch_base_firmware(
            &Decision::Skip(SkipReason::UpToDate),
            12,
            &mut catalog,
        )
        .unwrap();
        assert!(fetched.is_empty());
        assert_eq!(catalog.lookups, 0);
        assert!(catalog.fetches.is_empty());
    }

    #[test]
    fn test_merge_keeps_supplied_modules() {
        let user = vec![app(20), system(25)];
        let fetched = vec![
            system(20),
            FirmwareModule::new("bootloader.bin", ModuleType::Bootloader, 0, 5, 12, vec![]),
        ];
        let merged = merge_modules(user, fetched);
        let names: Vec<_> = merged.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["bootloader.bin", "app.bin", "system.bin"]);
        assert_eq!(merged[2].version, 25);
    }
}
