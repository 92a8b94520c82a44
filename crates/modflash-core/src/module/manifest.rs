//! Bundle manifest parsing
//!
//! A bundle manifest lists the modules to flash together with the metadata
//! the device would otherwise read from each binary's header:
//!
//! ```ron
//! (
//!     modules: [
//!         (
//!             file: "app.bin",
//!             type: UserPart,
//!             index: 1,
//!             version: 6,
//!             platform_id: 12,
//!             address: Some(0xB4000),
//!             crc32: Some(0x1234ABCD),
//!             dependencies: [(type: SystemPart, index: 1, version: 3103)],
//!         ),
//!     ],
//! )
//! ```
//!
//! File paths are relative to the manifest's directory. A manifest may
//! declare the platform it was built for with a top-level `platform_id`.
//!
//! Validity bits are computed across the whole manifest:
//! - `DEPENDENCIES`: every dependency on a module listed in the same
//!   manifest is met by that module's version. Dependencies on modules the
//!   manifest does not list are left to what is installed on the device.
//! - `PLATFORM`: the module matches the declared platform, or, without a
//!   declaration, every non-asset module in the manifest agrees on one
//!   platform. Assets are platform-agnostic.

use std::fs;
use std::path::{Path, PathBuf};

use crc::{Crc, CRC_32_ISO_HDLC};

use super::types::{Dependency, FirmwareModule, ModuleType, ModuleValidity};
use crate::error::{Error, Result};

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Turns a file on disk into module descriptors
pub trait ModuleParser {
    /// Parse every module described by `path`
    fn parse(&self, path: &Path) -> Result<Vec<FirmwareModule>>;
}

/// Manifest root
#[derive(Debug, serde::Deserialize)]
struct ManifestDef {
    #[serde(default)]
    platform_id: Option<u16>,
    modules: Vec<ModuleDef>,
}

/// One module entry
#[derive(Debug, serde::Deserialize)]
struct ModuleDef {
    file: PathBuf,
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "type")]
    module_type: ModuleType,
    #[serde(default)]
    index: u8,
    #[serde(default)]
    version: u32,
    platform_id: u16,
    #[serde(default)]
    address: Option<u32>,
    #[serde(default)]
    crc32: Option<u32>,
    #[serde(default)]
    dependencies: Vec<Dependency>,
}

/// Parser for RON bundle manifests
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestParser;

impl ManifestParser {
    /// Parse manifest text, resolving module files against `base_dir`
    pub fn parse_str(
        &self,
        content: &str,
        base_dir: &Path,
        origin: &Path,
    ) -> Result<Vec<FirmwareModule>> {
        let manifest: ManifestDef = ron::from_str(content).map_err(|e| Error::Parse {
            path: origin.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut modules = manifest
            .modules
            .into_iter()
            .map(|def| load_module(def, base_dir))
            .collect::<Result<Vec<_>>>()?;

        check_dependencies(&mut modules);
        check_platform(&mut modules, manifest.platform_id);
        Ok(modules)
    }
}

impl ModuleParser for ManifestParser {
    fn parse(&self, path: &Path) -> Result<Vec<FirmwareModule>> {
        let content = fs::read_to_string(path).map_err(|e| Error::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let modules = self.parse_str(&content, base_dir, path)?;
        log::debug!("Parsed {} module(s) from {}", modules.len(), path.display());
        Ok(modules)
    }
}

fn load_module(def: ModuleDef, base_dir: &Path) -> Result<FirmwareModule> {
    let path = base_dir.join(&def.file);
    let payload = fs::read(&path).map_err(|e| Error::Parse {
        path: path.clone(),
        reason: e.to_string(),
    })?;

    if def.module_type == ModuleType::Invalid {
        return Err(Error::Parse {
            path,
            reason: "module function is not recognized".to_string(),
        });
    }

    let mut validity = ModuleValidity::empty();

    match def.crc32 {
        Some(expected) if CRC32.checksum(&payload) != expected => {
            log::debug!("{}: stored CRC 0x{:08X} does not match payload", path.display(), expected);
        }
        _ => validity |= ModuleValidity::INTEGRITY,
    }

    let in_range = def
        .address
        .map_or(true, |addr| addr as u64 + payload.len() as u64 <= u32::MAX as u64 + 1);
    if in_range {
        validity |= ModuleValidity::RANGE;
    }

    let name = def.name.unwrap_or_else(|| {
        def.file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| def.file.display().to_string())
    });

    Ok(FirmwareModule {
        name,
        module_type: def.module_type,
        index: def.index,
        version: def.version,
        platform_id: def.platform_id,
        dependencies: def.dependencies,
        validity,
        payload,
        start_address: def.address,
    })
}

fn check_dependencies(modules: &mut [FirmwareModule]) {
    let met: Vec<bool> = modules
        .iter()
        .map(|module| {
            module.dependencies.iter().all(|dep| {
                match modules.iter().find(|other| other.satisfies(dep)) {
                    Some(other) if other.version < dep.version => {
                        log::debug!(
                            "{}: needs {} {} >= {}, manifest has {}",
                            module.name,
                            dep.module_type,
                            dep.index,
                            dep.version,
                            other.version
                        );
                        false
                    }
                    _ => true,
                }
            })
        })
        .collect();

    for (module, ok) in modules.iter_mut().zip(met) {
        module.validity.set(ModuleValidity::DEPENDENCIES, ok);
    }
}

fn check_platform(modules: &mut [FirmwareModule], declared: Option<u16>) {
    let expected = declared.or_else(|| {
        let mut platforms = modules
            .iter()
            .filter(|m| m.module_type != ModuleType::Asset)
            .map(|m| m.platform_id);
        let first = platforms.next()?;
        platforms.all(|id| id == first).then_some(first)
    });

    for module in modules.iter_mut() {
        let ok = module.module_type == ModuleType::Asset || Some(module.platform_id) == expected;
        if !ok {
            log::debug!(
                "{}: platform {} does not match the bundle",
                module.name,
                module.platform_id
            );
        }
        module.validity.set(ModuleValidity::PLATFORM, ok);
    }
}

/// CRC-32 of a payload, as stored in manifests
pub fn payload_crc32(payload: &[u8]) -> u32 {
    CRC32.checksum(payload)
}
