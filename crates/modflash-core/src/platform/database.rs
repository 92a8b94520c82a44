//! Platform database for runtime loading and lookup
//!
//! Platform profiles are loaded from RON files, one platform per file:
//!
//! ```ron
//! (
//!     id: 12,
//!     name: "argon",
//!     slots: [
//!         (type: Bootloader, index: 0, storage: InternalBulk),
//!         (type: SystemPart, index: 1, storage: InternalBulk),
//!         (type: UserPart, index: 2, storage: InternalBulk),
//!         (type: RadioStack, index: 0, storage: InternalBulk),
//!         (type: NcpFirmware, index: 0, storage: ExternalNormal),
//!     ],
//!     legacy_user_part: Some((address: 0xD4000, size: KiB(128))),
//! )
//! ```

use std::fs;
use std::io;
use std::path::Path;

use thiserror::Error;

use super::types::{LegacyRegion, PlatformProfile, SlotInfo, StorageClass};
use crate::module::ModuleType;

/// Error type for platform database operations
#[derive(Debug, Error)]
pub enum PlatformDbError {
    /// I/O error reading files
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// RON parsing error
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),
    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

// ============================================================================
// RON deserialization types (intermediate format)
// ============================================================================

/// Size specification with human-readable units (for RON parsing)
#[derive(Debug, Clone, Copy, serde::Deserialize)]
pub enum Size {
    /// Size in bytes
    B(u32),
    /// Size in kibibytes (1024 bytes)
    KiB(u32),
    /// Size in mebibytes (1024 * 1024 bytes)
    MiB(u32),
}

impl Size {
    /// Convert to bytes, `None` if the size does not fit in 32 bits
    pub fn to_bytes(self) -> Option<u32> {
        match self {
            Size::B(n) => Some(n),
            Size::KiB(n) => n.checked_mul(1024),
            Size::MiB(n) => n.checked_mul(1024 * 1024),
        }
    }
}

#[derive(Debug, Clone, Copy, serde::Deserialize)]
enum StorageDef {
    InternalBulk,
    ExternalNormal,
}

impl From<StorageDef> for StorageClass {
    fn from(def: StorageDef) -> Self {
        match def {
            StorageDef::InternalBulk => StorageClass::InternalBulk,
            StorageDef::ExternalNormal => StorageClass::ExternalNormal,
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
struct SlotDef {
    #[serde(rename = "type")]
    module_type: ModuleType,
    #[serde(default)]
    index: u8,
    storage: StorageDef,
    #[serde(default)]
    encrypted: bool,
}

#[derive(Debug, Clone, serde::Deserialize)]
struct LegacyRegionDef {
    address: u32,
    size: Size,
}

#[derive(Debug, Clone, serde::Deserialize)]
struct PlatformDef {
    id: u16,
    name: String,
    #[serde(default)]
    slots: Vec<SlotDef>,
    #[serde(default)]
    legacy_user_part: Option<LegacyRegionDef>,
}

impl TryFrom<PlatformDef> for PlatformProfile {
    type Error = PlatformDbError;

    fn try_from(def: PlatformDef) -> Result<Self, Self::Error> {
        let mut profile = PlatformProfile::new(def.id, def.name);

        for slot in def.slots {
            let key = (slot.module_type, slot.index);
            if profile.slots.contains_key(&key) {
                return Err(PlatformDbError::Validation(format!(
                    "{}: duplicate slot {} {}",
                    profile.name, slot.module_type, slot.index
                )));
            }
            profile.slots.insert(
                key,
                SlotInfo {
                    storage: slot.storage.into(),
                    encrypted: slot.encrypted,
                },
            );
        }

        if let Some(legacy) = def.legacy_user_part {
            let size = legacy.size.to_bytes().ok_or_else(|| {
                PlatformDbError::Validation(format!(
                    "{}: legacy user-part region size {:?} overflows",
                    profile.name, legacy.size
                ))
            })?;
            if size == 0 {
                return Err(PlatformDbError::Validation(format!(
                    "{}: legacy user-part region has zero size",
                    profile.name
                )));
            }
            profile.legacy_user_part = Some(LegacyRegion {
                address: legacy.address,
                size,
            });
        }

        Ok(profile)
    }
}

// ============================================================================
// Platform database
// ============================================================================

/// Runtime platform database
#[derive(Debug, Clone, Default)]
pub struct PlatformDatabase {
    platforms: Vec<PlatformProfile>,
}

impl PlatformDatabase {
    /// Create an empty platform database
    pub fn new() -> Self {
        Self {
            platforms: Vec::new(),
        }
    }

    /// Add a profile, replacing any profile with the same id
    pub fn insert(&mut self, profile: PlatformProfile) {
        self.platforms.retain(|p| p.id != profile.id);
        self.platforms.push(profile);
    }

    /// Load a platform definition from a single RON file
    pub fn load_file(&mut self, path: &Path) -> Result<usize, PlatformDbError> {
        let content = fs::read_to_string(path)?;
        self.load_ron(&content)
    }

    /// Load a platform definition from a RON string
    pub fn load_ron(&mut self, content: &str) -> Result<usize, PlatformDbError> {
        let def: PlatformDef = ron::from_str(content)?;
        self.insert(def.try_into()?);
        Ok(1)
    }

    /// Load all RON files from a directory
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, PlatformDbError> {
        let mut total = 0;

        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();

            if path.extension().is_some_and(|ext| ext == "ron") {
                total += self.load_file(&path)?;
            }
        }

        Ok(total)
    }

    /// Get all platforms, ordered by id
    pub fn platforms(&self) -> Vec<&PlatformProfile> {
        let mut platforms: Vec<_> = self.platforms.iter().collect();
        platforms.sort_by_key(|p| p.id);
        platforms
    }

    /// Get the number of platforms in the database
    pub fn len(&self) -> usize {
        self.platforms.len()
    }

    /// Check if the database is empty
    pub fn is_empty(&self) -> bool {
        self.platforms.is_empty()
    }

    /// Find a platform by id
    pub fn find_by_id(&self, id: u16) -> Option<&PlatformProfile> {
        self.platforms.iter().find(|p| p.id == id)
    }

    /// Find a platform by name (case-insensitive exact match)
    pub fn find_by_name(&self, name: &str) -> Option<&PlatformProfile> {
        self.platforms
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Find a platform by numeric id or by name
    pub fn lookup(&self, key: &str) -> Option<&PlatformProfile> {
        match key.parse::<u16>() {
            Ok(id) => self.find_by_id(id),
            Err(_) => self.find_by_name(key),
        }
    }
}
