//! Platform profile type definitions

use std::collections::BTreeMap;

use crate::module::ModuleType;

/// Where a firmware slot lives, which decides the transfer mode used to write it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    /// Internal flash, written with the boot-loader's block-write protocol
    InternalBulk,
    /// Written through the running firmware's update protocol
    ExternalNormal,
}

/// One firmware slot on a platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotInfo {
    /// Storage class of the slot
    pub storage: StorageClass,
    /// Slot contents are encrypted and must never be written directly
    pub encrypted: bool,
}

/// Obsolete user-application region on platforms that relocated it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyRegion {
    /// Start address of the old region
    pub address: u32,
    /// Size of the old region in bytes
    pub size: u32,
}

/// Static description of a hardware platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformProfile {
    /// Numeric platform id, as stored in module headers
    pub id: u16,
    /// Platform name (e.g., "argon")
    pub name: String,
    /// Firmware slots keyed by (module type, index)
    pub slots: BTreeMap<(ModuleType, u8), SlotInfo>,
    /// Region to wipe on upgrade, if the user-application region moved
    pub legacy_user_part: Option<LegacyRegion>,
}

/// Slot used for modules the profile does not describe
const DEFAULT_SLOT: SlotInfo = SlotInfo {
    storage: StorageClass::InternalBulk,
    encrypted: false,
};

impl PlatformProfile {
    /// Create a profile with no slots
    pub fn new(id: u16, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            slots: BTreeMap::new(),
            legacy_user_part: None,
        }
    }

    /// Add a slot
    pub fn with_slot(mut self, module_type: ModuleType, index: u8, slot: SlotInfo) -> Self {
        self.slots.insert((module_type, index), slot);
        self
    }

    /// Declare the legacy user-application region
    pub fn with_legacy_user_part(mut self, address: u32, size: u32) -> Self {
        self.legacy_user_part = Some(LegacyRegion { address, size });
        self
    }

    /// Look up a slot; unknown slots are internal and unencrypted
    pub fn slot(&self, module_type: ModuleType, index: u8) -> SlotInfo {
        self.slots
            .get(&(module_type, index))
            .copied()
            .unwrap_or(DEFAULT_SLOT)
    }
}
