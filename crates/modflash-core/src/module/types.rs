//! Firmware module descriptors

use core::fmt;

use bitflags::bitflags;

/// Kind of firmware module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Deserialize)]
pub enum ModuleType {
    /// Boot-loader
    Bootloader,
    /// Part of the base operating firmware
    SystemPart,
    /// User application
    UserPart,
    /// Base firmware and application in one image
    MonolithicFirmware,
    /// Network coprocessor firmware
    NcpFirmware,
    /// Radio stack (e.g. a BLE softdevice)
    RadioStack,
    /// Resource blob
    Resource,
    /// Device settings
    Settings,
    /// Non-executable data bundled with an application
    Asset,
    /// Unrecognized module function
    Invalid,
}

impl ModuleType {
    /// Short lowercase name used in logs and CLI output
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bootloader => "bootloader",
            Self::SystemPart => "system-part",
            Self::UserPart => "user-part",
            Self::MonolithicFirmware => "monolithic",
            Self::NcpFirmware => "ncp-firmware",
            Self::RadioStack => "radio-stack",
            Self::Resource => "resource",
            Self::Settings => "settings",
            Self::Asset => "asset",
            Self::Invalid => "invalid",
        }
    }

    /// Whether this module is part of the base firmware
    pub fn is_base_firmware(self) -> bool {
        matches!(self, Self::SystemPart | Self::Bootloader)
    }
}

impl fmt::Display for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to another module that must be present first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize)]
pub struct Dependency {
    /// Type of the required module
    #[serde(rename = "type")]
    pub module_type: ModuleType,
    /// Slot index of the required module
    pub index: u8,
    /// Minimum version of the required module
    pub version: u32,
}

bitflags! {
    /// Validity checks performed on a parsed module
    ///
    /// A set bit means the check passed.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ModuleValidity: u8 {
        /// Stored checksum matches the payload
        const INTEGRITY = 1 << 1;
        /// Dependencies are satisfiable
        const DEPENDENCIES = 1 << 2;
        /// Payload fits the declared address range
        const RANGE = 1 << 3;
        /// Module was built for the declared platform
        const PLATFORM = 1 << 4;
    }
}

/// One parsed, addressable unit of firmware
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareModule {
    /// Human-readable name, usually the file name
    pub name: String,
    /// Module kind
    pub module_type: ModuleType,
    /// Slot index
    pub index: u8,
    /// Module revision
    pub version: u32,
    /// Target hardware
    pub platform_id: u16,
    /// Modules required before this one is valid
    pub dependencies: Vec<Dependency>,
    /// Results of the parser's validity checks
    pub validity: ModuleValidity,
    /// Bytes to write
    pub payload: Vec<u8>,
    /// Start address, populated for modules written in bulk mode
    pub start_address: Option<u32>,
}

impl FirmwareModule {
    /// Create a module that passed every check
    pub fn new(
        name: impl Into<String>,
        module_type: ModuleType,
        index: u8,
        version: u32,
        platform_id: u16,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            module_type,
            index,
            version,
            platform_id,
            dependencies: Vec::new(),
            validity: ModuleValidity::all(),
            payload,
            start_address: None,
        }
    }

    /// Set the start address
    pub fn with_address(mut self, address: u32) -> Self {
        self.start_address = Some(address);
        self
    }

    /// Add a dependency
    pub fn with_dependency(mut self, module_type: ModuleType, index: u8, version: u32) -> Self {
        self.dependencies.push(Dependency {
            module_type,
            index,
            version,
        });
        self
    }

    /// Replace the validity bitmask
    pub fn with_validity(mut self, validity: ModuleValidity) -> Self {
        self.validity = validity;
        self
    }

    /// Stored checksum validated
    pub fn integrity_ok(&self) -> bool {
        self.validity.contains(ModuleValidity::INTEGRITY)
    }

    /// Built for the declared platform
    pub fn platform_ok(&self) -> bool {
        self.validity.contains(ModuleValidity::PLATFORM)
    }

    /// Payload fits the declared range
    pub fn range_ok(&self) -> bool {
        self.validity.contains(ModuleValidity::RANGE)
    }

    /// Dependencies satisfiable
    pub fn dependency_ok(&self) -> bool {
        self.validity.contains(ModuleValidity::DEPENDENCIES)
    }

    /// Minimum base-firmware version this module requires
    ///
    /// This is the highest version among the module's system-part
    /// dependencies, or `None` when it declares none.
    pub fn required_system_version(&self) -> Option<u32> {
        self.dependencies
            .iter()
            .filter(|d| d.module_type == ModuleType::SystemPart)
            .map(|d| d.version)
            .max()
    }

    /// Whether this module satisfies `dep`
    pub fn satisfies(&self, dep: &Dependency) -> bool {
        self.module_type == dep.module_type && self.index == dep.index
    }
}
