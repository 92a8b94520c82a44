//! Device backend registration and opening
//!
//! This module provides a centralized registry for all device backends, with
//! support for feature-gated inclusion and dynamic help text generation.

use modflash_core::DeviceHandle;
use std::collections::HashMap;

/// Information about a device backend
pub struct DeviceInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// Get information about all available device backends (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_devices() -> Vec<DeviceInfo> {
    let mut devices = Vec::new();

    #[cfg(feature = "dummy")]
    devices.push(DeviceInfo {
        name: "dummy",
        aliases: &["sim"],
        description: "Simulated device (mode=normal|dfu,version=<n>|none,sector=<bytes>,\
                      fail-reopen=<mode>,fail-write=<n>,timeout-write=<n>,fail-reset,fail-update)",
    });

    devices
}

/// Generate help text listing all available device backends
pub fn device_help() -> String {
    let devices = available_devices();

    if devices.is_empty() {
        return "No device backends available (recompile with device features enabled)".to_string();
    }

    let mut help = String::from("Available devices:\n");
    for d in &devices {
        help.push_str(&format!("  {:12} - {}\n", d.name, d.description));
    }
    help
}

/// Generate a short list of device names for CLI help
pub fn device_names_short() -> String {
    let devices = available_devices();
    let names: Vec<&str> = devices.iter().map(|d| d.name).collect();
    names.join(", ")
}

/// Resolve a device name or alias to its canonical name
pub fn find_device(name: &str) -> Option<&'static str> {
    available_devices()
        .into_iter()
        .find(|d| d.name == name || d.aliases.contains(&name))
        .map(|d| d.name)
}

/// Parsed device parameters
#[derive(Debug)]
pub struct DeviceParams {
    /// Device name as given
    pub name: String,
    /// Key-value parameters; flags without a value map to "1"
    pub params: HashMap<String, String>,
}

impl DeviceParams {
    /// Parse a parameter as `T`
    pub fn get<T: std::str::FromStr>(
        &self,
        key: &str,
    ) -> Result<Option<T>, Box<dyn std::error::Error>>
    where
        T::Err: std::fmt::Display,
    {
        match self.params.get(key) {
            Some(value) => value
                .parse()
                .map(Some)
                .map_err(|e| format!("Invalid value for {}: '{}' ({})", key, value, e).into()),
            None => Ok(None),
        }
    }

    /// Whether a flag parameter is set
    pub fn flag(&self, key: &str) -> bool {
        matches!(self.params.get(key).map(String::as_str), Some("1" | "true" | "yes"))
    }
}

/// Parse a device string into name and parameters
///
/// Format: "name" or "name:key1=value1,key2=value2,flag"
pub fn parse_device_params(s: &str) -> Result<DeviceParams, Box<dyn std::error::Error>> {
    let (name, opts_str) = s.split_once(':').unwrap_or((s, ""));
    if name.is_empty() {
        return Err("Device name missing".into());
    }

    let mut params = HashMap::new();
    for opt in opts_str.split(',').filter(|opt| !opt.is_empty()) {
        match opt.split_once('=') {
            Some((key, value)) if !key.is_empty() => {
                params.insert(key.to_string(), value.to_string());
            }
            Some(_) => {
                return Err(
                    format!("Invalid parameter format: '{}' (expected key=value)", opt).into(),
                )
            }
            None => {
                params.insert(opt.to_string(), "1".to_string());
            }
        }
    }

    Ok(DeviceParams {
        name: name.to_string(),
        params,
    })
}

#[cfg(feature = "dummy")]
fn parse_mode(value: &str) -> Result<modflash_core::DeviceMode, Box<dyn std::error::Error>> {
    use modflash_core::DeviceMode;

    match value {
        "normal" => Ok(DeviceMode::Normal),
        "dfu" | "bulk" => Ok(DeviceMode::Bulk),
        other => Err(format!("Invalid mode: '{}' (expected normal or dfu)", other).into()),
    }
}

#[cfg(feature = "dummy")]
fn open_dummy(params: &DeviceParams) -> Result<Box<dyn DeviceHandle>, Box<dyn std::error::Error>> {
    use modflash_dummy::{DummyConfig, DummyDevice, Faults};

    let mut config = DummyConfig::default();
    if let Some(mode) = params.params.get("mode") {
        config.mode = parse_mode(mode)?;
    }
    match params.params.get("version").map(String::as_str) {
        Some("none") => config.system_version = None,
        Some(_) => config.system_version = params.get("version")?,
        None => {}
    }
    if let Some(sector) = params.get::<usize>("sector")? {
        if sector == 0 {
            return Err("Sector size must be non-zero".into());
        }
        config.sector_size = sector;
    }

    let faults = Faults {
        reopen: params
            .params
            .get("fail-reopen")
            .map(|m| parse_mode(m))
            .transpose()?,
        write_failure: params.get("fail-write")?,
        write_timeout: params.get("timeout-write")?,
        reset: params.flag("fail-reset"),
        update_state: params.flag("fail-update"),
    };

    log::info!(
        "Opening simulated device in {} mode (base firmware {})",
        config.mode,
        config
            .system_version
            .map_or_else(|| "unknown".to_string(), |v| v.to_string())
    );
    Ok(Box::new(DummyDevice::new(config).with_faults(faults)))
}

fn unknown_device_error(name: &str) -> Box<dyn std::error::Error> {
    let mut msg = format!("Unknown device: {}\n\n", name);
    msg.push_str(&device_help());
    msg.push_str("\nUse 'modflash list-devices' for more details");
    msg.into()
}

/// Open the device described by `device`
///
/// The device string can be just the name (e.g., "dummy") or include
/// parameters (e.g., "dummy:mode=dfu,version=3103").
pub fn open_device(device: &str) -> Result<Box<dyn DeviceHandle>, Box<dyn std::error::Error>> {
    let params = parse_device_params(device)?;

    let canonical_name = match find_device(&params.name) {
        Some(n) => n,
        None => return Err(unknown_device_error(&params.name)),
    };

    match canonical_name {
        #[cfg(feature = "dummy")]
        "dummy" => open_dummy(&params),
        _ => Err(unknown_device_error(&params.name)),
    }
}
