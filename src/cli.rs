//! CLI argument parsing

use crate::devices;
use clap::{Parser, Subcommand, ValueEnum};
use modflash_core::DeviceMode;
use std::path::PathBuf;

/// Generate dynamic help text for the device argument
fn device_help() -> String {
    format!(
        "Device to flash, as name[:key=value,...] [available: {}]",
        devices::device_names_short()
    )
}

/// Device mode as given on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Application firmware running
    Normal,
    /// Boot-loader active
    Dfu,
}

impl From<ModeArg> for DeviceMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Normal => DeviceMode::Normal,
            ModeArg::Dfu => DeviceMode::Bulk,
        }
    }
}

#[derive(Parser)]
#[command(name = "modflash")]
#[command(author, version, about = "Multi-module firmware flasher", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to platform database directory (contains .ron files)
    /// Defaults to looking in ./platforms/ and /usr/share/modflash/platforms/
    #[arg(long, global = true)]
    pub platform_db: Option<PathBuf>,

    /// Configuration file (TOML format, defaults to ./modflash.toml if present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Module selection and policy options shared by flash and plan
#[derive(clap::Args, Debug, Clone)]
pub struct PlanArgs {
    /// Target platform (id or name)
    #[arg(short = 'P', long)]
    pub platform: String,

    /// Bundle manifests listing the modules to flash
    #[arg(required = true)]
    pub manifests: Vec<PathBuf>,

    /// Also flash radio stacks and coprocessor firmware
    #[arg(long)]
    pub allow_all: bool,

    /// Flash only the given modules, never fetch base firmware
    #[arg(long)]
    pub application_only: bool,

    /// Don't fetch base firmware for a device that is out of date
    #[arg(long)]
    pub skip_base_firmware: bool,

    /// Base-firmware release to flash along with the modules
    #[arg(long)]
    pub target: Option<String>,

    /// Local base-firmware binary cache (overrides the config file)
    #[arg(long)]
    pub catalog_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Flash modules to a device
    Flash {
        /// Device to flash
        #[arg(short, long, help = device_help())]
        device: String,

        #[command(flatten)]
        plan: PlanArgs,

        /// Don't reset the device when done
        #[arg(long)]
        no_reset: bool,
    },

    /// Show the steps a flash would perform, without a device
    Plan {
        #[command(flatten)]
        plan: PlanArgs,

        /// Mode the device is assumed to be in
        #[arg(long, value_enum, default_value = "normal")]
        mode: ModeArg,

        /// Base-firmware version assumed to be installed (unknown if omitted)
        #[arg(long)]
        installed: Option<u32>,
    },

    /// Show the modules in bundle manifests and their checks
    Inspect {
        /// Bundle manifests to inspect
        #[arg(required = true)]
        manifests: Vec<PathBuf>,
    },

    /// List supported device backends
    ListDevices,

    /// List known platforms
    ListPlatforms,
}
