//! modflash - Multi-module firmware flasher
//!
//! Flashes a set of firmware modules (boot-loader, base firmware,
//! application, coprocessor firmware, assets) to a device that switches
//! between two transfer modes:
//! - **Normal mode** - the application firmware is running and accepts
//!   whole modules through its update protocol
//! - **DFU mode** - the boot-loader is active and accepts addressed block
//!   writes into internal flash
//!
//! The heavy lifting (base-firmware resolution, filtering, validation,
//! planning and execution) lives in `modflash-core`; this binary parses
//! arguments, loads the platform database and configuration, opens the
//! device and renders progress.

mod cli;
mod commands;
mod devices;

use clap::Parser;
use cli::{Cli, Commands, PlanArgs};
use modflash_core::{
    DirectoryCatalog, FirmwareModule, FlashConfig, FlashOptions, Flasher, ManifestParser,
    ModuleParser, PlatformDatabase,
};
use std::path::{Path, PathBuf};

/// Configuration file picked up from the working directory
const DEFAULT_CONFIG: &str = "modflash.toml";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Flash {
            device,
            plan,
            no_reset,
        } => {
            let db = load_platform_database(cli.platform_db.as_deref())?;
            let modules = load_modules(&plan.manifests)?;
            let mut flasher = build_flasher(&db, config, &plan, no_reset)?;
            let mut device = devices::open_device(&device)?;
            commands::run_flash(&mut flasher, device.as_mut(), modules)
        }
        Commands::Plan {
            plan,
            mode,
            installed,
        } => {
            let db = load_platform_database(cli.platform_db.as_deref())?;
            let modules = load_modules(&plan.manifests)?;
            let mut flasher = build_flasher(&db, config, &plan, false)?;
            commands::run_plan(&mut flasher, modules, mode.into(), installed)
        }
        Commands::Inspect { manifests } => commands::run_inspect(&ManifestParser, &manifests),
        Commands::ListDevices => {
            commands::list_devices();
            Ok(())
        }
        Commands::ListPlatforms => {
            let db = load_platform_database(cli.platform_db.as_deref())?;
            commands::list_platforms(&db);
            Ok(())
        }
    }
}

/// Load the tool configuration from the given file, `./modflash.toml`, or defaults
fn load_config(path: Option<&Path>) -> Result<FlashConfig, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        let config = FlashConfig::from_toml_file(path)?;
        log::debug!("Loaded configuration from {}", path.display());
        return Ok(config);
    }

    let default = Path::new(DEFAULT_CONFIG);
    if default.is_file() {
        let config = FlashConfig::from_toml_file(default)?;
        log::debug!("Loaded configuration from {}", default.display());
        Ok(config)
    } else {
        Ok(FlashConfig::default())
    }
}

/// Platform directories searched when `--platform-db` is not given
const DEFAULT_PLATFORM_DIRS: [&str; 3] = [
    "platforms",
    "/usr/share/modflash/platforms",
    "/usr/local/share/modflash/platforms",
];

/// Load the platform database from the specified path or default locations
fn load_platform_database(
    path: Option<&Path>,
) -> Result<PlatformDatabase, Box<dyn std::error::Error>> {
    let db = match path {
        Some(path) => load_platform_path(path)?,
        None => {
            let dirs: Vec<PathBuf> = DEFAULT_PLATFORM_DIRS.into_iter().map(PathBuf::from).collect();
            load_platform_dirs(&dirs)?
        }
    };

    log::info!("Loaded {} platform definitions", db.len());
    Ok(db)
}

/// Load a user-specified platform file or directory
fn load_platform_path(path: &Path) -> Result<PlatformDatabase, Box<dyn std::error::Error>> {
    let mut db = PlatformDatabase::new();
    if path.is_dir() {
        db.load_dir(path)?;
    } else if path.is_file() {
        db.load_file(path)?;
    } else {
        return Err(format!("Platform database path not found: {}", path.display()).into());
    }

    if db.is_empty() {
        return Err(format!("No platform definitions in {}", path.display()).into());
    }
    Ok(db)
}

/// Load every readable directory in `dirs`; at least one platform must load
fn load_platform_dirs(dirs: &[PathBuf]) -> Result<PlatformDatabase, Box<dyn std::error::Error>> {
    let mut db = PlatformDatabase::new();
    for dir in dirs.iter().filter(|dir| dir.is_dir()) {
        match db.load_dir(dir) {
            Ok(count) => log::debug!("Loaded {} platforms from {}", count, dir.display()),
            Err(e) => log::warn!("Failed to load platforms from {}: {}", dir.display(), e),
        }
    }

    if db.is_empty() {
        let searched: Vec<String> = dirs.iter().map(|d| d.display().to_string()).collect();
        return Err(format!(
            "No platform definitions found (searched {}); use --platform-db",
            searched.join(", ")
        )
        .into());
    }
    Ok(db)
}

/// Parse every manifest and collect the modules in command-line order
fn load_modules(manifests: &[PathBuf]) -> Result<Vec<FirmwareModule>, Box<dyn std::error::Error>> {
    let mut modules = Vec::new();
    for path in manifests {
        let parsed = ManifestParser.parse(path)?;
        log::debug!("{}: {} module(s)", path.display(), parsed.len());
        modules.extend(parsed);
    }
    Ok(modules)
}

/// Create a flasher for the platform and policy given on the command line
fn build_flasher(
    db: &PlatformDatabase,
    config: FlashConfig,
    args: &PlanArgs,
    no_reset: bool,
) -> Result<Flasher<DirectoryCatalog>, Box<dyn std::error::Error>> {
    let platform_id = match db.lookup(&args.platform) {
        Some(platform) => platform.id,
        None => args
            .platform
            .parse::<u16>()
            .map_err(|_| format!("Unknown platform: {}", args.platform))?,
    };

    let catalog_dir = args
        .catalog_dir
        .clone()
        .unwrap_or_else(|| config.catalog_dir());
    log::debug!("Using binary catalog at {}", catalog_dir.display());

    let options = FlashOptions {
        allow_all: args.allow_all,
        application_only: args.application_only,
        skip_base_firmware: args.skip_base_firmware,
        target_version: args.target.clone(),
        no_reset,
    };

    Ok(
        Flasher::from_database(db, platform_id, DirectoryCatalog::new(catalog_dir))?
            .with_options(options)
            .with_config(config),
    )
}
