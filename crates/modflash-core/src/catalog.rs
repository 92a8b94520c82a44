//! Base-firmware binary catalogs
//!
//! A catalog maps a required base-firmware version to a release and hands
//! out the release's modules. Downloading from a remote service is left to
//! other implementations; `DirectoryCatalog` serves a local cache laid out
//! as:
//!
//! ```text
//! <root>/<platform id>/releases.ron          version -> release mapping
//! <root>/<platform id>/<release>/manifest.ron bundle manifest
//! ```
//!
//! `releases.ron` looks like:
//!
//! ```ron
//! (releases: [(version: 3103, release: "3.1.0"), (version: 4000, release: "4.0.0")])
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{CatalogError, Error};
use crate::module::{FirmwareModule, ManifestParser, ModuleParser};

/// Source of base-firmware binaries
pub trait BinaryCatalog {
    /// Release that provides at least `module_version` on `platform_id`
    fn release_for_version(
        &mut self,
        platform_id: u16,
        module_version: u32,
    ) -> Result<String, CatalogError>;

    /// Modules that make up `release` on `platform_id`
    fn fetch(&mut self, platform_id: u16, release: &str)
        -> Result<Vec<FirmwareModule>, CatalogError>;
}

#[derive(Debug, serde::Deserialize)]
struct ReleasesDef {
    releases: Vec<ReleaseDef>,
}

#[derive(Debug, serde::Deserialize)]
struct ReleaseDef {
    version: u32,
    release: String,
}

/// Catalog backed by a local directory
#[derive(Debug, Clone)]
pub struct DirectoryCatalog {
    root: PathBuf,
}

impl DirectoryCatalog {
    /// Create a catalog rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the catalog
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn platform_dir(&self, platform_id: u16) -> PathBuf {
        self.root.join(platform_id.to_string())
    }
}

/// Pick the oldest release that is at least `module_version`
fn pick_release(releases: &[ReleaseDef], module_version: u32) -> Option<&ReleaseDef> {
    releases
        .iter()
        .filter(|r| r.version >= module_version)
        .min_by_key(|r| r.version)
}

impl BinaryCatalog for DirectoryCatalog {
    fn release_for_version(
        &mut self,
        platform_id: u16,
        module_version: u32,
    ) -> Result<String, CatalogError> {
        let path = self.platform_dir(platform_id).join("releases.ron");
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CatalogError::NotFound {
                    platform_id,
                    release: module_version.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        let def: ReleasesDef = ron::from_str(&content)
            .map_err(|e| CatalogError::Parse(format!("{}: {}", path.display(), e)))?;

        pick_release(&def.releases, module_version)
            .map(|r| r.release.clone())
            .ok_or_else(|| CatalogError::NotFound {
                platform_id,
                release: module_version.to_string(),
            })
    }

    fn fetch(
        &mut self,
        platform_id: u16,
        release: &str,
    ) -> Result<Vec<FirmwareModule>, CatalogError> {
        let manifest = self.platform_dir(platform_id).join(release).join("manifest.ron");
        if !manifest.is_file() {
            return Err(CatalogError::NotFound {
                platform_id,
                release: release.to_string(),
            });
        }

        log::info!("Using base firmware {} from {}", release, manifest.display());
        ManifestParser.parse(&manifest).map_err(|e| match e {
            Error::Parse { path, reason } => {
                CatalogError::Parse(format!("{}: {}", path.display(), reason))
            }
            other => CatalogError::Parse(other.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ModuleType;

    /// Catalog with one published release for platform 12
    ///
    /// The returned directory must outlive the catalog.
    fn scratch_catalog() -> (tempfile::TempDir, DirectoryCatalog) {
        let root = tempfile::TempDir::new().unwrap();
        let platform = root.path().join("12");
        fs::create_dir_all(platform.join("3.1.0")).unwrap();
        fs::write(
            platform.join("releases.ron"),
            r#"(releases: [(version: 4000, release: "4.0.0"), (version: 3103, release: "3.1.0")])"#,
        )
        .unwrap();
        fs::write(platform.join("3.1.0").join("system.bin"), [0x5Au8; 32]).unwrap();
        fs::write(
            platform.join("3.1.0").join("manifest.ron"),
            r#"(modules: [(file: "system.bin", type: SystemPart, index: 1, version: 3103, platform_id: 12, address: Some(0x30000))])"#,
        )
        .unwrap();
        let catalog = DirectoryCatalog::new(root.path());
        (root, catalog)
    }

    #[test]
    fn test_release_for_version() {
        let (_root, mut catalog) = scratch_catalog();
        assert_eq!(catalog.release_for_version(12, 3103).unwrap(), "3.1.0");
        assert_eq!(catalog.release_for_version(12, 3200).unwrap(), "4.0.0");
        assert!(matches!(
            catalog.release_for_version(12, 5000),
            Err(CatalogError::NotFound { .. })
        ));
        assert!(matches!(
            catalog.release_for_version(13, 3103),
            Err(CatalogError::NotFound { .. })
        ));
    }

    #[test]
    fn test_fetch() {
        let (_root, mut catalog) = scratch_catalog();
        let modules = catalog.fetch(12, "3.1.0").unwrap();
        assert_eq!(modules.len(), 1);
        assert_eq!(modules[0].module_type, ModuleType::SystemPart);
        assert_eq!(modules[0].start_address, Some(0x30000));

        assert!(matches!(
            catalog.fetch(12, "4.0.0"),
            Err(CatalogError::NotFound { .. })
        ));
    }
}
