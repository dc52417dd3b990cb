//! Source installation from local archives

use crate::extract::extract_archive;
use crate::transaction::{InstallLocks, InstallTransaction, ScratchDir};
use crate::{PackageConfig, PackageError, Result, SourcePackage, SourceRegistry};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Extracts, validates and commits archives into a [`SourceRegistry`].
///
/// Cheap to clone; clones share the per-id install locks.
#[derive(Debug, Clone)]
pub struct PackageInstaller {
    /// Registry receiving installed sources
    registry: SourceRegistry,

    /// Root for scratch directories
    temp_dir: PathBuf,

    /// Delete archives once extracted
    remove_archives: bool,

    locks: Arc<InstallLocks>,
}

impl PackageInstaller {
    /// Create a new installer
    pub fn new(config: &PackageConfig, registry: SourceRegistry) -> Self {
        Self {
            registry,
            temp_dir: config.temp_dir.clone(),
            remove_archives: config.remove_imported_archives,
            locks: Arc::new(InstallLocks::new()),
        }
    }

    /// Fresh scratch directory for one import
    pub fn scratch(&self) -> Result<ScratchDir> {
        ScratchDir::create(&self.temp_dir)
    }

    /// Install an archive that is already on disk
    pub fn install_local_archive(&self, archive: &Path) -> Result<SourcePackage> {
        if !archive.is_file() {
            return Err(PackageError::ArchiveNotFound {
                path: archive.to_path_buf(),
            });
        }

        info!("Installing {}", archive.display());
        let scratch = self.scratch()?;
        self.install_archive(archive, scratch)
    }

    /// Extract `archive` into `scratch`, load its payload and commit it.
    ///
    /// Nothing in the registry is touched unless the payload loads, so a
    /// malformed archive can never damage an installed source.
    pub fn install_archive(&self, archive: &Path, scratch: ScratchDir) -> Result<SourcePackage> {
        let extract_dir = scratch.extract_dir();
        let loaded = extract_archive(archive, &extract_dir, self.remove_archives)
            .and_then(|()| SourcePackage::from_payload(&extract_dir));

        let package = match loaded {
            Ok(package) => package,
            Err(e) => {
                scratch.close();
                return Err(e);
            }
        };
        debug!("Loaded {} from {}", package.id(), archive.display());

        InstallTransaction::new(self.registry.root(), &self.locks, self.registry.notifier())
            .commit(package, scratch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ChangeNotifier;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_installer_creation() {
        let temp_dir = TempDir::new().unwrap();
        let config = PackageConfig::with_root(temp_dir.path());
        let registry = SourceRegistry::new(config.registry_dir.clone(), ChangeNotifier::new());

        let installer = PackageInstaller::new(&config, registry);
        assert_eq!(installer.temp_dir, config.temp_dir);
        assert!(installer.remove_archives);
    }

    #[test]
    fn test_bad_archive_leaves_no_scratch() {
        let temp_dir = TempDir::new().unwrap();
        let config = PackageConfig::with_root(temp_dir.path());
        let registry = SourceRegistry::new(config.registry_dir.clone(), ChangeNotifier::new());
        let installer = PackageInstaller::new(&config, registry);

        let archive = temp_dir.path().join("bad.aix");
        fs::write(&archive, b"garbage").unwrap();

        assert!(installer.install_local_archive(&archive).is_err());
        assert_eq!(fs::read_dir(&config.temp_dir).unwrap().count(), 0);
    }
}
