//! Installed sources, as found on disk

use crate::events::{ChangeNotifier, RegistryEvent};
use crate::{PackageError, Result, SourcePackage};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Directory-backed set of installed sources.
///
/// Nothing is cached: every query rescans `root` and parses each child's
/// manifest, so directories added or removed by hand show up immediately.
/// A child is only listed when its directory name matches its manifest id,
/// so each id has a single home at `root/<id>`. Children that fail to load,
/// misnamed children and hidden staging directories are skipped.
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    root: PathBuf,
    notifier: ChangeNotifier,
}

impl SourceRegistry {
    /// Create a registry rooted at `root`, publishing changes on `notifier`
    pub fn new(root: PathBuf, notifier: ChangeNotifier) -> Self {
        Self { root, notifier }
    }

    /// Directory holding one child per installed source
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Channel that install and removal events are published on
    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Every installed source, in directory order
    pub fn list_installed(&self) -> Vec<SourcePackage> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!("Failed to read registry {}: {}", self.root.display(), e);
                }
                return Vec::new();
            }
        };

        entries
            .flatten()
            .filter(|entry| !entry.file_name().to_string_lossy().starts_with('.'))
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| match SourcePackage::from_dir(&entry.path()) {
                Ok(package) if entry.file_name() == package.id() => Some(package),
                Ok(package) => {
                    debug!(
                        "Skipping {}: directory name does not match id {}",
                        entry.path().display(),
                        package.id()
                    );
                    None
                }
                Err(e) => {
                    debug!("Skipping {}: {}", entry.path().display(), e);
                    None
                }
            })
            .collect()
    }

    /// Installed source with the given id
    pub fn find(&self, id: &str) -> Option<SourcePackage> {
        self.list_installed().into_iter().find(|p| p.id() == id)
    }

    /// Whether a source with the given id is installed
    pub fn exists(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    /// Default languages of an installed source; empty when it is not installed
    pub fn default_languages(&self, id: &str) -> Vec<String> {
        self.find(id)
            .map(|p| p.default_languages())
            .unwrap_or_default()
    }

    /// Delete a source, logging rather than returning failures
    pub fn remove_one(&self, package: &SourcePackage) {
        if let Err(e) = self.try_remove_one(package) {
            warn!("{}", e);
        }
    }

    /// Delete a source. A directory that is already gone is not an error.
    pub fn try_remove_one(&self, package: &SourcePackage) -> Result<()> {
        let result = remove_package_dir(&package.path);
        self.notifier.publish(RegistryEvent::Removed {
            id: package.id().to_string(),
        });
        if result.is_ok() {
            info!("Removed {}", package.id());
        }
        result
    }

    /// Delete every installed source, logging rather than returning failures
    pub fn remove_all(&self) {
        if let Err(e) = self.try_remove_all() {
            warn!("{}", e);
        }
    }

    /// Delete every installed source; one event is published for the whole batch.
    ///
    /// Every package is attempted; the first failure is returned.
    pub fn try_remove_all(&self) -> Result<()> {
        let mut first_error = None;
        let mut removed = 0;
        for package in self.list_installed() {
            match remove_package_dir(&package.path) {
                Ok(()) => removed += 1,
                Err(e) => {
                    warn!("{}", e);
                    first_error.get_or_insert(e);
                }
            }
        }

        self.notifier.publish(RegistryEvent::Cleared);
        info!("Removed {} sources", removed);

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn remove_package_dir(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(PackageError::RemovalFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::MANIFEST_FILE;
    use tempfile::TempDir;

    fn install_by_hand(root: &Path, dir_name: &str, id: &str) -> PathBuf {
        let dir = root.join(dir_name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join(MANIFEST_FILE),
            format!(
                r#"{{ "info": {{ "id": "{}" }}, "languages": [{{ "code": "en", "default": true }}] }}"#,
                id
            ),
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_missing_root_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let registry = SourceRegistry::new(temp_dir.path().join("Sources"), ChangeNotifier::new());
        assert!(registry.list_installed().is_empty());
        assert!(!registry.exists("x"));
    }

    #[test]
    fn test_scan_reflects_filesystem() {
        let temp_dir = TempDir::new().unwrap();
        let registry = SourceRegistry::new(temp_dir.path().to_path_buf(), ChangeNotifier::new());

        install_by_hand(temp_dir.path(), "x", "x");
        install_by_hand(temp_dir.path(), ".x.incoming-1-0", "x");
        install_by_hand(temp_dir.path(), "renamed", "x");
        fs::create_dir_all(temp_dir.path().join("broken")).unwrap();
        fs::write(temp_dir.path().join("stray-file"), "").unwrap();

        let installed = registry.list_installed();
        assert_eq!(installed.len(), 1);
        assert_eq!(installed[0].id(), "x");
        assert_eq!(registry.default_languages("x"), vec!["en"]);
        assert!(registry.default_languages("missing").is_empty());
        assert_eq!(registry.find("x").unwrap().path, temp_dir.path().join("x"));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_package_is_listed() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("Sources");
        fs::create_dir_all(&root).unwrap();
        let target = install_by_hand(temp_dir.path(), "elsewhere", "x");
        std::os::unix::fs::symlink(&target, root.join("x")).unwrap();

        let registry = SourceRegistry::new(root.clone(), ChangeNotifier::new());
        let installed = registry.list_installed();
        assert_eq!(installed.len(), 1);
        assert_eq!(installed[0].path, root.join("x"));
    }

    #[test]
    fn test_remove_one() {
        let temp_dir = TempDir::new().unwrap();
        let notifier = ChangeNotifier::new();
        let mut events = notifier.subscribe();
        let registry = SourceRegistry::new(temp_dir.path().to_path_buf(), notifier);

        let dir = install_by_hand(temp_dir.path(), "x", "x");
        let package = registry.find("x").unwrap();
        registry.remove_one(&package);

        assert!(!registry.exists("x"));
        assert!(!dir.exists());
        assert_eq!(
            events.try_recv().unwrap(),
            RegistryEvent::Removed { id: "x".to_string() }
        );

        // Removing again is not an error
        assert!(registry.try_remove_one(&package).is_ok());
    }
}
