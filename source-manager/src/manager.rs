//! Host-facing entry point

use crate::events::RegistryEvent;
use crate::fetch::{ArchiveFetcher, SourceLocation};
use crate::{
    ChangeNotifier, PackageConfig, PackageError, PackageInstaller, Result, SourcePackage,
    SourceRegistry,
};
use std::path::Path;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Installs, looks up and removes sources.
///
/// The plain methods never fail: errors are logged and reported as `None`
/// or ignored. The `try_` variants return them.
pub struct SourceManager {
    config: PackageConfig,
    registry: SourceRegistry,
    installer: PackageInstaller,
    fetcher: ArchiveFetcher,
}

impl SourceManager {
    /// Create a new manager for the directories named in `config`
    pub fn new(config: PackageConfig) -> Result<Self> {
        let registry = SourceRegistry::new(config.registry_dir.clone(), ChangeNotifier::new());
        let installer = PackageInstaller::new(&config, registry.clone());
        let fetcher = ArchiveFetcher::new(&config)?;

        Ok(Self {
            config,
            registry,
            installer,
            fetcher,
        })
    }

    /// Manager using the configuration file, or defaults when there is none
    pub fn from_default_config() -> Result<Self> {
        Self::new(PackageConfig::load()?)
    }

    /// Configuration this manager was built with
    pub fn config(&self) -> &PackageConfig {
        &self.config
    }

    /// Underlying registry of installed sources
    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Every installed source, rescanned from disk
    pub fn list_installed(&self) -> Vec<SourcePackage> {
        self.registry.list_installed()
    }

    /// Installed source with the given id
    pub fn find(&self, id: &str) -> Option<SourcePackage> {
        self.registry.find(id)
    }

    /// Whether a source with the given id is installed
    pub fn exists(&self, id: &str) -> bool {
        self.registry.exists(id)
    }

    /// Default languages of an installed source; empty when it is not installed
    pub fn default_languages(&self, id: &str) -> Vec<String> {
        self.registry.default_languages(id)
    }

    /// Receive an event after every install or removal
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.registry.notifier().subscribe()
    }

    /// Import from a URL or path, returning `None` on any failure
    pub async fn import(&self, source: &str) -> Option<SourcePackage> {
        match self.try_import(source).await {
            Ok(package) => Some(package),
            Err(e) => {
                warn!("Failed to import {}: {}", source, e);
                None
            }
        }
    }

    /// Import from a URL or path.
    ///
    /// Remote archives are downloaded into the import's scratch directory;
    /// extraction and the install transaction run on the blocking pool.
    pub async fn try_import(&self, source: &str) -> Result<SourcePackage> {
        let location = SourceLocation::parse(source)?;
        info!("Importing {}", location);

        let scratch = self.installer.scratch()?;
        let archive = self.fetcher.fetch(&location, scratch.path()).await?;

        let installer = self.installer.clone();
        tokio::task::spawn_blocking(move || installer.install_archive(&archive, scratch))
            .await
            .map_err(|e| PackageError::Other(anyhow::anyhow!("install task failed: {}", e)))?
    }

    /// Import an archive already on disk, returning `None` on any failure
    pub fn import_local_archive(&self, path: &Path) -> Option<SourcePackage> {
        match self.try_import_local_archive(path) {
            Ok(package) => Some(package),
            Err(e) => {
                warn!("Failed to import {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Import an archive already on disk.
    ///
    /// The archive is deleted after extraction unless the configuration says otherwise.
    pub fn try_import_local_archive(&self, path: &Path) -> Result<SourcePackage> {
        self.installer.install_local_archive(path)
    }

    /// Delete an installed source, logging any failure
    pub fn remove_one(&self, package: &SourcePackage) {
        self.registry.remove_one(package)
    }

    /// Delete an installed source
    pub fn try_remove_one(&self, package: &SourcePackage) -> Result<()> {
        self.registry.try_remove_one(package)
    }

    /// Delete every installed source, logging any failure
    pub fn remove_all(&self) {
        self.registry.remove_all()
    }

    /// Delete every installed source, returning the first failure
    pub fn try_remove_all(&self) -> Result<()> {
        self.registry.try_remove_all()
    }
}
