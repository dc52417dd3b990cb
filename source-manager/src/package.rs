//! Loaded source packages

use crate::manifest::{SourceManifest, MANIFEST_FILE};
use crate::{PackageError, Result};
use std::path::{Path, PathBuf};

/// Directory at the root of an import archive that holds the package
pub const PAYLOAD_DIR: &str = "Payload";

/// A source package with a validated manifest
#[derive(Debug, Clone)]
pub struct SourcePackage {
    /// Parsed manifest
    pub manifest: SourceManifest,

    /// Directory holding `source.json` and the executable content
    pub path: PathBuf,
}

impl SourcePackage {
    /// Load a package whose manifest sits directly in `dir`.
    ///
    /// Installed packages are laid out this way: the registry directory
    /// `Sources/<id>` is the former `Payload` directory.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let manifest = SourceManifest::from_file(&dir.join(MANIFEST_FILE))?;
        Ok(Self {
            manifest,
            path: dir.to_path_buf(),
        })
    }

    /// Load the package from an extracted archive tree.
    pub fn from_payload(extract_root: &Path) -> Result<Self> {
        let payload = extract_root.join(PAYLOAD_DIR);
        if !payload.is_dir() {
            return Err(PackageError::MissingPayload {
                path: extract_root.to_path_buf(),
            });
        }
        Self::from_dir(&payload)
    }

    pub fn id(&self) -> &str {
        self.manifest.id()
    }

    pub fn name(&self) -> &str {
        &self.manifest.info.name
    }

    /// Manifest version, used to tell updates apart
    pub fn version(&self) -> u32 {
        self.manifest.info.version
    }

    /// Every declared language code
    pub fn languages(&self) -> Vec<String> {
        self.manifest.language_codes()
    }

    /// Languages enabled when the user has not picked any
    pub fn default_languages(&self) -> Vec<String> {
        self.manifest.default_languages()
    }
}
