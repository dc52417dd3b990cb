//! Source manager error types

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PackageError>;

#[derive(Error, Debug)]
pub enum PackageError {
    #[error("Failed to fetch {url}: {message}")]
    FetchFailed { url: String, message: String },

    #[error("Archive not found: {path}")]
    ArchiveNotFound { path: PathBuf },

    #[error("Unsupported source scheme: {scheme}")]
    UnsupportedScheme { scheme: String },

    #[error("Failed to extract {path}: {message}")]
    ExtractFailed { path: PathBuf, message: String },

    #[error("No Payload directory in {path}")]
    MissingPayload { path: PathBuf },

    #[error("Invalid manifest at {path}: {message}")]
    InvalidManifest { path: PathBuf, message: String },

    #[error("Installation failed for {id}: {message}")]
    InstallFailed { id: String, message: String },

    #[error("Failed to remove {path}: {message}")]
    RemovalFailed { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PackageError {
    /// Whether the error happened before the archive reached local disk.
    pub fn is_fetch_error(&self) -> bool {
        matches!(
            self,
            PackageError::FetchFailed { .. }
                | PackageError::ArchiveNotFound { .. }
                | PackageError::UnsupportedScheme { .. }
                | PackageError::Http(_)
        )
    }

    /// Whether the package itself was rejected (bad layout or manifest).
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            PackageError::MissingPayload { .. } | PackageError::InvalidManifest { .. }
        )
    }
}
