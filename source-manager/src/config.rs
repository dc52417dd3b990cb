//! Source manager configuration

use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the registry directory inside the application data directory
pub const REGISTRY_DIR_NAME: &str = "Sources";

/// Source manager configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageConfig {
    /// Directory holding one subdirectory per installed source
    #[serde(default = "default_registry_dir")]
    pub registry_dir: PathBuf,

    /// Root for per-import scratch directories
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// HTTP timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// User-Agent sent with archive downloads
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Largest archive accepted from the network, in bytes (0 = no limit)
    #[serde(default)]
    pub max_archive_bytes: u64,

    /// Delete the imported archive once it has been extracted
    #[serde(default = "default_remove_imported_archives")]
    pub remove_imported_archives: bool,
}

fn default_registry_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("source-manager")
        .join(REGISTRY_DIR_NAME)
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join("source-manager")
}

fn default_timeout() -> u64 {
    300 // 5 minutes
}

fn default_user_agent() -> String {
    format!("source-manager/{}", env!("CARGO_PKG_VERSION"))
}

fn default_remove_imported_archives() -> bool {
    true
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            registry_dir: default_registry_dir(),
            temp_dir: default_temp_dir(),
            timeout: default_timeout(),
            user_agent: default_user_agent(),
            max_archive_bytes: 0,
            remove_imported_archives: default_remove_imported_archives(),
        }
    }
}

impl PackageConfig {
    /// Configuration rooted at `base`: registry in `base/Sources`, scratch in `base/tmp`
    pub fn with_root(base: &Path) -> Self {
        Self {
            registry_dir: base.join(REGISTRY_DIR_NAME),
            temp_dir: base.join("tmp"),
            ..Self::default()
        }
    }

    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        if let Some(config_path) = Self::config_path() {
            if config_path.exists() {
                return Self::load_from(&config_path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        if let Some(config_path) = Self::config_path() {
            self.save_to(&config_path)?;
        }

        Ok(())
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("source-manager").join("config.toml"))
    }

    /// Create necessary directories
    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.registry_dir)?;
        std::fs::create_dir_all(&self.temp_dir)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = PackageConfig::default();
        assert!(config.registry_dir.ends_with(REGISTRY_DIR_NAME));
        assert_eq!(config.timeout, 300);
        assert_eq!(config.max_archive_bytes, 0);
        assert!(config.remove_imported_archives);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "registry_dir = \"/data/Sources\"\ntimeout = 30\n").unwrap();

        let config = PackageConfig::load_from(&path).unwrap();
        assert_eq!(config.registry_dir, PathBuf::from("/data/Sources"));
        assert_eq!(config.timeout, 30);
        assert!(config.remove_imported_archives);
        assert_eq!(config.temp_dir, default_temp_dir());
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = PackageConfig::with_root(temp_dir.path());
        config.max_archive_bytes = 1024;
        config.save_to(&path).unwrap();

        let loaded = PackageConfig::load_from(&path).unwrap();
        assert_eq!(loaded.registry_dir, temp_dir.path().join(REGISTRY_DIR_NAME));
        assert_eq!(loaded.max_archive_bytes, 1024);
    }

    #[test]
    fn test_ensure_directories() {
        let temp_dir = TempDir::new().unwrap();
        let config = PackageConfig::with_root(temp_dir.path());
        config.ensure_directories().unwrap();
        assert!(config.registry_dir.is_dir());
        assert!(config.temp_dir.is_dir());
    }
}
