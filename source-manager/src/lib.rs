//! Source Package Manager
//!
//! Manages the sources installed on this device, including:
//! - Source manifest (source.json) handling
//! - Fetching archives from URLs or local paths
//! - Zip extraction into per-import scratch directories
//! - Replacing an installed source in one transaction
//! - Lookup over the `Sources` directory
//! - Change notifications for registry observers

pub mod error;
pub mod manifest;
pub mod package;
pub mod fetch;
pub mod extract;
pub mod transaction;
pub mod registry;
pub mod installer;
pub mod events;
pub mod manager;
pub mod config;
pub mod logging;

pub use error::{PackageError, Result};
pub use manifest::{SourceManifest, SourceInfo, Language};
pub use package::SourcePackage;
pub use fetch::SourceLocation;
pub use registry::SourceRegistry;
pub use installer::PackageInstaller;
pub use events::{ChangeNotifier, RegistryEvent};
pub use manager::SourceManager;
pub use config::PackageConfig;
