//! Source manifest (source.json) handling

use crate::{PackageError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the manifest inside a package payload
pub const MANIFEST_FILE: &str = "source.json";

/// Source manifest structure (source.json)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceManifest {
    /// Identity and display metadata
    pub info: SourceInfo,

    /// Languages the source can serve
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub languages: Vec<Language>,

    /// Named listings the source exposes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub listings: Vec<Listing>,

    /// Search filters, passed through untouched
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<serde_json::Value>,
}

/// The `info` block of a manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    /// Globally unique source id
    pub id: String,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Source revision
    #[serde(default)]
    pub version: u32,

    /// Primary language code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,

    /// Homepage of the content provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Alternative provider URLs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,

    /// Content rating: 0 safe, 1 suggestive, 2 explicit
    #[serde(default)]
    pub nsfw: u8,

    /// Oldest host version able to run the source
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_app_version: Option<String>,

    /// Newest host version able to run the source
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_app_version: Option<String>,
}

/// Language declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Language {
    /// Bare language code
    Code(String),

    /// Language with a source-specific value
    Detailed {
        /// Language code shown to the user
        code: String,

        /// Value handed to the source when this language is selected
        #[serde(skip_serializing_if = "Option::is_none")]
        value: Option<String>,

        /// Whether the language is enabled by default
        #[serde(default, alias = "isDefault")]
        default: bool,
    },
}

impl Language {
    /// Language code
    pub fn code(&self) -> &str {
        match self {
            Language::Code(code) => code,
            Language::Detailed { code, .. } => code,
        }
    }

    fn is_default(&self) -> bool {
        matches!(self, Language::Detailed { default: true, .. })
    }
}

/// Listing declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub name: String,
}

impl SourceManifest {
    /// Load manifest from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| PackageError::InvalidManifest {
            path: path.to_path_buf(),
            message: format!("Failed to read file: {}", e),
        })?;

        Self::from_str(&content).map_err(|e| match e {
            PackageError::InvalidManifest { message, .. } => PackageError::InvalidManifest {
                path: path.to_path_buf(),
                message,
            },
            other => PackageError::InvalidManifest {
                path: path.to_path_buf(),
                message: format!("Failed to parse JSON: {}", other),
            },
        })
    }

    /// Parse manifest from a string
    pub fn from_str(s: &str) -> Result<Self> {
        let manifest: Self = serde_json::from_str(s)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Validate the manifest
    pub fn validate(&self) -> Result<()> {
        if self.info.id.is_empty() {
            return Err(PackageError::InvalidManifest {
                path: PathBuf::new(),
                message: "Source id cannot be empty".to_string(),
            });
        }

        if !is_valid_source_id(&self.info.id) {
            return Err(PackageError::InvalidManifest {
                path: PathBuf::new(),
                message: format!("Invalid source id: {}", self.info.id),
            });
        }

        Ok(())
    }

    /// Source id
    pub fn id(&self) -> &str {
        &self.info.id
    }

    /// Every declared language code
    pub fn language_codes(&self) -> Vec<String> {
        if self.languages.is_empty() {
            return self.info.lang.iter().cloned().collect();
        }
        self.languages.iter().map(|l| l.code().to_string()).collect()
    }

    /// Languages enabled when the user has not picked any.
    ///
    /// Flagged defaults win; otherwise the first declared language. A source
    /// without a language list falls back to `info.lang`, except for the
    /// `multi` placeholder.
    pub fn default_languages(&self) -> Vec<String> {
        let flagged: Vec<String> = self
            .languages
            .iter()
            .filter(|l| l.is_default())
            .map(|l| l.code().to_string())
            .collect();
        if !flagged.is_empty() {
            return flagged;
        }

        if let Some(first) = self.languages.first() {
            return vec![first.code().to_string()];
        }

        match self.info.lang.as_deref() {
            Some(lang) if lang != "multi" => vec![lang.to_string()],
            _ => Vec::new(),
        }
    }
}

/// Check if a source id can be used as a registry directory name
fn is_valid_source_id(id: &str) -> bool {
    !id.is_empty()
        && !id.starts_with('.')
        && !id.contains(['/', '\\', '\0'])
}
