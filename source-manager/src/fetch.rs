//! Resolving a source reference into a local archive

use crate::{PackageConfig, PackageError, Result};
use reqwest::Url;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// File name used for downloaded archives inside a scratch directory
pub const ARCHIVE_FILE: &str = "archive.zip";

/// Where an archive comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    /// Archive already on local disk
    Local(PathBuf),

    /// Archive served over HTTP(S)
    Remote(Url),
}

impl SourceLocation {
    /// Interpret `s` as a URL or a filesystem path.
    ///
    /// `file://` URLs and bare paths are local; `http` and `https` are
    /// remote. Anything else is rejected.
    pub fn parse(s: &str) -> Result<Self> {
        let url = match Url::parse(s) {
            Ok(url) => url,
            Err(_) => return Ok(SourceLocation::Local(PathBuf::from(s))),
        };

        match url.scheme() {
            "file" => url
                .to_file_path()
                .map(SourceLocation::Local)
                .map_err(|_| PackageError::UnsupportedScheme {
                    scheme: "file".to_string(),
                }),
            "http" | "https" => Ok(SourceLocation::Remote(url)),
            // Windows drive letters parse as one-letter schemes
            scheme if scheme.len() == 1 => Ok(SourceLocation::Local(PathBuf::from(s))),
            scheme => Err(PackageError::UnsupportedScheme {
                scheme: scheme.to_string(),
            }),
        }
    }

    /// Whether fetching needs the network
    pub fn is_remote(&self) -> bool {
        matches!(self, SourceLocation::Remote(_))
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLocation::Local(path) => write!(f, "{}", path.display()),
            SourceLocation::Remote(url) => write!(f, "{}", url),
        }
    }
}

/// Produces a local archive file for a [`SourceLocation`]
pub struct ArchiveFetcher {
    client: reqwest::Client,
    max_bytes: u64,
}

impl ArchiveFetcher {
    /// Create a new fetcher with the configured timeout, user agent and size cap
    pub fn new(config: &PackageConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            max_bytes: config.max_archive_bytes,
        })
    }

    /// Return the path of a local archive, downloading into `scratch` when remote.
    pub async fn fetch(&self, location: &SourceLocation, scratch: &Path) -> Result<PathBuf> {
        match location {
            SourceLocation::Local(path) => {
                if !path.is_file() {
                    return Err(PackageError::ArchiveNotFound { path: path.clone() });
                }
                debug!("Using local archive {}", path.display());
                Ok(path.clone())
            }
            SourceLocation::Remote(url) => {
                let dest = scratch.join(ARCHIVE_FILE);
                self.download(url, &dest).await?;
                Ok(dest)
            }
        }
    }

    /// Stream `url` into `dest`. A partial file is removed on failure.
    async fn download(&self, url: &Url, dest: &Path) -> Result<()> {
        let fail = |message: String| PackageError::FetchFailed {
            url: url.to_string(),
            message,
        };

        info!("Downloading {}", url);
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| fail(format!("request failed: {}", e)))?;

        let mut response = response
            .error_for_status()
            .map_err(|e| fail(e.to_string()))?;

        if let Some(length) = response.content_length() {
            if self.max_bytes > 0 && length > self.max_bytes {
                return Err(fail(format!(
                    "archive too large ({} bytes, max {})",
                    length, self.max_bytes
                )));
            }
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let written = async {
            let mut written: u64 = 0;
            while let Some(chunk) = response
                .chunk()
                .await
                .map_err(|e| fail(format!("failed to read body: {}", e)))?
            {
                written += chunk.len() as u64;
                if self.max_bytes > 0 && written > self.max_bytes {
                    return Err(fail(format!(
                        "archive exceeds {} bytes",
                        self.max_bytes
                    )));
                }
                file.write_all(&chunk).await?;
            }
            file.flush().await?;
            Ok::<u64, PackageError>(written)
        }
        .await;

        match written {
            Ok(bytes) => {
                debug!("Downloaded {} bytes to {}", bytes, dest.display());
                Ok(())
            }
            Err(e) => {
                drop(file);
                tokio::fs::remove_file(dest).await.ok();
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_locations() {
        assert_eq!(
            SourceLocation::parse("/tmp/source.aix").unwrap(),
            SourceLocation::Local(PathBuf::from("/tmp/source.aix"))
        );
        assert_eq!(
            SourceLocation::parse("relative/source.aix").unwrap(),
            SourceLocation::Local(PathBuf::from("relative/source.aix"))
        );
        assert!(SourceLocation::parse("https://example.com/en.test.aix")
            .unwrap()
            .is_remote());
        assert!(matches!(
            SourceLocation::parse("ftp://example.com/a.zip"),
            Err(PackageError::UnsupportedScheme { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_parse_file_url() {
        assert_eq!(
            SourceLocation::parse("file:///tmp/source.aix").unwrap(),
            SourceLocation::Local(PathBuf::from("/tmp/source.aix"))
        );
    }

    #[tokio::test]
    async fn test_missing_local_archive() {
        let temp_dir = TempDir::new().unwrap();
        let fetcher = ArchiveFetcher::new(&PackageConfig::with_root(temp_dir.path())).unwrap();
        let location = SourceLocation::Local(temp_dir.path().join("missing.aix"));

        let err = fetcher.fetch(&location, temp_dir.path()).await.unwrap_err();
        assert!(err.is_fetch_error());
    }
}
