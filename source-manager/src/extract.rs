//! Zip archive extraction

use crate::{PackageError, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Unpack the zip at `archive` into `dest`, which must not exist yet.
///
/// The archive is deleted afterwards when `remove_archive` is set. On error
/// `dest` may hold partial output; the caller owns its cleanup.
pub fn extract_archive(archive: &Path, dest: &Path, remove_archive: bool) -> Result<()> {
    let fail = |message: String| PackageError::ExtractFailed {
        path: archive.to_path_buf(),
        message,
    };

    let file = fs::File::open(archive).map_err(|e| fail(format!("failed to open archive: {}", e)))?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| fail(e.to_string()))?;

    fs::create_dir(dest).map_err(|e| fail(format!("failed to create {}: {}", dest.display(), e)))?;

    // Entries with absolute or `..` paths are refused by the reader
    zip.extract(dest).map_err(|e| fail(e.to_string()))?;
    debug!(
        "Extracted {} entries from {} into {}",
        zip.len(),
        archive.display(),
        dest.display()
    );

    if remove_archive {
        if let Err(e) = fs::remove_file(archive) {
            warn!("Failed to remove archive {}: {}", archive.display(), e);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::FileOptions;

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let file = fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        for (name, content) in entries {
            zip.start_file(*name, FileOptions::default()).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_extract_and_remove() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("a.zip");
        write_zip(&archive, &[("Payload/source.json", "{}"), ("Payload/main.wasm", "wasm")]);

        let dest = temp_dir.path().join("out");
        extract_archive(&archive, &dest, true).unwrap();

        assert_eq!(fs::read_to_string(dest.join("Payload/main.wasm")).unwrap(), "wasm");
        assert!(!archive.exists());
    }

    #[test]
    fn test_keep_archive() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("a.zip");
        write_zip(&archive, &[("Payload/source.json", "{}")]);

        extract_archive(&archive, &temp_dir.path().join("out"), false).unwrap();
        assert!(archive.exists());
    }

    #[test]
    fn test_corrupt_archive() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("a.zip");
        fs::write(&archive, b"definitely not a zip").unwrap();

        let err = extract_archive(&archive, &temp_dir.path().join("out"), true).unwrap_err();
        assert!(matches!(err, PackageError::ExtractFailed { .. }));
        assert!(archive.exists());
    }

    #[test]
    fn test_destination_must_be_fresh() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("a.zip");
        write_zip(&archive, &[("Payload/source.json", "{}")]);

        let dest = temp_dir.path().join("out");
        fs::create_dir(&dest).unwrap();
        assert!(extract_archive(&archive, &dest, true).is_err());
    }
}
