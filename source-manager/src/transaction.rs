//! Moving a loaded package into the registry

use crate::events::{ChangeNotifier, RegistryEvent};
use crate::{PackageError, Result, SourcePackage};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, info, warn};

static STAGING_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Scratch directory owned by a single import.
///
/// Removed by [`ScratchDir::close`] or, failing that, on drop.
#[derive(Debug)]
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    /// Create a uniquely named directory under `temp_root`
    pub fn create(temp_root: &Path) -> Result<Self> {
        fs::create_dir_all(temp_root)?;
        let dir = tempfile::Builder::new()
            .prefix("import-")
            .tempdir_in(temp_root)?;
        debug!("Created scratch directory {}", dir.path().display());
        Ok(Self { dir })
    }

    /// Location of the scratch directory
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where the archive gets unpacked
    pub fn extract_dir(&self) -> PathBuf {
        self.path().join("extracted")
    }

    /// Remove the directory now, logging a failure instead of returning it
    pub fn close(self) {
        let path = self.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            warn!("Failed to remove scratch directory {}: {}", path.display(), e);
        }
    }
}

/// Per-id locks serializing installs of the same source.
///
/// An entry only lives while some install of that id holds or waits on it.
#[derive(Debug, Default)]
pub struct InstallLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl InstallLocks {
    /// Create an empty lock table
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the entry for `id` once the table holds the only reference
    fn release(&self, id: &str) {
        self.locks.remove_if(id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

type RenameFn = fn(&Path, &Path) -> io::Result<()>;

/// Replaces `registry_dir/<id>` with a freshly loaded package
pub struct InstallTransaction<'a> {
    registry_dir: &'a Path,
    locks: &'a InstallLocks,
    notifier: &'a ChangeNotifier,
    /// Final rename of the staged payload onto the destination
    place: RenameFn,
}

impl<'a> InstallTransaction<'a> {
    /// Create a new transaction against `registry_dir`
    pub fn new(registry_dir: &'a Path, locks: &'a InstallLocks, notifier: &'a ChangeNotifier) -> Self {
        Self {
            registry_dir,
            locks,
            notifier,
            place: |from, to| fs::rename(from, to),
        }
    }

    /// Install `package`, whose payload lives inside `scratch`.
    ///
    /// The new payload is first moved next to the destination, the previous
    /// version is renamed aside, and the payload is renamed into place. If
    /// that last rename fails the previous version is restored. `scratch` is
    /// removed whatever the outcome.
    pub fn commit(&self, package: SourcePackage, scratch: ScratchDir) -> Result<SourcePackage> {
        let id = package.id().to_string();
        fs::create_dir_all(self.registry_dir)?;

        let lock = self.locks.lock_for(&id);
        let result = {
            let _guard = lock.lock();
            self.remove_stale_siblings(&id);
            self.swap_in(&id, package, scratch)
        };
        drop(lock);
        self.locks.release(&id);
        result
    }

    /// Must be called with the lock for `id` held
    fn swap_in(&self, id: &str, package: SourcePackage, scratch: ScratchDir) -> Result<SourcePackage> {
        let destination = self.registry_dir.join(id);
        let install_failed = |message: String| PackageError::InstallFailed {
            id: id.to_string(),
            message,
        };

        let staging = self.sibling(id, "incoming");
        move_dir(&package.path, &staging)
            .map_err(|e| install_failed(format!("failed to stage payload: {}", e)))?;

        let backup = if destination.exists() {
            let backup = self.sibling(id, "previous");
            if let Err(e) = fs::rename(&destination, &backup) {
                fs::remove_dir_all(&staging).ok();
                return Err(install_failed(format!(
                    "failed to move aside previous version: {}",
                    e
                )));
            }
            Some(backup)
        } else {
            None
        };

        if let Err(e) = (self.place)(&staging, &destination) {
            if let Some(backup) = &backup {
                if let Err(restore) = fs::rename(backup, &destination) {
                    warn!(
                        "Failed to restore previous version of {} from {}: {}",
                        id,
                        backup.display(),
                        restore
                    );
                }
            }
            fs::remove_dir_all(&staging).ok();
            return Err(install_failed(format!("failed to move into place: {}", e)));
        }

        if let Some(backup) = backup {
            if let Err(e) = fs::remove_dir_all(&backup) {
                warn!("Failed to remove previous version {}: {}", backup.display(), e);
            }
        }

        scratch.close();
        self.notifier.publish(RegistryEvent::Installed { id: id.to_string() });
        info!("Installed {} v{} to {}", id, package.version(), destination.display());

        Ok(SourcePackage {
            manifest: package.manifest,
            path: destination,
        })
    }

    /// Hidden path next to the destination, skipped by registry scans
    fn sibling(&self, id: &str, kind: &str) -> PathBuf {
        let n = STAGING_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.registry_dir
            .join(format!(".{}.{}-{}-{}", id, kind, std::process::id(), n))
    }

    /// Delete staging and backup directories of `id` left by an interrupted install
    fn remove_stale_siblings(&self, id: &str) {
        let entries = match fs::read_dir(self.registry_dir) {
            Ok(entries) => entries,
            Err(_) => return,
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            if sibling_owner(&name.to_string_lossy()) != Some(id) {
                continue;
            }
            let path = entry.path();
            match fs::remove_dir_all(&path) {
                Ok(()) => debug!("Removed stale {}", path.display()),
                Err(e) => warn!("Failed to remove stale {}: {}", path.display(), e),
            }
        }
    }
}

/// Id whose staging or backup directory `name` is, if it is one
fn sibling_owner(name: &str) -> Option<&str> {
    let (id, tail) = name.strip_prefix('.')?.rsplit_once('.')?;
    let counters = tail
        .strip_prefix("incoming-")
        .or_else(|| tail.strip_prefix("previous-"))?;
    let (pid, n) = counters.split_once('-')?;
    let numeric = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if numeric(pid) && numeric(n) {
        Some(id)
    } else {
        None
    }
}

/// Rename `from` to `to`, copying when they live on different filesystems
fn move_dir(from: &Path, to: &Path) -> io::Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }

    debug!("Rename failed, copying {} to {}", from.display(), to.display());
    if let Err(e) = copy_dir_all(from, to) {
        fs::remove_dir_all(to).ok();
        return Err(e);
    }
    fs::remove_dir_all(from).ok();
    Ok(())
}

fn copy_dir_all(from: &Path, to: &Path) -> io::Result<()> {
    fs::create_dir(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_all(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
