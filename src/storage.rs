//! Process-wide registry of open archives
//!
//! Opening the same archive path repeatedly is the normal case for class
//! and resource loading, so archives are shared: the registry hands out
//! reference-counted handles to one indexed [`Archive`] per path instead
//! of re-reading the central directory every time.

use crate::archive::Archive;
use crate::error::{JarError, Result};
use crate::types::{StorageConfig, StorageStats};
use parking_lot::Mutex;
use std::ops::Deref;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, trace};

/// An archive stops being shared once this many handles point at it;
/// further opens get a fresh instance
const MAX_REFS: usize = 0xFFFF;

/// Longest accepted archive path, in bytes
const MAX_PATH: usize = 1024;

/// Shared storage service.
///
/// Cheap to clone; clones share the same registry. Most programs use one
/// instance (see [`global`]), tests usually make their own.
#[derive(Clone, Default)]
pub struct JarStorage {
    shared: Arc<Shared>,
}

#[derive(Default)]
struct Shared {
    config: StorageConfig,
    /// Registered archives. This lock also guards every archive's
    /// reference count.
    archives: Mutex<Vec<Arc<Archive>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl JarStorage {
    /// Create a storage service with the given configuration.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                archives: Mutex::new(Vec::new()),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
            }),
        }
    }

    /// Open the archive at `path`, reusing an already open instance when
    /// one matches.
    ///
    /// `last_modified` is the caller's modification-time hint: an open
    /// archive is reused only when the hint is 0 (accept any) or equals
    /// the hint the archive was opened with. Callers that pass real
    /// timestamps therefore get a fresh directory read whenever the file
    /// changed underneath a cached instance.
    pub fn open(&self, path: impl AsRef<Path>, last_modified: i64) -> Result<JarHandle> {
        let path = path.as_ref();
        let path_len = path.as_os_str().len();
        if path_len >= MAX_PATH {
            return Err(JarError::PathTooLong {
                len: path_len,
                max: MAX_PATH,
            });
        }
        let path = normalize_path(path);

        if let Some(handle) = self.reuse(&path, last_modified) {
            return Ok(handle);
        }
        self.shared.misses.fetch_add(1, Ordering::Relaxed);

        // Built outside the registry lock. Two racing opens of one path may
        // each build an instance; both are valid and independently counted.
        let archive = Arc::new(Archive::open(path, last_modified, &self.shared.config)?);
        self.shared.archives.lock().push(Arc::clone(&archive));
        Ok(JarHandle {
            archive,
            shared: Arc::clone(&self.shared),
        })
    }

    fn reuse(&self, path: &Path, last_modified: i64) -> Option<JarHandle> {
        let archives = self.shared.archives.lock();
        for archive in archives.iter() {
            if archive.path() == path
                && (last_modified == 0 || last_modified == archive.last_modified())
                && archive.refs() < MAX_REFS
            {
                archive.add_ref();
                self.shared.hits.fetch_add(1, Ordering::Relaxed);
                trace!("reusing archive {:?} ({} refs)", path, archive.refs());
                return Some(JarHandle {
                    archive: Arc::clone(archive),
                    shared: Arc::clone(&self.shared),
                });
            }
        }
        None
    }

    /// Registry statistics.
    pub fn stats(&self) -> StorageStats {
        StorageStats {
            open_archives: self.shared.archives.lock().len(),
            cache_hits: self.shared.hits.load(Ordering::Relaxed),
            cache_misses: self.shared.misses.load(Ordering::Relaxed),
        }
    }
}

/// The process-wide storage instance.
pub fn global() -> &'static JarStorage {
    static GLOBAL: OnceLock<JarStorage> = OnceLock::new();
    GLOBAL.get_or_init(JarStorage::default)
}

/// A counted handle to a registered archive.
///
/// Dereferences to [`Archive`] for lookups and reads. Cloning takes
/// another reference; dropping the last handle unregisters the archive
/// and releases its file handle, directory memory, and caches.
pub struct JarHandle {
    archive: Arc<Archive>,
    shared: Arc<Shared>,
}

impl Deref for JarHandle {
    type Target = Archive;

    fn deref(&self) -> &Archive {
        &self.archive
    }
}

impl Clone for JarHandle {
    fn clone(&self) -> Self {
        let _registry = self.shared.archives.lock();
        self.archive.add_ref();
        Self {
            archive: Arc::clone(&self.archive),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Drop for JarHandle {
    fn drop(&mut self) {
        let unlinked = {
            let mut archives = self.shared.archives.lock();
            if self.archive.drop_ref() > 1 {
                None
            } else {
                debug!("closing archive {:?}", self.archive.path());
                archives
                    .iter()
                    .position(|a| Arc::ptr_eq(a, &self.archive))
                    .map(|i| archives.swap_remove(i))
            }
        };
        // The registry's Arc drops here, outside the lock; with it goes
        // the archive itself once our own Arc follows.
        drop(unlinked);
    }
}

/// Collapse `.` and `..` components lexically so different spellings of
/// one path share a registry slot. No filesystem access, no symlink
/// resolution.
fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                // Leading the path, or stacked on another unresolvable
                // parent: keep it
                None | Some(Component::ParentDir) => out.push(".."),
                // The parent of the root is the root
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                Some(Component::CurDir) => {}
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}
