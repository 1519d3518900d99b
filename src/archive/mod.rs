//! Open archive handling: lookup, enumeration, and the entry cache

mod data;
mod headers;

use crate::directory::{Directory, DirectorySource};
use crate::error::Result;
use crate::index::{Catalog, hash_extend, hash_name};
use crate::types::{JarEntry, StorageConfig};
use headers::Access;
use parking_lot::Mutex;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, trace};

/// An open, indexed archive.
///
/// All lookup and read operations take `&self`; one archive can serve many
/// threads. Mutable state is confined to the entry cache slot and the
/// sequential read-ahead page behind one mutex.
pub struct Archive {
    path: PathBuf,
    file: File,
    /// Archive length in bytes
    len: u64,
    /// Modification time hint this archive was opened with
    last_modified: i64,
    /// File position of the first local header (stub compensation)
    loc_base: u64,
    catalog: Catalog,
    source: DirectorySource,
    state: Mutex<ArchiveState>,
    last_error: Mutex<Option<String>>,
    /// Live handle count. Only mutated under the registry lock.
    refs: AtomicUsize,
}

/// Per-archive mutable state
struct ArchiveState {
    /// Most recently released entry, at most one
    slot: Option<JarEntry>,
    /// Shared read-ahead page for sequential header access
    page: Option<ReadAheadPage>,
}

struct ReadAheadPage {
    /// File position of the first buffered byte
    pos: u64,
    data: Vec<u8>,
}

impl Archive {
    /// Open an archive file and index its central directory.
    pub fn open(path: PathBuf, last_modified: i64, config: &StorageConfig) -> Result<Self> {
        let file = File::open(&path)?;
        let len = file.metadata()?.len();

        debug!("opening archive {:?} ({} bytes)", path, len);
        let directory = Directory::load(&file, len, config)?;
        debug!(
            "indexed {} entries in {:?}",
            directory.catalog.len(),
            path
        );

        Ok(Self {
            path,
            file,
            len,
            last_modified,
            loc_base: directory.loc_base,
            catalog: directory.catalog,
            source: directory.source,
            state: Mutex::new(ArchiveState {
                slot: None,
                page: None,
            }),
            last_error: Mutex::new(None),
            refs: AtomicUsize::new(1),
        })
    }

    /// Look up an entry by name.
    ///
    /// When no entry matches and the name does not already end with `/`,
    /// the lookup is retried once with a slash appended, so directory
    /// entries resolve from their bare names.
    pub fn find(&self, name: &[u8]) -> Result<Option<JarEntry>> {
        self.lookup(name, true)
    }

    /// Look up an entry by its exact name, with no slash retry.
    pub fn find_exact(&self, name: &[u8]) -> Result<Option<JarEntry>> {
        self.lookup(name, false)
    }

    fn lookup(&self, name: &[u8], retry_slash: bool) -> Result<Option<JarEntry>> {
        let mut query = name.to_vec();
        let mut hash = hash_name(name);
        let mut may_retry = retry_slash;
        let mut state = self.state.lock();

        loop {
            // The cache slot is checked before the index on every round
            if let Some(cached) = &state.slot {
                if cached.name == query {
                    trace!("entry cache hit for {:?}", String::from_utf8_lossy(&query));
                    return Ok(state.slot.take());
                }
            }

            // Walk the bucket chain. The stored hash filters candidates;
            // 32-bit hashes collide, so a hash match still needs the name
            // comparison, and non-matches are dropped.
            for cell in self.catalog.chain(hash) {
                if cell.hash != hash {
                    continue;
                }
                let entry = self.materialize(cell.cen_pos, Access::Random, &mut state)?;
                if entry.name == query {
                    return Ok(Some(entry));
                }
            }

            if !may_retry || query.last() == Some(&b'/') {
                return Ok(None);
            }
            query.push(b'/');
            hash = hash_extend(hash, b'/');
            may_retry = false;
        }
    }

    /// Materialize the entry at catalog position `index`, or `None` when
    /// the index is out of range.
    ///
    /// Consecutive indices share one read-ahead page, making this the
    /// cheap way to enumerate a whole archive.
    pub fn entry_at(&self, index: usize) -> Result<Option<JarEntry>> {
        let Some(cell) = self.catalog.cell(index) else {
            return Ok(None);
        };
        let mut state = self.state.lock();
        let entry = self.materialize(cell.cen_pos, Access::Sequential, &mut state)?;
        Ok(Some(entry))
    }

    /// Iterate over all entries in directory order.
    pub fn entries(&self) -> Entries<'_> {
        Entries {
            archive: self,
            index: 0,
        }
    }

    /// Hand a no-longer-needed entry back to the archive.
    ///
    /// The archive keeps it in a single cache slot so an immediately
    /// following [`find`](Self::find) for the same name skips the header
    /// parse. Whatever the slot held before is destroyed.
    pub fn release(&self, entry: JarEntry) {
        let displaced = {
            let mut state = self.state.lock();
            state.slot.replace(entry)
        };
        // Displaced entry drops here, after the lock is released
        drop(displaced);
    }

    /// Number of indexed entries
    pub fn entry_count(&self) -> usize {
        self.catalog.len()
    }

    /// Archive file length in bytes
    pub fn size(&self) -> u64 {
        self.len
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Modification time hint this archive was opened with
    pub fn last_modified(&self) -> i64 {
        self.last_modified
    }

    /// Names of entries under `META-INF/`, in directory order
    pub fn meta_names(&self) -> &[String] {
        self.catalog.meta_names()
    }

    /// Message of the most recent failed read on this archive, if the
    /// failure has not been superseded by a successful read since.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    pub(crate) fn refs(&self) -> usize {
        self.refs.load(Ordering::Relaxed)
    }

    pub(crate) fn add_ref(&self) {
        self.refs.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the count before decrementing
    pub(crate) fn drop_ref(&self) -> usize {
        self.refs.fetch_sub(1, Ordering::Relaxed)
    }
}

/// Iterator over all entries of an archive, in directory order
pub struct Entries<'a> {
    archive: &'a Archive,
    index: usize,
}

impl Iterator for Entries<'_> {
    type Item = Result<JarEntry>;

    fn next(&mut self) -> Option<Result<JarEntry>> {
        let result = self.archive.entry_at(self.index);
        self.index += 1;
        result.transpose()
    }
}
