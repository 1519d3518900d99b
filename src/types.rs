//! Common types used throughout the JAR storage system

use std::borrow::Cow;

/// Payload location of an entry within its archive.
///
/// The central directory only records where an entry's local header starts.
/// The local header carries its own (authoritative) name and extra-field
/// lengths, so the first payload byte is only known after reading it. The
/// resolution happens lazily on the first data access and is memoized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadOffset {
    /// Local header offset relative to the first local header, unverified
    Unresolved(u64),
    /// Absolute file offset of the first payload byte
    Resolved(u64),
}

/// A single archive entry, materialized from the central directory.
///
/// Entries are owned values: the caller holds the only copy until it either
/// drops the entry or hands it back via [`Archive::release`].
///
/// [`Archive::release`]: crate::archive::Archive::release
#[derive(Debug, Clone)]
pub struct JarEntry {
    /// Entry name as stored, raw bytes
    pub(crate) name: Vec<u8>,
    /// Extra field bytes, if present
    pub(crate) extra: Option<Vec<u8>>,
    /// Entry comment bytes, if present
    pub(crate) comment: Option<Vec<u8>>,
    /// Uncompressed size
    pub(crate) size: u64,
    /// Compressed size; 0 means the entry is stored, not compressed
    pub(crate) csize: u64,
    /// CRC-32 of the uncompressed data
    pub(crate) crc: u32,
    /// Modification time, DOS date/time format (date in the high word)
    pub(crate) time: u32,
    /// Payload location, resolved on first read
    pub(crate) payload: PayloadOffset,
}

impl JarEntry {
    /// Entry name as a lossy UTF-8 view
    pub fn name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }

    /// Entry name as stored, raw bytes
    pub fn name_bytes(&self) -> &[u8] {
        &self.name
    }

    /// Uncompressed size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Compressed size in bytes; 0 for stored entries
    pub fn compressed_size(&self) -> u64 {
        self.csize
    }

    /// Whether the payload is deflate-compressed
    pub fn is_compressed(&self) -> bool {
        self.csize != 0
    }

    /// Whether this is a directory entry (name ends with `/`)
    pub fn is_directory(&self) -> bool {
        self.name.last() == Some(&b'/')
    }

    /// CRC-32 of the uncompressed data
    pub fn crc(&self) -> u32 {
        self.crc
    }

    /// Extra field bytes, if present
    pub fn extra(&self) -> Option<&[u8]> {
        self.extra.as_deref()
    }

    /// Entry comment bytes, if present
    pub fn comment(&self) -> Option<&[u8]> {
        self.comment.as_deref()
    }

    /// Raw DOS date/time word (date in the high 16 bits)
    pub fn dos_time(&self) -> u32 {
        self.time
    }

    /// Modification date decoded to (year, month, day)
    pub fn mod_date(&self) -> (u16, u8, u8) {
        let date = (self.time >> 16) as u16;
        let day = (date & 0x1F) as u8;
        let month = ((date >> 5) & 0x0F) as u8;
        let year = ((date >> 9) & 0x7F) + 1980;
        (year, month, day)
    }

    /// Modification time decoded to (hour, minute, second)
    pub fn mod_time(&self) -> (u8, u8, u8) {
        let time = (self.time & 0xFFFF) as u16;
        let second = ((time & 0x1F) * 2) as u8;
        let minute = ((time >> 5) & 0x3F) as u8;
        let hour = ((time >> 11) & 0x1F) as u8;
        (hour, minute, second)
    }
}

// Payload resolution state is incidental: two materializations of the same
// directory record are equal whether or not one has touched its local header.
impl PartialEq for JarEntry {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.extra == other.extra
            && self.comment == other.comment
            && self.size == other.size
            && self.csize == other.csize
            && self.crc == other.crc
            && self.time == other.time
    }
}

impl Eq for JarEntry {}

/// Statistics about the storage
#[derive(Debug, Default, Clone, Copy)]
pub struct StorageStats {
    /// Archives currently registered
    pub open_archives: usize,
    /// Opens served from the registry without re-reading a directory
    pub cache_hits: u64,
    /// Opens that had to read an archive's directory
    pub cache_misses: u64,
}

/// Configuration for JAR storage
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Enable memory mapping for central directories
    pub use_memory_mapping: bool,
    /// Largest directory region to memory-map (default: 2GB)
    pub max_map_size: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            use_memory_mapping: true,
            max_map_size: 2 * 1024 * 1024 * 1024, // 2GB
        }
    }
}
