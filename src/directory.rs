//! Central directory discovery and catalog construction
//!
//! Locates the end-of-central-directory record by scanning backward from
//! end-of-file, then walks the central directory headers once to build the
//! hash-indexed [`Catalog`]. Directory bytes are served from a retained
//! read-only memory mapping when possible, with a plain heap buffer as the
//! fallback.

use crate::error::{JarError, Result};
use crate::fio::read_fully_at;
use crate::format::{
    self, CENHDR, CENSIG, END_MAXLEN, ENDHDR, ENDSIG, EndRecord, FLAG_ENCRYPTED, METHOD_DEFLATED,
    METHOD_STORED,
};
use crate::index::{Catalog, hash_name, is_meta_name};
use crate::types::StorageConfig;
use memmap2::{Mmap, MmapOptions};
use std::fs::File;
use tracing::{debug, warn};

/// Backward scan block size. Blocks overlap by [`ENDHDR`] so a record
/// cannot straddle two scans unseen.
const READ_BLOCK: usize = 128;

/// Mapping base offsets are rounded down to this granularity, which covers
/// the allocation granularity of every supported platform.
const MAP_GRANULARITY: u64 = 64 * 1024;

/// Where the retained central directory bytes live
pub enum DirectorySource {
    /// Read-only mapping of the directory region; `base` is the 64 KiB
    /// aligned file offset the mapping starts at
    Mapped { map: Mmap, base: u64 },
    /// Directory was read into a heap buffer that was dropped after the
    /// catalog build; headers are re-read from the file on demand
    Heap,
}

/// A fully loaded central directory
pub struct Directory {
    pub catalog: Catalog,
    /// File position of the first local header. Non-zero when a stub is
    /// prefixed to the archive (self-extracting layout).
    pub loc_base: u64,
    pub source: DirectorySource,
}

/// Search backward for the end-of-central-directory record.
///
/// A candidate signature only counts when its declared comment length makes
/// the record reach exactly end-of-file, which rules out incidental matches
/// inside entry data or the comment itself. The scan is bounded by the
/// largest possible comment.
///
/// Returns the record's file position and its fixed bytes, `None` when no
/// record exists, or the underlying I/O error.
pub fn find_end(file: &File, len: u64) -> Result<Option<(u64, [u8; ENDHDR])>> {
    let len = len as i64;
    let mut buf = [0u8; READ_BLOCK];
    let min_hdr = (len - END_MAXLEN as i64).max(0);
    let min_pos = min_hdr - (READ_BLOCK - ENDHDR) as i64;

    let mut pos = len - READ_BLOCK as i64;
    while pos >= min_pos {
        // Pretend there are NUL bytes before the start of the file
        let fill = if pos < 0 { (-pos) as usize } else { 0 };
        buf[..fill].fill(0);
        read_fully_at(file, (pos + fill as i64) as u64, &mut buf[fill..])?;

        for i in (0..=READ_BLOCK - ENDHDR).rev() {
            let window = &buf[i..i + ENDHDR];
            if format::signature(window) == ENDSIG
                && pos + (i + ENDHDR + format::end_comment_len(window)) as i64 == len
            {
                let mut end = [0u8; ENDHDR];
                end.copy_from_slice(window);
                return Ok(Some(((pos + i as i64) as u64, end)));
            }
        }
        pos -= (READ_BLOCK - ENDHDR) as i64;
    }
    Ok(None)
}

impl Directory {
    /// Read and index the central directory of an open archive file.
    pub fn load(file: &File, len: u64, config: &StorageConfig) -> Result<Self> {
        let Some((end_pos, end_buf)) = find_end(file, len)? else {
            return Err(JarError::Format(
                "end of central directory record not found".into(),
            ));
        };
        let end = EndRecord::parse(&end_buf);

        let cen_len = end.cen_size;
        if cen_len > end_pos {
            return Err(JarError::Format(
                "invalid END header (bad central directory size)".into(),
            ));
        }
        let cen_pos = end_pos - cen_len;

        // The first local header sits at offset zero of the archive proper;
        // anything before it is a stub the directory offsets do not know of.
        let Some(loc_base) = cen_pos.checked_sub(end.cen_offset) else {
            return Err(JarError::Format(
                "invalid END header (bad central directory offset)".into(),
            ));
        };

        debug!(
            "central directory: {} bytes at {}, {} entries declared, loc base {}",
            cen_len, cen_pos, end.total, loc_base
        );

        // Map the directory and end record together so later header reads
        // touch no file descriptor; fall back to one positioned read.
        let map_base = cen_pos & !(MAP_GRANULARITY - 1);
        let map_len = (cen_pos - map_base) + cen_len + ENDHDR as u64;
        let map = if config.use_memory_mapping && map_len <= config.max_map_size {
            match unsafe { MmapOptions::new().offset(map_base).len(map_len as usize).map(file) } {
                Ok(map) => Some(map),
                Err(e) => {
                    warn!("failed to memory-map central directory, using heap buffer: {e}");
                    None
                }
            }
        } else {
            None
        };

        let (catalog, source) = match map {
            Some(map) => {
                let start = (cen_pos - map_base) as usize;
                let cen = &map[start..start + cen_len as usize];
                let catalog = build_catalog(cen, cen_pos, end.total)?;
                (catalog, DirectorySource::Mapped { map, base: map_base })
            }
            None => {
                let mut cen = vec![0u8; cen_len as usize];
                read_fully_at(file, cen_pos, &mut cen)?;
                let catalog = build_catalog(&cen, cen_pos, end.total)?;
                (catalog, DirectorySource::Heap)
            }
        };

        Ok(Self {
            catalog,
            loc_base,
            source,
        })
    }
}

/// Build the catalog from raw directory bytes.
///
/// The on-disk entry count is a 16-bit hint; archives can hold more. When
/// the hint proves too small, a structural pass counts the true total and
/// the validating pass runs once more with exact capacity.
fn build_catalog(cen: &[u8], cen_pos: u64, hint: u16) -> Result<Catalog> {
    match fill_catalog(cen, cen_pos, hint as usize)? {
        Some(catalog) => Ok(catalog),
        None => {
            let total = count_headers(cen);
            debug!(
                "entry count hint {} too small, recounted {} headers",
                hint, total
            );
            fill_catalog(cen, cen_pos, total)?.ok_or_else(|| {
                JarError::Format("invalid CEN header (bad header size)".into())
            })
        }
    }
}

/// Validating pass: walk every header, check it, and add it to the catalog.
///
/// Returns `None` when more valid headers exist than `capacity` allows,
/// meaning the caller must recount and retry.
fn fill_catalog(cen: &[u8], cen_pos: u64, capacity: usize) -> Result<Option<Catalog>> {
    let mut catalog = Catalog::with_capacity(capacity);
    let mut off = 0;
    while off + CENHDR <= cen.len() {
        if catalog.len() >= capacity {
            return Ok(None);
        }
        let header = &cen[off..];
        if format::signature(header) != CENSIG {
            return Err(JarError::Format("invalid CEN header (bad signature)".into()));
        }
        if format::cen_flags(header) & FLAG_ENCRYPTED != 0 {
            return Err(JarError::Format("invalid CEN header (encrypted entry)".into()));
        }
        let method = format::cen_method(header);
        if method != METHOD_STORED && method != METHOD_DEFLATED {
            return Err(JarError::Format(
                "invalid CEN header (bad compression method)".into(),
            ));
        }
        let name_len = format::cen_name_len(header);
        if off + CENHDR + name_len > cen.len() {
            return Err(JarError::Format("invalid CEN header (bad header size)".into()));
        }

        let name = &cen[off + CENHDR..off + CENHDR + name_len];
        if is_meta_name(name) {
            catalog.add_meta_name(name);
        }
        catalog.add(hash_name(name), cen_pos + off as u64);

        off += format::cen_header_size(header);
    }
    // The walk must land exactly on the end of the directory
    if off != cen.len() {
        return Err(JarError::Format("invalid CEN header (bad header size)".into()));
    }
    Ok(Some(catalog))
}

/// Structural pass: count headers by their declared sizes, no validation.
///
/// Uses the same walk arithmetic as [`fill_catalog`] so both passes always
/// agree on how many headers the directory holds.
fn count_headers(cen: &[u8]) -> usize {
    let mut count = 0;
    let mut off = 0;
    while off + CENHDR <= cen.len() {
        count += 1;
        off += format::cen_header_size(&cen[off..]);
    }
    count
}
