//! Entry payload access: positioned reads and streaming decompression

use super::Archive;
use crate::error::{JarError, Result};
use crate::fio::read_fully_at;
use crate::format::{self, LOCHDR, LOCSIG};
use crate::types::{JarEntry, PayloadOffset};
use flate2::{Decompress, FlushDecompress, Status};
use tracing::{debug, trace};

/// Compressed bytes are fed to the inflater in chunks of this size
const INFLATE_CHUNK: usize = 4096;

impl Archive {
    /// Absolute file offset of the entry's first payload byte.
    ///
    /// The local header's own name and extra lengths are authoritative and
    /// may differ from the central directory copy, so the first call reads
    /// the local header; the result is memoized on the entry.
    pub fn payload_offset(&self, entry: &mut JarEntry) -> Result<u64> {
        match entry.payload {
            PayloadOffset::Resolved(pos) => Ok(pos),
            PayloadOffset::Unresolved(loc_pos) => {
                let mut loc = [0u8; LOCHDR];
                read_fully_at(&self.file, loc_pos, &mut loc)?;
                if format::signature(&loc) != LOCSIG {
                    return Err(JarError::Format("invalid LOC header (bad signature)".into()));
                }
                let pos = loc_pos
                    + (LOCHDR + format::loc_name_len(&loc) + format::loc_extra_len(&loc)) as u64;
                trace!(
                    "resolved payload offset {} for {:?}",
                    pos,
                    String::from_utf8_lossy(&entry.name)
                );
                entry.payload = PayloadOffset::Resolved(pos);
                Ok(pos)
            }
        }
    }

    /// Read up to `len` payload bytes starting at `pos`.
    ///
    /// `pos` counts within the entry's payload: compressed bytes for a
    /// deflated entry, stored bytes otherwise. `len` is clipped to the
    /// payload end; a fully clipped read yields an empty buffer. A `pos`
    /// at or past the payload end is an error.
    pub fn read(&self, entry: &mut JarEntry, pos: u64, len: usize) -> Result<Vec<u8>> {
        let result = self.read_inner(entry, pos, len);
        self.track_read(&result);
        result
    }

    fn read_inner(&self, entry: &mut JarEntry, pos: u64, len: usize) -> Result<Vec<u8>> {
        let payload_size = if entry.csize != 0 {
            entry.csize
        } else {
            entry.size
        };
        if pos >= payload_size {
            return Err(JarError::ReadOutOfRange {
                pos,
                size: payload_size,
            });
        }
        let len = (len as u64).min(payload_size - pos) as usize;
        if len == 0 {
            return Ok(Vec::new());
        }

        let start = self.payload_offset(entry)? + pos;
        // Declared sizes can lie; a read landing past end-of-archive is
        // corruption, not a short success
        if start + len as u64 > self.len {
            return Err(JarError::Corrupt("invalid entry size".into()));
        }

        let mut buf = vec![0u8; len];
        read_fully_at(&self.file, start, &mut buf)?;
        Ok(buf)
    }

    /// Inflate a deflated entry completely.
    ///
    /// The stream must end exactly where the directory said it would:
    /// consuming all `csize` compressed bytes and producing exactly `size`
    /// bytes. Anything else is corruption.
    pub fn decompress_fully(&self, entry: &mut JarEntry) -> Result<Vec<u8>> {
        let result = self.decompress_inner(entry);
        self.track_read(&result);
        result
    }

    fn decompress_inner(&self, entry: &mut JarEntry) -> Result<Vec<u8>> {
        if entry.csize == 0 {
            return Err(JarError::NotCompressed);
        }

        let mut inflater = Decompress::new(false);
        let mut out = Vec::with_capacity(entry.size as usize);
        let mut pos = 0u64;
        let mut saw_end = false;

        'feed: while pos < entry.csize {
            let chunk = self.read_inner(entry, pos, INFLATE_CHUNK)?;
            pos += chunk.len() as u64;

            let mut fed = 0;
            while fed < chunk.len() {
                let in_before = inflater.total_in();
                let out_before = inflater.total_out();
                let status = inflater
                    .decompress_vec(&chunk[fed..], &mut out, FlushDecompress::None)
                    .map_err(|e| JarError::Corrupt(format!("invalid deflate stream: {e}")))?;
                fed += (inflater.total_in() - in_before) as usize;

                match status {
                    Status::StreamEnd => {
                        saw_end = true;
                        break 'feed;
                    }
                    Status::Ok
                        if inflater.total_in() == in_before
                            && inflater.total_out() == out_before =>
                    {
                        // Input pending but no progress possible: the output
                        // buffer is full, the stream is longer than declared
                        return Err(JarError::Corrupt(
                            "inflated size exceeds declared entry size".into(),
                        ));
                    }
                    Status::Ok => {}
                    Status::BufError => {
                        return Err(JarError::Corrupt(
                            "inflated size exceeds declared entry size".into(),
                        ));
                    }
                }
            }
        }

        if !saw_end {
            return Err(JarError::Corrupt("unexpected end of stream".into()));
        }
        if inflater.total_in() != entry.csize || inflater.total_out() != entry.size {
            return Err(JarError::Corrupt(
                "inflated size does not match declared entry size".into(),
            ));
        }

        debug!(
            "inflated {:?}: {} bytes -> {} bytes",
            String::from_utf8_lossy(&entry.name),
            entry.csize,
            entry.size
        );
        Ok(out)
    }

    /// Read a whole entry, inflating it when compressed, and hand the
    /// entry back to the archive's cache slot on success.
    pub fn read_entry(&self, mut entry: JarEntry) -> Result<Vec<u8>> {
        let data = if entry.csize == 0 {
            if entry.size == 0 {
                Vec::new()
            } else {
                let size = entry.size as usize;
                self.read(&mut entry, 0, size)?
            }
        } else {
            self.decompress_fully(&mut entry)?
        };
        self.release(entry);
        Ok(data)
    }

    /// Mirror the outcome of a read-path operation into the archive's
    /// last-error slot: failures stick until the next success.
    fn track_read<T>(&self, result: &Result<T>) {
        let mut last_error = self.last_error.lock();
        *last_error = match result {
            Ok(_) => None,
            Err(e) => Some(e.to_string()),
        };
    }
}
