//! In-memory ZIP assembly for tests
//!
//! Archives are built field by field so tests control every header value,
//! including the ones real archivers never get wrong.

#![allow(dead_code)]

use flate2::Compression;
use flate2::write::DeflateEncoder;
use std::io::Write;
use tempfile::NamedTempFile;

/// DOS date/time stamped on every built entry: 2009-06-01 13:37:42
pub const TEST_DOS_TIME: u32 = 0x3AC1_6CB5;

const LOC_SIG: u32 = 0x0403_4B50;
const CEN_SIG: u32 = 0x0201_4B50;
const END_SIG: u32 = 0x0605_4B50;

struct EntryRecord {
    name: Vec<u8>,
    extra: Vec<u8>,
    /// Extra field written to the local header; defaults to `extra`
    loc_extra: Option<Vec<u8>>,
    comment: Vec<u8>,
    flags: u16,
    method: u16,
    crc: u32,
    size: u32,
    csize: u32,
    payload: Vec<u8>,
}

/// Assembles a ZIP archive one entry at a time.
#[derive(Default)]
pub struct ZipBuilder {
    prefix: Vec<u8>,
    entries: Vec<EntryRecord>,
    comment: Vec<u8>,
    total_override: Option<u16>,
}

impl ZipBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend raw bytes before the first local header, the layout of a
    /// self-extracting archive.
    pub fn prefix(mut self, bytes: &[u8]) -> Self {
        self.prefix = bytes.to_vec();
        self
    }

    /// Set the archive comment.
    pub fn comment(mut self, comment: &[u8]) -> Self {
        self.comment = comment.to_vec();
        self
    }

    /// Force the end record's entry count fields instead of deriving them.
    pub fn total(mut self, total: u16) -> Self {
        self.total_override = Some(total);
        self
    }

    /// Add an uncompressed entry.
    pub fn stored(mut self, name: &[u8], data: &[u8]) -> Self {
        self.entries.push(EntryRecord {
            name: name.to_vec(),
            extra: Vec::new(),
            loc_extra: None,
            comment: Vec::new(),
            flags: 0,
            method: 0,
            crc: crc32fast::hash(data),
            size: data.len() as u32,
            csize: data.len() as u32,
            payload: data.to_vec(),
        });
        self
    }

    /// Add a deflate-compressed entry.
    pub fn deflated(mut self, name: &[u8], data: &[u8]) -> Self {
        let payload = deflate(data);
        self.entries.push(EntryRecord {
            name: name.to_vec(),
            extra: Vec::new(),
            loc_extra: None,
            comment: Vec::new(),
            flags: 0,
            method: 8,
            crc: crc32fast::hash(data),
            size: data.len() as u32,
            csize: payload.len() as u32,
            payload,
        });
        self
    }

    fn last(&mut self) -> &mut EntryRecord {
        self.entries.last_mut().expect("no entry added yet")
    }

    /// Attach extra field and comment bytes to the most recent entry.
    pub fn with_metadata(mut self, extra: &[u8], comment: &[u8]) -> Self {
        let entry = self.last();
        entry.extra = extra.to_vec();
        entry.comment = comment.to_vec();
        self
    }

    /// Give the most recent entry's local header its own extra field,
    /// different from the central directory copy.
    pub fn with_loc_extra(mut self, extra: &[u8]) -> Self {
        self.last().loc_extra = Some(extra.to_vec());
        self
    }

    /// Overwrite the declared uncompressed size of the most recent entry.
    pub fn declare_size(mut self, size: u32) -> Self {
        self.last().size = size;
        self
    }

    /// Overwrite the declared compressed size of the most recent entry.
    pub fn declare_csize(mut self, csize: u32) -> Self {
        self.last().csize = csize;
        self
    }

    /// Chop `n` bytes off the most recent entry's payload, declared
    /// compressed size included.
    pub fn truncate_payload(mut self, n: usize) -> Self {
        let entry = self.last();
        let keep = entry.payload.len() - n;
        entry.payload.truncate(keep);
        entry.csize = keep as u32;
        self
    }

    /// Set the encryption flag on the most recent entry.
    pub fn encrypted(mut self) -> Self {
        self.last().flags |= 0x0001;
        self
    }

    /// Set an arbitrary compression method on the most recent entry.
    pub fn method(mut self, method: u16) -> Self {
        self.last().method = method;
        self
    }

    /// Serialize the archive to bytes.
    pub fn build(&self) -> Vec<u8> {
        let mut out = self.prefix.clone();
        let base = self.prefix.len();

        let mut loc_offsets = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            loc_offsets.push((out.len() - base) as u32);
            let loc_extra = entry.loc_extra.as_ref().unwrap_or(&entry.extra);
            out.extend_from_slice(&LOC_SIG.to_le_bytes());
            out.extend_from_slice(&20u16.to_le_bytes()); // version needed
            out.extend_from_slice(&entry.flags.to_le_bytes());
            out.extend_from_slice(&entry.method.to_le_bytes());
            out.extend_from_slice(&TEST_DOS_TIME.to_le_bytes());
            out.extend_from_slice(&entry.crc.to_le_bytes());
            out.extend_from_slice(&entry.csize.to_le_bytes());
            out.extend_from_slice(&entry.size.to_le_bytes());
            out.extend_from_slice(&(entry.name.len() as u16).to_le_bytes());
            out.extend_from_slice(&(loc_extra.len() as u16).to_le_bytes());
            out.extend_from_slice(&entry.name);
            out.extend_from_slice(loc_extra);
            out.extend_from_slice(&entry.payload);
        }

        let cen_offset = (out.len() - base) as u32;
        for (entry, loc_offset) in self.entries.iter().zip(loc_offsets) {
            out.extend_from_slice(&CEN_SIG.to_le_bytes());
            out.extend_from_slice(&20u16.to_le_bytes()); // version made by
            out.extend_from_slice(&20u16.to_le_bytes()); // version needed
            out.extend_from_slice(&entry.flags.to_le_bytes());
            out.extend_from_slice(&entry.method.to_le_bytes());
            out.extend_from_slice(&TEST_DOS_TIME.to_le_bytes());
            out.extend_from_slice(&entry.crc.to_le_bytes());
            out.extend_from_slice(&entry.csize.to_le_bytes());
            out.extend_from_slice(&entry.size.to_le_bytes());
            out.extend_from_slice(&(entry.name.len() as u16).to_le_bytes());
            out.extend_from_slice(&(entry.extra.len() as u16).to_le_bytes());
            out.extend_from_slice(&(entry.comment.len() as u16).to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes()); // disk number start
            out.extend_from_slice(&0u16.to_le_bytes()); // internal attributes
            out.extend_from_slice(&0u32.to_le_bytes()); // external attributes
            out.extend_from_slice(&loc_offset.to_le_bytes());
            out.extend_from_slice(&entry.name);
            out.extend_from_slice(&entry.extra);
            out.extend_from_slice(&entry.comment);
        }

        let cen_size = (out.len() - base) as u32 - cen_offset;
        // Real archivers write the low 16 bits when the count overflows
        let total = self
            .total_override
            .unwrap_or((self.entries.len() & 0xFFFF) as u16);
        out.extend_from_slice(&END_SIG.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // this disk
        out.extend_from_slice(&0u16.to_le_bytes()); // directory start disk
        out.extend_from_slice(&total.to_le_bytes());
        out.extend_from_slice(&total.to_le_bytes());
        out.extend_from_slice(&cen_size.to_le_bytes());
        out.extend_from_slice(&cen_offset.to_le_bytes());
        out.extend_from_slice(&(self.comment.len() as u16).to_le_bytes());
        out.extend_from_slice(&self.comment);
        out
    }

    /// Serialize the archive into a temporary file.
    pub fn build_file(&self) -> NamedTempFile {
        write_file(&self.build())
    }
}

/// Raw deflate bytes for `data`, no zlib framing.
pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Write raw archive bytes to a temporary file.
pub fn write_file(bytes: &[u8]) -> NamedTempFile {
    let mut tmp = NamedTempFile::new().unwrap();
    tmp.write_all(bytes).unwrap();
    tmp.flush().unwrap();
    tmp
}

/// Byte position of the first central directory header.
pub fn find_cen_pos(bytes: &[u8]) -> usize {
    bytes
        .windows(4)
        .position(|w| w == CEN_SIG.to_le_bytes())
        .expect("no central directory header")
}
