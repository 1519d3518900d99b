//! ZIP record layout: signatures, fixed sizes, and field accessors
//!
//! All multi-byte fields are little-endian. Accessors operate on raw header
//! slices that must hold at least the fixed portion of their record.

use byteorder::{ByteOrder, LittleEndian};

/// End-of-central-directory record, fixed size
pub const ENDHDR: usize = 22;
/// Central directory header, fixed size (variable trailer follows)
pub const CENHDR: usize = 46;
/// Local file header, fixed size (variable trailer follows)
pub const LOCHDR: usize = 30;

/// End-of-central-directory signature, `PK\x05\x06`
pub const ENDSIG: u32 = 0x0605_4B50;
/// Central directory header signature, `PK\x01\x02`
pub const CENSIG: u32 = 0x0201_4B50;
/// Local file header signature, `PK\x03\x04`
pub const LOCSIG: u32 = 0x0403_4B50;

/// Compression method: stored, no compression
pub const METHOD_STORED: u16 = 0;
/// Compression method: deflate
pub const METHOD_DEFLATED: u16 = 8;

/// General purpose flag bit 0: entry is encrypted
pub const FLAG_ENCRYPTED: u16 = 0x0001;

/// Farthest the end record can start from end-of-file (max comment length
/// plus the record itself)
pub const END_MAXLEN: u64 = 0xFFFF + ENDHDR as u64;

pub fn signature(b: &[u8]) -> u32 {
    LittleEndian::read_u32(b)
}

// End-of-central-directory record fields

pub fn end_total(b: &[u8]) -> u16 {
    LittleEndian::read_u16(&b[10..])
}

pub fn end_cen_size(b: &[u8]) -> u64 {
    LittleEndian::read_u32(&b[12..]) as u64
}

pub fn end_cen_offset(b: &[u8]) -> u64 {
    LittleEndian::read_u32(&b[16..]) as u64
}

pub fn end_comment_len(b: &[u8]) -> usize {
    LittleEndian::read_u16(&b[20..]) as usize
}

/// Parsed end-of-central-directory record
#[derive(Debug, Clone, Copy)]
pub struct EndRecord {
    /// Total entry count; a 16-bit hint, the true count may be larger
    pub total: u16,
    /// Declared size of the central directory in bytes
    pub cen_size: u64,
    /// Declared offset of the central directory from the archive base
    pub cen_offset: u64,
}

impl EndRecord {
    /// Parse the fixed fields; `b` must hold at least [`ENDHDR`] bytes
    pub fn parse(b: &[u8]) -> Self {
        Self {
            total: end_total(b),
            cen_size: end_cen_size(b),
            cen_offset: end_cen_offset(b),
        }
    }
}

// Central directory header fields

pub fn cen_flags(b: &[u8]) -> u16 {
    LittleEndian::read_u16(&b[8..])
}

pub fn cen_method(b: &[u8]) -> u16 {
    LittleEndian::read_u16(&b[10..])
}

pub fn cen_time(b: &[u8]) -> u32 {
    LittleEndian::read_u32(&b[12..])
}

pub fn cen_crc(b: &[u8]) -> u32 {
    LittleEndian::read_u32(&b[16..])
}

pub fn cen_csize(b: &[u8]) -> u64 {
    LittleEndian::read_u32(&b[20..]) as u64
}

pub fn cen_size(b: &[u8]) -> u64 {
    LittleEndian::read_u32(&b[24..]) as u64
}

pub fn cen_name_len(b: &[u8]) -> usize {
    LittleEndian::read_u16(&b[28..]) as usize
}

pub fn cen_extra_len(b: &[u8]) -> usize {
    LittleEndian::read_u16(&b[30..]) as usize
}

pub fn cen_comment_len(b: &[u8]) -> usize {
    LittleEndian::read_u16(&b[32..]) as usize
}

pub fn cen_loc_offset(b: &[u8]) -> u64 {
    LittleEndian::read_u32(&b[42..]) as u64
}

/// Full size of a central directory header including its variable trailer
pub fn cen_header_size(b: &[u8]) -> usize {
    CENHDR + cen_name_len(b) + cen_extra_len(b) + cen_comment_len(b)
}

// Local file header fields

pub fn loc_name_len(b: &[u8]) -> usize {
    LittleEndian::read_u16(&b[26..]) as usize
}

pub fn loc_extra_len(b: &[u8]) -> usize {
    LittleEndian::read_u16(&b[28..]) as usize
}
