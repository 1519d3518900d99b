//! Positioned file reads shared by the directory and data paths
//!
//! All archive I/O goes through [`read_fully_at`], which never moves a shared
//! seek cursor. Concurrent readers of one file handle therefore cannot
//! interfere with each other.

use std::fs::File;
use std::io;

/// Read exactly `buf.len()` bytes from `file` at absolute offset `pos`.
///
/// Interrupted reads are retried transparently. A read that cannot be
/// filled reports `UnexpectedEof`.
#[cfg(unix)]
pub fn read_fully_at(file: &File, pos: u64, buf: &mut [u8]) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, pos)
}

/// Read exactly `buf.len()` bytes from `file` at absolute offset `pos`.
///
/// Interrupted reads are retried transparently. A read that cannot be
/// filled reports `UnexpectedEof`.
#[cfg(windows)]
pub fn read_fully_at(file: &File, pos: u64, mut buf: &mut [u8]) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    let mut pos = pos;
    while !buf.is_empty() {
        match file.seek_read(buf, pos) {
            Ok(0) => break,
            Ok(n) => {
                let tmp = buf;
                buf = &mut tmp[n..];
                pos += n as u64;
            }
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    if buf.is_empty() {
        Ok(())
    } else {
        Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "failed to fill whole buffer",
        ))
    }
}
