//! Entry materialization from central directory headers
//!
//! A catalog cell only knows where its header lives. Turning it into an
//! owned [`JarEntry`] takes one header parse, served from the retained
//! directory mapping when there is one, and otherwise from the file via an
//! access-pattern-sized read.

use super::{Archive, ArchiveState, ReadAheadPage};
use crate::directory::DirectorySource;
use crate::error::{JarError, Result};
use crate::fio::read_fully_at;
use crate::format::{self, CENHDR, METHOD_STORED};
use crate::types::{JarEntry, PayloadOffset};
use tracing::trace;

/// Empirically, most central directory headers are smaller than this
const AMPLE_HEADER_SIZE: usize = 160;

/// Read-ahead size for sequential header access
const HEADER_PAGE_SIZE: usize = 8192;

/// How a header read expects to be followed up
#[derive(Clone, Copy)]
pub(super) enum Access {
    /// Isolated lookup: read just this header
    Random,
    /// Enumeration: keep a page around for the headers that follow
    Sequential,
}

impl Archive {
    /// Build the full entry record for the header at `cen_pos`.
    pub(super) fn materialize(
        &self,
        cen_pos: u64,
        access: Access,
        state: &mut ArchiveState,
    ) -> Result<JarEntry> {
        if let DirectorySource::Mapped { map, base } = &self.source {
            let start = (cen_pos - base) as usize;
            let fixed = map
                .get(start..start + CENHDR)
                .ok_or_else(truncated_header)?;
            let header = map
                .get(start..start + format::cen_header_size(fixed))
                .ok_or_else(truncated_header)?;
            return Ok(self.parse_entry(header));
        }

        match access {
            Access::Random => {
                let buf = self.read_header_at(cen_pos, AMPLE_HEADER_SIZE)?;
                Ok(self.parse_entry(&buf))
            }
            Access::Sequential => {
                if let Some(page) = &state.page {
                    if let Some(header) = page_hit(page, cen_pos) {
                        trace!("header page hit at {cen_pos}");
                        return Ok(self.parse_entry(header));
                    }
                }
                let data = self.read_header_at(cen_pos, HEADER_PAGE_SIZE)?;
                let page = state.page.insert(ReadAheadPage {
                    pos: cen_pos,
                    data,
                });
                Ok(self.parse_entry(&page.data))
            }
        }
    }

    /// Read at least the header at `cen_pos`, preferring `want` bytes.
    ///
    /// The read is clamped to end-of-file. When the header's variable
    /// trailer overruns what was read, exactly one follow-up read fetches
    /// the rest, so the returned buffer always holds the whole header.
    fn read_header_at(&self, cen_pos: u64, want: usize) -> Result<Vec<u8>> {
        let take = (want as u64).min(self.len.saturating_sub(cen_pos)) as usize;
        if take < CENHDR {
            return Err(truncated_header());
        }
        let mut buf = vec![0u8; take];
        read_fully_at(&self.file, cen_pos, &mut buf)?;

        let full = format::cen_header_size(&buf);
        if full > buf.len() {
            let have = buf.len();
            buf.resize(full, 0);
            read_fully_at(&self.file, cen_pos + have as u64, &mut buf[have..])?;
        }
        Ok(buf)
    }

    /// Decode one complete header into an owned entry.
    ///
    /// Headers were validated when the catalog was built, so no checks are
    /// repeated here; `header` must span the whole variable trailer.
    fn parse_entry(&self, header: &[u8]) -> JarEntry {
        let name_len = format::cen_name_len(header);
        let extra_len = format::cen_extra_len(header);
        let comment_len = format::cen_comment_len(header);

        let name = header[CENHDR..CENHDR + name_len].to_vec();
        let extra =
            (extra_len > 0).then(|| header[CENHDR + name_len..][..extra_len].to_vec());
        let comment = (comment_len > 0)
            .then(|| header[CENHDR + name_len + extra_len..][..comment_len].to_vec());

        JarEntry {
            name,
            extra,
            comment,
            size: format::cen_size(header),
            // A zero in-memory csize means "stored" everywhere downstream
            csize: if format::cen_method(header) == METHOD_STORED {
                0
            } else {
                format::cen_csize(header)
            },
            crc: format::cen_crc(header),
            time: format::cen_time(header),
            payload: PayloadOffset::Unresolved(self.loc_base + format::cen_loc_offset(header)),
        }
    }
}

/// Serve a header from the read-ahead page if it lies entirely inside.
fn page_hit(page: &ReadAheadPage, cen_pos: u64) -> Option<&[u8]> {
    let end = page.pos + page.data.len() as u64;
    if cen_pos < page.pos || cen_pos + CENHDR as u64 > end {
        return None;
    }
    let start = (cen_pos - page.pos) as usize;
    let full = format::cen_header_size(&page.data[start..]);
    if cen_pos + full as u64 > end {
        return None;
    }
    Some(&page.data[start..start + full])
}

fn truncated_header() -> JarError {
    JarError::Corrupt("central directory header truncated".into())
}
