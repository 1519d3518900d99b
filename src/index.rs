//! Hash-indexed catalog of central directory entries
//!
//! The catalog is built once while reading the central directory and is
//! immutable afterward. Cells carry only the name hash and the header
//! offset; full entry records are materialized on demand.

/// Chain terminator for hash buckets
pub const END_CHAIN: u32 = u32::MAX;

/// One catalog row: the hash of an entry name and where its central
/// directory header lives in the file
#[derive(Debug, Clone, Copy)]
pub struct CenCell {
    /// Name hash, stored so chain walks can skip non-matches cheaply
    pub hash: u32,
    /// Absolute file offset of the central directory header
    pub cen_pos: u64,
    /// Next cell index in the same bucket, [`END_CHAIN`] terminates
    pub next: u32,
}

/// Immutable entry catalog: cells plus the hash table over them
#[derive(Debug, Default)]
pub struct Catalog {
    cells: Vec<CenCell>,
    table: Vec<u32>,
    meta_names: Vec<String>,
}

impl Catalog {
    /// Create a catalog sized for `total` entries.
    ///
    /// The table length is kept odd for fewer collisions.
    pub fn with_capacity(total: usize) -> Self {
        let tablelen = (total / 2) | 1;
        Self {
            cells: Vec::with_capacity(total),
            table: vec![END_CHAIN; tablelen],
            meta_names: Vec::new(),
        }
    }

    /// Number of catalogued entries
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Record one entry. Cells are prepended to their bucket chain, so
    /// within a bucket the most recently added entry is visited first.
    pub fn add(&mut self, hash: u32, cen_pos: u64) {
        let index = self.cells.len() as u32;
        let bucket = (hash as usize) % self.table.len();
        self.cells.push(CenCell {
            hash,
            cen_pos,
            next: self.table[bucket],
        });
        self.table[bucket] = index;
    }

    /// Record a name from the metadata directory
    pub fn add_meta_name(&mut self, name: &[u8]) {
        self.meta_names
            .push(String::from_utf8_lossy(name).into_owned());
    }

    pub fn cell(&self, index: usize) -> Option<&CenCell> {
        self.cells.get(index)
    }

    /// Walk the bucket chain for `hash`. Yields every cell in the bucket;
    /// callers filter on the stored hash and then on the actual name.
    pub fn chain(&self, hash: u32) -> Chain<'_> {
        let bucket = (hash as usize) % self.table.len();
        Chain {
            cells: &self.cells,
            next: self.table[bucket],
        }
    }

    /// Names of entries under the metadata directory, in directory order
    pub fn meta_names(&self) -> &[String] {
        &self.meta_names
    }
}

/// Iterator over one bucket chain
pub struct Chain<'a> {
    cells: &'a [CenCell],
    next: u32,
}

impl<'a> Iterator for Chain<'a> {
    type Item = &'a CenCell;

    fn next(&mut self) -> Option<&'a CenCell> {
        if self.next == END_CHAIN {
            return None;
        }
        let cell = &self.cells[self.next as usize];
        self.next = cell.next;
        Some(cell)
    }
}

/// Name hash: polynomial with multiplier 31 over the raw bytes.
///
/// No case folding and no Unicode awareness; the bytes are hashed as
/// stored. Lookups must hash the query name the same way.
pub fn hash_name(name: &[u8]) -> u32 {
    name.iter()
        .fold(0u32, |h, &b| h.wrapping_mul(31).wrapping_add(b as u32))
}

/// Extend a name hash by one byte, for retrying a lookup with a
/// character appended instead of rehashing the whole name
pub fn hash_extend(hash: u32, b: u8) -> u32 {
    hash.wrapping_mul(31).wrapping_add(b as u32)
}

/// Whether a name begins with `META-INF/`, ASCII case-insensitive
pub fn is_meta_name(name: &[u8]) -> bool {
    const PREFIX: &[u8] = b"META-INF/";
    name.len() >= PREFIX.len() && name[..PREFIX.len()].eq_ignore_ascii_case(PREFIX)
}
