//! Fixed-size columnar pages and their on-disk representation.
//!
//! A [`Page`] holds exactly one column's worth of fixed-width partial
//! records. Pages are mutable only via append (base/tail insertion) or
//! overwrite at a known offset (indirection update, merge consolidation);
//! both set the page's dirty flag. [`FileManager`] serializes pages to one
//! file per `(column, is_tail, page#)` under a table's directory.


use common::{ColumnId, DbError, DbResult};
use std::fs;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// One column's worth of fixed-width partial records, backed by a flat byte
/// buffer of exactly `page_size` bytes.
#[derive(Debug, Clone)]
pub struct Page {
    record_size: usize,
    capacity: usize,
    num_records: usize,
    buf: Vec<u8>,
    dirty: bool,
}

impl Page {
    /// A freshly allocated, empty page sized for `record_size`-byte slots.
    pub fn new(page_size: usize, record_size: usize) -> Self {
        assert!(record_size > 0, "record_size must be nonzero");
        assert!(
            page_size % record_size == 0,
            "record_size must evenly divide page_size"
        );
        Self {
            record_size,
            capacity: page_size / record_size,
            num_records: 0,
            buf: vec![0u8; page_size],
            dirty: false,
        }
    }

    /// Reconstruct a page from a previously written buffer.
    fn from_parts(record_size: usize, num_records: usize, buf: Vec<u8>) -> Self {
        let capacity = buf.len() / record_size;
        Self {
            record_size,
            capacity,
            num_records,
            buf,
            dirty: false,
        }
    }

    pub fn record_size(&self) -> usize {
        self.record_size
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn num_records(&self) -> usize {
        self.num_records
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn has_capacity(&self) -> bool {
        self.num_records < self.capacity
    }

    fn slot(&self, offset: usize) -> std::ops::Range<usize> {
        let start = offset * self.record_size;
        start..start + self.record_size
    }

    /// Append `record` (exactly `record_size` bytes) at the next free slot,
    /// returning its offset. Fails if the page is full.
    pub fn append(&mut self, record: &[u8]) -> DbResult<usize> {
        if !self.has_capacity() {
            return Err(DbError::Storage("page is full".to_string()));
        }
        if record.len() != self.record_size {
            return Err(DbError::Storage(format!(
                "record is {} bytes, expected {}",
                record.len(),
                self.record_size
            )));
        }
        let offset = self.num_records;
        let range = self.slot(offset);
        self.buf[range].copy_from_slice(record);
        self.num_records += 1;
        self.dirty = true;
        Ok(offset)
    }

    /// Overwrite an already-written slot in place. Fails if `offset` is not
    /// a live record (`offset >= num_records`).
    pub fn overwrite_at(&mut self, offset: usize, record: &[u8]) -> DbResult<()> {
        if offset >= self.num_records {
            return Err(DbError::Storage(format!(
                "offset {offset} is not a live record ({} written)",
                self.num_records
            )));
        }
        if record.len() != self.record_size {
            return Err(DbError::Storage(format!(
                "record is {} bytes, expected {}",
                record.len(),
                self.record_size
            )));
        }
        let range = self.slot(offset);
        self.buf[range].copy_from_slice(record);
        self.dirty = true;
        Ok(())
    }

    pub fn read_at(&self, offset: usize) -> DbResult<&[u8]> {
        if offset >= self.num_records {
            return Err(DbError::Storage(format!(
                "offset {offset} is not a live record ({} written)",
                self.num_records
            )));
        }
        Ok(&self.buf[self.slot(offset)])
    }
}

/// Decode a schema-encoding slot: a big-endian integer whose low
/// `num_columns` bits are the per-column "this tail updates column i" flags.
pub fn decode_schema(slot: &[u8], num_columns: usize) -> Vec<bool> {
    let mut value: u128 = 0;
    for &byte in slot {
        value = (value << 8) | byte as u128;
    }
    (0..num_columns)
        .map(|i| (value >> i) & 1 == 1)
        .collect()
}

/// Encode a per-column bitmap into a `record_size`-byte big-endian slot.
pub fn encode_schema(bits: &[bool], record_size: usize) -> Vec<u8> {
    let mut value: u128 = 0;
    for (i, &bit) in bits.iter().enumerate() {
        if bit {
            value |= 1 << i;
        }
    }
    let mut out = vec![0u8; record_size];
    for i in 0..record_size {
        let shift = 8 * (record_size - 1 - i);
        out[i] = ((value >> shift) & 0xff) as u8;
    }
    out
}

/// Encode a signed integer as a `record_size`-byte big-endian slot.
pub fn encode_i64(value: i64, record_size: usize) -> Vec<u8> {
    let mut out = vec![0u8; record_size];
    let bytes = value.to_be_bytes();
    let start = bytes.len().saturating_sub(record_size);
    let copy_len = record_size.min(bytes.len());
    out[record_size - copy_len..].copy_from_slice(&bytes[start..]);
    out
}

/// Decode a `record_size`-byte big-endian slot as a signed integer,
/// sign-extending from the slot's top bit.
pub fn decode_i64(slot: &[u8]) -> i64 {
    let negative = slot.first().map(|b| b & 0x80 != 0).unwrap_or(false);
    let mut bytes = [if negative { 0xffu8 } else { 0u8 }; 8];
    let copy_len = slot.len().min(8);
    bytes[8 - copy_len..].copy_from_slice(&slot[slot.len() - copy_len..]);
    i64::from_be_bytes(bytes)
}

/// Encode a page's `num_records` as a little-endian `record_size`-byte page
/// file header, distinct from [`encode_i64`]'s big-endian data-slot
/// encoding.
fn encode_len(num_records: usize, record_size: usize) -> Vec<u8> {
    let bytes = (num_records as u64).to_le_bytes();
    let mut out = vec![0u8; record_size];
    let copy_len = record_size.min(bytes.len());
    out[..copy_len].copy_from_slice(&bytes[..copy_len]);
    out
}

/// Decode a page file's little-endian `num_records` header.
fn decode_len(header: &[u8]) -> usize {
    let mut bytes = [0u8; 8];
    let copy_len = header.len().min(8);
    bytes[..copy_len].copy_from_slice(&header[..copy_len]);
    u64::from_le_bytes(bytes) as usize
}

/// Serializes pages to one file per `(column, is_tail, page#)` under a
/// table's directory, per the on-disk layout
/// `<table_dir>/{b|t}_col<C>_<N>.bin`.
#[derive(Debug, Clone)]
pub struct FileManager {
    table_dir: PathBuf,
    page_size: usize,
    record_size: usize,
}

impl FileManager {
    pub fn new(table_dir: impl Into<PathBuf>, page_size: usize, record_size: usize) -> DbResult<Self> {
        let table_dir = table_dir.into();
        fs::create_dir_all(&table_dir)?;
        Ok(Self {
            table_dir,
            page_size,
            record_size,
        })
    }

    pub fn table_dir(&self) -> &Path {
        &self.table_dir
    }

    fn file_name(column: ColumnId, is_tail: bool, page_no: u64) -> String {
        let side = if is_tail { 't' } else { 'b' };
        format!("{side}_col{column}_{page_no}.bin")
    }

    fn path_for(&self, column: ColumnId, is_tail: bool, page_no: u64) -> PathBuf {
        self.table_dir.join(Self::file_name(column, is_tail, page_no))
    }

    /// Load a page from disk, or `None` if its file does not exist.
    pub fn load(&self, column: ColumnId, is_tail: bool, page_no: u64) -> DbResult<Option<Page>> {
        let path = self.path_for(column, is_tail, page_no);
        if !path.exists() {
            return Ok(None);
        }
        let mut file = File::open(&path)?;
        let mut header = vec![0u8; self.record_size];
        file.read_exact(&mut header)?;
        let num_records = decode_len(&header);
        let mut buf = vec![0u8; self.page_size];
        file.read_exact(&mut buf)?;
        Ok(Some(Page::from_parts(self.record_size, num_records, buf)))
    }

    /// Write a page to its file, creating it if necessary.
    pub fn store(&self, column: ColumnId, is_tail: bool, page_no: u64, page: &Page) -> DbResult<()> {
        let path = self.path_for(column, is_tail, page_no);
        let mut file = File::create(&path)?;
        file.write_all(&encode_len(page.num_records(), self.record_size))?;
        file.write_all(&page.buf)?;
        Ok(())
    }

    /// Highest allocated page number for either side, probed via column 0
    /// (which every live table has).
    pub fn max_page_number(&self, is_tail: bool) -> DbResult<Option<u64>> {
        let prefix = if is_tail { "t_col0_" } else { "b_col0_" };
        let mut max = None;
        for entry in fs::read_dir(&self.table_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(rest) = name.strip_prefix(prefix) {
                if let Some(num) = rest.strip_suffix(".bin") {
                    if let Ok(n) = num.parse::<u64>() {
                        max = Some(max.map_or(n, |m: u64| m.max(n)));
                    }
                }
            }
        }
        Ok(max)
    }

    /// Remove every page file belonging to this table.
    pub fn delete_table_files(&self) -> DbResult<()> {
        if self.table_dir.exists() {
            fs::remove_dir_all(&self.table_dir)?;
        }
        Ok(())
    }
}
