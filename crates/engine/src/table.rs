use crate::{CREATED_TIME_COLUMN, INDIRECTION_COLUMN, NUM_METADATA_COLUMNS, RID_COLUMN, SCHEMA_COLUMN, UPDATED_TIME_COLUMN};
use crate::Record;
use buffer::PageDirectory;
use common::{Clock, ColumnId, Config, DbError, DbResult, IndexKind};
use index::IndexImpl;
use rid::{Rid, RidLayout};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use storage::{decode_i64, decode_schema, encode_i64, encode_schema, FileManager};

/// One table's storage, indexes, and versioning state.
///
/// Column numbering is fixed: the five metadata columns occupy `0..5`
/// ([`crate::RID_COLUMN`] .. [`crate::UPDATED_TIME_COLUMN`]), and the `D`
/// user columns occupy `5..5+D`. `indexes[i]` backs user column `i`
/// (absolute column `5+i`); metadata columns are never indexed.
pub struct Table {
    name: String,
    dir: PathBuf,
    key_col: usize,
    num_columns: usize,
    config: Config,
    layout: RidLayout,
    clock: Arc<dyn Clock>,
    page_dir: PageDirectory,
    indexes: Vec<IndexImpl>,
    index_kinds: Vec<IndexKind>,
    current_base_page: u64,
    current_tail_page: u64,
    update_counter: usize,
    merge_set: HashSet<(u64, ColumnId)>,
}

impl Table {
    /// Open a table's directory, creating it if absent. Reconstructs
    /// `current_base_page`/`current_tail_page` by probing the highest page
    /// number ever written (via [`FileManager::max_page_number`]) and
    /// reloads each column's persisted index, so this single constructor
    /// serves both "create a brand new table" (an empty directory) and
    /// "reopen an existing one."
    pub fn open(
        dir: impl Into<PathBuf>,
        name: impl Into<String>,
        num_columns: usize,
        key_col: usize,
        config: Config,
        index_kinds: Vec<IndexKind>,
        clock: Arc<dyn Clock>,
    ) -> DbResult<Self> {
        if key_col >= num_columns {
            return Err(DbError::Engine(format!(
                "key_col {key_col} out of range for {num_columns} columns"
            )));
        }
        let index_kinds = match index_kinds.len() {
            0 => vec![IndexKind::BTree; num_columns],
            n if n == num_columns => index_kinds,
            n => {
                return Err(DbError::Engine(format!(
                    "index_kinds length {n} does not match num_columns {num_columns}"
                )));
            }
        };

        let dir = dir.into();
        let files = FileManager::new(&dir, config.page_size, config.record_size)?;
        let mut page_dir = PageDirectory::new(files, config.buffer_pool_pages, clock.clone());

        let mut indexes = Vec::with_capacity(num_columns);
        for (i, kind) in index_kinds.iter().enumerate() {
            let idx_dir = Self::index_dir(&dir, NUM_METADATA_COLUMNS + i as ColumnId);
            indexes.push(IndexImpl::load(*kind, &idx_dir, config.bplus_max_degree)?);
        }

        let current_base_page = Self::resume_page_cursor(&mut page_dir, false)?;
        let current_tail_page = Self::resume_page_cursor(&mut page_dir, true)?;

        Ok(Self {
            name: name.into(),
            dir,
            key_col,
            num_columns,
            layout: config.rid_layout(),
            config,
            clock,
            page_dir,
            indexes,
            index_kinds,
            current_base_page,
            current_tail_page,
            update_counter: 0,
            merge_set: HashSet::new(),
        })
    }

    fn resume_page_cursor(page_dir: &mut PageDirectory, is_tail: bool) -> DbResult<u64> {
        match page_dir.max_page_number(is_tail)? {
            Some(n) => {
                let has_room = page_dir.retrieve(RID_COLUMN, is_tail, n)?.has_capacity();
                Ok(if has_room { n } else { n + 1 })
            }
            None => Ok(0),
        }
    }

    fn index_dir(table_dir: &Path, col_abs: ColumnId) -> PathBuf {
        table_dir.join("index").join(format!("col{col_abs}"))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_columns(&self) -> usize {
        self.num_columns
    }

    pub fn key_col(&self) -> usize {
        self.key_col
    }

    pub fn index_kinds(&self) -> &[IndexKind] {
        &self.index_kinds
    }

    /// Flush every dirty cached page to disk. Index persistence is separate
    /// (see [`Table::save_indexes`]) since it is not buffer-pool-backed.
    pub fn flush(&mut self) -> DbResult<()> {
        self.page_dir.save_all()
    }

    pub fn save_indexes(&self) -> DbResult<()> {
        for i in 0..self.num_columns {
            let col_abs = NUM_METADATA_COLUMNS + i as ColumnId;
            self.indexes[i].save(&Self::index_dir(&self.dir, col_abs))?;
        }
        Ok(())
    }

    pub fn delete_files(&self) -> DbResult<()> {
        self.page_dir.delete_table_files()
    }

    fn key_col_abs(&self) -> ColumnId {
        NUM_METADATA_COLUMNS + self.key_col as ColumnId
    }

    fn is_tombstone(&self, rid: Rid) -> bool {
        rid == self.layout.tombstone()
    }

    fn rid_from_slot(value: i64) -> Rid {
        Rid(value as u64)
    }

    fn read_i64(&mut self, col: ColumnId, rid: Rid) -> DbResult<i64> {
        let (is_tail, page, offset) = self.layout.unpack(rid);
        let page_ref = self.page_dir.retrieve(col, is_tail, page)?;
        Ok(decode_i64(page_ref.read_at(offset as usize)?))
    }

    fn write_i64(&mut self, col: ColumnId, rid: Rid, value: i64) -> DbResult<()> {
        let (is_tail, page, offset) = self.layout.unpack(rid);
        let rs = self.config.record_size;
        let page_ref = self.page_dir.retrieve(col, is_tail, page)?;
        page_ref.overwrite_at(offset as usize, &encode_i64(value, rs))
    }

    fn read_schema(&mut self, rid: Rid) -> DbResult<Vec<bool>> {
        let (is_tail, page, offset) = self.layout.unpack(rid);
        let page_ref = self.page_dir.retrieve(SCHEMA_COLUMN, is_tail, page)?;
        Ok(decode_schema(page_ref.read_at(offset as usize)?, self.num_columns))
    }

    /// RIDs whose current value in `col_abs` is `value`, via the column's
    /// index or (for `Linear`-kind columns) a full base-page scan.
    fn point_current(&mut self, col_abs: ColumnId, value: i64) -> DbResult<Vec<Rid>> {
        let idx = (col_abs - NUM_METADATA_COLUMNS) as usize;
        match self.indexes[idx].point(value) {
            Some(rids) => Ok(rids),
            None => self.linear_scan(col_abs, 0, move |v| v == value),
        }
    }

    fn range_current(&mut self, col_abs: ColumnId, lo: i64, hi: i64) -> DbResult<Vec<Rid>> {
        let (lo, hi) = if hi < lo { (hi, lo) } else { (lo, hi) };
        let idx = (col_abs - NUM_METADATA_COLUMNS) as usize;
        match self.indexes[idx].range(lo, hi) {
            Some(rids) => Ok(rids),
            None => self.linear_scan(col_abs, 0, move |v| v >= lo && v <= hi),
        }
    }

    /// Scans every base page of `col_abs`, the linear-scan fallback
    /// promised by spec.md §4.5.3 for `Linear`-kind columns and for
    /// version queries a hashtable index cannot answer. Evaluates
    /// `col_abs`'s value at `rel_ver` for every live base record (walking
    /// indirection exactly as `locate_record` does) and keeps the RID when
    /// `pred` matches.
    fn linear_scan(&mut self, col_abs: ColumnId, rel_ver: i64, mut pred: impl FnMut(i64) -> bool) -> DbResult<Vec<Rid>> {
        let data_i = (col_abs - NUM_METADATA_COLUMNS) as usize;
        let mut mask = vec![false; self.num_columns];
        mask[data_i] = true;
        let mut out = Vec::new();
        let Some(max_page) = self.page_dir.max_page_number(false)? else {
            return Ok(out);
        };
        for page_no in 0..=max_page {
            let count = self.page_dir.retrieve(RID_COLUMN, false, page_no)?.num_records();
            for offset in 0..count {
                let base_rid = self.layout.pack(false, page_no, offset as u64);
                if let Some(result) = self.locate_record(base_rid, &mask, rel_ver)? {
                    if let Some(v) = result[data_i] {
                        if pred(v) {
                            out.push(base_rid);
                        }
                    }
                }
            }
        }
        Ok(out)
    }

    /// Insert a new base record. Fails (returns `Ok(false)`) if the input
    /// arity is wrong or the primary key already exists.
    pub fn insert(&mut self, vals: &[i64]) -> DbResult<bool> {
        if vals.len() != self.num_columns {
            return Ok(false);
        }
        let key_val = vals[self.key_col];
        if !self.point_current(self.key_col_abs(), key_val)?.is_empty() {
            return Ok(false);
        }

        let ps = self.config.page_size;
        let rs = self.config.record_size;
        let page_no = self.current_base_page;

        let offset = self.page_dir.get_or_create(RID_COLUMN, false, page_no, ps, rs)?.num_records();
        let rid = self.layout.pack(false, page_no, offset as u64);

        self.page_dir
            .get_or_create(RID_COLUMN, false, page_no, ps, rs)?
            .append(&encode_i64(rid.0 as i64, rs))?;
        self.page_dir
            .get_or_create(INDIRECTION_COLUMN, false, page_no, ps, rs)?
            .append(&encode_i64(rid.0 as i64, rs))?;
        let zero_schema = vec![false; self.num_columns];
        self.page_dir
            .get_or_create(SCHEMA_COLUMN, false, page_no, ps, rs)?
            .append(&encode_schema(&zero_schema, rs))?;
        let now = self.clock.now_nanos();
        self.page_dir
            .get_or_create(CREATED_TIME_COLUMN, false, page_no, ps, rs)?
            .append(&encode_i64(now, rs))?;
        self.page_dir
            .get_or_create(UPDATED_TIME_COLUMN, false, page_no, ps, rs)?
            .append(&encode_i64(now, rs))?;

        for i in 0..self.num_columns {
            let col = NUM_METADATA_COLUMNS + i as ColumnId;
            self.page_dir
                .get_or_create(col, false, page_no, ps, rs)?
                .append(&encode_i64(vals[i], rs))?;
            self.indexes[i].insert(vals[i], rid);
        }

        if !self.page_dir.retrieve(RID_COLUMN, false, page_no)?.has_capacity() {
            self.current_base_page += 1;
        }
        Ok(true)
    }

    /// Append a tail record recording an update to the base record whose
    /// primary key is `pk`. `vals[i] = None` means "no change" for column
    /// `i`. Fails if `pk` is absent, tombstoned, or the update would
    /// collide with an existing primary key.
    pub fn update(&mut self, pk: i64, vals: &[Option<i64>]) -> DbResult<bool> {
        if vals.len() != self.num_columns {
            return Ok(false);
        }
        let Some(base_rid) = self.point_current(self.key_col_abs(), pk)?.first().copied() else {
            return Ok(false);
        };
        let prev = Self::rid_from_slot(self.read_i64(INDIRECTION_COLUMN, base_rid)?);
        if self.is_tombstone(prev) {
            return Ok(false);
        }
        if let Some(new_pk) = vals[self.key_col] {
            if new_pk != pk && !self.point_current(self.key_col_abs(), new_pk)?.is_empty() {
                return Ok(false);
            }
        }

        let cumulative = self.config.tail_policy.is_cumulative();
        let schema_bits: Vec<bool> = if cumulative {
            vec![true; self.num_columns]
        } else {
            vals.iter().map(|v| v.is_some()).collect()
        };

        let mut full_vals = vec![0i64; self.num_columns];
        for i in 0..self.num_columns {
            full_vals[i] = match vals[i] {
                Some(v) => v,
                None if cumulative => {
                    let col = NUM_METADATA_COLUMNS + i as ColumnId;
                    self.read_i64(col, prev)?
                }
                None => 0,
            };
        }

        let ps = self.config.page_size;
        let rs = self.config.record_size;
        let tail_page_no = self.current_tail_page;

        let offset = self.page_dir.get_or_create(RID_COLUMN, true, tail_page_no, ps, rs)?.num_records();
        let tail_rid = self.layout.pack(true, tail_page_no, offset as u64);

        self.page_dir
            .get_or_create(RID_COLUMN, true, tail_page_no, ps, rs)?
            .append(&encode_i64(tail_rid.0 as i64, rs))?;
        self.page_dir
            .get_or_create(INDIRECTION_COLUMN, true, tail_page_no, ps, rs)?
            .append(&encode_i64(prev.0 as i64, rs))?;
        self.page_dir
            .get_or_create(SCHEMA_COLUMN, true, tail_page_no, ps, rs)?
            .append(&encode_schema(&schema_bits, rs))?;
        let now = self.clock.now_nanos();
        self.page_dir
            .get_or_create(CREATED_TIME_COLUMN, true, tail_page_no, ps, rs)?
            .append(&encode_i64(now, rs))?;
        self.page_dir
            .get_or_create(UPDATED_TIME_COLUMN, true, tail_page_no, ps, rs)?
            .append(&encode_i64(now, rs))?;

        for i in 0..self.num_columns {
            let col = NUM_METADATA_COLUMNS + i as ColumnId;
            self.page_dir
                .get_or_create(col, true, tail_page_no, ps, rs)?
                .append(&encode_i64(full_vals[i], rs))?;
        }

        // `prev`'s own data slots only hold authoritative values for the
        // columns its own schema encoding has set; under delta tails a slot
        // whose bit is 0 is unwritten fill, not the column's current value
        // (spec.md §9's "MUST NOT read a delta tail's data column when its
        // schema bit is 0"). So the old value for the index update has to
        // come from the same chain walk `locate_record` uses, not a raw
        // read at `prev`. `base_rid`'s INDIRECTION still points to `prev` at
        // this point (it is rewritten to `tail_rid` below), so this walks
        // the pre-update chain.
        let old_values = self
            .locate_record(base_rid, &schema_bits, 0)?
            .expect("base record not tombstoned, checked above");

        let (_, base_page, _) = self.layout.unpack(base_rid);
        for i in 0..self.num_columns {
            if schema_bits[i] {
                let col = NUM_METADATA_COLUMNS + i as ColumnId;
                let old_value = old_values[i].expect("masked column always populated");
                self.indexes[i].update(old_value, base_rid, full_vals[i]);
                self.merge_set.insert((base_page, col));
            }
        }

        self.write_i64(INDIRECTION_COLUMN, base_rid, tail_rid.0 as i64)?;

        if !self.page_dir.retrieve(RID_COLUMN, true, tail_page_no)?.has_capacity() {
            self.current_tail_page += 1;
        }

        self.update_counter += 1;
        if self.update_counter >= self.config.merge_threshold {
            self.merge()?;
            self.update_counter = 0;
        }
        Ok(true)
    }

    /// Materialize the projected columns of the record at `base_rid`, as it
    /// existed `rel_ver` updates ago (`rel_ver <= 0`; `0` is current).
    /// Returns `None` if the record is tombstoned. If the indirection chain
    /// is shorter than `|rel_ver|`, returns the base record (spec.md
    /// §4.6.3's "history shorter than requested" rule).
    pub fn locate_record(&mut self, base_rid: Rid, mask: &[bool], rel_ver: i64) -> DbResult<Option<Vec<Option<i64>>>> {
        debug_assert!(rel_ver <= 0, "rel_ver must be <= 0");
        let indirection = Self::rid_from_slot(self.read_i64(INDIRECTION_COLUMN, base_rid)?);
        if self.is_tombstone(indirection) {
            return Ok(None);
        }
        if indirection == base_rid {
            return Ok(Some(self.base_values(base_rid, mask)?));
        }

        let mut cursor = indirection;
        let mut hops = (-rel_ver) as u64;
        while hops > 0 {
            if cursor == base_rid {
                break;
            }
            cursor = Self::rid_from_slot(self.read_i64(INDIRECTION_COLUMN, cursor)?);
            hops -= 1;
        }
        if cursor == base_rid {
            return Ok(Some(self.base_values(base_rid, mask)?));
        }

        let mut remaining = mask.to_vec();
        let mut out: Vec<Option<i64>> = vec![None; mask.len()];
        let mut tail = cursor;
        loop {
            let schema = self.read_schema(tail)?;
            for i in 0..mask.len() {
                if remaining[i] && schema[i] {
                    let col = NUM_METADATA_COLUMNS + i as ColumnId;
                    out[i] = Some(self.read_i64(col, tail)?);
                    remaining[i] = false;
                }
            }
            if !remaining.iter().any(|&b| b) {
                break;
            }
            let next = Self::rid_from_slot(self.read_i64(INDIRECTION_COLUMN, tail)?);
            if next == base_rid {
                break;
            }
            tail = next;
        }
        for i in 0..mask.len() {
            if remaining[i] {
                let col = NUM_METADATA_COLUMNS + i as ColumnId;
                out[i] = Some(self.read_i64(col, base_rid)?);
            }
        }
        Ok(Some(out))
    }

    fn base_values(&mut self, base_rid: Rid, mask: &[bool]) -> DbResult<Vec<Option<i64>>> {
        let mut out = vec![None; mask.len()];
        for i in 0..mask.len() {
            if mask[i] {
                let col = NUM_METADATA_COLUMNS + i as ColumnId;
                out[i] = Some(self.read_i64(col, base_rid)?);
            }
        }
        Ok(out)
    }

    /// Find every live record whose current value in `search_col` is
    /// `search_key`, projecting `mask` at relative version `rel_ver`.
    pub fn select_version(&mut self, search_key: i64, search_col: usize, mask: &[bool], rel_ver: i64) -> DbResult<Vec<Record>> {
        if search_col >= self.num_columns || mask.len() != self.num_columns {
            return Ok(Vec::new());
        }
        let col_abs = NUM_METADATA_COLUMNS + search_col as ColumnId;
        let rids = self.point_current(col_abs, search_key)?;
        let mut out = Vec::with_capacity(rids.len());
        for rid in rids {
            if let Some(columns) = self.locate_record(rid, mask, rel_ver)? {
                out.push(Record { rid, key: search_key, columns });
            }
        }
        Ok(out)
    }

    pub fn select(&mut self, search_key: i64, search_col: usize, mask: &[bool]) -> DbResult<Vec<Record>> {
        self.select_version(search_key, search_col, mask, 0)
    }

    /// Sum `col`'s values over the primary-key range `[lo, hi]` (swapped if
    /// given out of order) at relative version `rel_ver`. `0` for an empty
    /// range.
    pub fn sum_version(&mut self, lo: i64, hi: i64, col: usize, rel_ver: i64) -> DbResult<i64> {
        if col >= self.num_columns {
            return Ok(0);
        }
        let rids = self.range_current(self.key_col_abs(), lo, hi)?;
        if rids.is_empty() {
            return Ok(0);
        }
        let mut mask = vec![false; self.num_columns];
        mask[col] = true;
        let mut total = 0i64;
        for rid in rids {
            if let Some(result) = self.locate_record(rid, &mask, rel_ver)? {
                if let Some(v) = result[col] {
                    total += v;
                }
            }
        }
        Ok(total)
    }

    pub fn sum(&mut self, lo: i64, hi: i64, col: usize) -> DbResult<i64> {
        self.sum_version(lo, hi, col, 0)
    }

    /// Tombstone the base record for `pk`. Idempotent: tombstoning an
    /// already-deleted record returns `false` without further effect. Tail
    /// storage is left in place.
    pub fn delete(&mut self, pk: i64) -> DbResult<bool> {
        let Some(base_rid) = self.point_current(self.key_col_abs(), pk)?.first().copied() else {
            return Ok(false);
        };
        let current = Self::rid_from_slot(self.read_i64(INDIRECTION_COLUMN, base_rid)?);
        if self.is_tombstone(current) {
            return Ok(false);
        }
        for i in 0..self.num_columns {
            let col = NUM_METADATA_COLUMNS + i as ColumnId;
            let value = self.read_i64(col, current)?;
            self.indexes[i].delete(value, base_rid);
        }
        let tombstone = self.layout.tombstone().0 as i64;
        self.write_i64(INDIRECTION_COLUMN, base_rid, tombstone)?;
        Ok(true)
    }

    /// Convenience composed from `select` + `update`: increments column
    /// `col` of the record with primary key `pk`.
    pub fn increment(&mut self, pk: i64, col: usize) -> DbResult<bool> {
        if col >= self.num_columns {
            return Ok(false);
        }
        let mask = vec![true; self.num_columns];
        let records = self.select(pk, self.key_col, &mask)?;
        let Some(record) = records.first() else {
            return Ok(false);
        };
        let Some(current) = record.columns[col] else {
            return Ok(false);
        };
        let mut new_vals = vec![None; self.num_columns];
        new_vals[col] = Some(current + 1);
        self.update(pk, &new_vals)
    }

    /// Consolidate every `(base_page#, column#)` pair touched by updates
    /// since the last merge: for each live record, overwrite the base
    /// page's copy with the column's current value (reconstructed via the
    /// same indirection chain walk `locate_record` uses, so this is correct
    /// under both cumulative and delta tails, see DESIGN.md's resolution
    /// of spec.md §9's delta-merge open question). Advisory only: it never
    /// touches INDIRECTION, so it cannot change query results, only shorten
    /// future `rel_ver = 0` reads.
    pub fn merge(&mut self) -> DbResult<()> {
        let touched: Vec<(u64, ColumnId)> = self.merge_set.drain().collect();
        let rs = self.config.record_size;
        for (base_page, col) in touched {
            let indirection_raw: Vec<i64> = {
                let page = self.page_dir.retrieve(INDIRECTION_COLUMN, false, base_page)?;
                let mut values = Vec::with_capacity(page.num_records());
                for o in 0..page.num_records() {
                    values.push(decode_i64(page.read_at(o)?));
                }
                values
            };
            let mut copy = self.page_dir.retrieve(col, false, base_page)?.clone();
            let data_i = (col - NUM_METADATA_COLUMNS) as usize;
            let mut mask = vec![false; self.num_columns];
            mask[data_i] = true;
            for (offset, &indirection_value) in indirection_raw.iter().enumerate() {
                let indirection = Self::rid_from_slot(indirection_value);
                let base_rid = self.layout.pack(false, base_page, offset as u64);
                if self.is_tombstone(indirection) || indirection == base_rid {
                    continue;
                }
                if let Some(result) = self.locate_record(base_rid, &mask, 0)? {
                    if let Some(v) = result[data_i] {
                        copy.overwrite_at(offset, &encode_i64(v, rs))?;
                    }
                }
            }
            self.page_dir.swap(col, false, base_page, copy)?;
        }
        Ok(())
    }
}
