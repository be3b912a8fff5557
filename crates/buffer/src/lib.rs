//! LRU-cached page directory sitting between the table engine and
//! [`storage::FileManager`].
//!
//! Holds up to a fixed number of page wrappers in memory, evicting the
//! least-recently-used entry (flushing it first if dirty) on a capacity
//! miss. A page is always reachable either in the cache or on disk; no
//! live page exists only in memory except during the critical section of
//! a write that is about to be flushed or evicted.

#[cfg(test)]
mod tests;

use common::{Clock, ColumnId, DbError, DbResult};
use hashbrown::HashMap;
use std::sync::Arc;
use storage::{FileManager, Page};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
struct PageKey {
    column: ColumnId,
    is_tail: bool,
    page_no: u64,
}

struct Wrapper {
    key: PageKey,
    page: Page,
    last_access_ns: i64,
}

/// Owns up to `capacity` page wrappers in memory over a file-backed
/// [`FileManager`]. Every mutating accessor bumps the touched page's
/// recency; [`PageDirectory::retrieve`] and [`PageDirectory::get_or_create`]
/// evict the least-recently-used entry before inserting a new one.
pub struct PageDirectory {
    files: FileManager,
    capacity: usize,
    cache: HashMap<PageKey, Wrapper>,
    clock: Arc<dyn Clock>,
}

impl PageDirectory {
    pub fn new(files: FileManager, capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            files,
            capacity: capacity.max(1),
            cache: HashMap::new(),
            clock,
        }
    }

    pub fn max_page_number(&self, is_tail: bool) -> DbResult<Option<u64>> {
        self.files.max_page_number(is_tail)
    }

    pub fn delete_table_files(&self) -> DbResult<()> {
        self.files.delete_table_files()
    }

    fn touch(&mut self, key: PageKey) -> &mut Page {
        let now = self.clock.now_nanos();
        let wrapper = self.cache.get_mut(&key).expect("key just inserted or hit");
        wrapper.last_access_ns = now;
        &mut wrapper.page
    }

    /// Evict the least-recently-used wrapper if the cache is at capacity,
    /// flushing it first if dirty.
    fn ensure_room(&mut self) -> DbResult<()> {
        if self.cache.len() < self.capacity {
            return Ok(());
        }
        let victim = self
            .cache
            .values()
            .min_by_key(|w| w.last_access_ns)
            .map(|w| w.key)
            .expect("cache nonempty when at or over capacity");
        let wrapper = self.cache.remove(&victim).expect("victim key came from cache");
        if wrapper.page.is_dirty() {
            self.files
                .store(victim.column, victim.is_tail, victim.page_no, &wrapper.page)?;
        }
        Ok(())
    }

    /// Fetch an existing page, loading it from disk on a cache miss. Errors
    /// if no such page has ever been written.
    pub fn retrieve(&mut self, column: ColumnId, is_tail: bool, page_no: u64) -> DbResult<&mut Page> {
        let key = PageKey { column, is_tail, page_no };
        if self.cache.contains_key(&key) {
            return Ok(self.touch(key));
        }
        let page = self.files.load(column, is_tail, page_no)?.ok_or_else(|| {
            DbError::Storage(format!(
                "page column={column} is_tail={is_tail} page#={page_no} does not exist"
            ))
        })?;
        self.ensure_room()?;
        let now = self.clock.now_nanos();
        self.cache.insert(
            key,
            Wrapper {
                key,
                page,
                last_access_ns: now,
            },
        );
        Ok(&mut self.cache.get_mut(&key).expect("just inserted").page)
    }

    /// Fetch a page, creating and writing through an empty one if it has
    /// never been allocated. Used by the table engine's insert path, which
    /// must be able to name the next page before anything has been written
    /// to it.
    pub fn get_or_create(
        &mut self,
        column: ColumnId,
        is_tail: bool,
        page_no: u64,
        page_size: usize,
        record_size: usize,
    ) -> DbResult<&mut Page> {
        let key = PageKey { column, is_tail, page_no };
        if self.cache.contains_key(&key) {
            return Ok(self.touch(key));
        }
        let page = match self.files.load(column, is_tail, page_no)? {
            Some(page) => page,
            None => {
                let page = Page::new(page_size, record_size);
                self.files.store(column, is_tail, page_no, &page)?;
                page
            }
        };
        self.ensure_room()?;
        let now = self.clock.now_nanos();
        self.cache.insert(
            key,
            Wrapper {
                key,
                page,
                last_access_ns: now,
            },
        );
        Ok(&mut self.cache.get_mut(&key).expect("just inserted").page)
    }

    /// Atomically replace a cached-and-persisted page with a consolidated
    /// copy, as used by merge. Writes through immediately and marks the
    /// cached copy clean.
    pub fn swap(&mut self, column: ColumnId, is_tail: bool, page_no: u64, mut page: Page) -> DbResult<()> {
        self.files.store(column, is_tail, page_no, &page)?;
        page.mark_clean();
        let key = PageKey { column, is_tail, page_no };
        if !self.cache.contains_key(&key) {
            self.ensure_room()?;
        }
        let now = self.clock.now_nanos();
        self.cache.insert(
            key,
            Wrapper {
                key,
                page,
                last_access_ns: now,
            },
        );
        Ok(())
    }

    /// Flush every dirty cached page to disk.
    pub fn save_all(&mut self) -> DbResult<()> {
        for wrapper in self.cache.values_mut() {
            if wrapper.page.is_dirty() {
                self.files
                    .store(wrapper.key.column, wrapper.key.is_tail, wrapper.key.page_no, &wrapper.page)?;
                wrapper.page.mark_clean();
            }
        }
        Ok(())
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}
