//! Database: a named collection of tables rooted at one directory.
//!
//! Mirrors the original layout one level up from [`engine::Table`]: each
//! table is a subdirectory holding its page files, its indexes under
//! `index/`, and a two-byte `__table_info__.bin` recording `[num_columns,
//! key_col]` so a closed database can be reopened without the caller
//! re-stating a table's shape.


use common::{Clock, Config, DbError, DbResult, IndexKind, SystemClock};
use engine::Table;
use hashbrown::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

const TABLE_INFO_FILE: &str = "__table_info__.bin";

/// A named collection of tables rooted at one directory on disk.
pub struct Database {
    root: PathBuf,
    config: Config,
    clock: Arc<dyn Clock>,
    tables: HashMap<String, Arc<Mutex<Table>>>,
}

impl Database {
    /// Open (creating if absent) the database directory at `path`,
    /// reloading every table subdirectory it already contains.
    pub fn open(path: impl Into<PathBuf>) -> DbResult<Self> {
        Self::open_with(path, Config::default(), Arc::new(SystemClock::new()))
    }

    pub fn open_with(path: impl Into<PathBuf>, config: Config, clock: Arc<dyn Clock>) -> DbResult<Self> {
        let root = path.into();
        let mut db = Self {
            root: root.clone(),
            config,
            clock,
            tables: HashMap::new(),
        };
        if root.exists() {
            for entry in fs::read_dir(&root)? {
                let entry = entry?;
                if entry.file_type()?.is_dir() {
                    let name = entry.file_name().to_string_lossy().into_owned();
                    db.load_table(&name)?;
                }
            }
        } else {
            fs::create_dir_all(&root)?;
        }
        Ok(db)
    }

    fn table_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn read_table_info(dir: &Path) -> DbResult<(usize, usize)> {
        let bytes = fs::read(dir.join(TABLE_INFO_FILE))?;
        if bytes.len() < 2 {
            return Err(DbError::Engine(format!(
                "{} is malformed, expected 2 bytes",
                TABLE_INFO_FILE
            )));
        }
        Ok((bytes[0] as usize, bytes[1] as usize))
    }

    fn write_table_info(dir: &Path, num_columns: usize, key_col: usize) -> DbResult<()> {
        fs::write(dir.join(TABLE_INFO_FILE), [num_columns as u8, key_col as u8])?;
        Ok(())
    }

    fn load_table(&mut self, name: &str) -> DbResult<()> {
        let dir = self.table_dir(name);
        let (num_columns, key_col) = Self::read_table_info(&dir)?;
        let table = Table::open(
            dir,
            name,
            num_columns,
            key_col,
            self.config.clone(),
            Vec::new(),
            self.clock.clone(),
        )?;
        self.tables.insert(name.to_string(), Arc::new(Mutex::new(table)));
        Ok(())
    }

    /// Create a new table, dropping any existing table of the same name
    /// first (matching the original's "clear on re-create" behavior).
    /// `index_kinds` is per-column; pass an empty slice for the default
    /// (every column B+-tree indexed).
    pub fn create_table(
        &mut self,
        name: &str,
        num_columns: usize,
        key_col: usize,
        index_kinds: Vec<IndexKind>,
    ) -> DbResult<Arc<Mutex<Table>>> {
        if self.tables.contains_key(name) {
            self.drop_table(name)?;
        }
        let dir = self.table_dir(name);
        fs::create_dir_all(&dir)?;
        Self::write_table_info(&dir, num_columns, key_col)?;

        let table = Table::open(
            dir,
            name,
            num_columns,
            key_col,
            self.config.clone(),
            index_kinds,
            self.clock.clone(),
        )?;
        let handle = Arc::new(Mutex::new(table));
        self.tables.insert(name.to_string(), handle.clone());
        Ok(handle)
    }

    /// Remove a table's files from disk and forget it. A no-op if the
    /// table was never loaded and has no files on disk.
    pub fn drop_table(&mut self, name: &str) -> DbResult<()> {
        if let Some(table) = self.tables.remove(name) {
            table.lock().expect("table mutex poisoned").delete_files()?;
        } else {
            let dir = self.table_dir(name);
            if dir.exists() {
                fs::remove_dir_all(&dir)?;
            }
        }
        Ok(())
    }

    /// Fetch an already-loaded table, or load it from disk if its
    /// directory exists. `None` if no such table exists at all.
    pub fn get_table(&mut self, name: &str) -> DbResult<Option<Arc<Mutex<Table>>>> {
        if let Some(table) = self.tables.get(name) {
            return Ok(Some(table.clone()));
        }
        let dir = self.table_dir(name);
        if !dir.exists() {
            return Ok(None);
        }
        self.load_table(name)?;
        Ok(self.tables.get(name).cloned())
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Flush every loaded table's pages and indexes to disk.
    pub fn close(&mut self) -> DbResult<()> {
        for table in self.tables.values() {
            let mut table = table.lock().expect("table mutex poisoned");
            table.flush()?;
            table.save_indexes()?;
        }
        Ok(())
    }
}
