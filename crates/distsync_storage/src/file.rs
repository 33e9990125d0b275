//! File-backed store for persistent storage.

use crate::adapter::StoreAdapter;
use crate::error::{StorageError, StorageResult};
use crate::memory::InMemoryStore;
use crate::row::{Row, StorageId};
use crate::table::Tables;
use distsync_codec::{decode_framed, encode_framed, FieldMap};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Magic prefix of a store file.
pub const STORE_MAGIC: [u8; 4] = *b"DSST";
/// Current store file format version.
pub const STORE_FORMAT_VERSION: u8 = 1;

/// A single-file persistent store.
///
/// The whole store is loaded into an [`InMemoryStore`] on open. Writes are
/// persisted on `commit`, or immediately when no transaction is open.
/// Persisting writes a sibling temporary file and renames it over the store
/// file, so a crash never leaves a half-written store behind.
///
/// # Example
///
/// ```no_run
/// use distsync_storage::{FileStore, StoreAdapter};
/// use std::path::Path;
///
/// let store = FileStore::open(Path::new("db.store.dist")).unwrap();
/// println!("{} backends", store.count("backends").unwrap());
/// ```
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    inner: InMemoryStore,
}

impl FileStore {
    /// Opens an existing store file.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the file does not exist, or an
    /// error if it cannot be read or decoded.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if !path.exists() {
            return Err(StorageError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let bytes = fs::read(path)?;
        let (_version, tables): (u8, Tables) =
            decode_framed(STORE_MAGIC, STORE_FORMAT_VERSION, &bytes)?;
        debug!(path = %path.display(), tables = tables.len(), "opened store");
        Ok(Self {
            path: path.to_path_buf(),
            inner: InMemoryStore::with_tables(tables),
        })
    }

    /// Creates a new store file, declaring one table per `(name, unique columns)`.
    ///
    /// Parent directories are created if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::AlreadyExists`] if the file exists, or an error
    /// if it cannot be written.
    pub fn create(path: &Path, tables: &[(&str, &[&str])]) -> StorageResult<Self> {
        if path.exists() {
            return Err(StorageError::AlreadyExists {
                path: path.to_path_buf(),
            });
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut inner = InMemoryStore::new();
        for (name, unique) in tables {
            inner.declare_table(name, unique);
        }
        let store = Self {
            path: path.to_path_buf(),
            inner,
        };
        store.persist()?;
        debug!(path = %path.display(), "created store");
        Ok(store)
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns a copy of every table as currently visible.
    #[must_use]
    pub fn snapshot(&self) -> Tables {
        self.inner.snapshot()
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn persist(&self) -> StorageResult<()> {
        let bytes = encode_framed(STORE_MAGIC, STORE_FORMAT_VERSION, &self.inner.snapshot())?;
        let temp = self.temp_path();
        {
            let mut file = File::create(&temp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&temp, &self.path)?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "persisted store");
        Ok(())
    }

    fn persist_if_autocommit(&self) -> StorageResult<()> {
        if self.inner.in_transaction() {
            Ok(())
        } else {
            self.persist()
        }
    }
}

impl StoreAdapter for FileStore {
    fn fetch_all(&self, table: &str) -> StorageResult<Vec<Row>> {
        self.inner.fetch_all(table)
    }

    fn count(&self, table: &str) -> StorageResult<usize> {
        self.inner.count(table)
    }

    fn tables(&self) -> StorageResult<Vec<String>> {
        self.inner.tables()
    }

    fn clear_all(&mut self, table: &str) -> StorageResult<u64> {
        let removed = self.inner.clear_all(table)?;
        self.persist_if_autocommit()?;
        Ok(removed)
    }

    fn insert(&mut self, table: &str, fields: &FieldMap) -> StorageResult<StorageId> {
        let id = self.inner.insert(table, fields)?;
        self.persist_if_autocommit()?;
        Ok(id)
    }

    fn update(&mut self, table: &str, id: StorageId, fields: &FieldMap) -> StorageResult<()> {
        self.inner.update(table, id, fields)?;
        self.persist_if_autocommit()
    }

    fn delete(&mut self, table: &str, id: StorageId) -> StorageResult<()> {
        self.inner.delete(table, id)?;
        self.persist_if_autocommit()
    }

    fn begin_transaction(&mut self) -> StorageResult<()> {
        self.inner.begin_transaction()
    }

    fn commit(&mut self) -> StorageResult<()> {
        // Persist before releasing the saved copy so a failed write can still
        // be rolled back.
        self.persist()?;
        self.inner.commit()
    }

    fn rollback(&mut self) -> StorageResult<()> {
        self.inner.rollback()
    }
}
