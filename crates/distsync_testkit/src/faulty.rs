//! Fault injection for apply-path tests.
//!
//! [`FaultyStore`] wraps an [`InMemoryStore`] and fails a chosen mutation,
//! so tests can check that a run failing at any point leaves the store
//! exactly as it was.
//!
//! ## Usage
//!
//! ```rust
//! use distsync_codec::FieldMap;
//! use distsync_storage::{InMemoryStore, StoreAdapter};
//! use distsync_testkit::FaultyStore;
//!
//! let mut store = FaultyStore::new(InMemoryStore::new());
//! store.fail_at(1);
//! assert!(store.insert("t", &FieldMap::new()).is_ok());
//! assert!(store.insert("t", &FieldMap::new()).is_err());
//! assert!(store.has_failed());
//! ```

use distsync_codec::FieldMap;
use distsync_storage::{InMemoryStore, Row, StorageError, StorageId, StorageResult, StoreAdapter, Tables};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// A store wrapper that fails the N-th mutation (0-based).
///
/// Mutations are `clear_all`, `insert`, `update` and `delete`. Reads and
/// transaction control always pass through, unless commit failure is
/// switched on.
#[derive(Debug)]
pub struct FaultyStore {
    inner: InMemoryStore,
    fail_at: AtomicUsize,
    mutations: AtomicUsize,
    failed: AtomicBool,
    fail_on_commit: AtomicBool,
}

impl FaultyStore {
    /// Wraps a store; no fault is armed.
    pub fn new(inner: InMemoryStore) -> Self {
        Self {
            inner,
            fail_at: AtomicUsize::new(usize::MAX),
            mutations: AtomicUsize::new(0),
            failed: AtomicBool::new(false),
            fail_on_commit: AtomicBool::new(false),
        }
    }

    /// Arms a fault on the mutation with index `n`.
    pub fn fail_at(&self, n: usize) {
        self.fail_at.store(n, Ordering::SeqCst);
    }

    /// Makes `commit` fail.
    pub fn set_fail_on_commit(&self, fail: bool) {
        self.fail_on_commit.store(fail, Ordering::SeqCst);
    }

    /// Number of mutations attempted so far.
    pub fn mutations(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    /// Returns whether a fault fired.
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    /// Disarms all faults and resets the counter.
    pub fn reset(&self) {
        self.fail_at.store(usize::MAX, Ordering::SeqCst);
        self.mutations.store(0, Ordering::SeqCst);
        self.failed.store(false, Ordering::SeqCst);
        self.fail_on_commit.store(false, Ordering::SeqCst);
    }

    /// Copy of the wrapped store's tables.
    pub fn snapshot(&self) -> Tables {
        self.inner.snapshot()
    }

    /// The wrapped store.
    pub fn inner(&self) -> &InMemoryStore {
        &self.inner
    }

    fn check(&self, what: &str) -> StorageResult<()> {
        let n = self.mutations.fetch_add(1, Ordering::SeqCst);
        if n == self.fail_at.load(Ordering::SeqCst) {
            self.failed.store(true, Ordering::SeqCst);
            return Err(StorageError::Unavailable(format!(
                "simulated failure on {what} #{n}"
            )));
        }
        Ok(())
    }
}

impl StoreAdapter for FaultyStore {
    fn fetch_all(&self, table: &str) -> StorageResult<Vec<Row>> {
        self.inner.fetch_all(table)
    }

    fn tables(&self) -> StorageResult<Vec<String>> {
        self.inner.tables()
    }

    fn clear_all(&mut self, table: &str) -> StorageResult<u64> {
        self.check("clear")?;
        self.inner.clear_all(table)
    }

    fn insert(&mut self, table: &str, fields: &FieldMap) -> StorageResult<StorageId> {
        self.check("insert")?;
        self.inner.insert(table, fields)
    }

    fn update(&mut self, table: &str, id: StorageId, fields: &FieldMap) -> StorageResult<()> {
        self.check("update")?;
        self.inner.update(table, id, fields)
    }

    fn delete(&mut self, table: &str, id: StorageId) -> StorageResult<()> {
        self.check("delete")?;
        self.inner.delete(table, id)
    }

    fn begin_transaction(&mut self) -> StorageResult<()> {
        self.inner.begin_transaction()
    }

    fn commit(&mut self) -> StorageResult<()> {
        if self.fail_on_commit.load(Ordering::SeqCst) {
            self.failed.store(true, Ordering::SeqCst);
            return Err(StorageError::Unavailable("simulated failure on commit".into()));
        }
        self.inner.commit()
    }

    fn rollback(&mut self) -> StorageResult<()> {
        self.inner.rollback()
    }
}
