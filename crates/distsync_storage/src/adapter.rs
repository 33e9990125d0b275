//! Store adapter trait definition.

use crate::error::StorageResult;
use crate::row::{Row, StorageId};
use distsync_codec::FieldMap;

/// A thin capability over one relational store.
///
/// Adapters know tables, rows and unique constraints. They do not know
/// natural keys, foreign keys or anything about reconciliation; the engine
/// owns all of that.
///
/// # Invariants
///
/// - `fetch_all` returns rows in a stable order (ascending identifier for
///   the bundled stores)
/// - `insert` returns the identifier the store assigned; callers never
///   choose identifiers
/// - Between `begin_transaction` and `commit`, `rollback` restores the exact
///   state observed at `begin_transaction`
///
/// # Implementors
///
/// - [`super::InMemoryStore`] - For tests and ephemeral runs
/// - [`super::FileStore`] - Persistent single-file store
pub trait StoreAdapter: Send + Sync {
    /// Returns every row of `table`. Unknown tables are empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn fetch_all(&self, table: &str) -> StorageResult<Vec<Row>>;

    /// Returns the number of rows in `table`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn count(&self, table: &str) -> StorageResult<usize> {
        Ok(self.fetch_all(table)?.len())
    }

    /// Returns the names of all tables known to the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn tables(&self) -> StorageResult<Vec<String>>;

    /// Removes every row of `table`, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn clear_all(&mut self, table: &str) -> StorageResult<u64>;

    /// Inserts a row and returns its new identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if a unique constraint is violated or the write fails.
    fn insert(&mut self, table: &str, fields: &FieldMap) -> StorageResult<StorageId>;

    /// Overwrites the given columns of an existing row.
    ///
    /// Columns not present in `fields` keep their value.
    ///
    /// # Errors
    ///
    /// Returns an error if the row does not exist, a unique constraint is
    /// violated, or the write fails.
    fn update(&mut self, table: &str, id: StorageId, fields: &FieldMap) -> StorageResult<()>;

    /// Deletes an existing row.
    ///
    /// # Errors
    ///
    /// Returns an error if the row does not exist or the write fails.
    fn delete(&mut self, table: &str, id: StorageId) -> StorageResult<()>;

    /// Opens a transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if a transaction is already open.
    fn begin_transaction(&mut self) -> StorageResult<()>;

    /// Makes every write since `begin_transaction` durable.
    ///
    /// # Errors
    ///
    /// Returns an error if no transaction is open or persisting fails.
    fn commit(&mut self) -> StorageResult<()>;

    /// Discards every write since `begin_transaction`.
    ///
    /// # Errors
    ///
    /// Returns an error if no transaction is open.
    fn rollback(&mut self) -> StorageResult<()>;
}
