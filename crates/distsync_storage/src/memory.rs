//! In-memory store.

use crate::adapter::StoreAdapter;
use crate::error::{StorageError, StorageResult};
use crate::row::{Row, StorageId};
use crate::table::{Table, Tables};
use distsync_codec::FieldMap;
use parking_lot::RwLock;
use tracing::trace;

#[derive(Debug, Default)]
struct State {
    tables: Tables,
    /// Contents at `begin_transaction`, restored on rollback.
    saved: Option<Tables>,
}

/// An in-memory store.
///
/// This store keeps all tables in memory and is suitable for:
/// - Unit and integration tests
/// - Ephemeral runs that don't need persistence
/// - The working copy behind a [`crate::FileStore`]
///
/// Transactions are implemented by saving a copy of all tables at
/// `begin_transaction` and restoring it on `rollback`.
///
/// # Example
///
/// ```rust
/// use distsync_codec::{FieldMap, Value};
/// use distsync_storage::{InMemoryStore, StoreAdapter};
///
/// let mut store = InMemoryStore::new();
/// let mut fields = FieldMap::new();
/// fields.insert("name".into(), Value::from("qlever"));
/// let id = store.insert("backends", &fields).unwrap();
/// assert_eq!(store.fetch_all("backends").unwrap()[0].id, id);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with pre-existing contents.
    #[must_use]
    pub fn with_tables(tables: Tables) -> Self {
        Self {
            state: RwLock::new(State {
                tables,
                saved: None,
            }),
        }
    }

    /// Declares a table with a unique constraint over `columns`.
    ///
    /// An existing table keeps its rows and gets the new constraint; existing
    /// rows are not re-validated.
    pub fn declare_table(&mut self, table: &str, columns: &[&str]) {
        let unique = columns.iter().map(|c| (*c).to_string()).collect::<Vec<_>>();
        self.state
            .write()
            .tables
            .entry(table.to_string())
            .or_default()
            .set_unique(unique);
    }

    /// Returns a copy of every table.
    ///
    /// Useful for comparing a store before and after a run.
    #[must_use]
    pub fn snapshot(&self) -> Tables {
        self.state.read().tables.clone()
    }

    /// Returns true while a transaction is open.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.state.read().saved.is_some()
    }

    fn with_table<T>(
        &mut self,
        table: &str,
        f: impl FnOnce(&mut Table) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let mut state = self.state.write();
        let entry = state.tables.entry(table.to_string()).or_default();
        f(entry)
    }
}

impl StoreAdapter for InMemoryStore {
    fn fetch_all(&self, table: &str) -> StorageResult<Vec<Row>> {
        Ok(self
            .state
            .read()
            .tables
            .get(table)
            .map(Table::rows)
            .unwrap_or_default())
    }

    fn count(&self, table: &str) -> StorageResult<usize> {
        Ok(self.state.read().tables.get(table).map_or(0, Table::len))
    }

    fn tables(&self) -> StorageResult<Vec<String>> {
        Ok(self.state.read().tables.keys().cloned().collect())
    }

    fn clear_all(&mut self, table: &str) -> StorageResult<u64> {
        let removed = self.with_table(table, |t| Ok(t.clear()))?;
        trace!(table, removed, "cleared table");
        Ok(removed)
    }

    fn insert(&mut self, table: &str, fields: &FieldMap) -> StorageResult<StorageId> {
        let id = self.with_table(table, |t| t.insert(table, fields))?;
        trace!(table, %id, "inserted row");
        Ok(id)
    }

    fn update(&mut self, table: &str, id: StorageId, fields: &FieldMap) -> StorageResult<()> {
        self.with_table(table, |t| t.update(table, id, fields))?;
        trace!(table, %id, "updated row");
        Ok(())
    }

    fn delete(&mut self, table: &str, id: StorageId) -> StorageResult<()> {
        self.with_table(table, |t| t.delete(table, id))?;
        trace!(table, %id, "deleted row");
        Ok(())
    }

    fn begin_transaction(&mut self) -> StorageResult<()> {
        let mut state = self.state.write();
        if state.saved.is_some() {
            return Err(StorageError::TransactionActive);
        }
        state.saved = Some(state.tables.clone());
        Ok(())
    }

    fn commit(&mut self) -> StorageResult<()> {
        let mut state = self.state.write();
        state
            .saved
            .take()
            .map(|_| ())
            .ok_or(StorageError::NoTransaction)
    }

    fn rollback(&mut self) -> StorageResult<()> {
        let mut state = self.state.write();
        let saved = state.saved.take().ok_or(StorageError::NoTransaction)?;
        state.tables = saved;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use distsync_codec::Value;

    fn named(name: &str) -> FieldMap {
        let mut f = FieldMap::new();
        f.insert("name".into(), Value::from(name));
        f
    }

    #[test]
    fn memory_new_is_empty() {
        let store = InMemoryStore::new();
        assert!(store.tables().unwrap().is_empty());
        assert!(store.fetch_all("anything").unwrap().is_empty());
        assert_eq!(store.count("anything").unwrap(), 0);
    }

    #[test]
    fn memory_fetch_order_is_insertion_order() {
        let mut store = InMemoryStore::new();
        store.insert("t", &named("b")).unwrap();
        store.insert("t", &named("a")).unwrap();
        store.insert("t", &named("c")).unwrap();

        let names: Vec<_> = store
            .fetch_all("t")
            .unwrap()
            .into_iter()
            .map(|r| r.fields["name"].clone())
            .collect();
        assert_eq!(names, vec![Value::from("b"), Value::from("a"), Value::from("c")]);
    }

    #[test]
    fn memory_declared_unique_is_enforced() {
        let mut store = InMemoryStore::new();
        store.declare_table("t", &["name"]);
        store.insert("t", &named("a")).unwrap();
        assert!(matches!(
            store.insert("t", &named("a")),
            Err(StorageError::UniqueViolation { .. })
        ));
    }

    #[test]
    fn memory_clear_all_reports_count() {
        let mut store = InMemoryStore::new();
        store.insert("t", &named("a")).unwrap();
        store.insert("t", &named("b")).unwrap();
        assert_eq!(store.clear_all("t").unwrap(), 2);
        assert_eq!(store.count("t").unwrap(), 0);
    }

    #[test]
    fn memory_rollback_restores_everything() {
        let mut store = InMemoryStore::new();
        let keep = store.insert("t", &named("keep")).unwrap();
        let before = store.snapshot();

        store.begin_transaction().unwrap();
        store.insert("t", &named("new")).unwrap();
        store.delete("t", keep).unwrap();
        store.insert("other", &named("x")).unwrap();
        assert!(store.in_transaction());
        store.rollback().unwrap();

        assert!(!store.in_transaction());
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn memory_commit_keeps_writes() {
        let mut store = InMemoryStore::new();
        store.begin_transaction().unwrap();
        store.insert("t", &named("a")).unwrap();
        store.commit().unwrap();
        assert_eq!(store.count("t").unwrap(), 1);
    }

    #[test]
    fn memory_transaction_state_errors() {
        let mut store = InMemoryStore::new();
        assert!(matches!(store.commit(), Err(StorageError::NoTransaction)));
        assert!(matches!(store.rollback(), Err(StorageError::NoTransaction)));
        store.begin_transaction().unwrap();
        assert!(matches!(
            store.begin_transaction(),
            Err(StorageError::TransactionActive)
        ));
    }
}
