//! Table contents shared by the bundled stores.

use crate::error::{StorageError, StorageResult};
use crate::row::{Row, StorageId};
use distsync_codec::{FieldMap, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The rows of one table plus its identifier counter and unique constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "TableImage")]
pub struct Table {
    /// Next identifier to hand out. Identifiers are never reused.
    next_id: i64,
    /// Columns whose combined value must be unique (empty = unconstrained).
    unique: Vec<String>,
    /// Rows keyed by identifier; iteration order is insertion order.
    rows: BTreeMap<StorageId, FieldMap>,
    /// Unique value to row. Always derived from `unique` and `rows`.
    #[serde(skip)]
    index: BTreeMap<Vec<Value>, StorageId>,
}

/// Persisted form of a [`Table`]; the index is rebuilt on load.
#[derive(Deserialize)]
struct TableImage {
    next_id: i64,
    unique: Vec<String>,
    rows: BTreeMap<StorageId, FieldMap>,
}

impl From<TableImage> for Table {
    fn from(image: TableImage) -> Self {
        let mut table = Self {
            next_id: image.next_id,
            unique: image.unique,
            rows: image.rows,
            index: BTreeMap::new(),
        };
        table.rebuild_index();
        table
    }
}

impl Table {
    /// Creates an empty table with a unique constraint over `unique`.
    pub fn with_unique(unique: Vec<String>) -> Self {
        Self {
            next_id: 1,
            unique,
            rows: BTreeMap::new(),
            index: BTreeMap::new(),
        }
    }

    /// The unique constraint columns.
    pub fn unique(&self) -> &[String] {
        &self.unique
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All rows in identifier order.
    pub fn rows(&self) -> Vec<Row> {
        self.rows
            .iter()
            .map(|(id, fields)| Row::new(*id, fields.clone()))
            .collect()
    }

    /// Looks up one row.
    pub fn get(&self, id: StorageId) -> Option<&FieldMap> {
        self.rows.get(&id)
    }

    pub(crate) fn set_unique(&mut self, unique: Vec<String>) {
        self.unique = unique;
        self.rebuild_index();
    }

    pub(crate) fn clear(&mut self) -> u64 {
        let removed = self.rows.len() as u64;
        self.rows.clear();
        self.index.clear();
        removed
    }

    pub(crate) fn insert(&mut self, name: &str, fields: &FieldMap) -> StorageResult<StorageId> {
        self.check_unique(name, None, fields)?;
        let id = StorageId::new(self.next_id.max(1));
        self.next_id = id.as_i64() + 1;
        self.index_row(id, fields);
        self.rows.insert(id, fields.clone());
        Ok(id)
    }

    pub(crate) fn update(
        &mut self,
        name: &str,
        id: StorageId,
        fields: &FieldMap,
    ) -> StorageResult<()> {
        let mut merged = self
            .rows
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::RowNotFound {
                table: name.to_string(),
                id,
            })?;
        for (column, value) in fields {
            merged.insert(column.clone(), value.clone());
        }
        self.check_unique(name, Some(id), &merged)?;
        if let Some(previous) = self.rows.insert(id, merged.clone()) {
            self.unindex_row(id, &previous);
        }
        self.index_row(id, &merged);
        Ok(())
    }

    pub(crate) fn delete(&mut self, name: &str, id: StorageId) -> StorageResult<()> {
        let removed = self
            .rows
            .remove(&id)
            .ok_or_else(|| StorageError::RowNotFound {
                table: name.to_string(),
                id,
            })?;
        self.unindex_row(id, &removed);
        Ok(())
    }

    fn unique_value(&self, fields: &FieldMap) -> Vec<Value> {
        self.unique
            .iter()
            .map(|column| fields.get(column).cloned().unwrap_or_default())
            .collect()
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        if self.unique.is_empty() {
            return;
        }
        let entries: Vec<_> = self
            .rows
            .iter()
            .map(|(id, fields)| (self.unique_value(fields), *id))
            .collect();
        self.index.extend(entries);
    }

    fn index_row(&mut self, id: StorageId, fields: &FieldMap) {
        if !self.unique.is_empty() {
            let value = self.unique_value(fields);
            self.index.insert(value, id);
        }
    }

    fn unindex_row(&mut self, id: StorageId, fields: &FieldMap) {
        if self.unique.is_empty() {
            return;
        }
        let value = self.unique_value(fields);
        // Rows that predate the constraint may share a value.
        if self.index.get(&value) == Some(&id) {
            self.index.remove(&value);
        }
    }

    fn check_unique(
        &self,
        name: &str,
        except: Option<StorageId>,
        fields: &FieldMap,
    ) -> StorageResult<()> {
        if self.unique.is_empty() {
            return Ok(());
        }
        let candidate = self.unique_value(fields);
        match self.index.get(&candidate) {
            Some(owner) if Some(*owner) != except => Err(StorageError::UniqueViolation {
                table: name.to_string(),
                fields: self.unique.clone(),
                value: Value::Array(candidate).to_string(),
            }),
            _ => Ok(()),
        }
    }
}

/// Full contents of a store: every table by name.
///
/// This is also the persisted image of a [`crate::FileStore`] and what
/// tests compare to check that a rolled-back run left no trace.
pub type Tables = BTreeMap<String, Table>;
