//! Test fixtures and store helpers.
//!
//! Provides row builders for the catalog types and convenience functions for
//! setting up source/destination pairs.

use distsync_codec::{FieldMap, Value};
use distsync_core::catalog;
use distsync_storage::{FileStore, InMemoryStore, StorageId, StoreAdapter};
use std::path::PathBuf;
use tempfile::TempDir;

/// A `backends` row with the given name and slug and fixed values for the
/// engine, sort key and URL fields.
pub fn backend_row(name: &str, slug: &str) -> FieldMap {
    let mut fields = FieldMap::new();
    fields.insert("name".into(), Value::from(name));
    fields.insert("slug".into(), Value::from(slug));
    fields.insert("engine".into(), Value::from("qlever"));
    fields.insert("is_default".into(), Value::Bool(false));
    fields.insert("sort_key".into(), Value::from("1"));
    fields.insert("url".into(), Value::from(format!("https://example.org/{slug}")));
    fields
}

/// An `examples` row belonging to backend row `backend`.
pub fn example_row(backend: StorageId, name: &str, query: &str) -> FieldMap {
    let mut fields = FieldMap::new();
    fields.insert("backend".into(), Value::Integer(backend.as_i64()));
    fields.insert("name".into(), Value::from(name));
    fields.insert("query".into(), Value::from(query));
    fields.insert("sort_key".into(), Value::from("~"));
    fields
}

/// A `saved_queries` row.
pub fn saved_query_row(short_id: &str, content: &str) -> FieldMap {
    let mut fields = FieldMap::new();
    fields.insert("short_id".into(), Value::from(short_id));
    fields.insert("content".into(), Value::from(content));
    fields
}

/// An empty in-memory store with the catalog's unique constraints.
pub fn catalog_store() -> InMemoryStore {
    let mut store = InMemoryStore::new();
    for (table, unique) in catalog::TABLES {
        store.declare_table(table, unique);
    }
    store
}

/// Values of `field` across `table`, in fetch order.
pub fn column(store: &dyn StoreAdapter, table: &str, field: &str) -> Vec<Value> {
    store
        .fetch_all(table)
        .expect("Failed to fetch rows")
        .into_iter()
        .map(|row| row.fields.get(field).cloned().unwrap_or_default())
        .collect()
}

/// Text values of `field` across `table`, in fetch order.
pub fn names(store: &dyn StoreAdapter, table: &str, field: &str) -> Vec<String> {
    column(store, table, field)
        .into_iter()
        .map(|v| v.to_string())
        .collect()
}

/// A source and a destination store, both with the catalog's constraints.
#[derive(Debug)]
pub struct SeededStores {
    /// The store read from.
    pub source: InMemoryStore,
    /// The store written to.
    pub destination: InMemoryStore,
}

impl Default for SeededStores {
    fn default() -> Self {
        Self::new()
    }
}

impl SeededStores {
    /// Creates two empty catalog stores.
    pub fn new() -> Self {
        Self {
            source: catalog_store(),
            destination: catalog_store(),
        }
    }

    /// Inserts a backend into the source.
    pub fn source_backend(&mut self, name: &str) -> StorageId {
        self.source
            .insert(catalog::BACKENDS, &backend_row(name, &slug(name)))
            .expect("Failed to insert backend")
    }

    /// Inserts a backend into the destination.
    pub fn destination_backend(&mut self, name: &str) -> StorageId {
        self.destination
            .insert(catalog::BACKENDS, &backend_row(name, &slug(name)))
            .expect("Failed to insert backend")
    }

    /// Inserts an example into the source.
    pub fn source_example(&mut self, backend: StorageId, name: &str) -> StorageId {
        self.source
            .insert(catalog::EXAMPLES, &example_row(backend, name, "SELECT * WHERE { ?s ?p ?o }"))
            .expect("Failed to insert example")
    }

    /// Inserts an example into the destination.
    pub fn destination_example(&mut self, backend: StorageId, name: &str) -> StorageId {
        self.destination
            .insert(catalog::EXAMPLES, &example_row(backend, name, "SELECT * WHERE { ?s ?p ?o }"))
            .expect("Failed to insert example")
    }
}

fn slug(name: &str) -> String {
    name.to_lowercase().replace(' ', "-")
}

/// A temporary directory holding a working and a distribution store file.
pub struct TempStores {
    /// Path of the working store.
    pub source_path: PathBuf,
    /// Path of the distribution store.
    pub dist_path: PathBuf,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: TempDir,
}

impl Default for TempStores {
    fn default() -> Self {
        Self::new()
    }
}

impl TempStores {
    /// Creates both store files with the catalog's tables.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let source_path = temp_dir.path().join("db.store");
        let dist_path = temp_dir.path().join("db.store.dist");
        FileStore::create(&source_path, catalog::TABLES).expect("Failed to create source store");
        FileStore::create(&dist_path, catalog::TABLES).expect("Failed to create dist store");
        Self {
            source_path,
            dist_path,
            _temp_dir: temp_dir,
        }
    }

    /// Opens the working store.
    pub fn source(&self) -> FileStore {
        FileStore::open(&self.source_path).expect("Failed to open source store")
    }

    /// Opens the distribution store.
    pub fn dist(&self) -> FileStore {
        FileStore::open(&self.dist_path).expect("Failed to open dist store")
    }
}
