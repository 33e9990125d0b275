//! # distsync Storage
//!
//! Store adapter trait and implementations for distsync.
//!
//! This crate provides the lowest-level storage abstraction the
//! reconciliation engine talks to. Stores are **thin table stores** - they
//! know tables, rows, storage identifiers and unique constraints, and nothing
//! about natural keys or foreign keys.
//!
//! ## Design Principles
//!
//! - Stores assign identifiers; callers never choose them
//! - All writes of a run happen between `begin_transaction` and `commit`
//! - `rollback` restores exactly the state seen at `begin_transaction`
//! - Must be `Send + Sync`
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - For testing and ephemeral runs
//! - [`FileStore`] - Single-file persistent store
//!
//! ## Example
//!
//! ```rust
//! use distsync_codec::{FieldMap, Value};
//! use distsync_storage::{InMemoryStore, StoreAdapter};
//!
//! let mut store = InMemoryStore::new();
//! store.begin_transaction().unwrap();
//! let mut fields = FieldMap::new();
//! fields.insert("name".into(), Value::from("wikidata"));
//! store.insert("backends", &fields).unwrap();
//! store.rollback().unwrap();
//! assert_eq!(store.count("backends").unwrap(), 0);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod adapter;
mod error;
mod file;
mod memory;
mod row;
mod table;

pub use adapter::StoreAdapter;
pub use error::{StorageError, StorageResult};
pub use file::{FileStore, STORE_FORMAT_VERSION, STORE_MAGIC};
pub use memory::InMemoryStore;
pub use row::{Row, StorageId};
pub use table::{Table, Tables};
