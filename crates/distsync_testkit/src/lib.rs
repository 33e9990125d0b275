//! # distsync Testkit
//!
//! Test utilities for distsync.
//!
//! This crate provides:
//! - Row builders and store fixtures for the catalog types
//! - A fault-injecting store for atomicity tests
//! - Scripted selectors and confirmers
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust
//! use distsync_testkit::prelude::*;
//!
//! let mut stores = SeededStores::new();
//! let backend = stores.source_backend("Wikidata");
//! stores.source_example(backend, "cats");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod doubles;
pub mod faulty;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::doubles::*;
    pub use crate::faulty::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use doubles::*;
pub use faulty::*;
pub use fixtures::*;
pub use generators::*;
