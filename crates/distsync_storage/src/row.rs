//! Storage identifiers and rows.

use distsync_codec::FieldMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier assigned by one store to one of its rows.
///
/// Storage identifiers are only meaningful inside the store that issued
/// them. Two stores holding "the same" record will in general use different
/// identifiers for it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct StorageId(i64);

impl StorageId {
    /// Wraps a raw identifier.
    #[inline]
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Returns the raw identifier.
    #[inline]
    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for StorageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One stored row: its identifier and its column values.
///
/// Foreign-key columns hold the parent's [`StorageId`] (as an integer value)
/// of the same store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    /// Store-assigned identifier.
    pub id: StorageId,
    /// Column values, excluding the identifier.
    pub fields: FieldMap,
}

impl Row {
    /// Creates a row.
    pub fn new(id: StorageId, fields: FieldMap) -> Self {
        Self { id, fields }
    }
}
