//! Three-way classification of source against destination.

use crate::error::{CoreError, CoreResult};
use crate::record::{NaturalKey, Record};
use crate::schema::EntityType;
use serde::Serialize;
use std::collections::HashMap;

/// How a natural key compares across the two stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Present in the source only.
    Add,
    /// Present in both, with differing non-key fields.
    Update,
    /// Present in both and equal.
    Keep,
    /// Present in the destination only.
    DeleteCandidate,
}

/// One classified natural key with the records from each side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    /// The natural key.
    pub key: NaturalKey,
    /// The classification.
    pub class: Classification,
    /// Source record, absent for [`Classification::DeleteCandidate`].
    pub source: Option<Record>,
    /// Destination record, absent for [`Classification::Add`].
    pub destination: Option<Record>,
}

impl Classified {
    /// The record to show to an operator: source if present, else destination.
    pub fn record(&self) -> Option<&Record> {
        self.source.as_ref().or(self.destination.as_ref())
    }
}

/// Returns true if any non-key declared field differs.
///
/// Null and empty text compare equal. A dangling reference on the
/// destination always differs, so the update repairs it.
pub fn differs(entity: &EntityType, source: &Record, destination: &Record) -> bool {
    entity
        .fields()
        .iter()
        .filter(|f| !entity.is_key_field(&f.name))
        .any(|f| {
            destination.dangling.contains(&f.name)
                || !source.get(&f.name).same_content(destination.get(&f.name))
        })
}

fn index<'a>(
    entity: &EntityType,
    side: &'static str,
    records: &'a [Record],
) -> CoreResult<HashMap<&'a NaturalKey, &'a Record>> {
    let mut by_key = HashMap::with_capacity(records.len());
    for record in records {
        if by_key.insert(&record.key, record).is_some() {
            return Err(CoreError::DuplicateKey {
                entity: entity.name().to_string(),
                side,
                key: record.key.clone(),
            });
        }
    }
    Ok(by_key)
}

/// Classifies every natural key found in either store.
///
/// Output order is source order, then destination-only keys in destination
/// order.
///
/// # Errors
///
/// Returns [`CoreError::DuplicateKey`] if one side holds the same natural key
/// twice.
pub fn classify(
    source: &[Record],
    destination: &[Record],
    entity: &EntityType,
) -> CoreResult<Vec<Classified>> {
    let source_index = index(entity, "source", source)?;
    let destination_index = index(entity, "destination", destination)?;

    let mut out = Vec::with_capacity(source.len() + destination.len());
    for record in source {
        let (class, existing) = match destination_index.get(&record.key) {
            None => (Classification::Add, None),
            Some(existing) if differs(entity, record, existing) => {
                (Classification::Update, Some(*existing))
            }
            Some(existing) => (Classification::Keep, Some(*existing)),
        };
        out.push(Classified {
            key: record.key.clone(),
            class,
            source: Some(record.clone()),
            destination: existing.cloned(),
        });
    }
    for record in destination {
        if !source_index.contains_key(&record.key) {
            out.push(Classified {
                key: record.key.clone(),
                class: Classification::DeleteCandidate,
                source: None,
                destination: Some(record.clone()),
            });
        }
    }
    Ok(out)
}
