//! Portable records and natural keys.
//!
//! Rows come out of a store with foreign keys pointing at that store's own
//! [`StorageId`]s. Before two stores can be compared, rows are *lifted*: each
//! foreign key is replaced by the parent's natural key, which means the same
//! thing on both sides.

use crate::error::{CoreError, CoreResult};
use crate::schema::EntityType;
use distsync_codec::{FieldMap, Value};
use distsync_storage::{Row, StorageId};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Ordered tuple of natural-key values.
///
/// Equal natural keys denote the same logical entity in both stores.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NaturalKey(Vec<Value>);

impl NaturalKey {
    /// Creates a key from its values in key order.
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    /// The key values.
    pub fn values(&self) -> &[Value] {
        &self.0
    }

    /// The key as a single field value.
    ///
    /// Single-field keys become the scalar itself; composite keys become an
    /// array. This is how a child stores a reference to its parent in
    /// portable form.
    pub fn to_value(&self) -> Value {
        match self.0.as_slice() {
            [single] => single.clone(),
            values => Value::Array(values.to_vec()),
        }
    }

    /// Inverse of [`NaturalKey::to_value`] for a key of `arity` fields.
    ///
    /// Returns `None` if the value does not have the expected shape.
    pub fn from_value(value: &Value, arity: usize) -> Option<Self> {
        if arity == 1 {
            return Some(Self(vec![value.clone()]));
        }
        match value.as_array() {
            Some(items) if items.len() == arity => Some(Self(items.to_vec())),
            _ => None,
        }
    }

    /// Extracts the key of `entity` from portable fields.
    pub fn of(entity: &EntityType, fields: &FieldMap) -> Self {
        Self(
            entity
                .natural_key_fields()
                .iter()
                .map(|name| fields.get(name).cloned().unwrap_or_default())
                .collect(),
        )
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Value::Array(self.0.clone()))
    }
}

impl<V: Into<Value>> FromIterator<V> for NaturalKey {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// A row lifted into portable form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Identifier in the store this record was read from.
    pub id: StorageId,
    /// Natural key, computed from the portable fields.
    pub key: NaturalKey,
    /// Declared fields; foreign keys hold the parent's natural key.
    pub fields: FieldMap,
    /// Foreign-key fields whose parent row no longer exists in the store.
    /// Their portable value is null.
    pub dangling: BTreeSet<String>,
}

impl Record {
    /// Lifts a stored row of `entity`.
    ///
    /// Only declared fields are kept; missing ones are null. Foreign keys are
    /// translated through `lookup`, which must already hold every parent
    /// type of `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MalformedRow`] if a foreign-key column does not
    /// hold an identifier.
    pub fn lift(entity: &EntityType, row: Row, lookup: &KeyLookup) -> CoreResult<Self> {
        let Row { id, fields: mut raw } = row;
        let mut fields = FieldMap::new();
        let mut dangling = BTreeSet::new();

        for descriptor in entity.fields() {
            let value = raw.remove(&descriptor.name).unwrap_or_default();
            let Some(fk) = entity.foreign_key(&descriptor.name) else {
                fields.insert(descriptor.name.clone(), value);
                continue;
            };
            let portable = match value {
                Value::Null => Value::Null,
                Value::Integer(parent_id) => {
                    match lookup.key_of(&fk.references, StorageId::new(parent_id)) {
                        Some(parent_key) => parent_key.to_value(),
                        None => {
                            dangling.insert(descriptor.name.clone());
                            Value::Null
                        }
                    }
                }
                other => {
                    return Err(CoreError::MalformedRow {
                        entity: entity.name().to_string(),
                        row: id,
                        message: format!(
                            "foreign key {} holds {} instead of an identifier",
                            descriptor.name,
                            other.kind_name()
                        ),
                    })
                }
            };
            fields.insert(descriptor.name.clone(), portable);
        }

        let mut key = NaturalKey::of(entity, &fields);
        if dangling.iter().any(|name| entity.is_key_field(name)) {
            // One value longer than any real key, and unique per row.
            key.0.push(Value::Integer(id.as_i64()));
        }

        Ok(Self {
            id,
            key,
            fields,
            dangling,
        })
    }

    /// Returns true if a natural-key field refers to a parent row that no
    /// longer exists.
    ///
    /// Such a record cannot be identified across stores. Its key holds its
    /// own [`StorageId`], so it never matches a key of the other store.
    pub fn is_orphan(&self, entity: &EntityType) -> bool {
        self.dangling.iter().any(|name| entity.is_key_field(name))
    }

    /// Returns the value of `field`, null if absent.
    pub fn get(&self, field: &str) -> &Value {
        const NULL: &Value = &Value::Null;
        self.fields.get(field).unwrap_or(NULL)
    }

    /// Short human description, e.g. `wikidata (Wikidata)`.
    pub fn describe(&self, entity: &EntityType) -> String {
        let mut parts = entity.summary_fields().iter().map(|f| self.get(f).to_string());
        let head = parts.next().unwrap_or_default();
        let rest: Vec<String> = parts.collect();
        if rest.is_empty() {
            head
        } else {
            format!("{head} ({})", rest.join(", "))
        }
    }
}

/// Storage identifier to natural key, per entity type, for one store.
///
/// Built while fetching (parents first) so children can be lifted.
#[derive(Debug, Default, Clone)]
pub struct KeyLookup {
    by_type: HashMap<String, HashMap<StorageId, NaturalKey>>,
}

impl KeyLookup {
    /// Creates an empty lookup.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the records of one entity type.
    pub fn register(&mut self, entity: &str, records: &[Record]) {
        let ids = records.iter().map(|r| (r.id, r.key.clone())).collect();
        self.by_type.insert(entity.to_string(), ids);
    }

    /// The natural key of row `id` of `entity`, if known.
    pub fn key_of(&self, entity: &str, id: StorageId) -> Option<&NaturalKey> {
        self.by_type.get(entity)?.get(&id)
    }
}

/// Lifts every row of `entity` and registers the result in `lookup`.
///
/// # Errors
///
/// Fails on the first malformed row.
pub fn lift_all(entity: &EntityType, rows: Vec<Row>, lookup: &mut KeyLookup) -> CoreResult<Vec<Record>> {
    let records = rows
        .into_iter()
        .map(|row| Record::lift(entity, row, lookup))
        .collect::<CoreResult<Vec<_>>>()?;
    lookup.register(entity.name(), &records);
    Ok(records)
}
