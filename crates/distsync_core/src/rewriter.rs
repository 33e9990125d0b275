//! Foreign-key resolution against the destination.
//!
//! A portable record names its parents by natural key. Before it can be
//! written, each of those keys must map to something in the destination:
//! a row already stored there, or a row the current plan inserts first.

use crate::record::{NaturalKey, Record};
use crate::schema::EntityType;
use distsync_codec::{FieldMap, Value};
use distsync_storage::StorageId;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Plan-local handle of a planned insert.
///
/// The executor binds each slot to the identifier the destination assigns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Slot(pub usize);

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot {}", self.0)
    }
}

/// Where a natural key lives in the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// An existing destination row.
    Stored(StorageId),
    /// A row inserted earlier in the same plan.
    Planned(Slot),
}

/// Natural key to destination target, per entity type.
///
/// Seeded from the destination snapshot and updated while planning, so the
/// plan of a child type sees the effect of its parents' plans.
#[derive(Debug, Default, Clone)]
pub struct DestinationIndex {
    by_type: HashMap<String, TypeIndex>,
}

#[derive(Debug, Default, Clone)]
struct TypeIndex {
    arity: usize,
    targets: HashMap<NaturalKey, Target>,
}

impl DestinationIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the index for `entity` from destination records.
    ///
    /// Orphans are left out; nothing may be attached to them.
    pub fn seed(&mut self, entity: &EntityType, records: &[Record]) {
        let targets = records
            .iter()
            .filter(|r| !r.is_orphan(entity))
            .map(|r| (r.key.clone(), Target::Stored(r.id)))
            .collect();
        self.by_type.insert(
            entity.name().to_string(),
            TypeIndex {
                arity: entity.natural_key_fields().len(),
                targets,
            },
        );
    }

    /// Registers a planned insert.
    pub fn plan_insert(&mut self, entity: &EntityType, key: NaturalKey, slot: Slot) {
        self.entry(entity).targets.insert(key, Target::Planned(slot));
    }

    /// Forgets a key that the plan deletes.
    pub fn plan_delete(&mut self, entity: &EntityType, key: &NaturalKey) {
        self.entry(entity).targets.remove(key);
    }

    /// Forgets every key of `entity` (the plan clears the table).
    pub fn plan_clear(&mut self, entity: &EntityType) {
        self.entry(entity).targets.clear();
    }

    /// Looks up a key.
    pub fn get(&self, entity: &str, key: &NaturalKey) -> Option<Target> {
        self.by_type.get(entity)?.targets.get(key).copied()
    }

    fn arity(&self, entity: &str) -> Option<usize> {
        self.by_type.get(entity).map(|t| t.arity)
    }

    fn entry(&mut self, entity: &EntityType) -> &mut TypeIndex {
        self.by_type
            .entry(entity.name().to_string())
            .or_insert_with(|| TypeIndex {
                arity: entity.natural_key_fields().len(),
                targets: HashMap::new(),
            })
    }
}

/// A record whose foreign keys point at destination targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRecord {
    /// Natural key of the record.
    pub key: NaturalKey,
    /// Non-reference fields, ready to write.
    pub fields: FieldMap,
    /// Reference fields; `None` is a null reference.
    pub links: BTreeMap<String, Option<Target>>,
}

impl ResolvedRecord {
    /// Field map to write, given the identifiers bound to planned slots.
    ///
    /// Returns the unbound slot if a planned parent has not been inserted.
    pub fn materialize(
        &self,
        bound: impl Fn(Slot) -> Option<StorageId>,
    ) -> Result<FieldMap, Slot> {
        let mut fields = self.fields.clone();
        for (name, link) in &self.links {
            let value = match link {
                None => Value::Null,
                Some(Target::Stored(id)) => Value::Integer(id.as_i64()),
                Some(Target::Planned(slot)) => Value::Integer(bound(*slot).ok_or(*slot)?.as_i64()),
            };
            fields.insert(name.clone(), value);
        }
        Ok(fields)
    }
}

/// A record left out of a plan because a parent could not be found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionFailure {
    /// Entity type of the skipped record.
    pub entity: String,
    /// Natural key of the skipped record.
    pub key: NaturalKey,
    /// The unresolved reference field.
    pub field: String,
    /// Entity type the field refers to.
    pub parent_type: String,
    /// The parent key that was looked up; `None` if the record's own store
    /// had already lost the parent.
    pub missing_parent: Option<NaturalKey>,
}

impl fmt::Display for ResolutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {} refers to ", self.entity, self.key, self.field)?;
        match &self.missing_parent {
            Some(parent) => write!(
                f,
                "{} {} which does not exist in the destination",
                self.parent_type, parent
            ),
            None => write!(f, "a deleted {} row", self.parent_type),
        }
    }
}

impl std::error::Error for ResolutionFailure {}

/// Resolves every reference field of `record` through `index`.
///
/// # Errors
///
/// Returns the first reference that cannot be resolved. This is never fatal
/// to a run; the caller skips the record.
pub fn resolve(
    record: &Record,
    entity: &EntityType,
    index: &DestinationIndex,
) -> Result<ResolvedRecord, ResolutionFailure> {
    let mut fields = record.fields.clone();
    let mut links = BTreeMap::new();

    for fk in entity.foreign_keys() {
        let value = fields.remove(&fk.field).unwrap_or_default();
        let failure = |missing_parent: Option<NaturalKey>| ResolutionFailure {
            entity: entity.name().to_string(),
            key: record.key.clone(),
            field: fk.field.clone(),
            parent_type: fk.references.clone(),
            missing_parent,
        };
        if record.dangling.contains(&fk.field) {
            return Err(failure(None));
        }
        if value.is_null() {
            links.insert(fk.field.clone(), None);
            continue;
        }
        let arity = index.arity(&fk.references).unwrap_or(1);
        let Some(parent) = NaturalKey::from_value(&value, arity) else {
            return Err(failure(Some(NaturalKey::new(vec![value]))));
        };
        match index.get(&fk.references, &parent) {
            Some(target) => {
                links.insert(fk.field.clone(), Some(target));
            }
            None => return Err(failure(Some(parent))),
        }
    }

    Ok(ResolvedRecord {
        key: record.key.clone(),
        fields,
        links,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn backends() -> EntityType {
        EntityType::new("backends").text("name").natural_key(&["name"])
    }

    fn examples() -> EntityType {
        EntityType::new("examples")
            .reference("backend", "backends")
            .text("name")
            .natural_key(&["backend", "name"])
    }

    fn key(name: &str) -> NaturalKey {
        NaturalKey::new(vec![Value::from(name)])
    }

    fn backend(id: i64, name: &str) -> Record {
        let mut fields = FieldMap::new();
        fields.insert("name".into(), Value::from(name));
        Record {
            id: StorageId::new(id),
            key: key(name),
            fields,
            dangling: BTreeSet::new(),
        }
    }

    fn example(backend: Value, name: &str) -> Record {
        let mut fields = FieldMap::new();
        fields.insert("backend".into(), backend.clone());
        fields.insert("name".into(), Value::from(name));
        Record {
            id: StorageId::new(100),
            key: NaturalKey::new(vec![backend, Value::from(name)]),
            fields,
            dangling: BTreeSet::new(),
        }
    }

    #[test]
    fn resolves_to_stored_parent() {
        let mut index = DestinationIndex::new();
        index.seed(&backends(), &[backend(42, "wikidata")]);

        let resolved = resolve(&example(Value::from("wikidata"), "cats"), &examples(), &index).unwrap();
        assert_eq!(
            resolved.links["backend"],
            Some(Target::Stored(StorageId::new(42)))
        );
        assert!(!resolved.fields.contains_key("backend"));

        let fields = resolved.materialize(|_| None).unwrap();
        assert_eq!(fields["backend"], Value::Integer(42));
        assert_eq!(fields["name"], Value::from("cats"));
    }

    #[test]
    fn resolves_to_planned_parent() {
        let mut index = DestinationIndex::new();
        index.seed(&backends(), &[]);
        index.plan_insert(&backends(), key("wikidata"), Slot(0));

        let resolved = resolve(&example(Value::from("wikidata"), "cats"), &examples(), &index).unwrap();
        assert_eq!(resolved.links["backend"], Some(Target::Planned(Slot(0))));
        assert_eq!(resolved.materialize(|_| None), Err(Slot(0)));
        let fields = resolved
            .materialize(|slot| (slot == Slot(0)).then_some(StorageId::new(7)))
            .unwrap();
        assert_eq!(fields["backend"], Value::Integer(7));
    }

    #[test]
    fn missing_parent_fails_with_details() {
        let mut index = DestinationIndex::new();
        index.seed(&backends(), &[backend(1, "qlever")]);

        let failure = resolve(&example(Value::from("wikidata"), "cats"), &examples(), &index).unwrap_err();
        assert_eq!(failure.field, "backend");
        assert_eq!(failure.parent_type, "backends");
        assert_eq!(failure.missing_parent, Some(key("wikidata")));
        assert!(failure.to_string().contains("does not exist"));
    }

    #[test]
    fn planned_delete_and_clear_hide_parents() {
        let mut index = DestinationIndex::new();
        index.seed(&backends(), &[backend(1, "wikidata"), backend(2, "qlever")]);
        index.plan_delete(&backends(), &key("wikidata"));
        assert!(resolve(&example(Value::from("wikidata"), "a"), &examples(), &index).is_err());
        assert!(resolve(&example(Value::from("qlever"), "a"), &examples(), &index).is_ok());

        index.plan_clear(&backends());
        assert_eq!(index.get("backends", &key("qlever")), None);
        assert!(resolve(&example(Value::from("qlever"), "a"), &examples(), &index).is_err());
    }

    #[test]
    fn orphans_are_not_seeded() {
        let mut index = DestinationIndex::new();
        let mut orphan = example(Value::Null, "Test");
        orphan.dangling.insert("backend".into());
        let kept = example(Value::from("wikidata"), "Test");
        index.seed(&examples(), &[orphan.clone(), kept.clone()]);

        assert_eq!(index.get("examples", &orphan.key), None);
        assert_eq!(
            index.get("examples", &kept.key),
            Some(Target::Stored(StorageId::new(100)))
        );
    }

    #[test]
    fn null_reference_is_kept_null() {
        let index = DestinationIndex::new();
        let resolved = resolve(&example(Value::Null, "orphan"), &examples(), &index).unwrap();
        assert_eq!(resolved.links["backend"], None);
        assert_eq!(resolved.materialize(|_| None).unwrap()["backend"], Value::Null);
    }

    #[test]
    fn dangling_reference_fails() {
        let mut index = DestinationIndex::new();
        index.seed(&backends(), &[]);
        let mut record = example(Value::Null, "lost");
        record.dangling.insert("backend".into());
        let failure = resolve(&record, &examples(), &index).unwrap_err();
        assert_eq!(failure.missing_parent, None);
        assert!(failure.to_string().contains("deleted backends"));
    }
}
