//! Plan building: classified records to ordered destination operations.

use crate::differ::{Classification, Classified};
use crate::record::NaturalKey;
use crate::report::{Listed, PlanSummary, TypeSummary};
use crate::rewriter::{resolve, DestinationIndex, ResolutionFailure, ResolvedRecord, Slot};
use crate::schema::EntityType;
use distsync_storage::StorageId;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// How the destination is brought in line with the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Mode {
    /// Clear each selected type, then insert the selected source records.
    Reset,
    /// Insert new records and update changed ones; with `delete`, also remove
    /// destination records absent from the source.
    Update {
        /// Remove destination-only records.
        delete: bool,
    },
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Update { delete: false }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Reset => f.write_str("reset"),
            Mode::Update { delete: false } => f.write_str("update"),
            Mode::Update { delete: true } => f.write_str("update with delete"),
        }
    }
}

/// One destination operation. Identifiers are always destination identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Remove every row of the type.
    ClearAll,
    /// Insert a record; the assigned identifier is bound to `slot`.
    Insert {
        /// Plan-local handle for children inserted in the same run.
        slot: Slot,
        /// The record to write.
        record: ResolvedRecord,
    },
    /// Overwrite an existing row.
    Update {
        /// Destination row.
        id: StorageId,
        /// The new contents.
        record: ResolvedRecord,
    },
    /// Delete an existing row.
    Delete {
        /// Destination row.
        id: StorageId,
        /// Natural key of the deleted record, for reporting.
        key: NaturalKey,
    },
}

impl Operation {
    /// Short operation name used in errors and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::ClearAll => "clear",
            Operation::Insert { .. } => "insert",
            Operation::Update { .. } => "update",
            Operation::Delete { .. } => "delete",
        }
    }

    /// Natural key of the affected record; `None` for [`Operation::ClearAll`].
    pub fn key(&self) -> Option<&NaturalKey> {
        match self {
            Operation::ClearAll => None,
            Operation::Insert { record, .. } | Operation::Update { record, .. } => Some(&record.key),
            Operation::Delete { key, .. } => Some(key),
        }
    }
}

/// The operations for one entity type, plus what was left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypePlan {
    /// Entity type name.
    pub entity: String,
    /// Whether the type holds user-generated content.
    pub user_content: bool,
    /// Operations in apply order.
    pub operations: Vec<Operation>,
    /// Keys present and equal on both sides.
    pub kept: Vec<NaturalKey>,
    /// Candidate keys the selector left out.
    pub unselected: Vec<NaturalKey>,
    /// Destination-only keys left in place because delete is off.
    pub retained: Vec<NaturalKey>,
    /// Records excluded because a reference could not be resolved.
    pub skipped: Vec<ResolutionFailure>,
    /// Rows in the destination before the run.
    pub destination_rows: usize,
    /// Human-readable list of the changes, in operation order.
    pub listing: Vec<Listed>,
}

impl TypePlan {
    fn count(&self, name: &str) -> usize {
        self.operations.iter().filter(|op| op.name() == name).count()
    }

    /// Number of inserts.
    pub fn inserts(&self) -> usize {
        self.count("insert")
    }

    /// Number of updates.
    pub fn updates(&self) -> usize {
        self.count("update")
    }

    /// Number of deletes.
    pub fn deletes(&self) -> usize {
        self.count("delete")
    }

    /// Returns true if the plan clears the table.
    pub fn clears(&self) -> bool {
        self.operations.iter().any(|op| matches!(op, Operation::ClearAll))
    }

    /// Preview counts for this type.
    pub fn summary(&self) -> TypeSummary {
        let to_keep = self.kept.len()
            + self.retained.len()
            + if self.clears() { 0 } else { self.unselected.len() };
        TypeSummary {
            entity: self.entity.clone(),
            user_content: self.user_content,
            to_clear: if self.clears() { self.destination_rows } else { 0 },
            to_add: self.inserts(),
            to_update: self.updates(),
            to_keep,
            to_delete: self.deletes(),
            to_skip: self.skipped.len(),
            not_selected: self.unselected.len(),
            listing: self.listing.clone(),
            skipped: self.skipped.clone(),
        }
    }
}

/// An ordered set of type plans, parents first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    mode: Mode,
    types: Vec<TypePlan>,
    slots: usize,
    notes: Vec<String>,
}

impl Plan {
    /// The mode the plan was built for.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Per-type plans in dependency order.
    pub fn types(&self) -> &[TypePlan] {
        &self.types
    }

    /// The plan of one type.
    pub fn get(&self, entity: &str) -> Option<&TypePlan> {
        self.types.iter().find(|t| t.entity == entity)
    }

    /// Number of insert slots allocated.
    pub fn slot_count(&self) -> usize {
        self.slots
    }

    /// Total number of operations.
    pub fn operation_count(&self) -> usize {
        self.types.iter().map(|t| t.operations.len()).sum()
    }

    /// Returns true if applying the plan would not change the destination.
    pub fn is_empty(&self) -> bool {
        self.operation_count() == 0
    }

    /// Operator-facing notes (warnings) attached while planning.
    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    /// Attaches a note.
    pub fn add_note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    /// Preview of the whole plan.
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            mode: self.mode,
            types: self.types.iter().map(TypePlan::summary).collect(),
            notes: self.notes.clone(),
        }
    }
}

/// Builds a [`Plan`] one entity type at a time.
///
/// Types must be added in dependency order. The builder owns the
/// [`DestinationIndex`] and updates it as each type is planned, so a child
/// type resolves against its parent's planned state.
#[derive(Debug)]
pub struct PlanBuilder {
    mode: Mode,
    index: DestinationIndex,
    plan: Plan,
}

impl PlanBuilder {
    /// Starts a plan over a destination index seeded from the destination.
    pub fn new(mode: Mode, index: DestinationIndex) -> Self {
        Self {
            mode,
            index,
            plan: Plan {
                mode,
                ..Plan::default()
            },
        }
    }

    /// Type plans added so far.
    pub fn planned(&self) -> &[TypePlan] {
        &self.plan.types
    }

    /// The current destination index.
    pub fn index(&self) -> &DestinationIndex {
        &self.index
    }

    fn next_slot(&mut self) -> Slot {
        let slot = Slot(self.plan.slots);
        self.plan.slots += 1;
        slot
    }

    /// Plans one entity type and returns its plan.
    ///
    /// `selection` narrows the candidates (Add/Update keys, or every source
    /// key under [`Mode::Reset`]); `None` selects all of them.
    pub fn add_type(
        &mut self,
        entity: &EntityType,
        classified: Vec<Classified>,
        selection: Option<&BTreeSet<NaturalKey>>,
    ) -> &TypePlan {
        let is_selected = |key: &NaturalKey| selection.is_none_or(|s| s.contains(key));
        let mut plan = TypePlan {
            entity: entity.name().to_string(),
            user_content: entity.is_user_content(),
            destination_rows: classified.iter().filter(|c| c.destination.is_some()).count(),
            ..TypePlan::default()
        };

        match self.mode {
            Mode::Reset => {
                plan.operations.push(Operation::ClearAll);
                self.index.plan_clear(entity);
                for item in classified {
                    let Some(source) = item.source else {
                        continue;
                    };
                    if !is_selected(&item.key) {
                        plan.unselected.push(item.key);
                        continue;
                    }
                    match resolve(&source, entity, &self.index) {
                        Ok(record) => {
                            let slot = self.next_slot();
                            self.index.plan_insert(entity, record.key.clone(), slot);
                            plan.listing.push(Listed::new("add", source.describe(entity)));
                            plan.operations.push(Operation::Insert { slot, record });
                        }
                        Err(failure) => plan.skipped.push(failure),
                    }
                }
            }
            Mode::Update { delete } => {
                let mut inserts = Vec::new();
                let mut updates = Vec::new();
                let mut deletes = Vec::new();
                let mut listed = (Vec::new(), Vec::new(), Vec::new());

                for item in classified {
                    match (item.class, item.source, item.destination) {
                        (Classification::Keep, _, _) => plan.kept.push(item.key),
                        (Classification::DeleteCandidate, _, Some(existing)) => {
                            if delete {
                                self.index.plan_delete(entity, &item.key);
                                listed.2.push(Listed::new("delete", existing.describe(entity)));
                                deletes.push(Operation::Delete {
                                    id: existing.id,
                                    key: item.key,
                                });
                            } else {
                                plan.retained.push(item.key);
                            }
                        }
                        (class, Some(source), existing) => {
                            if !is_selected(&item.key) {
                                plan.unselected.push(item.key);
                                continue;
                            }
                            let record = match resolve(&source, entity, &self.index) {
                                Ok(record) => record,
                                Err(failure) => {
                                    plan.skipped.push(failure);
                                    continue;
                                }
                            };
                            match (class, existing) {
                                (Classification::Update, Some(existing)) => {
                                    listed.1.push(Listed::new("update", source.describe(entity)));
                                    updates.push(Operation::Update {
                                        id: existing.id,
                                        record,
                                    });
                                }
                                _ => {
                                    let slot = self.next_slot();
                                    self.index.plan_insert(entity, record.key.clone(), slot);
                                    listed.0.push(Listed::new("add", source.describe(entity)));
                                    inserts.push(Operation::Insert { slot, record });
                                }
                            }
                        }
                        // Classified always carries the record its class implies.
                        (_, None, _) => {}
                    }
                }

                plan.operations = inserts;
                plan.operations.append(&mut updates);
                plan.operations.append(&mut deletes);
                plan.listing = listed.0;
                plan.listing.append(&mut listed.1);
                plan.listing.append(&mut listed.2);
            }
        }

        self.plan.types.push(plan);
        let last = self.plan.types.len() - 1;
        &self.plan.types[last]
    }

    /// Attaches an operator-facing note.
    pub fn add_note(&mut self, note: impl Into<String>) {
        self.plan.add_note(note);
    }

    /// Finishes the plan.
    pub fn finish(self) -> Plan {
        self.plan
    }
}
