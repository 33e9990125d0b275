//! Transactional apply of a [`Plan`].

use crate::error::{CoreError, CoreResult};
use crate::plan::{Operation, Plan, TypePlan};
use crate::report::{ApplySummary, TypeCounts};
use crate::rewriter::Slot;
use distsync_storage::{StorageError, StorageId, StoreAdapter};
use tracing::{debug, info, warn};

/// Applies `plan` to `store` inside one transaction.
///
/// Types are applied in plan order (parents first) and each type's
/// operations in the order the plan lists them. Inserts bind their slot to
/// the identifier the store assigns, and later references to that slot are
/// written with it.
///
/// # Errors
///
/// On the first failing operation the transaction is rolled back and
/// [`CoreError::Apply`] names the entity type, the operation and the key.
/// If the rollback fails as well, [`CoreError::RollbackFailed`] carries both.
pub fn apply(store: &mut dyn StoreAdapter, plan: &Plan) -> CoreResult<ApplySummary> {
    store.begin_transaction()?;
    let mut bindings: Vec<Option<StorageId>> = vec![None; plan.slot_count()];
    let mut summary = ApplySummary::default();

    for type_plan in plan.types() {
        match apply_type(store, type_plan, &mut bindings) {
            Ok(counts) => summary.types.push(counts),
            Err(err) => return Err(abort(store, err)),
        }
    }

    if let Err(source) = store.commit() {
        return Err(abort(
            store,
            CoreError::Apply {
                entity: String::new(),
                operation: "commit",
                key: String::new(),
                source,
            },
        ));
    }
    info!(written = summary.written(), "committed plan");
    Ok(summary)
}

fn apply_type(
    store: &mut dyn StoreAdapter,
    plan: &TypePlan,
    bindings: &mut [Option<StorageId>],
) -> CoreResult<TypeCounts> {
    let table = plan.entity.as_str();
    let mut counts = TypeCounts {
        entity: plan.entity.clone(),
        skipped: plan.skipped.len(),
        ..TypeCounts::default()
    };

    for op in &plan.operations {
        let failed = |source: StorageError| CoreError::Apply {
            entity: plan.entity.clone(),
            operation: op.name(),
            key: op.key().map(ToString::to_string).unwrap_or_default(),
            source,
        };
        match op {
            Operation::ClearAll => {
                counts.cleared = store.clear_all(table).map_err(failed)?;
            }
            Operation::Insert { slot, record } => {
                let fields = record
                    .materialize(|s| bindings.get(s.0).copied().flatten())
                    .map_err(|unbound| failed(unbound_slot(unbound)))?;
                let id = store.insert(table, &fields).map_err(failed)?;
                if let Some(binding) = bindings.get_mut(slot.0) {
                    *binding = Some(id);
                }
                counts.added += 1;
            }
            Operation::Update { id, record } => {
                let fields = record
                    .materialize(|s| bindings.get(s.0).copied().flatten())
                    .map_err(|unbound| failed(unbound_slot(unbound)))?;
                store.update(table, *id, &fields).map_err(failed)?;
                counts.updated += 1;
            }
            Operation::Delete { id, .. } => {
                store.delete(table, *id).map_err(failed)?;
                counts.deleted += 1;
            }
        }
    }

    debug!(
        entity = table,
        cleared = counts.cleared,
        added = counts.added,
        updated = counts.updated,
        deleted = counts.deleted,
        skipped = counts.skipped,
        "applied type plan"
    );
    Ok(counts)
}

fn unbound_slot(slot: Slot) -> StorageError {
    StorageError::Unavailable(format!("{slot} was never inserted"))
}

fn abort(store: &mut dyn StoreAdapter, err: CoreError) -> CoreError {
    warn!(error = %err, "apply failed, rolling back");
    match store.rollback() {
        Ok(()) => err,
        Err(rollback) => CoreError::RollbackFailed {
            original: Box::new(err),
            rollback,
        },
    }
}
