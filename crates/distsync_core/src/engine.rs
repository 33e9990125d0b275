//! The reconciler: one run from options to report.

use crate::config::RunOptions;
use crate::differ::{classify, Classification, Classified};
use crate::error::CoreResult;
use crate::executor;
use crate::plan::{Mode, Plan, PlanBuilder};
use crate::record::{lift_all, KeyLookup, Record};
use crate::report::{ApplySummary, PlanSummary};
use crate::rewriter::DestinationIndex;
use crate::schema::{EntityType, Schema};
use crate::select::{Candidate, Confirmer, Selection, Selector};
use distsync_storage::StoreAdapter;
use serde::Serialize;
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

/// Where a run was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelStage {
    /// The selector cancelled.
    Selection,
    /// The confirmer declined.
    Confirmation,
}

/// What a run ended with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Dry run: the plan was built and discarded.
    Preview {
        /// The plan preview.
        plan: PlanSummary,
    },
    /// The plan was committed.
    Applied {
        /// The plan preview.
        plan: PlanSummary,
        /// What the apply did.
        applied: ApplySummary,
    },
    /// Nothing was written.
    Cancelled {
        /// Which decision stopped the run.
        stage: CancelStage,
        /// Entity type being selected when the selector cancelled.
        entity: Option<String>,
    },
}

/// Result of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Identifier of the run, also recorded on the `reconcile` span.
    pub run_id: Uuid,
    /// The outcome.
    #[serde(flatten)]
    pub outcome: RunOutcome,
}

impl RunReport {
    /// The plan preview, unless the run was cancelled.
    pub fn plan(&self) -> Option<&PlanSummary> {
        match &self.outcome {
            RunOutcome::Preview { plan } | RunOutcome::Applied { plan, .. } => Some(plan),
            RunOutcome::Cancelled { .. } => None,
        }
    }

    /// The apply counts, if the run committed.
    pub fn applied(&self) -> Option<&ApplySummary> {
        match &self.outcome {
            RunOutcome::Applied { applied, .. } => Some(applied),
            _ => None,
        }
    }

    /// Returns true if the run was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.outcome, RunOutcome::Cancelled { .. })
    }
}

/// Result of planning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Planned {
    /// A complete plan.
    Ready(Plan),
    /// The selector cancelled while choosing records of `entity`.
    Cancelled {
        /// Entity type being selected.
        entity: String,
    },
}

/// Reconciles a destination store with a source store.
///
/// The reconciler is generic over the entity types of its [`Schema`]; it
/// never looks at type names beyond the schema's descriptions.
///
/// # Example
///
/// ```rust
/// use distsync_core::{catalog, AutoConfirm, PassThrough, Reconciler, RunOptions};
/// use distsync_storage::InMemoryStore;
///
/// let reconciler = Reconciler::with_catalog().unwrap();
/// let source = InMemoryStore::new();
/// let mut destination = InMemoryStore::new();
/// let options = RunOptions::new().entity(catalog::BACKENDS);
///
/// let report = reconciler
///     .run(&source, &mut destination, &options, &mut PassThrough, &mut AutoConfirm)
///     .unwrap();
/// assert_eq!(report.applied().unwrap().written(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct Reconciler {
    schema: Schema,
}

impl Reconciler {
    /// Creates a reconciler over `schema`.
    pub fn new(schema: Schema) -> Self {
        Self { schema }
    }

    /// Creates a reconciler over the built-in catalog.
    ///
    /// # Errors
    ///
    /// Only fails if the catalog is inconsistent.
    pub fn with_catalog() -> CoreResult<Self> {
        Ok(Self::new(crate::catalog::schema()?))
    }

    /// The schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Runs one reconciliation.
    ///
    /// Validates `options`, builds the plan, and unless this is a dry run,
    /// asks `confirmer` and applies the plan to `destination` in one
    /// transaction. Empty plans are applied without asking.
    ///
    /// # Errors
    ///
    /// Configuration errors are returned before any store is read. Read
    /// errors and apply failures are returned as is; after an apply failure
    /// the destination is unchanged.
    pub fn run(
        &self,
        source: &dyn StoreAdapter,
        destination: &mut dyn StoreAdapter,
        options: &RunOptions,
        selector: &mut dyn Selector,
        confirmer: &mut dyn Confirmer,
    ) -> CoreResult<RunReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!("reconcile", %run_id);
        let _guard = span.enter();

        let report = |outcome: RunOutcome| RunReport { run_id, outcome };

        let plan = match self.plan(source, &*destination, options, selector)? {
            Planned::Ready(plan) => plan,
            Planned::Cancelled { entity } => {
                info!(entity = %entity, "selection cancelled");
                return Ok(report(RunOutcome::Cancelled {
                    stage: CancelStage::Selection,
                    entity: Some(entity),
                }));
            }
        };
        let summary = plan.summary();

        if options.dry_run {
            info!(changes = summary.changes(), "dry run, nothing written");
            return Ok(report(RunOutcome::Preview { plan: summary }));
        }
        if !plan.is_empty() && !confirmer.confirm(&summary) {
            info!("declined, nothing written");
            return Ok(report(RunOutcome::Cancelled {
                stage: CancelStage::Confirmation,
                entity: None,
            }));
        }

        let applied = executor::apply(destination, &plan)?;
        info!(written = applied.written(), "run complete");
        Ok(report(RunOutcome::Applied {
            plan: summary,
            applied,
        }))
    }

    /// Builds the plan for `options` without writing anything.
    ///
    /// Requested types are planned in dependency order. Their parent types
    /// are read as well, so references can be translated, but never
    /// planned.
    ///
    /// # Errors
    ///
    /// Returns configuration errors, read errors, malformed rows and
    /// duplicate natural keys.
    pub fn plan(
        &self,
        source: &dyn StoreAdapter,
        destination: &dyn StoreAdapter,
        options: &RunOptions,
        selector: &mut dyn Selector,
    ) -> CoreResult<Planned> {
        let mode = options.validate(&self.schema)?;
        let requested = self.schema.dependency_order(&options.entities)?;
        let needed = self.schema.with_ancestors(&options.entities)?;
        info!(%mode, types = requested.len(), "planning run");

        let mut source_keys = KeyLookup::new();
        let mut destination_keys = KeyLookup::new();
        let mut index = DestinationIndex::new();
        let mut staged: Vec<(&EntityType, Vec<Record>, Vec<Record>)> = Vec::new();

        for entity in needed {
            let src = lift_all(entity, source.fetch_all(entity.name())?, &mut source_keys)?;
            let dst = lift_all(
                entity,
                destination.fetch_all(entity.name())?,
                &mut destination_keys,
            )?;
            debug!(entity = entity.name(), source = src.len(), destination = dst.len(), "fetched");
            index.seed(entity, &dst);
            if requested.iter().any(|r| r.name() == entity.name()) {
                staged.push((entity, src, dst));
            }
        }

        let mut builder = PlanBuilder::new(mode, index);
        for (entity, src, dst) in staged {
            let classified = classify(&src, &dst, entity)?;
            let selection = if options.select && !entity.is_user_content() {
                let candidates = candidates(entity, &classified, mode);
                if candidates.is_empty() {
                    None
                } else {
                    match selector.select(entity, &candidates) {
                        Selection::Chosen(keys) => Some(keys),
                        Selection::Cancelled => {
                            return Ok(Planned::Cancelled {
                                entity: entity.name().to_string(),
                            })
                        }
                    }
                }
            } else {
                None
            };
            let type_plan = builder.add_type(entity, classified, selection.as_ref());
            debug!(
                entity = entity.name(),
                operations = type_plan.operations.len(),
                skipped = type_plan.skipped.len(),
                "planned type"
            );
            for failure in &type_plan.skipped {
                warn!(%failure, "skipping record");
            }
        }

        for note in self.notes(destination, &requested, mode, &builder)? {
            warn!("{note}");
            builder.add_note(note);
        }
        Ok(Planned::Ready(builder.finish()))
    }

    fn notes(
        &self,
        destination: &dyn StoreAdapter,
        requested: &[&EntityType],
        mode: Mode,
        builder: &PlanBuilder,
    ) -> CoreResult<Vec<String>> {
        let plan = builder.planned();
        let mut notes = Vec::new();
        for entity in requested {
            if entity.is_user_content() {
                notes.push(format!(
                    "{} holds user-generated content; destination records will be overwritten{}",
                    entity.name(),
                    if matches!(mode, Mode::Update { delete: false }) {
                        ""
                    } else {
                        " or removed"
                    }
                ));
            }
            let removes = plan
                .iter()
                .find(|t| t.entity == entity.name())
                .is_some_and(|t| t.clears() || t.deletes() > 0);
            if !removes {
                continue;
            }
            for child in self.schema.dependents(entity.name()) {
                if requested.iter().any(|r| r.name() == child.name()) {
                    continue;
                }
                let rows = destination.count(child.name())?;
                if rows > 0 {
                    notes.push(format!(
                        "{} records are removed without {}; {} destination {} rows may refer to removed records",
                        entity.name(),
                        child.name(),
                        rows,
                        child.name()
                    ));
                }
            }
        }
        Ok(notes)
    }
}

/// Records of one type the selector may choose from: every source record
/// under reset, new and changed ones under update.
fn candidates(entity: &EntityType, classified: &[Classified], mode: Mode) -> Vec<Candidate> {
    classified
        .iter()
        .filter(|c| match mode {
            Mode::Reset => true,
            Mode::Update { .. } => matches!(c.class, Classification::Add | Classification::Update),
        })
        .filter_map(|c| {
            c.source.as_ref().map(|record| Candidate {
                key: c.key.clone(),
                class: c.class,
                description: record.describe(entity),
            })
        })
        .collect()
}
