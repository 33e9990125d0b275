//! End-to-end reconciliation runs over in-memory and file stores.

use distsync_codec::{FieldMap, Value};
use distsync_core::{
    catalog, AutoConfirm, CancelStage, Candidate, CoreError, EntityType, PassThrough, Reconciler,
    RunOptions, RunOutcome, RunReport, Schema,
};
use distsync_storage::{InMemoryStore, StoreAdapter};
use distsync_testkit::prelude::*;

fn reconciler() -> Reconciler {
    Reconciler::with_catalog().unwrap()
}

fn run(stores: &mut SeededStores, options: &RunOptions) -> RunReport {
    reconciler()
        .run(
            &stores.source,
            &mut stores.destination,
            options,
            &mut PassThrough,
            &mut AutoConfirm,
        )
        .unwrap()
}

fn backend_names(store: &dyn StoreAdapter) -> Vec<String> {
    let mut names = names(store, catalog::BACKENDS, "name");
    names.sort();
    names
}

#[test]
fn delete_is_scoped_to_the_source_set() {
    let mut stores = SeededStores::new();
    for name in ["A", "D"] {
        stores.source_backend(name);
    }
    for name in ["A", "B", "C"] {
        stores.destination_backend(name);
    }

    let options = RunOptions::new().entity(catalog::BACKENDS).delete(true);
    let report = run(&mut stores, &options);

    assert_eq!(backend_names(&stores.destination), vec!["A", "D"]);
    let counts = report.applied().unwrap().get(catalog::BACKENDS).unwrap();
    assert_eq!((counts.added, counts.updated, counts.deleted), (1, 0, 2));
}

#[test]
fn delete_ignores_unselected_source_records() {
    let mut stores = SeededStores::new();
    for name in ["A", "D", "E"] {
        stores.source_backend(name);
    }
    for name in ["A", "B", "C"] {
        stores.destination_backend(name);
    }

    let options = RunOptions::new()
        .entity(catalog::BACKENDS)
        .delete(true)
        .select(true);
    let mut selector = ScriptedSelector::new(|_, c: &Candidate| c.description != "e (E)");
    let report = reconciler()
        .run(
            &stores.source,
            &mut stores.destination,
            &options,
            &mut selector,
            &mut AutoConfirm,
        )
        .unwrap();

    assert_eq!(backend_names(&stores.destination), vec!["A", "D"]);
    assert_eq!(selector.offered.len(), 1);
    assert_eq!(selector.offered[0].1, vec!["d (D)", "e (E)"]);
    let summary = report.plan().unwrap().get(catalog::BACKENDS).unwrap();
    assert_eq!(summary.not_selected, 1);
    assert_eq!(summary.to_delete, 2);
}

#[test]
fn update_without_delete_keeps_destination_only_records() {
    let mut stores = SeededStores::new();
    for name in ["A", "D"] {
        stores.source_backend(name);
    }
    for name in ["A", "B", "C"] {
        stores.destination_backend(name);
    }

    let report = run(&mut stores, &RunOptions::new().entity(catalog::BACKENDS));

    assert_eq!(backend_names(&stores.destination), vec!["A", "B", "C", "D"]);
    let summary = report.plan().unwrap().get(catalog::BACKENDS).unwrap();
    assert_eq!(summary.to_keep, 3);
    assert_eq!(summary.to_delete, 0);
}

#[test]
fn keep_add_delete_scenario_on_a_custom_schema() {
    let schema = Schema::new()
        .register(
            EntityType::new("servers")
                .text("name")
                .integer("score")
                .natural_key(&["name"]),
        )
        .unwrap();
    let row = |name: &str, score: i64| {
        let mut fields = FieldMap::new();
        fields.insert("name".into(), Value::from(name));
        fields.insert("score".into(), Value::Integer(score));
        fields
    };
    let mut source = InMemoryStore::new();
    source.insert("servers", &row("X", 10)).unwrap();
    source.insert("servers", &row("Y", 20)).unwrap();
    let mut destination = InMemoryStore::new();
    destination.insert("servers", &row("X", 10)).unwrap();
    destination.insert("servers", &row("Z", 5)).unwrap();

    let options = RunOptions::new().entity("servers").delete(true);
    let report = Reconciler::new(schema)
        .run(&source, &mut destination, &options, &mut PassThrough, &mut AutoConfirm)
        .unwrap();

    let summary = report.plan().unwrap().get("servers").unwrap();
    assert_eq!((summary.to_keep, summary.to_add, summary.to_delete), (1, 1, 1));
    let listing: Vec<_> = summary
        .listing
        .iter()
        .map(|l| (l.action, l.record.as_str()))
        .collect();
    assert_eq!(listing, vec![("add", "Y"), ("delete", "Z")]);

    let mut rows: Vec<_> = destination
        .fetch_all("servers")
        .unwrap()
        .into_iter()
        .map(|r| (r.fields["name"].to_string(), r.fields["score"].clone()))
        .collect();
    rows.sort();
    assert_eq!(
        rows,
        vec![
            ("X".to_string(), Value::Integer(10)),
            ("Y".to_string(), Value::Integer(20)),
        ]
    );
}

#[test]
fn changed_fields_are_updated_in_place() {
    let mut stores = SeededStores::new();
    let src = stores.source_backend("Wikidata");
    stores
        .source
        .update(catalog::BACKENDS, src, &{
            let mut f = FieldMap::new();
            f.insert("url".into(), Value::from("https://query.wikidata.org"));
            f
        })
        .unwrap();
    let dst = stores.destination_backend("Wikidata");

    let report = run(&mut stores, &RunOptions::new().entity(catalog::BACKENDS));

    assert_eq!(report.applied().unwrap().get(catalog::BACKENDS).unwrap().updated, 1);
    let rows = stores.destination.fetch_all(catalog::BACKENDS).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, dst);
    assert_eq!(rows[0].fields["url"], Value::from("https://query.wikidata.org"));
}

#[test]
fn parent_and_children_are_inserted_together() {
    let mut stores = SeededStores::new();
    let x = stores.source_backend("X");
    stores.source_example(x, "cats");
    stores.source_example(x, "dogs");

    let options = RunOptions::new()
        .entity(catalog::EXAMPLES)
        .entity(catalog::BACKENDS);
    let report = run(&mut stores, &options);

    let plan = report.plan().unwrap();
    assert_eq!(plan.types[0].entity, catalog::BACKENDS);
    assert_eq!(plan.get(catalog::EXAMPLES).unwrap().to_skip, 0);

    let backend_id = stores.destination.fetch_all(catalog::BACKENDS).unwrap()[0].id;
    let examples = stores.destination.fetch_all(catalog::EXAMPLES).unwrap();
    assert_eq!(examples.len(), 2);
    for example in examples {
        assert_eq!(example.fields["backend"], Value::Integer(backend_id.as_i64()));
    }
}

#[test]
fn children_are_rewired_to_destination_identifiers() {
    let mut stores = SeededStores::new();
    // Different insertion order gives the same backend different ids.
    stores.source_backend("Other");
    let src = stores.source_backend("Wikidata");
    stores.source_example(src, "cats");
    let dst = stores.destination_backend("Wikidata");

    run(&mut stores, &RunOptions::new().entity(catalog::EXAMPLES));

    let examples = stores.destination.fetch_all(catalog::EXAMPLES).unwrap();
    assert_eq!(examples.len(), 1);
    assert_eq!(examples[0].fields["backend"], Value::Integer(dst.as_i64()));
    assert_ne!(src, dst);
}

#[test]
fn unresolvable_children_are_skipped_individually() {
    let mut stores = SeededStores::new();
    let present = stores.source_backend("Present");
    let missing = stores.source_backend("Missing");
    stores.source_example(present, "kept");
    stores.source_example(missing, "orphan");
    stores.destination_backend("Present");

    let report = run(&mut stores, &RunOptions::new().entity(catalog::EXAMPLES));

    assert_eq!(names(&stores.destination, catalog::EXAMPLES, "name"), vec!["kept"]);
    let summary = report.plan().unwrap().get(catalog::EXAMPLES).unwrap();
    assert_eq!(summary.to_skip, 1);
    let reason = summary.skipped[0].to_string();
    assert!(reason.contains("Missing"), "{reason}");
    assert!(reason.contains("does not exist in the destination"), "{reason}");
    assert_eq!(report.applied().unwrap().get(catalog::EXAMPLES).unwrap().skipped, 1);
}

#[test]
fn reset_replaces_the_destination_type() {
    let mut stores = SeededStores::new();
    stores.source_backend("A");
    stores.source_backend("B");
    stores.destination_backend("B");
    stores.destination_backend("C");

    let report = run(
        &mut stores,
        &RunOptions::new().entity(catalog::BACKENDS).reset(true),
    );

    assert_eq!(backend_names(&stores.destination), vec!["A", "B"]);
    let counts = report.applied().unwrap().get(catalog::BACKENDS).unwrap();
    assert_eq!((counts.cleared, counts.added), (2, 2));
}

#[test]
fn removing_parents_without_children_is_flagged() {
    let mut stores = SeededStores::new();
    stores.source_backend("A");
    stores.destination_backend("A");
    let gone = stores.destination_backend("Gone");
    stores.destination_example(gone, "cats");

    let report = run(
        &mut stores,
        &RunOptions::new().entity(catalog::BACKENDS).delete(true),
    );

    let notes = &report.plan().unwrap().notes;
    assert_eq!(notes.len(), 1);
    assert!(notes[0].contains(catalog::EXAMPLES), "{}", notes[0]);
}

#[test]
fn children_of_deleted_parents_are_refreshed_on_the_next_run() {
    let mut stores = SeededStores::new();
    let a = stores.source_backend("A");
    stores.source_example(a, "cats");
    stores.destination_backend("A");

    run(&mut stores, &RunOptions::new().entity(catalog::BACKENDS).reset(true));
    // The reset gave "A" a new identifier; the example is inserted against it.
    let report = run(&mut stores, &RunOptions::new().entity(catalog::EXAMPLES));

    assert_eq!(report.plan().unwrap().get(catalog::EXAMPLES).unwrap().to_add, 1);
    let backend_id = stores.destination.fetch_all(catalog::BACKENDS).unwrap()[0].id;
    let example = &stores.destination.fetch_all(catalog::EXAMPLES).unwrap()[0];
    assert_eq!(example.fields["backend"], Value::Integer(backend_id.as_i64()));
}

/// Two backends that each own an example named "Test", in both stores.
fn same_named_children() -> SeededStores {
    let mut stores = SeededStores::new();
    for name in ["A", "B"] {
        let id = stores.source_backend(name);
        stores.source_example(id, "Test");
        let id = stores.destination_backend(name);
        stores.destination_example(id, "Test");
    }
    stores
}

fn example_backends_exist(store: &dyn StoreAdapter) -> bool {
    let backends: Vec<_> = store
        .fetch_all(catalog::BACKENDS)
        .unwrap()
        .into_iter()
        .map(|row| Value::Integer(row.id.as_i64()))
        .collect();
    store
        .fetch_all(catalog::EXAMPLES)
        .unwrap()
        .iter()
        .all(|row| backends.contains(&row.fields["backend"]))
}

#[test]
fn orphaned_children_with_equal_names_are_kept_without_delete() {
    let mut stores = same_named_children();
    run(&mut stores, &RunOptions::new().entity(catalog::BACKENDS).reset(true));

    let report = run(&mut stores, &RunOptions::new().entity(catalog::EXAMPLES));

    let summary = report.plan().unwrap().get(catalog::EXAMPLES).unwrap();
    assert_eq!((summary.to_add, summary.to_keep, summary.to_delete), (2, 2, 0));
    // The two stale rows stay until a run with delete.
    assert_eq!(stores.destination.count(catalog::EXAMPLES).unwrap(), 4);
}

#[test]
fn orphaned_children_with_equal_names_are_replaced_with_delete() {
    let mut stores = same_named_children();
    run(&mut stores, &RunOptions::new().entity(catalog::BACKENDS).reset(true));

    let report = run(
        &mut stores,
        &RunOptions::new().entity(catalog::EXAMPLES).delete(true),
    );

    let summary = report.plan().unwrap().get(catalog::EXAMPLES).unwrap();
    assert_eq!((summary.to_add, summary.to_delete), (2, 2));
    assert_eq!(stores.destination.count(catalog::EXAMPLES).unwrap(), 2);
    assert!(example_backends_exist(&stores.destination));

    let again = run(
        &mut stores,
        &RunOptions::new().entity(catalog::EXAMPLES).delete(true),
    );
    assert_eq!(again.plan().unwrap().changes(), 0);
}

#[test]
fn children_of_deleted_parents_are_removed_with_delete() {
    let mut stores = SeededStores::new();
    let a = stores.source_backend("A");
    stores.source_example(a, "Test");
    for name in ["A", "B", "C"] {
        let id = stores.destination_backend(name);
        stores.destination_example(id, "Test");
    }

    run(&mut stores, &RunOptions::new().entity(catalog::BACKENDS).delete(true));
    assert_eq!(backend_names(&stores.destination), vec!["A"]);

    let report = run(
        &mut stores,
        &RunOptions::new().entity(catalog::EXAMPLES).delete(true),
    );

    let summary = report.plan().unwrap().get(catalog::EXAMPLES).unwrap();
    assert_eq!((summary.to_add, summary.to_keep, summary.to_delete), (0, 1, 2));
    assert_eq!(stores.destination.count(catalog::EXAMPLES).unwrap(), 1);
    assert!(example_backends_exist(&stores.destination));
}

#[test]
fn user_content_is_flagged_and_never_offered_for_selection() {
    let mut stores = SeededStores::new();
    stores
        .source
        .insert(catalog::SAVED_QUERIES, &saved_query_row("abc", "SELECT 1"))
        .unwrap();
    stores.source_backend("A");

    let options = RunOptions::new()
        .entity(catalog::SAVED_QUERIES)
        .entity(catalog::BACKENDS)
        .select(true);
    let mut selector = ScriptedSelector::new(|_, _: &Candidate| true);
    let mut confirmer = RecordingConfirmer::accept();
    reconciler()
        .run(
            &stores.source,
            &mut stores.destination,
            &options,
            &mut selector,
            &mut confirmer,
        )
        .unwrap();

    let offered: Vec<_> = selector.offered.iter().map(|(e, _)| e.as_str()).collect();
    assert_eq!(offered, vec![catalog::BACKENDS]);
    assert!(confirmer.shown[0].includes_user_content());
    assert!(confirmer.shown[0]
        .notes
        .iter()
        .any(|n| n.contains(catalog::SAVED_QUERIES)));
    assert_eq!(stores.destination.count(catalog::SAVED_QUERIES).unwrap(), 1);
}

#[test]
fn cancelled_selection_writes_nothing() {
    let mut stores = SeededStores::new();
    stores.source_backend("A");
    stores.destination_backend("B");
    let before = stores.destination.snapshot();

    let mut selector = CancelSelector::default();
    let report = reconciler()
        .run(
            &stores.source,
            &mut stores.destination,
            &RunOptions::new().entity(catalog::BACKENDS).select(true),
            &mut selector,
            &mut AutoConfirm,
        )
        .unwrap();

    assert_eq!(selector.calls, 1);
    assert_eq!(
        report.outcome,
        RunOutcome::Cancelled {
            stage: CancelStage::Selection,
            entity: Some(catalog::BACKENDS.to_string()),
        }
    );
    assert_eq!(stores.destination.snapshot(), before);
}

#[test]
fn declined_confirmation_writes_nothing() {
    let mut stores = SeededStores::new();
    stores.source_backend("A");
    let before = stores.destination.snapshot();

    let mut confirmer = RecordingConfirmer::decline();
    let report = reconciler()
        .run(
            &stores.source,
            &mut stores.destination,
            &RunOptions::new().entity(catalog::BACKENDS),
            &mut PassThrough,
            &mut confirmer,
        )
        .unwrap();

    assert!(report.is_cancelled());
    assert_eq!(confirmer.shown.len(), 1);
    assert_eq!(confirmer.shown[0].changes(), 1);
    assert_eq!(stores.destination.snapshot(), before);
}

#[test]
fn empty_plans_are_not_confirmed() {
    let mut stores = SeededStores::new();
    stores.source_backend("A");
    stores.destination_backend("A");

    let mut confirmer = RecordingConfirmer::decline();
    let report = reconciler()
        .run(
            &stores.source,
            &mut stores.destination,
            &RunOptions::new().entity(catalog::BACKENDS),
            &mut PassThrough,
            &mut confirmer,
        )
        .unwrap();

    assert!(confirmer.shown.is_empty());
    assert_eq!(report.applied().unwrap().written(), 0);
}

#[test]
fn dry_run_reports_without_writing() {
    let mut stores = SeededStores::new();
    stores.source_backend("A");
    stores.destination_backend("B");
    let before = stores.destination.snapshot();

    let report = run(
        &mut stores,
        &RunOptions::new()
            .entity(catalog::BACKENDS)
            .delete(true)
            .dry_run(true),
    );

    match &report.outcome {
        RunOutcome::Preview { plan } => {
            let summary = plan.get(catalog::BACKENDS).unwrap();
            assert_eq!((summary.to_add, summary.to_delete), (1, 1));
        }
        other => panic!("expected a preview, got {other:?}"),
    }
    assert_eq!(stores.destination.snapshot(), before);
}

#[test]
fn invalid_options_fail_before_reading() {
    let mut stores = SeededStores::new();
    let cases = [
        RunOptions::new(),
        RunOptions::new().entity(catalog::BACKENDS).reset(true).delete(true),
        RunOptions::new().entity(catalog::SAVED_QUERIES).select(true),
    ];
    for options in cases {
        let err = reconciler()
            .run(
                &stores.source,
                &mut stores.destination,
                &options,
                &mut PassThrough,
                &mut AutoConfirm,
            )
            .unwrap_err();
        assert!(err.is_configuration(), "{err}");
    }

    let err = reconciler()
        .run(
            &stores.source,
            &mut stores.destination,
            &RunOptions::new().entity("widgets"),
            &mut PassThrough,
            &mut AutoConfirm,
        )
        .unwrap_err();
    assert!(matches!(err, CoreError::UnknownEntity { .. }));
}

#[test]
fn apply_failure_leaves_the_destination_unchanged() {
    let source = {
        let mut stores = SeededStores::new();
        let x = stores.source_backend("X");
        stores.source_example(x, "cats");
        stores.source
    };
    let mut destination = FaultyStore::new(catalog_store());
    destination.fail_at(1);
    let before = destination.snapshot();

    let options = RunOptions::new().all(reconciler().schema());
    let err = reconciler()
        .run(&source, &mut destination, &options, &mut PassThrough, &mut AutoConfirm)
        .unwrap_err();

    assert!(destination.has_failed());
    assert!(matches!(err, CoreError::Apply { .. }), "{err}");
    assert_eq!(destination.snapshot(), before);
    assert!(!destination.inner().in_transaction());
}

#[test]
fn commit_failure_leaves_the_destination_unchanged() {
    let mut stores = SeededStores::new();
    stores.source_backend("X");
    let mut destination = FaultyStore::new(catalog_store());
    destination.set_fail_on_commit(true);
    let before = destination.snapshot();

    let result = reconciler().run(
        &stores.source,
        &mut destination,
        &RunOptions::new().entity(catalog::BACKENDS),
        &mut PassThrough,
        &mut AutoConfirm,
    );

    assert!(result.is_err());
    assert_eq!(destination.snapshot(), before);
}

#[test]
fn file_stores_round_trip_in_both_directions() {
    let stores = TempStores::new();
    {
        let mut source = stores.source();
        let id = source
            .insert(catalog::BACKENDS, &backend_row("Wikidata", "wikidata"))
            .unwrap();
        source
            .insert(catalog::EXAMPLES, &example_row(id, "cats", "SELECT ?cat"))
            .unwrap();
    }

    let options = RunOptions::new().all(reconciler().schema());
    let mut dist = stores.dist();
    reconciler()
        .run(&stores.source(), &mut dist, &options, &mut PassThrough, &mut AutoConfirm)
        .unwrap();
    drop(dist);

    let dist = stores.dist();
    assert_eq!(names(&dist, catalog::EXAMPLES, "name"), vec!["cats"]);

    // Importing back changes nothing.
    let mut source = stores.source();
    let report = reconciler()
        .run(&dist, &mut source, &options, &mut PassThrough, &mut AutoConfirm)
        .unwrap();
    assert_eq!(report.plan().unwrap().changes(), 0);
}
