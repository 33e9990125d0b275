//! Property-based test generators using proptest.
//!
//! Provides strategies for generating catalog contents that respect the
//! store invariants: unique natural keys and examples that refer to an
//! existing backend.

use crate::fixtures::{backend_row, example_row};
use distsync_core::catalog;
use distsync_storage::{StorageId, StoreAdapter};
use proptest::prelude::*;
use std::collections::BTreeMap;

/// Strategy for short lowercase names.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z]{1,6}").expect("Invalid regex")
}

/// Strategy for SPARQL-ish query text.
pub fn query_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("SELECT * WHERE { ?s ?p ?o }".to_string()),
        name_strategy().prop_map(|n| format!("SELECT ?{n} WHERE {{ ?{n} ?p ?o }} LIMIT 10")),
        Just(String::new()),
    ]
}

/// Contents of the `backends` and `examples` tables of one store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogContents {
    /// Backend name to URL slug.
    pub backends: BTreeMap<String, String>,
    /// (backend name, example name) to query.
    pub examples: BTreeMap<(String, String), String>,
}

impl CatalogContents {
    /// Inserts the contents into `store`, parents first.
    ///
    /// Returns the assigned backend identifiers by name.
    pub fn seed(&self, store: &mut dyn StoreAdapter) -> BTreeMap<String, StorageId> {
        let mut ids = BTreeMap::new();
        for (name, slug) in &self.backends {
            let id = store
                .insert(catalog::BACKENDS, &backend_row(name, slug))
                .expect("Failed to insert backend");
            ids.insert(name.clone(), id);
        }
        for ((backend, name), query) in &self.examples {
            let backend_id = ids[backend];
            store
                .insert(catalog::EXAMPLES, &example_row(backend_id, name, query))
                .expect("Failed to insert example");
        }
        ids
    }

    /// Number of rows the contents occupy.
    pub fn len(&self) -> usize {
        self.backends.len() + self.examples.len()
    }

    /// Returns true if there are no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Strategy for catalog contents with up to `max_backends` backends and up
/// to `max_examples` examples per backend.
pub fn catalog_contents_strategy(
    max_backends: usize,
    max_examples: usize,
) -> impl Strategy<Value = CatalogContents> {
    prop::collection::btree_map(name_strategy(), name_strategy(), 0..=max_backends)
        .prop_flat_map(move |backends| {
            let names: Vec<String> = backends.keys().cloned().collect();
            let examples = if names.is_empty() {
                Just(BTreeMap::new()).boxed()
            } else {
                prop::collection::btree_map(
                    (prop::sample::select(names), name_strategy()),
                    query_strategy(),
                    0..=max_examples * backends.len(),
                )
                .boxed()
            };
            (Just(backends), examples)
        })
        .prop_map(|(backends, examples)| CatalogContents { backends, examples })
}

/// Strategy for a pair of overlapping contents (source, destination).
///
/// Both sides draw from the same small name space, so keys collide often
/// enough to exercise updates, keeps and deletes.
pub fn overlapping_pair_strategy() -> impl Strategy<Value = (CatalogContents, CatalogContents)> {
    (catalog_contents_strategy(4, 3), catalog_contents_strategy(4, 3))
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 128,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::catalog_store;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn contents_seed_cleanly(contents in catalog_contents_strategy(4, 3)) {
            let mut store = catalog_store();
            let ids = contents.seed(&mut store);
            prop_assert_eq!(ids.len(), contents.backends.len());
            prop_assert_eq!(store.count(catalog::EXAMPLES).unwrap(), contents.examples.len());
        }
    }
}
