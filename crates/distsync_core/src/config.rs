//! Run and store configuration.

use crate::error::{CoreError, CoreResult};
use crate::plan::Mode;
use crate::schema::Schema;
use std::path::{Path, PathBuf};

/// Default path of the working (source) store.
pub const DEFAULT_SOURCE_PATH: &str = "db.store";
/// Default path of the distribution store.
pub const DEFAULT_DIST_PATH: &str = "db.store.dist";

/// Options for one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Entity types to reconcile, in any order.
    pub entities: Vec<String>,

    /// Clear each type in the destination and insert the source records.
    pub reset: bool,

    /// Delete destination records absent from the source (update mode only).
    pub delete: bool,

    /// Let the selector narrow the candidates of eligible types.
    pub select: bool,

    /// Build and report the plan without touching the destination.
    pub dry_run: bool,
}

impl RunOptions {
    /// Creates options with no entity types and update mode.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entity type.
    #[must_use]
    pub fn entity(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.entities.contains(&name) {
            self.entities.push(name);
        }
        self
    }

    /// Adds every entity type of `schema`.
    #[must_use]
    pub fn all(mut self, schema: &Schema) -> Self {
        for entity in schema.entities() {
            self = self.entity(entity.name());
        }
        self
    }

    /// Sets reset mode.
    #[must_use]
    pub const fn reset(mut self, value: bool) -> Self {
        self.reset = value;
        self
    }

    /// Sets whether destination-only records are deleted.
    #[must_use]
    pub const fn delete(mut self, value: bool) -> Self {
        self.delete = value;
        self
    }

    /// Sets interactive selection.
    #[must_use]
    pub const fn select(mut self, value: bool) -> Self {
        self.select = value;
        self
    }

    /// Sets dry-run.
    #[must_use]
    pub const fn dry_run(mut self, value: bool) -> Self {
        self.dry_run = value;
        self
    }

    /// Checks the options against `schema` and returns the run mode.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no entity type is requested, delete
    /// is combined with reset, or selection is requested without a type that
    /// supports it. Returns [`CoreError::UnknownEntity`] for names outside the
    /// schema.
    pub fn validate(&self, schema: &Schema) -> CoreResult<Mode> {
        if self.entities.is_empty() {
            return Err(CoreError::config(
                "no entity types selected; use --backends, --examples, --saved or --all",
            ));
        }
        for name in &self.entities {
            schema.require(name)?;
        }
        if self.reset && self.delete {
            return Err(CoreError::config(
                "--delete only applies to update mode and cannot be combined with --reset",
            ));
        }
        if self.select && self.selectable(schema).next().is_none() {
            return Err(CoreError::config(
                "--select requires an entity type that supports selection (e.g. --backends or --examples)",
            ));
        }
        Ok(if self.reset {
            Mode::Reset
        } else {
            Mode::Update {
                delete: self.delete,
            }
        })
    }

    /// Requested types that the selector may narrow.
    ///
    /// User-generated content is never offered for selection.
    pub fn selectable<'a>(&'a self, schema: &'a Schema) -> impl Iterator<Item = &'a str> + 'a {
        self.entities
            .iter()
            .filter(move |name| schema.get(name).is_some_and(|e| !e.is_user_content()))
            .map(String::as_str)
    }
}

/// Direction of a run between the working and distribution stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Working store to distribution store.
    Export,
    /// Distribution store to working store.
    Import,
}

impl Direction {
    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Export => "export",
            Direction::Import => "import",
        }
    }
}

/// Locations of the two stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// The working store.
    pub source_path: PathBuf,
    /// The distribution store.
    pub dist_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            source_path: PathBuf::from(DEFAULT_SOURCE_PATH),
            dist_path: PathBuf::from(DEFAULT_DIST_PATH),
        }
    }
}

impl StoreConfig {
    /// Creates a configuration with default paths.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the working store path.
    #[must_use]
    pub fn source_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_path = path.into();
        self
    }

    /// Sets the distribution store path.
    #[must_use]
    pub fn dist_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.dist_path = path.into();
        self
    }

    /// `(read from, write to)` for a run in `direction`.
    pub fn endpoints(&self, direction: Direction) -> (&Path, &Path) {
        match direction {
            Direction::Export => (&self.source_path, &self.dist_path),
            Direction::Import => (&self.dist_path, &self.source_path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;

    #[test]
    fn builder_pattern() {
        let options = RunOptions::new()
            .entity("backends")
            .entity("backends")
            .delete(true)
            .dry_run(true);
        assert_eq!(options.entities, vec!["backends".to_string()]);
        assert!(options.delete);
        assert!(options.dry_run);
        assert!(!options.reset);
    }

    #[test]
    fn validate_returns_mode() {
        let schema = catalog::schema().unwrap();
        let update = RunOptions::new().entity("backends").delete(true);
        assert_eq!(update.validate(&schema).unwrap(), Mode::Update { delete: true });
        let reset = RunOptions::new().all(&schema).reset(true);
        assert_eq!(reset.validate(&schema).unwrap(), Mode::Reset);
    }

    #[test]
    fn validate_rejects_bad_combinations() {
        let schema = catalog::schema().unwrap();
        assert!(RunOptions::new().validate(&schema).unwrap_err().is_configuration());
        assert!(RunOptions::new()
            .entity("backends")
            .reset(true)
            .delete(true)
            .validate(&schema)
            .is_err());
        assert!(matches!(
            RunOptions::new().entity("widgets").validate(&schema),
            Err(CoreError::UnknownEntity { .. })
        ));
    }

    #[test]
    fn select_needs_an_eligible_type() {
        let schema = catalog::schema().unwrap();
        let saved_only = RunOptions::new().entity(catalog::SAVED_QUERIES).select(true);
        assert!(saved_only.validate(&schema).is_err());

        let with_examples = saved_only.entity(catalog::EXAMPLES);
        assert!(with_examples.validate(&schema).is_ok());
        assert_eq!(
            with_examples.selectable(&schema).collect::<Vec<_>>(),
            vec![catalog::EXAMPLES]
        );
    }

    #[test]
    fn endpoints_follow_direction() {
        let stores = StoreConfig::new().source_path("work.store");
        assert_eq!(
            stores.endpoints(Direction::Export),
            (Path::new("work.store"), Path::new(DEFAULT_DIST_PATH))
        );
        assert_eq!(
            stores.endpoints(Direction::Import),
            (Path::new(DEFAULT_DIST_PATH), Path::new("work.store"))
        );
    }
}
