//! Built-in entity types: endpoint backends, their query examples, and saved
//! queries.

use crate::error::CoreResult;
use crate::schema::{EntityType, Schema};

/// SPARQL endpoint configurations.
pub const BACKENDS: &str = "backends";
/// Example queries, each belonging to one backend.
pub const EXAMPLES: &str = "examples";
/// Queries saved by users under a short identifier.
pub const SAVED_QUERIES: &str = "saved_queries";

/// Tables and their natural-key unique constraints, for creating stores.
pub const TABLES: &[(&str, &[&str])] = &[
    (BACKENDS, &["name"]),
    (EXAMPLES, &["backend", "name"]),
    (SAVED_QUERIES, &["short_id"]),
];

/// The `backends` entity type.
pub fn backends() -> EntityType {
    EntityType::new(BACKENDS)
        .text("name")
        .text("engine")
        .text("slug")
        .boolean("is_default")
        .text("sort_key")
        .text("url")
        .text("api_token")
        .text("prefixes")
        .text("subject_completion")
        .text("predicate_completion_context_sensitive")
        .text("predicate_completion_context_insensitive")
        .text("object_completion_context_sensitive")
        .text("object_completion_context_insensitive")
        .text("hover")
        .natural_key(&["name"])
        .summary(&["slug", "name"])
}

/// The `examples` entity type.
pub fn examples() -> EntityType {
    EntityType::new(EXAMPLES)
        .reference("backend", BACKENDS)
        .text("name")
        .text("query")
        .text("sort_key")
        .natural_key(&["backend", "name"])
        .summary(&["name", "backend"])
}

/// The `saved_queries` entity type.
pub fn saved_queries() -> EntityType {
    EntityType::new(SAVED_QUERIES)
        .text("short_id")
        .text("content")
        .natural_key(&["short_id"])
        .user_content()
}

/// The full catalog schema in dependency order.
///
/// # Errors
///
/// Only fails if the built-in descriptions are inconsistent.
pub fn schema() -> CoreResult<Schema> {
    Schema::new()
        .register(backends())?
        .register(examples())?
        .register(saved_queries())
}
