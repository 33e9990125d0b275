//! Entity type descriptions and the schema that orders them.
//!
//! An [`EntityType`] is data, not code: the differ, the key rewriter and the
//! plan builder are written once and parameterized by it.

use crate::error::{CoreError, CoreResult};
use std::collections::HashSet;

/// Semantic kind of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// UTF-8 text.
    Text,
    /// Signed integer.
    Integer,
    /// Boolean flag.
    Boolean,
    /// Reference to another entity type's row (foreign key).
    Identifier,
}

/// One field of an entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Column name.
    pub name: String,
    /// Semantic kind.
    pub kind: FieldKind,
}

/// A field that refers to another entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    /// The referencing field on this entity type.
    pub field: String,
    /// Name of the referenced (parent) entity type.
    pub references: String,
}

/// Static description of one entity type.
///
/// # Example
///
/// ```
/// use distsync_core::EntityType;
///
/// let examples = EntityType::new("examples")
///     .reference("backend", "backends")
///     .text("name")
///     .text("query")
///     .natural_key(&["backend", "name"]);
/// assert_eq!(examples.parents().collect::<Vec<_>>(), vec!["backends"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityType {
    name: String,
    fields: Vec<FieldDescriptor>,
    natural_key: Vec<String>,
    foreign_keys: Vec<ForeignKey>,
    summary_fields: Vec<String>,
    user_content: bool,
}

impl EntityType {
    /// Starts describing an entity type stored in table `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            natural_key: Vec::new(),
            foreign_keys: Vec::new(),
            summary_fields: Vec::new(),
            user_content: false,
        }
    }

    /// Adds a field of the given kind.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldDescriptor {
            name: name.into(),
            kind,
        });
        self
    }

    /// Adds a text field.
    #[must_use]
    pub fn text(self, name: impl Into<String>) -> Self {
        self.field(name, FieldKind::Text)
    }

    /// Adds an integer field.
    #[must_use]
    pub fn integer(self, name: impl Into<String>) -> Self {
        self.field(name, FieldKind::Integer)
    }

    /// Adds a boolean field.
    #[must_use]
    pub fn boolean(self, name: impl Into<String>) -> Self {
        self.field(name, FieldKind::Boolean)
    }

    /// Adds a foreign-key field referring to entity type `parent`.
    #[must_use]
    pub fn reference(mut self, name: impl Into<String>, parent: impl Into<String>) -> Self {
        let name = name.into();
        self.foreign_keys.push(ForeignKey {
            field: name.clone(),
            references: parent.into(),
        });
        self.field(name, FieldKind::Identifier)
    }

    /// Sets the natural key.
    #[must_use]
    pub fn natural_key(mut self, fields: &[&str]) -> Self {
        self.natural_key = fields.iter().map(|f| (*f).to_string()).collect();
        self
    }

    /// Sets the fields used to describe a record in summaries.
    ///
    /// The first field is shown as-is, the rest in parentheses:
    /// `slug (name)`. Defaults to the natural key.
    #[must_use]
    pub fn summary(mut self, fields: &[&str]) -> Self {
        self.summary_fields = fields.iter().map(|f| (*f).to_string()).collect();
        self
    }

    /// Marks the type as holding user-generated content.
    #[must_use]
    pub fn user_content(mut self) -> Self {
        self.user_content = true;
        self
    }

    /// Table / type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All fields in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Looks up a field by name.
    pub fn field_named(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Natural-key field names, in key order.
    pub fn natural_key_fields(&self) -> &[String] {
        &self.natural_key
    }

    /// Returns true if `field` is part of the natural key.
    pub fn is_key_field(&self, field: &str) -> bool {
        self.natural_key.iter().any(|k| k == field)
    }

    /// Foreign keys in declaration order.
    pub fn foreign_keys(&self) -> &[ForeignKey] {
        &self.foreign_keys
    }

    /// The foreign key declared on `field`, if any.
    pub fn foreign_key(&self, field: &str) -> Option<&ForeignKey> {
        self.foreign_keys.iter().find(|fk| fk.field == field)
    }

    /// Names of the referenced entity types (may repeat).
    pub fn parents(&self) -> impl Iterator<Item = &str> {
        self.foreign_keys.iter().map(|fk| fk.references.as_str())
    }

    /// Fields used to describe a record in summaries.
    pub fn summary_fields(&self) -> &[String] {
        if self.summary_fields.is_empty() {
            &self.natural_key
        } else {
            &self.summary_fields
        }
    }

    /// Returns true if the type holds user-generated content.
    pub fn is_user_content(&self) -> bool {
        self.user_content
    }

    fn validate(&self) -> CoreResult<()> {
        if self.natural_key.is_empty() {
            return Err(CoreError::schema(format!(
                "{} has no natural key",
                self.name
            )));
        }
        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(CoreError::schema(format!(
                    "{} declares field {} twice",
                    self.name, field.name
                )));
            }
        }
        for key in self.natural_key.iter().chain(&self.summary_fields) {
            if self.field_named(key).is_none() {
                return Err(CoreError::schema(format!(
                    "{} refers to undeclared field {}",
                    self.name, key
                )));
            }
        }
        for field in &self.fields {
            let is_fk = self.foreign_key(&field.name).is_some();
            if is_fk != (field.kind == FieldKind::Identifier) {
                return Err(CoreError::schema(format!(
                    "{}.{}: identifier fields must be declared with reference()",
                    self.name, field.name
                )));
            }
        }
        Ok(())
    }
}

/// An ordered set of entity types.
///
/// Registration order is dependency order: a type may only reference types
/// registered before it, so parents always come first and cycles are
/// impossible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    entities: Vec<EntityType>,
}

impl Schema {
    /// Creates an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an entity type.
    ///
    /// # Errors
    ///
    /// Returns a schema error if the name is taken, the type is malformed, or
    /// it references a type that is not registered yet.
    pub fn register(mut self, entity: EntityType) -> CoreResult<Self> {
        entity.validate()?;
        if self.get(entity.name()).is_some() {
            return Err(CoreError::schema(format!(
                "entity type {} registered twice",
                entity.name()
            )));
        }
        for parent in entity.parents() {
            if self.get(parent).is_none() {
                return Err(CoreError::schema(format!(
                    "{} references {} which must be registered first",
                    entity.name(),
                    parent
                )));
            }
        }
        self.entities.push(entity);
        Ok(self)
    }

    /// Looks up an entity type by name.
    pub fn get(&self, name: &str) -> Option<&EntityType> {
        self.entities.iter().find(|e| e.name() == name)
    }

    /// Looks up an entity type by name, failing if unknown.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownEntity`] if the name is not registered.
    pub fn require(&self, name: &str) -> CoreResult<&EntityType> {
        self.get(name).ok_or_else(|| CoreError::UnknownEntity {
            name: name.to_string(),
        })
    }

    /// All entity types in dependency order.
    pub fn entities(&self) -> &[EntityType] {
        &self.entities
    }

    /// The requested entity types, sorted into dependency order.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownEntity`] for names not in the schema.
    pub fn dependency_order<S: AsRef<str>>(&self, names: &[S]) -> CoreResult<Vec<&EntityType>> {
        for name in names {
            self.require(name.as_ref())?;
        }
        Ok(self
            .entities
            .iter()
            .filter(|e| names.iter().any(|n| n.as_ref() == e.name()))
            .collect())
    }

    /// The requested types plus every type they transitively reference,
    /// in dependency order.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownEntity`] for names not in the schema.
    pub fn with_ancestors<S: AsRef<str>>(&self, names: &[S]) -> CoreResult<Vec<&EntityType>> {
        let mut needed: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = Vec::new();
        for name in names {
            stack.push(self.require(name.as_ref())?.name());
        }
        while let Some(name) = stack.pop() {
            if needed.insert(name) {
                let entity = self.require(name)?;
                stack.extend(entity.parents());
            }
        }
        Ok(self
            .entities
            .iter()
            .filter(|e| needed.contains(e.name()))
            .collect())
    }

    /// Types that directly reference `name`.
    pub fn dependents<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a EntityType> + 'a {
        self.entities
            .iter()
            .filter(move |e| e.parents().any(|p| p == name))
    }
}
