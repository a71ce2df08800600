//! Domain model: the entity types queries are written against.
//!
//! The compiler never owns mapping metadata. It asks a [`DomainModel`] to
//! resolve entity names and attributes, and renders table and column names
//! from what the model reports. [`StaticDomainModel`] is the in-memory
//! implementation, built fluently or loaded from TOML:
//!
//! ```toml
//! [entities.Person]
//! table = "person"
//! id = "id"
//!
//! [entities.Person.attributes.id]
//! kind = "basic"
//! type = "long"
//!
//! [entities.Person.attributes.address]
//! kind = "to_one"
//! target = "Address"
//! join_column = "address_id"
//! ```

use std::fmt;
use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::sqm::types::SqmType;

/// Errors raised while building or loading a domain model.
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Failed to read domain model: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse domain model: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Entity '{entity}' declares id attribute '{id}' which is not a basic attribute")]
    InvalidId { entity: String, id: String },

    #[error("Attribute '{entity}.{attribute}' targets unknown entity '{target}'")]
    UnknownTarget {
        entity: String,
        attribute: String,
        target: String,
    },
}

/// Whether a path leads to a single value or a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Cardinality {
    Single,
    Collection,
}

/// A persistent attribute of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Attribute {
    Basic {
        #[serde(rename = "type")]
        ty: SqmType,
        #[serde(default)]
        column: String,
        #[serde(default)]
        nullable: bool,
    },
    ToOne {
        target: String,
        join_column: String,
        #[serde(default = "default_optional")]
        optional: bool,
    },
    ToMany {
        target: String,
        key_column: String,
    },
}

fn default_optional() -> bool {
    true
}

impl Attribute {
    pub fn ty(&self) -> SqmType {
        match self {
            Attribute::Basic { ty, .. } => ty.clone(),
            Attribute::ToOne { target, .. } | Attribute::ToMany { target, .. } => {
                SqmType::Entity(target.clone())
            }
        }
    }

    pub fn nullable(&self) -> bool {
        match self {
            Attribute::Basic { nullable, .. } => *nullable,
            Attribute::ToOne { optional, .. } => *optional,
            Attribute::ToMany { .. } => false,
        }
    }

    pub fn cardinality(&self) -> Cardinality {
        match self {
            Attribute::ToMany { .. } => Cardinality::Collection,
            _ => Cardinality::Single,
        }
    }

    /// Target entity of an association.
    pub fn target(&self) -> Option<&str> {
        match self {
            Attribute::Basic { .. } => None,
            Attribute::ToOne { target, .. } | Attribute::ToMany { target, .. } => Some(target),
        }
    }

    pub fn is_basic(&self) -> bool {
        matches!(self, Attribute::Basic { .. })
    }

    /// Column on the owning table holding this attribute's value, if any.
    pub fn column(&self) -> Option<&str> {
        match self {
            Attribute::Basic { column, .. } => Some(column),
            Attribute::ToOne { join_column, .. } => Some(join_column),
            Attribute::ToMany { .. } => None,
        }
    }
}

/// An entity type: a table plus named attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityType {
    #[serde(skip)]
    pub name: String,
    pub table: String,
    #[serde(default = "default_id")]
    pub id: String,
    #[serde(default)]
    pub attributes: IndexMap<String, Attribute>,
}

fn default_id() -> String {
    "id".to_string()
}

/// What a dotted path resolves to.
#[derive(Debug, Clone, PartialEq)]
pub struct PathType {
    pub ty: SqmType,
    pub nullable: bool,
    pub cardinality: Cardinality,
}

impl EntityType {
    pub fn new(name: &str, table: &str) -> Self {
        Self {
            name: name.to_string(),
            table: table.to_string(),
            id: default_id(),
            attributes: IndexMap::new(),
        }
    }

    /// Declare the identifier attribute.
    pub fn id(mut self, name: &str, ty: SqmType) -> Self {
        self.id = name.to_string();
        self.attributes.insert(
            name.to_string(),
            Attribute::Basic {
                ty,
                column: name.to_string(),
                nullable: false,
            },
        );
        self
    }

    pub fn basic(self, name: &str, ty: SqmType) -> Self {
        self.column(name, name, ty, true)
    }

    pub fn column(mut self, name: &str, column: &str, ty: SqmType, nullable: bool) -> Self {
        self.attributes.insert(
            name.to_string(),
            Attribute::Basic {
                ty,
                column: column.to_string(),
                nullable,
            },
        );
        self
    }

    pub fn to_one(mut self, name: &str, target: &str, join_column: &str) -> Self {
        self.attributes.insert(
            name.to_string(),
            Attribute::ToOne {
                target: target.to_string(),
                join_column: join_column.to_string(),
                optional: true,
            },
        );
        self
    }

    pub fn to_many(mut self, name: &str, target: &str, key_column: &str) -> Self {
        self.attributes.insert(
            name.to_string(),
            Attribute::ToMany {
                target: target.to_string(),
                key_column: key_column.to_string(),
            },
        );
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    pub fn id_column(&self) -> &str {
        self.attributes
            .get(&self.id)
            .and_then(Attribute::column)
            .unwrap_or(&self.id)
    }

    pub fn id_type(&self) -> SqmType {
        self.attributes
            .get(&self.id)
            .map(Attribute::ty)
            .unwrap_or(SqmType::Long)
    }

    /// Columns selected when the entity itself is selected, in declaration order.
    pub fn columns(&self) -> Vec<&str> {
        self.attributes.values().filter_map(Attribute::column).collect()
    }

    /// Resolve a dotted attribute path starting at this entity.
    pub fn resolve(&self, model: &dyn DomainModel, path: &str) -> Option<PathType> {
        let mut current = self;
        let mut segments = path.split('.').peekable();
        while let Some(segment) = segments.next() {
            let attribute = current.attribute(segment)?;
            if segments.peek().is_none() {
                return Some(PathType {
                    ty: attribute.ty(),
                    nullable: attribute.nullable(),
                    cardinality: attribute.cardinality(),
                });
            }
            current = model.entity(attribute.target()?)?;
        }
        None
    }
}

/// Source of entity metadata for query compilation.
pub trait DomainModel: fmt::Debug + Send + Sync {
    /// Look up an entity by name.
    fn entity(&self, name: &str) -> Option<&EntityType>;

    /// Names of all known entities.
    fn entity_names(&self) -> Vec<&str>;

    /// Resolve `entity.path` to its type, nullability and cardinality.
    fn resolve_path(&self, entity: &str, path: &str) -> Option<PathType>;
}

/// An in-memory domain model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaticDomainModel {
    #[serde(default)]
    entities: IndexMap<String, EntityType>,
}

impl StaticDomainModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity, replacing any previous entity of the same name.
    pub fn with_entity(mut self, entity: EntityType) -> Self {
        self.entities.insert(entity.name.clone(), entity);
        self
    }

    /// Parse a TOML domain model and validate its references.
    pub fn from_toml_str(content: &str) -> Result<Self, DomainError> {
        let mut model: StaticDomainModel = toml::from_str(content)?;
        for (name, entity) in model.entities.iter_mut() {
            entity.name = name.clone();
            for (attribute_name, attribute) in entity.attributes.iter_mut() {
                if let Attribute::Basic { column, .. } = attribute {
                    if column.is_empty() {
                        *column = attribute_name.clone();
                    }
                }
            }
        }
        model.validate()?;
        Ok(model)
    }

    pub fn from_file(path: &Path) -> Result<Self, DomainError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Check that ids are basic attributes and association targets exist.
    pub fn validate(&self) -> Result<(), DomainError> {
        for entity in self.entities.values() {
            match entity.attribute(&entity.id) {
                Some(attribute) if attribute.is_basic() => {}
                _ => {
                    return Err(DomainError::InvalidId {
                        entity: entity.name.clone(),
                        id: entity.id.clone(),
                    })
                }
            }
            for (name, attribute) in &entity.attributes {
                if let Some(target) = attribute.target() {
                    if !self.entities.contains_key(target) {
                        return Err(DomainError::UnknownTarget {
                            entity: entity.name.clone(),
                            attribute: name.clone(),
                            target: target.to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

impl DomainModel for StaticDomainModel {
    fn entity(&self, name: &str) -> Option<&EntityType> {
        self.entities.get(name)
    }

    fn entity_names(&self) -> Vec<&str> {
        self.entities.keys().map(String::as_str).collect()
    }

    fn resolve_path(&self, entity: &str, path: &str) -> Option<PathType> {
        self.entity(entity)?.resolve(self, path)
    }
}
