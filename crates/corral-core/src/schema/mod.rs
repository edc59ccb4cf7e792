// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Per-type schemas and the validated registry holding them.
//!
//! Schemas come from a [`SchemaSource`] at start-up and are read-only
//! afterwards. [`SchemaRegistry::new`] rejects any source that leaves a type
//! without a schema, or a schema without a key property for the type itself
//! or one of its ancestors, so lookups never fail at request time.

mod defaults;
mod json;

use std::collections::{BTreeMap, BTreeSet, HashMap};

pub use self::defaults::BuiltinSchemaSource;
pub use self::json::JsonSchemaSource;

use crate::error::SchemaError;
use crate::resource::{PropertyId, ResourceType};

/// Supplies schema definitions at start-up.
pub trait SchemaSource: Send + Sync {
    /// Load one schema per resource type.
    fn load_schemas(&self) -> Result<HashMap<ResourceType, Schema>, SchemaError>;
}

/// Declared properties and identity of one resource type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    resource_type: ResourceType,
    key_property_ids: BTreeMap<ResourceType, PropertyId>,
    property_ids: BTreeSet<PropertyId>,
    categories: BTreeMap<String, BTreeSet<String>>,
}

impl Schema {
    /// Start building a schema for `resource_type`.
    pub fn builder(resource_type: ResourceType) -> SchemaBuilder {
        SchemaBuilder {
            resource_type,
            key_property_ids: BTreeMap::new(),
            property_ids: BTreeSet::new(),
        }
    }

    /// Type this schema describes.
    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    /// Property identifying resources of `resource_type` from this type's
    /// point of view. Defined for the type itself and each of its ancestors.
    pub fn key_property_id(&self, resource_type: ResourceType) -> Option<&PropertyId> {
        self.key_property_ids.get(&resource_type)
    }

    /// Key property of the type itself.
    pub fn own_key_property_id(&self) -> Option<&PropertyId> {
        self.key_property_id(self.resource_type)
    }

    /// All key properties, by the type they identify.
    pub fn key_property_ids(&self) -> &BTreeMap<ResourceType, PropertyId> {
        &self.key_property_ids
    }

    /// Distinct key properties: ancestors outermost first, then the type itself.
    pub fn identity_property_ids(&self) -> Vec<PropertyId> {
        let mut ids: Vec<PropertyId> = Vec::new();
        let chain = self
            .resource_type
            .ancestors()
            .iter()
            .chain(std::iter::once(&self.resource_type));
        for ty in chain {
            if let Some(id) = self.key_property_ids.get(ty)
                && !ids.contains(id)
            {
                ids.push(id.clone());
            }
        }
        ids
    }

    /// Every declared property, key properties included.
    pub fn property_ids(&self) -> &BTreeSet<PropertyId> {
        &self.property_ids
    }

    /// Declared categories and the property names directly under each.
    pub fn categories(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.categories
    }

    /// Whether `category` is declared, directly or as the parent of a nested
    /// category (`metrics` when `metrics/cpu` is declared).
    pub fn has_category(&self, category: &str) -> bool {
        self.categories.keys().any(|declared| {
            declared == category
                || declared
                    .strip_prefix(category)
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }

    /// Properties declared under `category` or any category nested in it.
    pub fn category_property_ids(&self, category: &str) -> Vec<PropertyId> {
        let scope = PropertyId::uncategorized(category);
        self.property_ids
            .iter()
            .filter(|id| scope.covers(id))
            .cloned()
            .collect()
    }

    /// The declared form of `property_id` (carrying its temporal flag).
    pub fn declared_property(&self, property_id: &PropertyId) -> Option<&PropertyId> {
        self.property_ids.get(property_id)
    }
}

/// Builder for [`Schema`].
#[derive(Debug)]
pub struct SchemaBuilder {
    resource_type: ResourceType,
    key_property_ids: BTreeMap<ResourceType, PropertyId>,
    property_ids: BTreeSet<PropertyId>,
}

impl SchemaBuilder {
    /// Declare the key property identifying `resource_type`.
    pub fn key_property(mut self, resource_type: ResourceType, path: &str) -> Self {
        let id = PropertyId::parse(path);
        self.property_ids.insert(id.clone());
        self.key_property_ids.insert(resource_type, id);
        self
    }

    /// Declare a property by path.
    pub fn property(mut self, path: &str) -> Self {
        self.property_ids.insert(PropertyId::parse(path));
        self
    }

    /// Declare a temporal property by path.
    pub fn temporal_property(mut self, path: &str) -> Self {
        self.property_ids
            .replace(PropertyId::parse(path).with_temporal(true));
        self
    }

    /// Finish the schema, deriving its categories.
    pub fn build(self) -> Schema {
        let mut categories: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for id in &self.property_ids {
            if let Some(category) = id.category() {
                categories
                    .entry(category.to_string())
                    .or_default()
                    .insert(id.name().to_string());
            }
        }

        Schema {
            resource_type: self.resource_type,
            key_property_ids: self.key_property_ids,
            property_ids: self.property_ids,
            categories,
        }
    }
}

/// One validated schema per resource type.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    schemas: Vec<Schema>,
}

impl SchemaRegistry {
    /// Validate and index a full set of schemas.
    pub fn new(mut schemas: HashMap<ResourceType, Schema>) -> Result<Self, SchemaError> {
        let mut ordered = Vec::with_capacity(ResourceType::ALL.len());

        for ty in ResourceType::ALL {
            let schema = schemas.remove(&ty).ok_or(SchemaError::MissingSchema(ty))?;
            if schema.resource_type() != ty {
                return Err(SchemaError::MismatchedSchema {
                    registered: ty,
                    declared: schema.resource_type(),
                });
            }
            for identified in ty.ancestors().iter().chain(std::iter::once(&ty)) {
                if schema.key_property_id(*identified).is_none() {
                    return Err(SchemaError::MissingKeyProperty {
                        resource_type: ty,
                        ancestor: *identified,
                    });
                }
            }
            ordered.push(schema);
        }

        Ok(Self { schemas: ordered })
    }

    /// Load and validate the schemas of `source`.
    pub fn from_source(source: &dyn SchemaSource) -> Result<Self, SchemaError> {
        Self::new(source.load_schemas()?)
    }

    /// The built-in schemas.
    pub fn builtin() -> Result<Self, SchemaError> {
        Self::from_source(&BuiltinSchemaSource)
    }

    /// Schema of `resource_type`.
    pub fn schema(&self, resource_type: ResourceType) -> &Schema {
        &self.schemas[resource_type.index()]
    }

    /// Copy of this registry with one schema replaced, validated again.
    pub fn with_schema(&self, schema: Schema) -> Result<Self, SchemaError> {
        let mut schemas: HashMap<ResourceType, Schema> = self
            .schemas
            .iter()
            .map(|s| (s.resource_type(), s.clone()))
            .collect();
        schemas.insert(schema.resource_type(), schema);
        Self::new(schemas)
    }
}
