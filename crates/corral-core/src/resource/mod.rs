// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Resources and their identifiers.

mod property;
mod types;

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

pub use self::property::PropertyId;
pub use self::types::ResourceType;

/// A typed bag of properties, grouped by category.
///
/// The catch-all category is stored under `""`. Properties are set
/// incrementally by the primary provider and then by property providers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resource {
    #[serde(rename = "type")]
    resource_type: ResourceType,
    #[serde(rename = "properties")]
    categories: BTreeMap<String, BTreeMap<String, Value>>,
}

impl Resource {
    /// Create an empty resource.
    pub fn new(resource_type: ResourceType) -> Self {
        Self {
            resource_type,
            categories: BTreeMap::new(),
        }
    }

    /// Type of the resource.
    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    /// Set a property, replacing any previous value.
    pub fn set_property(&mut self, property_id: &PropertyId, value: impl Into<Value>) {
        self.categories
            .entry(property_id.category().unwrap_or_default().to_string())
            .or_default()
            .insert(property_id.name().to_string(), value.into());
    }

    /// Set a property only if it has no value yet. Returns whether it was set.
    pub fn set_property_if_absent(&mut self, property_id: &PropertyId, value: impl Into<Value>) -> bool {
        if self.has_property(property_id) {
            return false;
        }
        self.set_property(property_id, value);
        true
    }

    /// Value of a property.
    pub fn property_value(&self, property_id: &PropertyId) -> Option<&Value> {
        self.categories
            .get(property_id.category().unwrap_or_default())
            .and_then(|properties| properties.get(property_id.name()))
    }

    /// Value of a property rendered as an identity string.
    pub fn property_string(&self, property_id: &PropertyId) -> Option<String> {
        self.property_value(property_id).and_then(value_to_key)
    }

    /// Whether a property has a value.
    pub fn has_property(&self, property_id: &PropertyId) -> bool {
        self.property_value(property_id).is_some()
    }

    /// All properties with their ids, ordered by category then name.
    pub fn properties(&self) -> impl Iterator<Item = (PropertyId, &Value)> + '_ {
        self.categories.iter().flat_map(|(category, properties)| {
            properties
                .iter()
                .map(move |(name, value)| (PropertyId::new(name.as_str(), category.as_str()), value))
        })
    }

    /// Raw category map.
    pub fn categories(&self) -> &BTreeMap<String, BTreeMap<String, Value>> {
        &self.categories
    }

    /// Number of properties set.
    pub fn property_count(&self) -> usize {
        self.categories.values().map(BTreeMap::len).sum()
    }

    /// Keep only the properties for which `keep` returns true.
    pub fn retain_properties(&mut self, mut keep: impl FnMut(&PropertyId) -> bool) {
        for (category, properties) in self.categories.iter_mut() {
            properties.retain(|name, _| keep(&PropertyId::new(name.as_str(), category.as_str())));
        }
        self.categories.retain(|_, properties| !properties.is_empty());
    }
}

/// Render a scalar value as an identity string: strings unquoted, numbers
/// and booleans in their JSON form. Other values have no identity form.
pub fn value_to_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
