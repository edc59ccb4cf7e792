// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Sub-resource declarations: which collections hang below an instance.

use std::collections::{BTreeMap, HashMap};

use crate::resource::ResourceType;

/// The sub-resources declared for one resource type, by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDefinition {
    resource_type: ResourceType,
    sub_resources: BTreeMap<String, ResourceType>,
}

impl ResourceDefinition {
    /// A definition without sub-resources.
    pub fn new(resource_type: ResourceType) -> Self {
        Self {
            resource_type,
            sub_resources: BTreeMap::new(),
        }
    }

    /// Declare a sub-resource reachable under `name`.
    ///
    /// Names may contain `/`; field paths are matched against the longest
    /// declared name.
    pub fn with_sub_resource(mut self, name: impl Into<String>, resource_type: ResourceType) -> Self {
        self.sub_resources.insert(name.into(), resource_type);
        self
    }

    /// Type this definition belongs to.
    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    /// Declared sub-resources.
    pub fn sub_resources(&self) -> &BTreeMap<String, ResourceType> {
        &self.sub_resources
    }
}

/// Resource definitions for every type the executor can navigate.
#[derive(Debug, Clone, Default)]
pub struct ResourceDefinitions {
    definitions: HashMap<ResourceType, ResourceDefinition>,
}

impl ResourceDefinitions {
    /// The built-in cluster hierarchy, with sub-resources named after the
    /// collection they list.
    pub fn builtin() -> Self {
        use ResourceType::*;

        let tree: [(ResourceType, &[ResourceType]); 5] = [
            (Cluster, &[Service, Host, Configuration, Request]),
            (Service, &[Component]),
            (Component, &[HostComponent]),
            (Host, &[HostComponent]),
            (Request, &[Task]),
        ];

        let mut definitions = Self::default();
        for (parent, children) in tree {
            let definition = children
                .iter()
                .fold(ResourceDefinition::new(parent), |d, child| {
                    d.with_sub_resource(child.collection_name(), *child)
                });
            definitions = definitions.with_definition(definition);
        }
        definitions
    }

    /// Add or replace the definition of its type.
    pub fn with_definition(mut self, definition: ResourceDefinition) -> Self {
        self.definitions.insert(definition.resource_type(), definition);
        self
    }

    /// Declared sub-resources of `resource_type`, empty when none.
    pub fn sub_resources(&self, resource_type: ResourceType) -> BTreeMap<String, ResourceType> {
        self.definitions
            .get(&resource_type)
            .map(|d| d.sub_resources.clone())
            .unwrap_or_default()
    }
}
