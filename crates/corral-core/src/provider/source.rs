// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Property provider adapter over an external lookup.

use std::collections::BTreeSet;

use tracing::warn;

use super::{PropertyProvider, requested_owned};
use crate::error::Result;
use crate::predicate::Predicate;
use crate::request::{PropertyMap, Request};
use crate::resource::{PropertyId, Resource, ResourceType};

/// Something that can look up properties of one resource, such as a
/// metrics backend.
#[async_trait::async_trait]
pub trait PropertySource: Send + Sync {
    /// Values for `property_ids` on `resource`. Missing values are omitted.
    async fn lookup(&self, resource: &Resource, property_ids: &[PropertyId]) -> Result<PropertyMap>;
}

/// Exposes a [`PropertySource`] as a [`PropertyProvider`].
///
/// A failed lookup only costs that resource its properties; it is logged
/// and the resource is returned without them.
#[derive(Debug)]
pub struct SourcePropertyProvider<S> {
    name: String,
    resource_type: ResourceType,
    property_ids: BTreeSet<PropertyId>,
    source: S,
}

impl<S: PropertySource> SourcePropertyProvider<S> {
    /// Supply `property_ids` of `resource_type` from `source`.
    pub fn new(
        name: impl Into<String>,
        resource_type: ResourceType,
        property_ids: impl IntoIterator<Item = PropertyId>,
        source: S,
    ) -> Self {
        Self {
            name: name.into(),
            resource_type,
            property_ids: property_ids.into_iter().collect(),
            source,
        }
    }
}

#[async_trait::async_trait]
impl<S: PropertySource> PropertyProvider for SourcePropertyProvider<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    fn property_ids(&self) -> &BTreeSet<PropertyId> {
        &self.property_ids
    }

    async fn decorate(
        &self,
        resources: &[Resource],
        request: &Request,
        _predicate: Option<&Predicate>,
    ) -> Result<Vec<PropertyMap>> {
        let wanted: Vec<PropertyId> = requested_owned(&self.property_ids, request).into_iter().collect();
        let mut maps = Vec::with_capacity(resources.len());
        for resource in resources {
            match self.source.lookup(resource, &wanted).await {
                Ok(mut map) => {
                    map.retain(|id, _| wanted.contains(id));
                    maps.push(map);
                }
                Err(e) => {
                    warn!(provider = %self.name, error = %e, "Property lookup failed");
                    maps.push(PropertyMap::new());
                }
            }
        }
        Ok(maps)
    }
}
