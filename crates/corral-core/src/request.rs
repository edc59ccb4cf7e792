// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Requests passed to providers, and the status handles mutations return.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::resource::{PropertyId, Resource};

/// Property values of one resource in a create or update.
pub type PropertyMap = BTreeMap<PropertyId, Value>;

/// Time range for a temporal property, in epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TemporalInfo {
    /// Range start.
    pub start: Option<i64>,
    /// Range end.
    pub end: Option<i64>,
    /// Sampling step.
    pub step: Option<i64>,
}

/// Slice of a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageRequest {
    /// Results to skip.
    pub offset: usize,
    /// Maximum results to return.
    pub limit: Option<usize>,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

/// Sort directive on one property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortRequest {
    /// Property to sort by.
    pub property_id: PropertyId,
    /// Direction.
    pub order: SortOrder,
}

/// What to read or write.
///
/// An empty property id set requests every property. The property maps are
/// only meaningful for create and update and are never consulted by reads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Request {
    property_ids: BTreeSet<PropertyId>,
    properties: Vec<PropertyMap>,
    request_info: BTreeMap<String, String>,
    temporal_info: BTreeMap<PropertyId, TemporalInfo>,
    page: Option<PageRequest>,
    sort: Vec<SortRequest>,
}

impl Request {
    /// Start building a request.
    pub fn builder() -> RequestBuilder {
        RequestBuilder::default()
    }

    /// Read request for every property.
    pub fn all() -> Self {
        Self::default()
    }

    /// Read request for the given properties.
    pub fn read(property_ids: impl IntoIterator<Item = PropertyId>) -> Self {
        Self {
            property_ids: property_ids.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Create/update request carrying the given property maps.
    pub fn write(properties: impl IntoIterator<Item = PropertyMap>) -> Self {
        Self {
            properties: properties.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Explicitly requested properties; empty means all.
    pub fn property_ids(&self) -> &BTreeSet<PropertyId> {
        &self.property_ids
    }

    /// Property maps for create/update.
    pub fn properties(&self) -> &[PropertyMap] {
        &self.properties
    }

    /// Free-form request metadata.
    pub fn request_info(&self) -> &BTreeMap<String, String> {
        &self.request_info
    }

    /// Time ranges requested for temporal properties.
    pub fn temporal_info(&self) -> &BTreeMap<PropertyId, TemporalInfo> {
        &self.temporal_info
    }

    /// Temporal range for one property.
    pub fn temporal_info_for(&self, property_id: &PropertyId) -> Option<&TemporalInfo> {
        self.temporal_info.get(property_id)
    }

    /// Requested page.
    pub fn page(&self) -> Option<&PageRequest> {
        self.page.as_ref()
    }

    /// Sort directives, most significant first.
    pub fn sort(&self) -> &[SortRequest] {
        &self.sort
    }

    /// Whether every property is requested.
    pub fn requests_all(&self) -> bool {
        self.property_ids.is_empty()
    }

    /// Whether `property_id` is requested, directly or through a requested
    /// category.
    pub fn is_requested(&self, property_id: &PropertyId) -> bool {
        self.property_ids.is_empty()
            || self.property_ids.contains(property_id)
            || self.property_ids.iter().any(|r| r.covers(property_id))
    }

    /// Copy of this request with a different property selection.
    pub fn with_property_ids(&self, property_ids: BTreeSet<PropertyId>) -> Self {
        Self {
            property_ids,
            ..self.clone()
        }
    }

    /// All property maps merged into one; later maps win.
    pub fn merged_properties(&self) -> PropertyMap {
        self.properties
            .iter()
            .flat_map(|map| map.iter().map(|(k, v)| (k.clone(), v.clone())))
            .collect()
    }
}

/// Builder for [`Request`].
#[derive(Debug, Default)]
pub struct RequestBuilder {
    request: Request,
}

impl RequestBuilder {
    /// Request one property.
    pub fn property_id(mut self, property_id: PropertyId) -> Self {
        self.request.property_ids.insert(property_id);
        self
    }

    /// Request several properties.
    pub fn property_ids(mut self, property_ids: impl IntoIterator<Item = PropertyId>) -> Self {
        self.request.property_ids.extend(property_ids);
        self
    }

    /// Add a property map for create/update.
    pub fn properties(mut self, properties: PropertyMap) -> Self {
        self.request.properties.push(properties);
        self
    }

    /// Attach request metadata.
    pub fn request_info(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.request_info.insert(key.into(), value.into());
        self
    }

    /// Attach a time range for a temporal property.
    pub fn temporal_info(mut self, property_id: PropertyId, info: TemporalInfo) -> Self {
        self.request.temporal_info.insert(property_id, info);
        self
    }

    /// Request one page of results.
    pub fn page(mut self, offset: usize, limit: Option<usize>) -> Self {
        self.request.page = Some(PageRequest { offset, limit });
        self
    }

    /// Append a sort directive.
    pub fn sort_by(mut self, property_id: PropertyId, order: SortOrder) -> Self {
        self.request.sort.push(SortRequest { property_id, order });
        self
    }

    /// Finish the request.
    pub fn build(self) -> Request {
        self.request
    }
}

/// Whether a mutation has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestState {
    /// Applied synchronously.
    Complete,
    /// Handed to downstream orchestration; track it by request id.
    InProgress,
}

/// Result of a create, update or delete.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestStatus {
    state: RequestState,
    request_id: Option<Uuid>,
    associated: Vec<Resource>,
}

impl RequestStatus {
    /// The mutation completed; `associated` are the affected resources.
    pub fn complete(associated: Vec<Resource>) -> Self {
        Self {
            state: RequestState::Complete,
            request_id: None,
            associated,
        }
    }

    /// The mutation was handed to orchestration as `request_id`.
    pub fn in_progress(request_id: Uuid, associated: Vec<Resource>) -> Self {
        Self {
            state: RequestState::InProgress,
            request_id: Some(request_id),
            associated,
        }
    }

    /// Completion state.
    pub fn state(&self) -> RequestState {
        self.state
    }

    /// Orchestration request id, when in progress.
    pub fn request_id(&self) -> Option<Uuid> {
        self.request_id
    }

    /// Resources affected by the mutation.
    pub fn associated(&self) -> &[Resource] {
        &self.associated
    }
}
