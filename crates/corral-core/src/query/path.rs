// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Hierarchical navigation paths such as `/clusters/c1/services/HDFS`.

use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::resource::ResourceType;

/// One step of a path: a type and, for instances, its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegment {
    /// Type addressed by the step.
    pub resource_type: ResourceType,
    /// Id of the addressed instance; `None` addresses the collection.
    pub id: Option<String>,
}

/// A path from the top of the hierarchy to a collection or an instance.
///
/// Every segment but the leaf carries an id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationPath {
    segments: Vec<PathSegment>,
}

impl NavigationPath {
    /// The empty path.
    pub fn new() -> Self {
        Self::default()
    }

    /// Descend to the instance `id` of `resource_type`.
    pub fn instance(mut self, resource_type: ResourceType, id: impl Into<String>) -> Self {
        self.segments.push(PathSegment {
            resource_type,
            id: Some(id.into()),
        });
        self
    }

    /// Descend to the collection of `resource_type`.
    pub fn collection(mut self, resource_type: ResourceType) -> Self {
        self.segments.push(PathSegment {
            resource_type,
            id: None,
        });
        self
    }

    /// Segments, outermost first.
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// The addressed step.
    pub fn leaf(&self) -> Option<&PathSegment> {
        self.segments.last()
    }

    /// Whether the path ends in a collection.
    pub fn is_collection(&self) -> bool {
        self.leaf().is_some_and(|s| s.id.is_none())
    }

    /// The same path with the leaf pinned to `id`.
    pub(crate) fn with_leaf_id(&self, id: impl Into<String>) -> Self {
        let mut path = self.clone();
        if let Some(leaf) = path.segments.last_mut() {
            leaf.id = Some(id.into());
        }
        path
    }
}

impl fmt::Display for NavigationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            write!(f, "/{}", segment.resource_type.collection_name())?;
            if let Some(id) = &segment.id {
                write!(f, "/{}", id)?;
            }
        }
        Ok(())
    }
}

impl FromStr for NavigationPath {
    type Err = CoreError;

    /// Parse alternating collection names and ids.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut path = Self::new();
        let mut parts = s.split('/').filter(|p| !p.is_empty());
        while let Some(collection) = parts.next() {
            let resource_type: ResourceType = collection.parse()?;
            path = match parts.next() {
                Some(id) => path.instance(resource_type, id),
                None => path.collection(resource_type),
            };
        }
        if path.segments.is_empty() {
            return Err(CoreError::invalid_request(format!("empty navigation path {:?}", s)));
        }
        Ok(path)
    }
}
