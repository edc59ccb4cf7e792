// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The closed set of resource types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A kind of resource managed by the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceType {
    /// A managed cluster.
    Cluster,
    /// A service (HDFS, YARN, ...) installed in a cluster.
    Service,
    /// A component of a service (NAMENODE, DATANODE, ...).
    Component,
    /// A machine, assigned to at most one cluster.
    Host,
    /// A component placed on a host.
    HostComponent,
    /// A tagged configuration of a cluster.
    Configuration,
    /// An orchestration request.
    Request,
    /// A task of a request, executed on one host.
    Task,
    /// A user account.
    User,
}

impl ResourceType {
    /// Every resource type, in declaration order.
    pub const ALL: [ResourceType; 9] = [
        Self::Cluster,
        Self::Service,
        Self::Component,
        Self::Host,
        Self::HostComponent,
        Self::Configuration,
        Self::Request,
        Self::Task,
        Self::User,
    ];

    /// Returns the string representation of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cluster => "Cluster",
            Self::Service => "Service",
            Self::Component => "Component",
            Self::Host => "Host",
            Self::HostComponent => "HostComponent",
            Self::Configuration => "Configuration",
            Self::Request => "Request",
            Self::Task => "Task",
            Self::User => "User",
        }
    }

    /// Name of a collection of this type.
    pub fn collection_name(&self) -> &'static str {
        match self {
            Self::Cluster => "clusters",
            Self::Service => "services",
            Self::Component => "components",
            Self::Host => "hosts",
            Self::HostComponent => "host_components",
            Self::Configuration => "configurations",
            Self::Request => "requests",
            Self::Task => "tasks",
            Self::User => "users",
        }
    }

    /// Types whose identity is part of this type's identity, outermost first.
    pub fn ancestors(&self) -> &'static [ResourceType] {
        match self {
            Self::Cluster | Self::User => &[],
            Self::Service | Self::Host | Self::Configuration | Self::Request => &[Self::Cluster],
            Self::Component => &[Self::Cluster, Self::Service],
            Self::HostComponent => &[Self::Cluster, Self::Service, Self::Component, Self::Host],
            Self::Task => &[Self::Cluster, Self::Request],
        }
    }

    /// Position in [`ResourceType::ALL`].
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ty| ty.as_str() == s || ty.collection_name() == s)
            .ok_or_else(|| CoreError::invalid_request(format!("unknown resource type '{}'", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_matches_all() {
        for (i, ty) in ResourceType::ALL.iter().enumerate() {
            assert_eq!(ty.index(), i);
        }
    }

    #[test]
    fn test_parse_by_name_and_collection() {
        assert_eq!(
            "HostComponent".parse::<ResourceType>().unwrap(),
            ResourceType::HostComponent
        );
        assert_eq!(
            "host_components".parse::<ResourceType>().unwrap(),
            ResourceType::HostComponent
        );
        assert!("widgets".parse::<ResourceType>().is_err());
    }

    #[test]
    fn test_ancestors_never_include_self() {
        for ty in ResourceType::ALL {
            assert!(!ty.ancestors().contains(&ty));
        }
        assert_eq!(
            ResourceType::Task.ancestors(),
            &[ResourceType::Cluster, ResourceType::Request]
        );
    }

    #[test]
    fn test_serde_uses_type_name() {
        let json = serde_json::to_string(&ResourceType::HostComponent).unwrap();
        assert_eq!(json, "\"HostComponent\"");
    }
}
