// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Resource and property provider interfaces and implementations.
//!
//! A [`ResourceProvider`] is the primary source of one resource type. It
//! returns resources carrying at least the requested properties and the key
//! properties needed to identify them. [`PropertyProvider`]s then decorate
//! those resources with properties they own.

pub mod computed;
pub mod live;
pub mod source;
pub mod sqlite;

use std::collections::BTreeSet;

pub use self::computed::ComputedResourceProvider;
pub use self::live::{ComponentCountPropertyProvider, LiveHostComponentProvider, LiveHostPropertyProvider};
pub use self::source::{PropertySource, SourcePropertyProvider};
pub use self::sqlite::SqliteResourceProvider;

use crate::error::{CoreError, Result};
use crate::predicate::Predicate;
use crate::request::{PropertyMap, Request, RequestStatus};
use crate::resource::{PropertyId, Resource, ResourceType};

/// Primary source of resources of one type.
///
/// Mutations default to [`CoreError::UnsupportedOperation`], so read-only
/// providers only implement [`get_resources`](Self::get_resources).
#[async_trait::async_trait]
pub trait ResourceProvider: Send + Sync {
    /// Type this provider serves.
    fn resource_type(&self) -> ResourceType;

    /// Resources matching `predicate`, projected to the request.
    ///
    /// May return a superset of the matches; the controller post-filters.
    async fn get_resources(&self, request: &Request, predicate: Option<&Predicate>) -> Result<Vec<Resource>>;

    /// Create one resource per property map in `request`.
    async fn create_resources(&self, _request: &Request) -> Result<RequestStatus> {
        Err(unsupported(self.resource_type(), "create"))
    }

    /// Apply the request's properties to every resource matching `predicate`.
    async fn update_resources(&self, _request: &Request, _predicate: Option<&Predicate>) -> Result<RequestStatus> {
        Err(unsupported(self.resource_type(), "update"))
    }

    /// Delete every resource matching `predicate`.
    async fn delete_resources(&self, _predicate: Option<&Predicate>) -> Result<RequestStatus> {
        Err(unsupported(self.resource_type(), "delete"))
    }
}

/// Adds properties it owns to resources fetched by a resource provider.
#[async_trait::async_trait]
pub trait PropertyProvider: Send + Sync {
    /// Name used in logs and for duplicate detection.
    fn name(&self) -> &str;

    /// Type this provider decorates.
    fn resource_type(&self) -> ResourceType;

    /// Properties this provider supplies.
    fn property_ids(&self) -> &BTreeSet<PropertyId>;

    /// Whether this provider supplies `property_id`.
    fn owns(&self, property_id: &PropertyId) -> bool {
        self.property_ids().contains(property_id)
    }

    /// One property map per input resource, in input order.
    async fn decorate(
        &self,
        resources: &[Resource],
        request: &Request,
        predicate: Option<&Predicate>,
    ) -> Result<Vec<PropertyMap>>;
}

/// The error a provider returns for an operation it does not implement.
pub fn unsupported(resource_type: ResourceType, operation: &'static str) -> CoreError {
    CoreError::UnsupportedOperation {
        resource_type,
        operation,
    }
}

/// Drop every property that is neither requested nor a key property.
pub fn project(resource: &mut Resource, request: &Request, key_property_ids: &[PropertyId]) {
    if request.requests_all() {
        return;
    }
    resource.retain_properties(|id| key_property_ids.contains(id) || request.is_requested(id));
}

/// Owned properties that `request` asks for.
pub fn requested_owned(property_ids: &BTreeSet<PropertyId>, request: &Request) -> BTreeSet<PropertyId> {
    property_ids
        .iter()
        .filter(|id| request.is_requested(id))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ReadOnly;

    #[async_trait::async_trait]
    impl ResourceProvider for ReadOnly {
        fn resource_type(&self) -> ResourceType {
            ResourceType::User
        }

        async fn get_resources(&self, _request: &Request, _predicate: Option<&Predicate>) -> Result<Vec<Resource>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_mutations_default_to_unsupported() {
        let provider = ReadOnly;

        let err = provider.create_resources(&Request::all()).await.unwrap_err();
        assert_eq!(
            err,
            CoreError::UnsupportedOperation {
                resource_type: ResourceType::User,
                operation: "create"
            }
        );
        assert!(provider.update_resources(&Request::all(), None).await.is_err());
        assert!(provider.delete_resources(None).await.is_err());
    }

    #[test]
    fn test_project_keeps_keys_and_requested() {
        let key = PropertyId::parse("Users/user_name");
        let admin = PropertyId::parse("Users/admin");
        let active = PropertyId::parse("Users/active");
        let mut user = Resource::new(ResourceType::User);
        user.set_property(&key, "alice");
        user.set_property(&admin, true);
        user.set_property(&active, true);

        project(&mut user, &Request::read([admin.clone()]), std::slice::from_ref(&key));

        assert!(user.has_property(&key));
        assert!(user.has_property(&admin));
        assert!(!user.has_property(&active));
    }
}
