// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Read-only provider whose resources are computed on demand.

use std::sync::Arc;

use tracing::instrument;

use super::{ResourceProvider, project};
use crate::error::Result;
use crate::predicate::Predicate;
use crate::request::Request;
use crate::resource::{PropertyId, Resource, ResourceType};
use crate::schema::Schema;

type ComputeFn = dyn Fn(&Request) -> Result<Vec<Resource>> + Send + Sync;

/// Serves resources produced by a closure, filtered and projected.
#[derive(Clone)]
pub struct ComputedResourceProvider {
    resource_type: ResourceType,
    identity: Vec<PropertyId>,
    compute: Arc<ComputeFn>,
}

impl std::fmt::Debug for ComputedResourceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputedResourceProvider")
            .field("resource_type", &self.resource_type)
            .finish_non_exhaustive()
    }
}

impl ComputedResourceProvider {
    /// Provider for the type `schema` describes.
    pub fn new<F>(schema: &Schema, compute: F) -> Self
    where
        F: Fn(&Request) -> Result<Vec<Resource>> + Send + Sync + 'static,
    {
        Self {
            resource_type: schema.resource_type(),
            identity: schema.identity_property_ids(),
            compute: Arc::new(compute),
        }
    }
}

#[async_trait::async_trait]
impl ResourceProvider for ComputedResourceProvider {
    fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    #[instrument(skip(self, request, predicate), fields(resource_type = %self.resource_type))]
    async fn get_resources(&self, request: &Request, predicate: Option<&Predicate>) -> Result<Vec<Resource>> {
        let mut resources = (self.compute)(request)?;
        resources.retain(|r| predicate.is_none_or(|p| p.may_match(r)));
        for resource in &mut resources {
            project(resource, request, &self.identity);
        }
        Ok(resources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaRegistry;

    fn users() -> ComputedResourceProvider {
        let registry = SchemaRegistry::builtin().unwrap();
        ComputedResourceProvider::new(registry.schema(ResourceType::User), |_request| {
            Ok(["alice", "bob"]
                .into_iter()
                .map(|name| {
                    let mut user = Resource::new(ResourceType::User);
                    user.set_property(&PropertyId::parse("Users/user_name"), name);
                    user.set_property(&PropertyId::parse("Users/admin"), name == "alice");
                    user
                })
                .collect())
        })
    }

    #[tokio::test]
    async fn test_filters_and_projects() {
        let provider = users();
        let admins = Predicate::equals(PropertyId::parse("Users/admin"), true);

        let resources = provider
            .get_resources(&Request::read([PropertyId::parse("Users/user_name")]), Some(&admins))
            .await
            .unwrap();

        assert_eq!(resources.len(), 1);
        assert_eq!(
            resources[0].property_string(&PropertyId::parse("Users/user_name")).as_deref(),
            Some("alice")
        );
        assert!(!resources[0].has_property(&PropertyId::parse("Users/admin")));
    }

    #[tokio::test]
    async fn test_is_read_only() {
        let err = users().delete_resources(None).await.unwrap_err();
        assert_eq!(err.error_code(), "UNSUPPORTED_OPERATION");
    }
}
