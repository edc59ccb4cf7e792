// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Cluster controller: the single entry point for resource operations.
//!
//! The controller resolves the schema and providers registered for a
//! resource type, calls the resource provider, lets every property provider
//! decorate the result in registration order, and then post-filters, sorts,
//! pages and projects what comes back.
//!
//! It holds no per-request state. Build it once with
//! [`ClusterControllerBuilder`] and share it as `Arc<ClusterController>`, or
//! construct it lazily through a [`ControllerCell`].

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use crate::error::{CoreError, Result};
use crate::predicate::{Predicate, compare_values};
use crate::provider::{PropertyProvider, ResourceProvider, project};
use crate::request::{Request, RequestStatus, SortOrder, SortRequest};
use crate::resource::{Resource, ResourceType};
use crate::schema::{Schema, SchemaRegistry};

/// Federates resource and property providers behind one interface.
pub struct ClusterController {
    schemas: Arc<SchemaRegistry>,
    resource_providers: HashMap<ResourceType, Arc<dyn ResourceProvider>>,
    property_providers: HashMap<ResourceType, Vec<Arc<dyn PropertyProvider>>>,
}

impl fmt::Debug for ClusterController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.resource_providers.keys().collect();
        types.sort();
        f.debug_struct("ClusterController")
            .field("resource_types", &types)
            .field(
                "property_providers",
                &self.property_providers.values().map(Vec::len).sum::<usize>(),
            )
            .finish()
    }
}

impl ClusterController {
    /// Start wiring a controller over `schemas`.
    pub fn builder(schemas: Arc<SchemaRegistry>) -> ClusterControllerBuilder {
        ClusterControllerBuilder::new(schemas)
    }

    /// Schema of `resource_type`.
    pub fn schema(&self, resource_type: ResourceType) -> &Schema {
        self.schemas.schema(resource_type)
    }

    /// The schema registry.
    pub fn schemas(&self) -> &Arc<SchemaRegistry> {
        &self.schemas
    }

    fn resource_provider(&self, resource_type: ResourceType) -> Result<&Arc<dyn ResourceProvider>> {
        self.resource_providers
            .get(&resource_type)
            .ok_or(CoreError::NoResourceProvider { resource_type })
    }

    /// Resources of `resource_type` matching `predicate`, carrying the
    /// requested properties and their key properties.
    ///
    /// An empty result is not an error.
    #[instrument(skip(self, request, predicate), fields(resource_type = %resource_type))]
    pub async fn get_resources(
        &self,
        resource_type: ResourceType,
        request: &Request,
        predicate: Option<&Predicate>,
    ) -> Result<Vec<Resource>> {
        let provider = self.resource_provider(resource_type)?;
        let identity = self.schema(resource_type).identity_property_ids();

        // Providers must also return what the predicate, the sort and the
        // identity need; the original projection is restored at the end.
        let effective = if request.requests_all() {
            request.clone()
        } else {
            let mut ids = request.property_ids().clone();
            ids.extend(identity.iter().cloned());
            if let Some(predicate) = predicate {
                ids.extend(predicate.property_ids());
            }
            ids.extend(request.sort().iter().map(|s| s.property_id.clone()));
            request.with_property_ids(ids)
        };

        let mut resources = provider.get_resources(&effective, predicate).await?;
        let fetched = resources.len();

        self.decorate(resource_type, &mut resources, &effective, predicate)
            .await;

        if let Some(predicate) = predicate {
            resources.retain(|r| predicate.evaluate(r));
        }
        sort_resources(&mut resources, request.sort());
        if let Some(page) = request.page() {
            resources = resources
                .into_iter()
                .skip(page.offset)
                .take(page.limit.unwrap_or(usize::MAX))
                .collect();
        }
        for resource in &mut resources {
            project(resource, request, &identity);
        }

        debug!(fetched, returned = resources.len(), "Resolved resources");
        Ok(resources)
    }

    /// The resource identified by `predicate`.
    ///
    /// Fails with [`CoreError::NoSuchResource`] when nothing matches.
    #[instrument(skip(self, request, predicate), fields(resource_type = %resource_type, predicate = %predicate))]
    pub async fn get_resource(
        &self,
        resource_type: ResourceType,
        request: &Request,
        predicate: &Predicate,
    ) -> Result<Resource> {
        let mut resources = self
            .get_resources(resource_type, request, Some(predicate))
            .await?;
        if resources.len() > 1 {
            warn!(matches = resources.len(), "Predicate matches more than one resource, using the first");
        }
        if resources.is_empty() {
            return Err(CoreError::NoSuchResource {
                resource_type,
                predicate: predicate.to_string(),
            });
        }
        Ok(resources.swap_remove(0))
    }

    /// Create resources of `resource_type`, one per property map.
    #[instrument(skip(self, request), fields(resource_type = %resource_type))]
    pub async fn create_resources(&self, resource_type: ResourceType, request: &Request) -> Result<RequestStatus> {
        let status = self.resource_provider(resource_type)?.create_resources(request).await?;
        info!(created = status.associated().len(), "Created resources");
        Ok(status)
    }

    /// Update every resource of `resource_type` matching `predicate`.
    #[instrument(skip(self, request, predicate), fields(resource_type = %resource_type))]
    pub async fn update_resources(
        &self,
        resource_type: ResourceType,
        request: &Request,
        predicate: Option<&Predicate>,
    ) -> Result<RequestStatus> {
        let status = self
            .resource_provider(resource_type)?
            .update_resources(request, predicate)
            .await?;
        info!(updated = status.associated().len(), state = ?status.state(), "Updated resources");
        Ok(status)
    }

    /// Delete every resource of `resource_type` matching `predicate`.
    #[instrument(skip(self, predicate), fields(resource_type = %resource_type))]
    pub async fn delete_resources(
        &self,
        resource_type: ResourceType,
        predicate: Option<&Predicate>,
    ) -> Result<RequestStatus> {
        let status = self
            .resource_provider(resource_type)?
            .delete_resources(predicate)
            .await?;
        info!(deleted = status.associated().len(), "Deleted resources");
        Ok(status)
    }

    async fn decorate(
        &self,
        resource_type: ResourceType,
        resources: &mut [Resource],
        request: &Request,
        predicate: Option<&Predicate>,
    ) {
        let Some(providers) = self.property_providers.get(&resource_type) else {
            return;
        };

        for provider in providers {
            if resources.is_empty() {
                return;
            }
            if !provider.property_ids().iter().any(|id| request.is_requested(id)) {
                continue;
            }

            match provider.decorate(resources, request, predicate).await {
                Ok(maps) if maps.len() == resources.len() => {
                    for (resource, map) in resources.iter_mut().zip(maps) {
                        for (id, value) in map {
                            if provider.owns(&id) && request.is_requested(&id) {
                                resource.set_property_if_absent(&id, value);
                            }
                        }
                    }
                }
                Ok(maps) => {
                    warn!(
                        provider = provider.name(),
                        expected = resources.len(),
                        returned = maps.len(),
                        "Property provider returned a mismatched result, skipping"
                    );
                }
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "Property provider failed, skipping");
                }
            }
        }
    }
}

fn sort_resources(resources: &mut [Resource], sort: &[SortRequest]) {
    if sort.is_empty() {
        return;
    }
    resources.sort_by(|a, b| {
        for directive in sort {
            let ordering = match (
                a.property_value(&directive.property_id),
                b.property_value(&directive.property_id),
            ) {
                (Some(left), Some(right)) => {
                    let ordering = compare_values(left, right).unwrap_or(Ordering::Equal);
                    match directive.order {
                        SortOrder::Ascending => ordering,
                        SortOrder::Descending => ordering.reverse(),
                    }
                }
                // missing values sort last in either direction
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

/// Explicit registry of providers for a [`ClusterController`].
pub struct ClusterControllerBuilder {
    schemas: Arc<SchemaRegistry>,
    resource_providers: HashMap<ResourceType, Arc<dyn ResourceProvider>>,
    property_providers: HashMap<ResourceType, Vec<Arc<dyn PropertyProvider>>>,
    conflicts: Vec<String>,
}

impl fmt::Debug for ClusterControllerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterControllerBuilder")
            .field("resource_types", &self.resource_providers.keys().collect::<Vec<_>>())
            .field("conflicts", &self.conflicts)
            .finish_non_exhaustive()
    }
}

impl ClusterControllerBuilder {
    /// Empty registry over `schemas`.
    pub fn new(schemas: Arc<SchemaRegistry>) -> Self {
        Self {
            schemas,
            resource_providers: HashMap::new(),
            property_providers: HashMap::new(),
            conflicts: Vec::new(),
        }
    }

    /// Register the resource provider for its type.
    pub fn resource_provider(mut self, provider: Arc<dyn ResourceProvider>) -> Self {
        let resource_type = provider.resource_type();
        if self.resource_providers.contains_key(&resource_type) {
            self.conflicts
                .push(format!("duplicate resource provider for {}", resource_type));
        } else {
            self.resource_providers.insert(resource_type, provider);
        }
        self
    }

    /// Append a property provider for its type.
    pub fn property_provider(mut self, provider: Arc<dyn PropertyProvider>) -> Self {
        let resource_type = provider.resource_type();
        let providers = self.property_providers.entry(resource_type).or_default();
        if providers.iter().any(|p| p.name() == provider.name()) {
            self.conflicts.push(format!(
                "duplicate property provider {} for {}",
                provider.name(),
                resource_type
            ));
        } else {
            providers.push(provider);
        }
        self
    }

    /// Whether a resource provider is registered for `resource_type`.
    pub fn has_resource_provider(&self, resource_type: ResourceType) -> bool {
        self.resource_providers.contains_key(&resource_type)
    }

    /// Freeze the registry.
    pub fn build(self) -> Result<ClusterController> {
        if !self.conflicts.is_empty() {
            return Err(CoreError::Configuration {
                message: self.conflicts.join("; "),
            });
        }
        info!(
            resource_providers = self.resource_providers.len(),
            property_providers = self.property_providers.values().map(Vec::len).sum::<usize>(),
            "Cluster controller built"
        );
        Ok(ClusterController {
            schemas: self.schemas,
            resource_providers: self.resource_providers,
            property_providers: self.property_providers,
        })
    }
}

/// Lazily constructed, shared controller.
///
/// The initializer runs at most once to completion. Concurrent first callers
/// wait for it and all observe the same instance. A failed initialization
/// leaves the cell empty, so a later call retries.
#[derive(Debug, Default)]
pub struct ControllerCell {
    cell: OnceCell<Arc<ClusterController>>,
}

impl ControllerCell {
    /// Empty cell.
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::const_new(),
        }
    }

    /// The controller, if already constructed.
    pub fn get(&self) -> Option<Arc<ClusterController>> {
        self.cell.get().cloned()
    }

    /// The controller, constructing it with `init` on first use.
    pub async fn get_or_try_init<F, Fut>(&self, init: F) -> Result<Arc<ClusterController>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ClusterController>>,
    {
        self.cell
            .get_or_try_init(|| async move { init().await.map(Arc::new) })
            .await
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use serde_json::Value;

    use super::*;
    use crate::provider::ComputedResourceProvider;
    use crate::request::PropertyMap;
    use crate::resource::PropertyId;

    fn id(path: &str) -> PropertyId {
        PropertyId::parse(path)
    }

    fn registry() -> Arc<SchemaRegistry> {
        Arc::new(SchemaRegistry::builtin().unwrap())
    }

    fn users(registry: &SchemaRegistry) -> Arc<dyn ResourceProvider> {
        Arc::new(ComputedResourceProvider::new(
            registry.schema(ResourceType::User),
            |_| {
                Ok([("carol", 3), ("alice", 1), ("bob", 2), ("dave", -1)]
                    .into_iter()
                    .map(|(name, rank)| {
                        let mut user = Resource::new(ResourceType::User);
                        user.set_property(&id("Users/user_name"), name);
                        if rank >= 0 {
                            user.set_property(&id("Users/rank"), rank);
                        }
                        user
                    })
                    .collect())
            },
        ))
    }

    struct Roles {
        ids: BTreeSet<PropertyId>,
    }

    #[async_trait::async_trait]
    impl PropertyProvider for Roles {
        fn name(&self) -> &str {
            "roles"
        }

        fn resource_type(&self) -> ResourceType {
            ResourceType::User
        }

        fn property_ids(&self) -> &BTreeSet<PropertyId> {
            &self.ids
        }

        async fn decorate(
            &self,
            resources: &[Resource],
            _request: &Request,
            _predicate: Option<&Predicate>,
        ) -> Result<Vec<PropertyMap>> {
            Ok(resources
                .iter()
                .map(|r| {
                    let admin = r.property_string(&id("Users/user_name")).as_deref() == Some("alice");
                    PropertyMap::from([
                        (id("Users/admin"), Value::from(admin)),
                        (id("Users/rank"), Value::from(100)),
                    ])
                })
                .collect())
        }
    }

    fn roles() -> Arc<dyn PropertyProvider> {
        Arc::new(Roles {
            ids: BTreeSet::from([id("Users/admin")]),
        })
    }

    fn names(resources: &[Resource]) -> Vec<String> {
        resources
            .iter()
            .filter_map(|r| r.property_string(&id("Users/user_name")))
            .collect()
    }

    #[tokio::test]
    async fn test_missing_provider() {
        let controller = ClusterController::builder(registry()).build().unwrap();

        let err = controller
            .get_resources(ResourceType::Cluster, &Request::all(), None)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            CoreError::NoResourceProvider {
                resource_type: ResourceType::Cluster
            }
        );
    }

    #[tokio::test]
    async fn test_duplicate_registrations_are_configuration_errors() {
        let registry = registry();
        let err = ClusterController::builder(registry.clone())
            .resource_provider(users(&registry))
            .resource_provider(users(&registry))
            .build()
            .unwrap_err();
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");

        let err = ClusterController::builder(registry.clone())
            .property_provider(roles())
            .property_provider(roles())
            .build()
            .unwrap_err();
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
    }

    #[tokio::test]
    async fn test_decoration_merges_only_owned_absent_properties() {
        let registry = registry();
        let controller = ClusterController::builder(registry.clone())
            .resource_provider(users(&registry))
            .property_provider(roles())
            .build()
            .unwrap();

        let resources = controller
            .get_resources(ResourceType::User, &Request::all(), None)
            .await
            .unwrap();

        let alice = resources
            .iter()
            .find(|r| r.property_string(&id("Users/user_name")).as_deref() == Some("alice"))
            .unwrap();
        assert_eq!(alice.property_value(&id("Users/admin")), Some(&Value::from(true)));
        // not owned by the decorator, provider value kept
        assert_eq!(alice.property_value(&id("Users/rank")), Some(&Value::from(1)));
    }

    #[tokio::test]
    async fn test_post_filter_on_decorated_property() {
        let registry = registry();
        let controller = ClusterController::builder(registry.clone())
            .resource_provider(users(&registry))
            .property_provider(roles())
            .build()
            .unwrap();
        let admins = Predicate::equals(id("Users/admin"), true);

        let resources = controller
            .get_resources(
                ResourceType::User,
                &Request::read([id("Users/user_name")]),
                Some(&admins),
            )
            .await
            .unwrap();

        assert_eq!(names(&resources), vec!["alice"]);
        assert!(!resources[0].has_property(&id("Users/admin")));
    }

    #[tokio::test]
    async fn test_sort_and_page() {
        let registry = registry();
        let controller = ClusterController::builder(registry.clone())
            .resource_provider(users(&registry))
            .build()
            .unwrap();

        let descending = Request::builder()
            .property_id(id("Users/user_name"))
            .sort_by(id("Users/rank"), SortOrder::Descending)
            .build();
        let resources = controller
            .get_resources(ResourceType::User, &descending, None)
            .await
            .unwrap();
        assert_eq!(names(&resources), vec!["carol", "bob", "alice", "dave"]);
        assert!(!resources[0].has_property(&id("Users/rank")));

        let paged = Request::builder()
            .sort_by(id("Users/rank"), SortOrder::Ascending)
            .page(1, Some(2))
            .build();
        let resources = controller
            .get_resources(ResourceType::User, &paged, None)
            .await
            .unwrap();
        assert_eq!(names(&resources), vec!["bob", "carol"]);
    }

    #[tokio::test]
    async fn test_get_resource_contract() {
        let registry = registry();
        let controller = ClusterController::builder(registry.clone())
            .resource_provider(users(&registry))
            .build()
            .unwrap();

        let bob = controller
            .get_resource(
                ResourceType::User,
                &Request::all(),
                &Predicate::equals(id("Users/user_name"), "bob"),
            )
            .await
            .unwrap();
        assert_eq!(bob.property_value(&id("Users/rank")), Some(&Value::from(2)));

        let err = controller
            .get_resource(
                ResourceType::User,
                &Request::all(),
                &Predicate::equals(id("Users/user_name"), "zoe"),
            )
            .await
            .unwrap_err();
        assert_eq!(
            err,
            CoreError::NoSuchResource {
                resource_type: ResourceType::User,
                predicate: "Users/user_name=\"zoe\"".to_string(),
            }
        );

        let none = controller
            .get_resources(
                ResourceType::User,
                &Request::all(),
                Some(&Predicate::equals(id("Users/user_name"), "zoe")),
            )
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_cell_retries_after_failed_init() {
        let cell = ControllerCell::new();

        let err = cell
            .get_or_try_init(|| async { Err(CoreError::invalid_request("not yet")) })
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_REQUEST");
        assert!(cell.get().is_none());

        let controller = cell
            .get_or_try_init(|| async { ClusterController::builder(registry()).build() })
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&controller, &cell.get().unwrap()));
    }
}
