// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Hierarchical query execution.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::{debug, instrument, warn};

use super::definitions::ResourceDefinitions;
use super::fields::resolve_fields;
use super::path::NavigationPath;
use crate::controller::ClusterController;
use crate::error::{CoreError, Result};
use crate::predicate::Predicate;
use crate::request::Request;
use crate::resource::{PropertyId, Resource, ResourceType, value_to_key};
use crate::schema::Schema;
use crate::tree::TreeNode;

/// Executes navigation paths against a [`ClusterController`] and assembles
/// the result tree.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    controller: Arc<ClusterController>,
    definitions: Arc<ResourceDefinitions>,
}

impl QueryExecutor {
    /// Executor over `controller` navigating `definitions`.
    pub fn new(controller: Arc<ClusterController>, definitions: Arc<ResourceDefinitions>) -> Self {
        Self {
            controller,
            definitions,
        }
    }

    /// The controller queries run against.
    pub fn controller(&self) -> &Arc<ClusterController> {
        &self.controller
    }

    /// Conjunction of the key property equalities fixed by `path`, in terms
    /// of the leaf type's schema.
    ///
    /// `None` when no segment carries an id. A segment whose type has no key
    /// property in the leaf schema is an [`CoreError::UnrelatedAncestor`].
    pub fn path_predicate(&self, path: &NavigationPath) -> Result<Option<Predicate>> {
        let leaf = path
            .leaf()
            .ok_or_else(|| CoreError::invalid_request("empty navigation path"))?;
        let schema = self.controller.schema(leaf.resource_type);

        let mut terms = Vec::with_capacity(path.segments().len());
        for segment in path.segments() {
            let Some(id) = &segment.id else {
                continue;
            };
            let key = schema.key_property_id(segment.resource_type).ok_or(
                CoreError::UnrelatedAncestor {
                    resource_type: leaf.resource_type,
                    ancestor: segment.resource_type,
                },
            )?;
            terms.push(Predicate::equals(key.clone(), id.as_str()));
        }

        Ok((!terms.is_empty()).then(|| Predicate::and(terms)))
    }

    /// Execute `path`, projecting `fields`.
    ///
    /// For a collection path the root is a collection node with one child per
    /// resource. For an instance path the root carries the resource itself.
    /// Sub-resources selected by `fields` (all of them for an instance path
    /// without fields) become named children of the resource's node. They are
    /// collection nodes when the path addresses a collection, and
    /// non-collection nodes when it addresses a single instance.
    #[instrument(skip(self, fields), fields(path = %path, fields = fields.len()))]
    pub async fn execute(&self, path: &NavigationPath, fields: &BTreeSet<String>) -> Result<TreeNode<Resource>> {
        self.execute_boxed(path.clone(), fields.clone()).await
    }

    fn execute_boxed(&self, path: NavigationPath, fields: BTreeSet<String>) -> BoxFuture<'_, Result<TreeNode<Resource>>> {
        async move {
            let leaf = path
                .leaf()
                .ok_or_else(|| CoreError::invalid_request("empty navigation path"))?
                .clone();
            let resource_type = leaf.resource_type;
            let schema = self.controller.schema(resource_type);
            let sub_resources = self.definitions.sub_resources(resource_type);
            let predicate = self.path_predicate(&path)?;
            let identity = schema.identity_property_ids();

            let (request, sub_fields) = if fields.is_empty() {
                if path.is_collection() {
                    (Request::read(identity), BTreeMap::new())
                } else {
                    let every = sub_resources
                        .keys()
                        .map(|name| (name.clone(), BTreeSet::new()))
                        .collect();
                    (Request::all(), every)
                }
            } else {
                let selection = resolve_fields(schema, sub_resources.keys(), &fields)?;
                let mut builder = Request::builder();
                if !selection.all_properties {
                    builder = builder
                        .property_ids(identity)
                        .property_ids(selection.property_ids);
                }
                for (id, info) in selection.temporal {
                    builder = builder.temporal_info(id, info);
                }
                (builder.build(), selection.sub_resources)
            };

            debug!(%resource_type, sub_resources = sub_fields.len(), "Executing query");

            match leaf.id {
                Some(id) => {
                    let predicate = predicate.ok_or_else(|| CoreError::invalid_request("instance path without a predicate"))?;
                    let resource = self
                        .controller
                        .get_resource(resource_type, &request, &predicate)
                        .await?;
                    let mut root = TreeNode::new(Some(id), None, false);
                    self.expand(&path, schema, &mut root, &resource, &sub_resources, &sub_fields)
                        .await?;
                    root.set_object(resource);
                    Ok(root)
                }
                None => {
                    let resources = self
                        .controller
                        .get_resources(resource_type, &request, predicate.as_ref())
                        .await?;
                    let naming = child_name_property(schema, &path);
                    let mut root = TreeNode::new(Some(resource_type.collection_name().to_string()), None, true);
                    for (index, resource) in resources.into_iter().enumerate() {
                        let name = naming
                            .and_then(|id| resource.property_value(id))
                            .and_then(value_to_key)
                            .unwrap_or_else(|| index.to_string());
                        let mut node = TreeNode::new(Some(name), None, false);
                        self.expand(&path, schema, &mut node, &resource, &sub_resources, &sub_fields)
                            .await?;
                        node.set_object(resource);
                        root.add_child(node);
                    }
                    Ok(root)
                }
            }
        }
        .boxed()
    }

    async fn expand(
        &self,
        path: &NavigationPath,
        schema: &Schema,
        node: &mut TreeNode<Resource>,
        resource: &Resource,
        sub_resources: &BTreeMap<String, ResourceType>,
        sub_fields: &BTreeMap<String, BTreeSet<String>>,
    ) -> Result<()> {
        if sub_fields.is_empty() {
            return Ok(());
        }
        let Some(id) = schema
            .own_key_property_id()
            .and_then(|key| resource.property_value(key))
            .and_then(value_to_key)
        else {
            warn!(resource_type = %schema.resource_type(), "Resource has no key value, skipping sub-resources");
            return Ok(());
        };
        let instance = path.with_leaf_id(id);

        for (name, fields) in sub_fields {
            let Some(sub_type) = sub_resources.get(name) else {
                continue;
            };
            let mut child = self
                .execute_boxed(instance.clone().collection(*sub_type), fields.clone())
                .await?;
            child.set_name(name.clone());
            // Under a single instance the sub-result is part of that resource.
            if !path.is_collection() {
                child.set_collection(false);
            }
            node.add_child(child);
        }
        Ok(())
    }
}

/// Property naming the members of a collection: the first key property the
/// path does not already fix, trying the type's own key first and then its
/// ancestors from the nearest.
fn child_name_property<'a>(schema: &'a Schema, path: &NavigationPath) -> Option<&'a PropertyId> {
    let pinned: Vec<&PropertyId> = path
        .segments()
        .iter()
        .filter(|s| s.id.is_some())
        .filter_map(|s| schema.key_property_id(s.resource_type))
        .collect();

    let resource_type = schema.resource_type();
    std::iter::once(&resource_type)
        .chain(resource_type.ancestors().iter().rev())
        .filter_map(|ty| schema.key_property_id(*ty))
        .find(|key| !pinned.contains(key))
}
