// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Hierarchical queries through the executor against a wired control plane.

mod common;

use common::*;
use corral_core::CoreError;
use corral_core::live::HostComponentKey;
use corral_core::predicate::Predicate;
use corral_core::query::NavigationPath;
use corral_core::resource::ResourceType;

const CLUSTER: &str = "ServiceComponentInfo/cluster_name";
const SERVICE: &str = "ServiceComponentInfo/service_name";
const COMPONENT: &str = "ServiceComponentInfo/component_name";
const CATEGORY: &str = "ServiceComponentInfo/category";

async fn seeded() -> TestContext {
    let ctx = TestContext::new().await;
    ctx.seed(
        ResourceType::Component,
        &[
            &[(CLUSTER, "c1"), (SERVICE, "s1"), (COMPONENT, "comp1"), (CATEGORY, "MASTER")],
            &[(CLUSTER, "c1"), (SERVICE, "s1"), (COMPONENT, "comp2"), (CATEGORY, "SLAVE")],
            &[(CLUSTER, "c1"), (SERVICE, "s2"), (COMPONENT, "comp1"), (CATEGORY, "CLIENT")],
        ],
    )
    .await;
    ctx
}

#[tokio::test]
async fn test_instance_path_selects_exactly_one_resource() {
    let ctx = seeded().await;
    let executor = ctx.plane.executor();
    let path: NavigationPath = "/clusters/c1/services/s1/components/comp1".parse().unwrap();

    let predicate = executor.path_predicate(&path).unwrap().unwrap();
    assert_eq!(
        predicate,
        Predicate::and([
            Predicate::equals(pid(CLUSTER), "c1"),
            Predicate::equals(pid(SERVICE), "s1"),
            Predicate::equals(pid(COMPONENT), "comp1"),
        ])
    );

    let tree = executor.execute(&path, &fields(&[])).await.unwrap();

    assert_eq!(tree.name(), Some("comp1"));
    assert!(!tree.is_collection());
    let resource = tree.object().unwrap();
    assert_eq!(resource.property_string(&pid(SERVICE)).as_deref(), Some("s1"));
    assert_eq!(resource.property_string(&pid(CATEGORY)).as_deref(), Some("MASTER"));

    // Without fields an instance lists all of its sub-resources, even empty
    // ones, as parts of the instance rather than as collections.
    let host_components = tree.child("host_components").unwrap();
    assert!(!host_components.is_collection());
    assert!(host_components.children().is_empty());
}

#[tokio::test]
async fn test_collection_children_are_addressable_by_key() {
    let ctx = seeded().await;
    let path: NavigationPath = "/clusters/c1/services/s1/components".parse().unwrap();

    let tree = ctx.plane.executor().execute(&path, &fields(&[])).await.unwrap();

    assert!(tree.is_collection());
    assert_eq!(tree.name(), Some("components"));
    let names: Vec<_> = tree.children().iter().filter_map(|c| c.name()).collect();
    assert_eq!(names, vec!["comp1", "comp2"]);

    // Collections carry identity only unless fields ask for more.
    let comp2 = tree.child("comp2").unwrap().object().unwrap();
    assert_eq!(comp2.property_string(&pid(COMPONENT)).as_deref(), Some("comp2"));
    assert!(comp2.property_value(&pid(CATEGORY)).is_none());
}

#[tokio::test]
async fn test_fields_are_projected_and_forwarded_to_sub_resources() {
    let ctx = seeded().await;
    let state = ctx.plane.cluster_state();
    state
        .add_host_component(HostComponentKey::new("c1", "s1", "comp1", "h1"))
        .await
        .unwrap();
    state
        .add_host_component(HostComponentKey::new("c1", "s1", "comp1", "h2"))
        .await
        .unwrap();
    state
        .add_host_component(HostComponentKey::new("c1", "s1", "comp2", "h1"))
        .await
        .unwrap();

    let path: NavigationPath = "/clusters/c1/services/s1/components/comp1".parse().unwrap();
    let tree = ctx
        .plane
        .executor()
        .execute(&path, &fields(&[CATEGORY, "host_components/HostRoles/state"]))
        .await
        .unwrap();

    let resource = tree.object().unwrap();
    assert_eq!(resource.property_string(&pid(CATEGORY)).as_deref(), Some("MASTER"));

    // Host components of a component are named by host.
    let host_components = tree.child("host_components").unwrap();
    let hosts: Vec<_> = host_components.children().iter().filter_map(|c| c.name()).collect();
    assert_eq!(hosts, vec!["h1", "h2"]);

    let h1 = tree.descendant(&["host_components", "h1"]).unwrap().object().unwrap();
    assert_eq!(h1.property_string(&pid("HostRoles/state")).as_deref(), Some("INIT"));
    assert!(h1.property_value(&pid("HostRoles/desired_state")).is_none());
}

#[tokio::test]
async fn test_sub_resources_of_collection_members_stay_collections() {
    let ctx = seeded().await;
    ctx.plane
        .cluster_state()
        .add_host_component(HostComponentKey::new("c1", "s1", "comp1", "h1"))
        .await
        .unwrap();

    let path: NavigationPath = "/clusters/c1/services/s1/components".parse().unwrap();
    let tree = ctx
        .plane
        .executor()
        .execute(&path, &fields(&["host_components"]))
        .await
        .unwrap();

    assert!(tree.is_collection());
    for member in tree.children() {
        assert!(!member.is_collection());
        let host_components = member.child("host_components").unwrap();
        assert!(host_components.is_collection());
    }
    let hosts = tree.descendant(&["comp1", "host_components"]).unwrap();
    assert_eq!(hosts.children().len(), 1);
    assert_eq!(hosts.children()[0].name(), Some("h1"));
}

#[tokio::test]
async fn test_sub_resources_of_an_instance_are_not_collections() {
    let ctx = seeded().await;
    ctx.plane
        .cluster_state()
        .add_host_component(HostComponentKey::new("c1", "s1", "comp1", "h1"))
        .await
        .unwrap();

    let path: NavigationPath = "/clusters/c1/services/s1/components/comp1".parse().unwrap();
    let tree = ctx
        .plane
        .executor()
        .execute(&path, &fields(&["host_components"]))
        .await
        .unwrap();

    assert!(!tree.is_collection());
    let host_components = tree.child("host_components").unwrap();
    assert!(!host_components.is_collection());
    assert_eq!(host_components.children()[0].name(), Some("h1"));
}

#[tokio::test]
async fn test_host_lists_its_components_by_name() {
    let ctx = TestContext::new().await;
    ctx.seed(
        ResourceType::Host,
        &[&[("Hosts/cluster_name", "c1"), ("Hosts/host_name", "h1"), ("Hosts/ip", "10.0.0.1")]],
    )
    .await;
    let state = ctx.plane.cluster_state();
    for (service, component) in [("HDFS", "DATANODE"), ("YARN", "NODEMANAGER")] {
        state
            .add_host_component(HostComponentKey::new("c1", service, component, "h1"))
            .await
            .unwrap();
    }

    let path: NavigationPath = "/clusters/c1/hosts/h1".parse().unwrap();
    let tree = ctx.plane.executor().execute(&path, &fields(&[])).await.unwrap();

    assert_eq!(tree.name(), Some("h1"));
    let names: Vec<_> = tree
        .child("host_components")
        .unwrap()
        .children()
        .iter()
        .filter_map(|c| c.name())
        .collect();
    assert_eq!(names, vec!["DATANODE", "NODEMANAGER"]);

    let instance: NavigationPath = "/clusters/c1/hosts/h1/host_components/DATANODE".parse().unwrap();
    let tree = ctx.plane.executor().execute(&instance, &fields(&[])).await.unwrap();
    let resource = tree.object().unwrap();
    assert_eq!(
        resource.property_string(&pid("HostRoles/service_name")).as_deref(),
        Some("HDFS")
    );
}

#[tokio::test]
async fn test_unknown_instance_is_no_such_resource() {
    let ctx = seeded().await;
    let path: NavigationPath = "/clusters/c1/services/s1/components/missing".parse().unwrap();

    let err = ctx.plane.executor().execute(&path, &fields(&[])).await.unwrap_err();

    assert!(matches!(
        err,
        CoreError::NoSuchResource {
            resource_type: ResourceType::Component,
            ..
        }
    ));
    assert!(err.is_client_error());
}

#[tokio::test]
async fn test_unrelated_ancestor_is_rejected() {
    let ctx = TestContext::new().await;
    let path: NavigationPath = "/hosts/h1/users".parse().unwrap();

    let err = ctx.plane.executor().execute(&path, &fields(&[])).await.unwrap_err();

    assert_eq!(
        err,
        CoreError::UnrelatedAncestor {
            resource_type: ResourceType::User,
            ancestor: ResourceType::Host,
        }
    );
}

#[tokio::test]
async fn test_malformed_temporal_field_is_invalid_request() {
    let ctx = TestContext::new().await;
    let path: NavigationPath = "/clusters/c1/hosts".parse().unwrap();

    let err = ctx
        .plane
        .executor()
        .execute(&path, &fields(&["metrics/cpu/cpu_user[abc]"]))
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::InvalidRequest { .. }));
}
