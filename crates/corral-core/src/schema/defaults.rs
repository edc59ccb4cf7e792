// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Built-in schemas for every resource type.

use std::collections::HashMap;

use super::{Schema, SchemaSource};
use crate::error::SchemaError;
use crate::resource::ResourceType;

/// Schemas compiled into the crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinSchemaSource;

impl SchemaSource for BuiltinSchemaSource {
    fn load_schemas(&self) -> Result<HashMap<ResourceType, Schema>, SchemaError> {
        Ok(ResourceType::ALL
            .into_iter()
            .map(|ty| (ty, builtin_schema(ty)))
            .collect())
    }
}

fn builtin_schema(resource_type: ResourceType) -> Schema {
    use ResourceType::*;

    let builder = Schema::builder(resource_type);
    match resource_type {
        Cluster => builder
            .key_property(Cluster, "Clusters/cluster_name")
            .property("Clusters/version")
            .property("Clusters/provisioning_state"),
        Service => builder
            .key_property(Cluster, "ServiceInfo/cluster_name")
            .key_property(Service, "ServiceInfo/service_name")
            .property("ServiceInfo/state")
            .property("ServiceInfo/maintenance_state"),
        Component => builder
            .key_property(Cluster, "ServiceComponentInfo/cluster_name")
            .key_property(Service, "ServiceComponentInfo/service_name")
            .key_property(Component, "ServiceComponentInfo/component_name")
            .property("ServiceComponentInfo/category")
            .property("ServiceComponentInfo/state")
            .property("ServiceComponentInfo/total_count")
            .property("ServiceComponentInfo/started_count")
            .property("ServiceComponentInfo/installed_count"),
        Host => builder
            .key_property(Cluster, "Hosts/cluster_name")
            .key_property(Host, "Hosts/host_name")
            .property("Hosts/ip")
            .property("Hosts/os_type")
            .property("Hosts/cpu_count")
            .property("Hosts/total_mem")
            .property("Hosts/rack_info")
            .property("Hosts/host_state")
            .property("Hosts/host_status")
            .property("Hosts/health_report")
            .property("Hosts/agent_version")
            .property("Hosts/last_heartbeat_time")
            .property("Hosts/last_registration_time")
            .temporal_property("metrics/cpu/cpu_user")
            .temporal_property("metrics/cpu/cpu_system")
            .temporal_property("metrics/memory/mem_free")
            .temporal_property("metrics/load/load_one"),
        // A host component is listed by component name under its host, and by
        // host name under its component.
        HostComponent => builder
            .key_property(Cluster, "HostRoles/cluster_name")
            .key_property(Service, "HostRoles/service_name")
            .key_property(Component, "HostRoles/component_name")
            .key_property(Host, "HostRoles/host_name")
            .key_property(HostComponent, "HostRoles/component_name")
            .property("HostRoles/state")
            .property("HostRoles/desired_state")
            .property("HostRoles/last_op_start_time")
            .property("HostRoles/last_op_end_time"),
        Configuration => builder
            .key_property(Cluster, "Config/cluster_name")
            .key_property(Configuration, "Config/tag")
            .property("Config/type")
            .property("Config/version")
            .property("properties"),
        Request => builder
            .key_property(Cluster, "Requests/cluster_name")
            .key_property(Request, "Requests/id")
            .property("Requests/request_status")
            .property("Requests/request_context")
            .property("Requests/create_time")
            .property("Requests/progress_percent"),
        Task => builder
            .key_property(Cluster, "Tasks/cluster_name")
            .key_property(Request, "Tasks/request_id")
            .key_property(Task, "Tasks/id")
            .property("Tasks/host_name")
            .property("Tasks/role")
            .property("Tasks/command")
            .property("Tasks/status")
            .property("Tasks/exit_code")
            .property("Tasks/start_time")
            .property("Tasks/end_time"),
        User => builder
            .key_property(User, "Users/user_name")
            .property("Users/active")
            .property("Users/admin")
            .property("Users/ldap_user"),
    }
    .build()
}
