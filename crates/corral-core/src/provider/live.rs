// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Providers backed by the live [`ClusterState`].
//!
//! Host components are served straight from their state machines. Updating
//! `HostRoles/desired_state` is how lifecycle operations are requested: the
//! provider picks the event that moves each matching component towards the
//! desired state, applies it, and hands the resulting commands to the
//! [`CommandDispatcher`].

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use corral_fsm::component::{ComponentEventType, ComponentState};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::{PropertyProvider, ResourceProvider, project, requested_owned};
use crate::error::{CoreError, Result};
use crate::live::{ClusterState, CommandDispatcher, HostCommand, HostComponentEntry, HostComponentKey, RoleCommand};
use crate::predicate::Predicate;
use crate::request::{PropertyMap, Request, RequestStatus};
use crate::resource::{PropertyId, Resource, ResourceType};

const HOST_ROLES: &str = "HostRoles";

fn host_roles(name: &str) -> PropertyId {
    PropertyId::new(name, HOST_ROLES)
}

fn rfc3339(time: Option<DateTime<Utc>>) -> Value {
    time.map(|t| Value::String(t.to_rfc3339())).unwrap_or(Value::Null)
}

/// Event that moves a component from `current` towards `desired`.
///
/// `None` when the component is already there. Failed operations are
/// retried with `OP_RESTART` rather than started over.
pub fn event_towards(current: ComponentState, desired: ComponentState) -> Result<Option<ComponentEventType>> {
    use ComponentEventType as Ev;
    use ComponentState as St;

    if current == desired {
        return Ok(None);
    }
    let event = match desired {
        St::Installed => match current {
            St::Started => Ev::Stop,
            St::InstallFailed | St::StopFailed => Ev::OpRestart,
            _ => Ev::Install,
        },
        St::Started => match current {
            St::StartFailed => Ev::OpRestart,
            _ => Ev::Start,
        },
        St::Uninstalled => match current {
            St::UninstallFailed => Ev::OpRestart,
            _ => Ev::Uninstall,
        },
        St::Init => match current {
            St::WipeoutFailed => Ev::OpRestart,
            _ => Ev::Wipeout,
        },
        other => {
            return Err(CoreError::invalid_request(format!(
                "{} is not a valid desired state",
                other
            )));
        }
    };
    Ok(Some(event))
}

/// Resource provider for host components, backed by their state machines.
pub struct LiveHostComponentProvider {
    state: Arc<ClusterState>,
    dispatcher: Arc<dyn CommandDispatcher>,
    identity: Vec<PropertyId>,
    update_lock: Mutex<()>,
}

/// One component's change within a lifecycle request, kept until the
/// request has been handed to the dispatcher.
struct AppliedChange {
    entry: Arc<HostComponentEntry>,
    prior_state: ComponentState,
    prior_desired: ComponentState,
    next: Option<ComponentState>,
}

/// Undo `applied` in reverse order. A component that has moved on since the
/// change keeps its newer state.
fn roll_back(applied: &[AppliedChange]) {
    for change in applied.iter().rev() {
        if let Some(next) = change.next {
            let current = change.entry.current_state();
            if current == next {
                change.entry.machine().restore_state(change.prior_state);
            } else {
                warn!(host_component = %change.entry.key(), state = %current, "Component moved on, not rolled back");
            }
        }
        change.entry.set_desired_state(change.prior_desired);
    }
}

impl std::fmt::Debug for LiveHostComponentProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveHostComponentProvider")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl LiveHostComponentProvider {
    /// Serve host components from `state`, sending commands to `dispatcher`.
    pub fn new(state: Arc<ClusterState>, dispatcher: Arc<dyn CommandDispatcher>) -> Self {
        Self {
            state,
            dispatcher,
            identity: ["cluster_name", "service_name", "component_name", "host_name"]
                .into_iter()
                .map(host_roles)
                .collect(),
            update_lock: Mutex::new(()),
        }
    }

    fn to_resource(entry: &HostComponentEntry) -> Resource {
        let key = entry.key();
        let times = entry.operation_times();
        let mut resource = Resource::new(ResourceType::HostComponent);
        resource.set_property(&host_roles("cluster_name"), key.cluster_name.as_str());
        resource.set_property(&host_roles("service_name"), key.service_name.as_str());
        resource.set_property(&host_roles("component_name"), key.component_name.as_str());
        resource.set_property(&host_roles("host_name"), key.host_name.as_str());
        resource.set_property(&host_roles("state"), entry.current_state().as_str());
        resource.set_property(&host_roles("desired_state"), entry.desired_state().as_str());
        resource.set_property(&host_roles("last_op_start_time"), rfc3339(times.last_op_start_time));
        resource.set_property(&host_roles("last_op_end_time"), rfc3339(times.last_op_end_time));
        resource
    }

    /// Entries whose resource passes `predicate`. Reads keep entries that
    /// could match once decorated; mutations require a definite match.
    async fn matching(&self, predicate: Option<&Predicate>, exact: bool) -> Vec<(Arc<HostComponentEntry>, Resource)> {
        self.state
            .host_components()
            .await
            .into_iter()
            .map(|entry| {
                let resource = Self::to_resource(&entry);
                (entry, resource)
            })
            .filter(|(_, resource)| {
                predicate.is_none_or(|p| if exact { p.evaluate(resource) } else { p.may_match(resource) })
            })
            .collect()
    }

    fn key_from(&self, properties: &PropertyMap) -> Result<HostComponentKey> {
        let field = |name: &str| -> Result<String> {
            match properties.get(&host_roles(name)) {
                Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
                _ => Err(CoreError::invalid_request(format!(
                    "host components require key property {}/{}",
                    HOST_ROLES, name
                ))),
            }
        };
        Ok(HostComponentKey::new(
            field("cluster_name")?,
            field("service_name")?,
            field("component_name")?,
            field("host_name")?,
        ))
    }
}

#[async_trait::async_trait]
impl ResourceProvider for LiveHostComponentProvider {
    fn resource_type(&self) -> ResourceType {
        ResourceType::HostComponent
    }

    #[instrument(skip(self, request, predicate))]
    async fn get_resources(&self, request: &Request, predicate: Option<&Predicate>) -> Result<Vec<Resource>> {
        Ok(self
            .matching(predicate, false)
            .await
            .into_iter()
            .map(|(_, mut resource)| {
                project(&mut resource, request, &self.identity);
                resource
            })
            .collect())
    }

    #[instrument(skip(self, request))]
    async fn create_resources(&self, request: &Request) -> Result<RequestStatus> {
        let keys = request
            .properties()
            .iter()
            .map(|properties| self.key_from(properties))
            .collect::<Result<Vec<_>>>()?;

        let mut created = Vec::with_capacity(keys.len());
        for key in keys {
            let entry = self.state.add_host_component(key).await?;
            created.push(Self::to_resource(&entry));
        }
        Ok(RequestStatus::complete(created))
    }

    #[instrument(skip(self, request, predicate))]
    async fn update_resources(&self, request: &Request, predicate: Option<&Predicate>) -> Result<RequestStatus> {
        let properties = request.merged_properties();
        if let Some(changed) = properties
            .keys()
            .find(|id| self.identity.contains(id) || **id == host_roles("state"))
        {
            return Err(CoreError::invalid_request(format!("{} cannot be updated", changed)));
        }
        let desired = match properties.get(&host_roles("desired_state")) {
            Some(Value::String(s)) => s.parse::<ComponentState>().map_err(CoreError::invalid_request)?,
            Some(other) => {
                return Err(CoreError::invalid_request(format!("invalid desired state {}", other)));
            }
            None => {
                return Err(CoreError::invalid_request(format!(
                    "host component updates require {}/desired_state",
                    HOST_ROLES
                )));
            }
        };

        let _serialized = self.update_lock.lock().await;
        let matches = self.matching(predicate, true).await;

        // Check every transition before applying any, so a rejected update
        // leaves all components untouched.
        let mut planned = Vec::with_capacity(matches.len());
        for (entry, _) in matches {
            let current = entry.current_state();
            let event = event_towards(current, desired)?;
            if let Some(event) = event
                && !entry.machine().factory().can_handle(current, event)
            {
                return Err(CoreError::InvalidStateTransition {
                    entity: entry.key().to_string(),
                    state: current.to_string(),
                    event_type: event.to_string(),
                });
            }
            planned.push((entry, event));
        }

        let request_id = Uuid::new_v4();
        let mut applied: Vec<AppliedChange> = Vec::with_capacity(planned.len());
        let mut commands = Vec::new();
        for (entry, event) in planned {
            let prior_state = entry.current_state();
            let prior_desired = entry.desired_state();
            let next = match event {
                Some(event) => match entry.handle_event(event) {
                    Ok(next) => Some(next),
                    Err(e) => {
                        // moved by a concurrent component event since planning
                        roll_back(&applied);
                        return Err(e);
                    }
                },
                None => None,
            };
            entry.set_desired_state(desired);
            if let Some(command) = next.and_then(RoleCommand::for_state) {
                let key = entry.key();
                commands.push(HostCommand {
                    request_id,
                    cluster_name: key.cluster_name.clone(),
                    service_name: key.service_name.clone(),
                    component_name: key.component_name.clone(),
                    host_name: key.host_name.clone(),
                    command,
                });
            }
            applied.push(AppliedChange {
                entry,
                prior_state,
                prior_desired,
                next,
            });
        }

        let associated: Vec<Resource> = applied.iter().map(|c| Self::to_resource(&c.entry)).collect();
        if commands.is_empty() {
            debug!(updated = associated.len(), "No commands to dispatch");
            return Ok(RequestStatus::complete(associated));
        }

        info!(request_id = %request_id, commands = commands.len(), desired = %desired, "Dispatching lifecycle request");
        if let Err(e) = self.dispatcher.dispatch(request_id, commands).await {
            warn!(request_id = %request_id, error = %e, "Dispatch failed, rolling back lifecycle request");
            roll_back(&applied);
            return Err(e);
        }
        Ok(RequestStatus::in_progress(request_id, associated))
    }

    #[instrument(skip(self, predicate))]
    async fn delete_resources(&self, predicate: Option<&Predicate>) -> Result<RequestStatus> {
        let _serialized = self.update_lock.lock().await;
        let mut removed = Vec::new();
        for (entry, resource) in self.matching(predicate, true).await {
            self.state.remove_host_component(entry.key()).await?;
            removed.push(resource);
        }
        Ok(RequestStatus::complete(removed))
    }
}

/// Decorates hosts with their lifecycle state and agent-reported details.
#[derive(Debug)]
pub struct LiveHostPropertyProvider {
    state: Arc<ClusterState>,
    host_name: PropertyId,
    property_ids: BTreeSet<PropertyId>,
}

impl LiveHostPropertyProvider {
    /// Read host details from `state`.
    pub fn new(state: Arc<ClusterState>) -> Self {
        Self {
            state,
            host_name: PropertyId::new("host_name", "Hosts"),
            property_ids: [
                "host_state",
                "host_status",
                "last_heartbeat_time",
                "last_registration_time",
                "agent_version",
                "health_report",
            ]
            .into_iter()
            .map(|name| PropertyId::new(name, "Hosts"))
            .collect(),
        }
    }
}

#[async_trait::async_trait]
impl PropertyProvider for LiveHostPropertyProvider {
    fn name(&self) -> &str {
        "live-host"
    }

    fn resource_type(&self) -> ResourceType {
        ResourceType::Host
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
        let wanted = requested_owned(&self.property_ids, request);
        let mut maps = Vec::with_capacity(resources.len());
        for resource in resources {
            let mut map = PropertyMap::new();
            let machine = match resource.property_string(&self.host_name) {
                Some(name) => self.state.host(&name).await,
                None => None,
            };
            if let Some(machine) = machine {
                let state = machine.current_state();
                let details = machine.owner().details();
                for id in &wanted {
                    let value = match id.name() {
                        "host_state" => Value::from(state.as_str()),
                        "host_status" => Value::from(state.health_status()),
                        "last_heartbeat_time" => rfc3339(details.last_heartbeat_time),
                        "last_registration_time" => rfc3339(details.last_registration_time),
                        "agent_version" => details.agent_version.clone().map(Value::from).unwrap_or(Value::Null),
                        "health_report" => details.health_report.clone().map(Value::from).unwrap_or(Value::Null),
                        _ => continue,
                    };
                    map.insert(id.clone(), value);
                }
            }
            maps.push(map);
        }
        Ok(maps)
    }
}

/// Decorates components with counts of their host components by state.
#[derive(Debug)]
pub struct ComponentCountPropertyProvider {
    state: Arc<ClusterState>,
    property_ids: BTreeSet<PropertyId>,
}

impl ComponentCountPropertyProvider {
    /// Count host components tracked in `state`.
    pub fn new(state: Arc<ClusterState>) -> Self {
        Self {
            state,
            property_ids: ["total_count", "started_count", "installed_count"]
                .into_iter()
                .map(|name| PropertyId::new(name, "ServiceComponentInfo"))
                .collect(),
        }
    }
}

#[async_trait::async_trait]
impl PropertyProvider for ComponentCountPropertyProvider {
    fn name(&self) -> &str {
        "component-count"
    }

    fn resource_type(&self) -> ResourceType {
        ResourceType::Component
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
        let wanted = requested_owned(&self.property_ids, request);
        let entries = self.state.host_components().await;
        let info = |name: &str| PropertyId::new(name, "ServiceComponentInfo");

        let mut maps = Vec::with_capacity(resources.len());
        for resource in resources {
            let (Some(cluster), Some(service), Some(component)) = (
                resource.property_string(&info("cluster_name")),
                resource.property_string(&info("service_name")),
                resource.property_string(&info("component_name")),
            ) else {
                maps.push(PropertyMap::new());
                continue;
            };

            let states: Vec<ComponentState> = entries
                .iter()
                .filter(|e| {
                    let key = e.key();
                    key.cluster_name == cluster && key.service_name == service && key.component_name == component
                })
                .map(|e| e.current_state())
                .collect();
            let count = |state: ComponentState| states.iter().filter(|s| **s == state).count();

            let mut map = PropertyMap::new();
            for id in &wanted {
                let value = match id.name() {
                    "total_count" => states.len(),
                    "started_count" => count(ComponentState::Started),
                    "installed_count" => count(ComponentState::Installed),
                    _ => continue,
                };
                map.insert(id.clone(), Value::from(value));
            }
            maps.push(map);
        }
        Ok(maps)
    }
}
