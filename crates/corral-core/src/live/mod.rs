// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Live cluster state: the hosts and host components currently known, each
//! driven by its lifecycle state machine.
//!
//! Maps are guarded by `tokio::sync::RwLock` and only held to look up or
//! insert entries. Events are applied on the entity's own state machine
//! after the map lock is released, so different entities never contend.

pub mod orchestration;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use corral_fsm::TransitionError;
use corral_fsm::component::{
    ComponentEvent, ComponentEventType, ComponentRecord, ComponentState, ComponentStateMachine,
    ComponentStateMachineFactory, OperationTimes, component_state_machine_factory,
};
use corral_fsm::host::{
    HostEvent, HostEventType, HostRecord, HostState, HostStateMachine, HostStateMachineFactory,
    host_state_machine_factory,
};
use tokio::sync::RwLock;
use tracing::{debug, info};

pub use self::orchestration::{CommandDispatcher, HostCommand, LoggingDispatcher, RoleCommand};

use crate::error::{CoreError, Result};
use crate::predicate::Predicate;
use crate::resource::{PropertyId, ResourceType};

/// Identity of a component placed on a host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostComponentKey {
    /// Cluster name.
    pub cluster_name: String,
    /// Service name.
    pub service_name: String,
    /// Component name.
    pub component_name: String,
    /// Host name.
    pub host_name: String,
}

impl HostComponentKey {
    /// Build a key.
    pub fn new(
        cluster_name: impl Into<String>,
        service_name: impl Into<String>,
        component_name: impl Into<String>,
        host_name: impl Into<String>,
    ) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            service_name: service_name.into(),
            component_name: component_name.into(),
            host_name: host_name.into(),
        }
    }
}

impl fmt::Display for HostComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}@{}",
            self.cluster_name, self.service_name, self.component_name, self.host_name
        )
    }
}

/// A host component's state machine and desired state.
#[derive(Debug)]
pub struct HostComponentEntry {
    key: HostComponentKey,
    machine: ComponentStateMachine,
    desired_state: Mutex<ComponentState>,
}

impl HostComponentEntry {
    /// Identity.
    pub fn key(&self) -> &HostComponentKey {
        &self.key
    }

    /// The lifecycle state machine.
    pub fn machine(&self) -> &ComponentStateMachine {
        &self.machine
    }

    /// Current lifecycle state.
    pub fn current_state(&self) -> ComponentState {
        self.machine.current_state()
    }

    /// State the component was last asked to reach.
    pub fn desired_state(&self) -> ComponentState {
        *self
            .desired_state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record the state the component should reach.
    pub fn set_desired_state(&self, state: ComponentState) {
        *self
            .desired_state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = state;
    }

    /// Timing of the last operation.
    pub fn operation_times(&self) -> OperationTimes {
        self.machine.owner().operation_times()
    }

    /// Apply an event to the component's state machine.
    pub fn handle_event(&self, event_type: ComponentEventType) -> Result<ComponentState> {
        let event = ComponentEvent::new(&self.key.component_name, &self.key.host_name, event_type);
        self.machine
            .handle_event(&event)
            .map_err(|e| transition_error(&self.key.to_string(), e))
    }
}

/// Hosts and host components known to the control plane.
pub struct ClusterState {
    hosts: RwLock<BTreeMap<String, Arc<HostStateMachine>>>,
    host_components: RwLock<BTreeMap<HostComponentKey, Arc<HostComponentEntry>>>,
    host_factory: Arc<HostStateMachineFactory>,
    component_factory: Arc<ComponentStateMachineFactory>,
}

impl Default for ClusterState {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ClusterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterState").finish_non_exhaustive()
    }
}

impl ClusterState {
    /// Empty state using the built-in lifecycle tables.
    pub fn new() -> Self {
        Self {
            hosts: RwLock::new(BTreeMap::new()),
            host_components: RwLock::new(BTreeMap::new()),
            host_factory: host_state_machine_factory(),
            component_factory: component_state_machine_factory(),
        }
    }

    /// Track a new host, in its initial state.
    pub async fn add_host(&self, host_name: &str, cluster_name: Option<String>) -> Result<Arc<HostStateMachine>> {
        let mut hosts = self.hosts.write().await;
        if hosts.contains_key(host_name) {
            return Err(CoreError::ResourceAlreadyExists {
                resource_type: ResourceType::Host,
                key: host_name.to_string(),
            });
        }
        let machine = Arc::new(
            self.host_factory
                .make(Arc::new(HostRecord::new(host_name, cluster_name))),
        );
        hosts.insert(host_name.to_string(), machine.clone());
        info!(host = host_name, "Host added");
        Ok(machine)
    }

    /// Look up a host.
    pub async fn host(&self, host_name: &str) -> Option<Arc<HostStateMachine>> {
        self.hosts.read().await.get(host_name).cloned()
    }

    /// Every known host, ordered by name.
    pub async fn hosts(&self) -> Vec<Arc<HostStateMachine>> {
        self.hosts.read().await.values().cloned().collect()
    }

    /// Apply a host event. A registration from an unknown host adds it.
    pub async fn handle_host_event(&self, event: &HostEvent) -> Result<HostState> {
        let machine = match self.host(&event.host_name).await {
            Some(machine) => machine,
            None if event.event_type == HostEventType::RegistrationRequest => {
                match self.add_host(&event.host_name, None).await {
                    Ok(machine) => machine,
                    // lost a race with another registration
                    Err(CoreError::ResourceAlreadyExists { .. }) => {
                        self.host(&event.host_name).await.ok_or_else(|| no_such_host(&event.host_name))?
                    }
                    Err(e) => return Err(e),
                }
            }
            None => return Err(no_such_host(&event.host_name)),
        };

        let state = machine
            .handle_event(event)
            .map_err(|e| transition_error(&event.host_name, e))?;
        debug!(host = %event.host_name, event = %event.event_type, state = %state, "Host event applied");
        Ok(state)
    }

    /// Place a component on a host, in its initial state.
    pub async fn add_host_component(&self, key: HostComponentKey) -> Result<Arc<HostComponentEntry>> {
        let mut entries = self.host_components.write().await;
        if entries.contains_key(&key) {
            return Err(CoreError::ResourceAlreadyExists {
                resource_type: ResourceType::HostComponent,
                key: key.to_string(),
            });
        }
        let record = ComponentRecord::new(
            &key.cluster_name,
            &key.service_name,
            &key.component_name,
            &key.host_name,
        );
        let machine = self.component_factory.make(Arc::new(record));
        let entry = Arc::new(HostComponentEntry {
            desired_state: Mutex::new(machine.current_state()),
            key: key.clone(),
            machine,
        });
        entries.insert(key, entry.clone());
        info!(host_component = %entry.key(), "Host component added");
        Ok(entry)
    }

    /// Look up a host component.
    pub async fn host_component(&self, key: &HostComponentKey) -> Option<Arc<HostComponentEntry>> {
        self.host_components.read().await.get(key).cloned()
    }

    /// Every host component, ordered by key.
    pub async fn host_components(&self) -> Vec<Arc<HostComponentEntry>> {
        self.host_components.read().await.values().cloned().collect()
    }

    /// Apply a component event, typically an orchestration callback.
    pub async fn handle_component_event(
        &self,
        key: &HostComponentKey,
        event_type: ComponentEventType,
    ) -> Result<ComponentState> {
        let entry = self
            .host_component(key)
            .await
            .ok_or_else(|| no_such_host_component(key))?;
        let state = entry.handle_event(event_type)?;
        debug!(host_component = %key, event = %event_type, state = %state, "Component event applied");
        Ok(state)
    }

    /// Stop tracking a host component. Refused while an operation is in flight.
    pub async fn remove_host_component(&self, key: &HostComponentKey) -> Result<Arc<HostComponentEntry>> {
        let mut entries = self.host_components.write().await;
        let entry = entries.get(key).ok_or_else(|| no_such_host_component(key))?;
        let state = entry.current_state();
        if state.is_in_progress() {
            return Err(CoreError::invalid_request(format!(
                "host component {} cannot be removed while {}",
                key, state
            )));
        }
        let removed = entries.remove(key).ok_or_else(|| no_such_host_component(key))?;
        info!(host_component = %key, "Host component removed");
        Ok(removed)
    }
}

fn no_such_host(host_name: &str) -> CoreError {
    CoreError::NoSuchResource {
        resource_type: ResourceType::Host,
        predicate: Predicate::equals(PropertyId::new("host_name", "Hosts"), host_name).to_string(),
    }
}

fn no_such_host_component(key: &HostComponentKey) -> CoreError {
    let field = |name: &str, value: &str| Predicate::equals(PropertyId::new(name, "HostRoles"), value);
    CoreError::NoSuchResource {
        resource_type: ResourceType::HostComponent,
        predicate: Predicate::and([
            field("cluster_name", &key.cluster_name),
            field("service_name", &key.service_name),
            field("component_name", &key.component_name),
            field("host_name", &key.host_name),
        ])
        .to_string(),
    }
}

fn transition_error<S, T>(entity: &str, err: TransitionError<S, T>) -> CoreError
where
    S: Copy + fmt::Display,
    T: Copy + fmt::Display,
{
    match err {
        TransitionError::InvalidStateTransition { state, event_type } => {
            CoreError::InvalidStateTransition {
                entity: entity.to_string(),
                state: state.to_string(),
                event_type: event_type.to_string(),
            }
        }
        hook_failed @ TransitionError::HookFailed { .. } => CoreError::Backend {
            operation: "transition hook".to_string(),
            details: hook_failed.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn namenode() -> HostComponentKey {
        HostComponentKey::new("c1", "HDFS", "NAMENODE", "h1")
    }

    #[tokio::test]
    async fn test_registration_adds_unknown_host() {
        let state = ClusterState::new();

        let host_state = state
            .handle_host_event(&HostEvent::registration("h1", "2.0.0"))
            .await
            .unwrap();

        assert_eq!(host_state, HostState::WaitingForVerification);
        assert!(state.host("h1").await.is_some());
    }

    #[tokio::test]
    async fn test_heartbeat_from_unknown_host_is_not_found() {
        let state = ClusterState::new();

        let err = state
            .handle_host_event(&HostEvent::heartbeat_healthy("ghost"))
            .await
            .unwrap_err();

        assert_eq!(err.error_code(), "NO_SUCH_RESOURCE");
    }

    #[tokio::test]
    async fn test_invalid_host_event_maps_to_core_error() {
        let state = ClusterState::new();
        state.add_host("h1", Some("c1".to_string())).await.unwrap();

        let err = state
            .handle_host_event(&HostEvent::heartbeat_healthy("h1"))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            CoreError::InvalidStateTransition {
                entity: "h1".to_string(),
                state: "INIT".to_string(),
                event_type: HostEventType::HeartbeatHealthy.to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_component_events() {
        let state = ClusterState::new();
        state.add_host_component(namenode()).await.unwrap();

        let next = state
            .handle_component_event(&namenode(), ComponentEventType::Install)
            .await
            .unwrap();
        assert_eq!(next, ComponentState::Installing);

        let err = state
            .handle_component_event(&namenode(), ComponentEventType::Start)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_STATE_TRANSITION");
        assert_eq!(
            state.host_component(&namenode()).await.unwrap().current_state(),
            ComponentState::Installing
        );
    }

    #[tokio::test]
    async fn test_duplicate_host_component() {
        let state = ClusterState::new();
        state.add_host_component(namenode()).await.unwrap();

        let err = state.add_host_component(namenode()).await.unwrap_err();
        assert_eq!(err.error_code(), "RESOURCE_ALREADY_EXISTS");
    }

    #[tokio::test]
    async fn test_remove_refused_while_in_flight() {
        let state = ClusterState::new();
        state.add_host_component(namenode()).await.unwrap();
        state
            .handle_component_event(&namenode(), ComponentEventType::Install)
            .await
            .unwrap();

        assert!(state.remove_host_component(&namenode()).await.is_err());

        state
            .handle_component_event(&namenode(), ComponentEventType::OpSucceeded)
            .await
            .unwrap();
        state.remove_host_component(&namenode()).await.unwrap();
        assert!(state.host_components().await.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_events_on_different_entities() {
        let state = Arc::new(ClusterState::new());
        let keys: Vec<_> = (0..16)
            .map(|i| HostComponentKey::new("c1", "HDFS", "DATANODE", format!("h{}", i)))
            .collect();
        for key in &keys {
            state.add_host_component(key.clone()).await.unwrap();
        }

        let handles: Vec<_> = keys
            .iter()
            .cloned()
            .map(|key| {
                let state = state.clone();
                tokio::spawn(async move {
                    state
                        .handle_component_event(&key, ComponentEventType::Install)
                        .await
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), ComponentState::Installing);
        }
    }
}
