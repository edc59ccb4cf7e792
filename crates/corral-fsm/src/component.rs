// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Service component lifecycle.
//!
//! Tracks one component (e.g. `DATANODE`) placed on one host. Operator
//! commands (`INSTALL`, `START`, `STOP`, `UNINSTALL`, `WIPEOUT`) move the
//! component into an in-flight state; orchestration callbacks
//! (`OP_IN_PROGRESS`, `OP_SUCCEEDED`, `OP_FAILED`) settle it, and `OP_RESTART`
//! retries a failed operation.
//!
//! | From | Event | To |
//! |------|-------|----|
//! | `INIT` | `INSTALL` | `INSTALLING` |
//! | `INSTALLING` | `OP_SUCCEEDED` / `OP_FAILED` | `INSTALLED` / `INSTALL_FAILED` |
//! | `INSTALL_FAILED` | `OP_RESTART` | `INSTALLING` |
//! | `INSTALLED` | `START` / `UNINSTALL` / `INSTALL` | `STARTING` / `UNINSTALLING` / `INSTALLING` |
//! | `STARTING` | `OP_SUCCEEDED` / `OP_FAILED` | `STARTED` / `START_FAILED` |
//! | `START_FAILED` | `OP_RESTART` | `STARTING` |
//! | `STARTED` | `STOP` | `STOPPING` |
//! | `STOPPING` | `OP_SUCCEEDED` / `OP_FAILED` | `INSTALLED` / `STOP_FAILED` |
//! | `STOP_FAILED` | `OP_RESTART` | `STOPPING` |
//! | `UNINSTALLING` | `OP_SUCCEEDED` / `OP_FAILED` | `UNINSTALLED` / `UNINSTALL_FAILED` |
//! | `UNINSTALL_FAILED` | `OP_RESTART` | `UNINSTALLING` |
//! | `UNINSTALLED` | `WIPEOUT` | `WIPING_OUT` |
//! | `WIPING_OUT` | `OP_SUCCEEDED` / `OP_FAILED` | `INIT` / `WIPEOUT_FAILED` |
//! | `WIPEOUT_FAILED` | `OP_RESTART` | `WIPING_OUT` |
//!
//! Every in-flight state also accepts `OP_IN_PROGRESS` as a self-transition.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, LazyLock, Mutex};

use chrono::{DateTime, Utc};

use crate::factory::{StateMachineFactory, StateMachineFactoryBuilder};
use crate::machine::{StateMachine, StateMachineEvent};

/// Lifecycle state of a component on a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentState {
    /// Placed on the host, nothing installed yet.
    Init,
    /// Install in flight.
    Installing,
    /// Install failed.
    InstallFailed,
    /// Installed and stopped.
    Installed,
    /// Start in flight.
    Starting,
    /// Start failed.
    StartFailed,
    /// Running.
    Started,
    /// Stop in flight.
    Stopping,
    /// Stop failed.
    StopFailed,
    /// Uninstall in flight.
    Uninstalling,
    /// Uninstall failed.
    UninstallFailed,
    /// Uninstalled.
    Uninstalled,
    /// Wipe-out of leftover data in flight.
    WipingOut,
    /// Wipe-out failed.
    WipeoutFailed,
}

impl ComponentState {
    /// Every component state.
    pub const ALL: [ComponentState; 14] = [
        Self::Init,
        Self::Installing,
        Self::InstallFailed,
        Self::Installed,
        Self::Starting,
        Self::StartFailed,
        Self::Started,
        Self::Stopping,
        Self::StopFailed,
        Self::Uninstalling,
        Self::UninstallFailed,
        Self::Uninstalled,
        Self::WipingOut,
        Self::WipeoutFailed,
    ];

    /// States with an operation in flight.
    pub const IN_PROGRESS: [ComponentState; 5] = [
        Self::Installing,
        Self::Starting,
        Self::Stopping,
        Self::Uninstalling,
        Self::WipingOut,
    ];

    /// Returns the string representation of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::Installing => "INSTALLING",
            Self::InstallFailed => "INSTALL_FAILED",
            Self::Installed => "INSTALLED",
            Self::Starting => "STARTING",
            Self::StartFailed => "START_FAILED",
            Self::Started => "STARTED",
            Self::Stopping => "STOPPING",
            Self::StopFailed => "STOP_FAILED",
            Self::Uninstalling => "UNINSTALLING",
            Self::UninstallFailed => "UNINSTALL_FAILED",
            Self::Uninstalled => "UNINSTALLED",
            Self::WipingOut => "WIPING_OUT",
            Self::WipeoutFailed => "WIPEOUT_FAILED",
        }
    }

    /// Whether an operation is in flight.
    pub fn is_in_progress(&self) -> bool {
        Self::IN_PROGRESS.contains(self)
    }
}

impl fmt::Display for ComponentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown component state '{}'", s))
    }
}

/// Types of events a component machine reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentEventType {
    /// Install the component.
    Install,
    /// Start the component.
    Start,
    /// Stop the component.
    Stop,
    /// Uninstall the component.
    Uninstall,
    /// Remove leftover data after uninstall.
    Wipeout,
    /// The in-flight operation is still running.
    OpInProgress,
    /// The in-flight operation succeeded.
    OpSucceeded,
    /// The in-flight operation failed.
    OpFailed,
    /// Retry the operation that failed.
    OpRestart,
}

impl ComponentEventType {
    /// Every component event type.
    pub const ALL: [ComponentEventType; 9] = [
        Self::Install,
        Self::Start,
        Self::Stop,
        Self::Uninstall,
        Self::Wipeout,
        Self::OpInProgress,
        Self::OpSucceeded,
        Self::OpFailed,
        Self::OpRestart,
    ];

    /// Returns the string representation of the event type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Install => "INSTALL",
            Self::Start => "START",
            Self::Stop => "STOP",
            Self::Uninstall => "UNINSTALL",
            Self::Wipeout => "WIPEOUT",
            Self::OpInProgress => "OP_IN_PROGRESS",
            Self::OpSucceeded => "OP_SUCCEEDED",
            Self::OpFailed => "OP_FAILED",
            Self::OpRestart => "OP_RESTART",
        }
    }
}

impl fmt::Display for ComponentEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event for a component on a host.
#[derive(Debug, Clone)]
pub struct ComponentEvent {
    /// Component name.
    pub component_name: String,
    /// Host the component runs on.
    pub host_name: String,
    /// Type of the event.
    pub event_type: ComponentEventType,
    /// When the event was observed.
    pub timestamp: DateTime<Utc>,
}

impl ComponentEvent {
    /// Create an event observed now.
    pub fn new(
        component_name: impl Into<String>,
        host_name: impl Into<String>,
        event_type: ComponentEventType,
    ) -> Self {
        Self {
            component_name: component_name.into(),
            host_name: host_name.into(),
            event_type,
            timestamp: Utc::now(),
        }
    }

    /// Override the observation time.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

impl StateMachineEvent for ComponentEvent {
    type EventType = ComponentEventType;

    fn event_type(&self) -> ComponentEventType {
        self.event_type
    }
}

/// Timing of the last operation, recorded by transition hooks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationTimes {
    /// When the last operation started.
    pub last_op_start_time: Option<DateTime<Utc>>,
    /// When progress was last reported.
    pub last_op_last_update_time: Option<DateTime<Utc>>,
    /// When the last operation finished (success or failure).
    pub last_op_end_time: Option<DateTime<Utc>>,
}

/// A component placed on a host; owner of a component state machine.
#[derive(Debug)]
pub struct ComponentRecord {
    cluster_name: String,
    service_name: String,
    component_name: String,
    host_name: String,
    times: Mutex<OperationTimes>,
}

impl ComponentRecord {
    /// Create a component placement.
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
            times: Mutex::new(OperationTimes::default()),
        }
    }

    /// Cluster name.
    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    /// Service name.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Component name.
    pub fn component_name(&self) -> &str {
        &self.component_name
    }

    /// Host name.
    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    /// Snapshot of the operation timing.
    pub fn operation_times(&self) -> OperationTimes {
        *self.times.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn update(&self, f: impl FnOnce(&mut OperationTimes)) {
        let mut times = self.times.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut times);
    }
}

/// State machine for one component on one host.
pub type ComponentStateMachine = StateMachine<Arc<ComponentRecord>, ComponentState, ComponentEvent>;

/// Frozen component transition table.
pub type ComponentStateMachineFactory =
    StateMachineFactory<Arc<ComponentRecord>, ComponentState, ComponentEvent>;

static FACTORY: LazyLock<Arc<ComponentStateMachineFactory>> = LazyLock::new(|| {
    build_factory().expect("component transition table has no duplicate entries")
});

/// The shared component transition table.
pub fn component_state_machine_factory() -> Arc<ComponentStateMachineFactory> {
    FACTORY.clone()
}

fn build_factory() -> Result<Arc<ComponentStateMachineFactory>, crate::FactoryError> {
    use ComponentEventType as Ev;
    use ComponentState as St;

    // (in-flight, settled on success, settled on failure)
    let operations = [
        (St::Installing, St::Installed, St::InstallFailed),
        (St::Starting, St::Started, St::StartFailed),
        (St::Stopping, St::Installed, St::StopFailed),
        (St::Uninstalling, St::Uninstalled, St::UninstallFailed),
        (St::WipingOut, St::Init, St::WipeoutFailed),
    ];

    let mut builder = StateMachineFactoryBuilder::new(St::Init)
        .add_transitions_with_hook(&[St::Init, St::Installed], St::Installing, Ev::Install, op_started)
        .add_transition_with_hook(St::Installed, St::Starting, Ev::Start, op_started)
        .add_transition_with_hook(St::Started, St::Stopping, Ev::Stop, op_started)
        .add_transition_with_hook(St::Installed, St::Uninstalling, Ev::Uninstall, op_started)
        .add_transition_with_hook(St::Uninstalled, St::WipingOut, Ev::Wipeout, op_started);

    for (in_flight, succeeded, failed) in operations {
        builder = builder
            .add_transition_with_hook(in_flight, in_flight, Ev::OpInProgress, op_progressed)
            .add_transition_with_hook(in_flight, succeeded, Ev::OpSucceeded, op_finished)
            .add_transition_with_hook(in_flight, failed, Ev::OpFailed, op_finished)
            .add_transition_with_hook(failed, in_flight, Ev::OpRestart, op_started);
    }

    builder.freeze()
}

fn op_started(record: &Arc<ComponentRecord>, event: &ComponentEvent) -> Result<(), crate::HookError> {
    record.update(|t| {
        t.last_op_start_time = Some(event.timestamp);
        t.last_op_last_update_time = Some(event.timestamp);
        t.last_op_end_time = None;
    });
    Ok(())
}

fn op_progressed(
    record: &Arc<ComponentRecord>,
    event: &ComponentEvent,
) -> Result<(), crate::HookError> {
    record.update(|t| t.last_op_last_update_time = Some(event.timestamp));
    Ok(())
}

fn op_finished(record: &Arc<ComponentRecord>, event: &ComponentEvent) -> Result<(), crate::HookError> {
    record.update(|t| {
        t.last_op_last_update_time = Some(event.timestamp);
        t.last_op_end_time = Some(event.timestamp);
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn machine() -> (Arc<ComponentRecord>, ComponentStateMachine) {
        let record = Arc::new(ComponentRecord::new("c1", "HDFS", "DATANODE", "h1"));
        let machine = component_state_machine_factory().make(record.clone());
        (record, machine)
    }

    fn event(event_type: ComponentEventType) -> ComponentEvent {
        ComponentEvent::new("DATANODE", "h1", event_type)
    }

    #[test]
    fn test_table_builds() {
        let factory = build_factory().unwrap();
        assert_eq!(factory.initial_state(), ComponentState::Init);
    }

    #[test]
    fn test_operation_times_follow_lifecycle() {
        let (record, machine) = machine();
        let start = Utc::now();

        machine
            .handle_event(&event(ComponentEventType::Install).at(start))
            .unwrap();
        let times = record.operation_times();
        assert_eq!(times.last_op_start_time, Some(start));
        assert_eq!(times.last_op_end_time, None);

        let progress = start + Duration::seconds(5);
        machine
            .handle_event(&event(ComponentEventType::OpInProgress).at(progress))
            .unwrap();
        assert_eq!(record.operation_times().last_op_last_update_time, Some(progress));

        let end = start + Duration::seconds(9);
        machine
            .handle_event(&event(ComponentEventType::OpSucceeded).at(end))
            .unwrap();
        let times = record.operation_times();
        assert_eq!(times.last_op_start_time, Some(start));
        assert_eq!(times.last_op_end_time, Some(end));
        assert_eq!(machine.current_state(), ComponentState::Installed);
    }

    #[test]
    fn test_wipeout_returns_to_init() {
        let (_, machine) = machine();
        machine.restore_state(ComponentState::Uninstalled);

        machine.handle_event(&event(ComponentEventType::Wipeout)).unwrap();
        machine.handle_event(&event(ComponentEventType::OpSucceeded)).unwrap();

        assert_eq!(machine.current_state(), ComponentState::Init);
    }

    #[test]
    fn test_in_progress_states() {
        assert!(ComponentState::Stopping.is_in_progress());
        assert!(!ComponentState::StopFailed.is_in_progress());
        assert_eq!(
            "start_failed".parse::<ComponentState>().unwrap(),
            ComponentState::StartFailed
        );
    }
}
