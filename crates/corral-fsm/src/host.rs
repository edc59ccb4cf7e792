// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Host lifecycle.
//!
//! ```text
//!                 ┌──────┐
//!                 │ INIT │
//!                 └──┬───┘
//!                    │ HOST_REGISTRATION_REQUEST
//!                    ▼
//!      ┌──────────────────────────┐  HOST_HEARTBEAT_LOST
//!      │ WAITING_FOR_VERIFICATION │──────────────────────┐
//!      └────────────┬─────────────┘                      │
//!                   │ HOST_STATUS_UPDATES_RECEIVED       │
//!                   ▼                                    ▼
//!              ┌─────────┐  UNHEALTHY   ┌───────────┐  LOST  ┌────────────────┐
//!              │ HEALTHY │◄────────────►│ UNHEALTHY │───────►│ HEARTBEAT_LOST │
//!              └────┬────┘   HEALTHY    └───────────┘        └───────┬────────┘
//!                   │ HOST_HEARTBEAT_LOST                            │ re-registration
//!                   └────────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, LazyLock, Mutex};

use chrono::{DateTime, Utc};

use crate::factory::{StateMachineFactory, StateMachineFactoryBuilder};
use crate::machine::{StateMachine, StateMachineEvent};

/// Lifecycle state of a host agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostState {
    /// Known to the control plane but never registered.
    Init,
    /// Registered; waiting for the first status report.
    WaitingForVerification,
    /// Heartbeats arrive and report a healthy agent.
    Healthy,
    /// Heartbeats arrive but report problems.
    Unhealthy,
    /// Heartbeats stopped arriving.
    HeartbeatLost,
}

impl HostState {
    /// Every host state.
    pub const ALL: [HostState; 5] = [
        Self::Init,
        Self::WaitingForVerification,
        Self::Healthy,
        Self::Unhealthy,
        Self::HeartbeatLost,
    ];

    /// Returns the string representation of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::WaitingForVerification => "WAITING_FOR_VERIFICATION",
            Self::Healthy => "HEALTHY",
            Self::Unhealthy => "UNHEALTHY",
            Self::HeartbeatLost => "HEARTBEAT_LOST",
        }
    }

    /// Coarse health status reported to operators.
    pub fn health_status(&self) -> &'static str {
        match self {
            Self::Healthy => "HEALTHY",
            Self::Unhealthy => "UNHEALTHY",
            Self::HeartbeatLost | Self::Init | Self::WaitingForVerification => "UNKNOWN",
        }
    }
}

impl fmt::Display for HostState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HostState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown host state '{}'", s))
    }
}

/// Types of events a host machine reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostEventType {
    /// Agent asked to register.
    RegistrationRequest,
    /// Agent delivered its first status report.
    StatusUpdatesReceived,
    /// Heartbeat reporting a healthy agent.
    HeartbeatHealthy,
    /// Heartbeat reporting an unhealthy agent.
    HeartbeatUnhealthy,
    /// Heartbeat timeout expired.
    HeartbeatLost,
}

impl HostEventType {
    /// Every host event type.
    pub const ALL: [HostEventType; 5] = [
        Self::RegistrationRequest,
        Self::StatusUpdatesReceived,
        Self::HeartbeatHealthy,
        Self::HeartbeatUnhealthy,
        Self::HeartbeatLost,
    ];

    /// Returns the string representation of the event type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RegistrationRequest => "HOST_REGISTRATION_REQUEST",
            Self::StatusUpdatesReceived => "HOST_STATUS_UPDATES_RECEIVED",
            Self::HeartbeatHealthy => "HOST_HEARTBEAT_HEALTHY",
            Self::HeartbeatUnhealthy => "HOST_HEARTBEAT_UNHEALTHY",
            Self::HeartbeatLost => "HOST_HEARTBEAT_LOST",
        }
    }
}

impl fmt::Display for HostEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event raised by heartbeat processing or agent registration.
#[derive(Debug, Clone)]
pub struct HostEvent {
    /// Host the event concerns.
    pub host_name: String,
    /// Type of the event.
    pub event_type: HostEventType,
    /// When the event was observed.
    pub timestamp: DateTime<Utc>,
    /// Agent version (registration events).
    pub agent_version: Option<String>,
    /// Health report (unhealthy heartbeats).
    pub health_report: Option<String>,
}

impl HostEvent {
    fn new(host_name: impl Into<String>, event_type: HostEventType) -> Self {
        Self {
            host_name: host_name.into(),
            event_type,
            timestamp: Utc::now(),
            agent_version: None,
            health_report: None,
        }
    }

    /// Agent registration request.
    pub fn registration(host_name: impl Into<String>, agent_version: impl Into<String>) -> Self {
        Self {
            agent_version: Some(agent_version.into()),
            ..Self::new(host_name, HostEventType::RegistrationRequest)
        }
    }

    /// First status report after registration.
    pub fn status_updates_received(host_name: impl Into<String>) -> Self {
        Self::new(host_name, HostEventType::StatusUpdatesReceived)
    }

    /// Healthy heartbeat.
    pub fn heartbeat_healthy(host_name: impl Into<String>) -> Self {
        Self::new(host_name, HostEventType::HeartbeatHealthy)
    }

    /// Unhealthy heartbeat carrying a health report.
    pub fn heartbeat_unhealthy(host_name: impl Into<String>, report: impl Into<String>) -> Self {
        Self {
            health_report: Some(report.into()),
            ..Self::new(host_name, HostEventType::HeartbeatUnhealthy)
        }
    }

    /// Heartbeat timeout.
    pub fn heartbeat_lost(host_name: impl Into<String>) -> Self {
        Self::new(host_name, HostEventType::HeartbeatLost)
    }

    /// Override the observation time.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

impl StateMachineEvent for HostEvent {
    type EventType = HostEventType;

    fn event_type(&self) -> HostEventType {
        self.event_type
    }
}

/// Agent-reported details recorded by transition hooks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostDetails {
    /// Version of the registered agent.
    pub agent_version: Option<String>,
    /// Time of the last registration.
    pub last_registration_time: Option<DateTime<Utc>>,
    /// Time of the last heartbeat (of any kind).
    pub last_heartbeat_time: Option<DateTime<Utc>>,
    /// Last unhealthy report; cleared by a healthy heartbeat.
    pub health_report: Option<String>,
}

/// The host entity owning a host state machine.
#[derive(Debug)]
pub struct HostRecord {
    host_name: String,
    cluster_name: Option<String>,
    details: Mutex<HostDetails>,
}

impl HostRecord {
    /// Create a host record.
    pub fn new(host_name: impl Into<String>, cluster_name: Option<String>) -> Self {
        Self {
            host_name: host_name.into(),
            cluster_name,
            details: Mutex::new(HostDetails::default()),
        }
    }

    /// Name of the host.
    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    /// Cluster the host belongs to, if any.
    pub fn cluster_name(&self) -> Option<&str> {
        self.cluster_name.as_deref()
    }

    /// Snapshot of the recorded details.
    pub fn details(&self) -> HostDetails {
        self.details
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn update(&self, f: impl FnOnce(&mut HostDetails)) {
        let mut details = self
            .details
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut details);
    }
}

/// State machine for one host.
pub type HostStateMachine = StateMachine<Arc<HostRecord>, HostState, HostEvent>;

/// Frozen host transition table.
pub type HostStateMachineFactory = StateMachineFactory<Arc<HostRecord>, HostState, HostEvent>;

static FACTORY: LazyLock<Arc<HostStateMachineFactory>> = LazyLock::new(|| {
    build_factory().expect("host transition table has no duplicate entries")
});

/// The shared host transition table.
pub fn host_state_machine_factory() -> Arc<HostStateMachineFactory> {
    FACTORY.clone()
}

fn build_factory() -> Result<Arc<HostStateMachineFactory>, crate::FactoryError> {
    use HostEventType as Ev;
    use HostState as St;

    StateMachineFactoryBuilder::new(St::Init)
        .add_transitions_with_hook(
            &[St::Init, St::HeartbeatLost],
            St::WaitingForVerification,
            Ev::RegistrationRequest,
            |host: &Arc<HostRecord>, event: &HostEvent| {
                host.update(|d| {
                    d.agent_version = event.agent_version.clone();
                    d.last_registration_time = Some(event.timestamp);
                    d.last_heartbeat_time = Some(event.timestamp);
                    d.health_report = None;
                });
                Ok(())
            },
        )
        .add_transition_with_hook(
            St::WaitingForVerification,
            St::Healthy,
            Ev::StatusUpdatesReceived,
            record_heartbeat,
        )
        .add_transitions_with_hook(
            &[St::Healthy, St::Unhealthy],
            St::Healthy,
            Ev::HeartbeatHealthy,
            record_heartbeat,
        )
        .add_transitions_with_hook(
            &[St::Healthy, St::Unhealthy],
            St::Unhealthy,
            Ev::HeartbeatUnhealthy,
            record_heartbeat,
        )
        .add_transitions(
            &[
                St::WaitingForVerification,
                St::Healthy,
                St::Unhealthy,
                St::HeartbeatLost,
            ],
            St::HeartbeatLost,
            Ev::HeartbeatLost,
        )
        .freeze()
}

fn record_heartbeat(host: &Arc<HostRecord>, event: &HostEvent) -> Result<(), crate::HookError> {
    host.update(|d| {
        d.last_heartbeat_time = Some(event.timestamp);
        d.health_report = event.health_report.clone();
    });
    Ok(())
}
