// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Commands handed to downstream orchestration.

use std::fmt;

use corral_fsm::component::ComponentState;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::error::Result;

/// Operation an agent performs for a component on its host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleCommand {
    /// Install the component's packages.
    Install,
    /// Start the component.
    Start,
    /// Stop the component.
    Stop,
    /// Remove the component's packages.
    Uninstall,
    /// Remove all remaining component data.
    Wipeout,
}

impl RoleCommand {
    /// Returns the string representation of the command.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Install => "INSTALL",
            Self::Start => "START",
            Self::Stop => "STOP",
            Self::Uninstall => "UNINSTALL",
            Self::Wipeout => "WIPEOUT",
        }
    }

    /// Command that drives a component through the in-flight `state`.
    pub fn for_state(state: ComponentState) -> Option<Self> {
        match state {
            ComponentState::Installing => Some(Self::Install),
            ComponentState::Starting => Some(Self::Start),
            ComponentState::Stopping => Some(Self::Stop),
            ComponentState::Uninstalling => Some(Self::Uninstall),
            ComponentState::WipingOut => Some(Self::Wipeout),
            _ => None,
        }
    }
}

impl fmt::Display for RoleCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A command for one component on one host, tagged with its request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostCommand {
    /// Orchestration request the command belongs to.
    pub request_id: Uuid,
    /// Cluster name.
    pub cluster_name: String,
    /// Service name.
    pub service_name: String,
    /// Component name.
    pub component_name: String,
    /// Target host.
    pub host_name: String,
    /// What to do.
    pub command: RoleCommand,
}

/// Sink for orchestration commands.
///
/// Dispatch only hands the commands over. Completion is reported back later
/// as component events (`OP_SUCCEEDED`, `OP_FAILED`, ...).
#[async_trait::async_trait]
pub trait CommandDispatcher: Send + Sync {
    /// Accept the commands of one request.
    async fn dispatch(&self, request_id: Uuid, commands: Vec<HostCommand>) -> Result<()>;
}

/// Dispatcher that only logs the commands it receives.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingDispatcher;

#[async_trait::async_trait]
impl CommandDispatcher for LoggingDispatcher {
    async fn dispatch(&self, request_id: Uuid, commands: Vec<HostCommand>) -> Result<()> {
        for command in &commands {
            info!(
                request_id = %request_id,
                host = %command.host_name,
                component = %command.component_name,
                command = %command.command,
                "Dispatching host command"
            );
        }
        Ok(())
    }
}
