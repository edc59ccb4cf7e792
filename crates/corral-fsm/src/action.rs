// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Action (job) lifecycle.
//!
//! `COMPLETED` and `FAILED` only accept `ACTION_INIT`, which resets the action
//! so it can be scheduled again.

use std::fmt;
use std::sync::{Arc, LazyLock, Mutex};

use chrono::{DateTime, Utc};

use crate::factory::{StateMachineFactory, StateMachineFactoryBuilder};
use crate::machine::{StateMachine, StateMachineEvent};

/// Lifecycle state of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionState {
    /// Created, not yet running.
    Init,
    /// Running.
    InProgress,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
}

impl ActionState {
    /// Every action state.
    pub const ALL: [ActionState; 4] = [Self::Init, Self::InProgress, Self::Completed, Self::Failed];

    /// Returns the string representation of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for ActionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Types of events an action machine reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionEventType {
    /// (Re)initialize the action.
    Init,
    /// Progress report.
    InProgress,
    /// The action completed.
    Completed,
    /// The action failed.
    Failed,
}

impl ActionEventType {
    /// Every action event type.
    pub const ALL: [ActionEventType; 4] =
        [Self::Init, Self::InProgress, Self::Completed, Self::Failed];

    /// Returns the string representation of the event type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "ACTION_INIT",
            Self::InProgress => "ACTION_IN_PROGRESS",
            Self::Completed => "ACTION_COMPLETED",
            Self::Failed => "ACTION_FAILED",
        }
    }
}

impl fmt::Display for ActionEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event for an action.
#[derive(Debug, Clone)]
pub struct ActionEvent {
    /// Action the event concerns.
    pub action_id: String,
    /// Type of the event.
    pub event_type: ActionEventType,
    /// When the event was observed.
    pub timestamp: DateTime<Utc>,
    /// Exit code reported with completion or failure.
    pub exit_code: Option<i32>,
}

impl ActionEvent {
    /// Create an event observed now.
    pub fn new(action_id: impl Into<String>, event_type: ActionEventType) -> Self {
        Self {
            action_id: action_id.into(),
            event_type,
            timestamp: Utc::now(),
            exit_code: None,
        }
    }

    /// Attach an exit code.
    pub fn with_exit_code(mut self, exit_code: i32) -> Self {
        self.exit_code = Some(exit_code);
        self
    }
}

impl StateMachineEvent for ActionEvent {
    type EventType = ActionEventType;

    fn event_type(&self) -> ActionEventType {
        self.event_type
    }
}

/// Execution record of an action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionTimes {
    /// First progress report.
    pub start_time: Option<DateTime<Utc>>,
    /// Most recent event.
    pub last_update_time: Option<DateTime<Utc>>,
    /// Completion or failure.
    pub end_time: Option<DateTime<Utc>>,
    /// Reported exit code.
    pub exit_code: Option<i32>,
}

/// An action; owner of an action state machine.
#[derive(Debug)]
pub struct ActionRecord {
    action_id: String,
    times: Mutex<ActionTimes>,
}

impl ActionRecord {
    /// Create an action record.
    pub fn new(action_id: impl Into<String>) -> Self {
        Self {
            action_id: action_id.into(),
            times: Mutex::new(ActionTimes::default()),
        }
    }

    /// Action id.
    pub fn action_id(&self) -> &str {
        &self.action_id
    }

    /// Snapshot of the execution record.
    pub fn times(&self) -> ActionTimes {
        *self.times.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn update(&self, f: impl FnOnce(&mut ActionTimes)) {
        let mut times = self.times.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut times);
    }
}

/// State machine for one action.
pub type ActionStateMachine = StateMachine<Arc<ActionRecord>, ActionState, ActionEvent>;

/// Frozen action transition table.
pub type ActionStateMachineFactory = StateMachineFactory<Arc<ActionRecord>, ActionState, ActionEvent>;

static FACTORY: LazyLock<Arc<ActionStateMachineFactory>> = LazyLock::new(|| {
    build_factory().expect("action transition table has no duplicate entries")
});

/// The shared action transition table.
pub fn action_state_machine_factory() -> Arc<ActionStateMachineFactory> {
    FACTORY.clone()
}

fn build_factory() -> Result<Arc<ActionStateMachineFactory>, crate::FactoryError> {
    use ActionEventType as Ev;
    use ActionState as St;

    StateMachineFactoryBuilder::new(St::Init)
        .add_transition(St::Init, St::Init, Ev::Init)
        .add_transition_with_hook(
            St::Init,
            St::InProgress,
            Ev::InProgress,
            |action: &Arc<ActionRecord>, event: &ActionEvent| {
                action.update(|t| {
                    t.start_time = Some(event.timestamp);
                    t.last_update_time = Some(event.timestamp);
                });
                Ok(())
            },
        )
        .add_transition_with_hook(
            St::InProgress,
            St::InProgress,
            Ev::InProgress,
            |action: &Arc<ActionRecord>, event: &ActionEvent| {
                action.update(|t| t.last_update_time = Some(event.timestamp));
                Ok(())
            },
        )
        .add_transition_with_hook(St::InProgress, St::Completed, Ev::Completed, finished)
        .add_transition_with_hook(St::InProgress, St::Failed, Ev::Failed, finished)
        .add_transitions_with_hook(
            &[St::Completed, St::Failed],
            St::Init,
            Ev::Init,
            |action: &Arc<ActionRecord>, _event: &ActionEvent| {
                action.update(|t| *t = ActionTimes::default());
                Ok(())
            },
        )
        .freeze()
}

fn finished(action: &Arc<ActionRecord>, event: &ActionEvent) -> Result<(), crate::HookError> {
    action.update(|t| {
        t.last_update_time = Some(event.timestamp);
        t.end_time = Some(event.timestamp);
        t.exit_code = event.exit_code;
    });
    Ok(())
}
