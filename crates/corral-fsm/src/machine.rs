// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Per-entity state machine runtime.

use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::error::TransitionError;
use crate::factory::StateMachineFactory;

/// Bounds required of a lifecycle state enum.
pub trait MachineState: Copy + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static {}

impl<S> MachineState for S where S: Copy + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static
{}

/// Bounds required of a lifecycle event type enum.
pub trait MachineEventType:
    Copy + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static
{
}

impl<T> MachineEventType for T where
    T: Copy + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static
{
}

/// An event delivered to a state machine.
///
/// The event type selects the transition; the event itself is handed to the
/// transition hook so it can carry context such as timestamps or reports.
pub trait StateMachineEvent: Send + Sync + 'static {
    /// Enumeration of event types for this lifecycle.
    type EventType: MachineEventType;

    /// The type of this event.
    fn event_type(&self) -> Self::EventType;
}

/// State machine bound to one entity.
///
/// Created by [`StateMachineFactory::make`], starting in the table's initial
/// state. The current state is only ever changed by [`handle_event`] (or
/// [`restore_state`] when rehydrating a persisted entity).
///
/// [`handle_event`]: Self::handle_event
/// [`restore_state`]: Self::restore_state
pub struct StateMachine<O, S, E>
where
    O: Send + Sync + 'static,
    S: MachineState,
    E: StateMachineEvent,
{
    factory: Arc<StateMachineFactory<O, S, E>>,
    owner: O,
    current: Mutex<S>,
}

impl<O, S, E> StateMachine<O, S, E>
where
    O: Send + Sync + 'static,
    S: MachineState,
    E: StateMachineEvent,
{
    pub(crate) fn new(factory: Arc<StateMachineFactory<O, S, E>>, owner: O) -> Self {
        let initial = factory.initial_state();
        Self {
            factory,
            owner,
            current: Mutex::new(initial),
        }
    }

    /// The entity this machine belongs to.
    pub fn owner(&self) -> &O {
        &self.owner
    }

    /// The frozen transition table shared by all machines of this kind.
    pub fn factory(&self) -> &Arc<StateMachineFactory<O, S, E>> {
        &self.factory
    }

    /// Current state of the entity.
    pub fn current_state(&self) -> S {
        *self.lock()
    }

    /// Apply an event to the entity.
    ///
    /// Looks up `(current state, event type)` in the transition table. When
    /// there is no entry the call fails with
    /// [`TransitionError::InvalidStateTransition`]. Otherwise the transition
    /// hook (if any) runs with the owner and the event, and only after it
    /// succeeds is the target state committed. The whole sequence holds this
    /// machine's lock.
    ///
    /// Returns the new current state.
    pub fn handle_event(&self, event: &E) -> Result<S, TransitionError<S, E::EventType>> {
        let event_type = event.event_type();
        let mut current = self.lock();
        let state = *current;

        let Some(transition) = self.factory.transition(state, event_type) else {
            debug!(%state, %event_type, "Rejected event with no transition");
            return Err(TransitionError::InvalidStateTransition { state, event_type });
        };

        if let Some(hook) = transition.hook() {
            if let Err(source) = hook(&self.owner, event) {
                warn!(%state, %event_type, error = %source, "Transition hook failed");
                return Err(TransitionError::HookFailed {
                    state,
                    event_type,
                    source,
                });
            }
        }

        let target = transition.target();
        *current = target;
        debug!(from = %state, to = %target, %event_type, "State transition");
        Ok(target)
    }

    /// Force the current state without consulting the transition table.
    ///
    /// Used when rehydrating an entity whose state was persisted elsewhere.
    pub fn restore_state(&self, state: S) {
        *self.lock() = state;
    }

    // A panicking hook poisons the lock before the state is committed, so the
    // guarded value is still consistent.
    fn lock(&self) -> MutexGuard<'_, S> {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<O, S, E> fmt::Debug for StateMachine<O, S, E>
where
    O: Send + Sync + 'static,
    S: MachineState,
    E: StateMachineEvent,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("current", &self.current_state())
            .finish_non_exhaustive()
    }
}
