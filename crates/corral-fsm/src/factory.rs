// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Transition table construction.
//!
//! A table is assembled with [`StateMachineFactoryBuilder`] and frozen into a
//! [`StateMachineFactory`]. The frozen factory is immutable and is shared
//! (behind an [`Arc`]) by every state machine of that entity kind.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{FactoryError, HookError};
use crate::machine::{MachineState, StateMachine, StateMachineEvent};

/// Side-effect invoked with `(owner, event)` before a transition commits.
pub type TransitionHook<O, E> = Arc<dyn Fn(&O, &E) -> Result<(), HookError> + Send + Sync>;

/// One entry of a transition table.
pub struct Transition<O, S, E> {
    target: S,
    hook: Option<TransitionHook<O, E>>,
}

impl<O, S: Copy, E> Transition<O, S, E> {
    /// State the entity moves to.
    pub fn target(&self) -> S {
        self.target
    }

    /// Hook to run before committing, if any.
    pub fn hook(&self) -> Option<&TransitionHook<O, E>> {
        self.hook.as_ref()
    }
}

/// Builder for a transition table.
///
/// Registering the same `(from, event type)` pair twice is reported by
/// [`freeze`](Self::freeze).
pub struct StateMachineFactoryBuilder<O, S, E>
where
    S: MachineState,
    E: StateMachineEvent,
{
    initial_state: S,
    transitions: HashMap<(S, E::EventType), Transition<O, S, E>>,
    duplicates: Vec<(S, E::EventType)>,
}

impl<O, S, E> StateMachineFactoryBuilder<O, S, E>
where
    O: Send + Sync + 'static,
    S: MachineState,
    E: StateMachineEvent,
{
    /// Start a table whose machines begin in `initial_state`.
    pub fn new(initial_state: S) -> Self {
        Self {
            initial_state,
            transitions: HashMap::new(),
            duplicates: Vec::new(),
        }
    }

    /// Register `from --event_type--> to` without a hook.
    pub fn add_transition(self, from: S, to: S, event_type: E::EventType) -> Self {
        self.insert(from, to, event_type, None)
    }

    /// Register `from --event_type--> to` with a hook run before commit.
    pub fn add_transition_with_hook<F>(self, from: S, to: S, event_type: E::EventType, hook: F) -> Self
    where
        F: Fn(&O, &E) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.insert(from, to, event_type, Some(Arc::new(hook)))
    }

    /// Register the same transition from several source states.
    pub fn add_transitions(mut self, from: &[S], to: S, event_type: E::EventType) -> Self {
        for state in from {
            self = self.insert(*state, to, event_type, None);
        }
        self
    }

    /// Register the same hooked transition from several source states.
    pub fn add_transitions_with_hook<F>(
        mut self,
        from: &[S],
        to: S,
        event_type: E::EventType,
        hook: F,
    ) -> Self
    where
        F: Fn(&O, &E) -> Result<(), HookError> + Send + Sync + 'static,
    {
        let hook: TransitionHook<O, E> = Arc::new(hook);
        for state in from {
            self = self.insert(*state, to, event_type, Some(hook.clone()));
        }
        self
    }

    /// Freeze the table. After this point it can only be read.
    pub fn freeze(self) -> Result<Arc<StateMachineFactory<O, S, E>>, FactoryError> {
        if let Some((state, event_type)) = self.duplicates.first() {
            return Err(FactoryError::DuplicateTransition {
                state: state.to_string(),
                event_type: event_type.to_string(),
            });
        }

        Ok(Arc::new(StateMachineFactory {
            initial_state: self.initial_state,
            transitions: self.transitions,
        }))
    }

    fn insert(
        mut self,
        from: S,
        to: S,
        event_type: E::EventType,
        hook: Option<TransitionHook<O, E>>,
    ) -> Self {
        let previous = self
            .transitions
            .insert((from, event_type), Transition { target: to, hook });
        if previous.is_some() {
            self.duplicates.push((from, event_type));
        }
        self
    }
}

/// Frozen transition table.
pub struct StateMachineFactory<O, S, E>
where
    S: MachineState,
    E: StateMachineEvent,
{
    initial_state: S,
    transitions: HashMap<(S, E::EventType), Transition<O, S, E>>,
}

impl<O, S, E> StateMachineFactory<O, S, E>
where
    O: Send + Sync + 'static,
    S: MachineState,
    E: StateMachineEvent,
{
    /// Create a state machine for `owner`, starting in the initial state.
    pub fn make(self: &Arc<Self>, owner: O) -> StateMachine<O, S, E> {
        StateMachine::new(self.clone(), owner)
    }

    /// State every new machine starts in.
    pub fn initial_state(&self) -> S {
        self.initial_state
    }

    /// Look up the transition for `(from, event_type)`.
    pub fn transition(&self, from: S, event_type: E::EventType) -> Option<&Transition<O, S, E>> {
        self.transitions.get(&(from, event_type))
    }

    /// Target state for `(from, event_type)`, if the table defines one.
    pub fn target(&self, from: S, event_type: E::EventType) -> Option<S> {
        self.transition(from, event_type).map(Transition::target)
    }

    /// Whether an event of `event_type` would be accepted in state `from`.
    pub fn can_handle(&self, from: S, event_type: E::EventType) -> bool {
        self.transitions.contains_key(&(from, event_type))
    }

    /// Event types accepted in `from`, with their targets.
    pub fn outgoing(&self, from: S) -> Vec<(E::EventType, S)> {
        self.transitions
            .iter()
            .filter(|((state, _), _)| *state == from)
            .map(|((_, event_type), transition)| (*event_type, transition.target))
            .collect()
    }

    /// Number of entries in the table.
    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }
}

impl<O, S, E> fmt::Debug for StateMachineFactory<O, S, E>
where
    S: MachineState,
    E: StateMachineEvent,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachineFactory")
            .field("initial_state", &self.initial_state)
            .field("transitions", &self.transitions.len())
            .finish()
    }
}
